//! Domain layer for the AMQP publisher.

pub mod config;
pub mod errors;

pub use config::{AmqpPublisherConfig, ExchangeConfig, ExchangeType};
pub use errors::BrokerError;
