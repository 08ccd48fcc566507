//! # AMQP Publisher
//!
//! Optional module forwarding every bus event to a message broker.
//!
//! ## Architecture
//!
//! ```text
//!   EventBus ──"**"──→ AmqpPublisherModule ──→ BrokerChannel (port)
//!                                                  ├── LapinConnector   (AMQP 0-9-1)
//!                                                  └── InMemoryBroker   (tests, dry runs)
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryBroker, LapinConnector, PublishedMessage};
pub use domain::{AmqpPublisherConfig, BrokerError, ExchangeConfig, ExchangeType};
pub use ports::{BrokerChannel, BrokerConnection, BrokerConnector};
pub use service::{AmqpPublisherModule, AMQP_PUBLISHER_NAME};
