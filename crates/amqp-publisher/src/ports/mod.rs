//! Ports (Hexagonal Architecture)

pub mod outbound;

pub use outbound::{BrokerChannel, BrokerConnection, BrokerConnector};
