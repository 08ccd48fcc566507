//! Outbound (Driven) ports for the AMQP publisher.
//!
//! The module talks to the broker only through these traits; the lapin
//! client and the in-memory broker are the two adapters.

use crate::domain::{BrokerError, ExchangeType};
use async_trait::async_trait;
use std::sync::Arc;

/// Opens broker connections.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn BrokerConnection>, BrokerError>;
}

/// One open broker connection.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    async fn create_channel(&self) -> Result<Arc<dyn BrokerChannel>, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// One channel on a connection.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declare an exchange. Idempotent for identical parameters.
    async fn assert_exchange(&self, name: &str, kind: ExchangeType) -> Result<(), BrokerError>;

    /// Publish one message without waiting for the broker.
    ///
    /// # Returns
    /// - `Ok(true)`: the message was buffered for sending
    /// - `Ok(false)`: the client refused to buffer it
    /// - `Err`: the channel failed
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<bool, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}
