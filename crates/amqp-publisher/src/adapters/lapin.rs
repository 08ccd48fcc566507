//! lapin-backed broker adapter.

use crate::domain::{BrokerError, ExchangeType};
use crate::ports::{BrokerChannel, BrokerConnection, BrokerConnector};
use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const REPLY_SUCCESS: u16 = 200;

/// Connects to a real AMQP 0-9-1 broker.
#[derive(Default)]
pub struct LapinConnector {
    properties: ConnectionProperties,
}

impl LapinConnector {
    pub fn new(properties: ConnectionProperties) -> Self {
        Self { properties }
    }
}

#[async_trait]
impl BrokerConnector for LapinConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
        let connection = Connection::connect(url, self.properties.clone())
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        debug!("AMQP connection established");
        Ok(Arc::new(LapinConnection(connection)))
    }
}

struct LapinConnection(Connection);

#[async_trait]
impl BrokerConnection for LapinConnection {
    async fn create_channel(&self) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        let channel = self
            .0
            .create_channel()
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;
        // Publisher confirms, so a broker nack gets logged.
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;
        Ok(Arc::new(LapinChannel(channel)))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.0
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(|e| BrokerError::Close(e.to_string()))
    }
}

struct LapinChannel(Channel);

fn exchange_kind(kind: ExchangeType) -> ExchangeKind {
    match kind {
        ExchangeType::Direct => ExchangeKind::Direct,
        ExchangeType::Topic => ExchangeKind::Topic,
        ExchangeType::Headers | ExchangeType::Match => ExchangeKind::Headers,
        ExchangeType::Fanout => ExchangeKind::Fanout,
    }
}

#[async_trait]
impl BrokerChannel for LapinChannel {
    async fn assert_exchange(&self, name: &str, kind: ExchangeType) -> Result<(), BrokerError> {
        let options = ExchangeDeclareOptions {
            durable: true,
            ..ExchangeDeclareOptions::default()
        };
        self.0
            .exchange_declare(name, exchange_kind(kind), options, FieldTable::default())
            .await
            .map_err(|e| BrokerError::Exchange {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<bool, BrokerError> {
        let confirm = self
            .0
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        // Buffered on the channel; the confirm is awaited off the bus worker.
        spawn_confirm_observer(confirm, exchange.to_string(), routing_key.to_string());
        Ok(true)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.0
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(|e| BrokerError::Close(e.to_string()))
    }
}

/// Wait for the broker's confirm in a detached task and log a refusal.
fn spawn_confirm_observer<F>(confirm: F, exchange: String, routing_key: String) -> JoinHandle<bool>
where
    F: Future<Output = lapin::Result<Confirmation>> + Send + 'static,
{
    tokio::spawn(observe_confirm(confirm, exchange, routing_key))
}

async fn observe_confirm<F>(confirm: F, exchange: String, routing_key: String) -> bool
where
    F: Future<Output = lapin::Result<Confirmation>>,
{
    match confirm.await {
        Ok(Confirmation::Nack(_)) => {
            warn!(
                "[AmqpPublisher] Broker did not accept event '{}' on exchange '{}'.",
                routing_key, exchange
            );
            false
        }
        Ok(_) => true,
        Err(e) => {
            warn!(
                error = %e,
                "[AmqpPublisher] No confirm for event '{}' on exchange '{}'.",
                routing_key, exchange
            );
            false
        }
    }
}
