//! In-memory broker adapter.
//!
//! Records declared exchanges, published messages and close calls. Used
//! by tests and for running the host without a broker.

use crate::domain::{BrokerError, ExchangeType};
use crate::ports::{BrokerChannel, BrokerConnection, BrokerConnector};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One message accepted by the in-memory broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// Payload parsed as JSON (`Null` if it is not JSON).
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.payload).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
struct BrokerState {
    urls: Mutex<Vec<String>>,
    exchanges: Mutex<Vec<(String, ExchangeType)>>,
    published: Mutex<Vec<PublishedMessage>>,
    closed: Mutex<Vec<&'static str>>,
    refuse_publishes: AtomicBool,
    fail_channel_close: AtomicBool,
    fail_connection_close: AtomicBool,
}

/// Shared handle on an in-memory broker. Clones observe the same state.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish report "not accepted".
    pub fn refuse_publishes(&self, refuse: bool) {
        self.state.refuse_publishes.store(refuse, Ordering::SeqCst);
    }

    /// Make closing channels and/or connections fail.
    pub fn fail_close(&self, channel: bool, connection: bool) {
        self.state.fail_channel_close.store(channel, Ordering::SeqCst);
        self.state
            .fail_connection_close
            .store(connection, Ordering::SeqCst);
    }

    /// URLs connected to so far.
    pub fn connected_urls(&self) -> Vec<String> {
        self.state.urls.lock().clone()
    }

    pub fn exchanges(&self) -> Vec<(String, ExchangeType)> {
        self.state.exchanges.lock().clone()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.published.lock().clone()
    }

    /// Close calls in the order they happened (`"channel"` / `"connection"`).
    pub fn closed(&self) -> Vec<&'static str> {
        self.state.closed.lock().clone()
    }

    /// Poll until at least `count` messages were published or `timeout` elapsed.
    pub async fn wait_for_messages(&self, count: usize, timeout: Duration) -> Vec<PublishedMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let published = self.published();
            if published.len() >= count || tokio::time::Instant::now() >= deadline {
                return published;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl BrokerConnector for InMemoryBroker {
    async fn connect(&self, url: &str) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
        self.state.urls.lock().push(url.to_string());
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl BrokerConnection for InMemoryBroker {
    async fn create_channel(&self) -> Result<Arc<dyn BrokerChannel>, BrokerError> {
        Ok(Arc::new(self.clone()))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.state.closed.lock().push("connection");
        if self.state.fail_connection_close.load(Ordering::SeqCst) {
            return Err(BrokerError::Close("connection already closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerChannel for InMemoryBroker {
    async fn assert_exchange(&self, name: &str, kind: ExchangeType) -> Result<(), BrokerError> {
        let mut exchanges = self.state.exchanges.lock();
        match exchanges.iter().find(|(existing, _)| existing == name) {
            Some((_, existing)) if *existing != kind => Err(BrokerError::Exchange {
                name: name.to_string(),
                reason: format!("already declared as {existing}"),
            }),
            Some(_) => Ok(()),
            None => {
                exchanges.push((name.to_string(), kind));
                Ok(())
            }
        }
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Vec<u8>,
    ) -> Result<bool, BrokerError> {
        if self.state.refuse_publishes.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.state.published.lock().push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload,
        });
        Ok(true)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.state.closed.lock().push("channel");
        if self.state.fail_channel_close.load(Ordering::SeqCst) {
            return Err(BrokerError::Close("channel already closed".into()));
        }
        Ok(())
    }
}
