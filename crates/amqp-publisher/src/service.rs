//! # AMQP Publisher Module
//!
//! Subscribes to every event on the bus and republishes it to the
//! configured exchange. The event namespace becomes the routing key, the
//! event data (or `{}`) the JSON payload.

use crate::adapters::LapinConnector;
use crate::domain::AmqpPublisherConfig;
use crate::ports::{BrokerChannel, BrokerConnection, BrokerConnector};
use async_trait::async_trait;
use futures::FutureExt;
use module_registry::{ModuleContext, ModuleError, RuntimeModule};
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_bus::{Event, EventHandler, Subscription, TopicPattern};
use shared_types::ModuleDescriptor;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Registry name of the publisher module.
pub const AMQP_PUBLISHER_NAME: &str = "amqpPublisher";

/// Pattern matching every namespace.
const ALL_EVENTS: &str = "**";

const MISSING_URL: &str = "Cannot start the module, the amqp url is not defined.";

#[derive(Default)]
struct PublisherState {
    subscription: Option<Subscription>,
    connection: Option<Arc<dyn BrokerConnection>>,
    channel: Option<Arc<dyn BrokerChannel>>,
}

/// Republishes bus events to a message broker.
pub struct AmqpPublisherModule {
    config: AmqpPublisherConfig,
    connector: Arc<dyn BrokerConnector>,
    state: Mutex<PublisherState>,
}

impl AmqpPublisherModule {
    pub fn new(config: AmqpPublisherConfig, connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            config,
            connector,
            state: Mutex::new(PublisherState::default()),
        }
    }

    /// Publisher talking to a real broker through lapin.
    pub fn with_lapin(config: AmqpPublisherConfig) -> Self {
        Self::new(config, Arc::new(LapinConnector::default()))
    }

    /// Build from a descriptor's configuration.
    pub fn from_descriptor(
        descriptor: &ModuleDescriptor,
        connector: Arc<dyn BrokerConnector>,
    ) -> Result<Self, ModuleError> {
        let config = descriptor
            .parse_configuration()
            .map_err(|e| ModuleError::configuration(format!("invalid amqp configuration: {e}")))?;
        Ok(Self::new(config, connector))
    }

    pub fn config(&self) -> &AmqpPublisherConfig {
        &self.config
    }

    /// Whether the module currently holds a broker connection.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connection.is_some()
    }
}

#[async_trait]
impl RuntimeModule for AmqpPublisherModule {
    async fn init(&self, _ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn start(&self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        let url = self
            .config
            .url()
            .ok_or_else(|| ModuleError::configuration(MISSING_URL))?;

        let connection = self.connector.connect(url).await?;
        self.state.lock().connection = Some(Arc::clone(&connection));

        let channel = connection.create_channel().await?;
        self.state.lock().channel = Some(Arc::clone(&channel));

        if let Some(exchange) = &self.config.exchange {
            channel.assert_exchange(&exchange.name, exchange.kind).await?;
            debug!(
                "[AmqpPublisher] Exchange '{}' ({}) asserted",
                exchange.name, exchange.kind
            );
        }

        let pattern = TopicPattern::new(ALL_EVENTS);
        let handler = publish_handler(channel, self.config.exchange_name().to_string());
        let id = ctx.bus().subscribe_handler(pattern.clone(), handler);
        self.state.lock().subscription = Some(Subscription { pattern, id });

        info!(
            "[AmqpPublisher] Forwarding events to exchange '{}'",
            self.config.exchange_name()
        );
        Ok(())
    }

    async fn stop(&self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError> {
        let (subscription, channel, connection) = {
            let mut state = self.state.lock();
            (
                state.subscription.take(),
                state.channel.take(),
                state.connection.take(),
            )
        };

        if let Some(subscription) = subscription {
            ctx.bus().unsubscribe(&subscription.pattern, subscription.id);
        }

        if let Some(channel) = channel {
            if let Err(e) = channel.close().await {
                error!(error = %e, "[AmqpPublisher] Could not close the broker channel");
            }
        }

        if let Some(connection) = connection {
            if let Err(e) = connection.close().await {
                error!(error = %e, "[AmqpPublisher] Could not close the broker connection");
            }
        }

        info!("[AmqpPublisher] Stopped");
        Ok(())
    }
}

fn publish_handler(channel: Arc<dyn BrokerChannel>, exchange: String) -> EventHandler {
    Arc::new(move |event: Event| {
        let channel = Arc::clone(&channel);
        let exchange = exchange.clone();
        async move { publish_event(channel.as_ref(), &exchange, event).await }.boxed()
    })
}

/// Publish one event. Failures are logged, never propagated to the bus.
async fn publish_event(channel: &dyn BrokerChannel, exchange: &str, event: Event) {
    let data: Value = event.data.unwrap_or_else(|| json!({}));
    let payload = match serde_json::to_vec(&data) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, namespace = %event.namespace, "[AmqpPublisher] Event data is not serializable");
            return;
        }
    };

    match channel.publish(exchange, &event.namespace, payload).await {
        Ok(true) => debug!(namespace = %event.namespace, "[AmqpPublisher] Event published"),
        Ok(false) => error!(
            "[AmqpPublisher] Publishing event '{}' to exchange '{}' failed.",
            event.namespace, exchange
        ),
        Err(e) => error!(
            error = %e,
            "[AmqpPublisher] Publishing event '{}' to exchange '{}' failed.",
            event.namespace, exchange
        ),
    }
}
