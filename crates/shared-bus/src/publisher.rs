//! # Event Bus
//!
//! Subscription registry plus the publishing side of the bus.

use crate::events::{Event, TopicPattern};
use crate::subscriber::{EventHandler, SubscriberSlot, SubscriptionId};
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// In-memory wildcard event bus.
///
/// The subscriber map is only locked for the duration of a map operation,
/// never while a handler runs, so handlers may freely subscribe,
/// unsubscribe (including themselves) and publish.
///
/// Subscribing spawns a worker task and therefore must happen inside a
/// Tokio runtime.
pub struct EventBus {
    /// Active subscriptions by id.
    subscribers: RwLock<HashMap<SubscriptionId, SubscriberSlot>>,

    /// Next subscription id.
    next_id: AtomicU64,

    /// Total events published.
    events_published: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            events_published: AtomicU64::new(0),
        }
    }

    /// Subscribe an async closure to every event matching `pattern`.
    pub fn subscribe<F, Fut>(&self, pattern: impl Into<TopicPattern>, handler: F) -> SubscriptionId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: EventHandler = Arc::new(move |event| handler(event).boxed());
        self.subscribe_handler(pattern, handler)
    }

    /// Subscribe a pre-built handler to every event matching `pattern`.
    pub fn subscribe_handler(
        &self,
        pattern: impl Into<TopicPattern>,
        handler: EventHandler,
    ) -> SubscriptionId {
        let pattern = pattern.into();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        debug!(pattern = %pattern, subscription = %id, "New subscription created");

        let slot = SubscriberSlot::spawn(id, pattern, handler);
        self.subscribers.write().insert(id, slot);
        id
    }

    /// Remove a subscription.
    ///
    /// Returns `false` if no subscription with this id and pattern exists.
    pub fn unsubscribe(&self, pattern: &TopicPattern, id: SubscriptionId) -> bool {
        let removed = {
            let mut subscribers = self.subscribers.write();
            match subscribers.get(&id) {
                Some(slot) if slot.pattern == *pattern => subscribers.remove(&id),
                _ => None,
            }
        };

        match removed {
            Some(slot) => {
                slot.deactivate();
                debug!(pattern = %pattern, subscription = %id, "Subscription removed");
                true
            }
            None => {
                warn!(pattern = %pattern, subscription = %id, "Unknown subscription");
                false
            }
        }
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Never blocks. Returns the number of subscribers the event was queued for.
    pub fn publish(&self, event: Event) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let subscribers = self.subscribers.read();
        let delivered = subscribers
            .values()
            .filter(|slot| slot.pattern.matches(&event.namespace))
            .filter(|slot| slot.deliver(event.clone()))
            .count();

        trace!(
            namespace = %event.namespace,
            receivers = delivered,
            "Event published"
        );
        delivered
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Total number of events published so far.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("events_published", &self.events_published())
            .finish()
    }
}
