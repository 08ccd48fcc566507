//! # Event Subscriber
//!
//! Subscription handles and the per-subscription delivery worker.

use crate::events::{Event, TopicPattern};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Async callback invoked once per delivered event.
pub type EventHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

/// Opaque identifier of one subscription, unique per bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The `(pattern, id)` pair a module keeps to tear its subscription down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub pattern: TopicPattern,
    pub id: SubscriptionId,
}

/// Bus-side state of one subscription.
pub(crate) struct SubscriberSlot {
    pub(crate) pattern: TopicPattern,
    sender: mpsc::UnboundedSender<Event>,
    active: Arc<AtomicBool>,
}

impl SubscriberSlot {
    /// Create the slot and spawn its delivery worker on the current runtime.
    pub(crate) fn spawn(id: SubscriptionId, pattern: TopicPattern, handler: EventHandler) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(true));

        tokio::spawn(run_worker(id, receiver, handler, Arc::clone(&active)));

        Self {
            pattern,
            sender,
            active,
        }
    }

    /// Queue an event for this subscriber. Returns false if the worker is gone.
    pub(crate) fn deliver(&self, event: Event) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Stop dispatching. The handler currently running (if any) completes.
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

async fn run_worker(
    id: SubscriptionId,
    mut receiver: mpsc::UnboundedReceiver<Event>,
    handler: EventHandler,
    active: Arc<AtomicBool>,
) {
    while let Some(event) = receiver.recv().await {
        if !active.load(Ordering::Acquire) {
            break;
        }

        let namespace = event.namespace.clone();
        if AssertUnwindSafe(handler(event)).catch_unwind().await.is_err() {
            error!(subscription = %id, namespace = %namespace, "Event handler panicked");
        }
    }
    debug!(subscription = %id, "Subscription worker finished");
}
