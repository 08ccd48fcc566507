//! # Shared Bus - In-Process Event Bus
//!
//! Publish/subscribe channel shared by every module of the connector host.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │   Runtime    │                    │   Module B   │
//! │              │    publish()       │  handler()   │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐   worker  │
//!                  │  Event Bus   │ ──────────┘
//!                  │  "a.*", "**" │  subscribe(pattern)
//!                  └──────────────┘
//! ```
//!
//! ## Delivery Rules
//!
//! - Topics are dot-separated namespaces (`transport.messageReceived`).
//! - `*` matches exactly one segment, `**` matches any number of segments.
//! - Each subscription owns one worker task: events reach a subscriber in
//!   publish order; different subscribers are not ordered relative to each
//!   other.
//! - `unsubscribe` may be called from inside the subscription's own handler.
//!   The running handler completes; queued events are not dispatched.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{Event, TopicPattern};
pub use publisher::EventBus;
pub use subscriber::{EventHandler, Subscription, SubscriptionId};

/// Pattern matching every namespace.
pub const WILDCARD_ALL: &str = "**";

/// Pattern matching exactly one namespace segment.
pub const WILDCARD_ONE: &str = "*";
