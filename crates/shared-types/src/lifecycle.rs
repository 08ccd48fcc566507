//! # Lifecycle State Machine
//!
//! ```text
//! Created ──init──→ Initialized ──start──→ Started ──stop──→ Stopped
//!                        │                                     ↑
//!                        └────────────────stop─────────────────┘
//! ```
//!
//! States only move forward. `Stopped` is terminal.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Lifecycle phase of one module or infrastructure instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Constructed and registered, `init` not yet run.
    Created,
    /// `init` completed.
    Initialized,
    /// `start` completed.
    Started,
    /// `stop` ran (successfully or not). Terminal.
    Stopped,
}

impl LifecycleState {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// `Initialized → Stopped` is legal so that a component whose `start`
    /// never ran (or failed) can still release what `init` acquired.
    #[must_use]
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Initialized)
                | (Self::Initialized, Self::Started)
                | (Self::Initialized, Self::Stopped)
                | (Self::Started, Self::Stopped)
        )
    }

    /// Move to `next`, or report the illegal transition.
    pub fn transition(self, next: LifecycleState) -> Result<LifecycleState, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Whether the instance can be handed out to sibling modules.
    #[must_use]
    pub fn is_resolvable(self) -> bool {
        matches!(self, Self::Initialized | Self::Started)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Initialized => write!(f, "Initialized"),
            Self::Started => write!(f, "Started"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// An attempt to enter a phase out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid lifecycle transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Whether a component is a foundational infrastructure or an optional module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Long-lived service (HTTP listener). No sibling lookups.
    Infrastructure,
    /// Optional functionality; may look up siblings during `init`.
    Module,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Module => write!(f, "module"),
        }
    }
}
