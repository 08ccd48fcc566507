//! # Module Registry
//!
//! Lifecycle contract and orchestration for the connector host.
//!
//! ## Components
//!
//! - **Infrastructure**: long-lived service (HTTP listener). Initialized
//!   first, never looks up siblings.
//! - **RuntimeModule**: optional functionality on top of infrastructures
//!   and the event bus. May resolve siblings by name during `init`.
//!
//! Both share one state machine per instance:
//!
//! ```text
//! Created ──init──→ Initialized ──start──→ Started ──stop──→ Stopped
//! ```
//!
//! ## Guarantees
//!
//! - `init_all` / `start_all` run in registration order and stop at the
//!   first failure.
//! - `stop_all` runs in reverse registration order (configurable), visits
//!   every initialized component and never aborts.
//! - Disabled components skip every phase and cannot be resolved.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod component;
pub mod context;
pub mod error;
pub mod registry;

pub use component::{Infrastructure, RuntimeModule};
pub use context::{InfrastructureContext, ModuleContext, RegistryView};
pub use error::{ModuleError, NotFoundReason, Phase, RegistryError};
pub use registry::{
    ComponentStatus, ModuleHandle, ModuleRegistry, RegistryOptions, ShutdownReport, StopFailure,
    StopOrder,
};
