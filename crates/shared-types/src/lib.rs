//! # Shared Types Crate
//!
//! Types every component of the connector host agrees on.
//!
//! ## Contents
//!
//! - **Descriptors**: `ModuleDescriptor` is the immutable, loaded-at-boot
//!   identity and configuration of one module or infrastructure.
//! - **Lifecycle**: `LifecycleState` is the monotonic
//!   `Created → Initialized → Started → Stopped` state machine.
//! - **Errors**: `DomainError` (stable application error codes, including the
//!   record-not-found sentinels) and `ProtocolError` (lower-level request
//!   failures carrying their own HTTP status).

pub mod descriptor;
pub mod errors;
pub mod lifecycle;

pub use descriptor::{ModuleConfiguration, ModuleDescriptor};
pub use errors::{sentinels, DomainError, ProtocolError};
pub use lifecycle::{ComponentKind, InvalidTransition, LifecycleState};
