//! # Connector Runtime
//!
//! Hosts the configured infrastructures and modules on one event bus and
//! drives them through their lifecycle.
//!
//! ## Modular Structure
//!
//! - `config` - TOML component list, environment overrides
//! - `factories` - `kind` → constructor map
//! - `core_api` - health, version and documentation endpoints
//! - `runtime` - assembly, bring-up and shutdown
//!
//! ```text
//!   RuntimeConfig ──→ ComponentFactories ──→ ModuleRegistry ──→ init_all ──→ start_all
//!                                                 │                            │
//!                                              EventBus ←──── runtime.started ─┘
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod core_api;
pub mod error;
pub mod factories;
pub mod runtime;

pub use config::{ComponentEntry, ConfigError, RuntimeConfig};
pub use core_api::{CoreHttpApiConfig, CoreHttpApiModule, DocsConfig, CORE_HTTP_API_NAME};
pub use error::RuntimeError;
pub use factories::{ComponentFactories, ComponentFactory};
pub use runtime::{ConnectorRuntime, RUNTIME_STARTED, RUNTIME_STOPPING};
