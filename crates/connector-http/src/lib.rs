//! # Connector HTTP
//!
//! The `httpServer` infrastructure and the error normalization pipeline
//! every failed request passes through.
//!
//! ```text
//!   request ──→ Tracing ──→ CORS ──→ ErrorNormalization ──→ Timeout ──→ Router
//!                                          │                              │
//!                                          │   Err(HttpFailure)           │
//!                                          │ ←── PendingFailure ext ──────┘
//!                                          ▼
//!                          { "error": { id, code, message, ... } }
//! ```
//!
//! Handlers return `Result<_, HttpFailure>`. Domain errors, protocol errors,
//! JSON rejections and arbitrary `anyhow` errors all convert into
//! `HttpFailure`, which is classified once and rendered by the
//! normalization layer right before the response leaves the server.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod envelope;
pub mod failure;
pub mod middleware;
pub mod normalizer;
pub mod server;

pub use config::{CorsConfig, HttpServerConfig};
pub use envelope::{ErrorEnvelope, NormalizedError};
pub use failure::{ensure_accepts_json, Failure, HttpFailure, JsonBody, ResponseProgress};
pub use normalizer::{normalize, sanitize_status};
pub use server::{build_app, HttpServer, HttpServerError, HTTP_SERVER_NAME};
