//! Middleware stack for the HTTP server.
//!
//! Layer order: Request → Tracing → CORS → ErrorNormalization → Timeout → Handler
//!
//! Normalization wraps the timeout so that elapsed requests are rendered
//! like every other failure; CORS wraps normalization so error responses
//! carry CORS headers too.

pub mod cors;
pub mod normalize;
pub mod timeout;
pub mod tracing;

pub use cors::create_cors_layer;
pub use normalize::ErrorNormalizationLayer;
pub use timeout::TimeoutLayer;
pub use tracing::TracingLayer;
