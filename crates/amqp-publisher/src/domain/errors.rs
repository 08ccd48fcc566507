//! Broker error types.

use module_registry::ModuleError;
use thiserror::Error;

/// Failures reported by a broker client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("could not connect to the broker: {0}")]
    Connection(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("could not declare exchange '{name}': {reason}")]
    Exchange { name: String, reason: String },

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("close failed: {0}")]
    Close(String),
}

impl From<BrokerError> for ModuleError {
    fn from(err: BrokerError) -> Self {
        ModuleError::Other(err.into())
    }
}
