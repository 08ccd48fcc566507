//! Runtime errors.

use crate::config::ConfigError;
use module_registry::RegistryError;
use thiserror::Error;

/// Errors raised while assembling or bringing up the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("could not build component '{name}': {source}")]
    Build {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RuntimeError {
    pub fn build(name: &str, source: impl Into<anyhow::Error>) -> Self {
        Self::Build {
            name: name.to_string(),
            source: source.into(),
        }
    }
}
