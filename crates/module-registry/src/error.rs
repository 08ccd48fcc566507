//! Registry and component error types.

use shared_types::InvalidTransition;
use std::fmt;
use thiserror::Error;

/// Lifecycle phase a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Start,
    Stop,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Why a lookup by name came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// No component with this name was ever registered.
    Unregistered,
    /// Registered, but `init` has not completed (or it was stopped).
    NotInitialized,
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "not registered"),
            Self::NotInitialized => write!(f, "not initialized"),
        }
    }
}

/// Errors raised by the registry itself.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a component named '{0}' is already registered")]
    DuplicateName(String),

    #[error("component '{name}' {reason}")]
    NotFound { name: String, reason: NotFoundReason },

    #[error("component '{0}' is registered but disabled")]
    DependencyDisabled(String),

    #[error("component '{name}' is not of the requested type {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("component '{name}': {source}")]
    InvalidTransition {
        name: String,
        #[source]
        source: InvalidTransition,
    },

    #[error("{phase} of '{name}' failed: {source}")]
    Lifecycle {
        name: String,
        phase: Phase,
        #[source]
        source: ModuleError,
    },
}

impl RegistryError {
    /// Name of the component the error is about.
    #[must_use]
    pub fn component(&self) -> &str {
        match self {
            Self::DuplicateName(name) | Self::DependencyDisabled(name) => name,
            Self::NotFound { name, .. }
            | Self::TypeMismatch { name, .. }
            | Self::InvalidTransition { name, .. }
            | Self::Lifecycle { name, .. } => name,
        }
    }
}

/// Errors a module or infrastructure returns from a lifecycle hook.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Required configuration is missing or malformed.
    #[error("{0}")]
    Configuration(String),

    /// A sibling lookup failed.
    #[error("dependency lookup failed: {0}")]
    Dependency(#[source] Box<RegistryError>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ModuleError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

impl From<RegistryError> for ModuleError {
    fn from(err: RegistryError) -> Self {
        Self::Dependency(Box::new(err))
    }
}
