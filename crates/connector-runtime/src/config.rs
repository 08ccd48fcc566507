//! # Runtime Configuration
//!
//! One TOML file lists the components to run:
//!
//! ```toml
//! [runtime]
//! stop_order = "reverse"
//!
//! [[infrastructure]]
//! name = "httpServer"
//! port = 8080
//!
//! [[modules]]
//! name = "amqpPublisher"
//! enabled = false
//! url = "amqp://localhost"
//! exchange = { name = "connector", type = "fanout" }
//! ```
//!
//! Every key besides `name`, `enabled` and `kind` becomes part of the
//! component's configuration. `kind` picks the factory and defaults to
//! the name.

use module_registry::RegistryOptions;
use serde::Deserialize;
use serde_json::Value;
use shared_types::ModuleDescriptor;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CONNECTOR_CONFIG";
/// Overrides the HTTP server port.
pub const HTTP_PORT_ENV: &str = "CONNECTOR_HTTP_PORT";
/// Overrides the AMQP publisher broker URL.
pub const AMQP_URL_ENV: &str = "CONNECTOR_AMQP_URL";

const CONFIG_FLAG: &str = "--config";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("component '{name}' has unknown kind '{kind}'")]
    UnknownKind { name: String, kind: String },

    #[error("invalid value '{value}' for {variable}")]
    InvalidOverride { variable: &'static str, value: String },

    #[error("missing value after {0}")]
    MissingArgument(&'static str),
}

/// One `[[infrastructure]]` or `[[modules]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentEntry {
    /// Factory key; the component name when absent.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub descriptor: ModuleDescriptor,
}

impl ComponentEntry {
    pub fn new(descriptor: ModuleDescriptor) -> Self {
        Self {
            kind: None,
            descriptor,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or_else(|| self.descriptor.name())
    }
}

/// Whole runtime configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub runtime: RegistryOptions,
    #[serde(default)]
    pub infrastructure: Vec<ComponentEntry>,
    #[serde(default)]
    pub modules: Vec<ComponentEntry>,
}

impl Default for RuntimeConfig {
    /// HTTP server and core API enabled, AMQP publisher disabled.
    fn default() -> Self {
        Self {
            runtime: RegistryOptions::default(),
            infrastructure: vec![ComponentEntry::new(ModuleDescriptor::new("httpServer"))],
            modules: vec![
                ComponentEntry::new(ModuleDescriptor::new("coreHttpApi")),
                ComponentEntry::new(ModuleDescriptor::new("amqpPublisher").enabled(false)),
            ],
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Config for this process: file from `--config` or `CONNECTOR_CONFIG`
    /// (built-in defaults otherwise), then environment overrides.
    pub fn from_env_and_args(args: impl IntoIterator<Item = String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| env::var(key).ok();
        let mut config = match config_path(args, lookup)? {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Apply `CONNECTOR_HTTP_PORT` and `CONNECTOR_AMQP_URL`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(HTTP_PORT_ENV) {
            let port: u16 = raw.parse().map_err(|_| ConfigError::InvalidOverride {
                variable: HTTP_PORT_ENV,
                value: raw.clone(),
            })?;
            for entry in self.entries_of_kind("httpServer") {
                entry.descriptor = entry.descriptor.clone().with("port", port);
            }
        }

        if let Some(url) = lookup(AMQP_URL_ENV) {
            for entry in self.entries_of_kind("amqpPublisher") {
                entry.descriptor = entry.descriptor.clone().with("url", url.clone());
            }
        }
        Ok(())
    }

    fn entries_of_kind<'a>(&'a mut self, kind: &'a str) -> impl Iterator<Item = &'a mut ComponentEntry> {
        self.infrastructure
            .iter_mut()
            .chain(self.modules.iter_mut())
            .filter(move |entry| entry.kind() == kind)
    }

    /// Configuration value of a component, by name and dotted key.
    pub fn value(&self, name: &str, key: &str) -> Option<&Value> {
        self.infrastructure
            .iter()
            .chain(self.modules.iter())
            .find(|entry| entry.name() == name)
            .and_then(|entry| entry.descriptor.get(key))
    }
}

/// Resolve the config file path from `--config <path>` / `--config=<path>`
/// or the `CONNECTOR_CONFIG` variable. The argument wins.
pub fn config_path(
    args: impl IntoIterator<Item = String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<PathBuf>, ConfigError> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == CONFIG_FLAG {
            return args
                .next()
                .map(|path| Some(PathBuf::from(path)))
                .ok_or(ConfigError::MissingArgument(CONFIG_FLAG));
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Ok(Some(PathBuf::from(path)));
        }
    }
    Ok(lookup(CONFIG_ENV).filter(|p| !p.is_empty()).map(PathBuf::from))
}
