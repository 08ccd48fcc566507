//! # Module Descriptors
//!
//! A descriptor is created from external configuration at boot and never
//! mutated afterwards. Its `name` is the identity used for registry lookup.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque key-value configuration of one component.
pub type ModuleConfiguration = serde_json::Map<String, Value>;

fn default_enabled() -> bool {
    true
}

/// Identity, enable flag and configuration of a module or infrastructure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    name: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(flatten)]
    configuration: ModuleConfiguration,
}

impl ModuleDescriptor {
    /// Create an enabled descriptor with an empty configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            configuration: ModuleConfiguration::new(),
        }
    }

    /// Set the enable flag.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Add one configuration entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    /// Replace the whole configuration map.
    #[must_use]
    pub fn with_configuration(mut self, configuration: ModuleConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Unique name of the component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the component takes part in the lifecycle at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Raw configuration map.
    pub fn configuration(&self) -> &ModuleConfiguration {
        &self.configuration
    }

    /// Look up a configuration value by dotted path (`exchange.name`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.configuration.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Look up a non-empty string value by dotted path.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Deserialize the configuration map into a typed configuration struct.
    pub fn parse_configuration<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.configuration.clone()))
    }
}
