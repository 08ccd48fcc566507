//! # Component Factories
//!
//! Maps a config entry's `kind` to the code that constructs the component
//! and registers it. Infrastructure and module kinds live in separate
//! namespaces.

use crate::config::{ComponentEntry, ConfigError};
use crate::core_api::{CoreHttpApiModule, CORE_HTTP_API_NAME};
use crate::error::RuntimeError;
use amqp_publisher::{AmqpPublisherModule, BrokerConnector, LapinConnector, AMQP_PUBLISHER_NAME};
use connector_http::{HttpServer, HTTP_SERVER_NAME};
use module_registry::ModuleRegistry;
use shared_types::ModuleDescriptor;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds one component from its descriptor and registers it.
pub type ComponentFactory =
    Box<dyn Fn(&ModuleRegistry, ModuleDescriptor) -> Result<(), RuntimeError> + Send + Sync>;

/// Registered factories, by kind.
#[derive(Default)]
pub struct ComponentFactories {
    infrastructure: HashMap<String, ComponentFactory>,
    modules: HashMap<String, ComponentFactory>,
}

impl ComponentFactories {
    /// No factories at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in components, with `connector` used by the AMQP publisher.
    pub fn builtin(connector: Arc<dyn BrokerConnector>) -> Self {
        let mut factories = Self::empty();

        factories.register_infrastructure(HTTP_SERVER_NAME, |registry, descriptor| {
            let server = HttpServer::from_descriptor(&descriptor)
                .map_err(|e| RuntimeError::build(descriptor.name(), e))?;
            registry.register_infrastructure(descriptor, server)?;
            Ok(())
        });

        factories.register_module(CORE_HTTP_API_NAME, |registry, descriptor| {
            let module = CoreHttpApiModule::from_descriptor(&descriptor)
                .map_err(|e| RuntimeError::build(descriptor.name(), e))?;
            registry.register_module(descriptor, module)?;
            Ok(())
        });

        factories.register_module(AMQP_PUBLISHER_NAME, move |registry, descriptor| {
            let module = AmqpPublisherModule::from_descriptor(&descriptor, Arc::clone(&connector))
                .map_err(|e| RuntimeError::build(descriptor.name(), e))?;
            registry.register_module(descriptor, module)?;
            Ok(())
        });

        factories
    }

    /// Built-in components talking to a real broker.
    pub fn with_lapin() -> Self {
        Self::builtin(Arc::new(LapinConnector::default()))
    }

    pub fn register_infrastructure<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ModuleRegistry, ModuleDescriptor) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        self.infrastructure.insert(kind.into(), Box::new(factory));
        self
    }

    pub fn register_module<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ModuleRegistry, ModuleDescriptor) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        self.modules.insert(kind.into(), Box::new(factory));
        self
    }

    pub(crate) fn build_infrastructure(
        &self,
        registry: &ModuleRegistry,
        entry: &ComponentEntry,
    ) -> Result<(), RuntimeError> {
        build(&self.infrastructure, registry, entry)
    }

    pub(crate) fn build_module(
        &self,
        registry: &ModuleRegistry,
        entry: &ComponentEntry,
    ) -> Result<(), RuntimeError> {
        build(&self.modules, registry, entry)
    }
}

fn build(
    factories: &HashMap<String, ComponentFactory>,
    registry: &ModuleRegistry,
    entry: &ComponentEntry,
) -> Result<(), RuntimeError> {
    let factory = factories
        .get(entry.kind())
        .ok_or_else(|| ConfigError::UnknownKind {
            name: entry.name().to_string(),
            kind: entry.kind().to_string(),
        })?;
    factory(registry, entry.descriptor.clone())
}
