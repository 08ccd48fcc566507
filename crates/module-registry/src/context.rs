//! Per-call context handed to lifecycle hooks.

use crate::error::RegistryError;
use crate::registry::{ComponentStatus, Entry, ModuleRegistry};
use parking_lot::RwLock;
use shared_bus::EventBus;
use shared_types::ModuleDescriptor;
use std::any::Any;
use std::sync::{Arc, Weak};

/// Context for infrastructure hooks: own descriptor and the event bus.
pub struct InfrastructureContext<'a> {
    pub(crate) descriptor: &'a ModuleDescriptor,
    pub(crate) bus: &'a Arc<EventBus>,
}

impl<'a> InfrastructureContext<'a> {
    pub fn descriptor(&self) -> &'a ModuleDescriptor {
        self.descriptor
    }

    pub fn bus(&self) -> &'a Arc<EventBus> {
        self.bus
    }
}

/// Context for module hooks: descriptor, event bus and sibling lookup.
pub struct ModuleContext<'a> {
    pub(crate) descriptor: &'a ModuleDescriptor,
    pub(crate) bus: &'a Arc<EventBus>,
    pub(crate) registry: &'a ModuleRegistry,
}

impl<'a> ModuleContext<'a> {
    pub fn descriptor(&self) -> &'a ModuleDescriptor {
        self.descriptor
    }

    pub fn bus(&self) -> &'a Arc<EventBus> {
        self.bus
    }

    /// Typed lookup of an initialized, enabled sibling.
    pub fn get_by_name<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        self.registry.get_by_name::<T>(name)
    }

    /// Read-only view of the registry that may outlive this call.
    pub fn registry_view(&self) -> RegistryView {
        self.registry.view()
    }
}

/// Weak, read-only window on the registry.
///
/// Modules keep one to report component states at request time without
/// holding the registry alive.
#[derive(Clone)]
pub struct RegistryView {
    pub(crate) entries: Weak<RwLock<Vec<Entry>>>,
}

impl RegistryView {
    /// Current component states, empty once the registry is gone.
    pub fn states(&self) -> Vec<ComponentStatus> {
        self.entries
            .upgrade()
            .map(|entries| entries.read().iter().map(Entry::status).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for RegistryView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryView")
            .field("alive", &(self.entries.strong_count() > 0))
            .finish()
    }
}
