//! # Module Registry
//!
//! Owns every registered component, in registration order.
//!
//! ```text
//!   register ──→ [ httpServer | coreHttpApi | amqpPublisher ]
//!                      │             │              │
//!   init_all   ────────1─────────────2──────────────3───→
//!   start_all  ────────1─────────────2──────────────3───→
//!   stop_all   ←───────3─────────────2──────────────1────   (reverse by default)
//! ```
//!
//! The entry table is locked only to read or update bookkeeping; hooks are
//! always awaited with the lock released, so a module may look up siblings
//! from inside its own `init`.

use crate::component::{Infrastructure, RuntimeModule};
use crate::context::{InfrastructureContext, ModuleContext, RegistryView};
use crate::error::{ModuleError, NotFoundReason, Phase, RegistryError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_bus::EventBus;
use shared_types::{ComponentKind, LifecycleState, ModuleDescriptor};
use std::any::Any;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Order in which `stop_all` walks the registered components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopOrder {
    /// Last registered stops first.
    #[default]
    #[serde(rename = "reverse")]
    ReverseRegistration,
    /// First registered stops first.
    #[serde(rename = "registration")]
    Registration,
}

/// Registry behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    pub stop_order: StopOrder,
}

/// Snapshot of one component's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    pub name: String,
    pub kind: ComponentKind,
    pub enabled: bool,
    pub state: LifecycleState,
}

/// One `stop` hook that failed during shutdown.
#[derive(Debug)]
pub struct StopFailure {
    pub name: String,
    pub error: ModuleError,
}

/// Outcome of `stop_all`. Shutdown never aborts; failures are collected here.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Components whose `stop` ran, in the order it ran.
    pub stopped: Vec<String>,
    /// `stop` hooks that returned an error.
    pub failures: Vec<StopFailure>,
}

impl ShutdownReport {
    /// Whether every `stop` hook succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Typed handle returned at registration.
pub struct ModuleHandle<T> {
    name: String,
    instance: Arc<T>,
}

impl<T> ModuleHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }
}

impl<T> Clone for ModuleHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            instance: Arc::clone(&self.instance),
        }
    }
}

impl<T> Deref for ModuleHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

impl<T> std::fmt::Debug for ModuleHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

#[derive(Clone)]
enum Component {
    Infrastructure(Arc<dyn Infrastructure>),
    Module(Arc<dyn RuntimeModule>),
}

impl Component {
    fn kind(&self) -> ComponentKind {
        match self {
            Self::Infrastructure(_) => ComponentKind::Infrastructure,
            Self::Module(_) => ComponentKind::Module,
        }
    }
}

pub(crate) struct Entry {
    descriptor: Arc<ModuleDescriptor>,
    component: Component,
    instance: Arc<dyn Any + Send + Sync>,
    enabled: bool,
    state: LifecycleState,
}

impl Entry {
    fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub(crate) fn status(&self) -> ComponentStatus {
        ComponentStatus {
            name: self.name().to_string(),
            kind: self.component.kind(),
            enabled: self.enabled,
            state: self.state,
        }
    }
}

/// What a lifecycle pass needs from an entry, copied out of the lock.
struct Pending {
    index: usize,
    descriptor: Arc<ModuleDescriptor>,
    component: Component,
    enabled: bool,
    state: LifecycleState,
}

impl Pending {
    fn name(&self) -> &str {
        self.descriptor.name()
    }
}

/// The registry of modules and infrastructures.
pub struct ModuleRegistry {
    entries: Arc<RwLock<Vec<Entry>>>,
    bus: Arc<EventBus>,
    options: RegistryOptions,
}

impl ModuleRegistry {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_options(bus, RegistryOptions::default())
    }

    pub fn with_options(bus: Arc<EventBus>, options: RegistryOptions) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            bus,
            options,
        }
    }

    /// The event bus shared by every component.
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    /// Register an infrastructure under its descriptor's name.
    pub fn register_infrastructure<T: Infrastructure>(
        &self,
        descriptor: ModuleDescriptor,
        component: T,
    ) -> Result<ModuleHandle<T>, RegistryError> {
        let instance = Arc::new(component);
        let enabled = descriptor.is_enabled() && instance.is_enabled();
        let dynamic: Arc<dyn Infrastructure> = Arc::clone(&instance) as Arc<dyn Infrastructure>;
        self.insert(descriptor, Component::Infrastructure(dynamic), instance, enabled)
    }

    /// Register a module under its descriptor's name.
    pub fn register_module<T: RuntimeModule>(
        &self,
        descriptor: ModuleDescriptor,
        component: T,
    ) -> Result<ModuleHandle<T>, RegistryError> {
        let instance = Arc::new(component);
        let enabled = descriptor.is_enabled() && instance.is_enabled();
        let dynamic: Arc<dyn RuntimeModule> = Arc::clone(&instance) as Arc<dyn RuntimeModule>;
        self.insert(descriptor, Component::Module(dynamic), instance, enabled)
    }

    fn insert<T: Send + Sync + 'static>(
        &self,
        descriptor: ModuleDescriptor,
        component: Component,
        instance: Arc<T>,
        enabled: bool,
    ) -> Result<ModuleHandle<T>, RegistryError> {
        let name = descriptor.name().to_string();
        let kind = component.kind();

        let mut entries = self.entries.write();
        if entries.iter().any(|entry| entry.name() == name) {
            return Err(RegistryError::DuplicateName(name));
        }

        if enabled {
            info!("[Registry] Registering {} '{}'", kind, name);
        } else {
            info!("[Registry] Registering disabled {} '{}'", kind, name);
        }

        entries.push(Entry {
            descriptor: Arc::new(descriptor),
            component,
            instance: Arc::clone(&instance) as Arc<dyn Any + Send + Sync>,
            enabled,
            state: LifecycleState::Created,
        });

        Ok(ModuleHandle { name, instance })
    }

    /// Typed lookup of an enabled component whose `init` has completed.
    pub fn get_by_name<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        let entries = self.entries.read();
        let entry = entries
            .iter()
            .find(|entry| entry.name() == name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
                reason: NotFoundReason::Unregistered,
            })?;

        if !entry.enabled {
            return Err(RegistryError::DependencyDisabled(name.to_string()));
        }
        if !entry.state.is_resolvable() {
            return Err(RegistryError::NotFound {
                name: name.to_string(),
                reason: NotFoundReason::NotInitialized,
            });
        }

        Arc::clone(&entry.instance)
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Run `init` on every enabled component, in registration order.
    ///
    /// The first failure aborts the pass. Components already initialized
    /// stay `Initialized` and remain eligible for `stop_all`.
    pub async fn init_all(&self) -> Result<(), RegistryError> {
        self.advance_all(Phase::Init, LifecycleState::Initialized).await
    }

    /// Run `start` on every enabled component, in registration order.
    ///
    /// The first failure aborts the pass; the failing component stays
    /// `Initialized`.
    pub async fn start_all(&self) -> Result<(), RegistryError> {
        self.advance_all(Phase::Start, LifecycleState::Started).await
    }

    async fn advance_all(&self, phase: Phase, target: LifecycleState) -> Result<(), RegistryError> {
        for pending in self.pending() {
            if !pending.enabled {
                debug!("[Registry] Skipping disabled component '{}'", pending.name());
                continue;
            }

            let next = pending
                .state
                .transition(target)
                .map_err(|source| RegistryError::InvalidTransition {
                    name: pending.name().to_string(),
                    source,
                })?;

            info!("[Registry] Running {} of '{}'", phase, pending.name());

            if let Err(source) = self.run_hook(&pending, phase).await {
                error!(
                    component = pending.name(),
                    error = %source,
                    "[Registry] {} failed",
                    phase
                );
                return Err(RegistryError::Lifecycle {
                    name: pending.name().to_string(),
                    phase,
                    source,
                });
            }

            self.set_state(pending.index, next);
        }
        Ok(())
    }

    /// Run `stop` on every initialized or started component.
    ///
    /// Failures are logged and collected; every eligible component is
    /// attempted and ends up `Stopped`.
    pub async fn stop_all(&self) -> ShutdownReport {
        let mut pending = self.pending();
        if self.options.stop_order == StopOrder::ReverseRegistration {
            pending.reverse();
        }

        let mut report = ShutdownReport::default();
        for pending in pending {
            if !pending.enabled || !pending.state.can_transition_to(LifecycleState::Stopped) {
                debug!(
                    "[Registry] Nothing to stop for '{}' ({})",
                    pending.name(),
                    pending.state
                );
                continue;
            }

            info!("[Registry] Stopping '{}'", pending.name());

            if let Err(error) = self.run_hook(&pending, Phase::Stop).await {
                warn!(
                    component = pending.name(),
                    error = %error,
                    "[Registry] stop failed, continuing shutdown"
                );
                report.failures.push(StopFailure {
                    name: pending.name().to_string(),
                    error,
                });
            }

            self.set_state(pending.index, LifecycleState::Stopped);
            report.stopped.push(pending.name().to_string());
        }
        report
    }

    async fn run_hook(&self, pending: &Pending, phase: Phase) -> Result<(), ModuleError> {
        match &pending.component {
            Component::Infrastructure(component) => {
                let ctx = InfrastructureContext {
                    descriptor: &pending.descriptor,
                    bus: &self.bus,
                };
                match phase {
                    Phase::Init => component.init(&ctx).await,
                    Phase::Start => component.start(&ctx).await,
                    Phase::Stop => component.stop(&ctx).await,
                }
            }
            Component::Module(component) => {
                let ctx = ModuleContext {
                    descriptor: &pending.descriptor,
                    bus: &self.bus,
                    registry: self,
                };
                match phase {
                    Phase::Init => component.init(&ctx).await,
                    Phase::Start => component.start(&ctx).await,
                    Phase::Stop => component.stop(&ctx).await,
                }
            }
        }
    }

    fn pending(&self) -> Vec<Pending> {
        self.entries
            .read()
            .iter()
            .enumerate()
            .map(|(index, entry)| Pending {
                index,
                descriptor: Arc::clone(&entry.descriptor),
                component: entry.component.clone(),
                enabled: entry.enabled,
                state: entry.state,
            })
            .collect()
    }

    fn set_state(&self, index: usize, state: LifecycleState) {
        if let Some(entry) = self.entries.write().get_mut(index) {
            entry.state = state;
        }
    }

    /// Current state of a component, if registered.
    pub fn state_of(&self, name: &str) -> Option<LifecycleState> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.name() == name)
            .map(|entry| entry.state)
    }

    /// Bookkeeping for every component, in registration order.
    pub fn states(&self) -> Vec<ComponentStatus> {
        self.entries.read().iter().map(Entry::status).collect()
    }

    /// A weak read-only view for components that report states later on.
    pub fn view(&self) -> RegistryView {
        RegistryView {
            entries: Arc::downgrade(&self.entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("components", &self.states())
            .field("options", &self.options)
            .finish()
    }
}
