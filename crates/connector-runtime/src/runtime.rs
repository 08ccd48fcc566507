//! # Connector Runtime
//!
//! ## Startup Sequence
//!
//! 1. Build the event bus and the registry
//! 2. Construct and register infrastructures, then modules, in file order
//! 3. `init_all`, then `start_all`; any failure stops what already runs
//! 4. Publish `runtime.started`
//!
//! ## Shutdown Sequence
//!
//! 1. Publish `runtime.stopping`
//! 2. `stop_all` in the configured order; failures are collected, never fatal

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::factories::ComponentFactories;
use module_registry::{ModuleRegistry, ShutdownReport};
use shared_bus::{Event, EventBus};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Published once every component has started.
pub const RUNTIME_STARTED: &str = "runtime.started";
/// Published right before components are stopped.
pub const RUNTIME_STOPPING: &str = "runtime.stopping";

/// The runtime host: one event bus, one registry.
pub struct ConnectorRuntime {
    bus: Arc<EventBus>,
    registry: ModuleRegistry,
}

impl ConnectorRuntime {
    /// Build and register every configured component.
    pub fn from_config(
        config: &RuntimeConfig,
        factories: &ComponentFactories,
    ) -> Result<Self, RuntimeError> {
        let bus = Arc::new(EventBus::new());
        let registry = ModuleRegistry::with_options(Arc::clone(&bus), config.runtime);

        for entry in &config.infrastructure {
            factories.build_infrastructure(&registry, entry)?;
        }
        for entry in &config.modules {
            factories.build_module(&registry, entry)?;
        }

        info!(
            infrastructure = config.infrastructure.len(),
            modules = config.modules.len(),
            "Connector runtime assembled"
        );
        Ok(Self { bus, registry })
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Initialize and start every enabled component.
    ///
    /// Bring-up is all-or-nothing: on failure everything that reached
    /// `Initialized` or `Started` is stopped before the error is returned.
    pub async fn start(&self) -> Result<(), RuntimeError> {
        let result = match self.registry.init_all().await {
            Ok(()) => self.registry.start_all().await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!(component = e.component(), error = %e, "Bring-up failed, stopping components");
            let report = self.registry.stop_all().await;
            log_report(&report);
            return Err(e.into());
        }

        self.bus.publish(Event::new(RUNTIME_STARTED));
        info!("All components started");
        Ok(())
    }

    /// Stop every running component.
    pub async fn stop(&self) -> ShutdownReport {
        info!("Initiating graceful shutdown...");
        self.bus.publish(Event::new(RUNTIME_STOPPING));

        let report = self.registry.stop_all().await;
        log_report(&report);
        report
    }

    /// Start, wait for `shutdown` to resolve, stop.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<ShutdownReport, RuntimeError>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        Ok(self.stop().await)
    }
}

fn log_report(report: &ShutdownReport) {
    for failure in &report.failures {
        warn!(component = %failure.name, error = %failure.error, "Component failed to stop");
    }
    info!(
        stopped = report.stopped.len(),
        failed = report.failures.len(),
        "Shutdown complete"
    );
}
