//! # Component Contract
//!
//! Every module and infrastructure implements the same three-phase
//! capability set. The registry calls each phase at most once per instance.

use crate::context::{InfrastructureContext, ModuleContext};
use crate::error::ModuleError;
use async_trait::async_trait;

/// Long-lived service (HTTP listener, ...) that modules build upon.
///
/// Infrastructures cannot look up siblings. Like modules they are driven
/// in registration order, so register them before the modules that use
/// them.
#[async_trait]
pub trait Infrastructure: Send + Sync + 'static {
    /// Extra enable switch on top of the descriptor's `enabled` flag.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn init(&self, ctx: &InfrastructureContext<'_>) -> Result<(), ModuleError>;

    async fn start(&self, ctx: &InfrastructureContext<'_>) -> Result<(), ModuleError>;

    async fn stop(&self, ctx: &InfrastructureContext<'_>) -> Result<(), ModuleError>;
}

/// Optional functionality layered on infrastructures and the event bus.
///
/// `init` is where a module resolves its dependencies through
/// [`ModuleContext::get_by_name`] and registers routes or subscriptions.
#[async_trait]
pub trait RuntimeModule: Send + Sync + 'static {
    /// Extra enable switch on top of the descriptor's `enabled` flag.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn init(&self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError>;

    async fn start(&self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError>;

    async fn stop(&self, ctx: &ModuleContext<'_>) -> Result<(), ModuleError>;
}
