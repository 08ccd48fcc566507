//! Connector host binary.
//!
//! ```text
//! connector [--config <path>]
//! ```
//!
//! Without `--config` the file named by `CONNECTOR_CONFIG` is used, or the
//! built-in defaults when neither is set.

use anyhow::{Context, Result};
use connector_runtime::{ComponentFactories, ConnectorRuntime, RuntimeConfig};
use connector_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(&TelemetryConfig::from_env()).context("Failed to initialize logging")?;

    let config = RuntimeConfig::from_env_and_args(std::env::args().skip(1))
        .context("Failed to load configuration")?;
    let runtime = ConnectorRuntime::from_config(&config, &ComponentFactories::with_lapin())
        .context("Failed to assemble the runtime")?;

    info!("===========================================");
    info!("  Connector Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let report = runtime
        .run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Could not listen for the shutdown signal"),
            }
        })
        .await?;

    if !report.is_clean() {
        warn!(failures = report.failures.len(), "Some components failed to stop");
    }
    Ok(())
}
