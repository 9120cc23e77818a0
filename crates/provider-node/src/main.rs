//! # Storage Provider Node
//!
//! Long-running storage provider process.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, then `SP_*` environment overrides)
//! 2. Initialize telemetry (logging subscriber, metrics registry)
//! 3. Validate configuration and wire the adapters
//! 4. Start the provider
//! 5. Run until Ctrl-C, then close gracefully

use anyhow::{Context, Result};
use provider_node::{NodeConfig, NodeRuntime};
use provider_telemetry::init_telemetry;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    let telemetry = init_telemetry(&config.telemetry).context("Failed to initialize telemetry")?;

    info!("===========================================");
    info!("  Storage Provider Node v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!(
        address = %config.provider.address,
        peer_id = %config.peer_id,
        repo = %config.repo_root.display(),
        "Loaded configuration"
    );

    let runtime = NodeRuntime::new(&config, telemetry.metrics())?;
    runtime.start().await?;

    info!("Provider is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}
