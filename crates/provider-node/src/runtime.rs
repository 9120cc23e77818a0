//! Node runtime: owns the provider and the metrics snapshot task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use deal_provider::Provider;
use provider_telemetry::ProviderMetrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::container::{build_provider, NodeConfig};

/// The running storage provider node.
pub struct NodeRuntime {
    provider: Arc<Provider>,
    metrics: Arc<ProviderMetrics>,
    metrics_path: PathBuf,
    metrics_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    snapshot_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl NodeRuntime {
    /// Create a runtime. Fails if the configuration is invalid.
    pub fn new(config: &NodeConfig, metrics: Arc<ProviderMetrics>) -> Result<Self> {
        config.validate().context("Invalid node configuration")?;
        let provider = Arc::new(build_provider(config, Arc::clone(&metrics)));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            provider,
            metrics,
            metrics_path: config.metrics_path(),
            metrics_interval: config.metrics_interval(),
            shutdown_tx,
            snapshot_task: parking_lot::Mutex::new(None),
        })
    }

    /// Start the provider and the periodic metrics snapshot.
    ///
    /// ## Startup Sequence
    ///
    /// 1. Create the repo root
    /// 2. Start the provider (initialises the deal store)
    /// 3. Spawn the metrics snapshot task
    pub async fn start(&self) -> Result<()> {
        if let Some(root) = self.metrics_path.parent() {
            tokio::fs::create_dir_all(root)
                .await
                .with_context(|| format!("Failed to create repo root {}", root.display()))?;
        }

        self.provider
            .start()
            .await
            .context("Failed to start storage provider")?;

        let task = tokio::spawn(snapshot_loop(
            Arc::clone(&self.metrics),
            self.metrics_path.clone(),
            self.metrics_interval,
            self.shutdown_tx.subscribe(),
        ));
        *self.snapshot_task.lock() = Some(task);

        info!(
            metrics_file = %self.metrics_path.display(),
            interval_secs = self.metrics_interval.as_secs(),
            "Node runtime started"
        );
        Ok(())
    }

    /// Shutdown the node gracefully.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Close the provider (joins the acceptance loop)
    /// 2. Stop the snapshot task
    /// 3. Write a final metrics snapshot
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.provider.close().await;

        // Receivers may already be gone if start never ran.
        let _ = self.shutdown_tx.send(true);
        let task = self.snapshot_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Metrics snapshot task ended abnormally");
            }
        }

        if let Err(e) = write_snapshot(&self.metrics, &self.metrics_path).await {
            warn!(error = %e, "Failed to write final metrics snapshot");
        }
        info!("Shutdown complete");
    }

    /// The provider, for transports to submit deals into.
    #[must_use]
    pub fn provider(&self) -> Arc<Provider> {
        Arc::clone(&self.provider)
    }
}

async fn snapshot_loop(
    metrics: Arc<ProviderMetrics>,
    path: PathBuf,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    // The first tick fires immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {
                if let Err(e) = write_snapshot(&metrics, &path).await {
                    warn!(error = %e, "Failed to write metrics snapshot");
                }
            }
        }
    }
}

/// Write the Prometheus text through a temp file so readers never see a
/// partial snapshot.
async fn write_snapshot(metrics: &ProviderMetrics, path: &Path) -> Result<()> {
    let text = metrics.encode()?;
    let tmp = path.with_extension("prom.tmp");
    tokio::fs::write(&tmp, text)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move snapshot to {}", path.display()))?;
    debug!(path = %path.display(), "Wrote metrics snapshot");
    Ok(())
}
