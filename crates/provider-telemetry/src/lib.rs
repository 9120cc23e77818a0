//! # Provider Telemetry
//!
//! Observability for the storage provider.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with env filtering and optional JSON
//!   output, installed once by the binary.
//! - **Metrics**: Prometheus counters and gauges owned by one provider
//!   instance and handed to it at construction.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use provider_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let telemetry = init_telemetry(&config)?;
//! let provider = Provider::new(..., telemetry.metrics());
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SP_SERVICE_NAME` | `storage-provider` | Service name in logs |
//! | `SP_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `SP_CONSOLE_OUTPUT` | `true` | Emit logs to stdout |
//! | `SP_JSON_LOGS` | `false` | JSON formatted logs |
//! | `SP_METRICS_INTERVAL` | `15` | Seconds between metrics snapshots |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{HistogramTimer, ProviderMetrics};

use std::sync::Arc;
use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and create the metrics set for one provider.
///
/// Logging is process-wide and may only be installed once; metrics are
/// scoped to the returned handle.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Telemetry, TelemetryError> {
    init_logging(config)?;
    let metrics = Arc::new(ProviderMetrics::new()?);
    tracing::info!(
        service = %config.service_name,
        metrics_interval_secs = config.metrics_interval_secs,
        "Telemetry initialized"
    );
    Ok(Telemetry { metrics })
}

/// Handle returned by `init_telemetry`.
pub struct Telemetry {
    metrics: Arc<ProviderMetrics>,
}

impl Telemetry {
    /// Metrics to inject into the provider.
    #[must_use]
    pub fn metrics(&self) -> Arc<ProviderMetrics> {
        Arc::clone(&self.metrics)
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
