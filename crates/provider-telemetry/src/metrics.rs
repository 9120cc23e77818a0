//! Prometheus metrics for the storage provider.
//!
//! All metrics follow the naming convention: `sp_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., deals_accepted_total)
//! - **Gauge**: Value that can go up or down (e.g., active deals)
//! - **Histogram**: Distribution of values (e.g., admission decision time)

use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

/// Metrics for one provider instance, registered in their own registry.
pub struct ProviderMetrics {
    registry: Registry,

    // =========================================================================
    // ADMISSION
    // =========================================================================
    /// Deals admitted by the acceptance loop.
    pub deals_accepted: IntCounter,
    /// Deals declined, labelled by `reason` class (validation/policy/capacity).
    pub deals_rejected: IntCounterVec,
    /// Proposals that failed on infrastructure errors.
    pub deals_errored: IntCounter,
    /// Time from loop receipt to verdict.
    pub admission_duration: Histogram,

    // =========================================================================
    // EXECUTION
    // =========================================================================
    /// Deals currently tracked by a handler.
    pub active_deals: IntGauge,
    /// Deals that failed after acceptance.
    pub deals_failed: IntCounter,
    /// Deals that completed.
    pub deals_completed: IntCounter,
    /// Bytes received across all transfers.
    pub transfer_bytes_received: IntCounter,
}

impl ProviderMetrics {
    /// Create and register the metric set.
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let deals_accepted = IntCounter::new(
            "sp_deals_accepted_total",
            "Total number of deals admitted by the acceptance loop",
        )
        .map_err(init_err)?;
        let deals_rejected = IntCounterVec::new(
            Opts::new("sp_deals_rejected_total", "Total number of declined deals"),
            &["reason"], // reason: validation/policy/capacity/duplicate
        )
        .map_err(init_err)?;
        let deals_errored = IntCounter::new(
            "sp_deals_errored_total",
            "Total number of proposals that failed on infrastructure errors",
        )
        .map_err(init_err)?;
        let admission_duration = Histogram::with_opts(
            HistogramOpts::new(
                "sp_admission_duration_seconds",
                "Time spent deciding whether to admit a deal",
            )
            .buckets(exponential_buckets(0.0001, 2.0, 14).map_err(init_err)?),
        )
        .map_err(init_err)?;
        let active_deals = IntGauge::new(
            "sp_deals_active",
            "Number of deals currently tracked by a handler",
        )
        .map_err(init_err)?;
        let deals_failed = IntCounter::new(
            "sp_deals_failed_total",
            "Total number of deals that failed after acceptance",
        )
        .map_err(init_err)?;
        let deals_completed = IntCounter::new(
            "sp_deals_completed_total",
            "Total number of deals that completed",
        )
        .map_err(init_err)?;
        let transfer_bytes_received = IntCounter::new(
            "sp_transfer_bytes_received_total",
            "Total bytes received across all deal transfers",
        )
        .map_err(init_err)?;

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(deals_accepted.clone()),
            Box::new(deals_rejected.clone()),
            Box::new(deals_errored.clone()),
            Box::new(admission_duration.clone()),
            Box::new(active_deals.clone()),
            Box::new(deals_failed.clone()),
            Box::new(deals_completed.clone()),
            Box::new(transfer_bytes_received.clone()),
        ];
        for collector in collectors {
            registry.register(collector).map_err(init_err)?;
        }

        Ok(Self {
            registry,
            deals_accepted,
            deals_rejected,
            deals_errored,
            admission_duration,
            active_deals,
            deals_failed,
            deals_completed,
            transfer_bytes_received,
        })
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(init_err)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}

fn init_err(e: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsInit(e.to_string())
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
