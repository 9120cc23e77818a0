//! # Transfer Tracker
//!
//! Per-deal count of bytes received so far.
//!
//! Each deal owns its own `AtomicU64`, so concurrent transfers for different
//! deals only meet on the `DashMap` shard when a counter is first created.
//! Counts never decrease: `add_bytes` saturates at `u64::MAX` and
//! `set_bytes` keeps the larger of the stored and the reported value.
//! Entries live until the deal finishes and `remove` is called.
//!
//! A background refresh task periodically turns the raw counters into
//! `TransferSnapshot`s (bytes plus an observed rate) and logs progress.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use shared_types::DealId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Transfer progress computed by the refresh task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSnapshot {
    pub bytes_received: u64,
    /// Bytes per second since the previous refresh.
    pub rate: f64,
    pub taken_at: Instant,
}

/// Concurrent store of bytes received per deal.
#[derive(Debug, Default)]
pub struct TransferTracker {
    counters: DashMap<DealId, Arc<AtomicU64>>,
    snapshots: DashMap<DealId, TransferSnapshot>,
}

impl TransferTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, deal_uuid: DealId) -> Arc<AtomicU64> {
        if let Some(counter) = self.counters.get(&deal_uuid) {
            return Arc::clone(counter.value());
        }
        Arc::clone(self.counters.entry(deal_uuid).or_default().value())
    }

    /// Bytes received for the deal; zero if nothing was recorded yet.
    #[must_use]
    pub fn get_bytes(&self, deal_uuid: DealId) -> u64 {
        self.counters
            .get(&deal_uuid)
            .map_or(0, |c| c.load(Ordering::Acquire))
    }

    /// Add `n` bytes and return the new total.
    pub fn add_bytes(&self, deal_uuid: DealId, n: u64) -> u64 {
        let counter = self.counter(deal_uuid);
        match counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
            Some(c.saturating_add(n))
        }) {
            Ok(previous) | Err(previous) => previous.saturating_add(n),
        }
    }

    /// Record an absolute byte count. Lower values than the stored count are
    /// ignored. Returns the stored total.
    pub fn set_bytes(&self, deal_uuid: DealId, total: u64) -> u64 {
        let counter = self.counter(deal_uuid);
        let previous = counter.fetch_max(total, Ordering::AcqRel);
        previous.max(total)
    }

    /// Forget a finished deal. Returns the final count.
    pub fn remove(&self, deal_uuid: DealId) -> u64 {
        self.snapshots.remove(&deal_uuid);
        self.counters
            .remove(&deal_uuid)
            .map_or(0, |(_, counter)| counter.load(Ordering::Acquire))
    }

    /// Latest snapshot produced by the refresh task.
    #[must_use]
    pub fn snapshot(&self, deal_uuid: DealId) -> Option<TransferSnapshot> {
        self.snapshots.get(&deal_uuid).map(|s| *s.value())
    }

    /// Number of deals with a counter.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.counters.len()
    }

    /// Recompute snapshots from the counters.
    pub fn refresh(&self) {
        let now = Instant::now();
        for entry in self.counters.iter() {
            let deal_uuid = *entry.key();
            let bytes = entry.value().load(Ordering::Acquire);

            let rate = self.snapshots.get(&deal_uuid).map_or(0.0, |previous| {
                let elapsed = now.duration_since(previous.taken_at).as_secs_f64();
                let delta = bytes.saturating_sub(previous.bytes_received);
                if elapsed > 0.0 {
                    delta as f64 / elapsed
                } else {
                    0.0
                }
            });

            if rate > 0.0 {
                debug!(deal_uuid = %deal_uuid, bytes, rate, "Transfer progress");
            }
            self.snapshots.insert(
                deal_uuid,
                TransferSnapshot {
                    bytes_received: bytes,
                    rate,
                    taken_at: now,
                },
            );
        }
    }

    /// Refresh snapshots every `interval` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        info!(interval_ms = interval.as_millis() as u64, "Transfer tracker started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.refresh(),
            }
        }
        info!("Transfer tracker stopped");
    }
}
