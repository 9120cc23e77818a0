//! Default execution pipeline: watches a deal's transfer until all bytes
//! arrive, the deal is cancelled, or the transfer deadline passes.
//!
//! ```text
//! [Accepted] ──bytes arrive──→ [Transferring] ──size reached──→ [Transferred] ──→ Completed
//!      │                              │
//!      └──── cancel / deadline ───────┴──→ Failed
//! ```
//!
//! Bytes are recorded in the `TransferTracker` by the transport; this
//! executor only observes them.

use std::time::Duration;

use shared_types::{Checkpoint, DealUpdate, ProviderDealState};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info};

use crate::ports::outbound::{DealExecutor, ExecutionContext};

/// Failure reason for a cancelled deal.
pub const CANCELLED_REASON: &str = "deal cancelled";

/// Spawns one watcher task per admitted deal.
#[derive(Debug, Clone)]
pub struct TransferWatchExecutor {
    max_transfer_duration: Duration,
    poll_interval: Duration,
}

impl TransferWatchExecutor {
    pub fn new(max_transfer_duration: Duration, poll_interval: Duration) -> Self {
        Self {
            max_transfer_duration,
            poll_interval,
        }
    }
}

impl DealExecutor for TransferWatchExecutor {
    fn execute(&self, deal: ProviderDealState, ctx: ExecutionContext) {
        tokio::spawn(watch_transfer(
            deal,
            ctx,
            self.max_transfer_duration,
            self.poll_interval,
        ));
    }
}

async fn watch_transfer(
    deal: ProviderDealState,
    ctx: ExecutionContext,
    max_transfer_duration: Duration,
    poll_interval: Duration,
) {
    let deal_uuid = deal.deal_uuid;
    let expected = deal.transfer.size;
    let ExecutionContext {
        handler,
        transfers,
        reporter,
    } = ctx;

    handler.publish(DealUpdate::new(deal_uuid, Checkpoint::Accepted, 0));
    debug!(deal_uuid = %deal_uuid, expected, "Waiting for deal data");

    let deadline = sleep(max_transfer_duration);
    tokio::pin!(deadline);
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = handler.cancelled() => {
                info!(deal_uuid = %deal_uuid, "Deal cancelled during transfer");
                reporter.report_failure(deal_uuid, CANCELLED_REASON).await;
                return;
            }
            _ = &mut deadline => {
                let received = transfers.get_bytes(deal_uuid);
                reporter
                    .report_failure(
                        deal_uuid,
                        format!(
                            "transfer timed out after {}s with {received} of {expected} bytes received",
                            max_transfer_duration.as_secs()
                        ),
                    )
                    .await;
                return;
            }
            _ = ticker.tick() => {
                let received = transfers.get_bytes(deal_uuid);
                if received > last_seen {
                    last_seen = received;
                    handler.publish(DealUpdate::new(deal_uuid, Checkpoint::Transferring, received));
                }
                if received >= expected {
                    handler.publish(DealUpdate::new(deal_uuid, Checkpoint::Transferred, received));
                    info!(deal_uuid = %deal_uuid, bytes = received, "Deal data received");
                    reporter.report_completed(deal_uuid).await;
                    return;
                }
            }
        }
    }
}
