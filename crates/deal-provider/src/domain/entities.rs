//! Messages exchanged between the provider façade, the acceptance loop and
//! the execution pipeline.

use shared_types::{DealId, DealRejection, ProviderDealState};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::domain::errors::AcceptanceError;

/// An in-flight admission inquiry.
///
/// Consumed exactly once by the acceptance loop. Dropping it without
/// responding closes `respond_to`, which the caller reads as shutdown.
#[derive(Debug)]
pub struct AcceptDealRequest {
    pub deal: ProviderDealState,
    pub respond_to: oneshot::Sender<AcceptDealResponse>,
}

/// The loop's verdict on one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptDealResponse {
    /// The deal was admitted and handed to execution.
    Accepted,
    /// The deal was evaluated and declined.
    Rejected(DealRejection),
    /// The deal could not be judged.
    Error(AcceptanceError),
}

/// Result of `submit` when no error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected(DealRejection),
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Rejection reason, if declined.
    #[must_use]
    pub fn rejection(&self) -> Option<&DealRejection> {
        match self {
            Self::Accepted => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Terminal outcome of an admitted deal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealOutcome {
    Completed,
    Failed(String),
}

/// Sent by the execution pipeline when a deal finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealReport {
    pub deal_uuid: DealId,
    pub outcome: DealOutcome,
}

/// Handle the execution pipeline uses to report terminal outcomes back to
/// the acceptance loop.
#[derive(Debug, Clone)]
pub struct DealReporter {
    sender: mpsc::Sender<DealReport>,
}

impl DealReporter {
    pub fn new(sender: mpsc::Sender<DealReport>) -> Self {
        Self { sender }
    }

    /// Report that a deal failed after acceptance.
    pub async fn report_failure(&self, deal_uuid: DealId, error: impl Into<String>) {
        self.send(DealReport {
            deal_uuid,
            outcome: DealOutcome::Failed(error.into()),
        })
        .await;
    }

    /// Report that a deal completed.
    pub async fn report_completed(&self, deal_uuid: DealId) {
        self.send(DealReport {
            deal_uuid,
            outcome: DealOutcome::Completed,
        })
        .await;
    }

    async fn send(&self, report: DealReport) {
        let deal_uuid = report.deal_uuid;
        if self.sender.send(report).await.is_err() {
            // Loop already stopped; the provider is shutting down.
            debug!(deal_uuid = %deal_uuid, "Dropping deal report after shutdown");
        }
    }
}
