//! # Acceptance Event Loop
//!
//! The single writer for admission decisions. One task owns the loop and
//! handles, one at a time:
//!
//! - acceptance requests from `Provider::submit`
//! - completion / failure reports from the execution pipeline
//! - the shutdown signal
//!
//! Because every reservation happens on this task, two proposals never see
//! the same free capacity.
//!
//! ## Admission Pipeline
//!
//! ```text
//! request ─→ duplicate? ─→ filters ─→ reserve funds ─→ reserve storage ─→ save ─→ register ─→ Accepted
//!               │             │             │                 │              │         │
//!               └─ Rejected ──┴─ Rejected ──┴─ Rejected ──────┴─ Rejected    └─ Error ─┘
//!                                                          (funds released) (all released)
//! ```
//!
//! Reports are drained before requests so released capacity is visible to
//! the next admission decision.
//!
//! ## Shutdown
//!
//! The request or report in progress is raced against shutdown. The loop
//! records how far it got, so an interrupted admission releases its
//! reservations and marks any saved record `Failed`, and an interrupted
//! teardown still releases capacity and records its outcome.

use std::sync::Arc;
use std::time::Duration;

use provider_telemetry::{HistogramTimer, ProviderMetrics};
use shared_bus::{DealEvent, EventPublisher};
use shared_types::{Checkpoint, DealId, DealRejection, DealStoreError, DealUpdate, ProviderDealState};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::entities::{
    AcceptDealRequest, AcceptDealResponse, DealOutcome, DealReport, DealReporter,
};
use crate::domain::errors::AcceptanceError;
use crate::domain::filters::{AcceptanceFilter, FilterContext};
use crate::domain::registry::{DealHandler, DealHandlerRegistry};
use crate::domain::transfers::TransferTracker;
use crate::ports::outbound::{
    DealExecutor, DealStore, ExecutionContext, FundManager, ReserveOutcome, StorageManager,
};

/// Upper bound on undoing interrupted work at shutdown.
const SHUTDOWN_CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

const SHUTDOWN_DURING_ADMISSION: &str = "provider shut down during admission";

/// Rejection classes used as the metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RejectClass {
    Duplicate,
    Policy,
    Capacity,
}

impl RejectClass {
    fn as_str(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Policy => "policy",
            Self::Capacity => "capacity",
        }
    }
}

enum Verdict {
    Accept(Arc<DealHandler>),
    Reject(RejectClass, DealRejection),
}

/// Side effects of the request or report being processed.
#[derive(Debug)]
struct InFlight {
    deal_uuid: DealId,
    reserved: bool,
    registered: bool,
    /// Outcome to write to the stored record if processing is cut short.
    record: Option<(Checkpoint, Option<String>)>,
}

impl InFlight {
    fn new(deal_uuid: DealId) -> Self {
        Self {
            deal_uuid,
            reserved: false,
            registered: false,
            record: None,
        }
    }
}

/// External collaborators consulted by the loop.
#[derive(Clone)]
pub struct LoopCollaborators {
    pub store: Arc<dyn DealStore>,
    pub funds: Arc<dyn FundManager>,
    pub storage: Arc<dyn StorageManager>,
    pub executor: Arc<dyn DealExecutor>,
    pub publisher: Arc<dyn EventPublisher>,
}

/// State owned by the acceptance task.
pub struct AcceptanceLoop {
    collaborators: LoopCollaborators,
    filters: Vec<Box<dyn AcceptanceFilter>>,
    registry: Arc<DealHandlerRegistry>,
    transfers: Arc<TransferTracker>,
    reporter: DealReporter,
    metrics: Arc<ProviderMetrics>,
    in_flight: Mutex<Option<InFlight>>,
}

impl AcceptanceLoop {
    pub fn new(
        collaborators: LoopCollaborators,
        filters: Vec<Box<dyn AcceptanceFilter>>,
        registry: Arc<DealHandlerRegistry>,
        transfers: Arc<TransferTracker>,
        reporter: DealReporter,
        metrics: Arc<ProviderMetrics>,
    ) -> Self {
        Self {
            collaborators,
            filters,
            registry,
            transfers,
            reporter,
            metrics,
            in_flight: Mutex::new(None),
        }
    }

    /// Run until `shutdown` fires.
    ///
    /// A request or report being processed when shutdown fires is abandoned
    /// and its partial effects undone; queued requests are dropped, which the
    /// waiting callers observe as shutdown. On exit every handler is closed.
    pub async fn run(
        self,
        mut requests: mpsc::Receiver<AcceptDealRequest>,
        mut reports: mpsc::Receiver<DealReport>,
        shutdown: CancellationToken,
    ) {
        info!(filters = self.filters.len(), "Acceptance loop started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(report) = reports.recv() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {
                            self.abandon_in_flight().await;
                            break;
                        }
                        _ = self.on_report(report) => {
                            self.in_flight.lock().take();
                        }
                    }
                }
                Some(request) = requests.recv() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {
                            self.abandon_in_flight().await;
                            break;
                        }
                        _ = self.on_request(request) => {
                            self.in_flight.lock().take();
                        }
                    }
                }
            }
        }

        requests.close();
        while let Ok(request) = requests.try_recv() {
            debug!(deal_uuid = %request.deal.deal_uuid, "Dropping acceptance request at shutdown");
        }
        self.registry.close_all();
        self.metrics.active_deals.set(0);
        info!("Acceptance loop stopped");
    }

    // =========================================================================
    // ACCEPTANCE
    // =========================================================================

    async fn on_request(&self, request: AcceptDealRequest) {
        let AcceptDealRequest { deal, respond_to } = request;
        let deal_uuid = deal.deal_uuid;
        *self.in_flight.lock() = Some(InFlight::new(deal_uuid));

        let timer = HistogramTimer::new(&self.metrics.admission_duration);
        let (response, handler) = match self.admit(&deal).await {
            Ok(Verdict::Accept(handler)) => (AcceptDealResponse::Accepted, Some(handler)),
            Ok(Verdict::Reject(class, rejection)) => {
                self.metrics
                    .deals_rejected
                    .with_label_values(&[class.as_str()])
                    .inc();
                info!(deal_uuid = %deal_uuid, reason = %rejection, "Deal rejected");
                (AcceptDealResponse::Rejected(rejection), None)
            }
            Err(e) => {
                self.metrics.deals_errored.inc();
                warn!(deal_uuid = %deal_uuid, error = %e, "Deal acceptance failed");
                (AcceptDealResponse::Error(e), None)
            }
        };
        drop(timer);

        if respond_to.send(response).is_err() {
            if handler.is_some() {
                warn!(deal_uuid = %deal_uuid, "Submitter went away before acceptance was delivered");
                self.finish(DealReport {
                    deal_uuid,
                    outcome: DealOutcome::Failed(
                        "submitter went away before acceptance was confirmed".to_string(),
                    ),
                })
                .await;
            }
            return;
        }

        if let Some(handler) = handler {
            self.collaborators.executor.execute(
                deal,
                ExecutionContext {
                    handler,
                    transfers: Arc::clone(&self.transfers),
                    reporter: self.reporter.clone(),
                },
            );
        }
    }

    async fn admit(&self, deal: &ProviderDealState) -> Result<Verdict, AcceptanceError> {
        let deal_uuid = deal.deal_uuid;

        if self.registry.contains(deal_uuid) {
            return Ok(Verdict::Reject(
                RejectClass::Duplicate,
                DealRejection::new(format!("deal {deal_uuid} is already in progress")),
            ));
        }
        match self.collaborators.store.get(deal_uuid).await {
            Ok(_) => {
                return Ok(Verdict::Reject(
                    RejectClass::Duplicate,
                    DealRejection::new(format!("deal {deal_uuid} already exists")),
                ))
            }
            Err(DealStoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let ctx = FilterContext {
            active_deals: self.registry.len(),
        };
        for filter in &self.filters {
            if let Err(rejection) = filter.check(deal, &ctx) {
                debug!(deal_uuid = %deal_uuid, filter = filter.name(), "Deal declined by filter");
                return Ok(Verdict::Reject(RejectClass::Policy, rejection));
            }
        }

        // Funds first, then storage. Anything short of both is released.
        self.track(|f| f.reserved = true);
        if let ReserveOutcome::Declined(reason) = self.collaborators.funds.reserve(deal).await? {
            return Ok(Verdict::Reject(RejectClass::Capacity, DealRejection::new(reason)));
        }
        match self.collaborators.storage.reserve(deal).await {
            Ok(ReserveOutcome::Reserved) => {}
            Ok(ReserveOutcome::Declined(reason)) => {
                self.release_capacity(deal_uuid).await;
                return Ok(Verdict::Reject(RejectClass::Capacity, DealRejection::new(reason)));
            }
            Err(e) => {
                self.release_capacity(deal_uuid).await;
                return Err(e.into());
            }
        }

        self.track(|f| {
            f.record = Some((Checkpoint::Failed, Some(SHUTDOWN_DURING_ADMISSION.to_string())));
        });
        if let Err(e) = self.collaborators.store.save(deal).await {
            self.release_capacity(deal_uuid).await;
            return Err(e.into());
        }

        let handler = match self.registry.register(deal_uuid) {
            Ok(handler) => handler,
            Err(e) => {
                self.release_capacity(deal_uuid).await;
                self.persist_outcome(deal_uuid, Checkpoint::Failed, 0, Some(e.to_string()))
                    .await;
                return Err(e.into());
            }
        };
        self.track(|f| f.registered = true);

        self.collaborators
            .publisher
            .publish(DealEvent::NewDeal(Box::new(deal.clone())))
            .await;
        self.metrics.deals_accepted.inc();
        self.metrics.active_deals.set(self.registry.len() as i64);
        info!(
            deal_uuid = %deal_uuid,
            piece_size = deal.proposal().piece_size,
            client = %deal.proposal().client,
            "Deal accepted"
        );
        Ok(Verdict::Accept(handler))
    }

    // =========================================================================
    // TERMINAL OUTCOMES
    // =========================================================================

    async fn on_report(&self, report: DealReport) {
        self.finish(report).await;
    }

    /// Notify subscribers, drop the handler, release capacity and record the
    /// outcome.
    async fn finish(&self, report: DealReport) {
        let DealReport { deal_uuid, outcome } = report;
        let Ok(handler) = self.registry.get(deal_uuid) else {
            warn!(deal_uuid = %deal_uuid, "Report for a deal that is not tracked");
            return;
        };

        let (checkpoint, error) = match outcome {
            DealOutcome::Completed => (Checkpoint::Complete, None),
            DealOutcome::Failed(e) => (Checkpoint::Failed, Some(e)),
        };

        let bytes_received = self.transfers.get_bytes(deal_uuid);
        let mut update = DealUpdate::new(deal_uuid, checkpoint, bytes_received);
        if let Some(e) = &error {
            update = update.with_error(e.clone());
        }
        handler.publish(update);
        handler.close();
        if error.is_some() {
            handler.cancel();
        }
        *self.in_flight.lock() = Some(InFlight {
            deal_uuid,
            reserved: true,
            registered: false,
            record: Some((checkpoint, error.clone())),
        });
        self.registry.remove(deal_uuid);
        let bytes_received = self.transfers.remove(deal_uuid).max(bytes_received);

        self.release_capacity(deal_uuid).await;
        self.persist_outcome(deal_uuid, checkpoint, bytes_received, error.clone())
            .await;
        self.collaborators
            .publisher
            .publish(DealEvent::DealFinished {
                deal_uuid,
                checkpoint,
                error: error.clone(),
            })
            .await;

        self.metrics.active_deals.set(self.registry.len() as i64);
        match error {
            Some(e) => {
                self.metrics.deals_failed.inc();
                warn!(deal_uuid = %deal_uuid, error = %e, "Deal failed");
            }
            None => {
                self.metrics.deals_completed.inc();
                info!(deal_uuid = %deal_uuid, "Deal completed");
            }
        }
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    fn track(&self, update: impl FnOnce(&mut InFlight)) {
        if let Some(in_flight) = self.in_flight.lock().as_mut() {
            update(in_flight);
        }
    }

    /// Undo the side effects of a request or report cut short by shutdown.
    async fn abandon_in_flight(&self) {
        let Some(in_flight) = self.in_flight.lock().take() else {
            return;
        };
        let InFlight {
            deal_uuid,
            reserved,
            registered,
            record,
        } = in_flight;
        warn!(deal_uuid = %deal_uuid, reserved, registered, "Shutdown interrupted deal processing");

        if registered {
            if let Some(handler) = self.registry.remove(deal_uuid) {
                handler.close();
                handler.cancel();
            }
        }
        let cleanup = async {
            if reserved {
                self.release_capacity(deal_uuid).await;
            }
            if let Some((checkpoint, err)) = record {
                let bytes_received = self.transfers.remove(deal_uuid);
                self.persist_outcome(deal_uuid, checkpoint, bytes_received, err)
                    .await;
            }
        };
        if timeout(SHUTDOWN_CLEANUP_TIMEOUT, cleanup).await.is_err() {
            warn!(deal_uuid = %deal_uuid, "Timed out undoing interrupted deal processing");
        }
    }

    async fn release_capacity(&self, deal_uuid: DealId) {
        if let Err(e) = self.collaborators.funds.release(deal_uuid).await {
            warn!(deal_uuid = %deal_uuid, error = %e, "Failed to release funds");
        }
        if let Err(e) = self.collaborators.storage.release(deal_uuid).await {
            warn!(deal_uuid = %deal_uuid, error = %e, "Failed to release storage");
        }
    }

    async fn persist_outcome(
        &self,
        deal_uuid: DealId,
        checkpoint: Checkpoint,
        bytes_received: u64,
        err: Option<String>,
    ) {
        if let Err(e) = self
            .collaborators
            .store
            .update_checkpoint(deal_uuid, checkpoint, bytes_received, err)
            .await
        {
            warn!(deal_uuid = %deal_uuid, error = %e, "Failed to record deal checkpoint");
        }
    }
}
