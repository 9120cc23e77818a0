//! Provider orchestrator.
//!
//! Public entry point wiring the acceptance loop, handler registry,
//! transfer tracker and new-deal bus to the outbound adapters.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use provider_telemetry::ProviderMetrics;
use shared_bus::{EventFilter, EventStream, InMemoryEventBus, Subscription};
use shared_types::{ClientDealParams, DealId, DealRejection, ProviderDealState, StorageAsk};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{
    AcceptDealRequest, AcceptDealResponse, AcceptanceFilter, AcceptanceLoop, BlockedClientsFilter,
    DealHandlerRegistry, DealReport, DealReporter, DealUpdateSubscription, LoopCollaborators,
    MaxActiveDealsFilter, ProviderConfig, ProviderError, RegistryError, SubmitOutcome,
    TransferTracker, ValidationError,
};
use crate::ports::inbound::StorageProviderApi;
use crate::ports::outbound::{
    DealExecutor, DealStore, FundManager, ProposalValidator, StagingStore, StorageManager,
};

/// Outbound collaborators injected into the provider.
#[derive(Clone)]
pub struct ProviderAdapters {
    pub store: Arc<dyn DealStore>,
    pub staging: Arc<dyn StagingStore>,
    pub funds: Arc<dyn FundManager>,
    pub storage: Arc<dyn StorageManager>,
    pub validator: Arc<dyn ProposalValidator>,
    pub executor: Arc<dyn DealExecutor>,
}

/// Receivers handed to the acceptance loop on `start`.
struct LoopChannels {
    requests: mpsc::Receiver<AcceptDealRequest>,
    reports: mpsc::Receiver<DealReport>,
}

/// The storage provider.
pub struct Provider {
    config: ProviderConfig,
    ask: StorageAsk,
    adapters: ProviderAdapters,
    registry: Arc<DealHandlerRegistry>,
    transfers: Arc<TransferTracker>,
    bus: Arc<InMemoryEventBus>,
    metrics: Arc<ProviderMetrics>,
    accept_tx: mpsc::Sender<AcceptDealRequest>,
    report_tx: mpsc::Sender<DealReport>,
    channels: Mutex<Option<LoopChannels>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
    started: AtomicBool,
    closed: AtomicBool,
}

impl Provider {
    /// Create a provider. Nothing runs until `start`.
    pub fn new(
        config: ProviderConfig,
        adapters: ProviderAdapters,
        metrics: Arc<ProviderMetrics>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let (accept_tx, accept_rx) = mpsc::channel(config.accept_queue_depth.max(1));
        let (report_tx, report_rx) = mpsc::channel(config.failure_queue_depth.max(1));

        Self {
            ask: config.ask(),
            registry: Arc::new(DealHandlerRegistry::new(shutdown.clone())),
            transfers: Arc::new(TransferTracker::new()),
            bus: Arc::new(InMemoryEventBus::with_capacity(config.new_deal_buffer)),
            metrics,
            accept_tx,
            report_tx,
            channels: Mutex::new(Some(LoopChannels {
                requests: accept_rx,
                reports: report_rx,
            })),
            tasks: Mutex::new(Vec::new()),
            shutdown,
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            adapters,
            config,
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Initialise the deal store, then launch the acceptance loop and the
    /// transfer tracker refresh task.
    pub async fn start(&self) -> Result<(), ProviderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProviderError::Shutdown);
        }
        let Some(channels) = self.channels.lock().take() else {
            return Err(ProviderError::AlreadyStarted);
        };

        if let Err(e) = self.adapters.store.init().await {
            // Allow a retry.
            *self.channels.lock() = Some(channels);
            return Err(ProviderError::Persistence(e));
        }

        let event_loop = AcceptanceLoop::new(
            LoopCollaborators {
                store: Arc::clone(&self.adapters.store),
                funds: Arc::clone(&self.adapters.funds),
                storage: Arc::clone(&self.adapters.storage),
                executor: Arc::clone(&self.adapters.executor),
                publisher: self.bus.clone(),
            },
            self.filters(),
            Arc::clone(&self.registry),
            Arc::clone(&self.transfers),
            DealReporter::new(self.report_tx.clone()),
            Arc::clone(&self.metrics),
        );

        // `close` marks the provider closed before taking the task list, so
        // checking under the lock means it either joins these tasks or this
        // start backs out.
        let mut tasks = self.tasks.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(ProviderError::Shutdown);
        }
        tasks.push(tokio::spawn(event_loop.run(
            channels.requests,
            channels.reports,
            self.shutdown.clone(),
        )));
        tasks.push(tokio::spawn(Arc::clone(&self.transfers).run(
            self.config.transfer_refresh_interval,
            self.shutdown.clone(),
        )));
        drop(tasks);

        self.started.store(true, Ordering::Release);
        info!(provider = %self.config.address, "Storage provider started");
        Ok(())
    }

    fn filters(&self) -> Vec<Box<dyn AcceptanceFilter>> {
        let mut filters: Vec<Box<dyn AcceptanceFilter>> = Vec::new();
        if let Some(max) = self.config.max_active_deals {
            filters.push(Box::new(MaxActiveDealsFilter::new(max)));
        }
        if !self.config.blocked_clients.is_empty() {
            filters.push(Box::new(BlockedClientsFilter::new(
                self.config.blocked_clients.iter().cloned(),
            )));
        }
        filters
    }

    /// Stop the background tasks and wait for them to exit.
    ///
    /// Blocked `submit` calls return `ProviderError::Shutdown`. Only the first
    /// call waits; later calls return immediately.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Storage provider closing");
        self.shutdown.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Provider task ended abnormally");
            }
        }
        self.bus.close();
        info!("Storage provider closed");
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Validate, stage and submit a deal for admission.
    pub async fn submit(&self, params: ClientDealParams) -> Result<SubmitOutcome, ProviderError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(ProviderError::NotStarted);
        }
        if self.shutdown.is_cancelled() {
            return Err(ProviderError::Shutdown);
        }

        let mut deal = ProviderDealState::from_params(params);
        let deal_uuid = deal.deal_uuid;
        debug!(deal_uuid = %deal_uuid, "Received deal proposal");

        if let Err(e) = self.validate(&deal).await {
            self.metrics
                .deals_rejected
                .with_label_values(&["validation"])
                .inc();
            info!(deal_uuid = %deal_uuid, reason = %e, "Deal proposal failed validation");
            return Ok(SubmitOutcome::Rejected(DealRejection::new(e.to_string())));
        }

        let staging_file = self.adapters.staging.create_staging_file().await?;
        let path = staging_file.path().to_path_buf();
        if let Err(e) = self.adapters.staging.close(staging_file).await {
            self.remove_staging_file(deal_uuid, &path).await;
            return Err(e.into());
        }
        deal.inbound_file_path = path.clone();

        let outcome = self.check_for_acceptance(deal).await;
        if !matches!(outcome, Ok(SubmitOutcome::Accepted)) {
            self.remove_staging_file(deal_uuid, &path).await;
        }
        outcome
    }

    /// Local checks that need no coordination with the loop.
    async fn validate(&self, deal: &ProviderDealState) -> Result<(), ValidationError> {
        let proposal = deal.proposal();

        if proposal.piece_size < self.ask.min_piece_size {
            return Err(ValidationError::PieceSizeTooSmall {
                size: proposal.piece_size,
                min: self.ask.min_piece_size,
            });
        }
        if proposal.piece_size > self.ask.max_piece_size {
            return Err(ValidationError::PieceSizeTooLarge {
                size: proposal.piece_size,
                max: self.ask.max_piece_size,
            });
        }
        if deal.transfer.size > proposal.piece_size {
            return Err(ValidationError::TransferLargerThanPiece {
                transfer: deal.transfer.size,
                piece: proposal.piece_size,
            });
        }

        let ask_price = if proposal.verified_deal {
            self.ask.verified_price
        } else {
            self.ask.price
        };
        if proposal.storage_price_per_epoch < ask_price {
            return Err(ValidationError::PriceBelowAsk {
                price: proposal.storage_price_per_epoch,
                ask: ask_price,
            });
        }

        self.adapters
            .validator
            .validate(&deal.client_deal_proposal)
            .await
    }

    /// Hand the deal to the loop and wait for its verdict or shutdown.
    async fn check_for_acceptance(
        &self,
        deal: ProviderDealState,
    ) -> Result<SubmitOutcome, ProviderError> {
        let (respond_to, mut response) = oneshot::channel();
        let request = AcceptDealRequest { deal, respond_to };

        tokio::select! {
            biased;
            sent = self.accept_tx.send(request) => sent.map_err(|_| ProviderError::Shutdown)?,
            _ = self.shutdown.cancelled() => return Err(ProviderError::Shutdown),
        }

        let response = tokio::select! {
            biased;
            received = &mut response => received.map_err(|_| ProviderError::Shutdown)?,
            _ = self.shutdown.cancelled() => return Err(ProviderError::Shutdown),
        };

        match response {
            AcceptDealResponse::Accepted => Ok(SubmitOutcome::Accepted),
            AcceptDealResponse::Rejected(rejection) => Ok(SubmitOutcome::Rejected(rejection)),
            AcceptDealResponse::Error(e) => Err(ProviderError::Acceptance(e)),
        }
    }

    async fn remove_staging_file(&self, deal_uuid: DealId, path: &Path) {
        if let Err(e) = self.adapters.staging.remove(path).await {
            warn!(deal_uuid = %deal_uuid, error = %e, "Failed to remove staging file");
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// The stored record for a deal.
    pub async fn deal(&self, deal_uuid: DealId) -> Result<ProviderDealState, ProviderError> {
        self.adapters
            .store
            .get(deal_uuid)
            .await
            .map_err(ProviderError::from_store)
    }

    /// Bytes received so far for a deal in flight; zero if unknown or finished.
    #[must_use]
    pub fn transfer_progress(&self, deal_uuid: DealId) -> u64 {
        self.transfers.get_bytes(deal_uuid)
    }

    /// Bytes received so far for `deal`. Finished deals report the count
    /// recorded on their stored state.
    #[must_use]
    pub fn nbytes_received(&self, deal: &ProviderDealState) -> u64 {
        self.transfer_progress(deal.deal_uuid).max(deal.bytes_received)
    }

    /// Record `n` more bytes received for a deal. Called by the transport.
    pub fn record_transfer_bytes(&self, deal_uuid: DealId, n: u64) -> u64 {
        self.metrics.transfer_bytes_received.inc_by(n);
        self.transfers.add_bytes(deal_uuid, n)
    }

    #[must_use]
    pub fn storage_ask(&self) -> StorageAsk {
        self.ask.clone()
    }

    // =========================================================================
    // SUBSCRIPTIONS & CANCELLATION
    // =========================================================================

    /// Live feed of newly admitted deals.
    pub fn subscribe_new_deals(&self) -> Subscription {
        self.bus.subscribe(EventFilter::new_deals())
    }

    /// Newly admitted deals as a `Stream`.
    pub fn new_deal_stream(&self) -> EventStream {
        self.bus.event_stream(EventFilter::new_deals())
    }

    /// Every bus event: new deals and terminal outcomes.
    pub fn subscribe_lifecycle(&self) -> Subscription {
        self.bus.subscribe(EventFilter::all())
    }

    /// Ordered updates for a tracked deal.
    pub fn subscribe_deal_updates(
        &self,
        deal_uuid: DealId,
    ) -> Result<DealUpdateSubscription, ProviderError> {
        self.registry
            .subscribe(deal_uuid)
            .map_err(|_| ProviderError::DealNotFound(deal_uuid))
    }

    /// Cancel a tracked deal. Unknown or finished deals succeed.
    pub fn cancel_deal(&self, deal_uuid: DealId) -> Result<(), ProviderError> {
        match self.registry.cancel(deal_uuid) {
            Ok(()) => info!(deal_uuid = %deal_uuid, "Deal cancellation requested"),
            // Already finished or never admitted.
            Err(RegistryError::NotFound(_)) => {
                debug!(deal_uuid = %deal_uuid, "Cancel for untracked deal ignored");
            }
            Err(e) => return Err(ProviderError::Acceptance(e.into())),
        }
        Ok(())
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<ProviderMetrics> {
        Arc::clone(&self.metrics)
    }

    #[must_use]
    pub fn transfers(&self) -> Arc<TransferTracker> {
        Arc::clone(&self.transfers)
    }

    /// Number of deals currently tracked by a handler.
    #[must_use]
    pub fn active_deals(&self) -> usize {
        self.registry.len()
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        // Stop background tasks if `close` was never awaited.
        self.shutdown.cancel();
    }
}

#[async_trait]
impl StorageProviderApi for Provider {
    async fn submit(&self, params: ClientDealParams) -> Result<SubmitOutcome, ProviderError> {
        Provider::submit(self, params).await
    }

    async fn deal(&self, deal_uuid: DealId) -> Result<ProviderDealState, ProviderError> {
        Provider::deal(self, deal_uuid).await
    }

    fn transfer_progress(&self, deal_uuid: DealId) -> u64 {
        Provider::transfer_progress(self, deal_uuid)
    }

    fn subscribe_new_deals(&self) -> Subscription {
        Provider::subscribe_new_deals(self)
    }

    fn subscribe_deal_updates(
        &self,
        deal_uuid: DealId,
    ) -> Result<DealUpdateSubscription, ProviderError> {
        Provider::subscribe_deal_updates(self, deal_uuid)
    }

    fn cancel_deal(&self, deal_uuid: DealId) -> Result<(), ProviderError> {
        Provider::cancel_deal(self, deal_uuid)
    }

    fn storage_ask(&self) -> StorageAsk {
        Provider::storage_ask(self)
    }
}
