//! Outbound (Driven) ports for the deal provider.
//!
//! These traits define the collaborators the provider depends on:
//! persistence, staging storage, capacity managers, proposal validation and
//! the execution pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{
    Checkpoint, ClientDealProposal, DealId, DealStoreError, ProviderDealState,
};

use crate::domain::entities::DealReporter;
use crate::domain::errors::{CapacityError, StagingError, ValidationError};
use crate::domain::registry::DealHandler;
use crate::domain::transfers::TransferTracker;

/// Persistent store of deal records.
#[async_trait]
pub trait DealStore: Send + Sync {
    /// Prepare the schema. Called once by `start`.
    async fn init(&self) -> Result<(), DealStoreError>;

    /// Insert a new deal record.
    async fn save(&self, deal: &ProviderDealState) -> Result<(), DealStoreError>;

    /// Fetch a deal record.
    async fn get(&self, deal_uuid: DealId) -> Result<ProviderDealState, DealStoreError>;

    /// Record a deal's latest checkpoint, byte count and error.
    async fn update_checkpoint(
        &self,
        deal_uuid: DealId,
        checkpoint: Checkpoint,
        bytes_received: u64,
        err: Option<String>,
    ) -> Result<(), DealStoreError>;
}

/// A freshly created staging file, still open.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
    file: tokio::fs::File,
}

impl StagingFile {
    pub fn new(path: PathBuf, file: tokio::fs::File) -> Self {
        Self { path, file }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the open handle.
    pub fn into_file(self) -> tokio::fs::File {
        self.file
    }
}

/// Local storage for inbound deal bytes.
#[async_trait]
pub trait StagingStore: Send + Sync {
    async fn create_staging_file(&self) -> Result<StagingFile, StagingError>;

    /// Flush and close the handle. The file stays on disk.
    async fn close(&self, file: StagingFile) -> Result<(), StagingError>;

    /// Delete a staging file. Removing a missing file succeeds.
    async fn remove(&self, path: &Path) -> Result<(), StagingError>;
}

/// Answer from a capacity manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    /// Not enough capacity; carries the reason given to the client.
    Declined(String),
}

/// Holds provider funds (collateral and publishing fees) for admitted deals.
#[async_trait]
pub trait FundManager: Send + Sync {
    /// Reserve everything the deal needs, or nothing.
    async fn reserve(&self, deal: &ProviderDealState) -> Result<ReserveOutcome, CapacityError>;

    /// Release the deal's reservation. Releasing twice, or releasing a deal
    /// with no reservation, succeeds.
    async fn release(&self, deal_uuid: DealId) -> Result<(), CapacityError>;
}

/// Holds sealing storage space for admitted deals.
#[async_trait]
pub trait StorageManager: Send + Sync {
    /// Reserve space for the deal's piece, or nothing.
    async fn reserve(&self, deal: &ProviderDealState) -> Result<ReserveOutcome, CapacityError>;

    /// Release the deal's reservation. Idempotent.
    async fn release(&self, deal_uuid: DealId) -> Result<(), CapacityError>;
}

/// Signature, identity and collateral checks on a proposal.
#[async_trait]
pub trait ProposalValidator: Send + Sync {
    async fn validate(&self, proposal: &ClientDealProposal) -> Result<(), ValidationError>;
}

/// What the execution pipeline receives for an admitted deal.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub handler: Arc<DealHandler>,
    pub transfers: Arc<TransferTracker>,
    pub reporter: DealReporter,
}

/// Drives an admitted deal to completion.
///
/// `execute` is called from the acceptance loop and must return promptly;
/// implementations spawn their own work and finish by reporting through
/// `ctx.reporter`.
pub trait DealExecutor: Send + Sync {
    fn execute(&self, deal: ProviderDealState, ctx: ExecutionContext);
}
