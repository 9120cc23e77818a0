//! # Core Deal Entities
//!
//! Defines the storage-deal entities handled by the provider.
//!
//! ## Clusters
//!
//! - **Identity**: `DealId`, `Address`, `PeerId`
//! - **Proposal**: `DealProposal`, `ClientDealProposal`, `Transfer`, `ClientDealParams`
//! - **Tracked State**: `ProviderDealState`, `Checkpoint`, `DealUpdate`
//! - **Provider Terms**: `StorageAsk`, `DealRejection`

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token amounts (attoFIL-style integer units).
pub type TokenAmount = u128;

/// Chain epoch number.
pub type ChainEpoch = i64;

/// One gibibyte.
pub const GIB: u64 = 1024 * 1024 * 1024;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Unique deal identifier, assigned by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DealId(pub Uuid);

impl DealId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DealId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DealId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for DealId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// On-chain actor address (e.g. `f01000`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network peer identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CLUSTER B: PROPOSAL
// =============================================================================

/// The economic terms of a storage deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealProposal {
    /// Content identifier of the piece being stored.
    pub piece_cid: String,
    /// Padded piece size in bytes.
    pub piece_size: u64,
    /// Whether the deal uses verified (datacap) pricing.
    pub verified_deal: bool,
    /// Client wallet address.
    pub client: Address,
    /// Provider actor address.
    pub provider: Address,
    /// Free-form client label.
    pub label: String,
    /// First epoch the data must be stored.
    pub start_epoch: ChainEpoch,
    /// Last epoch the data must be stored.
    pub end_epoch: ChainEpoch,
    /// Price per epoch for the whole piece.
    pub storage_price_per_epoch: TokenAmount,
    /// Collateral locked by the provider.
    pub provider_collateral: TokenAmount,
    /// Collateral locked by the client.
    pub client_collateral: TokenAmount,
}

impl DealProposal {
    /// Number of epochs the deal runs for.
    #[must_use]
    pub fn duration(&self) -> ChainEpoch {
        self.end_epoch - self.start_epoch
    }

    /// Total storage fee over the deal duration (saturating).
    #[must_use]
    pub fn total_storage_fee(&self) -> TokenAmount {
        let epochs = u128::try_from(self.duration().max(0)).unwrap_or(0);
        self.storage_price_per_epoch.saturating_mul(epochs)
    }
}

/// A deal proposal together with the client's signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDealProposal {
    pub proposal: DealProposal,
    pub client_signature: Vec<u8>,
}

/// Describes how deal bytes will reach the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Transport kind (e.g. `http`, `libp2p`).
    pub kind: String,
    /// Transport-specific parameters, opaque to the core.
    pub params: Vec<u8>,
    /// Number of bytes the client will send.
    pub size: u64,
}

/// Everything a client sends when proposing a deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDealParams {
    pub deal_uuid: DealId,
    pub client_deal_proposal: ClientDealProposal,
    /// Root CID of the data being stored.
    pub deal_data_root: String,
    pub transfer: Transfer,
    pub miner_peer_id: PeerId,
    pub client_peer_id: PeerId,
}

// =============================================================================
// CLUSTER C: TRACKED STATE
// =============================================================================

/// Lifecycle position of an admitted deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Checkpoint {
    /// Admitted by the acceptance loop; waiting for data.
    Accepted,
    /// Bytes are arriving.
    Transferring,
    /// All bytes received.
    Transferred,
    /// Deal finished successfully.
    Complete,
    /// Deal failed after acceptance.
    Failed,
}

impl Checkpoint {
    /// Whether no further transitions can happen.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "Accepted",
            Self::Transferring => "Transferring",
            Self::Transferred => "Transferred",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// The provider's record of one proposed or accepted deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDealState {
    pub deal_uuid: DealId,
    pub client_deal_proposal: ClientDealProposal,
    pub self_peer_id: PeerId,
    pub client_peer_id: PeerId,
    pub deal_data_root: String,
    pub transfer: Transfer,
    /// Staging file for inbound bytes; empty until allocated.
    pub inbound_file_path: PathBuf,
    pub checkpoint: Checkpoint,
    /// Bytes received as of the last recorded checkpoint.
    #[serde(default)]
    pub bytes_received: u64,
    pub created_at: DateTime<Utc>,
    /// Failure description once the deal has failed.
    pub err: Option<String>,
}

impl ProviderDealState {
    /// Build the initial state for freshly received deal parameters.
    #[must_use]
    pub fn from_params(params: ClientDealParams) -> Self {
        Self {
            deal_uuid: params.deal_uuid,
            client_deal_proposal: params.client_deal_proposal,
            self_peer_id: params.miner_peer_id,
            client_peer_id: params.client_peer_id,
            deal_data_root: params.deal_data_root,
            transfer: params.transfer,
            inbound_file_path: PathBuf::new(),
            checkpoint: Checkpoint::Accepted,
            bytes_received: 0,
            created_at: Utc::now(),
            err: None,
        }
    }

    /// Shorthand for the inner proposal terms.
    #[must_use]
    pub fn proposal(&self) -> &DealProposal {
        &self.client_deal_proposal.proposal
    }
}

/// One lifecycle notification for a tracked deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealUpdate {
    pub deal_uuid: DealId,
    pub checkpoint: Checkpoint,
    pub bytes_received: u64,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl DealUpdate {
    pub fn new(deal_uuid: DealId, checkpoint: Checkpoint, bytes_received: u64) -> Self {
        Self {
            deal_uuid,
            checkpoint,
            bytes_received,
            error: None,
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

// =============================================================================
// CLUSTER D: PROVIDER TERMS
// =============================================================================

/// The provider's advertised terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAsk {
    pub price: TokenAmount,
    pub verified_price: TokenAmount,
    pub min_piece_size: u64,
    pub max_piece_size: u64,
    pub miner: Address,
}

impl StorageAsk {
    /// Default ask for a provider address: unit prices, pieces up to 64 GiB.
    pub fn default_for(miner: Address) -> Self {
        Self {
            price: 1,
            verified_price: 1,
            min_piece_size: 0,
            max_piece_size: 64 * GIB,
            miner,
        }
    }
}

/// A validly evaluated decline, returned to the client instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRejection {
    pub reason: String,
}

impl DealRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DealRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}
