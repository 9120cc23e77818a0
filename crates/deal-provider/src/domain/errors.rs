//! Error types for the deal provider.
//!
//! Rejections are not errors: a proposal that is validly evaluated and
//! declined comes back as a `DealRejection`. The enums here cover
//! infrastructure failures, lookups and lifecycle misuse.

use std::path::PathBuf;

use shared_types::{DealId, DealStoreError};
use thiserror::Error;

/// Errors surfaced by the public provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No deal with this identifier is stored or tracked.
    #[error("deal not found: {0}")]
    DealNotFound(DealId),

    /// The staging file for inbound data could not be prepared.
    #[error("staging failed: {0}")]
    Staging(#[from] StagingError),

    /// The deal store failed.
    #[error("persistence failed: {0}")]
    Persistence(DealStoreError),

    /// The acceptance loop could not judge the deal.
    #[error("deal acceptance failed: {0}")]
    Acceptance(#[from] AcceptanceError),

    /// The call was interrupted because the provider is shutting down.
    #[error("provider is shutting down")]
    Shutdown,

    /// `start` has not been called yet.
    #[error("provider has not been started")]
    NotStarted,

    /// `start` was called twice.
    #[error("provider already started")]
    AlreadyStarted,
}

impl ProviderError {
    /// Map a store error, keeping not-found distinct.
    pub(crate) fn from_store(err: DealStoreError) -> Self {
        match err {
            DealStoreError::NotFound(id) => Self::DealNotFound(id),
            other => Self::Persistence(other),
        }
    }
}

/// Infrastructure failure inside the acceptance loop. The deal was never judged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcceptanceError {
    #[error("failed to persist deal: {0}")]
    Persistence(#[from] DealStoreError),

    #[error("capacity manager failed: {0}")]
    Capacity(#[from] CapacityError),

    #[error("failed to register deal handler: {0}")]
    Registry(#[from] RegistryError),
}

/// Deal handler registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a handler is already registered for deal {0}")]
    AlreadyExists(DealId),

    #[error("no handler registered for deal {0}")]
    NotFound(DealId),
}

/// A proposal failed local policy or shape checks.
///
/// The display text is returned to the client as the rejection reason.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("piece size {size} is below the minimum piece size {min}")]
    PieceSizeTooSmall { size: u64, min: u64 },

    #[error("piece size {size} exceeds the maximum piece size {max}")]
    PieceSizeTooLarge { size: u64, max: u64 },

    #[error("storage price per epoch {price} is below the asking price {ask}")]
    PriceBelowAsk { price: u128, ask: u128 },

    #[error("proposal is addressed to provider {got}, expected {expected}")]
    WrongProvider { expected: String, got: String },

    #[error("proposal is missing the client signature")]
    MissingSignature,

    #[error("proposal is missing the piece CID")]
    MissingPieceCid,

    #[error("invalid deal duration: start epoch {start} is not before end epoch {end}")]
    InvalidDuration { start: i64, end: i64 },

    #[error("transfer size {transfer} exceeds piece size {piece}")]
    TransferLargerThanPiece { transfer: u64, piece: u64 },
}

/// A fund or storage manager could not be consulted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapacityError {
    #[error("capacity manager unavailable: {0}")]
    Unavailable(String),
}

/// Staging file failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StagingError {
    #[error("failed to create staging file in {}: {reason}", .dir.display())]
    Create { dir: PathBuf, reason: String },

    #[error("failed to close staging file {}: {reason}", .path.display())]
    Close { path: PathBuf, reason: String },

    #[error("failed to remove staging file {}: {reason}", .path.display())]
    Remove { path: PathBuf, reason: String },
}

/// Invalid provider configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("provider address must not be empty")]
    EmptyAddress,

    #[error("invalid storage ask: {0}")]
    InvalidAsk(String),
}
