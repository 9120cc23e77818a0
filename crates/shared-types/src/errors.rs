//! # Error Types
//!
//! Defines error types shared across crates.

use thiserror::Error;

use crate::entities::DealId;

/// Errors raised by a deal persistence backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DealStoreError {
    /// No record exists for the deal.
    #[error("deal not found: {0}")]
    NotFound(DealId),

    /// A record already exists for the deal.
    #[error("deal already stored: {0}")]
    AlreadyExists(DealId),

    /// The backend could not be reached or failed the operation.
    #[error("database error: {0}")]
    Database(String),
}
