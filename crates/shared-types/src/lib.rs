//! # Shared Types Crate
//!
//! This crate contains the deal entities exchanged between the provider
//! core, the new-deal bus and the node runtime.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate deal types are defined here.
//! - **Client-Assigned Identity**: A deal is identified by the UUID the client
//!   chose; it never changes once the proposal has been received.
//! - **Pure Data**: No IO and no async; behaviour lives in `deal-provider`.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
