//! # Domain Layer - Deal Provider
//!
//! ## Components
//!
//! - `config`: ProviderConfig and its validation
//! - `entities`: acceptance request/response, deal reports, DealReporter
//! - `errors`: ProviderError and per-concern error enums
//! - `registry`: DealHandlerRegistry, DealHandler, DealUpdateSubscription
//! - `transfers`: TransferTracker
//! - `filters`: admission policy filters
//! - `event_loop`: AcceptanceLoop, the single writer for admission decisions

pub mod config;
pub mod entities;
pub mod errors;
pub mod event_loop;
pub mod filters;
pub mod registry;
pub mod transfers;

pub use config::*;
pub use entities::*;
pub use errors::*;
pub use event_loop::*;
pub use filters::*;
pub use registry::*;
pub use transfers::*;
