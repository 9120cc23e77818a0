//! # Provider Container
//!
//! Configuration and wiring of the default adapters into a `Provider`.
//!
//! The container owns construction only; every collaborator is handed to the
//! provider by value, so nothing here is reachable as process-wide state.

pub mod config;
pub mod wiring;

pub use config::{CapacityConfig, ConfigError, NodeConfig};
pub use wiring::build_provider;
