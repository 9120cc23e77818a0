//! # Provider Node Library
//!
//! Exposes the node's configuration, wiring and runtime for testing.
//! The main entry point is the `main.rs` binary.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod container;
pub mod runtime;

pub use container::{ConfigError, NodeConfig};
pub use runtime::NodeRuntime;
