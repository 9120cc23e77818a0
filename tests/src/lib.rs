//! # Storage Provider Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/            # Admission throughput (criterion)
//! └── src/
//!     ├── fixtures.rs     # Deal builders and provider harness
//!     └── integration/    # Cross-crate flows through the public API
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p sp-tests
//!
//! # By category
//! cargo test -p sp-tests integration::acceptance_flows
//! cargo test -p sp-tests integration::lifecycle_flows
//!
//! # Benchmarks
//! cargo bench -p sp-tests
//! ```

pub mod fixtures;
pub mod integration;
