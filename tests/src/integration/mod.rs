//! # Integration Flows
//!
//! Cross-crate flows driven through the public provider API.
//!
//! - `acceptance_flows` - admission under contention, rejection cleanup,
//!   shutdown while submissions are blocked
//! - `lifecycle_flows` - failure reports, completion, subscriptions and the
//!   node runtime

pub mod acceptance_flows;
pub mod lifecycle_flows;
