//! Ports layer for the deal provider.
//!
//! - Inbound (Driving) port: API exposed to outer layers
//! - Outbound (Driven) ports: collaborators the provider depends on

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
