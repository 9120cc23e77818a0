//! Adapters layer for the deal provider.
//!
//! In-process implementations of the outbound ports, used by the node
//! binary and by tests.

pub mod capacity;
pub mod deal_store;
pub mod executor;
pub mod staging;
pub mod validator;

pub use capacity::{InMemoryFundManager, InMemoryStorageManager};
pub use deal_store::InMemoryDealStore;
pub use executor::{TransferWatchExecutor, CANCELLED_REASON};
pub use staging::LocalStagingStore;
pub use validator::BasicProposalValidator;
