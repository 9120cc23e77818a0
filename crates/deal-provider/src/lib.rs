//! # Deal Provider
//!
//! Acceptance and execution core of a storage-deal provider.
//!
//! ## Purpose
//!
//! Receives deal proposals from clients, arbitrates them against the
//! provider's funds and storage under a single point of serialization,
//! tracks each admitted deal's lifecycle and transfer progress, and notifies
//! observers of new deals and state changes.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Admission decisions never race on capacity | `domain/event_loop.rs` - one task owns every reservation |
//! | At most one handler per deal | `domain/registry.rs` - `register()` under the write lock |
//! | Every request gets at most one reply | `domain/entities.rs` - `oneshot` reply channel |
//! | Reservations are all-or-nothing | `domain/event_loop.rs` - funds released when storage declines, partial work undone on shutdown |
//! | Staging file never leaks on decline | `service/mod.rs` - `submit()` removes it on any non-accept |
//! | Byte counts never decrease | `domain/transfers.rs` - saturating `fetch_update` / `fetch_max` |
//! | Listening subscribers never miss an update | `domain/registry.rs` - unbounded per-subscriber queues |
//!
//! ## Deal Lifecycle
//!
//! ```text
//! submit ──validate──→ stage ──→ [loop] ──Accepted──→ execute ──→ Complete
//!    │                              │                    │
//!    └── Rejected (no staging) ─────┴── Rejected/Error   └──→ Failed (cancel, timeout, error)
//!                                      (staging removed)
//! ```
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - in-memory store and capacity managers, local       │
//! │              staging, proposal validator, transfer executor     │
//! │  service/  - Provider orchestrator                              │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - StorageProviderApi trait                   │
//! │  ports/outbound.rs - DealStore, StagingStore, FundManager,      │
//! │                      StorageManager, ProposalValidator,         │
//! │                      DealExecutor                               │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/event_loop.rs - AcceptanceLoop                          │
//! │  domain/registry.rs   - DealHandlerRegistry, DealHandler        │
//! │  domain/transfers.rs  - TransferTracker                         │
//! │  domain/filters.rs    - admission policy filters                │
//! │  domain/config.rs     - ProviderConfig                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let provider = Provider::new(config, adapters, metrics);
//! provider.start().await?;
//! match provider.submit(params).await? {
//!     SubmitOutcome::Accepted => {}
//!     SubmitOutcome::Rejected(rejection) => println!("declined: {rejection}"),
//! }
//! provider.close().await;
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    AcceptanceError, CapacityError, ConfigError, DealHandler, DealHandlerRegistry, DealOutcome,
    DealReport, DealReporter, DealUpdateSubscription, ProviderConfig, ProviderError,
    RegistryError, StagingError, SubmitOutcome, TransferSnapshot, TransferTracker,
    ValidationError,
};
pub use ports::{ReserveOutcome, StorageProviderApi};
pub use service::{Provider, ProviderAdapters};
