//! # Shared Bus - New-Deal Broadcast
//!
//! Fans out deal notifications from the acceptance loop to any number of
//! independent observers (API layers, dashboards, indexers).
//!
//! ```text
//! ┌──────────────────┐                    ┌──────────────┐
//! │ Acceptance Loop  │                    │  Observer N  │
//! │                  │    publish()       │              │
//! │                  │ ──────┐            │              │
//! └──────────────────┘       │            └──────────────┘
//!                            ▼                    ↑
//!                      ┌──────────────┐          │
//!                      │  Event Bus   │          │
//!                      │              │ ─────────┘
//!                      └──────────────┘  subscribe()
//! ```
//!
//! ## Delivery Policy
//!
//! - Publishing never blocks: each subscriber owns a bounded slot in a ring
//!   buffer of `capacity` events.
//! - A subscriber that falls more than `capacity` events behind skips the
//!   oldest ones (drop-oldest) and keeps receiving from the newest retained
//!   event onwards. The skip is logged.
//! - Events are delivered in publication order.
//! - Subscribers only see events published after they subscribed.
//! - Publishing with no subscribers is a no-op.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{DealEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events buffered per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
