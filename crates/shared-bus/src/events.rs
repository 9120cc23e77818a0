//! # Deal Events
//!
//! Defines all event types that flow through the shared bus.

use serde::{Deserialize, Serialize};
use shared_types::entities::{Checkpoint, DealId, ProviderDealState};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealEvent {
    /// A deal passed admission and is now tracked by the provider.
    /// Carries a snapshot of the deal state at the moment of acceptance.
    NewDeal(Box<ProviderDealState>),

    /// A tracked deal reached a terminal checkpoint and is no longer tracked.
    DealFinished {
        deal_uuid: DealId,
        /// `Complete` or `Failed`.
        checkpoint: Checkpoint,
        /// Failure description, if the deal failed.
        error: Option<String>,
    },
}

impl DealEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::NewDeal(_) => EventTopic::NewDeals,
            Self::DealFinished { .. } => EventTopic::DealLifecycle,
        }
    }

    /// The deal this event refers to.
    #[must_use]
    pub fn deal_uuid(&self) -> DealId {
        match self {
            Self::NewDeal(state) => state.deal_uuid,
            Self::DealFinished { deal_uuid, .. } => *deal_uuid,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Deal accepted events.
    NewDeals,
    /// Terminal lifecycle events.
    DealLifecycle,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Only deal-accepted events.
    #[must_use]
    pub fn new_deals() -> Self {
        Self::topics(vec![EventTopic::NewDeals])
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &DealEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
