//! Admission policy filters run by the acceptance loop.
//!
//! Filters see the loop's current view of tracked deals, so they are
//! evaluated under the same serialization as capacity reservation.

use std::collections::HashSet;

use shared_types::{Address, DealRejection, ProviderDealState};

/// Loop state visible to filters.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext {
    /// Deals currently tracked by a handler.
    pub active_deals: usize,
}

/// A policy check on a deal awaiting admission.
pub trait AcceptanceFilter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// `Err` declines the deal with the given reason.
    fn check(&self, deal: &ProviderDealState, ctx: &FilterContext) -> Result<(), DealRejection>;
}

/// Declines deals once `max` deals are in flight.
#[derive(Debug, Clone)]
pub struct MaxActiveDealsFilter {
    max: usize,
}

impl MaxActiveDealsFilter {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl AcceptanceFilter for MaxActiveDealsFilter {
    fn name(&self) -> &'static str {
        "max-active-deals"
    }

    fn check(&self, _deal: &ProviderDealState, ctx: &FilterContext) -> Result<(), DealRejection> {
        if ctx.active_deals >= self.max {
            return Err(DealRejection::new(format!(
                "provider is at its limit of {} active deals",
                self.max
            )));
        }
        Ok(())
    }
}

/// Declines deals from a fixed set of client addresses.
#[derive(Debug, Clone, Default)]
pub struct BlockedClientsFilter {
    blocked: HashSet<Address>,
}

impl BlockedClientsFilter {
    pub fn new(blocked: impl IntoIterator<Item = Address>) -> Self {
        Self {
            blocked: blocked.into_iter().collect(),
        }
    }
}

impl AcceptanceFilter for BlockedClientsFilter {
    fn name(&self) -> &'static str {
        "blocked-clients"
    }

    fn check(&self, deal: &ProviderDealState, _ctx: &FilterContext) -> Result<(), DealRejection> {
        let client = &deal.proposal().client;
        if self.blocked.contains(client) {
            return Err(DealRejection::new(format!(
                "deals from client {client} are not accepted"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::deal_state;

    #[test]
    fn test_max_active_deals() {
        let filter = MaxActiveDealsFilter::new(2);
        let deal = deal_state(2048);
        assert!(filter.check(&deal, &FilterContext { active_deals: 1 }).is_ok());
        let err = filter
            .check(&deal, &FilterContext { active_deals: 2 })
            .unwrap_err();
        assert!(err.reason.contains("limit of 2"));
    }

    #[test]
    fn test_blocked_client() {
        let deal = deal_state(2048);
        let ctx = FilterContext { active_deals: 0 };

        let filter = BlockedClientsFilter::new([deal.proposal().client.clone()]);
        assert!(filter.check(&deal, &ctx).is_err());

        let filter = BlockedClientsFilter::new([Address::new("f1other")]);
        assert!(filter.check(&deal, &ctx).is_ok());
    }
}
