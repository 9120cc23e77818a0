//! In-memory fund and storage managers.
//!
//! Both keep reservations keyed by deal, so reserving the same deal twice
//! holds capacity once and releasing is idempotent.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{DealId, ProviderDealState, TokenAmount};
use tracing::debug;

use crate::domain::errors::CapacityError;
use crate::ports::outbound::{FundManager, ReserveOutcome, StorageManager};

// =============================================================================
// FUNDS
// =============================================================================

/// Reserves provider collateral plus a flat publishing fee per deal.
#[derive(Debug)]
pub struct InMemoryFundManager {
    balance: TokenAmount,
    publish_fee: TokenAmount,
    reserved: Mutex<HashMap<DealId, TokenAmount>>,
}

impl InMemoryFundManager {
    pub fn new(balance: TokenAmount, publish_fee: TokenAmount) -> Self {
        Self {
            balance,
            publish_fee,
            reserved: Mutex::new(HashMap::new()),
        }
    }

    /// Funds currently held for deals.
    #[must_use]
    pub fn total_reserved(&self) -> TokenAmount {
        self.reserved.lock().values().sum()
    }

    #[must_use]
    pub fn available(&self) -> TokenAmount {
        self.balance.saturating_sub(self.total_reserved())
    }
}

#[async_trait]
impl FundManager for InMemoryFundManager {
    async fn reserve(&self, deal: &ProviderDealState) -> Result<ReserveOutcome, CapacityError> {
        let needed = deal
            .proposal()
            .provider_collateral
            .saturating_add(self.publish_fee);

        let mut reserved = self.reserved.lock();
        if reserved.contains_key(&deal.deal_uuid) {
            return Ok(ReserveOutcome::Reserved);
        }
        let available = self
            .balance
            .saturating_sub(reserved.values().sum::<TokenAmount>());
        if needed > available {
            return Ok(ReserveOutcome::Declined(format!(
                "insufficient funds capacity: deal needs {needed}, {available} available"
            )));
        }
        reserved.insert(deal.deal_uuid, needed);
        debug!(deal_uuid = %deal.deal_uuid, amount = %needed, "Reserved funds");
        Ok(ReserveOutcome::Reserved)
    }

    async fn release(&self, deal_uuid: DealId) -> Result<(), CapacityError> {
        if let Some(amount) = self.reserved.lock().remove(&deal_uuid) {
            debug!(deal_uuid = %deal_uuid, amount = %amount, "Released funds");
        }
        Ok(())
    }
}

// =============================================================================
// STORAGE
// =============================================================================

/// Reserves piece-size bytes of sealing space per deal.
#[derive(Debug)]
pub struct InMemoryStorageManager {
    capacity: u64,
    reserved: Mutex<HashMap<DealId, u64>>,
}

impl InMemoryStorageManager {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            reserved: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn total_reserved(&self) -> u64 {
        self.reserved.lock().values().sum()
    }

    #[must_use]
    pub fn available(&self) -> u64 {
        self.capacity.saturating_sub(self.total_reserved())
    }
}

#[async_trait]
impl StorageManager for InMemoryStorageManager {
    async fn reserve(&self, deal: &ProviderDealState) -> Result<ReserveOutcome, CapacityError> {
        let needed = deal.proposal().piece_size;

        let mut reserved = self.reserved.lock();
        if reserved.contains_key(&deal.deal_uuid) {
            return Ok(ReserveOutcome::Reserved);
        }
        let available = self.capacity.saturating_sub(reserved.values().sum::<u64>());
        if needed > available {
            return Ok(ReserveOutcome::Declined(format!(
                "insufficient storage capacity: piece needs {needed} bytes, {available} available"
            )));
        }
        reserved.insert(deal.deal_uuid, needed);
        debug!(deal_uuid = %deal.deal_uuid, bytes = needed, "Reserved storage");
        Ok(ReserveOutcome::Reserved)
    }

    async fn release(&self, deal_uuid: DealId) -> Result<(), CapacityError> {
        if let Some(bytes) = self.reserved.lock().remove(&deal_uuid) {
            debug!(deal_uuid = %deal_uuid, bytes, "Released storage");
        }
        Ok(())
    }
}
