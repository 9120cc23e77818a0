//! In-memory deal store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Checkpoint, DealId, DealStoreError, ProviderDealState};

use crate::ports::outbound::DealStore;

/// Deal records kept in a map. Operations fail until `init` has run.
#[derive(Debug, Default)]
pub struct InMemoryDealStore {
    deals: RwLock<HashMap<DealId, ProviderDealState>>,
    initialized: AtomicBool,
}

impl InMemoryDealStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deals.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deals.read().is_empty()
    }

    fn ensure_initialized(&self) -> Result<(), DealStoreError> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DealStoreError::Database("deal tables not created".to_string()))
        }
    }
}

#[async_trait]
impl DealStore for InMemoryDealStore {
    async fn init(&self) -> Result<(), DealStoreError> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn save(&self, deal: &ProviderDealState) -> Result<(), DealStoreError> {
        self.ensure_initialized()?;
        let mut deals = self.deals.write();
        if deals.contains_key(&deal.deal_uuid) {
            return Err(DealStoreError::AlreadyExists(deal.deal_uuid));
        }
        deals.insert(deal.deal_uuid, deal.clone());
        Ok(())
    }

    async fn get(&self, deal_uuid: DealId) -> Result<ProviderDealState, DealStoreError> {
        self.ensure_initialized()?;
        self.deals
            .read()
            .get(&deal_uuid)
            .cloned()
            .ok_or(DealStoreError::NotFound(deal_uuid))
    }

    async fn update_checkpoint(
        &self,
        deal_uuid: DealId,
        checkpoint: Checkpoint,
        bytes_received: u64,
        err: Option<String>,
    ) -> Result<(), DealStoreError> {
        self.ensure_initialized()?;
        let mut deals = self.deals.write();
        let deal = deals
            .get_mut(&deal_uuid)
            .ok_or(DealStoreError::NotFound(deal_uuid))?;
        deal.checkpoint = checkpoint;
        deal.bytes_received = deal.bytes_received.max(bytes_received);
        deal.err = err;
        Ok(())
    }
}
