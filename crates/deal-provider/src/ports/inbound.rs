//! Inbound (Driving) port: the API an outer layer (RPC, GraphQL, CLI) calls.

use async_trait::async_trait;
use shared_bus::Subscription;
use shared_types::{ClientDealParams, DealId, ProviderDealState, StorageAsk};

use crate::domain::entities::SubmitOutcome;
use crate::domain::errors::ProviderError;
use crate::domain::registry::DealUpdateSubscription;

/// Primary storage provider API.
#[async_trait]
pub trait StorageProviderApi: Send + Sync {
    /// Validate, stage and submit a deal for admission.
    ///
    /// A declined deal is `Ok(SubmitOutcome::Rejected)`, not an error.
    async fn submit(&self, params: ClientDealParams) -> Result<SubmitOutcome, ProviderError>;

    /// The stored record for a deal.
    async fn deal(&self, deal_uuid: DealId) -> Result<ProviderDealState, ProviderError>;

    /// Bytes received so far; zero for unknown deals.
    fn transfer_progress(&self, deal_uuid: DealId) -> u64;

    /// Live feed of newly admitted deals.
    fn subscribe_new_deals(&self) -> Subscription;

    /// Ordered lifecycle updates for a tracked deal.
    fn subscribe_deal_updates(
        &self,
        deal_uuid: DealId,
    ) -> Result<DealUpdateSubscription, ProviderError>;

    /// Request cancellation. Unknown deals succeed.
    fn cancel_deal(&self, deal_uuid: DealId) -> Result<(), ProviderError>;

    /// The provider's advertised terms.
    fn storage_ask(&self) -> StorageAsk;
}
