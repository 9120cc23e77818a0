//! Default adapter set for a standalone node.

use std::sync::Arc;

use deal_provider::adapters::{
    BasicProposalValidator, InMemoryDealStore, InMemoryFundManager, InMemoryStorageManager,
    LocalStagingStore, TransferWatchExecutor,
};
use deal_provider::{Provider, ProviderAdapters};
use provider_telemetry::ProviderMetrics;
use tracing::info;

use super::NodeConfig;

/// Build a provider over in-memory capacity managers and a staging directory
/// under the repo root.
pub fn build_provider(config: &NodeConfig, metrics: Arc<ProviderMetrics>) -> Provider {
    let staging = LocalStagingStore::new(&config.repo_root);
    info!(
        staging_dir = %staging.dir().display(),
        storage_capacity = config.capacity.storage_capacity,
        "Wiring provider adapters"
    );

    let adapters = ProviderAdapters {
        store: Arc::new(InMemoryDealStore::new()),
        staging: Arc::new(staging),
        funds: Arc::new(InMemoryFundManager::new(
            config.capacity.fund_balance,
            config.capacity.publish_fee,
        )),
        storage: Arc::new(InMemoryStorageManager::new(
            config.capacity.storage_capacity,
        )),
        validator: Arc::new(BasicProposalValidator::new(
            config.provider.address.clone(),
        )),
        executor: Arc::new(TransferWatchExecutor::new(
            config.provider.max_transfer_duration,
            config.provider.transfer_poll_interval,
        )),
    };

    Provider::new(config.provider.clone(), adapters, metrics)
}
