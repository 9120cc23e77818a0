//! Provider configuration with validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::{Address, StorageAsk};

use crate::domain::errors::ConfigError;

/// Default upper bound on how long a deal's data transfer may take.
pub const DEFAULT_MAX_TRANSFER_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for one provider instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// On-chain address of this provider.
    pub address: Address,
    /// Deals whose transfer has not finished within this bound are failed.
    pub max_transfer_duration: Duration,
    /// Acceptance requests buffered ahead of the loop.
    pub accept_queue_depth: usize,
    /// Completion and failure reports buffered ahead of the loop.
    pub failure_queue_depth: usize,
    /// Events retained per new-deal subscriber before the oldest are dropped.
    pub new_deal_buffer: usize,
    /// How often the transfer tracker recomputes transfer rates.
    pub transfer_refresh_interval: Duration,
    /// How often the default executor checks transfer progress.
    pub transfer_poll_interval: Duration,
    /// Maximum number of concurrently tracked deals. `None` means unlimited.
    pub max_active_deals: Option<usize>,
    /// Clients whose proposals are always declined.
    pub blocked_clients: Vec<Address>,
    /// Advertised terms. `None` uses the default ask for `address`.
    pub ask: Option<StorageAsk>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            address: Address::default(),
            max_transfer_duration: DEFAULT_MAX_TRANSFER_DURATION,
            accept_queue_depth: 16,
            failure_queue_depth: 64,
            new_deal_buffer: shared_bus::DEFAULT_CHANNEL_CAPACITY,
            transfer_refresh_interval: Duration::from_secs(5),
            transfer_poll_interval: Duration::from_secs(1),
            max_active_deals: None,
            blocked_clients: Vec::new(),
            ask: None,
        }
    }
}

impl ProviderConfig {
    /// Default configuration for the given provider address.
    pub fn for_address(address: Address) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// The storage ask this provider advertises.
    #[must_use]
    pub fn ask(&self) -> StorageAsk {
        self.ask
            .clone()
            .unwrap_or_else(|| StorageAsk::default_for(self.address.clone()))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if self.accept_queue_depth == 0 {
            return Err(ConfigError::Zero("accept_queue_depth"));
        }
        if self.failure_queue_depth == 0 {
            return Err(ConfigError::Zero("failure_queue_depth"));
        }
        if self.new_deal_buffer == 0 {
            return Err(ConfigError::Zero("new_deal_buffer"));
        }
        if self.max_transfer_duration.is_zero() {
            return Err(ConfigError::Zero("max_transfer_duration"));
        }
        if self.transfer_refresh_interval.is_zero() {
            return Err(ConfigError::Zero("transfer_refresh_interval"));
        }
        if self.transfer_poll_interval.is_zero() {
            return Err(ConfigError::Zero("transfer_poll_interval"));
        }
        if self.max_active_deals == Some(0) {
            return Err(ConfigError::Zero("max_active_deals"));
        }

        let ask = self.ask();
        if ask.min_piece_size > ask.max_piece_size {
            return Err(ConfigError::InvalidAsk(format!(
                "min piece size {} exceeds max piece size {}",
                ask.min_piece_size, ask.max_piece_size
            )));
        }
        if ask.miner != self.address {
            return Err(ConfigError::InvalidAsk(format!(
                "ask miner {} does not match provider address {}",
                ask.miner, self.address
            )));
        }
        Ok(())
    }
}
