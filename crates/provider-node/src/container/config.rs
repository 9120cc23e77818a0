//! # Node Configuration
//!
//! Unified configuration for the provider and its runtime parameters.
//!
//! ## Requirements
//!
//! - The provider address MUST be set (`SP_ADDRESS`); there is no default
//! - All queue depths, intervals and capacities have sane defaults with
//!   override capability

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use deal_provider::ProviderConfig;
use provider_telemetry::TelemetryConfig;
use shared_types::{Address, PeerId, TokenAmount, GIB};
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Repository root; staging files and the metrics snapshot live here.
    pub repo_root: PathBuf,
    /// Libp2p identity announced to clients.
    pub peer_id: PeerId,
    /// Funds and sealing space available to new deals.
    pub capacity: CapacityConfig,
    /// Acceptance core configuration.
    pub provider: ProviderConfig,
    /// Logging and metrics configuration.
    pub telemetry: TelemetryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("./data"),
            peer_id: PeerId::new(""),
            capacity: CapacityConfig::default(),
            provider: ProviderConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Capacity configuration.
#[derive(Debug, Clone)]
pub struct CapacityConfig {
    /// Balance available for collateral and publish fees.
    pub fund_balance: TokenAmount,
    /// Fee set aside per deal for publishing.
    pub publish_fee: TokenAmount,
    /// Bytes of sealing space.
    pub storage_capacity: u64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            fund_balance: 1_000_000_000,
            publish_fee: 0,
            storage_capacity: 1024 * GIB,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid value {value:?} for {name}")]
    InvalidVar { name: &'static str, value: String },

    /// The provider config file could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The provider config file is not valid JSON for `ProviderConfig`.
    #[error("invalid config file {}: {source}", .path.display())]
    ParseFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// No storage capacity configured.
    #[error("storage capacity must be greater than zero")]
    NoStorage,

    /// The acceptance core rejected its configuration.
    #[error(transparent)]
    Provider(#[from] deal_provider::ConfigError),
}

impl NodeConfig {
    /// Load configuration: defaults, then the optional JSON provider config
    /// file, then `SP_*` environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SP_CONFIG`: JSON file holding a `ProviderConfig`; missing fields
    ///   keep their defaults
    /// - `SP_REPO`: Repository root (default: ./data)
    /// - `SP_ADDRESS`: Provider address (required)
    /// - `SP_PEER_ID`: Peer identity
    /// - `SP_FUND_BALANCE`, `SP_PUBLISH_FEE`: Token amounts
    /// - `SP_STORAGE_CAPACITY`: Sealing space in bytes
    /// - `SP_MAX_TRANSFER_SECS`: Transfer deadline per deal
    /// - `SP_MAX_ACTIVE_DEALS`: Cap on concurrently tracked deals
    /// - `SP_BLOCKED_CLIENTS`: Comma-separated client addresses to decline
    /// - `SP_ACCEPT_QUEUE_DEPTH`: Pending acceptance requests
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|name| std::env::var(name).ok())?;
        config.telemetry = TelemetryConfig::from_env();
        Ok(config)
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup("SP_CONFIG") {
            config.provider = load_provider_file(Path::new(path.trim()))?;
        }
        if let Some(repo) = lookup("SP_REPO") {
            config.repo_root = PathBuf::from(repo);
        }
        if let Some(address) = lookup("SP_ADDRESS") {
            config.provider.address = Address::new(address.trim());
        }
        if let Some(peer_id) = lookup("SP_PEER_ID") {
            config.peer_id = PeerId::new(peer_id.trim());
        }

        if let Some(balance) = parse_var(&lookup, "SP_FUND_BALANCE")? {
            config.capacity.fund_balance = balance;
        }
        if let Some(fee) = parse_var(&lookup, "SP_PUBLISH_FEE")? {
            config.capacity.publish_fee = fee;
        }
        if let Some(bytes) = parse_var(&lookup, "SP_STORAGE_CAPACITY")? {
            config.capacity.storage_capacity = bytes;
        }

        if let Some(secs) = parse_var(&lookup, "SP_MAX_TRANSFER_SECS")? {
            config.provider.max_transfer_duration = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var(&lookup, "SP_MAX_ACTIVE_DEALS")? {
            config.provider.max_active_deals = Some(max);
        }
        if let Some(depth) = parse_var(&lookup, "SP_ACCEPT_QUEUE_DEPTH")? {
            config.provider.accept_queue_depth = depth;
        }
        if let Some(blocked) = lookup("SP_BLOCKED_CLIENTS") {
            config.provider.blocked_clients = blocked
                .split(',')
                .map(str::trim)
                .filter(|client| !client.is_empty())
                .map(Address::new)
                .collect();
        }

        Ok(config)
    }

    /// Validate before starting the provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity.storage_capacity == 0 {
            return Err(ConfigError::NoStorage);
        }
        self.provider.validate()?;
        Ok(())
    }

    /// File the metrics snapshot is written to.
    #[must_use]
    pub fn metrics_path(&self) -> PathBuf {
        self.repo_root.join("metrics.prom")
    }

    #[must_use]
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.telemetry.metrics_interval_secs.max(1))
    }
}

fn load_provider_file(path: &Path) -> Result<ProviderConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { name, value }),
    }
}
