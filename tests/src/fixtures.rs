//! Deal builders and a provider harness shared by the flows and benchmarks.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use deal_provider::adapters::{
    BasicProposalValidator, InMemoryDealStore, InMemoryFundManager, InMemoryStorageManager,
    LocalStagingStore, TransferWatchExecutor,
};
use deal_provider::ports::{DealExecutor, ExecutionContext};
use deal_provider::{Provider, ProviderAdapters, ProviderConfig};
use provider_telemetry::ProviderMetrics;
use shared_types::{
    Address, ClientDealParams, ClientDealProposal, DealId, DealProposal, PeerId,
    ProviderDealState, TokenAmount, Transfer,
};
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const PROVIDER: &str = "f01000";

/// A signed, valid proposal for `piece_size` bytes under a fresh deal id.
pub fn deal_params(piece_size: u64) -> ClientDealParams {
    ClientDealParams {
        deal_uuid: DealId::new(),
        client_deal_proposal: ClientDealProposal {
            proposal: DealProposal {
                piece_cid: "baga6ea4seaqpiece".into(),
                piece_size,
                verified_deal: false,
                client: Address::new("f1client"),
                provider: Address::new(PROVIDER),
                label: "integration".into(),
                start_epoch: 100,
                end_epoch: 1100,
                storage_price_per_epoch: 1,
                provider_collateral: 10,
                client_collateral: 0,
            },
            client_signature: vec![0xde, 0xad, 0xbe, 0xef],
        },
        deal_data_root: "bafyroot".into(),
        transfer: Transfer {
            kind: "http".into(),
            params: b"{\"url\":\"http://client/piece\"}".to_vec(),
            size: piece_size,
        },
        miner_peer_id: PeerId::new("miner"),
        client_peer_id: PeerId::new("client"),
    }
}

/// Executor that hands every admitted deal back to the test instead of
/// running a pipeline.
pub struct CapturingExecutor {
    sender: mpsc::UnboundedSender<(ProviderDealState, ExecutionContext)>,
}

impl CapturingExecutor {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(ProviderDealState, ExecutionContext)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl DealExecutor for CapturingExecutor {
    fn execute(&self, deal: ProviderDealState, ctx: ExecutionContext) {
        let _ = self.sender.send((deal, ctx));
    }
}

/// A provider over in-memory managers and a temporary repo root.
pub struct Harness {
    pub provider: Arc<Provider>,
    pub storage: Arc<InMemoryStorageManager>,
    pub funds: Arc<InMemoryFundManager>,
    pub repo: TempDir,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Files currently in the staging directory.
    pub fn staging_files(&self) -> usize {
        std::fs::read_dir(self.repo.path().join("incoming"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub struct HarnessBuilder {
    config: ProviderConfig,
    storage_capacity: u64,
    fund_balance: TokenAmount,
    executor: Option<Arc<dyn DealExecutor>>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            config: ProviderConfig {
                transfer_refresh_interval: Duration::from_millis(10),
                transfer_poll_interval: Duration::from_millis(5),
                ..ProviderConfig::for_address(Address::new(PROVIDER))
            },
            storage_capacity: 1 << 40,
            fund_balance: 1_000_000_000,
            executor: None,
        }
    }
}

impl HarnessBuilder {
    pub fn storage_capacity(mut self, bytes: u64) -> Self {
        self.storage_capacity = bytes;
        self
    }

    pub fn fund_balance(mut self, balance: TokenAmount) -> Self {
        self.fund_balance = balance;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn DealExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut ProviderConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build and start the provider.
    pub async fn start(self) -> Harness {
        let repo = tempfile::tempdir().expect("temp repo root");
        let storage = Arc::new(InMemoryStorageManager::new(self.storage_capacity));
        let funds = Arc::new(InMemoryFundManager::new(self.fund_balance, 0));
        let executor = self.executor.unwrap_or_else(|| {
            Arc::new(TransferWatchExecutor::new(
                self.config.max_transfer_duration,
                self.config.transfer_poll_interval,
            ))
        });

        let adapters = ProviderAdapters {
            store: Arc::new(InMemoryDealStore::new()),
            staging: Arc::new(LocalStagingStore::new(repo.path())),
            funds: funds.clone(),
            storage: storage.clone(),
            validator: Arc::new(BasicProposalValidator::new(Address::new(PROVIDER))),
            executor,
        };
        let metrics = Arc::new(ProviderMetrics::new().expect("metrics registry"));
        let provider = Arc::new(Provider::new(self.config, adapters, metrics));
        provider.start().await.expect("provider start");

        Harness {
            provider,
            storage,
            funds,
            repo,
        }
    }
}
