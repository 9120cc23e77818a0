//! # Acceptance Flows
//!
//! Admission through `Provider::submit` with real staging files and the
//! in-memory capacity managers.
//!
//! ## Flows Tested:
//!
//! 1. **Capacity under contention**: concurrent submissions never overcommit
//! 2. **Duplicate identifiers**: one handler per deal, whatever the interleaving
//! 3. **Rejection cleanup**: size and capacity declines leave no staging file
//! 4. **Shutdown**: a blocked submission returns promptly on close

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use deal_provider::adapters::{
        BasicProposalValidator, InMemoryDealStore, InMemoryStorageManager, LocalStagingStore,
        TransferWatchExecutor,
    };
    use deal_provider::ports::{FundManager, ReserveOutcome};
    use deal_provider::{
        CapacityError, Provider, ProviderAdapters, ProviderConfig, ProviderError, SubmitOutcome,
    };
    use provider_telemetry::ProviderMetrics;
    use shared_bus::DealEvent;
    use shared_types::{Address, DealId, ProviderDealState, StorageAsk};
    use tokio::sync::Notify;
    use tokio::time::timeout;

    use crate::fixtures::{deal_params, Harness, PROVIDER};

    const WAIT: Duration = Duration::from_secs(5);

    async fn submit_all(
        provider: &Arc<Provider>,
        deals: Vec<shared_types::ClientDealParams>,
    ) -> Vec<Result<SubmitOutcome, ProviderError>> {
        let tasks: Vec<_> = deals
            .into_iter()
            .map(|params| {
                let provider = Arc::clone(provider);
                tokio::spawn(async move { provider.submit(params).await })
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(timeout(WAIT, task).await.unwrap().unwrap());
        }
        results
    }

    // =============================================================================
    // CAPACITY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_deals_one_slot_exactly_one_accepted() {
        let h = Harness::builder().storage_capacity(3000).start().await;

        let results = submit_all(&h.provider, vec![deal_params(2048), deal_params(2048)]).await;

        let accepted = results
            .iter()
            .filter(|r| matches!(r, Ok(SubmitOutcome::Accepted)))
            .count();
        assert_eq!(accepted, 1);
        let rejection = results
            .iter()
            .find_map(|r| r.as_ref().ok().and_then(SubmitOutcome::rejection))
            .unwrap();
        assert!(rejection.reason.contains("capacity"), "{}", rejection.reason);

        assert_eq!(h.storage.total_reserved(), 2048);
        assert_eq!(h.staging_files(), 1);
        h.provider.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_contended_admission_never_exceeds_capacity() {
        let capacity = 7 * 1024;
        let h = Harness::builder().storage_capacity(capacity).start().await;

        let sizes = [1024, 2048, 512, 4096, 1024, 2048, 512, 1024, 2048, 4096];
        let deals = sizes.iter().map(|size| deal_params(*size)).collect();
        let results = submit_all(&h.provider, deals).await;

        let mut admitted = 0;
        for (size, result) in sizes.iter().zip(&results) {
            match result {
                Ok(SubmitOutcome::Accepted) => admitted += size,
                Ok(SubmitOutcome::Rejected(r)) => {
                    assert!(r.reason.contains("capacity"), "{}", r.reason)
                }
                Err(e) => panic!("capacity pressure must not produce errors: {e}"),
            }
        }

        assert!(admitted <= capacity);
        assert_eq!(h.storage.total_reserved(), admitted);
        assert_eq!(h.provider.metrics().deals_errored.get(), 0);
        h.provider.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fund_shortage_rejects_and_releases_nothing() {
        // Collateral is 10 per deal; room for three.
        let h = Harness::builder().fund_balance(35).start().await;

        let deals = (0..6).map(|_| deal_params(1024)).collect();
        let results = submit_all(&h.provider, deals).await;

        let accepted = results
            .iter()
            .filter(|r| matches!(r, Ok(SubmitOutcome::Accepted)))
            .count();
        assert_eq!(accepted, 3);
        assert_eq!(h.funds.total_reserved(), 30);
        // Declined deals never touch storage.
        assert_eq!(h.storage.total_reserved(), 3 * 1024);
        h.provider.close().await;
    }

    // =============================================================================
    // DUPLICATES
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicate_submissions_single_handler() {
        let h = Harness::builder().start().await;
        let params = deal_params(2048);
        let id = params.deal_uuid;
        let mut new_deals = h.provider.subscribe_new_deals();

        let results = submit_all(&h.provider, vec![params; 8]).await;
        let accepted = results
            .iter()
            .filter(|r| matches!(r, Ok(SubmitOutcome::Accepted)))
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(h.provider.active_deals(), 1);
        assert_eq!(h.storage.total_reserved(), 2048);

        match timeout(WAIT, new_deals.recv()).await.unwrap() {
            Some(DealEvent::NewDeal(deal)) => assert_eq!(deal.deal_uuid, id),
            other => panic!("expected one new deal, got {other:?}"),
        }
        assert!(new_deals.try_recv().unwrap().is_none());
        h.provider.close().await;
    }

    #[tokio::test]
    async fn test_resubmitting_finished_deal_is_rejected() {
        let h = Harness::builder().start().await;
        let params = deal_params(2048);
        let id = params.deal_uuid;

        assert!(h.provider.submit(params.clone()).await.unwrap().is_accepted());
        h.provider.cancel_deal(id).unwrap();
        let metrics = h.provider.metrics();
        timeout(WAIT, async {
            while metrics.deals_failed.get() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let outcome = h.provider.submit(params).await.unwrap();
        assert!(outcome.rejection().unwrap().reason.contains("already exists"));
        h.provider.close().await;
    }

    // =============================================================================
    // REJECTION CLEANUP
    // =============================================================================

    #[tokio::test]
    async fn test_oversized_piece_rejected_and_unstaged() {
        let mut ask = StorageAsk::default_for(Address::new(PROVIDER));
        ask.max_piece_size = 1 << 20;
        let h = Harness::builder()
            .configure(|config| config.ask = Some(ask))
            .start()
            .await;

        let outcome = h.provider.submit(deal_params(1 << 21)).await.unwrap();
        let rejection = outcome.rejection().unwrap();
        assert!(rejection.reason.contains("size"), "{}", rejection.reason);
        assert_eq!(h.staging_files(), 0);
        assert_eq!(h.storage.total_reserved(), 0);
        h.provider.close().await;
    }

    #[tokio::test]
    async fn test_blocked_client_rejected_by_policy() {
        let h = Harness::builder()
            .configure(|config| config.blocked_clients = vec![Address::new("f1client")])
            .start()
            .await;

        let outcome = h.provider.submit(deal_params(2048)).await.unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(h.staging_files(), 0);
        assert_eq!(
            h.provider
                .metrics()
                .deals_rejected
                .with_label_values(&["policy"])
                .get(),
            1
        );
        h.provider.close().await;
    }

    #[tokio::test]
    async fn test_max_active_deals_policy() {
        let h = Harness::builder()
            .configure(|config| config.max_active_deals = Some(2))
            .start()
            .await;

        assert!(h.provider.submit(deal_params(1024)).await.unwrap().is_accepted());
        assert!(h.provider.submit(deal_params(1024)).await.unwrap().is_accepted());
        let outcome = h.provider.submit(deal_params(1024)).await.unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(h.provider.active_deals(), 2);
        assert_eq!(h.staging_files(), 2);
        h.provider.close().await;
    }

    // =============================================================================
    // SHUTDOWN
    // =============================================================================

    /// Fund manager that parks every reservation until released by the test.
    struct GatedFunds {
        entered: Arc<Notify>,
    }

    #[async_trait]
    impl FundManager for GatedFunds {
        async fn reserve(
            &self,
            _deal: &ProviderDealState,
        ) -> Result<ReserveOutcome, CapacityError> {
            self.entered.notify_one();
            std::future::pending().await
        }

        async fn release(&self, _deal_uuid: DealId) -> Result<(), CapacityError> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_releases_blocked_submitters() {
        let repo = tempfile::tempdir().unwrap();
        let entered = Arc::new(Notify::new());
        let config = ProviderConfig::for_address(Address::new(PROVIDER));
        let adapters = ProviderAdapters {
            store: Arc::new(InMemoryDealStore::new()),
            staging: Arc::new(LocalStagingStore::new(repo.path())),
            funds: Arc::new(GatedFunds {
                entered: Arc::clone(&entered),
            }),
            storage: Arc::new(InMemoryStorageManager::new(1 << 30)),
            validator: Arc::new(BasicProposalValidator::new(Address::new(PROVIDER))),
            executor: Arc::new(TransferWatchExecutor::new(
                config.max_transfer_duration,
                config.transfer_poll_interval,
            )),
        };
        let provider = Arc::new(Provider::new(
            config,
            adapters,
            Arc::new(ProviderMetrics::new().unwrap()),
        ));
        provider.start().await.unwrap();

        // One submission parks inside the loop, the rest queue behind it.
        let pending: Vec<_> = (0..4)
            .map(|_| {
                let provider = Arc::clone(&provider);
                tokio::spawn(async move { provider.submit(deal_params(1024)).await })
            })
            .collect();
        timeout(WAIT, entered.notified()).await.unwrap();

        timeout(WAIT, provider.close()).await.unwrap();
        for task in pending {
            let result = timeout(WAIT, task).await.unwrap().unwrap();
            assert!(matches!(result, Err(ProviderError::Shutdown)), "{result:?}");
        }

        let leftover = std::fs::read_dir(repo.path().join("incoming"))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
        assert!(matches!(
            provider.submit(deal_params(1024)).await,
            Err(ProviderError::Shutdown)
        ));
    }
}
