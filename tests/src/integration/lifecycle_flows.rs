//! # Lifecycle Flows
//!
//! What happens to an admitted deal after `submit` returns: execution
//! reports, subscriptions, cancellation, transfer progress and the node
//! runtime wrapping it all.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use deal_provider::{ProviderError, StorageProviderApi};
    use provider_node::{NodeConfig, NodeRuntime};
    use provider_telemetry::ProviderMetrics;
    use shared_bus::DealEvent;
    use shared_types::{Checkpoint, DealId, DealUpdate};
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    use crate::fixtures::{deal_params, CapturingExecutor, Harness, PROVIDER};

    const WAIT: Duration = Duration::from_secs(5);

    /// Wait until `n` deals have completed or failed. The outcome metrics are
    /// the last thing teardown touches.
    async fn wait_for_finished(h: &Harness, n: u64) {
        let metrics = h.provider.metrics();
        timeout(WAIT, async {
            while metrics.deals_completed.get() + metrics.deals_failed.get() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    // =============================================================================
    // FAILURE REPORTS
    // =============================================================================

    #[tokio::test]
    async fn test_failure_report_tears_deal_down() {
        let (executor, mut executed) = CapturingExecutor::new();
        let h = Harness::builder()
            .storage_capacity(4096)
            .executor(Arc::new(executor))
            .start()
            .await;
        let mut lifecycle = h.provider.subscribe_lifecycle();

        let params = deal_params(4096);
        let id = params.deal_uuid;
        assert!(h.provider.submit(params).await.unwrap().is_accepted());
        let (_, ctx) = timeout(WAIT, executed.recv()).await.unwrap().unwrap();
        assert_eq!(h.storage.total_reserved(), 4096);

        ctx.reporter.report_failure(id, "sealing pipeline crashed").await;

        // NewDeal first, then the terminal outcome.
        assert!(matches!(
            timeout(WAIT, lifecycle.recv()).await.unwrap(),
            Some(DealEvent::NewDeal(_))
        ));
        match timeout(WAIT, lifecycle.recv()).await.unwrap() {
            Some(DealEvent::DealFinished {
                deal_uuid,
                checkpoint,
                error,
            }) => {
                assert_eq!(deal_uuid, id);
                assert_eq!(checkpoint, Checkpoint::Failed);
                assert_eq!(error.as_deref(), Some("sealing pipeline crashed"));
            }
            other => panic!("expected deal finished, got {other:?}"),
        }

        assert!(matches!(
            h.provider.subscribe_deal_updates(id),
            Err(ProviderError::DealNotFound(got)) if got == id
        ));
        assert_eq!(h.storage.total_reserved(), 0);
        assert!(ctx.handler.is_cancelled());

        let stored = h.provider.deal(id).await.unwrap();
        assert_eq!(stored.checkpoint, Checkpoint::Failed);
        assert_eq!(stored.err.as_deref(), Some("sealing pipeline crashed"));

        // The released space admits a deal of the same size.
        assert!(h.provider.submit(deal_params(4096)).await.unwrap().is_accepted());
        h.provider.close().await;
    }

    #[tokio::test]
    async fn test_report_for_unknown_deal_is_ignored() {
        let (executor, mut executed) = CapturingExecutor::new();
        let h = Harness::builder().executor(Arc::new(executor)).start().await;

        let params = deal_params(1024);
        let id = params.deal_uuid;
        assert!(h.provider.submit(params).await.unwrap().is_accepted());
        let (_, ctx) = timeout(WAIT, executed.recv()).await.unwrap().unwrap();

        ctx.reporter.report_failure(DealId::new(), "stray").await;
        ctx.reporter.report_completed(id).await;
        wait_for_finished(&h, 1).await;

        assert_eq!(h.provider.metrics().deals_completed.get(), 1);
        assert_eq!(h.provider.metrics().deals_failed.get(), 0);
        h.provider.close().await;
    }

    // =============================================================================
    // SUBSCRIPTIONS
    // =============================================================================

    #[tokio::test]
    async fn test_late_subscriber_sees_all_following_updates_in_order() {
        let (executor, mut executed) = CapturingExecutor::new();
        let h = Harness::builder().executor(Arc::new(executor)).start().await;

        let params = deal_params(4096);
        let id = params.deal_uuid;
        assert!(h.provider.submit(params).await.unwrap().is_accepted());
        let (_, ctx) = timeout(WAIT, executed.recv()).await.unwrap().unwrap();

        let mut first = h.provider.subscribe_deal_updates(id).unwrap();
        let mut second = h.provider.subscribe_deal_updates(id).unwrap();

        for step in 1..=8u64 {
            ctx.handler
                .publish(DealUpdate::new(id, Checkpoint::Transferring, step * 512));
        }

        for subscription in [&mut first, &mut second] {
            let mut seen = Vec::new();
            for _ in 0..8 {
                let update = timeout(WAIT, subscription.recv()).await.unwrap().unwrap();
                seen.push(update.bytes_received);
            }
            assert_eq!(seen, (1..=8u64).map(|s| s * 512).collect::<Vec<_>>());
        }
        h.provider.close().await;
    }

    #[tokio::test]
    async fn test_new_deal_stream_yields_admitted_deals() {
        let h = Harness::builder().start().await;
        let mut stream = h.provider.new_deal_stream();

        let ids: Vec<DealId> = (0..3).map(|_| DealId::new()).collect();
        for id in &ids {
            let mut params = deal_params(1024);
            params.deal_uuid = *id;
            assert!(h.provider.submit(params).await.unwrap().is_accepted());
        }

        for id in &ids {
            let event = timeout(WAIT, stream.next()).await.unwrap().unwrap();
            assert_eq!(event.deal_uuid(), *id);
        }
        h.provider.close().await;
    }

    // =============================================================================
    // CANCELLATION & PROGRESS
    // =============================================================================

    #[tokio::test]
    async fn test_cancel_is_idempotent_through_api() {
        let h = Harness::builder().start().await;
        let api: Arc<dyn StorageProviderApi> = h.provider.clone();

        let params = deal_params(1024);
        let id = params.deal_uuid;
        assert!(api.submit(params).await.unwrap().is_accepted());

        api.cancel_deal(id).unwrap();
        api.cancel_deal(id).unwrap();
        api.cancel_deal(DealId::new()).unwrap();
        wait_for_finished(&h, 1).await;
        api.cancel_deal(id).unwrap();

        assert_eq!(api.deal(id).await.unwrap().checkpoint, Checkpoint::Failed);
        h.provider.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_transfer_progress_sums_concurrent_writes() {
        let (executor, _executed) = CapturingExecutor::new();
        let h = Harness::builder().executor(Arc::new(executor)).start().await;
        let id = DealId::new();
        assert_eq!(h.provider.transfer_progress(id), 0);

        let observer = {
            let provider = Arc::clone(&h.provider);
            tokio::spawn(async move {
                let mut last = 0;
                for _ in 0..200 {
                    let now = provider.transfer_progress(id);
                    assert!(now >= last, "progress went backwards: {last} -> {now}");
                    last = now;
                    tokio::task::yield_now().await;
                }
            })
        };

        let writers: Vec<_> = (1..=8u64)
            .map(|n| {
                let provider = Arc::clone(&h.provider);
                tokio::spawn(async move {
                    for _ in 0..100 {
                        provider.record_transfer_bytes(id, n);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for writer in writers {
            timeout(WAIT, writer).await.unwrap().unwrap();
        }
        timeout(WAIT, observer).await.unwrap().unwrap();

        assert_eq!(h.provider.transfer_progress(id), 100 * (1..=8u64).sum::<u64>());
        h.provider.close().await;
    }

    #[tokio::test]
    async fn test_transfer_drives_deal_to_completion() {
        let h = Harness::builder().start().await;
        let params = deal_params(4096);
        let id = params.deal_uuid;
        assert!(h.provider.submit(params).await.unwrap().is_accepted());
        let mut updates = h.provider.subscribe_deal_updates(id).unwrap();

        for _ in 0..4 {
            h.provider.record_transfer_bytes(id, 1024);
        }

        let mut checkpoints = Vec::new();
        while let Some(update) = timeout(WAIT, updates.recv()).await.unwrap() {
            checkpoints.push(update.checkpoint);
        }
        assert_eq!(checkpoints.last(), Some(&Checkpoint::Complete));
        assert!(checkpoints.contains(&Checkpoint::Transferred));

        wait_for_finished(&h, 1).await;
        assert_eq!(h.storage.total_reserved(), 0);
        assert_eq!(h.funds.total_reserved(), 0);
        h.provider.close().await;
    }

    // =============================================================================
    // NODE RUNTIME
    // =============================================================================

    #[tokio::test]
    async fn test_node_runtime_round_trip() {
        let repo = tempfile::tempdir().unwrap();
        let repo_path = repo.path().to_string_lossy().into_owned();
        let config = NodeConfig::from_lookup(|name| match name {
            "SP_REPO" => Some(repo_path.clone()),
            "SP_ADDRESS" => Some(PROVIDER.to_string()),
            "SP_STORAGE_CAPACITY" => Some("8192".to_string()),
            _ => None,
        })
        .unwrap();

        let runtime =
            NodeRuntime::new(&config, Arc::new(ProviderMetrics::new().unwrap())).unwrap();
        runtime.start().await.unwrap();
        let provider = runtime.provider();

        assert!(provider.submit(deal_params(8192)).await.unwrap().is_accepted());
        let outcome = provider.submit(deal_params(1024)).await.unwrap();
        assert!(outcome.rejection().unwrap().reason.contains("capacity"));
        assert!(repo.path().join("incoming").is_dir());

        timeout(WAIT, runtime.shutdown()).await.unwrap();
        let snapshot = std::fs::read_to_string(config.metrics_path()).unwrap();
        assert!(snapshot.contains("sp_deals_accepted_total 1"));
        assert!(snapshot.contains("sp_deals_rejected_total{reason=\"capacity\"} 1"));
    }
}
