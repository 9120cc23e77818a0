//! # Storage Provider Admission Benchmarks
//!
//! | Path | Measures |
//! |------|----------|
//! | `submit_sequential` | One proposal end to end: validation, staging, loop admission |
//! | `submit_concurrent` | Batches contending for the single acceptance loop |
//! | `transfer_progress` | Byte counter updates from many writers |

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_types::DealId;
use sp_tests::fixtures::{deal_params, CapturingExecutor, Harness};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

/// Harness whose executor never runs a pipeline, so admitted deals stay
/// admitted and storage is the only limit.
fn parked_harness(rt: &Runtime) -> Harness {
    let (executor, _executed) = CapturingExecutor::new();
    rt.block_on(Harness::builder().executor(Arc::new(executor)).start())
}

// ============================================================================
// Admission
// ============================================================================

fn bench_submit_sequential(c: &mut Criterion) {
    let rt = runtime();
    let h = parked_harness(&rt);

    let mut group = c.benchmark_group("admission");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(1));
    group.bench_function("submit_sequential", |b| {
        b.iter(|| {
            let outcome = rt.block_on(h.provider.submit(deal_params(2048))).unwrap();
            black_box(outcome.is_accepted())
        })
    });
    group.finish();

    rt.block_on(h.provider.close());
}

fn bench_submit_concurrent(c: &mut Criterion) {
    let rt = runtime();
    let h = parked_harness(&rt);

    let mut group = c.benchmark_group("admission");
    group.measurement_time(Duration::from_secs(10));
    for batch in [8usize, 32, 128] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(
            BenchmarkId::new("submit_concurrent", batch),
            &batch,
            |b, &batch| {
                b.iter(|| {
                    rt.block_on(async {
                        let tasks: Vec<_> = (0..batch)
                            .map(|_| {
                                let provider = Arc::clone(&h.provider);
                                tokio::spawn(async move { provider.submit(deal_params(2048)).await })
                            })
                            .collect();
                        for task in tasks {
                            black_box(task.await.unwrap().unwrap());
                        }
                    })
                })
            },
        );
    }
    group.finish();

    rt.block_on(h.provider.close());
}

// ============================================================================
// Transfer tracking
// ============================================================================

fn bench_transfer_progress(c: &mut Criterion) {
    let rt = runtime();
    let h = parked_harness(&rt);
    let deals: Vec<DealId> = (0..64).map(|_| DealId::new()).collect();

    let mut group = c.benchmark_group("transfers");
    group.throughput(Throughput::Elements(deals.len() as u64));
    group.bench_function("transfer_progress", |b| {
        b.iter(|| {
            for id in &deals {
                h.provider.record_transfer_bytes(*id, 4096);
                black_box(h.provider.transfer_progress(*id));
            }
        })
    });
    group.finish();

    rt.block_on(h.provider.close());
}

criterion_group!(
    benches,
    bench_submit_sequential,
    bench_submit_concurrent,
    bench_transfer_progress
);
criterion_main!(benches);
