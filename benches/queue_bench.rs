//! Benchmarks for the job queue.
//!
//! Benchmarks cover:
//! - Job creation and snapshot reads on the store
//! - Claiming throughput
//! - End-to-end draining with varying worker counts

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

use async_trait::async_trait;
use prometheus_job_queue::builders::build_queue;
use prometheus_job_queue::config::QueueConfig;
use prometheus_job_queue::core::payload::json;
use prometheus_job_queue::core::{
    AppResult, JobHandle, JobStore, Payload, PayloadError, Processor,
};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Bench Payload and Processor
// ============================================================================

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct BenchPayload {
    id: u64,
    data: String,
}

impl Payload for BenchPayload {
    fn marshal(&self) -> Result<Vec<u8>, PayloadError> {
        json::marshal(self)
    }

    fn unmarshal(&mut self, bytes: &[u8]) -> Result<(), PayloadError> {
        json::unmarshal_into(self, bytes)
    }
}

struct EchoProcessor;

#[async_trait]
impl Processor for EchoProcessor {
    async fn process(&self, cancel: &CancellationToken, job: &JobHandle) -> AppResult<()> {
        let mut payload = BenchPayload::default();
        job.get_data(&mut payload)?;
        payload.data = format!("result-{}", payload.id);
        job.set_data(cancel, &payload)?;
        Ok(())
    }
}

fn payload(id: u64) -> BenchPayload {
    BenchPayload {
        id,
        data: "x".repeat(64),
    }
}

// ============================================================================
// Store Benchmarks
// ============================================================================

fn bench_store_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_create");
    for size in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let store = JobStore::new();
                for i in 0..size {
                    store.create(&format!("j-{i}"), &payload(i)).unwrap();
                }
                black_box(store.len())
            });
        });
    }
    group.finish();
}

fn bench_store_get(c: &mut Criterion) {
    let store = JobStore::new();
    for i in 0..1_000 {
        store.create(&format!("j-{i}"), &payload(i)).unwrap();
    }
    c.bench_function("store_get_snapshot", |b| {
        b.iter(|| black_box(store.get(black_box("j-500"))));
    });
}

fn bench_store_counts(c: &mut Criterion) {
    let store = JobStore::new();
    for i in 0..10_000 {
        store.create(&format!("j-{i}"), &payload(i)).unwrap();
    }
    c.bench_function("store_counts_10k", |b| {
        b.iter(|| black_box(store.counts()));
    });
}

// ============================================================================
// Dispatcher Benchmarks
// ============================================================================

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_1000_jobs");
    group.measurement_time(Duration::from_secs(10));
    for workers in [1_usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &workers,
            |b, &workers| {
                b.to_async(Runtime::new().unwrap()).iter(|| async move {
                    let config = QueueConfig::new()
                        .with_worker_count(workers)
                        .with_idle_poll_interval_ms(1);
                    let (client, dispatcher) = build_queue(config, EchoProcessor).unwrap();
                    let cancel = CancellationToken::new();
                    for i in 0..1_000 {
                        client.create_job(&cancel, &format!("j-{i}"), &payload(i)).unwrap();
                    }

                    let watcher = cancel.clone();
                    let drain = async move {
                        while client.stats().terminal() < 1_000 {
                            tokio::task::yield_now().await;
                        }
                        watcher.cancel();
                    };
                    let (result, ()) = tokio::join!(dispatcher.run(cancel, workers), drain);
                    black_box(result.unwrap());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(store_benches, bench_store_create, bench_store_get, bench_store_counts);
criterion_group!(dispatcher_benches, bench_drain);
criterion_main!(store_benches, dispatcher_benches);
