//! Benchmarks for the scheduling hot paths.
//!
//! Benchmarks cover:
//! - Rate limiter slot acquisition under mixed priorities
//! - Operation buffer push and replay planning
//! - Week resolution with many requests
//! - Live admission through the dual store

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use seat_scheduler::config::builtin_assignment;
use seat_scheduler::core::{
    AdmissionEngine, Collection, DefaultAssignment, EmployeeRecord, ScheduleResolver, StaticDirectory,
    WeeklyRequest, WorkDay,
};
use seat_scheduler::infra::{InMemoryMirror, InMemoryNotifier, InMemoryPrimary, MemoryCache};
use seat_scheduler::sync::{
    DualStore, MirrorSync, MirrorWrite, OperationBuffer, RateLimit, RateLimiter, ReplayOrder,
};
use seat_scheduler::util::serde::Priority;
use tokio::runtime::Runtime;

// ============================================================================
// Helper Functions
// ============================================================================

fn week_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 26).unwrap()
}

fn directory(size: i64) -> StaticDirectory {
    StaticDirectory::from_records(
        (1..=size).map(|id| EmployeeRecord {
            id,
            manual_name: format!("Employee {id}"),
            display_name: format!("Employee {id}"),
            username: Some(format!("employee_{id}")),
            approved: true,
        }),
        [],
        [],
    )
}

fn build_request(id: i64) -> WeeklyRequest {
    let day = WorkDay::ALL[usize::try_from(id).unwrap() % WorkDay::ALL.len()];
    let skipped = WorkDay::ALL[usize::try_from(id / 5).unwrap() % WorkDay::ALL.len()];
    WeeklyRequest::new(week_start(), id, [day], [skipped])
}

// ============================================================================
// Rate Limiter Benchmarks
// ============================================================================

fn bench_limiter_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("limiter_acquire");

    for calls in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(calls));
        group.bench_with_input(BenchmarkId::from_parameter(calls), &calls, |b, &calls| {
            b.iter(|| {
                let limiter = RateLimiter::new(RateLimit {
                    max_calls: 100,
                    window: Duration::from_secs(100),
                    low_priority_share: 0.3,
                });
                let now = Instant::now();
                let mut allowed = 0;
                for i in 0..calls {
                    let priority = if i % 3 == 0 { Priority::Low } else { Priority::High };
                    if limiter.try_acquire_at(priority, now) {
                        allowed += 1;
                    }
                }
                black_box(allowed);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Operation Buffer Benchmarks
// ============================================================================

fn bench_buffer_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_plan");

    for size in [100_u64, 1_000, 5_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let buffer = OperationBuffer::new(OperationBuffer::DEFAULT_CAPACITY, ReplayOrder::OldestFirst);
                for i in 0..size {
                    let (collection, write) = if i % 4 == 0 {
                        (Collection::Logs, MirrorWrite::Append { row: vec![i.to_string()] })
                    } else {
                        (
                            Collection::Schedules,
                            MirrorWrite::UpsertByKey {
                                key: vec![i.to_string()],
                                row: vec![i.to_string(), "Monday".into(), String::new()],
                            },
                        )
                    };
                    buffer.push(collection, write, collection.priority());
                }
                black_box(buffer.plan().len());
            });
        });
    }
    group.finish();
}

// ============================================================================
// Resolution Benchmarks
// ============================================================================

fn bench_resolve_week(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_week");
    let default = builtin_assignment();
    let resolver = ScheduleResolver::new(8);

    for size in [10_i64, 100, 1_000] {
        let dir = directory(size);
        let requests: Vec<WeeklyRequest> = (1..=size).map(build_request).collect();
        group.throughput(Throughput::Elements(u64::try_from(size).unwrap()));
        group.bench_with_input(BenchmarkId::from_parameter(size), &requests, |b, requests| {
            b.iter(|| {
                let week = resolver.resolve(week_start(), &default, requests, &dir);
                black_box(week.dropped.len());
            });
        });
    }
    group.finish();
}

// ============================================================================
// Admission Benchmarks
// ============================================================================

fn bench_admit_release(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let date = week_start();

    c.bench_function("admit_release_cycle", |b| {
        b.to_async(&rt).iter(|| async {
            let sync = Arc::new(MirrorSync::new(
                Arc::new(InMemoryMirror::new()),
                RateLimiter::default(),
                OperationBuffer::new(OperationBuffer::DEFAULT_CAPACITY, ReplayOrder::OldestFirst),
            ));
            let store = Arc::new(DualStore::new(
                Arc::new(InMemoryPrimary::new()),
                sync,
                Arc::new(MemoryCache::new()),
                8,
                DefaultAssignment::empty(8),
                Vec::new(),
            ));
            let engine = AdmissionEngine::new(store, Arc::new(directory(12)), Arc::new(InMemoryNotifier::new()), 8);
            for id in 1..=12 {
                engine.admit(date, id).await.unwrap();
            }
            for id in 1..=4 {
                black_box(engine.release(date, id).await.unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_limiter_acquire,
    bench_buffer_plan,
    bench_resolve_week,
    bench_admit_release,
);
criterion_main!(benches);
