//! Refresh Hot-Path Benchmarks - Limiter, Dedup, Reconcile, Parse
//!
//! Benchmarks the paths every API call or refresh goes through.
//!
//! Run with: cargo bench --bench refresh_bench

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use contest_calendar::adapters::persistence::MemoryContestStore;
use contest_calendar::adapters::ratelimit::MemoryWindowStore;
use contest_calendar::adapters::sources::codeforces::parse_contest_list;
use contest_calendar::domain::ContestDraft;
use contest_calendar::ports::{ContestStore, ManualClock, NoopTelemetry};
use contest_calendar::usecases::reconciler::dedup_batch;
use contest_calendar::usecases::SlidingWindowLimiter;

fn batch(n: u32) -> Vec<ContestDraft> {
    let now = DateTime::from_timestamp(1_740_000_000, 0).unwrap();
    (0..n)
        .map(|i| {
            ContestDraft::from_range(
                "codeforces",
                format!("codeforces-{}", i % (n / 2).max(1)),
                format!("Codeforces Round {i}"),
                format!("https://codeforces.com/contest/{i}"),
                now + chrono::Duration::hours(i as i64),
                now + chrono::Duration::hours(i as i64 + 2),
                now,
            )
        })
        .collect()
}

/// Benchmark one allowed limiter check against the in-process store.
fn bench_limiter_check(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(1_740_000_000, 0).unwrap()));
    let store = Arc::new(MemoryWindowStore::new(clock.clone()));
    let limiter = SlidingWindowLimiter::new(store, clock.clone(), Arc::new(NoopTelemetry));

    c.bench_function("limiter_check_allowed", |b| {
        b.to_async(&rt).iter(|| async {
            // Step past the window so every check is admitted.
            clock.advance(chrono::Duration::seconds(61));
            let _ = limiter
                .check(black_box("ratelimit:api:203.0.113.7"), 5, Duration::from_secs(60))
                .await;
        });
    });
}

/// Benchmark in-batch dedup of 200 drafts with 50% duplicates.
fn bench_dedup(c: &mut Criterion) {
    let drafts = batch(200);

    c.bench_function("dedup_batch_200", |b| {
        b.iter(|| dedup_batch(black_box("codeforces"), drafts.clone()));
    });
}

/// Benchmark an update-only reconcile of 100 known contests.
fn bench_upsert(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = MemoryContestStore::new();
    let drafts = dedup_batch("codeforces", batch(200));
    rt.block_on(store.upsert_batch("codeforces", &drafts)).unwrap();

    c.bench_function("upsert_batch_100_existing", |b| {
        b.to_async(&rt)
            .iter(|| async { store.upsert_batch("codeforces", black_box(&drafts)).await });
    });
}

/// Benchmark parsing a 100-row `contest.list` payload.
fn bench_parse_codeforces(c: &mut Criterion) {
    let now = DateTime::from_timestamp(1_740_000_000, 0).unwrap();
    let rows: Vec<String> = (0..100)
        .map(|i| {
            format!(
                r#"{{"id":{},"name":"Round {i}","type":"CF","phase":"BEFORE","frozen":false,"durationSeconds":7200,"startTimeSeconds":{}}}"#,
                2000 + i,
                now.timestamp() + 3600 * i
            )
        })
        .collect();
    let body = format!(r#"{{"status":"OK","result":[{}]}}"#, rows.join(","));

    c.bench_function("parse_codeforces_100", |b| {
        b.iter(|| parse_contest_list(black_box(&body), now));
    });
}

criterion_group!(
    benches,
    bench_limiter_check,
    bench_dedup,
    bench_upsert,
    bench_parse_codeforces,
);
criterion_main!(benches);
