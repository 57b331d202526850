//! Benchmarks for pathtrack storage operations

use chrono::{Duration, NaiveDate, NaiveDateTime};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use pathtrack::config::{Config, SyncMode};
use pathtrack::engine::Engine;
use tempfile::TempDir;

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn open_engine(temp: &TempDir, sync_mode: SyncMode) -> Engine {
    let config = Config::builder()
        .db_dir(temp.path())
        .sync_mode(sync_mode)
        .build();
    Engine::open(config).unwrap()
}

fn storage_benchmarks(c: &mut Criterion) {
    // Durable upsert of a new path per iteration
    for (name, mode) in [("upsert_full_sync", SyncMode::Full), ("upsert_data_sync", SyncMode::Data)] {
        let temp = TempDir::new().unwrap();
        let engine = open_engine(&temp, mode);
        let mut i: i64 = 0;
        c.bench_function(name, |b| {
            b.iter(|| {
                i += 1;
                engine
                    .upsert(&format!("/bench/dir/{}", i), base_time() + Duration::seconds(i))
                    .unwrap();
            })
        });
    }

    // Listing a populated table
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp, SyncMode::Data);
    for i in 0..1_000i64 {
        engine
            .upsert(&format!("/bench/list/{}", i), base_time() + Duration::seconds(i % 97))
            .unwrap();
    }
    c.bench_function("list_all_1000", |b| b.iter(|| engine.list_all().unwrap()));

    // Startup: recovery plus compaction of a log with superseded records
    c.bench_function("open_with_compaction", |b| {
        b.iter_batched(
            || {
                let temp = TempDir::new().unwrap();
                let engine = open_engine(&temp, SyncMode::Data);
                for i in 0..200i64 {
                    engine
                        .upsert(&format!("/bench/open/{}", i % 20), base_time() + Duration::seconds(i))
                        .unwrap();
                }
                drop(engine);
                temp
            },
            |temp| {
                open_engine(&temp, SyncMode::Data);
                temp
            },
            BatchSize::PerIteration,
        )
    });
}

criterion_group!(benches, storage_benchmarks);
criterion_main!(benches);
