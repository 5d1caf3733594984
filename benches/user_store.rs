use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use roster::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn seeded_store(n: usize) -> SharedUserStore {
    let store = SharedUserStore::new();
    for i in 0..n {
        store.upsert(User::new(format!("u{i}"), format!("nick-{}", i % 10)));
    }
    store
}

fn store_reads(c: &mut Criterion) {
    let store = seeded_store(10_000);
    c.bench_function("user_store_get_10k", |b| {
        b.iter(|| black_box(store.get(black_box("u4242"))));
    });
    c.bench_function("user_store_get_by_nickname_10k", |b| {
        b.iter(|| black_box(store.get_by_nickname(black_box("nick-3"))));
    });
}

fn store_writes(c: &mut Criterion) {
    let store = seeded_store(10_000);
    let mut i = 0usize;
    c.bench_function("user_store_upsert_10k", |b| {
        b.iter(|| {
            i = (i + 1) % 10_000;
            store.upsert(User::new(format!("u{i}"), "renamed"));
        });
    });
}

fn contended_reads(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(seeded_store(10_000));
    c.bench_function("user_store_8_concurrent_readers", |b| {
        b.to_async(&rt).iter(|| {
            let store = store.clone();
            async move {
                let readers = (0..8).map(|r| {
                    let store = store.clone();
                    tokio::spawn(async move { store.get(&format!("u{}", r * 1000)).is_some() })
                });
                for reader in futures::future::join_all(readers).await {
                    black_box(reader.unwrap());
                }
            }
        });
    });
}

fn limiter_admission(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();
    let config = LimiterConfig::new(1_000, Duration::from_secs(1)).unwrap();
    c.bench_function("leaky_token_bucket_admit_1000", |b| {
        b.iter_batched(
            || LeakyTokenBucket::new(config),
            |limiter| {
                for _ in 0..1_000 {
                    black_box(limiter.admit().is_ok());
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, store_reads, store_writes, contended_reads, limiter_admission);
criterion_main!(benches);
