//! Benchmarks for the hot read and lock paths.

use criterion::{criterion_group, criterion_main, Criterion};
use ocstore_backend::MemoryBackingStore;
use ocstore_core::{CachingStore, Config};
use std::sync::Arc;

fn bench_cached_peek(c: &mut Criterion) {
    let store = CachingStore::new(Arc::new(MemoryBackingStore::new()), Config::default());
    let id = {
        let mut txn = store.transaction().unwrap();
        let id = txn.create(vec![0u8; 128], "bench-peek").unwrap();
        txn.commit().unwrap();
        id
    };

    c.bench_function("peek_shared_hit", |b| {
        b.iter(|| {
            let mut txn = store.transaction().unwrap();
            let value = txn.peek(id).unwrap();
            txn.abort().unwrap();
            value
        });
    });
}

fn bench_uncontended_lock(c: &mut Criterion) {
    let store = CachingStore::new(Arc::new(MemoryBackingStore::new()), Config::default());
    let id = {
        let mut txn = store.transaction().unwrap();
        let id = txn.create(vec![0u8; 128], "bench-lock").unwrap();
        txn.commit().unwrap();
        id
    };

    c.bench_function("lock_uncontended", |b| {
        b.iter(|| {
            let mut txn = store.transaction().unwrap();
            let value = txn.lock(id).unwrap();
            txn.abort().unwrap();
            value
        });
    });
}

fn bench_create_commit(c: &mut Criterion) {
    let store = CachingStore::new(Arc::new(MemoryBackingStore::new()), Config::default());
    let mut n = 0u64;

    c.bench_function("create_commit", |b| {
        b.iter(|| {
            let mut txn = store.transaction().unwrap();
            let id = txn
                .create(vec![0u8; 128], &format!("bench-create-{n}"))
                .unwrap();
            n += 1;
            txn.commit().unwrap();
            id
        });
    });
}

criterion_group!(
    benches,
    bench_cached_peek,
    bench_uncontended_lock,
    bench_create_commit
);
criterion_main!(benches);
