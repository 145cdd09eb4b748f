//! Store statistics and telemetry.
//!
//! Counters for monitoring cache effectiveness and lock behavior.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = CachingStore::new(backing, Config::default());
//!
//! // Perform operations...
//!
//! let snap = store.stats().snapshot();
//! println!("hit ratio: {}/{}", snap.shared_hits, snap.shared_misses);
//! println!("deadlocks: {}", snap.deadlocks);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Caching-store statistics.
///
/// All counters are atomic and can be read while operations are in
/// progress. Every value is monotonically increasing.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Reads served by the shared cache.
    shared_hits: AtomicU64,
    /// Reads that fell through to the backing store.
    shared_misses: AtomicU64,
    /// Entries removed by the eviction policy.
    evictions: AtomicU64,
    /// Transactions victimized by deadlock detection or timeout.
    deadlocks: AtomicU64,
    /// Transactions started.
    transactions_started: AtomicU64,
    /// Transactions committed.
    transactions_committed: AtomicU64,
    /// Transactions aborted.
    transactions_aborted: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_shared_hit(&self) {
        self.shared_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_shared_miss(&self) {
        self.shared_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_deadlock(&self) {
        self.deadlocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    // === Getter methods (public API) ===

    /// Returns the number of reads served by the shared cache.
    pub fn shared_hits(&self) -> u64 {
        self.shared_hits.load(Ordering::Relaxed)
    }

    /// Returns the number of reads that fell through to the backing store.
    pub fn shared_misses(&self) -> u64 {
        self.shared_misses.load(Ordering::Relaxed)
    }

    /// Returns the number of entries evicted under capacity pressure.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Returns the number of deadlock victimizations.
    pub fn deadlocks(&self) -> u64 {
        self.deadlocks.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions started.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions committed.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions aborted.
    pub fn transactions_aborted(&self) -> u64 {
        self.transactions_aborted.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            shared_hits: self.shared_hits(),
            shared_misses: self.shared_misses(),
            evictions: self.evictions(),
            deadlocks: self.deadlocks(),
            transactions_started: self.transactions_started(),
            transactions_committed: self.transactions_committed(),
            transactions_aborted: self.transactions_aborted(),
        }
    }
}

/// A point-in-time snapshot of store statistics.
///
/// Unlike [`StoreStats`], this is a plain struct that can be compared or
/// passed across threads without atomics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Reads served by the shared cache.
    pub shared_hits: u64,
    /// Reads that fell through to the backing store.
    pub shared_misses: u64,
    /// Entries removed by the eviction policy.
    pub evictions: u64,
    /// Transactions victimized by deadlock detection or timeout.
    pub deadlocks: u64,
    /// Transactions started.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions aborted.
    pub transactions_aborted: u64,
}
