//! Store fixtures.
//!
//! Convenience helpers for setting up caching stores over an in-memory
//! backing store.

use ocstore_backend::MemoryBackingStore;
use ocstore_core::{CachingStore, Config};
use std::sync::Arc;

/// A test store with its backing store kept reachable for inspection.
pub struct TestStore {
    /// The caching store under test.
    pub store: CachingStore,
    /// The in-memory store of record behind it.
    pub backing: Arc<MemoryBackingStore>,
}

impl TestStore {
    /// Creates a test store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a test store with a custom configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let backing = Arc::new(MemoryBackingStore::new());
        let store = CachingStore::new(Arc::clone(&backing) as Arc<dyn ocstore_backend::BackingStore>, config);
        Self { store, backing }
    }

    /// Creates a test store with the given shared-cache capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(Config::default().cache_capacity(capacity))
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = CachingStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test against a default-configured store.
pub fn with_store<F, R>(f: F) -> R
where
    F: FnOnce(&CachingStore) -> R,
{
    let test_store = TestStore::new();
    f(&test_store.store)
}

/// Runs a test against a store with a custom configuration.
pub fn with_store_config<F, R>(config: Config, f: F) -> R
where
    F: FnOnce(&CachingStore) -> R,
{
    let test_store = TestStore::with_config(config);
    f(&test_store.store)
}

/// Installs a fmt tracing subscriber for test output.
///
/// Safe to call from several tests; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_store_round_trip() {
        with_store(|store| {
            let mut txn = store.transaction().unwrap();
            let id = txn.create(b"v".to_vec(), "a").unwrap();
            txn.commit().unwrap();

            let mut reader = store.transaction().unwrap();
            assert_eq!(reader.peek(id).unwrap(), Some(b"v".to_vec()));
        });
    }

    #[test]
    fn custom_capacity_is_applied() {
        let test_store = TestStore::with_capacity(2);
        assert_eq!(test_store.config().cache_capacity, 2);
    }

    #[test]
    fn backing_store_is_inspectable() {
        let test_store = TestStore::new();
        let mut txn = test_store.transaction().unwrap();
        txn.create(b"v".to_vec(), "a").unwrap();
        txn.commit().unwrap();

        assert_eq!(test_store.backing.object_count(), 1);
    }
}
