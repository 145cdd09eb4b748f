//! Store façade wiring the cache, lock manager, and backing store.

use crate::cache::{CacheEntry, SharedCache, UpdateMode};
use crate::config::Config;
use crate::error::CoreResult;
use crate::lock::LockManager;
use crate::stats::StoreStats;
use crate::transaction::Transaction;
use crate::types::TxId;
use ocstore_backend::BackingStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide collaborators shared by every transaction of one store.
///
/// Instantiated once per [`CachingStore`]; no implicit singletons.
pub(crate) struct StoreShared {
    pub(crate) cache: SharedCache,
    pub(crate) locks: LockManager,
    pub(crate) backing: Arc<dyn BackingStore>,
    pub(crate) stats: StoreStats,
}

impl StoreShared {
    /// Publishes a committed transaction's entries to the shared tier.
    ///
    /// Called after the backing commit succeeded and while the committing
    /// transaction still holds its locks: created and locked entries are
    /// promoted (modes coerced to `None` by the tier), destroyed objects
    /// are evicted together with their index entries.
    pub(crate) fn publish_commit(&self, entries: Vec<CacheEntry>) {
        for entry in entries {
            match entry.update_mode {
                UpdateMode::Create | UpdateMode::Lock => {
                    let evicted = self.cache.put(entry.id, entry.name, entry.payload);
                    if !evicted.is_empty() {
                        self.stats.record_evictions(evicted.len() as u64);
                    }
                }
                UpdateMode::Destroy => self.cache.evict(entry.id),
                UpdateMode::None => {}
            }
        }
    }
}

/// The caching object store.
///
/// A `CachingStore` sits between application transactions and a backing
/// object store, adding a process-wide shared cache and a pessimistic lock
/// manager with deadlock detection. Derive one [`Transaction`] per logical
/// transaction; transactions on distinct threads run concurrently and
/// serialize only on the objects they both lock.
///
/// # Example
///
/// ```rust
/// use ocstore_backend::MemoryBackingStore;
/// use ocstore_core::{CachingStore, Config};
/// use std::sync::Arc;
///
/// let store = CachingStore::new(Arc::new(MemoryBackingStore::new()), Config::default());
///
/// let mut t1 = store.transaction().unwrap();
/// let id = t1.create(b"42".to_vec(), "answer").unwrap();
/// t1.commit().unwrap();
///
/// let mut t2 = store.transaction().unwrap();
/// assert_eq!(t2.lookup("answer").unwrap(), id);
/// assert_eq!(t2.peek(id).unwrap(), Some(b"42".to_vec()));
/// ```
pub struct CachingStore {
    shared: Arc<StoreShared>,
    config: Config,
    next_tx: AtomicU64,
}

impl CachingStore {
    /// Creates a store over the given backing store.
    #[must_use]
    pub fn new(backing: Arc<dyn BackingStore>, config: Config) -> Self {
        let shared = Arc::new(StoreShared {
            cache: SharedCache::new(config.cache_capacity),
            locks: LockManager::new(config.deadlock_policy, config.acquire_timeout),
            backing,
            stats: StoreStats::new(),
        });
        Self {
            shared,
            config,
            next_tx: AtomicU64::new(1),
        }
    }

    /// Begins a new transaction.
    ///
    /// # Errors
    ///
    /// Returns a backing error if the backing store cannot start a
    /// transaction.
    pub fn transaction(&self) -> CoreResult<Transaction> {
        let backing = self.shared.backing.begin()?;
        let id = TxId::new(self.next_tx.fetch_add(1, Ordering::SeqCst));
        self.shared.stats.record_transaction_start();
        Ok(Transaction::new(id, Arc::clone(&self.shared), backing))
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the store's statistics counters.
    #[must_use]
    pub fn stats(&self) -> &StoreStats {
        &self.shared.stats
    }

    /// Returns the shared cache tier, e.g. for residency inspection.
    #[must_use]
    pub fn shared_cache(&self) -> &SharedCache {
        &self.shared.cache
    }
}

impl std::fmt::Debug for CachingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingStore")
            .field("cache_capacity", &self.config.cache_capacity)
            .field("cached_entries", &self.shared.cache.len())
            .finish_non_exhaustive()
    }
}
