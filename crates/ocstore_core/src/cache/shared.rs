//! Process-wide shared cache tier.

use crate::cache::entry::{CacheEntry, UpdateMode};
use crate::cache::index::ObjectCache;
use crate::types::ObjectId;
use parking_lot::Mutex;

/// The process-wide cache of previously-fetched objects.
///
/// Wraps an [`ObjectCache`] in a single coarse mutex so every operation is
/// atomic with respect to all three indices: no reader can observe a
/// partially-applied `put`. Entries are snapshots; pending intents never
/// reach this tier - `put` coerces every entry's mode to
/// [`UpdateMode::None`].
///
/// A capacity of `0` disables the tier: lookups miss, inserts are
/// discarded, and all functional behavior is preserved by the tiers around
/// it.
#[derive(Debug)]
pub struct SharedCache {
    inner: Mutex<ObjectCache>,
    capacity: usize,
}

impl SharedCache {
    /// Creates a shared cache bounded to `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(ObjectCache::with_capacity(capacity)),
            capacity,
        }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if the tier is disabled (capacity 0).
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.capacity == 0
    }

    /// Returns the number of resident entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if no entries are resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Looks up an entry snapshot by ID.
    #[must_use]
    pub fn get_by_id(&self, id: ObjectId) -> Option<CacheEntry> {
        if self.is_disabled() {
            return None;
        }
        self.inner.lock().get(id).cloned()
    }

    /// Resolves a binding name to an object ID.
    #[must_use]
    pub fn get_id_by_name(&self, name: &str) -> Option<ObjectId> {
        if self.is_disabled() {
            return None;
        }
        self.inner.lock().id_by_name(name)
    }

    /// Resolves a payload to an object ID by content identity.
    #[must_use]
    pub fn get_id_by_value(&self, payload: &[u8]) -> Option<ObjectId> {
        if self.is_disabled() {
            return None;
        }
        self.inner.lock().id_by_value(payload)
    }

    /// Inserts or merges an entry, coercing its mode to `None`.
    ///
    /// Returns the entries evicted to make room. The insert itself never
    /// fails; capacity pressure is absorbed by eviction.
    pub fn put(
        &self,
        id: ObjectId,
        name: Option<String>,
        payload: Option<Vec<u8>>,
    ) -> Vec<CacheEntry> {
        if self.is_disabled() {
            return Vec::new();
        }
        let mut inner = self.inner.lock();
        inner.put(UpdateMode::None, id, name, payload);
        let evicted = inner.evict_to_capacity();
        for entry in &evicted {
            tracing::trace!(id = %entry.id, "evicted from shared cache");
        }
        evicted
    }

    /// Removes an entry, e.g. when its object is destroyed at commit.
    pub fn evict(&self, id: ObjectId) {
        if self.is_disabled() {
            return;
        }
        self.inner.lock().remove(id);
    }

    /// Pins an entry against eviction. No-op if the entry is not resident.
    pub fn pin(&self, id: ObjectId) {
        if self.is_disabled() {
            return;
        }
        self.inner.lock().pin(id);
    }

    /// Releases one pin on an entry.
    pub fn unpin(&self, id: ObjectId) {
        if self.is_disabled() {
            return;
        }
        self.inner.lock().unpin(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_coerces_mode_to_none() {
        let cache = SharedCache::new(8);
        cache.put(ObjectId::new(1), None, Some(b"v".to_vec()));

        let entry = cache.get_by_id(ObjectId::new(1)).unwrap();
        assert_eq!(entry.update_mode, UpdateMode::None);
    }

    #[test]
    fn lookup_miss_returns_absent() {
        let cache = SharedCache::new(8);
        assert!(cache.get_by_id(ObjectId::new(1)).is_none());
        assert!(cache.get_id_by_name("a").is_none());
        assert!(cache.get_id_by_value(b"v").is_none());
    }

    #[test]
    fn indices_resolve_after_put() {
        let cache = SharedCache::new(8);
        cache.put(
            ObjectId::new(1),
            Some("a".to_owned()),
            Some(b"v".to_vec()),
        );

        assert_eq!(cache.get_id_by_name("a"), Some(ObjectId::new(1)));
        assert_eq!(cache.get_id_by_value(b"v"), Some(ObjectId::new(1)));
    }

    #[test]
    fn capacity_pressure_evicts() {
        let cache = SharedCache::new(2);
        cache.put(ObjectId::new(1), None, Some(b"a".to_vec()));
        cache.put(ObjectId::new(2), None, Some(b"b".to_vec()));
        let evicted = cache.put(ObjectId::new(3), None, Some(b"c".to_vec()));

        assert_eq!(evicted.len(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn pinned_entries_are_not_evicted() {
        let cache = SharedCache::new(1);
        cache.put(ObjectId::new(1), None, Some(b"a".to_vec()));
        cache.pin(ObjectId::new(1));

        let evicted = cache.put(ObjectId::new(2), None, Some(b"b".to_vec()));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, ObjectId::new(2));
        assert!(cache.get_by_id(ObjectId::new(1)).is_some());

        cache.unpin(ObjectId::new(1));
    }

    #[test]
    fn zero_capacity_disables_tier() {
        let cache = SharedCache::new(0);
        assert!(cache.is_disabled());

        cache.put(ObjectId::new(1), None, Some(b"v".to_vec()));
        assert!(cache.get_by_id(ObjectId::new(1)).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn evict_removes_entry_and_indices() {
        let cache = SharedCache::new(8);
        cache.put(
            ObjectId::new(1),
            Some("a".to_owned()),
            Some(b"v".to_vec()),
        );
        cache.evict(ObjectId::new(1));

        assert!(cache.get_by_id(ObjectId::new(1)).is_none());
        assert!(cache.get_id_by_name("a").is_none());
        assert!(cache.get_id_by_value(b"v").is_none());
    }
}
