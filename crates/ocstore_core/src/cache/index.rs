//! Tri-indexed object map with approximate-LRU bookkeeping.

use crate::cache::entry::{CacheEntry, UpdateMode};
use crate::types::ObjectId;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Computes the identity hash of a payload.
///
/// Payload identity is byte equality; the cache indexes payloads by their
/// SHA-256 so `get_id_by_value` is a map lookup instead of a scan. Payloads
/// are snapshotted on insert, so a cached hash cannot drift.
#[must_use]
pub fn content_hash(payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.finalize().into()
}

/// One cached object plus its bookkeeping.
#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    /// Reference count of in-flight transactions using this entry.
    pins: u32,
    /// Use tick for approximate-LRU victim selection.
    last_used: u64,
}

/// A map from object ID to cache entry, with secondary indices from
/// binding name and from payload identity.
///
/// This structure is not synchronized. It backs two tiers:
/// - each transaction's **private cache**: unbounded, thread-confined
/// - the **shared cache**: bounded, wrapped in a mutex by
///   [`crate::cache::SharedCache`]
///
/// `put` merges into an existing entry: the mode is always replaced, while
/// an absent `name` or `payload` preserves what the entry already holds.
/// All three indices are kept consistent by every mutation.
#[derive(Debug)]
pub struct ObjectCache {
    capacity: Option<usize>,
    slots: HashMap<ObjectId, Slot>,
    by_name: HashMap<String, ObjectId>,
    by_value: HashMap<[u8; 32], ObjectId>,
    tick: u64,
}

impl ObjectCache {
    /// Creates an unbounded cache (private tier).
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            capacity: None,
            slots: HashMap::new(),
            by_name: HashMap::new(),
            by_value: HashMap::new(),
            tick: 0,
        }
    }

    /// Creates a bounded cache (shared tier).
    ///
    /// The cache may temporarily exceed `capacity` when every resident
    /// entry is pinned; see [`evict_to_capacity`](Self::evict_to_capacity).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::unbounded()
        }
    }

    /// Returns the number of resident entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no entries are resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` if an entry for `id` is resident.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Looks up an entry by ID, refreshing its LRU tick.
    pub fn get(&mut self, id: ObjectId) -> Option<&CacheEntry> {
        self.tick += 1;
        let tick = self.tick;
        self.slots.get_mut(&id).map(|slot| {
            slot.last_used = tick;
            &slot.entry
        })
    }

    /// Looks up an entry by ID without touching LRU state.
    #[must_use]
    pub fn entry(&self, id: ObjectId) -> Option<&CacheEntry> {
        self.slots.get(&id).map(|slot| &slot.entry)
    }

    /// Resolves a binding name to an object ID.
    #[must_use]
    pub fn id_by_name(&self, name: &str) -> Option<ObjectId> {
        self.by_name.get(name).copied()
    }

    /// Resolves a payload to an object ID by content identity.
    #[must_use]
    pub fn id_by_value(&self, payload: &[u8]) -> Option<ObjectId> {
        self.by_value.get(&content_hash(payload)).copied()
    }

    /// Inserts or merges an entry, keeping all three indices consistent.
    ///
    /// Returns a snapshot of the resulting entry. The caller is
    /// responsible for invoking [`evict_to_capacity`](Self::evict_to_capacity)
    /// afterwards on bounded tiers.
    pub fn put(
        &mut self,
        mode: UpdateMode,
        id: ObjectId,
        name: Option<String>,
        payload: Option<Vec<u8>>,
    ) -> CacheEntry {
        self.tick += 1;
        let tick = self.tick;

        let (merged_name, merged_payload) = match self.slots.get(&id) {
            Some(slot) => (
                name.or_else(|| slot.entry.name.clone()),
                payload.or_else(|| slot.entry.payload.clone()),
            ),
            None => (name, payload),
        };

        self.unindex(id);

        if let Some(n) = &merged_name {
            self.by_name.insert(n.clone(), id);
        }
        if let Some(p) = &merged_payload {
            self.by_value.insert(content_hash(p), id);
        }

        let entry = CacheEntry::new(mode, id, merged_name, merged_payload);
        let pins = self.slots.get(&id).map_or(0, |slot| slot.pins);
        self.slots.insert(
            id,
            Slot {
                entry: entry.clone(),
                pins,
                last_used: tick,
            },
        );
        entry
    }

    /// Removes an entry unconditionally, cleaning its index references.
    pub fn remove(&mut self, id: ObjectId) -> Option<CacheEntry> {
        self.unindex(id);
        self.slots.remove(&id).map(|slot| slot.entry)
    }

    /// Drops this entry's secondary-index references if they point at it.
    fn unindex(&mut self, id: ObjectId) {
        if let Some(slot) = self.slots.get(&id) {
            if let Some(n) = &slot.entry.name {
                if self.by_name.get(n) == Some(&id) {
                    self.by_name.remove(n);
                }
            }
            if let Some(p) = &slot.entry.payload {
                let hash = content_hash(p);
                if self.by_value.get(&hash) == Some(&id) {
                    self.by_value.remove(&hash);
                }
            }
        }
    }

    /// Increments the pin count, shielding the entry from eviction.
    pub fn pin(&mut self, id: ObjectId) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.pins += 1;
        }
    }

    /// Decrements the pin count.
    pub fn unpin(&mut self, id: ObjectId) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.pins = slot.pins.saturating_sub(1);
        }
    }

    /// Returns the pin count for an entry.
    #[must_use]
    pub fn pin_count(&self, id: ObjectId) -> u32 {
        self.slots.get(&id).map_or(0, |slot| slot.pins)
    }

    /// Evicts approximate-LRU victims until the cache fits its capacity.
    ///
    /// Pinned entries are never evicted; when everything resident is
    /// pinned the cache stays over capacity rather than refusing inserts.
    /// Returns the evicted entries. Unbounded caches evict nothing.
    pub fn evict_to_capacity(&mut self) -> Vec<CacheEntry> {
        let Some(capacity) = self.capacity else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        while self.slots.len() > capacity {
            let victim = self
                .slots
                .iter()
                .filter(|(_, slot)| slot.pins == 0)
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| *id);
            match victim {
                Some(id) => {
                    if let Some(entry) = self.remove(id) {
                        evicted.push(entry);
                    }
                }
                None => break,
            }
        }
        evicted
    }

    /// Discards every entry and index.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_name.clear();
        self.by_value.clear();
    }
}
