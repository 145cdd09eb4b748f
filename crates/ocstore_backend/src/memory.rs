//! In-memory backing store.

use crate::backing::{BackingStore, BackingTransaction};
use crate::error::{BackingError, BackingResult};
use crate::id::ObjectId;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Committed store state: the keyed object map plus the name directory.
#[derive(Debug, Default)]
struct StoreState {
    objects: HashMap<ObjectId, Vec<u8>>,
    names: HashMap<String, ObjectId>,
}

/// An in-memory backing object store.
///
/// This store keeps everything in memory and is suitable for:
/// - Unit and integration tests
/// - Ephemeral deployments that don't need persistence
///
/// Transactions buffer their mutations and apply them all-or-nothing at
/// commit under the store's write lock, so commit atomicity holds even
/// though there is no journal underneath.
///
/// # Example
///
/// ```rust
/// use ocstore_backend::{BackingStore, MemoryBackingStore};
///
/// let store = MemoryBackingStore::new();
/// let id = store.allocate_id().unwrap();
/// let mut txn = store.begin().unwrap();
/// txn.create(id, b"payload".to_vec(), "greeting").unwrap();
/// txn.commit().unwrap();
/// ```
#[derive(Debug)]
pub struct MemoryBackingStore {
    state: Arc<RwLock<StoreState>>,
    next_id: AtomicI64,
    app_id: u64,
}

impl MemoryBackingStore {
    /// Creates a new empty store for application ID 0.
    #[must_use]
    pub fn new() -> Self {
        Self::with_app_id(0)
    }

    /// Creates a new empty store serving the given application ID.
    #[must_use]
    pub fn with_app_id(app_id: u64) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            next_id: AtomicI64::new(0),
            app_id,
        }
    }

    /// Returns the number of committed objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.state.read().objects.len()
    }
}

impl Default for MemoryBackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStore for MemoryBackingStore {
    fn allocate_id(&self) -> BackingResult<ObjectId> {
        Ok(ObjectId::new(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn begin(&self) -> BackingResult<Box<dyn BackingTransaction>> {
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            app_id: self.app_id,
            pending: Vec::new(),
            closed: false,
        }))
    }
}

/// A buffered operation awaiting commit.
#[derive(Debug)]
enum PendingOp {
    Create {
        id: ObjectId,
        payload: Vec<u8>,
        name: String,
    },
    Destroy {
        id: ObjectId,
    },
    Update {
        id: ObjectId,
        payload: Vec<u8>,
    },
}

/// A transaction against a [`MemoryBackingStore`].
#[derive(Debug)]
struct MemoryTransaction {
    state: Arc<RwLock<StoreState>>,
    app_id: u64,
    pending: Vec<PendingOp>,
    closed: bool,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> BackingResult<()> {
        if self.closed {
            Err(BackingError::TransactionClosed)
        } else {
            Ok(())
        }
    }

    /// Resolves `id` through this transaction's buffered operations, falling
    /// back to committed state. `None` means the object does not exist from
    /// this transaction's point of view.
    fn read_overlay(&self, id: ObjectId) -> Option<Vec<u8>> {
        for op in self.pending.iter().rev() {
            match op {
                PendingOp::Create { id: oid, payload, .. }
                | PendingOp::Update { id: oid, payload } => {
                    if *oid == id {
                        return Some(payload.clone());
                    }
                }
                PendingOp::Destroy { id: oid } => {
                    if *oid == id {
                        return None;
                    }
                }
            }
        }
        self.state.read().objects.get(&id).cloned()
    }

    /// Validates the buffered operations against committed state.
    ///
    /// Runs before any mutation so a failed commit leaves the store
    /// untouched.
    fn validate(&self, state: &StoreState) -> BackingResult<()> {
        let mut created: HashSet<ObjectId> = HashSet::new();
        let mut destroyed: HashSet<ObjectId> = HashSet::new();
        let mut bound: HashSet<&str> = HashSet::new();

        for op in &self.pending {
            match op {
                PendingOp::Create { id, name, .. } => {
                    if state.objects.contains_key(id) {
                        return Err(BackingError::rejected(format!(
                            "object ID reused: {id}"
                        )));
                    }
                    if state.names.contains_key(name.as_str()) || !bound.insert(name.as_str()) {
                        return Err(BackingError::name_exists(name.clone()));
                    }
                    created.insert(*id);
                    destroyed.remove(id);
                }
                PendingOp::Destroy { id } => {
                    destroyed.insert(*id);
                    created.remove(id);
                }
                PendingOp::Update { id, .. } => {
                    let exists = (state.objects.contains_key(id) || created.contains(id))
                        && !destroyed.contains(id);
                    if !exists {
                        return Err(BackingError::object_not_found(*id));
                    }
                }
            }
        }
        Ok(())
    }
}

impl BackingTransaction for MemoryTransaction {
    fn create(&mut self, id: ObjectId, payload: Vec<u8>, name: &str) -> BackingResult<()> {
        self.ensure_open()?;
        self.pending.push(PendingOp::Create {
            id,
            payload,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn destroy(&mut self, id: ObjectId) -> BackingResult<()> {
        self.ensure_open()?;
        self.pending.push(PendingOp::Destroy { id });
        Ok(())
    }

    fn peek(&self, id: ObjectId) -> BackingResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.read_overlay(id))
    }

    fn lock(&mut self, id: ObjectId) -> BackingResult<Vec<u8>> {
        self.ensure_open()?;
        self.read_overlay(id)
            .ok_or(BackingError::ObjectNotFound { id })
    }

    fn update(&mut self, id: ObjectId, payload: Vec<u8>) -> BackingResult<()> {
        self.ensure_open()?;
        self.pending.push(PendingOp::Update { id, payload });
        Ok(())
    }

    fn lookup(&self, name: &str) -> BackingResult<ObjectId> {
        self.ensure_open()?;
        for op in self.pending.iter().rev() {
            if let PendingOp::Create { id, name: bound, .. } = op {
                if bound == name {
                    return Ok(*id);
                }
            }
        }
        let state = self.state.read();
        match state.names.get(name) {
            Some(id) => {
                let destroyed = self
                    .pending
                    .iter()
                    .any(|op| matches!(op, PendingOp::Destroy { id: oid } if oid == id));
                Ok(if destroyed { ObjectId::NIL } else { *id })
            }
            None => Ok(ObjectId::NIL),
        }
    }

    fn lookup_object(&self, payload: &[u8]) -> BackingResult<ObjectId> {
        self.ensure_open()?;
        for op in self.pending.iter().rev() {
            match op {
                PendingOp::Create { id, payload: p, .. }
                | PendingOp::Update { id, payload: p } => {
                    if p.as_slice() == payload {
                        return Ok(*id);
                    }
                }
                PendingOp::Destroy { .. } => {}
            }
        }
        let state = self.state.read();
        let shadowed = |id: &ObjectId| {
            self.pending.iter().any(|op| match op {
                PendingOp::Destroy { id: oid } | PendingOp::Update { id: oid, .. } => oid == id,
                PendingOp::Create { .. } => false,
            })
        };
        Ok(state
            .objects
            .iter()
            .filter(|(id, p)| p.as_slice() == payload && !shadowed(id))
            .map(|(id, _)| *id)
            .min()
            .unwrap_or(ObjectId::NIL))
    }

    fn commit(&mut self) -> BackingResult<()> {
        self.ensure_open()?;
        self.closed = true;

        let mut state = self.state.write();
        self.validate(&state)?;

        for op in self.pending.drain(..) {
            match op {
                PendingOp::Create { id, payload, name } => {
                    state.objects.insert(id, payload);
                    state.names.insert(name, id);
                }
                PendingOp::Destroy { id } => {
                    state.objects.remove(&id);
                    state.names.retain(|_, bound| *bound != id);
                }
                PendingOp::Update { id, payload } => {
                    state.objects.insert(id, payload);
                }
            }
        }
        Ok(())
    }

    fn abort(&mut self) -> BackingResult<()> {
        self.closed = true;
        self.pending.clear();
        Ok(())
    }

    fn current_app_id(&self) -> u64 {
        self.app_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_object(store: &MemoryBackingStore, payload: &[u8], name: &str) -> ObjectId {
        let id = store.allocate_id().unwrap();
        let mut txn = store.begin().unwrap();
        txn.create(id, payload.to_vec(), name).unwrap();
        txn.commit().unwrap();
        id
    }

    #[test]
    fn allocate_is_monotonic() {
        let store = MemoryBackingStore::new();
        let a = store.allocate_id().unwrap();
        let b = store.allocate_id().unwrap();
        assert!(a.as_i64() >= 0);
        assert!(b > a);
    }

    #[test]
    fn create_commit_visible() {
        let store = MemoryBackingStore::new();
        let id = create_object(&store, b"hello", "a");

        let txn = store.begin().unwrap();
        assert_eq!(txn.peek(id).unwrap(), Some(b"hello".to_vec()));
        assert_eq!(txn.lookup("a").unwrap(), id);
    }

    #[test]
    fn abort_discards_pending() {
        let store = MemoryBackingStore::new();
        let id = store.allocate_id().unwrap();
        let mut txn = store.begin().unwrap();
        txn.create(id, b"x".to_vec(), "a").unwrap();
        txn.abort().unwrap();

        let reader = store.begin().unwrap();
        assert_eq!(reader.peek(id).unwrap(), None);
        assert_eq!(reader.lookup("a").unwrap(), ObjectId::NIL);
    }

    #[test]
    fn duplicate_name_fails_whole_commit() {
        let store = MemoryBackingStore::new();
        create_object(&store, b"first", "a");

        let id2 = store.allocate_id().unwrap();
        let id3 = store.allocate_id().unwrap();
        let mut txn = store.begin().unwrap();
        txn.create(id2, b"second".to_vec(), "b").unwrap();
        txn.create(id3, b"third".to_vec(), "a").unwrap();

        let result = txn.commit();
        assert!(matches!(result, Err(BackingError::NameExists { .. })));

        // Nothing from the failed transaction is visible.
        let reader = store.begin().unwrap();
        assert_eq!(reader.peek(id2).unwrap(), None);
        assert_eq!(reader.lookup("b").unwrap(), ObjectId::NIL);
    }

    #[test]
    fn destroy_removes_object_and_name() {
        let store = MemoryBackingStore::new();
        let id = create_object(&store, b"x", "a");

        let mut txn = store.begin().unwrap();
        txn.destroy(id).unwrap();
        txn.commit().unwrap();

        let reader = store.begin().unwrap();
        assert_eq!(reader.peek(id).unwrap(), None);
        assert_eq!(reader.lookup("a").unwrap(), ObjectId::NIL);
    }

    #[test]
    fn destroy_of_missing_object_is_noop() {
        let store = MemoryBackingStore::new();
        let mut txn = store.begin().unwrap();
        txn.destroy(ObjectId::new(99)).unwrap();
        txn.commit().unwrap();
        assert_eq!(store.object_count(), 0);
    }

    #[test]
    fn update_replaces_payload() {
        let store = MemoryBackingStore::new();
        let id = create_object(&store, b"old", "a");

        let mut txn = store.begin().unwrap();
        txn.update(id, b"new".to_vec()).unwrap();
        txn.commit().unwrap();

        let reader = store.begin().unwrap();
        assert_eq!(reader.peek(id).unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn update_of_missing_object_fails_commit() {
        let store = MemoryBackingStore::new();
        let mut txn = store.begin().unwrap();
        txn.update(ObjectId::new(5), b"x".to_vec()).unwrap();
        assert!(matches!(
            txn.commit(),
            Err(BackingError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn lock_returns_payload_or_fails() {
        let store = MemoryBackingStore::new();
        let id = create_object(&store, b"v", "a");

        let mut txn = store.begin().unwrap();
        assert_eq!(txn.lock(id).unwrap(), b"v".to_vec());
        assert!(matches!(
            txn.lock(ObjectId::new(404)),
            Err(BackingError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn reads_see_own_buffered_writes() {
        let store = MemoryBackingStore::new();
        let id = store.allocate_id().unwrap();
        let mut txn = store.begin().unwrap();
        txn.create(id, b"mine".to_vec(), "a").unwrap();

        assert_eq!(txn.peek(id).unwrap(), Some(b"mine".to_vec()));
        assert_eq!(txn.lookup("a").unwrap(), id);

        txn.destroy(id).unwrap();
        assert_eq!(txn.peek(id).unwrap(), None);
    }

    #[test]
    fn lookup_object_returns_smallest_match() {
        let store = MemoryBackingStore::new();
        let first = create_object(&store, b"same", "a");
        create_object(&store, b"same", "b");

        let txn = store.begin().unwrap();
        assert_eq!(txn.lookup_object(b"same").unwrap(), first);
        assert_eq!(txn.lookup_object(b"absent").unwrap(), ObjectId::NIL);
    }

    #[test]
    fn closed_handle_rejects_operations() {
        let store = MemoryBackingStore::new();
        let mut txn = store.begin().unwrap();
        txn.commit().unwrap();

        assert!(matches!(
            txn.peek(ObjectId::new(0)),
            Err(BackingError::TransactionClosed)
        ));
        assert!(matches!(
            txn.create(ObjectId::new(0), vec![], "a"),
            Err(BackingError::TransactionClosed)
        ));
        // Abort after close stays a no-op.
        assert!(txn.abort().is_ok());
    }

    #[test]
    fn current_app_id_is_reported() {
        let store = MemoryBackingStore::with_app_id(7);
        let txn = store.begin().unwrap();
        assert_eq!(txn.current_app_id(), 7);
    }
}
