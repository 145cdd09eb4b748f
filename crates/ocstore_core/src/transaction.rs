//! Transaction context.

use crate::cache::{CacheEntry, ObjectCache, UpdateMode};
use crate::error::{CoreError, CoreResult};
use crate::store::StoreShared;
use crate::types::{ObjectId, TxId};
use ocstore_backend::BackingTransaction;
use std::collections::HashSet;
use std::sync::Arc;

/// Lifecycle state of a transaction.
///
/// Transitions are one-way: `Active -> Committing -> Committed` on the
/// commit path, `* -> Aborting -> Aborted` on the abort path.
/// `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Accepting operations.
    Active,
    /// Replaying pending updates; further operations are rejected.
    Committing,
    /// Successfully committed. Terminal.
    Committed,
    /// Tearing down. Further operations are rejected.
    Aborting,
    /// Rolled back. Terminal.
    Aborted,
}

impl TxStatus {
    /// Returns `true` for the two terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

/// A transactional view of the object store.
///
/// Each transaction owns a private cache tier that makes its own writes
/// visible immediately while hiding them from every other transaction
/// until commit. Mutating operations go through the store's lock manager,
/// so conflicting transactions serialize on the objects they contend for.
///
/// A transaction is thread-confined: it runs on one thread for its whole
/// lifetime. Dropping an open transaction aborts it.
///
/// # Example
///
/// ```rust
/// use ocstore_backend::MemoryBackingStore;
/// use ocstore_core::{CachingStore, Config};
/// use std::sync::Arc;
///
/// let store = CachingStore::new(Arc::new(MemoryBackingStore::new()), Config::default());
/// let mut txn = store.transaction().unwrap();
/// let id = txn.create(b"v".to_vec(), "name").unwrap();
/// txn.commit().unwrap();
/// ```
pub struct Transaction {
    id: TxId,
    shared: Arc<StoreShared>,
    backing: Box<dyn BackingTransaction>,
    /// Private cache tier; also the read barrier for this transaction.
    private: ObjectCache,
    /// Pending-update list, replayed in insertion order at commit.
    pending: Vec<ObjectId>,
    /// Locked entries whose payload was replaced and needs write-back.
    dirty: HashSet<ObjectId>,
    /// Shared-cache entries pinned on behalf of this transaction.
    pinned: HashSet<ObjectId>,
    /// Locks held, mirrored from the lock manager for the re-lock fast path.
    held: HashSet<ObjectId>,
    status: TxStatus,
}

impl Transaction {
    pub(crate) fn new(
        id: TxId,
        shared: Arc<StoreShared>,
        backing: Box<dyn BackingTransaction>,
    ) -> Self {
        Self {
            id,
            shared,
            backing,
            private: ObjectCache::unbounded(),
            pending: Vec::new(),
            dirty: HashSet::new(),
            pinned: HashSet::new(),
            held: HashSet::new(),
            status: TxStatus::Active,
        }
    }

    /// Returns this transaction's identity.
    #[must_use]
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Returns the application ID of the backing store.
    #[must_use]
    pub fn current_app_id(&self) -> u64 {
        self.backing.current_app_id()
    }

    /// Returns the number of pending updates awaiting commit.
    #[must_use]
    pub fn pending_update_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns the number of locks this transaction holds.
    #[must_use]
    pub fn held_lock_count(&self) -> usize {
        self.held.len()
    }

    /// Creates a new object bound to `name`, returning its fresh ID.
    ///
    /// No lock is taken: the ID is new, so no other transaction can reach
    /// it before this one commits. Name uniqueness is checked by the
    /// backing store at commit time.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` after commit/abort, or a backing error if
    /// the store cannot allocate an ID.
    pub fn create(&mut self, payload: Vec<u8>, name: &str) -> CoreResult<ObjectId> {
        self.ensure_active()?;
        let id = self.shared.backing.allocate_id()?;
        self.private.put(
            UpdateMode::Create,
            id,
            Some(name.to_owned()),
            Some(payload),
        );
        self.pend(id);
        Ok(id)
    }

    /// Marks an object for destruction at commit.
    ///
    /// No lock is required; destroying an ID this transaction never read
    /// is permitted (destruction of a detached handle).
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` after commit/abort.
    pub fn destroy(&mut self, id: ObjectId) -> CoreResult<()> {
        self.ensure_active()?;
        self.private.put(UpdateMode::Destroy, id, None, None);
        self.dirty.remove(&id);
        self.pend(id);
        Ok(())
    }

    /// Reads an object's payload without locking.
    ///
    /// Reads its own uncommitted writes first, then the shared cache, then
    /// the backing store. A value observed once stays stable for the rest
    /// of the transaction. Returns `None` for an absent object.
    ///
    /// Peeks are not serialized against concurrent writers; use
    /// [`lock`](Self::lock) for isolation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` after commit/abort, or a backing read error.
    pub fn peek(&mut self, id: ObjectId) -> CoreResult<Option<Vec<u8>>> {
        self.ensure_active()?;

        if let Some(entry) = self.private.entry(id) {
            if entry.update_mode == UpdateMode::Destroy {
                return Ok(None);
            }
            if entry.payload.is_some() {
                return Ok(entry.payload.clone());
            }
        }

        if let Some(entry) = self.shared.cache.get_by_id(id) {
            if let Some(payload) = entry.payload {
                self.shared.stats.record_shared_hit();
                self.pin(id);
                self.private_read_put(id, entry.name, Some(payload.clone()));
                return Ok(Some(payload));
            }
        }

        self.shared.stats.record_shared_miss();
        match self.backing.peek(id)? {
            Some(payload) => {
                self.private_read_put(id, None, Some(payload.clone()));
                self.warm_shared(id, None, payload.clone());
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }

    /// Reads an object's payload with intent to mutate.
    ///
    /// Acquires the exclusive lock *before* consulting any cache, so the
    /// value returned cannot be changed by another transaction while this
    /// one holds it. Locking the same ID twice is idempotent: the second
    /// call returns the cached value immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Deadlock`] if this transaction is victimized,
    /// `InvalidState` after commit/abort or for an object this transaction
    /// destroyed, or a backing error if the object does not exist.
    pub fn lock(&mut self, id: ObjectId) -> CoreResult<Vec<u8>> {
        self.ensure_active()?;

        if let Some(entry) = self.private.entry(id) {
            if entry.update_mode == UpdateMode::Destroy {
                return Err(CoreError::invalid_state(
                    "object destroyed in this transaction",
                ));
            }
        }

        if !self.held.contains(&id) {
            if let Err(e) = self.shared.locks.acquire(self.id, id) {
                if e.is_deadlock() {
                    self.shared.stats.record_deadlock();
                }
                return Err(e);
            }
            self.held.insert(id);
        }

        self.fetch_locked(id)
    }

    /// Replaces the payload of an object this transaction holds.
    ///
    /// Valid only for entries under `Lock` or `Create` mode; the new
    /// payload is visible to this transaction's reads immediately and is
    /// written back at commit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the object is not locked or created by
    /// this transaction.
    pub fn update(&mut self, id: ObjectId, payload: Vec<u8>) -> CoreResult<()> {
        self.ensure_active()?;
        let mode = self.private.entry(id).map(|entry| entry.update_mode);
        match mode {
            Some(UpdateMode::Lock) => {
                self.private.put(UpdateMode::Lock, id, None, Some(payload));
                self.dirty.insert(id);
                Ok(())
            }
            Some(UpdateMode::Create) => {
                self.private.put(UpdateMode::Create, id, None, Some(payload));
                Ok(())
            }
            _ => Err(CoreError::invalid_state(
                "update requires an entry locked or created by this transaction",
            )),
        }
    }

    /// Resolves a binding name to an object ID.
    ///
    /// Returns [`ObjectId::NIL`] if the name is unbound. Sees this
    /// transaction's own creations and destructions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` after commit/abort, or a backing error.
    pub fn lookup(&mut self, name: &str) -> CoreResult<ObjectId> {
        self.ensure_active()?;

        if let Some(id) = self.private.id_by_name(name) {
            return Ok(if self.destroyed_here(id) {
                ObjectId::NIL
            } else {
                id
            });
        }

        if let Some(id) = self.shared.cache.get_id_by_name(name) {
            self.shared.stats.record_shared_hit();
            self.pin(id);
            self.private_read_put(id, Some(name.to_owned()), None);
            return Ok(id);
        }

        self.shared.stats.record_shared_miss();
        let id = self.backing.lookup(name)?;
        if !id.is_nil() {
            self.private_read_put(id, Some(name.to_owned()), None);
        }
        Ok(id)
    }

    /// Resolves a payload to an object ID by content identity.
    ///
    /// Returns [`ObjectId::NIL`] if no object has an equal payload.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` after commit/abort, or a backing error.
    pub fn lookup_object(&mut self, payload: &[u8]) -> CoreResult<ObjectId> {
        self.ensure_active()?;

        if let Some(id) = self.private.id_by_value(payload) {
            return Ok(if self.destroyed_here(id) {
                ObjectId::NIL
            } else {
                id
            });
        }

        if let Some(id) = self.shared.cache.get_id_by_value(payload) {
            self.shared.stats.record_shared_hit();
            self.pin(id);
            self.private_read_put(id, None, Some(payload.to_vec()));
            return Ok(id);
        }

        self.shared.stats.record_shared_miss();
        let id = self.backing.lookup_object(payload)?;
        if !id.is_nil() {
            self.private_read_put(id, None, Some(payload.to_vec()));
        }
        Ok(id)
    }

    /// Commits the transaction.
    ///
    /// Replays pending updates against the backing store in insertion
    /// order, commits the backing transaction, publishes the results to
    /// the shared cache, and releases all locks. On any backing failure
    /// the transaction is aborted (locks released, nothing published) and
    /// the error propagates.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if not active, or the backing failure.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.status = TxStatus::Committing;

        if let Err(e) = self.replay_pending() {
            tracing::warn!(tx = %self.id, error = %e, "commit failed, aborting");
            self.status = TxStatus::Aborting;
            self.discard();
            self.status = TxStatus::Aborted;
            self.shared.stats.record_transaction_abort();
            return Err(e);
        }

        // Publish while still holding locks: the next holder of any
        // contended object must observe this transaction's committed value.
        let published: Vec<CacheEntry> = self
            .pending
            .iter()
            .filter_map(|id| self.private.entry(*id).cloned())
            .collect();
        self.shared.publish_commit(published);

        self.shared.locks.release_all(self.id);
        self.unpin_all();
        self.pending.clear();
        self.dirty.clear();
        self.held.clear();
        self.status = TxStatus::Committed;
        self.shared.stats.record_transaction_commit();
        Ok(())
    }

    /// Aborts the transaction.
    ///
    /// Releases all locks, discards the private cache and pending updates,
    /// and rolls back the backing transaction. Idempotent: aborting an
    /// already-aborted transaction succeeds; a fresh transaction aborts as
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` only if the transaction already committed.
    pub fn abort(&mut self) -> CoreResult<()> {
        match self.status {
            TxStatus::Committed => Err(CoreError::invalid_state(
                "transaction already committed",
            )),
            TxStatus::Aborted => Ok(()),
            _ => {
                self.status = TxStatus::Aborting;
                self.discard();
                self.status = TxStatus::Aborted;
                self.shared.stats.record_transaction_abort();
                Ok(())
            }
        }
    }

    // === Internal helpers ===

    fn ensure_active(&self) -> CoreResult<()> {
        if self.status == TxStatus::Active {
            Ok(())
        } else {
            Err(CoreError::invalid_state(format!(
                "transaction is {:?}, not active",
                self.status
            )))
        }
    }

    /// Appends `id` to the pending-update list exactly once.
    fn pend(&mut self, id: ObjectId) {
        if !self.pending.contains(&id) {
            self.pending.push(id);
        }
    }

    fn destroyed_here(&self, id: ObjectId) -> bool {
        self.private
            .entry(id)
            .is_some_and(|entry| entry.update_mode == UpdateMode::Destroy)
    }

    /// Inserts a read result into the private tier without downgrading an
    /// existing pending intent.
    fn private_read_put(&mut self, id: ObjectId, name: Option<String>, payload: Option<Vec<u8>>) {
        let mode = self
            .private
            .entry(id)
            .map_or(UpdateMode::None, |entry| entry.update_mode);
        self.private.put(mode, id, name, payload);
    }

    /// Inserts a freshly-fetched payload into the shared tier and pins it.
    fn warm_shared(&mut self, id: ObjectId, name: Option<String>, payload: Vec<u8>) {
        let evicted = self.shared.cache.put(id, name, Some(payload));
        if !evicted.is_empty() {
            self.shared.stats.record_evictions(evicted.len() as u64);
        }
        self.pin(id);
    }

    fn pin(&mut self, id: ObjectId) {
        if self.pinned.insert(id) {
            self.shared.cache.pin(id);
        }
    }

    fn unpin_all(&mut self) {
        for id in self.pinned.drain() {
            self.shared.cache.unpin(id);
        }
    }

    /// Fetches the value of a locked object through the read cascade and
    /// records the `Lock` intent.
    fn fetch_locked(&mut self, id: ObjectId) -> CoreResult<Vec<u8>> {
        if let Some(entry) = self.private.entry(id) {
            if let Some(payload) = entry.payload.clone() {
                if entry.update_mode == UpdateMode::None {
                    self.private.put(UpdateMode::Lock, id, None, None);
                    self.pend(id);
                }
                return Ok(payload);
            }
        }

        if let Some(entry) = self.shared.cache.get_by_id(id) {
            if let Some(payload) = entry.payload {
                self.shared.stats.record_shared_hit();
                self.pin(id);
                self.private
                    .put(UpdateMode::Lock, id, entry.name, Some(payload.clone()));
                self.pend(id);
                return Ok(payload);
            }
        }

        self.shared.stats.record_shared_miss();
        let payload = self.backing.lock(id)?;
        self.private
            .put(UpdateMode::Lock, id, None, Some(payload.clone()));
        self.pend(id);
        self.warm_shared(id, None, payload.clone());
        Ok(payload)
    }

    /// Replays the pending-update list against the backing store and
    /// commits it. `Lock` entries are written back only when their payload
    /// changed.
    fn replay_pending(&mut self) -> CoreResult<()> {
        for &id in &self.pending {
            let Some(entry) = self.private.entry(id) else {
                continue;
            };
            match entry.update_mode {
                UpdateMode::Create => {
                    let name = entry.name.clone().ok_or_else(|| {
                        CoreError::invalid_state("create entry missing its name")
                    })?;
                    let payload = entry.payload.clone().ok_or_else(|| {
                        CoreError::invalid_state("create entry missing its payload")
                    })?;
                    self.backing.create(id, payload, &name)?;
                }
                UpdateMode::Destroy => self.backing.destroy(id)?,
                UpdateMode::Lock => {
                    if self.dirty.contains(&id) {
                        let payload = entry.payload.clone().ok_or_else(|| {
                            CoreError::invalid_state("locked entry missing its payload")
                        })?;
                        self.backing.update(id, payload)?;
                    }
                }
                UpdateMode::None => {}
            }
        }
        self.backing.commit()?;
        Ok(())
    }

    /// Releases locks and pins, drops buffered state, and rolls back the
    /// backing transaction.
    fn discard(&mut self) {
        self.shared.locks.release_all(self.id);
        self.unpin_all();
        self.private.clear();
        self.pending.clear();
        self.dirty.clear();
        self.held.clear();
        if let Err(e) = self.backing.abort() {
            tracing::warn!(tx = %self.id, error = %e, "backing abort failed");
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // An open transaction dropped without commit/abort rolls back, so
        // locks and pins cannot leak past a panic or early return.
        if !self.status.is_terminal() {
            tracing::trace!(tx = %self.id, "open transaction dropped, aborting");
            self.status = TxStatus::Aborting;
            self.discard();
            self.status = TxStatus::Aborted;
            self.shared.stats.record_transaction_abort();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("pending", &self.pending.len())
            .field("held_locks", &self.held.len())
            .finish_non_exhaustive()
    }
}
