//! Backing-store trait definitions.

use crate::error::BackingResult;
use crate::id::ObjectId;

/// A backing object store.
///
/// Backing stores are **opaque keyed maps**: object ID to payload bytes,
/// plus a global directory of binding names. The caching layer owns all
/// buffering and coherence - backing stores do not cache, and every call
/// on a [`BackingTransaction`] performs the work.
///
/// # Invariants
///
/// - `allocate_id` returns monotonically increasing, never-reused IDs ≥ 0
/// - `begin` hands out one transaction handle per caller; handles are
///   independent until commit
/// - `commit` applies a transaction's effects atomically: either every
///   buffered operation becomes visible or none does
///
/// # Implementors
///
/// - [`crate::MemoryBackingStore`] - in-memory store of record, used by
///   tests and ephemeral deployments
pub trait BackingStore: Send + Sync {
    /// Allocates the next object ID.
    ///
    /// IDs are process-global: two transactions never receive the same ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot allocate (e.g. I/O failure in a
    /// persistent implementation).
    fn allocate_id(&self) -> BackingResult<ObjectId>;

    /// Begins a new transaction against the store.
    ///
    /// Each transaction context above holds exactly one backing handle for
    /// its lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction cannot be started.
    fn begin(&self) -> BackingResult<Box<dyn BackingTransaction>>;
}

/// A single transaction against a backing store.
///
/// Handles are transaction-scoped and thread-confined; they buffer
/// mutations and apply them atomically at [`commit`](Self::commit).
/// After `commit` or `abort` the handle is closed and every further call
/// fails with [`crate::BackingError::TransactionClosed`].
pub trait BackingTransaction: Send {
    /// Records creation of an object under a binding name.
    ///
    /// The ID must come from [`BackingStore::allocate_id`]. Name uniqueness
    /// is validated at commit time, where a duplicate fails the whole
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is closed.
    fn create(&mut self, id: ObjectId, payload: Vec<u8>, name: &str) -> BackingResult<()>;

    /// Records destruction of an object.
    ///
    /// Destroying an ID that does not exist at commit time is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is closed.
    fn destroy(&mut self, id: ObjectId) -> BackingResult<()>;

    /// Reads an object's payload without any locking intent.
    ///
    /// Returns `None` if the object does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is closed or the read fails.
    fn peek(&self, id: ObjectId) -> BackingResult<Option<Vec<u8>>>;

    /// Reads an object's payload with intent to mutate.
    ///
    /// The caching layer has already serialized access via its lock
    /// manager before calling this.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BackingError::ObjectNotFound`] if the object does
    /// not exist, or an error if the handle is closed.
    fn lock(&mut self, id: ObjectId) -> BackingResult<Vec<u8>>;

    /// Records replacement of an object's payload.
    ///
    /// The object must exist (possibly created earlier in this same
    /// transaction) when the transaction commits.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is closed.
    fn update(&mut self, id: ObjectId, payload: Vec<u8>) -> BackingResult<()>;

    /// Resolves a binding name to an object ID.
    ///
    /// Returns [`ObjectId::NIL`] if the name is unbound.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is closed.
    fn lookup(&self, name: &str) -> BackingResult<ObjectId>;

    /// Resolves a payload value to an object ID by content equality.
    ///
    /// Returns [`ObjectId::NIL`] if no object has an equal payload. When
    /// several objects compare equal, the smallest ID is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is closed.
    fn lookup_object(&self, payload: &[u8]) -> BackingResult<ObjectId>;

    /// Applies all buffered operations atomically and closes the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails (e.g. duplicate binding name)
    /// or the store cannot apply the transaction. On error nothing is
    /// applied.
    fn commit(&mut self) -> BackingResult<()>;

    /// Discards all buffered operations and closes the handle.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store cannot release resources;
    /// aborting an already-closed handle is a no-op.
    fn abort(&mut self) -> BackingResult<()>;

    /// Returns the application ID this store serves.
    fn current_app_id(&self) -> u64;
}
