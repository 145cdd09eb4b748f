//! Cache entry record.

use crate::types::ObjectId;

/// Pending intent carried by a cache entry.
///
/// Intents other than `None` exist only in a transaction's private tier;
/// the shared tier coerces every entry to `None` on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Plain cached read; nothing to replay at commit.
    #[default]
    None,
    /// The owning transaction holds the exclusive lock and may have
    /// replaced the payload.
    Lock,
    /// The object is created by the owning transaction.
    Create,
    /// The object is destroyed by the owning transaction.
    Destroy,
}

impl UpdateMode {
    /// Returns `true` if this mode represents work to replay at commit.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// An in-memory record of one cached object.
///
/// Invariants:
/// - `Create` entries carry both `name` and `payload`
/// - `Destroy` entries need only `id`
/// - a `name`, when present, agrees with the owning cache's name index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The object's ID.
    pub id: ObjectId,
    /// Binding name, if the object was reached or created via one.
    pub name: Option<String>,
    /// Payload snapshot; absent for name-only bindings and destroy intents.
    pub payload: Option<Vec<u8>>,
    /// Pending intent of the owning transaction, if any.
    pub update_mode: UpdateMode,
}

impl CacheEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(
        update_mode: UpdateMode,
        id: ObjectId,
        name: Option<String>,
        payload: Option<Vec<u8>>,
    ) -> Self {
        debug_assert!(
            update_mode != UpdateMode::Create || (name.is_some() && payload.is_some()),
            "create entries carry a name and a payload"
        );
        Self {
            id,
            name,
            payload,
            update_mode,
        }
    }
}
