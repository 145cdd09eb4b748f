//! Object identifier.

use std::fmt;

/// Unique identifier for a stored object.
///
/// Object IDs are signed 64-bit values that are:
/// - Allocated monotonically by the backing store
/// - Never reused within a process lifetime
/// - Non-negative when valid
///
/// The value `-1` is reserved as the *absent* sentinel ([`ObjectId::NIL`]),
/// returned by name and value lookups that find nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub i64);

impl ObjectId {
    /// The *absent* sentinel.
    pub const NIL: Self = Self(-1);

    /// Creates an object ID from a raw value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns `true` if this is the absent sentinel.
    #[must_use]
    pub const fn is_nil(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}
