//! Two-tier object cache.
//!
//! [`ObjectCache`] is the tri-indexed map (by ID, by binding name, by
//! payload identity) that backs both tiers: unbounded and thread-confined
//! as each transaction's private cache, bounded and mutex-guarded inside
//! [`SharedCache`] as the process-wide tier.

mod entry;
mod index;
mod shared;

pub use entry::{CacheEntry, UpdateMode};
pub use index::{content_hash, ObjectCache};
pub use shared::SharedCache;
