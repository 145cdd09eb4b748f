//! # OCStore Core
//!
//! Transactional caching layer over a backing object store.
//!
//! This crate provides:
//! - A process-wide shared cache of previously-fetched objects, indexed by
//!   ID, binding name, and payload identity
//! - A pessimistic lock manager with FIFO queuing and deadlock detection
//! - Per-transaction contexts with read-your-writes buffering and atomic
//!   commit/abort
//! - The [`CachingStore`] façade that wires the pieces together over any
//!   [`ocstore_backend::BackingStore`]
//!
//! ## Usage
//!
//! ```rust
//! use ocstore_backend::MemoryBackingStore;
//! use ocstore_core::{CachingStore, Config};
//! use std::sync::Arc;
//!
//! let backing = Arc::new(MemoryBackingStore::new());
//! let store = CachingStore::new(backing, Config::default());
//!
//! let mut txn = store.transaction().unwrap();
//! let id = txn.create(b"hello".to_vec(), "greeting").unwrap();
//! assert_eq!(txn.peek(id).unwrap(), Some(b"hello".to_vec()));
//! txn.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod lock;
pub mod stats;
pub mod store;
pub mod transaction;
pub mod types;

pub use cache::{CacheEntry, SharedCache, UpdateMode};
pub use config::{Config, DeadlockPolicy};
pub use error::{CoreError, CoreResult};
pub use lock::LockManager;
pub use stats::{StatsSnapshot, StoreStats};
pub use store::CachingStore;
pub use transaction::{Transaction, TxStatus};
pub use types::{ObjectId, TxId};
