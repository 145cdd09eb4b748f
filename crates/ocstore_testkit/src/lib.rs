//! # OCStore Testkit
//!
//! Test utilities for OCStore.
//!
//! This crate provides:
//! - Store fixtures over an in-memory backing store
//! - Random payload and name generators
//! - A multi-threaded lock-contention stress harness
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ocstore_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_store(|store| {
//!         let mut txn = store.transaction().unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
