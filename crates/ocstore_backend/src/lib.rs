//! # OCStore Backend
//!
//! Backing object-store interface for the OCStore caching layer.
//!
//! This crate provides:
//! - The [`BackingStore`] / [`BackingTransaction`] trait pair that the
//!   caching layer depends on
//! - [`ObjectId`], the store-allocated object identifier
//! - [`MemoryBackingStore`], an in-memory reference implementation
//!
//! Backing stores are the *store of record*: they own durability, ID
//! allocation, and commit atomicity. The caching layer above them owns
//! buffering, locking, and cross-transaction coherence.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backing;
mod error;
mod id;
mod memory;

pub use backing::{BackingStore, BackingTransaction};
pub use error::{BackingError, BackingResult};
pub use id::ObjectId;
pub use memory::MemoryBackingStore;
