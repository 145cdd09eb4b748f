//! Error types for the caching layer.

use crate::types::{ObjectId, TxId};
use ocstore_backend::BackingError;
use thiserror::Error;

/// Result type for caching-layer operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the caching layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The transaction was chosen as a deadlock victim.
    ///
    /// The transaction must be aborted; the operation may be retried in a
    /// fresh transaction. A lock-acquisition timeout surfaces as the same
    /// error.
    #[error("deadlock: {tx} victimized while acquiring {id}")]
    Deadlock {
        /// The victimized transaction.
        tx: TxId,
        /// The object whose lock was being acquired.
        id: ObjectId,
    },

    /// Operation against a terminal or otherwise unusable transaction.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Error passed through from the backing store.
    #[error("backing store error: {0}")]
    Backing(#[from] BackingError),
}

impl CoreError {
    /// Creates a deadlock error.
    #[must_use]
    pub fn deadlock(tx: TxId, id: ObjectId) -> Self {
        Self::Deadlock { tx, id }
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is a deadlock victimization.
    ///
    /// Callers typically abort and retry on deadlock.
    #[must_use]
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Self::Deadlock { .. })
    }
}
