//! Error types for backing-store operations.

use crate::id::ObjectId;
use std::io;
use thiserror::Error;

/// Result type for backing-store operations.
pub type BackingResult<T> = Result<T, BackingError>;

/// Errors that can occur in the backing object store.
#[derive(Debug, Error)]
pub enum BackingError {
    /// A binding name is already taken by a live object.
    #[error("name already bound: {name}")]
    NameExists {
        /// The conflicting binding name.
        name: String,
    },

    /// The requested object does not exist in the store.
    #[error("object not found: {id}")]
    ObjectNotFound {
        /// The missing object ID.
        id: ObjectId,
    },

    /// The transaction handle was used after commit or abort.
    #[error("backing transaction is closed")]
    TransactionClosed,

    /// The store rejected the operation.
    #[error("operation rejected: {message}")]
    Rejected {
        /// Description of the rejection.
        message: String,
    },

    /// An I/O error from the underlying store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BackingError {
    /// Creates a name-exists error.
    pub fn name_exists(name: impl Into<String>) -> Self {
        Self::NameExists { name: name.into() }
    }

    /// Creates an object-not-found error.
    #[must_use]
    pub fn object_not_found(id: ObjectId) -> Self {
        Self::ObjectNotFound { id }
    }

    /// Creates a rejected error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}
