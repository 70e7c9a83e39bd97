use std::io;

use strata_types::ObjectHash;

/// Errors from store and backend operations.
///
/// Absence is not an error: lookups for objects that were never stored
/// return `Ok(None)`. These variants cover conditions that demand operator
/// attention; corruption and backend failure are never silently converted
/// into absence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A backend holds structurally invalid data for this hash.
    #[error("corrupt object {hash}")]
    Corrupt { hash: ObjectHash },

    /// A backend failed at the engine level.
    #[error("backend {backend} failed: {message}")]
    Backend { backend: String, message: String },

    /// I/O error from a file-backed backend.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An asynchronous fetch was dropped before its result was delivered.
    #[error("asynchronous fetch was abandoned before completion")]
    FetchAbandoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
