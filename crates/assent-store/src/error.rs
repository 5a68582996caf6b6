//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Revocation referencing a receipt the store does not hold.
    #[error("orphan revocation: no receipt with hash {0}")]
    OrphanRevocation(String),

    /// A different revocation already exists for the receipt.
    #[error("conflicting revocation for receipt {receipt_hash}: existing record {existing}")]
    Conflict {
        receipt_hash: String,
        existing: String,
    },

    /// Connection-level failure (poisoned mutex, dead blocking task).
    #[error("connection error: {0}")]
    Connection(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
