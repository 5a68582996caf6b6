//! Error types for the Ledger.

use assent_core::{ChainError, ReceiptHash, ValidationError};
use assent_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Ledger operations.
///
/// All of these are recoverable at the caller; none are fatal to the
/// process.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A receipt with identical content already exists.
    #[error("duplicate receipt: {0}")]
    DuplicateReceipt(ReceiptHash),

    /// A mutation or status query referenced a receipt the ledger does not
    /// hold.
    #[error("unknown receipt: {0}")]
    UnknownReceipt(ReceiptHash),

    /// A lookup referenced a receipt the ledger does not hold.
    #[error("receipt not found: {0}")]
    NotFound(ReceiptHash),

    /// A signature did not verify against the original grantor key.
    #[error("invalid signature")]
    InvalidSignature,

    /// The receipt already carries a different revocation.
    #[error("receipt already revoked: {0}")]
    AlreadyRevoked(ReceiptHash),

    /// Consent is not valid for the requested use.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Chain integrity error.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for Ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
