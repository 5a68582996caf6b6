//! Error types for the Assent core.

use thiserror::Error;

use crate::types::ReceiptHash;

/// Core errors that can occur during receipt and revocation operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("unsupported record version: {0}")]
    UnsupportedVersion(u8),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Validation errors for receipt and revocation structure and signatures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("signature verification failed")]
    SignatureFailed,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("scope set exceeds maximum of {max}: {count}")]
    TooManyScopes { count: usize, max: usize },

    #[error("expiry {expires_at} is not after issuance {issued_at}")]
    ExpiresBeforeIssued { issued_at: i64, expires_at: i64 },

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ValidationError::SignatureFailed
            }
            CoreError::UnsupportedVersion(v) => ValidationError::UnsupportedVersion(v),
            CoreError::InvalidScope(msg)
            | CoreError::MalformedRecord(msg)
            | CoreError::DecodingError(msg) => ValidationError::StructuralError(msg),
        }
    }
}

/// Errors detected while extending or auditing the hash chains.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("subject head mismatch: expected {expected:?}, got {got:?}")]
    HeadMismatch {
        expected: Option<ReceiptHash>,
        got: Option<ReceiptHash>,
    },

    #[error("non-contiguous anchor height: expected {expected}, got {got}")]
    NonContiguousHeight { expected: u64, got: u64 },

    #[error("anchor link mismatch at height {height}")]
    LinkMismatch { height: u64 },

    #[error("anchor hash mismatch at height {height}")]
    HashMismatch { height: u64 },

    #[error("anchored record mismatch at height {height}")]
    RecordMismatch { height: u64 },
}
