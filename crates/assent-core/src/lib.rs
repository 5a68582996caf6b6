//! # Assent Core
//!
//! Pure primitives for the Assent consent ledger: receipts, revocations,
//! scopes, and canonicalization.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`ConsentReceipt`] - An immutable, signed record of one consent grant
//! - [`RevocationRecord`] - The immutable, terminal withdrawal of a grant
//! - [`ConsentStatus`] - The derived validity of a receipt at an instant
//! - [`ReceiptHash`] - Content-addressed identifier (domain-separated Blake3)
//! - [`AnchorEntry`] - One link in the global tamper-evidence chain
//!
//! ## Canonicalization
//!
//! All records are encoded using deterministic CBOR. See [`canonical`].

pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod receipt;
pub mod revocation;
pub mod scope;
pub mod status;
pub mod types;
pub mod validation;

pub use canonical::{
    canonical_receipt_bytes, canonical_revocation_bytes, decode_receipt, decode_revocation,
};
pub use chain::{verify_chain, AnchorEntry, AnchorHash, RecordKind, SubjectLog};
pub use crypto::{ContentHash, Keypair, PublicKey, Signature};
pub use error::{ChainError, CoreError, ValidationError};
pub use receipt::{ConsentReceipt, ReceiptBuilder};
pub use revocation::RevocationRecord;
pub use scope::{Scope, ScopeSet};
pub use status::ConsentStatus;
pub use types::{ReceiptHash, RevocationHash, SubjectId};
pub use validation::{validate_receipt, validate_receipt_structure, validate_revocation};
