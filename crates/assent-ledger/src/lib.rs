//! # Assent Ledger
//!
//! The unified API for the Assent system - a cryptographically verifiable,
//! revocable consent receipt ledger.
//!
//! ## Overview
//!
//! The Assent Ledger provides a portable, offline-first library for:
//!
//! - **Receipts**: Immutable, signed records of consent grants
//! - **Revocations**: Immutable, terminal withdrawals of those grants
//! - **Status**: Deriving `Active | Expired | Revoked` at any instant
//! - **Tamper evidence**: A global anchor chain verifiable end-to-end
//!
//! ## Key Concepts
//!
//! - **Receipt**: Immutable. Never edited. Changes are new receipts chained
//!   to the old ones per subject.
//! - **Revocation**: Terminal. No state follows it for that receipt, and it
//!   wins over expiration from `revoked_at` onward.
//! - **Anchor chain**: Every appended record extends a global hash chain;
//!   `verify_chain` re-derives the whole chain from stored bytes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use assent_ledger::{Ledger, LedgerConfig};
//! use assent_core::{Keypair, ScopeSet, SubjectId};
//! use assent_store::SqliteStore;
//!
//! async fn example() {
//!     // The grantor's keypair signs receipts and revocations.
//!     let keypair = Keypair::generate();
//!
//!     // Open storage
//!     let store = SqliteStore::open("assent.db").unwrap();
//!
//!     // Create the ledger
//!     let ledger = Ledger::new(store, LedgerConfig::default());
//!
//!     // Grant consent
//!     let subject = SubjectId::derive("alice");
//!     let scope = ScopeSet::from_labels(["analytics"]).unwrap();
//!     let hash = ledger
//!         .grant(&keypair, subject, scope, 0, Some(100))
//!         .await
//!         .unwrap();
//!
//!     // Query status
//!     let status = ledger.status(&hash, 50).await.unwrap();
//!     assert!(status.is_active());
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `assent_ledger::core` - Core primitives (ConsentReceipt, ScopeSet, ...)
//! - `assent_ledger::store` - Storage abstraction and SQLite

pub mod error;
pub mod ledger;

// Re-export component crates
pub use assent_core as core;
pub use assent_store as store;

// Re-export main types for convenience
pub use error::{LedgerError, Result};
pub use ledger::{ChainReport, Ledger, LedgerConfig};

// Re-export commonly used core types
pub use assent_core::{
    ConsentReceipt, ConsentStatus, Keypair, PublicKey, ReceiptBuilder, ReceiptHash,
    RevocationRecord, Scope, ScopeSet, Signature, SubjectId,
};
