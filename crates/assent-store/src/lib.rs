//! # Assent Store
//!
//! Storage abstraction for the Assent ledger. Provides a trait-based
//! interface for receipt and revocation persistence with SQLite and
//! in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`Store`] trait,
//! keeping the ledger storage-agnostic. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`AppendOutcome`] - Result of appending a record
//!
//! ## Design Notes
//!
//! - **Idempotent appends**: Inserting the same record twice returns
//!   `AlreadyExists`
//! - **No orphans**: A revocation without its receipt is rejected
//! - **Canonical bytes cached**: The chain can be re-verified against the
//!   bytes that were actually stored

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AppendOutcome, Store};
