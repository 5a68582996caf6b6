//! Store trait: the abstract interface for ledger persistence.
//!
//! This trait keeps the ledger storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use assent_core::{
    AnchorEntry, ConsentReceipt, ReceiptHash, RevocationHash, RevocationRecord, SubjectId,
    SubjectLog,
};

use crate::error::Result;

/// Result of appending a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was appended.
    Appended,
    /// A byte-identical record already exists (idempotent - not an error).
    AlreadyExists,
}

/// The Store trait: async interface for ledger persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite we use `spawn_blocking` internally to avoid blocking the
/// runtime.
///
/// # Design Notes
///
/// - **Idempotent appends**: Inserting the same record twice returns
///   `AlreadyExists`.
/// - **No orphans**: Inserting a revocation whose receipt is absent fails
///   with `OrphanRevocation`. A second, different revocation for the same
///   receipt fails with `Conflict`.
/// - **Canonical bytes cached**: Every record's canonical encoding is
///   stored alongside it so the anchor chain can be re-verified against
///   the actual bytes at any time.
/// - **Serialization of writes** is the caller's job: the ledger holds a
///   single-writer lock around every mutation.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────
    // Receipt Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a consent receipt.
    ///
    /// # Arguments
    /// - `receipt`: The receipt to insert.
    /// - `canonical`: The canonical bytes (cached to avoid recomputation).
    async fn insert_receipt(
        &self,
        receipt: &ConsentReceipt,
        canonical: &[u8],
    ) -> Result<AppendOutcome>;

    /// Get a receipt by its content address.
    async fn get_receipt(&self, hash: &ReceiptHash) -> Result<Option<ConsentReceipt>>;

    /// Check whether a receipt exists.
    async fn has_receipt(&self, hash: &ReceiptHash) -> Result<bool>;

    /// Get the cached canonical bytes of a receipt.
    async fn receipt_canonical(&self, hash: &ReceiptHash) -> Result<Option<Vec<u8>>>;

    // ─────────────────────────────────────────────────────────────────────
    // Revocation Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a revocation record.
    ///
    /// Fails with `OrphanRevocation` if the referenced receipt is absent,
    /// and with `Conflict` if a different revocation already covers it.
    async fn insert_revocation(
        &self,
        record: &RevocationRecord,
        canonical: &[u8],
    ) -> Result<AppendOutcome>;

    /// Get the revocation covering a receipt, if any.
    async fn get_revocation(&self, receipt_hash: &ReceiptHash)
        -> Result<Option<RevocationRecord>>;

    /// Get the cached canonical bytes of a revocation by its own hash.
    async fn revocation_canonical(&self, hash: &RevocationHash) -> Result<Option<Vec<u8>>>;

    // ─────────────────────────────────────────────────────────────────────
    // Subject Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Get the chain state of a subject.
    async fn subject_log(&self, subject: &SubjectId) -> Result<Option<SubjectLog>>;

    /// Update or insert a subject's chain state.
    async fn upsert_subject_log(&self, log: &SubjectLog) -> Result<()>;

    /// All receipts of a subject, in append order (oldest first).
    async fn receipts_for_subject(&self, subject: &SubjectId) -> Result<Vec<ConsentReceipt>>;

    /// List all known subjects.
    async fn list_subjects(&self) -> Result<Vec<SubjectId>>;

    // ─────────────────────────────────────────────────────────────────────
    // Anchor Chain Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Append an entry to the global anchor chain.
    async fn append_anchor(&self, entry: &AnchorEntry) -> Result<()>;

    /// The latest anchor entry, if any.
    async fn anchor_head(&self) -> Result<Option<AnchorEntry>>;

    /// The full anchor chain, ordered by height.
    async fn anchor_log(&self) -> Result<Vec<AnchorEntry>>;
}
