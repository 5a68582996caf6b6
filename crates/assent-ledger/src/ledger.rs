//! The Ledger: unified API for the Assent system.
//!
//! The Ledger combines the receipt store, the revocation engine, and the
//! verification API behind one type, and serializes all mutations so the
//! anchor chain extends in a single total order.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use assent_core::{
    canonical::{CONSENT_ID_DOMAIN, REVOCATION_ID_DOMAIN},
    canonical_receipt_bytes, canonical_revocation_bytes, status, validate_receipt,
    validate_revocation, AnchorEntry, AnchorHash, ConsentReceipt, ConsentStatus, ContentHash,
    Keypair, ReceiptBuilder, ReceiptHash, RecordKind, RevocationHash, RevocationRecord, ScopeSet,
    SubjectId, SubjectLog, ValidationError,
};
use assent_store::{AppendOutcome, Store};

use crate::error::{LedgerError, Result};

/// Configuration for the Ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Whether to fully validate receipts on append.
    pub validate_on_append: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            validate_on_append: true,
        }
    }
}

/// Report produced by a full chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// Number of anchored records.
    pub len: u64,
    /// The chain head, or None for an empty ledger.
    pub head: Option<AnchorHash>,
}

/// The main Ledger struct.
///
/// Provides a unified API for:
/// - Appending consent receipts (store contract)
/// - Revoking receipts (revocation engine)
/// - Deriving consent status and authorizing scoped use (verification API)
/// - Auditing the anchor chain end-to-end
///
/// Mutations are serialized behind a single write lock; reads go straight
/// to the store and never block behind writers.
pub struct Ledger<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: LedgerConfig,
    /// Single-writer lock: all mutations run under this guard.
    write: Mutex<()>,
}

impl<S: Store> Ledger<S> {
    /// Create a new ledger over the given store.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
            write: Mutex::new(()),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────
    // Receipt Store
    // ─────────────────────────────────────────────────────────────────────

    /// Build, sign, and append the next receipt in a subject's chain.
    ///
    /// The new receipt is chained to the subject's current head, so a
    /// re-grant with different scope supersedes (without erasing) the
    /// earlier receipt.
    pub async fn grant(
        &self,
        keypair: &Keypair,
        subject: SubjectId,
        scope: ScopeSet,
        issued_at: i64,
        expires_at: Option<i64>,
    ) -> Result<ReceiptHash> {
        let _guard = self.write.lock().await;

        let log = self.store.subject_log(&subject).await?;

        let mut builder = ReceiptBuilder::new(subject).scope(scope).issued_at(issued_at);
        if let Some(expires_at) = expires_at {
            builder = builder.expires_at(expires_at);
        }
        if let Some(head) = log.and_then(|l| l.head) {
            builder = builder.prev(head);
        }

        let receipt = builder.sign(keypair);
        self.append_locked(&receipt).await
    }

    /// Append an externally built receipt.
    ///
    /// Fails with `DuplicateReceipt` if identical content was already
    /// appended, and with a chain error if the receipt's `prev` pointer
    /// does not match the subject's current head.
    pub async fn append(&self, receipt: &ConsentReceipt) -> Result<ReceiptHash> {
        let _guard = self.write.lock().await;
        self.append_locked(receipt).await
    }

    /// Get a receipt by its content address.
    pub async fn get(&self, hash: &ReceiptHash) -> Result<ConsentReceipt> {
        self.store
            .get_receipt(hash)
            .await?
            .ok_or(LedgerError::NotFound(*hash))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Revocation Engine
    // ─────────────────────────────────────────────────────────────────────

    /// Build, sign, and apply a revocation for the given receipt.
    pub async fn revoke(
        &self,
        receipt_hash: &ReceiptHash,
        keypair: &Keypair,
        revoked_at: i64,
    ) -> Result<()> {
        let record = RevocationRecord::sign(*receipt_hash, revoked_at, keypair);
        self.revoke_signed(&record).await
    }

    /// Apply an externally signed revocation record.
    ///
    /// Fails with `UnknownReceipt` if the referenced hash is absent and
    /// with `InvalidSignature` if the signature does not verify against
    /// the original grantor key. Re-submitting a byte-identical revocation
    /// is a no-op.
    pub async fn revoke_signed(&self, record: &RevocationRecord) -> Result<()> {
        let _guard = self.write.lock().await;
        self.revoke_locked(record).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Verification API (pure reads)
    // ─────────────────────────────────────────────────────────────────────

    /// Derive the status of a receipt at time `at` (Unix milliseconds).
    pub async fn status(&self, hash: &ReceiptHash, at: i64) -> Result<ConsentStatus> {
        let receipt = self
            .store
            .get_receipt(hash)
            .await?
            .ok_or(LedgerError::UnknownReceipt(*hash))?;
        let revocation = self.store.get_revocation(hash).await?;

        let status = status::evaluate(&receipt, revocation.as_ref(), at);
        debug!(receipt = %hash, at, ?status, "derived consent status");
        Ok(status)
    }

    /// Check that a receipt is active at `at` and covers every scope in
    /// `required`.
    pub async fn authorize(
        &self,
        hash: &ReceiptHash,
        required: &ScopeSet,
        at: i64,
    ) -> Result<()> {
        let receipt = self
            .store
            .get_receipt(hash)
            .await?
            .ok_or(LedgerError::UnknownReceipt(*hash))?;
        let revocation = self.store.get_revocation(hash).await?;

        let status = status::evaluate(&receipt, revocation.as_ref(), at);
        if !status.is_active() {
            return Err(LedgerError::NotAuthorized(format!(
                "consent {} is {:?} at {}",
                hash, status, at
            )));
        }

        if !receipt.scope.covers(required) {
            return Err(LedgerError::NotAuthorized(format!(
                "consent {} does not cover the required scopes",
                hash
            )));
        }

        Ok(())
    }

    /// All receipts of a subject, oldest first.
    pub async fn history(&self, subject: &SubjectId) -> Result<Vec<ConsentReceipt>> {
        Ok(self.store.receipts_for_subject(subject).await?)
    }

    /// The subject's latest receipt, if any.
    pub async fn head(&self, subject: &SubjectId) -> Result<Option<ConsentReceipt>> {
        let Some(log) = self.store.subject_log(subject).await? else {
            return Ok(None);
        };
        let Some(hash) = log.head else {
            return Ok(None);
        };
        let receipt = self
            .store
            .get_receipt(&hash)
            .await?
            .ok_or(LedgerError::NotFound(hash))?;
        Ok(Some(receipt))
    }

    /// List all known subjects.
    pub async fn subjects(&self) -> Result<Vec<SubjectId>> {
        Ok(self.store.list_subjects().await?)
    }

    /// Verify the anchor chain end-to-end.
    ///
    /// Recomputes every link and every anchored record hash from the
    /// canonical bytes actually held in storage, so any tampering with
    /// either the chain or the records is detected.
    pub async fn verify_chain(&self) -> Result<ChainReport> {
        let entries = self.store.anchor_log().await?;
        let head = assent_core::verify_chain(&entries)?;

        for entry in &entries {
            let canonical = match entry.kind {
                RecordKind::Consent => {
                    self.store
                        .receipt_canonical(&ReceiptHash(entry.record.0))
                        .await?
                }
                RecordKind::Revocation => {
                    self.store
                        .revocation_canonical(&RevocationHash(entry.record.0))
                        .await?
                }
            };

            let Some(bytes) = canonical else {
                return Err(LedgerError::Chain(assent_core::ChainError::RecordMismatch {
                    height: entry.height,
                }));
            };

            let recomputed = match entry.kind {
                RecordKind::Consent => ContentHash::hash_domain(CONSENT_ID_DOMAIN, &bytes),
                RecordKind::Revocation => ContentHash::hash_domain(REVOCATION_ID_DOMAIN, &bytes),
            };

            if recomputed != entry.record {
                return Err(LedgerError::Chain(assent_core::ChainError::RecordMismatch {
                    height: entry.height,
                }));
            }
        }

        Ok(ChainReport {
            len: entries.len() as u64,
            head,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals (write lock held by caller)
    // ─────────────────────────────────────────────────────────────────────

    async fn append_locked(&self, receipt: &ConsentReceipt) -> Result<ReceiptHash> {
        if self.config.validate_on_append {
            validate_receipt(receipt)?;
        }

        let hash = receipt.compute_hash();

        if self.store.has_receipt(&hash).await? {
            warn!(receipt = %hash, "rejected duplicate receipt");
            return Err(LedgerError::DuplicateReceipt(hash));
        }

        let now = now_millis();
        let mut log = self
            .store
            .subject_log(&receipt.subject)
            .await?
            .unwrap_or_else(|| SubjectLog::new(receipt.subject, now));

        log.record(hash, receipt.prev_receipt_hash, now)?;

        let canonical = canonical_receipt_bytes(receipt);
        match self.store.insert_receipt(receipt, &canonical).await? {
            AppendOutcome::Appended => {}
            AppendOutcome::AlreadyExists => return Err(LedgerError::DuplicateReceipt(hash)),
        }

        self.store.upsert_subject_log(&log).await?;
        self.extend_anchor(RecordKind::Consent, ContentHash(hash.0))
            .await?;

        info!(receipt = %hash, subject = %receipt.subject, "appended consent receipt");
        Ok(hash)
    }

    async fn revoke_locked(&self, record: &RevocationRecord) -> Result<()> {
        let receipt = self
            .store
            .get_receipt(&record.receipt_hash)
            .await?
            .ok_or(LedgerError::UnknownReceipt(record.receipt_hash))?;

        validate_revocation(record, &receipt.grantor).map_err(|e| match e {
            ValidationError::SignatureFailed => LedgerError::InvalidSignature,
            other => LedgerError::Validation(other),
        })?;

        if let Some(existing) = self.store.get_revocation(&record.receipt_hash).await? {
            if existing == *record {
                debug!(receipt = %record.receipt_hash, "revocation re-submitted, no-op");
                return Ok(());
            }
            return Err(LedgerError::AlreadyRevoked(record.receipt_hash));
        }

        let canonical = canonical_revocation_bytes(record);
        match self.store.insert_revocation(record, &canonical).await? {
            AppendOutcome::Appended => {}
            AppendOutcome::AlreadyExists => return Ok(()),
        }

        self.extend_anchor(RecordKind::Revocation, ContentHash(record.compute_hash().0))
            .await?;

        info!(receipt = %record.receipt_hash, revoked_at = record.revoked_at, "revoked consent");
        Ok(())
    }

    async fn extend_anchor(&self, kind: RecordKind, record: ContentHash) -> Result<()> {
        let entry = match self.store.anchor_head().await? {
            Some(head) => AnchorEntry::after(&head, kind, record),
            None => AnchorEntry::first(kind, record),
        };
        self.store.append_anchor(&entry).await?;
        Ok(())
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
