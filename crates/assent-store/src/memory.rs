//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use assent_core::{
    AnchorEntry, ConsentReceipt, ReceiptHash, RevocationHash, RevocationRecord, SubjectId,
    SubjectLog,
};

use crate::error::{Result, StoreError};
use crate::traits::{AppendOutcome, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Receipts indexed by content address.
    receipts: HashMap<ReceiptHash, StoredReceipt>,

    /// Revocations indexed by the receipt they cover.
    revocations: HashMap<ReceiptHash, StoredRevocation>,

    /// Revocation hash -> covered receipt, for canonical lookups.
    revocation_index: HashMap<RevocationHash, ReceiptHash>,

    /// Per-subject chain state.
    subjects: HashMap<SubjectId, SubjectLog>,

    /// Per-subject receipt hashes in append order.
    subject_receipts: HashMap<SubjectId, Vec<ReceiptHash>>,

    /// Subjects in first-seen order.
    subject_order: Vec<SubjectId>,

    /// The global anchor chain, ordered by height.
    anchors: Vec<AnchorEntry>,
}

struct StoredReceipt {
    receipt: ConsentReceipt,
    canonical: Vec<u8>,
}

struct StoredRevocation {
    record: RevocationRecord,
    canonical: Vec<u8>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Connection(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Connection(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_receipt(
        &self,
        receipt: &ConsentReceipt,
        canonical: &[u8],
    ) -> Result<AppendOutcome> {
        let mut inner = self.write()?;

        let hash = receipt.compute_hash();
        if inner.receipts.contains_key(&hash) {
            return Ok(AppendOutcome::AlreadyExists);
        }

        inner.receipts.insert(
            hash,
            StoredReceipt {
                receipt: receipt.clone(),
                canonical: canonical.to_vec(),
            },
        );
        inner
            .subject_receipts
            .entry(receipt.subject)
            .or_default()
            .push(hash);

        Ok(AppendOutcome::Appended)
    }

    async fn get_receipt(&self, hash: &ReceiptHash) -> Result<Option<ConsentReceipt>> {
        let inner = self.read()?;
        Ok(inner.receipts.get(hash).map(|sr| sr.receipt.clone()))
    }

    async fn has_receipt(&self, hash: &ReceiptHash) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner.receipts.contains_key(hash))
    }

    async fn receipt_canonical(&self, hash: &ReceiptHash) -> Result<Option<Vec<u8>>> {
        let inner = self.read()?;
        Ok(inner.receipts.get(hash).map(|sr| sr.canonical.clone()))
    }

    async fn insert_revocation(
        &self,
        record: &RevocationRecord,
        canonical: &[u8],
    ) -> Result<AppendOutcome> {
        let mut inner = self.write()?;

        if !inner.receipts.contains_key(&record.receipt_hash) {
            return Err(StoreError::OrphanRevocation(record.receipt_hash.to_hex()));
        }

        let hash = record.compute_hash();

        if let Some(existing) = inner.revocations.get(&record.receipt_hash) {
            let existing_hash = existing.record.compute_hash();
            if existing_hash == hash {
                return Ok(AppendOutcome::AlreadyExists);
            }
            return Err(StoreError::Conflict {
                receipt_hash: record.receipt_hash.to_hex(),
                existing: existing_hash.to_hex(),
            });
        }

        inner.revocations.insert(
            record.receipt_hash,
            StoredRevocation {
                record: record.clone(),
                canonical: canonical.to_vec(),
            },
        );
        inner.revocation_index.insert(hash, record.receipt_hash);

        Ok(AppendOutcome::Appended)
    }

    async fn get_revocation(
        &self,
        receipt_hash: &ReceiptHash,
    ) -> Result<Option<RevocationRecord>> {
        let inner = self.read()?;
        Ok(inner
            .revocations
            .get(receipt_hash)
            .map(|sr| sr.record.clone()))
    }

    async fn revocation_canonical(&self, hash: &RevocationHash) -> Result<Option<Vec<u8>>> {
        let inner = self.read()?;
        Ok(inner
            .revocation_index
            .get(hash)
            .and_then(|receipt_hash| inner.revocations.get(receipt_hash))
            .map(|sr| sr.canonical.clone()))
    }

    async fn subject_log(&self, subject: &SubjectId) -> Result<Option<SubjectLog>> {
        let inner = self.read()?;
        Ok(inner.subjects.get(subject).cloned())
    }

    async fn upsert_subject_log(&self, log: &SubjectLog) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.subjects.contains_key(&log.subject) {
            inner.subject_order.push(log.subject);
        }
        inner.subjects.insert(log.subject, log.clone());
        Ok(())
    }

    async fn receipts_for_subject(&self, subject: &SubjectId) -> Result<Vec<ConsentReceipt>> {
        let inner = self.read()?;

        let receipts = inner
            .subject_receipts
            .get(subject)
            .map(|hashes| {
                hashes
                    .iter()
                    .filter_map(|h| inner.receipts.get(h))
                    .map(|sr| sr.receipt.clone())
                    .collect()
            })
            .unwrap_or_default();

        Ok(receipts)
    }

    async fn list_subjects(&self) -> Result<Vec<SubjectId>> {
        let inner = self.read()?;
        Ok(inner.subject_order.clone())
    }

    async fn append_anchor(&self, entry: &AnchorEntry) -> Result<()> {
        let mut inner = self.write()?;

        let expected = inner.anchors.len() as u64 + 1;
        if entry.height != expected {
            return Err(StoreError::InvalidData(format!(
                "anchor height {} does not extend chain of length {}",
                entry.height,
                inner.anchors.len()
            )));
        }

        inner.anchors.push(*entry);
        Ok(())
    }

    async fn anchor_head(&self) -> Result<Option<AnchorEntry>> {
        let inner = self.read()?;
        Ok(inner.anchors.last().copied())
    }

    async fn anchor_log(&self) -> Result<Vec<AnchorEntry>> {
        let inner = self.read()?;
        Ok(inner.anchors.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assent_core::{
        canonical_receipt_bytes, canonical_revocation_bytes, Keypair, ReceiptBuilder, ScopeSet,
    };

    fn make_receipt(keypair: &Keypair) -> ConsentReceipt {
        ReceiptBuilder::new(SubjectId::derive("alice"))
            .scope(ScopeSet::from_labels(["analytics"]).unwrap())
            .issued_at(1_736_870_400_000)
            .sign(keypair)
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let keypair = Keypair::generate();
        let receipt = make_receipt(&keypair);
        let canonical = canonical_receipt_bytes(&receipt);
        let hash = receipt.compute_hash();

        let outcome = store.insert_receipt(&receipt, &canonical).await.unwrap();
        assert_eq!(outcome, AppendOutcome::Appended);

        let retrieved = store.get_receipt(&hash).await.unwrap().unwrap();
        assert_eq!(retrieved, receipt);
    }

    #[tokio::test]
    async fn test_memory_store_idempotent() {
        let store = MemoryStore::new();
        let keypair = Keypair::generate();
        let receipt = make_receipt(&keypair);
        let canonical = canonical_receipt_bytes(&receipt);

        let first = store.insert_receipt(&receipt, &canonical).await.unwrap();
        assert_eq!(first, AppendOutcome::Appended);

        let second = store.insert_receipt(&receipt, &canonical).await.unwrap();
        assert_eq!(second, AppendOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_memory_store_orphan_revocation() {
        let store = MemoryStore::new();
        let keypair = Keypair::generate();
        let record = RevocationRecord::sign(ReceiptHash::from_bytes([0xab; 32]), 60, &keypair);

        let result = store
            .insert_revocation(&record, &canonical_revocation_bytes(&record))
            .await;
        assert!(matches!(result, Err(StoreError::OrphanRevocation(_))));
    }

    #[tokio::test]
    async fn test_memory_store_anchor_contiguity() {
        use assent_core::{ContentHash, RecordKind};

        let store = MemoryStore::new();
        let e1 = AnchorEntry::first(RecordKind::Consent, ContentHash::from_bytes([1; 32]));
        store.append_anchor(&e1).await.unwrap();

        // Re-appending the same height must be rejected.
        let result = store.append_anchor(&e1).await;
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
    }
}
