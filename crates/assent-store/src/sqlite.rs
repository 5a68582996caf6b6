//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for the Assent ledger. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use assent_core::{
    decode_receipt, decode_revocation, AnchorEntry, AnchorHash, ConsentReceipt, ContentHash,
    ReceiptHash, RecordKind, RevocationHash, RevocationRecord, SubjectId, SubjectLog,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AppendOutcome, Store};

/// SQLite-based store implementation.
///
/// The connection lives behind a mutex; every operation runs the SQL on a
/// `spawn_blocking` thread so the async runtime never blocks on disk I/O.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on a blocking thread.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Connection(format!("mutex poisoned: {}", e)))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Connection(format!("blocking task failed: {}", e)))?
    }
}

/// Decode a receipt from its cached canonical bytes.
fn receipt_from_canonical(bytes: &[u8]) -> Result<ConsentReceipt> {
    decode_receipt(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decode a revocation from its cached canonical bytes.
fn revocation_from_canonical(bytes: &[u8]) -> Result<RevocationRecord> {
    decode_revocation(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn bytes32(bytes: Vec<u8>, what: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData(format!("{} is not 32 bytes", what)))
}

fn row_to_anchor(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, u8, Vec<u8>, Option<Vec<u8>>, Vec<u8>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn anchor_from_parts(
    height: i64,
    kind: u8,
    record: Vec<u8>,
    prev: Option<Vec<u8>>,
    hash: Vec<u8>,
) -> Result<AnchorEntry> {
    let kind = RecordKind::from_u8(kind)
        .ok_or_else(|| StoreError::InvalidData(format!("unknown anchor kind: {}", kind)))?;
    let prev = match prev {
        Some(bytes) => Some(AnchorHash::from_bytes(bytes32(bytes, "prev_anchor")?)),
        None => None,
    };
    Ok(AnchorEntry {
        height: height as u64,
        kind,
        record: ContentHash::from_bytes(bytes32(record, "record_hash")?),
        prev,
        hash: AnchorHash::from_bytes(bytes32(hash, "anchor_hash")?),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_receipt(
        &self,
        receipt: &ConsentReceipt,
        canonical: &[u8],
    ) -> Result<AppendOutcome> {
        let receipt = receipt.clone();
        let canonical = canonical.to_vec();

        self.run(move |conn| {
            let hash = receipt.compute_hash();

            let existing: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT receipt_hash FROM receipts WHERE receipt_hash = ?1",
                    params![hash.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                return Ok(AppendOutcome::AlreadyExists);
            }

            let mut scope_cbor = Vec::new();
            ciborium::into_writer(&receipt.scope.labels(), &mut scope_cbor)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            conn.execute(
                "INSERT INTO receipts (
                    receipt_hash, version, subject, grantor, scope, issued_at,
                    expires_at, prev_receipt_hash, signature, canonical_bytes, appended_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    hash.0.as_slice(),
                    receipt.version as i64,
                    receipt.subject.0.as_slice(),
                    receipt.grantor.0.as_slice(),
                    scope_cbor,
                    receipt.issued_at,
                    receipt.expires_at,
                    receipt.prev_receipt_hash.as_ref().map(|h| h.0.as_slice()),
                    receipt.signature.0.as_slice(),
                    canonical.as_slice(),
                    now_millis(),
                ],
            )?;

            Ok(AppendOutcome::Appended)
        })
        .await
    }

    async fn get_receipt(&self, hash: &ReceiptHash) -> Result<Option<ConsentReceipt>> {
        let hash = *hash;

        self.run(move |conn| {
            let canonical: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT canonical_bytes FROM receipts WHERE receipt_hash = ?1",
                    params![hash.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            canonical.map(|bytes| receipt_from_canonical(&bytes)).transpose()
        })
        .await
    }

    async fn has_receipt(&self, hash: &ReceiptHash) -> Result<bool> {
        let hash = *hash;

        self.run(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM receipts WHERE receipt_hash = ?1)",
                params![hash.0.as_slice()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn receipt_canonical(&self, hash: &ReceiptHash) -> Result<Option<Vec<u8>>> {
        let hash = *hash;

        self.run(move |conn| {
            conn.query_row(
                "SELECT canonical_bytes FROM receipts WHERE receipt_hash = ?1",
                params![hash.0.as_slice()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn insert_revocation(
        &self,
        record: &RevocationRecord,
        canonical: &[u8],
    ) -> Result<AppendOutcome> {
        let record = record.clone();
        let canonical = canonical.to_vec();

        self.run(move |conn| {
            let receipt_exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM receipts WHERE receipt_hash = ?1)",
                params![record.receipt_hash.0.as_slice()],
                |row| row.get(0),
            )?;

            if !receipt_exists {
                return Err(StoreError::OrphanRevocation(record.receipt_hash.to_hex()));
            }

            let hash = record.compute_hash();

            let existing: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT revocation_hash FROM revocations WHERE receipt_hash = ?1",
                    params![record.receipt_hash.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing_bytes) = existing {
                if existing_bytes.as_slice() == hash.0.as_slice() {
                    return Ok(AppendOutcome::AlreadyExists);
                }
                let existing = RevocationHash::from_bytes(bytes32(existing_bytes, "revocation_hash")?);
                return Err(StoreError::Conflict {
                    receipt_hash: record.receipt_hash.to_hex(),
                    existing: existing.to_hex(),
                });
            }

            conn.execute(
                "INSERT INTO revocations (
                    revocation_hash, receipt_hash, version, revoked_at,
                    signature, canonical_bytes, appended_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    hash.0.as_slice(),
                    record.receipt_hash.0.as_slice(),
                    record.version as i64,
                    record.revoked_at,
                    record.signature.0.as_slice(),
                    canonical.as_slice(),
                    now_millis(),
                ],
            )?;

            Ok(AppendOutcome::Appended)
        })
        .await
    }

    async fn get_revocation(
        &self,
        receipt_hash: &ReceiptHash,
    ) -> Result<Option<RevocationRecord>> {
        let receipt_hash = *receipt_hash;

        self.run(move |conn| {
            let canonical: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT canonical_bytes FROM revocations WHERE receipt_hash = ?1",
                    params![receipt_hash.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            canonical
                .map(|bytes| revocation_from_canonical(&bytes))
                .transpose()
        })
        .await
    }

    async fn revocation_canonical(&self, hash: &RevocationHash) -> Result<Option<Vec<u8>>> {
        let hash = *hash;

        self.run(move |conn| {
            conn.query_row(
                "SELECT canonical_bytes FROM revocations WHERE revocation_hash = ?1",
                params![hash.0.as_slice()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn subject_log(&self, subject: &SubjectId) -> Result<Option<SubjectLog>> {
        let subject = *subject;

        self.run(move |conn| {
            let row: Option<(Option<Vec<u8>>, i64, i64, i64)> = conn
                .query_row(
                    "SELECT head_receipt_hash, receipt_count, created_at, updated_at
                     FROM subjects WHERE subject = ?1",
                    params![subject.0.as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            let Some((head_bytes, receipt_count, created_at, updated_at)) = row else {
                return Ok(None);
            };

            let head = match head_bytes {
                Some(bytes) => Some(ReceiptHash::from_bytes(bytes32(bytes, "head_receipt_hash")?)),
                None => None,
            };

            Ok(Some(SubjectLog {
                subject,
                head,
                receipt_count: receipt_count as u64,
                created_at,
                updated_at,
            }))
        })
        .await
    }

    async fn upsert_subject_log(&self, log: &SubjectLog) -> Result<()> {
        let log = log.clone();

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO subjects (
                    subject, head_receipt_hash, receipt_count, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(subject) DO UPDATE SET
                    head_receipt_hash = excluded.head_receipt_hash,
                    receipt_count = excluded.receipt_count,
                    updated_at = excluded.updated_at",
                params![
                    log.subject.0.as_slice(),
                    log.head.as_ref().map(|h| h.0.as_slice()),
                    log.receipt_count as i64,
                    log.created_at,
                    log.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn receipts_for_subject(&self, subject: &SubjectId) -> Result<Vec<ConsentReceipt>> {
        let subject = *subject;

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT canonical_bytes FROM receipts WHERE subject = ?1 ORDER BY rowid",
            )?;

            let canonicals = stmt
                .query_map(params![subject.0.as_slice()], |row| {
                    row.get::<_, Vec<u8>>(0)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            canonicals
                .iter()
                .map(|bytes| receipt_from_canonical(bytes))
                .collect()
        })
        .await
    }

    async fn list_subjects(&self) -> Result<Vec<SubjectId>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare("SELECT subject FROM subjects ORDER BY created_at")?;

            let rows = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|bytes| Ok(SubjectId::from_bytes(bytes32(bytes, "subject")?)))
                .collect()
        })
        .await
    }

    async fn append_anchor(&self, entry: &AnchorEntry) -> Result<()> {
        let entry = *entry;

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO anchors (height, kind, record_hash, prev_anchor, anchor_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.height as i64,
                    entry.kind.to_u8() as i64,
                    entry.record.0.as_slice(),
                    entry.prev.as_ref().map(|h| h.0.as_slice()),
                    entry.hash.0.as_slice(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn anchor_head(&self) -> Result<Option<AnchorEntry>> {
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT height, kind, record_hash, prev_anchor, anchor_hash
                     FROM anchors ORDER BY height DESC LIMIT 1",
                    [],
                    row_to_anchor,
                )
                .optional()?;

            row.map(|(height, kind, record, prev, hash)| {
                anchor_from_parts(height, kind, record, prev, hash)
            })
            .transpose()
        })
        .await
    }

    async fn anchor_log(&self) -> Result<Vec<AnchorEntry>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT height, kind, record_hash, prev_anchor, anchor_hash
                 FROM anchors ORDER BY height",
            )?;

            let rows = stmt
                .query_map([], row_to_anchor)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(height, kind, record, prev, hash)| {
                    anchor_from_parts(height, kind, record, prev, hash)
                })
                .collect()
        })
        .await
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

#[cfg(test)]
mod tests {
    use super::*;
    use assent_core::{
        canonical_receipt_bytes, canonical_revocation_bytes, Keypair, ReceiptBuilder,
        RevocationRecord, ScopeSet,
    };

    fn make_receipt(keypair: &Keypair, prev: Option<ReceiptHash>) -> ConsentReceipt {
        let mut builder = ReceiptBuilder::new(SubjectId::derive("alice"))
            .scope(ScopeSet::from_labels(["analytics"]).unwrap())
            .issued_at(1_736_870_400_000)
            .expires_at(1_768_406_400_000);
        if let Some(prev) = prev {
            builder = builder.prev(prev);
        }
        builder.sign(keypair)
    }

    #[tokio::test]
    async fn test_insert_and_get_receipt() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::generate();
        let receipt = make_receipt(&keypair, None);
        let canonical = canonical_receipt_bytes(&receipt);
        let hash = receipt.compute_hash();

        let outcome = store.insert_receipt(&receipt, &canonical).await.unwrap();
        assert_eq!(outcome, AppendOutcome::Appended);

        let retrieved = store.get_receipt(&hash).await.unwrap().unwrap();
        assert_eq!(retrieved, receipt);
        assert!(store.has_receipt(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_idempotent_insert() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::generate();
        let receipt = make_receipt(&keypair, None);
        let canonical = canonical_receipt_bytes(&receipt);

        let first = store.insert_receipt(&receipt, &canonical).await.unwrap();
        assert_eq!(first, AppendOutcome::Appended);

        let second = store.insert_receipt(&receipt, &canonical).await.unwrap();
        assert_eq!(second, AppendOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_orphan_revocation_rejected() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::generate();
        let record = RevocationRecord::sign(ReceiptHash::from_bytes([0xab; 32]), 60, &keypair);
        let canonical = canonical_revocation_bytes(&record);

        let result = store.insert_revocation(&record, &canonical).await;
        assert!(matches!(result, Err(StoreError::OrphanRevocation(_))));
    }

    #[tokio::test]
    async fn test_revocation_roundtrip_and_conflict() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::generate();
        let receipt = make_receipt(&keypair, None);
        let hash = receipt.compute_hash();
        store
            .insert_receipt(&receipt, &canonical_receipt_bytes(&receipt))
            .await
            .unwrap();

        let record = RevocationRecord::sign(hash, 60, &keypair);
        let canonical = canonical_revocation_bytes(&record);

        let outcome = store.insert_revocation(&record, &canonical).await.unwrap();
        assert_eq!(outcome, AppendOutcome::Appended);

        let retrieved = store.get_revocation(&hash).await.unwrap().unwrap();
        assert_eq!(retrieved, record);

        // Identical record is idempotent.
        let again = store.insert_revocation(&record, &canonical).await.unwrap();
        assert_eq!(again, AppendOutcome::AlreadyExists);

        // A different revocation for the same receipt conflicts.
        let other = RevocationRecord::sign(hash, 61, &keypair);
        let result = store
            .insert_revocation(&other, &canonical_revocation_bytes(&other))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_subject_log_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let subject = SubjectId::derive("alice");

        let mut log = SubjectLog::new(subject, 1000);
        log.record(ReceiptHash::from_bytes([1; 32]), None, 1001)
            .unwrap();
        store.upsert_subject_log(&log).await.unwrap();

        let retrieved = store.subject_log(&subject).await.unwrap().unwrap();
        assert_eq!(retrieved, log);

        let subjects = store.list_subjects().await.unwrap();
        assert_eq!(subjects, vec![subject]);
    }

    #[tokio::test]
    async fn test_receipts_for_subject_ordered() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::generate();

        let first = make_receipt(&keypair, None);
        store
            .insert_receipt(&first, &canonical_receipt_bytes(&first))
            .await
            .unwrap();

        let second = make_receipt(&keypair, Some(first.compute_hash()));
        store
            .insert_receipt(&second, &canonical_receipt_bytes(&second))
            .await
            .unwrap();

        let receipts = store
            .receipts_for_subject(&SubjectId::derive("alice"))
            .await
            .unwrap();
        assert_eq!(receipts, vec![first, second]);
    }

    #[tokio::test]
    async fn test_anchor_chain_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();

        let e1 = AnchorEntry::first(RecordKind::Consent, ContentHash::from_bytes([1; 32]));
        let e2 = AnchorEntry::after(&e1, RecordKind::Revocation, ContentHash::from_bytes([2; 32]));

        store.append_anchor(&e1).await.unwrap();
        store.append_anchor(&e2).await.unwrap();

        let head = store.anchor_head().await.unwrap().unwrap();
        assert_eq!(head, e2);

        let log = store.anchor_log().await.unwrap();
        assert_eq!(log, vec![e1, e2]);
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assent.db");

        let keypair = Keypair::generate();
        let receipt = make_receipt(&keypair, None);
        let hash = receipt.compute_hash();

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert_receipt(&receipt, &canonical_receipt_bytes(&receipt))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let retrieved = store.get_receipt(&hash).await.unwrap().unwrap();
        assert_eq!(retrieved, receipt);
    }
}
