//! Hash chains: the global anchor log and per-subject receipt chains.
//!
//! Every appended record (receipt or revocation) extends a single global
//! anchor chain. Each entry hashes its predecessor, so any rewrite of
//! history breaks the chain at the tampered height.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::ContentHash;
use crate::error::ChainError;
use crate::types::{ReceiptHash, SubjectId};

/// Domain prefix for anchor entry hashes.
pub const ANCHOR_DOMAIN: &[u8] = b"assent/anchor/v0";

/// A 32-byte anchor entry hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorHash(pub [u8; 32]);

impl AnchorHash {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AnchorHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnchorHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for AnchorHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for AnchorHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The kind of record an anchor entry covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordKind {
    /// A consent receipt.
    Consent = 0,
    /// A revocation record.
    Revocation = 1,
}

impl RecordKind {
    /// Convert to u8 for serialization.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Consent),
            1 => Some(Self::Revocation),
            _ => None,
        }
    }
}

/// One link in the global anchor chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorEntry {
    /// Position in the chain (1-indexed, contiguous).
    pub height: u64,

    /// What kind of record is anchored here.
    pub kind: RecordKind,

    /// Content address of the anchored record.
    pub record: ContentHash,

    /// Hash of the previous entry (None only at height 1).
    pub prev: Option<AnchorHash>,

    /// This entry's hash, covering height, kind, prev, and record.
    pub hash: AnchorHash,
}

impl AnchorEntry {
    /// Create the first entry of a chain.
    pub fn first(kind: RecordKind, record: ContentHash) -> Self {
        let hash = Self::compute_hash(1, kind, None, &record);
        Self {
            height: 1,
            kind,
            record,
            prev: None,
            hash,
        }
    }

    /// Create the entry following `prev`.
    pub fn after(prev: &AnchorEntry, kind: RecordKind, record: ContentHash) -> Self {
        let height = prev.height + 1;
        let hash = Self::compute_hash(height, kind, Some(&prev.hash), &record);
        Self {
            height,
            kind,
            record,
            prev: Some(prev.hash),
            hash,
        }
    }

    /// Compute the hash of an entry from its parts.
    ///
    /// Format: `Blake3(domain || height_be || kind || prev_tag || prev || record)`
    /// where `prev_tag` is 0x00 for a missing predecessor and 0x01 otherwise.
    fn compute_hash(
        height: u64,
        kind: RecordKind,
        prev: Option<&AnchorHash>,
        record: &ContentHash,
    ) -> AnchorHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ANCHOR_DOMAIN);
        hasher.update(&height.to_be_bytes());
        hasher.update(&[kind.to_u8()]);
        match prev {
            Some(p) => {
                hasher.update(&[0x01]);
                hasher.update(&p.0);
            }
            None => {
                hasher.update(&[0x00]);
                hasher.update(&[0u8; 32]);
            }
        }
        hasher.update(&record.0);
        AnchorHash(*hasher.finalize().as_bytes())
    }

    /// Recompute this entry's hash and compare.
    pub fn verify(&self) -> Result<(), ChainError> {
        let expected = Self::compute_hash(self.height, self.kind, self.prev.as_ref(), &self.record);
        if expected != self.hash {
            return Err(ChainError::HashMismatch {
                height: self.height,
            });
        }
        Ok(())
    }

    /// Check that this entry correctly follows `prev`.
    pub fn verify_link(&self, prev: Option<&AnchorEntry>) -> Result<(), ChainError> {
        match prev {
            None => {
                if self.height != 1 {
                    return Err(ChainError::NonContiguousHeight {
                        expected: 1,
                        got: self.height,
                    });
                }
                if self.prev.is_some() {
                    return Err(ChainError::LinkMismatch {
                        height: self.height,
                    });
                }
            }
            Some(p) => {
                if self.height != p.height + 1 {
                    return Err(ChainError::NonContiguousHeight {
                        expected: p.height + 1,
                        got: self.height,
                    });
                }
                if self.prev != Some(p.hash) {
                    return Err(ChainError::LinkMismatch {
                        height: self.height,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Verify a full anchor chain end-to-end.
///
/// Returns the head hash, or None for an empty chain.
pub fn verify_chain(entries: &[AnchorEntry]) -> Result<Option<AnchorHash>, ChainError> {
    let mut prev: Option<&AnchorEntry> = None;
    for entry in entries {
        entry.verify_link(prev)?;
        entry.verify()?;
        prev = Some(entry);
    }
    Ok(prev.map(|e| e.hash))
}

/// Per-subject chain state: the head of a subject's receipt chain.
///
/// Receipts of one subject are chained through `prev_receipt_hash`; the
/// log tracks the current head so an append can be checked against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectLog {
    /// The subject identifier.
    pub subject: SubjectId,

    /// The subject's latest receipt (None before the first append).
    pub head: Option<ReceiptHash>,

    /// Number of receipts appended for this subject.
    pub receipt_count: u64,

    /// When this log was created (local time, Unix ms).
    pub created_at: i64,

    /// When this log was last updated (local time, Unix ms).
    pub updated_at: i64,
}

impl SubjectLog {
    /// Create an empty log for a subject.
    pub fn new(subject: SubjectId, now: i64) -> Self {
        Self {
            subject,
            head: None,
            receipt_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a new receipt at the head of the chain.
    ///
    /// The receipt's `prev` pointer must match the current head.
    pub fn record(
        &mut self,
        receipt_hash: ReceiptHash,
        prev: Option<ReceiptHash>,
        now: i64,
    ) -> Result<(), ChainError> {
        if prev != self.head {
            return Err(ChainError::HeadMismatch {
                expected: self.head,
                got: prev,
            });
        }
        self.head = Some(receipt_hash);
        self.receipt_count += 1;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(byte: u8) -> ContentHash {
        ContentHash::from_bytes([byte; 32])
    }

    #[test]
    fn test_anchor_chain_links() {
        let e1 = AnchorEntry::first(RecordKind::Consent, record(1));
        let e2 = AnchorEntry::after(&e1, RecordKind::Consent, record(2));
        let e3 = AnchorEntry::after(&e2, RecordKind::Revocation, record(3));

        assert_eq!(e1.height, 1);
        assert_eq!(e3.height, 3);
        assert_eq!(e2.prev, Some(e1.hash));

        let head = verify_chain(&[e1, e2, e3]).unwrap();
        assert_eq!(head, Some(e3.hash));
    }

    #[test]
    fn test_empty_chain_verifies() {
        assert_eq!(verify_chain(&[]).unwrap(), None);
    }

    #[test]
    fn test_tampered_record_detected() {
        let e1 = AnchorEntry::first(RecordKind::Consent, record(1));
        let mut e2 = AnchorEntry::after(&e1, RecordKind::Consent, record(2));
        e2.record = record(0xff);

        let result = verify_chain(&[e1, e2]);
        assert!(matches!(result, Err(ChainError::HashMismatch { height: 2 })));
    }

    #[test]
    fn test_broken_link_detected() {
        let e1 = AnchorEntry::first(RecordKind::Consent, record(1));
        let e2 = AnchorEntry::after(&e1, RecordKind::Consent, record(2));
        // Skip e2: e3 claims height 3 but follows e1 in the slice.
        let e3 = AnchorEntry::after(&e2, RecordKind::Consent, record(3));

        let result = verify_chain(&[e1, e3]);
        assert!(matches!(
            result,
            Err(ChainError::NonContiguousHeight {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn test_kind_is_hashed() {
        let consent = AnchorEntry::first(RecordKind::Consent, record(1));
        let revocation = AnchorEntry::first(RecordKind::Revocation, record(1));
        assert_ne!(consent.hash, revocation.hash);
    }

    #[test]
    fn test_subject_log_chains_heads() {
        let subject = SubjectId::derive("alice");
        let mut log = SubjectLog::new(subject, 1000);

        let h1 = ReceiptHash::from_bytes([1; 32]);
        let h2 = ReceiptHash::from_bytes([2; 32]);

        log.record(h1, None, 1001).unwrap();
        assert_eq!(log.head, Some(h1));
        assert_eq!(log.receipt_count, 1);

        log.record(h2, Some(h1), 1002).unwrap();
        assert_eq!(log.head, Some(h2));
        assert_eq!(log.receipt_count, 2);
    }

    #[test]
    fn test_subject_log_rejects_stale_prev() {
        let subject = SubjectId::derive("alice");
        let mut log = SubjectLog::new(subject, 1000);

        let h1 = ReceiptHash::from_bytes([1; 32]);
        log.record(h1, None, 1001).unwrap();

        // A second receipt claiming to be initial must be rejected.
        let h2 = ReceiptHash::from_bytes([2; 32]);
        let result = log.record(h2, None, 1002);
        assert!(matches!(result, Err(ChainError::HeadMismatch { .. })));
        assert_eq!(log.head, Some(h1));
        assert_eq!(log.receipt_count, 1);
    }
}
