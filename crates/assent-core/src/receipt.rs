//! ConsentReceipt: the immutable record of one consent grant.
//!
//! A receipt is created once, at consent time, and never mutated. Later
//! changes are new receipts chained to the old ones; withdrawal is a
//! separate [`RevocationRecord`](crate::revocation::RevocationRecord).

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_receipt_bytes, receipt_signing_message, CONSENT_ID_DOMAIN};
use crate::crypto::{ContentHash, Keypair, PublicKey, Signature};
use crate::error::CoreError;
use crate::scope::ScopeSet;
use crate::types::{ReceiptHash, SubjectId};

/// The current receipt schema version.
pub const RECEIPT_VERSION: u8 = 0;

/// Maximum number of scopes allowed in a receipt.
pub const MAX_SCOPES: usize = 32;

/// An immutable, signed consent receipt.
///
/// The grantor's signature covers the domain-prefixed canonical encoding
/// of every field except the signature itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentReceipt {
    /// Schema version (currently 0).
    pub version: u8,

    /// The subject who granted consent (32-byte derived identifier).
    pub subject: SubjectId,

    /// The grantor: the party the permission was granted to. Signs the
    /// receipt and any later revocation of it.
    pub grantor: PublicKey,

    /// The permitted uses.
    pub scope: ScopeSet,

    /// When consent was granted (Unix milliseconds).
    pub issued_at: i64,

    /// When consent lapses on its own (Unix milliseconds). None means the
    /// grant does not expire.
    pub expires_at: Option<i64>,

    /// Hash of the previous receipt in this subject's chain (None only for
    /// the subject's first receipt).
    pub prev_receipt_hash: Option<ReceiptHash>,

    /// Ed25519 signature by the grantor key.
    pub signature: Signature,
}

impl ConsentReceipt {
    /// Compute the receipt's content address.
    pub fn compute_hash(&self) -> ReceiptHash {
        let bytes = canonical_receipt_bytes(self);
        ReceiptHash(ContentHash::hash_domain(CONSENT_ID_DOMAIN, &bytes).0)
    }

    /// Whether this is the first receipt in its subject's chain.
    pub fn is_initial(&self) -> bool {
        self.prev_receipt_hash.is_none()
    }

    /// Whether the receipt carries an expiry.
    pub fn expires(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Verify the grantor's signature.
    pub fn verify_signature(&self) -> Result<(), CoreError> {
        let message = receipt_signing_message(self);
        self.grantor.verify(&message, &self.signature)
    }
}

/// Builder for creating signed consent receipts.
///
/// The grantor key is taken from the keypair at signing time, so the
/// `grantor` field can never disagree with the signature.
pub struct ReceiptBuilder {
    subject: SubjectId,
    scope: ScopeSet,
    issued_at: i64,
    expires_at: Option<i64>,
    prev_receipt_hash: Option<ReceiptHash>,
}

impl ReceiptBuilder {
    /// Start building a receipt for the given subject.
    pub fn new(subject: SubjectId) -> Self {
        Self {
            subject,
            scope: ScopeSet::new(),
            issued_at: 0,
            expires_at: None,
            prev_receipt_hash: None,
        }
    }

    /// Set the permitted uses.
    pub fn scope(mut self, scope: ScopeSet) -> Self {
        self.scope = scope;
        self
    }

    /// Set the issuance timestamp.
    pub fn issued_at(mut self, ts: i64) -> Self {
        self.issued_at = ts;
        self
    }

    /// Set the expiration timestamp.
    pub fn expires_at(mut self, ts: i64) -> Self {
        self.expires_at = Some(ts);
        self
    }

    /// Chain this receipt to the subject's previous receipt.
    pub fn prev(mut self, prev: ReceiptHash) -> Self {
        self.prev_receipt_hash = Some(prev);
        self
    }

    /// Build and sign the receipt with the grantor's keypair.
    pub fn sign(self, keypair: &Keypair) -> ConsentReceipt {
        let mut receipt = ConsentReceipt {
            version: RECEIPT_VERSION,
            subject: self.subject,
            grantor: keypair.public_key(),
            scope: self.scope,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            prev_receipt_hash: self.prev_receipt_hash,
            signature: Signature::ZERO,
        };

        let message = receipt_signing_message(&receipt);
        receipt.signature = keypair.sign(&message);
        receipt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_receipt(keypair: &Keypair) -> ConsentReceipt {
        ReceiptBuilder::new(SubjectId::derive("alice"))
            .scope(ScopeSet::from_labels(["model-training"]).unwrap())
            .issued_at(1_736_870_400_000)
            .expires_at(1_768_406_400_000)
            .sign(keypair)
    }

    #[test]
    fn test_builder_signs_verifiable_receipt() {
        let keypair = Keypair::generate();
        let receipt = build_receipt(&keypair);

        assert_eq!(receipt.version, RECEIPT_VERSION);
        assert_eq!(receipt.grantor, keypair.public_key());
        assert!(receipt.is_initial());
        assert!(receipt.expires());
        receipt.verify_signature().expect("signature should verify");
    }

    #[test]
    fn test_hash_deterministic() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let receipt = build_receipt(&keypair);

        assert_eq!(receipt.compute_hash(), receipt.compute_hash());
    }

    #[test]
    fn test_hash_changes_with_scope() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let r1 = build_receipt(&keypair);
        let r2 = ReceiptBuilder::new(SubjectId::derive("alice"))
            .scope(ScopeSet::from_labels(["analytics"]).unwrap())
            .issued_at(1_736_870_400_000)
            .expires_at(1_768_406_400_000)
            .sign(&keypair);

        assert_ne!(r1.compute_hash(), r2.compute_hash());
    }

    #[test]
    fn test_chained_receipt() {
        let keypair = Keypair::generate();
        let first = build_receipt(&keypair);
        let first_hash = first.compute_hash();

        let second = ReceiptBuilder::new(SubjectId::derive("alice"))
            .scope(ScopeSet::from_labels(["analytics"]).unwrap())
            .issued_at(1_736_870_500_000)
            .prev(first_hash)
            .sign(&keypair);

        assert!(!second.is_initial());
        assert_eq!(second.prev_receipt_hash, Some(first_hash));
        second.verify_signature().unwrap();
    }

    #[test]
    fn test_tampered_scope_fails_verification() {
        let keypair = Keypair::generate();
        let mut receipt = build_receipt(&keypair);
        receipt.scope = ScopeSet::from_labels(["resale"]).unwrap();

        assert!(receipt.verify_signature().is_err());
    }
}
