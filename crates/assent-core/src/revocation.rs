//! RevocationRecord: the immutable, terminal withdrawal of a consent grant.

use serde::{Deserialize, Serialize};

use crate::canonical::{
    canonical_revocation_bytes, revocation_signing_message, REVOCATION_ID_DOMAIN,
};
use crate::crypto::{ContentHash, Keypair, PublicKey, Signature};
use crate::error::CoreError;
use crate::types::{ReceiptHash, RevocationHash};

/// The current revocation schema version.
pub const REVOCATION_VERSION: u8 = 0;

/// An immutable record withdrawing a previously granted consent.
///
/// Terminal: once a receipt is revoked, no further state follows it. The
/// signature must come from the same grantor key that signed the receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    /// Schema version (currently 0).
    pub version: u8,

    /// The receipt being revoked, by content address.
    pub receipt_hash: ReceiptHash,

    /// When consent was withdrawn (Unix milliseconds).
    pub revoked_at: i64,

    /// Ed25519 signature by the original grantor key.
    pub signature: Signature,
}

impl RevocationRecord {
    /// Build and sign a revocation for the given receipt.
    pub fn sign(receipt_hash: ReceiptHash, revoked_at: i64, keypair: &Keypair) -> Self {
        let mut record = Self {
            version: REVOCATION_VERSION,
            receipt_hash,
            revoked_at,
            signature: Signature::ZERO,
        };

        let message = revocation_signing_message(&record);
        record.signature = keypair.sign(&message);
        record
    }

    /// Compute the record's content address.
    pub fn compute_hash(&self) -> RevocationHash {
        let bytes = canonical_revocation_bytes(self);
        RevocationHash(ContentHash::hash_domain(REVOCATION_ID_DOMAIN, &bytes).0)
    }

    /// Verify the signature against the grantor key of the revoked receipt.
    pub fn verify_signature(&self, grantor: &PublicKey) -> Result<(), CoreError> {
        let message = revocation_signing_message(self);
        grantor.verify(&message, &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::generate();
        let receipt_hash = ReceiptHash::from_bytes([0xab; 32]);

        let record = RevocationRecord::sign(receipt_hash, 60, &keypair);
        assert_eq!(record.version, REVOCATION_VERSION);
        assert_eq!(record.receipt_hash, receipt_hash);
        record
            .verify_signature(&keypair.public_key())
            .expect("grantor signature should verify");
    }

    #[test]
    fn test_wrong_key_rejected() {
        let grantor = Keypair::generate();
        let intruder = Keypair::generate();
        let receipt_hash = ReceiptHash::from_bytes([0xab; 32]);

        let record = RevocationRecord::sign(receipt_hash, 60, &intruder);
        assert!(record.verify_signature(&grantor.public_key()).is_err());
    }

    #[test]
    fn test_hash_deterministic() {
        let keypair = Keypair::from_seed(&[0x11; 32]);
        let receipt_hash = ReceiptHash::from_bytes([0xcd; 32]);

        let r1 = RevocationRecord::sign(receipt_hash, 60, &keypair);
        let r2 = RevocationRecord::sign(receipt_hash, 60, &keypair);
        assert_eq!(r1.compute_hash(), r2.compute_hash());

        let r3 = RevocationRecord::sign(receipt_hash, 61, &keypair);
        assert_ne!(r1.compute_hash(), r3.compute_hash());
    }
}
