//! Golden test vectors for deterministic verification.
//!
//! These vectors ensure that canonical encoding produces identical results
//! across all implementations of the receipt format.

use serde::Serialize;

use assent_core::{
    canonical_receipt_bytes, ConsentReceipt, Keypair, ReceiptBuilder, ReceiptHash, ScopeSet,
    SubjectId,
};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed for deterministic key generation.
    pub seed: [u8; 32],
    /// Subject label (the SubjectId is derived from it).
    pub subject_label: &'static str,
    /// Scope labels.
    pub scopes: &'static [&'static str],
    /// Issuance timestamp.
    pub issued_at: i64,
    /// Expiration timestamp, if any.
    pub expires_at: Option<i64>,
    /// Previous receipt hash, if the vector is chained.
    pub prev: Option<[u8; 32]>,
    /// Expected receipt hash (hex). Empty until pinned.
    pub expected_receipt_hash: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "minimal: no scopes, no expiry",
            seed: [0x01; 32],
            subject_label: "alice",
            scopes: &[],
            issued_at: 0,
            expires_at: None,
            prev: None,
            expected_receipt_hash: "",
        },
        GoldenVector {
            name: "single scope with expiry",
            seed: [0x42; 32],
            subject_label: "alice",
            scopes: &["analytics"],
            issued_at: 1_736_870_400_000, // 2025-01-14T16:00:00Z
            expires_at: Some(1_768_406_400_000),
            prev: None,
            expected_receipt_hash: "",
        },
        GoldenVector {
            name: "multiple scopes, sorted on encode",
            seed: [0x42; 32],
            subject_label: "alice",
            scopes: &["model-training", "analytics", "retention"],
            issued_at: 1_736_870_400_000,
            expires_at: None,
            prev: None,
            expected_receipt_hash: "",
        },
        GoldenVector {
            name: "chained receipt",
            seed: [0x42; 32],
            subject_label: "alice",
            scopes: &["analytics"],
            issued_at: 1_736_870_401_000,
            expires_at: None,
            prev: Some([0xaa; 32]),
            expected_receipt_hash: "",
        },
    ]
}

/// Generate a receipt from a golden vector.
pub fn generate_receipt_from_vector(vector: &GoldenVector) -> ConsentReceipt {
    let keypair = Keypair::from_seed(&vector.seed);

    let mut builder = ReceiptBuilder::new(SubjectId::derive(vector.subject_label))
        .scope(ScopeSet::from_labels(vector.scopes.iter().copied()).expect("valid vector scopes"))
        .issued_at(vector.issued_at);

    if let Some(expires_at) = vector.expires_at {
        builder = builder.expires_at(expires_at);
    }
    if let Some(prev) = vector.prev {
        builder = builder.prev(ReceiptHash::from_bytes(prev));
    }

    builder.sign(&keypair)
}

/// Verify all golden vectors produce consistent receipt hashes.
///
/// Call this to verify an implementation matches the reference. Returns
/// `(name, matches, hash_hex)` per vector; vectors with an empty expected
/// hash just report what was computed.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let receipt = generate_receipt_from_vector(v);
            let hex = receipt.compute_hash().to_hex();
            let matches = v.expected_receipt_hash.is_empty() || hex == v.expected_receipt_hash;
            (v.name.to_string(), matches, hex)
        })
        .collect()
}

/// Serializable export of a computed vector, for sharing with other
/// implementations.
#[derive(Debug, Serialize)]
pub struct VectorExport {
    pub name: String,
    pub seed: String,
    pub subject_label: String,
    pub scopes: Vec<String>,
    pub issued_at: i64,
    pub expires_at: Option<i64>,
    pub prev: Option<String>,
    pub canonical_bytes: String,
    pub receipt_hash: String,
}

/// Compute the export form of every vector.
pub fn export_all_vectors() -> Vec<VectorExport> {
    all_vectors()
        .iter()
        .map(|v| {
            let receipt = generate_receipt_from_vector(v);
            VectorExport {
                name: v.name.to_string(),
                seed: hex::encode(v.seed),
                subject_label: v.subject_label.to_string(),
                scopes: v.scopes.iter().map(|s| s.to_string()).collect(),
                issued_at: v.issued_at,
                expires_at: v.expires_at,
                prev: v.prev.map(hex::encode),
                canonical_bytes: hex::encode(canonical_receipt_bytes(&receipt)),
                receipt_hash: receipt.compute_hash().to_hex(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_are_deterministic() {
        for vector in all_vectors() {
            let r1 = generate_receipt_from_vector(&vector);
            let r2 = generate_receipt_from_vector(&vector);

            assert_eq!(
                r1.compute_hash(),
                r2.compute_hash(),
                "vector {} not deterministic",
                vector.name
            );
            assert_eq!(canonical_receipt_bytes(&r1), canonical_receipt_bytes(&r2));
        }
    }

    #[test]
    fn test_vectors_verify() {
        for (name, matches, hash) in verify_all_vectors() {
            assert!(matches, "vector {} mismatched (got {})", name, hash);
        }
    }

    #[test]
    fn test_vector_signatures_valid() {
        for vector in all_vectors() {
            let receipt = generate_receipt_from_vector(&vector);
            receipt
                .verify_signature()
                .unwrap_or_else(|_| panic!("vector {} signature invalid", vector.name));
        }
    }

    #[test]
    fn test_vectors_export_as_json() {
        let exports = export_all_vectors();
        assert_eq!(exports.len(), all_vectors().len());

        let json = serde_json::to_string_pretty(&exports).unwrap();
        assert!(json.contains("receipt_hash"));
    }

    #[test]
    fn test_scope_order_does_not_change_hash() {
        // The third vector lists scopes unsorted; building the same set in
        // sorted order must produce the identical receipt.
        let vector = &all_vectors()[2];
        let keypair = Keypair::from_seed(&vector.seed);

        let sorted = ReceiptBuilder::new(SubjectId::derive(vector.subject_label))
            .scope(ScopeSet::from_labels(["analytics", "model-training", "retention"]).unwrap())
            .issued_at(vector.issued_at)
            .sign(&keypair);

        let from_vector = generate_receipt_from_vector(vector);
        assert_eq!(sorted.compute_hash(), from_vector.compute_hash());
    }
}
