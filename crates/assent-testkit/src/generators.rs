//! Proptest generators for property-based testing.

use proptest::prelude::*;

use assent_core::{
    ConsentReceipt, ContentHash, Keypair, PublicKey, ReceiptBuilder, ReceiptHash, ScopeSet,
    SubjectId,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random receipt hash.
pub fn receipt_hash() -> impl Strategy<Value = ReceiptHash> {
    any::<[u8; 32]>().prop_map(ReceiptHash::from_bytes)
}

/// Generate a random subject identifier.
pub fn subject_id() -> impl Strategy<Value = SubjectId> {
    any::<[u8; 32]>().prop_map(SubjectId::from_bytes)
}

/// Generate a random content hash.
pub fn content_hash() -> impl Strategy<Value = ContentHash> {
    any::<[u8; 32]>().prop_map(ContentHash::from_bytes)
}

/// Generate a random public key.
pub fn public_key() -> impl Strategy<Value = PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a scope label.
pub fn scope_label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

/// Generate a scope set with up to 8 labels.
pub fn scope_set() -> impl Strategy<Value = ScopeSet> {
    prop::collection::vec(scope_label(), 0..=8)
        .prop_map(|labels| ScopeSet::from_labels(labels).expect("generated labels are valid"))
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=1_700_000_000_000i64
}

/// Parameters for generating a receipt.
#[derive(Debug, Clone)]
pub struct ReceiptParams {
    pub keypair: Keypair,
    pub subject_label: String,
    pub scope: ScopeSet,
    pub issued_at: i64,
    pub lifetime: Option<i64>,
    pub prev_receipt_hash: Option<ReceiptHash>,
}

impl Arbitrary for ReceiptParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(),
            "[a-z][a-z0-9-]{0,31}",
            scope_set(),
            timestamp(),
            any::<Option<u32>>(),
            any::<Option<[u8; 32]>>(),
        )
            .prop_map(
                |(seed, label, scope, issued_at, lifetime, prev)| ReceiptParams {
                    keypair: Keypair::from_seed(&seed),
                    subject_label: label,
                    scope,
                    issued_at,
                    // Expiry must be strictly after issuance.
                    lifetime: lifetime.map(|l| l as i64 + 1),
                    prev_receipt_hash: prev.map(ReceiptHash::from_bytes),
                },
            )
            .boxed()
    }
}

/// Generate a receipt from parameters.
pub fn receipt_from_params(params: &ReceiptParams) -> ConsentReceipt {
    let mut builder = ReceiptBuilder::new(SubjectId::derive(&params.subject_label))
        .scope(params.scope.clone())
        .issued_at(params.issued_at);

    if let Some(lifetime) = params.lifetime {
        builder = builder.expires_at(params.issued_at + lifetime);
    }
    if let Some(prev) = params.prev_receipt_hash {
        builder = builder.prev(prev);
    }

    builder.sign(&params.keypair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assent_core::{canonical_receipt_bytes, decode_receipt, validate_receipt};

    proptest! {
        #[test]
        fn test_receipt_hash_deterministic(params: ReceiptParams) {
            let r1 = receipt_from_params(&params);
            let r2 = receipt_from_params(&params);

            prop_assert_eq!(r1.compute_hash(), r2.compute_hash());
        }

        #[test]
        fn test_canonical_bytes_deterministic(params: ReceiptParams) {
            let r1 = receipt_from_params(&params);
            let r2 = receipt_from_params(&params);

            prop_assert_eq!(canonical_receipt_bytes(&r1), canonical_receipt_bytes(&r2));
        }

        #[test]
        fn test_generated_receipts_validate(params: ReceiptParams) {
            let receipt = receipt_from_params(&params);
            prop_assert!(validate_receipt(&receipt).is_ok());
        }

        #[test]
        fn test_canonical_roundtrip(params: ReceiptParams) {
            let receipt = receipt_from_params(&params);
            let bytes = canonical_receipt_bytes(&receipt);
            let decoded = decode_receipt(&bytes).unwrap();

            prop_assert_eq!(receipt, decoded);
        }

        #[test]
        fn test_hash_unique_with_different_scope(
            seed in any::<[u8; 32]>(),
            s1 in scope_set(),
            s2 in scope_set(),
        ) {
            prop_assume!(s1 != s2);

            let kp = Keypair::from_seed(&seed);
            let r1 = ReceiptBuilder::new(SubjectId::derive("alice"))
                .scope(s1)
                .issued_at(1000)
                .sign(&kp);
            let r2 = ReceiptBuilder::new(SubjectId::derive("alice"))
                .scope(s2)
                .issued_at(1000)
                .sign(&kp);

            prop_assert_ne!(r1.compute_hash(), r2.compute_hash());
        }
    }
}
