//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use assent_core::{
    ConsentReceipt, Keypair, ReceiptBuilder, ReceiptHash, RevocationRecord, ScopeSet, SubjectId,
};
use assent_ledger::{Ledger, LedgerConfig};
use assent_store::MemoryStore;

/// A test fixture with a grantor keypair and memory store.
pub struct TestFixture {
    pub keypair: Keypair,
    pub store: MemoryStore,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> Self {
        Self::with_seed(random_seed())
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
            store: MemoryStore::new(),
        }
    }

    /// Get the keypair's public key.
    pub fn public_key(&self) -> assent_core::PublicKey {
        self.keypair.public_key()
    }

    /// Derive a subject identifier for a given label.
    pub fn subject(&self, label: &str) -> SubjectId {
        SubjectId::derive(label)
    }

    /// Create a signed consent receipt.
    pub fn make_receipt(
        &self,
        subject_label: &str,
        scopes: &[&str],
        issued_at: i64,
        expires_at: Option<i64>,
        prev: Option<ReceiptHash>,
    ) -> ConsentReceipt {
        let mut builder = ReceiptBuilder::new(SubjectId::derive(subject_label))
            .scope(ScopeSet::from_labels(scopes.iter().copied()).expect("valid scope labels"))
            .issued_at(issued_at);
        if let Some(expires_at) = expires_at {
            builder = builder.expires_at(expires_at);
        }
        if let Some(prev) = prev {
            builder = builder.prev(prev);
        }
        builder.sign(&self.keypair)
    }

    /// Create a signed revocation for a receipt.
    pub fn make_revocation(&self, receipt_hash: ReceiptHash, revoked_at: i64) -> RevocationRecord {
        RevocationRecord::sign(receipt_hash, revoked_at, &self.keypair)
    }

    /// Consume the fixture, wrapping its store in a ledger.
    pub fn into_ledger(self) -> (Keypair, Ledger<MemoryStore>) {
        (
            self.keypair,
            Ledger::new(self.store, LedgerConfig::default()),
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures for multi-grantor tests.
pub fn multi_grantor_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}

/// A fresh random 32-byte seed.
pub fn random_seed() -> [u8; 32] {
    rand::random()
}
