//! # Assent Testkit
//!
//! Testing utilities for the Assent ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known test cases with expected outputs for
//!   cross-implementation verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up test scenarios
//!
//! ## Golden Vectors
//!
//! Golden vectors ensure deterministic canonicalization across
//! implementations:
//!
//! ```rust
//! use assent_testkit::vectors::{all_vectors, generate_receipt_from_vector};
//!
//! for vector in all_vectors() {
//!     let receipt = generate_receipt_from_vector(&vector);
//!     println!("{}: {}", vector.name, receipt.compute_hash().to_hex());
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use assent_testkit::generators::{receipt_from_params, ReceiptParams};
//!
//! proptest! {
//!     #[test]
//!     fn receipt_hash_is_deterministic(params: ReceiptParams) {
//!         let r1 = receipt_from_params(&params);
//!         let r2 = receipt_from_params(&params);
//!         prop_assert_eq!(r1.compute_hash(), r2.compute_hash());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust
//! use assent_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let receipt = fixture.make_receipt("alice", &["analytics"], 0, Some(100), None);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_grantor_fixtures, TestFixture};
