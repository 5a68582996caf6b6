//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! The canonical encoding is what makes the ledger tamper-evident: the
//! same receipt or revocation always produces identical bytes, and thus an
//! identical content address, on every platform.

use ciborium::value::Value;

use crate::crypto::{PublicKey, Signature};
use crate::error::CoreError;
use crate::receipt::{ConsentReceipt, RECEIPT_VERSION};
use crate::revocation::{RevocationRecord, REVOCATION_VERSION};
use crate::scope::ScopeSet;
use crate::types::{ReceiptHash, SubjectId};

/// Domain prefix for receipt signing messages.
pub const CONSENT_SIGN_DOMAIN: &[u8] = b"assent/consent-sig/v0";

/// Domain prefix for receipt content addresses.
pub const CONSENT_ID_DOMAIN: &[u8] = b"assent/consent-id/v0";

/// Domain prefix for revocation signing messages.
pub const REVOCATION_SIGN_DOMAIN: &[u8] = b"assent/revocation-sig/v0";

/// Domain prefix for revocation content addresses.
pub const REVOCATION_ID_DOMAIN: &[u8] = b"assent/revocation-id/v0";

/// Receipt field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod receipt_keys {
    pub const VERSION: u64 = 0;
    pub const SUBJECT: u64 = 1;
    pub const GRANTOR: u64 = 2;
    pub const SCOPE: u64 = 3;
    pub const ISSUED_AT: u64 = 4;
    pub const EXPIRES_AT: u64 = 5;
    pub const PREV_RECEIPT_HASH: u64 = 6;
    pub const SIGNATURE: u64 = 7;
}

/// Revocation field keys.
mod revocation_keys {
    pub const VERSION: u64 = 0;
    pub const RECEIPT_HASH: u64 = 1;
    pub const REVOKED_AT: u64 = 2;
    pub const SIGNATURE: u64 = 3;
}

/// Encode a full receipt (including signature) to canonical bytes.
pub fn canonical_receipt_bytes(receipt: &ConsentReceipt) -> Vec<u8> {
    encode_cbor_value_canonical(&receipt_to_cbor_value(receipt, true))
}

/// Construct the signed message for a receipt.
///
/// Format: `CONSENT_SIGN_DOMAIN || canonical map without the signature`.
pub fn receipt_signing_message(receipt: &ConsentReceipt) -> Vec<u8> {
    let mut buf = CONSENT_SIGN_DOMAIN.to_vec();
    buf.extend_from_slice(&encode_cbor_value_canonical(&receipt_to_cbor_value(
        receipt, false,
    )));
    buf
}

/// Encode a full revocation record (including signature) to canonical bytes.
pub fn canonical_revocation_bytes(record: &RevocationRecord) -> Vec<u8> {
    encode_cbor_value_canonical(&revocation_to_cbor_value(record, true))
}

/// Construct the signed message for a revocation record.
pub fn revocation_signing_message(record: &RevocationRecord) -> Vec<u8> {
    let mut buf = REVOCATION_SIGN_DOMAIN.to_vec();
    buf.extend_from_slice(&encode_cbor_value_canonical(&revocation_to_cbor_value(
        record, false,
    )));
    buf
}

/// Convert a receipt to a CBOR Value (map with integer keys).
fn receipt_to_cbor_value(receipt: &ConsentReceipt, include_signature: bool) -> Value {
    let mut entries = Vec::with_capacity(8);

    entries.push((
        Value::Integer(receipt_keys::VERSION.into()),
        Value::Integer(receipt.version.into()),
    ));

    entries.push((
        Value::Integer(receipt_keys::SUBJECT.into()),
        Value::Bytes(receipt.subject.0.to_vec()),
    ));

    entries.push((
        Value::Integer(receipt_keys::GRANTOR.into()),
        Value::Bytes(receipt.grantor.0.to_vec()),
    ));

    // Scopes encode in ScopeSet iteration order, which is already sorted.
    let scope_array: Vec<Value> = receipt
        .scope
        .iter()
        .map(|s| Value::Text(s.as_str().to_string()))
        .collect();
    entries.push((
        Value::Integer(receipt_keys::SCOPE.into()),
        Value::Array(scope_array),
    ));

    entries.push((
        Value::Integer(receipt_keys::ISSUED_AT.into()),
        Value::Integer(receipt.issued_at.into()),
    ));

    let expires_value = match receipt.expires_at {
        Some(ts) => Value::Integer(ts.into()),
        None => Value::Null,
    };
    entries.push((Value::Integer(receipt_keys::EXPIRES_AT.into()), expires_value));

    let prev_value = match &receipt.prev_receipt_hash {
        Some(hash) => Value::Bytes(hash.0.to_vec()),
        None => Value::Null,
    };
    entries.push((
        Value::Integer(receipt_keys::PREV_RECEIPT_HASH.into()),
        prev_value,
    ));

    if include_signature {
        entries.push((
            Value::Integer(receipt_keys::SIGNATURE.into()),
            Value::Bytes(receipt.signature.0.to_vec()),
        ));
    }

    Value::Map(entries)
}

/// Convert a revocation record to a CBOR Value.
fn revocation_to_cbor_value(record: &RevocationRecord, include_signature: bool) -> Value {
    let mut entries = Vec::with_capacity(4);

    entries.push((
        Value::Integer(revocation_keys::VERSION.into()),
        Value::Integer(record.version.into()),
    ));

    entries.push((
        Value::Integer(revocation_keys::RECEIPT_HASH.into()),
        Value::Bytes(record.receipt_hash.0.to_vec()),
    ));

    entries.push((
        Value::Integer(revocation_keys::REVOKED_AT.into()),
        Value::Integer(record.revoked_at.into()),
    ));

    if include_signature {
        entries.push((
            Value::Integer(revocation_keys::SIGNATURE.into()),
            Value::Bytes(record.signature.0.to_vec()),
        ));
    }

    Value::Map(entries)
}

/// Encode a CBOR Value to canonical bytes.
fn encode_cbor_value_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => panic!("floats not supported in canonical encoding"),
        _ => panic!("unsupported CBOR value type"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);

    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

/// Decode a consent receipt from canonical bytes.
pub fn decode_receipt(bytes: &[u8]) -> Result<ConsentReceipt, CoreError> {
    let cursor = std::io::Cursor::new(bytes);
    let value: Value =
        ciborium::from_reader(cursor).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let map = as_map(&value)?;

    let version = get_u8(map, receipt_keys::VERSION, "version")?;
    if version != RECEIPT_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let subject = SubjectId(get_bytes32(map, receipt_keys::SUBJECT, "subject")?);
    let grantor = PublicKey(get_bytes32(map, receipt_keys::GRANTOR, "grantor")?);

    let scope = match get(map, receipt_keys::SCOPE) {
        Some(Value::Array(arr)) => {
            let mut labels = Vec::with_capacity(arr.len());
            for item in arr {
                match item {
                    Value::Text(s) => labels.push(s.clone()),
                    _ => return Err(CoreError::MalformedRecord("invalid scope entry".into())),
                }
            }
            let count = labels.len();
            let scope = ScopeSet::from_labels(labels)?;
            if scope.len() != count {
                return Err(CoreError::MalformedRecord("duplicate scope".into()));
            }
            scope
        }
        _ => return Err(CoreError::MalformedRecord("missing scope".into())),
    };

    let issued_at = get_i64(map, receipt_keys::ISSUED_AT, "issued_at")?;
    let expires_at = get_optional_i64(map, receipt_keys::EXPIRES_AT, "expires_at")?;

    let prev_receipt_hash = match get(map, receipt_keys::PREV_RECEIPT_HASH) {
        Some(Value::Bytes(b)) if b.len() == 32 => {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(b);
            Some(ReceiptHash(arr))
        }
        Some(Value::Null) | None => None,
        _ => {
            return Err(CoreError::MalformedRecord(
                "invalid prev_receipt_hash".into(),
            ))
        }
    };

    let signature = Signature(get_bytes64(map, receipt_keys::SIGNATURE, "signature")?);

    Ok(ConsentReceipt {
        version,
        subject,
        grantor,
        scope,
        issued_at,
        expires_at,
        prev_receipt_hash,
        signature,
    })
}

/// Decode a revocation record from canonical bytes.
pub fn decode_revocation(bytes: &[u8]) -> Result<RevocationRecord, CoreError> {
    let cursor = std::io::Cursor::new(bytes);
    let value: Value =
        ciborium::from_reader(cursor).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let map = as_map(&value)?;

    let version = get_u8(map, revocation_keys::VERSION, "version")?;
    if version != REVOCATION_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let receipt_hash = ReceiptHash(get_bytes32(
        map,
        revocation_keys::RECEIPT_HASH,
        "receipt_hash",
    )?);
    let revoked_at = get_i64(map, revocation_keys::REVOKED_AT, "revoked_at")?;
    let signature = Signature(get_bytes64(map, revocation_keys::SIGNATURE, "signature")?);

    Ok(RevocationRecord {
        version,
        receipt_hash,
        revoked_at,
        signature,
    })
}

// ─────────────────────────────────────────────────────────────────────────
// Decode helpers
// ─────────────────────────────────────────────────────────────────────────

fn as_map(value: &Value) -> Result<&Vec<(Value, Value)>, CoreError> {
    match value {
        Value::Map(m) => Ok(m),
        _ => Err(CoreError::MalformedRecord("expected map".into())),
    }
}

fn get(map: &[(Value, Value)], key: u64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
        .map(|(_, v)| v)
}

fn get_u8(map: &[(Value, Value)], key: u64, field: &str) -> Result<u8, CoreError> {
    match get(map, key) {
        Some(Value::Integer(i)) => {
            let n: i128 = (*i).into();
            u8::try_from(n).map_err(|_| CoreError::MalformedRecord(format!("invalid {}", field)))
        }
        _ => Err(CoreError::MalformedRecord(format!("missing {}", field))),
    }
}

fn get_i64(map: &[(Value, Value)], key: u64, field: &str) -> Result<i64, CoreError> {
    match get(map, key) {
        Some(Value::Integer(i)) => {
            let n: i128 = (*i).into();
            i64::try_from(n).map_err(|_| CoreError::MalformedRecord(format!("invalid {}", field)))
        }
        _ => Err(CoreError::MalformedRecord(format!("missing {}", field))),
    }
}

fn get_optional_i64(
    map: &[(Value, Value)],
    key: u64,
    field: &str,
) -> Result<Option<i64>, CoreError> {
    match get(map, key) {
        Some(Value::Integer(i)) => {
            let n: i128 = (*i).into();
            i64::try_from(n)
                .map(Some)
                .map_err(|_| CoreError::MalformedRecord(format!("invalid {}", field)))
        }
        Some(Value::Null) | None => Ok(None),
        _ => Err(CoreError::MalformedRecord(format!("invalid {}", field))),
    }
}

fn get_bytes32(map: &[(Value, Value)], key: u64, field: &str) -> Result<[u8; 32], CoreError> {
    match get(map, key) {
        Some(Value::Bytes(b)) if b.len() == 32 => {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(b);
            Ok(arr)
        }
        _ => Err(CoreError::MalformedRecord(format!("invalid {}", field))),
    }
}

fn get_bytes64(map: &[(Value, Value)], key: u64, field: &str) -> Result<[u8; 64], CoreError> {
    match get(map, key) {
        Some(Value::Bytes(b)) if b.len() == 64 => {
            let mut arr = [0u8; 64];
            arr.copy_from_slice(b);
            Ok(arr)
        }
        _ => Err(CoreError::MalformedRecord(format!("invalid {}", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::receipt::ReceiptBuilder;

    fn sample_receipt() -> ConsentReceipt {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        ReceiptBuilder::new(SubjectId::derive("alice"))
            .scope(ScopeSet::from_labels(["analytics", "model-training"]).unwrap())
            .issued_at(1_736_870_400_000)
            .expires_at(1_768_406_400_000)
            .sign(&keypair)
    }

    #[test]
    fn test_canonical_encoding_deterministic() {
        let receipt = sample_receipt();
        assert_eq!(
            canonical_receipt_bytes(&receipt),
            canonical_receipt_bytes(&receipt)
        );
    }

    #[test]
    fn test_signing_message_excludes_signature() {
        let receipt = sample_receipt();
        let message = receipt_signing_message(&receipt);
        let full = canonical_receipt_bytes(&receipt);

        assert!(message.starts_with(CONSENT_SIGN_DOMAIN));
        // The full encoding carries the 64-byte signature the message lacks.
        assert!(full.len() > message.len() - CONSENT_SIGN_DOMAIN.len());
    }

    #[test]
    fn test_receipt_roundtrip() {
        let receipt = sample_receipt();
        let bytes = canonical_receipt_bytes(&receipt);
        let decoded = decode_receipt(&bytes).unwrap();
        assert_eq!(receipt, decoded);
    }

    #[test]
    fn test_receipt_roundtrip_no_expiry_no_prev() {
        let keypair = Keypair::from_seed(&[0x01; 32]);
        let receipt = ReceiptBuilder::new(SubjectId::derive("bob"))
            .issued_at(0)
            .sign(&keypair);

        let bytes = canonical_receipt_bytes(&receipt);
        let decoded = decode_receipt(&bytes).unwrap();
        assert_eq!(receipt, decoded);
        assert!(decoded.expires_at.is_none());
        assert!(decoded.prev_receipt_hash.is_none());
    }

    #[test]
    fn test_revocation_roundtrip() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let record = RevocationRecord::sign(ReceiptHash::from_bytes([0xab; 32]), 60, &keypair);

        let bytes = canonical_revocation_bytes(&record);
        let decoded = decode_revocation(&bytes).unwrap();
        assert_eq!(record, decoded);
    }

    #[test]
    fn test_decode_rejects_duplicate_scope() {
        // Hand-build a map with a duplicated scope label.
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let receipt = ReceiptBuilder::new(SubjectId::derive("alice"))
            .scope(ScopeSet::from_labels(["analytics"]).unwrap())
            .issued_at(0)
            .sign(&keypair);

        let mut value = receipt_to_cbor_value(&receipt, true);
        if let Value::Map(entries) = &mut value {
            for (k, v) in entries.iter_mut() {
                if matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(receipt_keys::SCOPE))
                {
                    *v = Value::Array(vec![
                        Value::Text("analytics".into()),
                        Value::Text("analytics".into()),
                    ]);
                }
            }
        }
        let bytes = encode_cbor_value_canonical(&value);

        assert!(matches!(
            decode_receipt(&bytes),
            Err(CoreError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();

        // 0-23: single byte
        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        // 24-255: two bytes
        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 255);
        assert_eq!(buf, vec![0x18, 255]);

        // 256-65535: three bytes
        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 65535);
        assert_eq!(buf, vec![0x19, 0xff, 0xff]);
    }

    #[test]
    fn test_map_key_ordering() {
        let mut buf = Vec::new();
        let entries = vec![
            (Value::Integer(7.into()), Value::Integer(70.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
            (Value::Integer(4.into()), Value::Integer(40.into())),
        ];
        encode_map_canonical(&mut buf, &entries);

        // Map header (3 entries), then keys in order 0, 4, 7.
        assert_eq!(buf[0], 0xa3);
        assert_eq!(buf[1], 0x00); // key 0
        assert_eq!(buf[2], 0x00); // value 0
        assert_eq!(buf[3], 0x04); // key 4
        assert_eq!(buf[4], 0x18); // value 40 (>23)
        assert_eq!(buf[5], 40);
        assert_eq!(buf[6], 0x07); // key 7
        assert_eq!(buf[7], 0x18); // value 70 (>23)
        assert_eq!(buf[8], 70);
    }

    #[test]
    fn test_hash_from_canonical_bytes() {
        let receipt = sample_receipt();
        let hash1 = receipt.compute_hash();

        let bytes = canonical_receipt_bytes(&receipt);
        let hash2 = ReceiptHash(
            crate::crypto::ContentHash::hash_domain(CONSENT_ID_DOMAIN, &bytes).0,
        );

        assert_eq!(hash1, hash2);
    }
}
