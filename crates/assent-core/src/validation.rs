//! Record validation: signature verification and structural checks.

use crate::crypto::PublicKey;
use crate::error::ValidationError;
use crate::receipt::{ConsentReceipt, MAX_SCOPES, RECEIPT_VERSION};
use crate::revocation::{RevocationRecord, REVOCATION_VERSION};

/// Validate a consent receipt.
///
/// This performs:
/// - Version check
/// - Scope count limit
/// - Expiry ordering (expiry must be strictly after issuance)
/// - Signature verification against the grantor key
pub fn validate_receipt(receipt: &ConsentReceipt) -> Result<(), ValidationError> {
    validate_receipt_structure(receipt)?;

    receipt
        .verify_signature()
        .map_err(|_| ValidationError::SignatureFailed)?;

    Ok(())
}

/// Validate receipt structure without signature verification.
///
/// Useful when the receipt comes from trusted storage and was verified on
/// the way in.
pub fn validate_receipt_structure(receipt: &ConsentReceipt) -> Result<(), ValidationError> {
    if receipt.version != RECEIPT_VERSION {
        return Err(ValidationError::UnsupportedVersion(receipt.version));
    }

    if receipt.scope.len() > MAX_SCOPES {
        return Err(ValidationError::TooManyScopes {
            count: receipt.scope.len(),
            max: MAX_SCOPES,
        });
    }

    if let Some(expires_at) = receipt.expires_at {
        if expires_at <= receipt.issued_at {
            return Err(ValidationError::ExpiresBeforeIssued {
                issued_at: receipt.issued_at,
                expires_at,
            });
        }
    }

    Ok(())
}

/// Validate a revocation record against the grantor key of the receipt it
/// revokes.
pub fn validate_revocation(
    record: &RevocationRecord,
    grantor: &PublicKey,
) -> Result<(), ValidationError> {
    if record.version != REVOCATION_VERSION {
        return Err(ValidationError::UnsupportedVersion(record.version));
    }

    record
        .verify_signature(grantor)
        .map_err(|_| ValidationError::SignatureFailed)?;

    Ok(())
}
