//! ConsentStatus: the derived validity of a receipt at a point in time.
//!
//! Status is never stored. It is a pure function of the receipt, its
//! revocation (if any), and the query time.

use serde::{Deserialize, Serialize};

use crate::receipt::ConsentReceipt;
use crate::revocation::RevocationRecord;

/// The validity of a consent receipt at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentStatus {
    /// Consent is in force.
    Active,
    /// Consent lapsed by passing its expiry.
    Expired,
    /// Consent was withdrawn by the grantor.
    Revoked,
}

impl ConsentStatus {
    /// Whether the consent is in force.
    pub fn is_active(self) -> bool {
        matches!(self, ConsentStatus::Active)
    }

    /// Whether the consent lapsed by expiry.
    pub fn is_expired(self) -> bool {
        matches!(self, ConsentStatus::Expired)
    }

    /// Whether the consent was withdrawn.
    pub fn is_revoked(self) -> bool {
        matches!(self, ConsentStatus::Revoked)
    }
}

/// Derive the status of `receipt` at time `at` (Unix milliseconds).
///
/// Revocation wins over expiration: from `revoked_at` onward the status is
/// `Revoked` no matter how the expiry relates to `at`. Expiry itself is
/// exclusive: at `t == expires_at` the consent is still active.
pub fn evaluate(
    receipt: &ConsentReceipt,
    revocation: Option<&RevocationRecord>,
    at: i64,
) -> ConsentStatus {
    if let Some(rev) = revocation {
        if at >= rev.revoked_at {
            return ConsentStatus::Revoked;
        }
    }

    if let Some(expires_at) = receipt.expires_at {
        if at > expires_at {
            return ConsentStatus::Expired;
        }
    }

    ConsentStatus::Active
}
