//! Scopes: the permitted uses named by a consent receipt.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::CoreError;

/// Maximum byte length of a single scope label.
pub const MAX_SCOPE_LEN: usize = 64;

/// A single permitted-use label.
///
/// Labels are non-empty printable ASCII without whitespace, at most
/// [`MAX_SCOPE_LEN`] bytes, e.g. `"model-training"` or `"analytics"`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope(String);

impl Scope {
    /// Create a scope, validating the label.
    pub fn new(label: impl Into<String>) -> Result<Self, CoreError> {
        let label = label.into();
        if label.is_empty() {
            return Err(CoreError::InvalidScope("empty label".into()));
        }
        if label.len() > MAX_SCOPE_LEN {
            return Err(CoreError::InvalidScope(format!(
                "label exceeds {} bytes",
                MAX_SCOPE_LEN
            )));
        }
        if !label.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(CoreError::InvalidScope(format!(
                "label {:?} contains non-printable or non-ASCII characters",
                label
            )));
        }
        Ok(Self(label))
    }

    /// Get the label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Scope {
    type Error = CoreError;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        Scope::new(label)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.0
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({})", self.0)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered, deduplicated set of scopes.
///
/// The ordering is what keeps the canonical encoding deterministic: the
/// same set of labels always encodes to the same bytes.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    /// Create an empty scope set (consent that permits no scoped use).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scope set from string labels, validating each.
    pub fn from_labels<I, S>(labels: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for label in labels {
            set.insert(Scope::new(label)?);
        }
        Ok(Self(set))
    }

    /// Insert a scope.
    pub fn insert(&mut self, scope: Scope) {
        self.0.insert(scope);
    }

    /// Check membership.
    pub fn contains(&self, scope: &Scope) -> bool {
        self.0.contains(scope)
    }

    /// Check whether this set covers every scope in `required`.
    pub fn covers(&self, required: &ScopeSet) -> bool {
        required.0.is_subset(&self.0)
    }

    /// Iterate in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.0.iter()
    }

    /// Number of scopes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted labels as owned strings (for storage encodings).
    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(|s| s.0.clone()).collect()
    }
}

impl fmt::Debug for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
