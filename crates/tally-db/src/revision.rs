//! # Revision Ids
//!
//! Every stored document carries a revision `N-<32 hex>`. `N` counts the
//! writes the document has seen; the hex tail tells apart two writes that
//! reached the same count on different replicas.
//!
//! ```text
//!   put (new)        put(expected = 1-…)     put(expected = 2-…)
//!   ─────────► 1-a3f0…  ─────────────► 2-9c11…  ─────────────► 3-07be…
//! ```
//!
//! Ordering between revisions looks only at `N`. A prefix that is not a
//! number counts as 0.

use std::fmt;

use serde::{Deserialize, Serialize};
use tally_core::validation::validate_revision;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Revision of a freshly created document.
    pub fn first() -> Self {
        Self::with_counter(1)
    }

    fn with_counter(counter: u64) -> Self {
        Revision(format!("{counter}-{}", Uuid::new_v4().simple()))
    }

    /// Checks the `<counter>-` shape.
    pub fn parse(raw: impl Into<String>) -> DbResult<Self> {
        let raw = raw.into();
        validate_revision(&raw).map_err(|e| DbError::InvalidRevision(e.to_string()))?;
        Ok(Revision(raw))
    }

    /// Wraps a revision read back from a store without checking it.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Revision(raw.into())
    }

    /// The revision the next write produces.
    pub fn next(&self) -> Self {
        Self::with_counter(self.counter() + 1)
    }

    pub fn counter(&self) -> u64 {
        revision_counter(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_greater_or_equal(&self, other: &Revision) -> bool {
        self.counter() >= other.counter()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Revision {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Leading write count of a revision string.
///
/// ```rust
/// use tally_db::revision::revision_counter;
///
/// assert_eq!(revision_counter("12-9f0c"), 12);
/// assert_eq!(revision_counter("abc-9f0c"), 0);
/// assert_eq!(revision_counter(""), 0);
/// ```
pub fn revision_counter(revision: &str) -> u64 {
    revision
        .split('-')
        .next()
        .and_then(|counter| counter.parse().ok())
        .unwrap_or(0)
}

/// `lhs` has seen at least as many writes as `rhs`.
pub fn is_greater_or_equal_rev(lhs: &str, rhs: &str) -> bool {
    revision_counter(lhs) >= revision_counter(rhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_and_next() {
        let first = Revision::first();
        assert_eq!(first.counter(), 1);
        assert_eq!(first.as_str().len(), 2 + 32);

        let second = first.next();
        assert_eq!(second.counter(), 2);
        assert!(second.is_greater_or_equal(&first));
        assert!(!first.is_greater_or_equal(&second));
    }

    #[test]
    fn test_compares_counter_not_string() {
        // "10-" sorts before "9-" as a string
        assert!(is_greater_or_equal_rev("10-aaa", "9-zzz"));
        assert!(is_greater_or_equal_rev("7-aaa", "7-bbb"));
        assert!(!is_greater_or_equal_rev("5-aaa", "7-aaa"));
    }

    #[test]
    fn test_non_numeric_prefix_counts_as_zero() {
        assert_eq!(revision_counter("x-1"), 0);
        assert!(is_greater_or_equal_rev("x-1", "0-1"));
        assert!(!is_greater_or_equal_rev("x-1", "1-1"));
    }

    #[test]
    fn test_parse() {
        assert!(Revision::parse("3-abc").is_ok());
        assert!(matches!(
            Revision::parse("abc"),
            Err(DbError::InvalidRevision(_))
        ));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let rev = Revision::from_stored("4-ff");
        assert_eq!(serde_json::to_string(&rev).unwrap(), "\"4-ff\"");
    }
}
