//! Canonical unordered medication pairs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical key for an unordered pair of distinct medication ids.
///
/// Both directions of a pair (A→B and B→A) map to the same key, so the
/// key can serve as a lock identity and for symmetry reasoning. The
/// constructor rejects self-pairs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    low: String,
    high: String,
}

impl PairKey {
    /// Build the canonical key for `(a, b)`. Returns `None` if `a == b`.
    pub fn new(a: &str, b: &str) -> Option<Self> {
        if a == b {
            return None;
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Some(Self {
            low: low.to_string(),
            high: high.to_string(),
        })
    }

    /// Lexicographically smaller id of the pair.
    pub fn low(&self) -> &str {
        &self.low
    }

    /// Lexicographically larger id of the pair.
    pub fn high(&self) -> &str {
        &self.high
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}
