//! Query normalization and cache keying.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::types::UfCode;

/// A search query as submitted by the caller.
///
/// Two queries that differ only in case or whitespace normalize to the
/// same text, and therefore to the same cache key for the same region
/// set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }

    /// Trimmed, lowercased, inner whitespace collapsed to single spaces.
    pub fn normalized(&self) -> String {
        self.0
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.normalized().is_empty()
    }

    /// Cache key: hex SHA-256 over the normalized text and the sorted
    /// region codes, so the same query over a different region set never
    /// aliases.
    pub fn cache_key(&self, ufs: &[UfCode]) -> String {
        let mut sorted: Vec<&str> = ufs.iter().map(|u| u.as_str()).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut hasher = Sha256::new();
        hasher.update(self.normalized().as_bytes());
        hasher.update(b"\x1f");
        for uf in sorted {
            hasher.update(uf.as_bytes());
            hasher.update(b",");
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SearchQuery {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
