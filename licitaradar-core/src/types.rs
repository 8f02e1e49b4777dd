//! Region and search identifiers shared across the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// The 27 federative unit codes, in lexicographic order.
pub const ALL_UFS: [&str; 27] = [
    "AC", "AL", "AM", "AP", "BA", "CE", "DF", "ES", "GO", "MA", "MG", "MS", "MT", "PA", "PB",
    "PE", "PI", "PR", "RJ", "RN", "RO", "RR", "RS", "SC", "SE", "SP", "TO",
];

/// A federative unit code such as `SP` or `RJ`.
///
/// This is the sharding unit for every piece of per-region state: timeout
/// budgets, circuit records, and retry accounting are all keyed by it.
/// Codes are validated against [`ALL_UFS`] at construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct UfCode([u8; 2]);

impl UfCode {
    /// Parse a code, accepting lowercase input.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let upper = s.trim().to_ascii_uppercase();
        if ALL_UFS.contains(&upper.as_str()) {
            let bytes = upper.as_bytes();
            Ok(Self([bytes[0], bytes[1]]))
        } else {
            Err(CoreError::InvalidRegion(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        // Always two validated ASCII uppercase bytes.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }

    /// All 27 codes, lexicographically ordered.
    pub fn all() -> Vec<UfCode> {
        ALL_UFS
            .iter()
            .map(|s| Self([s.as_bytes()[0], s.as_bytes()[1]]))
            .collect()
    }
}

impl fmt::Display for UfCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UfCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UfCode {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<UfCode> for String {
    fn from(uf: UfCode) -> Self {
        uf.as_str().to_string()
    }
}

/// Newtype pattern for SearchId
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SearchId(pub Uuid);

impl SearchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SearchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SearchId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<SearchId> for Uuid {
    fn from(id: SearchId) -> Self {
        id.0
    }
}
