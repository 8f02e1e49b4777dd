//! Procurement notice records and the unified per-region result set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::UfCode;

/// One procurement notice as returned by the upstream source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notice {
    pub uf: UfCode,
    pub title: String,
    /// Publishing organ, e.g. a municipal secretariat.
    pub organ: String,
    pub published_at: DateTime<Utc>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// Result set for a single region.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegionResult {
    pub notices: Vec<Notice>,
}

impl RegionResult {
    pub fn new(notices: Vec<Notice>) -> Self {
        Self { notices }
    }

    pub fn count(&self) -> u64 {
        self.notices.len() as u64
    }
}

/// The unified result of one search: every region that succeeded, keyed
/// by its code. Failed regions are simply absent: partial coverage is a
/// valid result, not an error. BTreeMap keeps region iteration in
/// lexicographic order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UnifiedResults {
    pub regions: BTreeMap<UfCode, RegionResult>,
}

impl UnifiedResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uf: UfCode, notices: Vec<Notice>) {
        self.regions.insert(uf, RegionResult::new(notices));
    }

    pub fn count_for(&self, uf: &UfCode) -> Option<u64> {
        self.regions.get(uf).map(RegionResult::count)
    }

    pub fn total(&self) -> u64 {
        self.regions.values().map(RegionResult::count).sum()
    }

    /// Regions present in the payload, lexicographically ordered.
    pub fn covered(&self) -> Vec<UfCode> {
        self.regions.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
