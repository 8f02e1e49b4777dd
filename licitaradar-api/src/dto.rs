//! Request and response bodies for the search endpoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use licitaradar_core::{FailureKind, SearchId, UfCode, UnifiedResults};
use licitaradar_fetch::SearchOutcome;

#[derive(Debug, Deserialize)]
pub struct SearchRequestBody {
    pub query: String,
    /// Region codes to search; every federative unit when omitted.
    #[serde(default)]
    pub ufs: Option<Vec<String>>,
    /// Bypass the result cache. Only set on an explicit user refresh.
    #[serde(default)]
    pub force_fresh: bool,
    /// Client-chosen id, so the caller can open the progress stream
    /// while this request is still being held. Server-assigned when
    /// omitted.
    #[serde(default)]
    pub search_id: Option<SearchId>,
}

/// Whether the synchronous wait observed the search finish.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Complete,
    /// The sync wait elapsed first; the search is still running and the
    /// event stream has the rest.
    Running,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponseBody {
    pub search_id: SearchId,
    pub status: SearchStatus,
    pub total: u64,
    pub from_cache: bool,
    pub results: UnifiedResults,
    /// Regions that did not contribute, with the failure class of their
    /// last attempt.
    pub failed: BTreeMap<UfCode, FailureKind>,
}

impl SearchResponseBody {
    pub fn complete(outcome: &SearchOutcome) -> Self {
        Self {
            search_id: outcome.search_id,
            status: SearchStatus::Complete,
            total: outcome.total_found(),
            from_cache: outcome.from_cache,
            results: outcome.results.clone(),
            failed: outcome.failed.clone(),
        }
    }

    pub fn running(search_id: SearchId) -> Self {
        Self {
            search_id,
            status: SearchStatus::Running,
            total: 0,
            from_cache: false,
            results: UnifiedResults::new(),
            failed: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let body: SearchRequestBody =
            serde_json::from_str(r#"{"query": "merenda escolar"}"#).unwrap();
        assert_eq!(body.query, "merenda escolar");
        assert!(body.ufs.is_none());
        assert!(!body.force_fresh);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SearchStatus::Running).unwrap(),
            "\"running\""
        );
    }
}
