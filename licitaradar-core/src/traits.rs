use async_trait::async_trait;

use crate::error::FetchFailure;
use crate::notice::Notice;
use crate::query::SearchQuery;
use crate::types::UfCode;

/// One raw fetch against a single region of the upstream source.
///
/// Implementations carry no resilience logic: budgets, retries, and
/// circuit state are applied by the caller. The orchestrator takes this
/// seam by `Arc` so tests can substitute scripted fetchers.
#[async_trait]
pub trait RegionFetch: Send + Sync {
    async fn fetch_region(
        &self,
        query: &SearchQuery,
        uf: UfCode,
    ) -> Result<Vec<Notice>, FetchFailure>;
}
