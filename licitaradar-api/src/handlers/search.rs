use axum::extract::State;
use axum::Json;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{info, warn};

use licitaradar_core::{SearchQuery, UfCode};

use crate::dto::{SearchRequestBody, SearchResponseBody};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Top-level search. Registers the progress stream, dispatches the
/// orchestrator detached, and holds the caller until completion or the
/// sync-wait ceiling. Dropping the request (client gone) never cancels
/// the dispatched work; its results still land in the cache.
pub async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequestBody>,
) -> ApiResult<Json<SearchResponseBody>> {
    let query = SearchQuery::new(payload.query);
    if query.is_empty() {
        return Err(ApiError::Validation("query must not be empty".into()));
    }

    let ufs = match payload.ufs {
        None => UfCode::all(),
        Some(codes) => {
            if codes.is_empty() {
                return Err(ApiError::Validation(
                    "ufs must name at least one region when present".into(),
                ));
            }
            codes
                .iter()
                .map(|c| UfCode::parse(c))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let search_id = payload.search_id.unwrap_or_default();
    if state.registry.contains(search_id) {
        return Err(ApiError::Validation(format!(
            "search id {} is already in use",
            search_id
        )));
    }
    state.registry.register(search_id);
    counter!("licitaradar_api_searches_total").increment(1);
    info!(%search_id, regions = ufs.len(), force_fresh = payload.force_fresh, "search accepted");

    let (events_tx, mut events_rx) = mpsc::channel(256);

    // Pump: the single consumer of orchestrator events, feeding the
    // registry's buffer and broadcast.
    let registry = state.registry.clone();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            registry.publish(search_id, event);
        }
    });

    let orchestrator = state.orchestrator.clone();
    let run = tokio::spawn(async move {
        orchestrator
            .run(search_id, query, ufs, payload.force_fresh, events_tx)
            .await
    });

    match tokio::time::timeout(state.config.max_sync_wait, run).await {
        Ok(Ok(outcome)) => Ok(Json(SearchResponseBody::complete(&outcome))),
        Ok(Err(join_error)) => {
            warn!(%search_id, error = %join_error, "search task failed");
            Err(ApiError::Internal("search task failed".into()))
        }
        Err(_) => {
            // Still running; the event stream carries the remainder.
            info!(%search_id, "sync wait elapsed, search continues in background");
            Ok(Json(SearchResponseBody::running(search_id)))
        }
    }
}
