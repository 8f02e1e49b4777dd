use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use licitaradar_api::config::ApiConfig;
use licitaradar_api::{observability, router, AppState};
use licitaradar_fetch::{
    AdaptiveTimeoutManager, CircuitBreaker, FetchConfig, FetchOrchestrator, ResultCache,
    RetryCoordinator, UpstreamClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_logging();

    let fetch_config = FetchConfig::from_env();
    let api_config = ApiConfig::from_env();

    let upstream = UpstreamClient::new(fetch_config.upstream_config())
        .map_err(|e| anyhow::anyhow!("building upstream client: {e}"))?;

    let breaker = Arc::new(CircuitBreaker::new(fetch_config.breaker_config()));
    let timeouts = Arc::new(AdaptiveTimeoutManager::default());
    let retry = Arc::new(RetryCoordinator::new(
        fetch_config.retry_config(),
        breaker,
        timeouts,
    ));
    let cache = Arc::new(ResultCache::new(fetch_config.cache_config()));

    let orchestrator = Arc::new(FetchOrchestrator::new(
        Arc::new(upstream),
        retry,
        cache,
        fetch_config.max_concurrent,
    ));

    let state = AppState::new(orchestrator, api_config.clone());
    let app = router(state);

    info!(addr = %api_config.bind_addr, "starting licitaradar api");
    let listener = tokio::net::TcpListener::bind(api_config.bind_addr)
        .await
        .with_context(|| format!("binding {}", api_config.bind_addr))?;
    axum::serve(listener, app).await.context("serving")?;

    Ok(())
}
