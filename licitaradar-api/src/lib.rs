//! HTTP surface for LicitaRadar: the top-level search endpoint and the
//! per-search SSE progress stream.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod registry;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use licitaradar_fetch::FetchOrchestrator;

use crate::config::ApiConfig;
use crate::registry::SearchRegistry;

/// Shared handler state. Everything inside is cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<FetchOrchestrator>,
    pub registry: Arc<SearchRegistry>,
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(orchestrator: Arc<FetchOrchestrator>, config: ApiConfig) -> Self {
        let registry = Arc::new(SearchRegistry::new(config.max_stream_lifetime));
        registry.clone().spawn_sweeper(config.sweep_interval);
        Self {
            orchestrator,
            registry,
            config,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/search", post(handlers::search::search))
        .route("/api/search/:id/events", get(handlers::stream::events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
