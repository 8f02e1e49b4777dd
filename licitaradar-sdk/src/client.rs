//! HTTP client with top-level retry.
//!
//! The whole-search call is retried on HTTP 500/502 up to the configured
//! budget with increasing backoff. This is a different layer from the
//! per-region retries the server runs: exhausting it is a terminal
//! failure, while per-region failures only narrow coverage. Backoff
//! sleeps are cancellable so a user who gives up during a visible delay
//! aborts the pending request without touching server-side work already
//! dispatched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use licitaradar_core::{FailureKind, SearchId, UfCode, UnifiedResults};

use crate::config::SdkConfig;
use crate::error::{SdkError, SdkResult};
use crate::stream::EventStream;

/// Cooperative cancellation for an in-flight search.
///
/// Cancelling aborts the client's wait and any pending backoff; it never
/// cancels region fetches the server has already dispatched. A token
/// cancelled before the wait even starts still takes effect.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub(crate) async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // Checks the current value first, so a prior cancel is seen.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A top-level search request.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ufs: Option<Vec<String>>,
    /// Set only when the user explicitly asks to refresh stale results;
    /// the automatic retry path never sets it.
    pub force_fresh: bool,
    /// Pre-chosen search id so the progress stream can be opened while
    /// the request is still in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_id: Option<SearchId>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ufs: None,
            force_fresh: false,
            search_id: None,
        }
    }

    pub fn with_ufs(mut self, ufs: Vec<String>) -> Self {
        self.ufs = Some(ufs);
        self
    }

    pub fn with_search_id(mut self, search_id: SearchId) -> Self {
        self.search_id = Some(search_id);
        self
    }

    /// Explicit user refresh: bypass cached results.
    pub fn fresh(mut self) -> Self {
        self.force_fresh = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Complete,
    Running,
}

/// The unified search response.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub search_id: SearchId,
    pub status: SearchStatus,
    pub total: u64,
    pub from_cache: bool,
    pub results: UnifiedResults,
    pub failed: BTreeMap<UfCode, FailureKind>,
}

/// The search client.
pub struct SearchClient {
    http: reqwest::Client,
    config: Arc<SdkConfig>,
    /// Most recent successful response, kept for the fallback surface.
    last_successful: Mutex<Option<SearchResponse>>,
}

impl SearchClient {
    pub fn new(config: SdkConfig) -> SdkResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
            last_successful: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// The last search that completed successfully, if any. Feeds the
    /// total-unavailability fallback.
    pub fn last_successful(&self) -> Option<SearchResponse> {
        self.last_successful.lock().ok().and_then(|g| g.clone())
    }

    /// Run a search with top-level retry and no cancellation.
    pub async fn search(&self, request: SearchRequest) -> SdkResult<SearchResponse> {
        self.search_with_cancel(request, &CancelToken::new()).await
    }

    /// Run a search with top-level retry; `cancel` aborts a pending
    /// backoff or wait.
    pub async fn search_with_cancel(
        &self,
        request: SearchRequest,
        cancel: &CancelToken,
    ) -> SdkResult<SearchResponse> {
        let max_attempts = self.config.max_retries + 1;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            // Dropping the request future aborts it client-side only;
            // region fetches the server already dispatched keep running
            // and still populate its cache.
            let result = tokio::select! {
                result = self.execute(&request) => result,
                _ = cancel.cancelled() => {
                    debug!("search cancelled while request was in flight");
                    return Err(SdkError::Cancelled);
                }
            };
            match result {
                Ok(response) => {
                    if attempts > 1 {
                        info!(attempts, "search succeeded after retry");
                    }
                    if let Ok(mut guard) = self.last_successful.lock() {
                        *guard = Some(response.clone());
                    }
                    return Ok(response);
                }
                Err(error) if error.is_retryable() && attempts < max_attempts => {
                    let backoff = self.config.backoff_for(attempts - 1);
                    warn!(
                        attempt = attempts,
                        backoff_secs = backoff.as_secs(),
                        %error,
                        "transient search failure, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.cancelled() => {
                            debug!("search cancelled during backoff");
                            return Err(SdkError::Cancelled);
                        }
                    }
                }
                Err(error) if error.is_retryable() => {
                    return Err(SdkError::Exhausted {
                        attempts,
                        source: Box::new(error),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Subscribe to a search's progress events.
    pub async fn subscribe(&self, search_id: SearchId) -> SdkResult<EventStream> {
        let url = format!(
            "{}/api/search/{}/events",
            self.config.base_url.trim_end_matches('/'),
            search_id
        );
        EventStream::connect(&self.http, &url).await
    }

    /// Subscribe to a search whose creating request may still be in
    /// flight: the stream registers moments after the POST lands, so a
    /// few short-interval attempts bridge the gap. Gives up with the
    /// last error, at which point callers fall back to the all-pending
    /// view plus the synchronous response.
    pub async fn subscribe_when_ready(
        &self,
        search_id: SearchId,
        attempts: u32,
        interval: std::time::Duration,
    ) -> SdkResult<EventStream> {
        let mut last = SdkError::StreamUnavailable("no subscription attempt made".into());
        for _ in 0..attempts.max(1) {
            match self.subscribe(search_id).await {
                Ok(stream) => return Ok(stream),
                Err(error) => {
                    debug!(%error, "stream not ready yet");
                    last = error;
                }
            }
            tokio::time::sleep(interval).await;
        }
        Err(last)
    }

    async fn execute(&self, request: &SearchRequest) -> SdkResult<SearchResponse> {
        let url = format!(
            "{}/api/search",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self.http.post(&url).json(request).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json::<SearchResponse>().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(SdkError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
