//! HTTP gateway to the upstream government notice API.
//!
//! A pure adapter: it pages through one region's results and classifies
//! failures. Budgets, retries, and circuit state belong to the callers
//! wrapping it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use licitaradar_core::{FetchFailure, Notice, RegionFetch, SearchQuery, UfCode};

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Page cap per region; the upstream paginates coarsely and deep
    /// pages are rarely worth their latency.
    pub max_pages_per_uf: u32,
    pub page_size: u32,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dados.gov.br/licitacoes".to_string(),
            max_pages_per_uf: 5,
            page_size: 50,
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("licitaradar/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// One page as the upstream returns it.
#[derive(Debug, Deserialize)]
struct UpstreamPage {
    items: Vec<UpstreamNotice>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct UpstreamNotice {
    titulo: String,
    orgao: String,
    data_publicacao: DateTime<Utc>,
    url: String,
    #[serde(default)]
    resumo: Option<String>,
}

impl UpstreamNotice {
    fn into_notice(self, uf: UfCode) -> Notice {
        Notice {
            uf,
            title: self.titulo,
            organ: self.orgao,
            published_at: self.data_publicacao,
            url: self.url,
            excerpt: self.resumo,
        }
    }
}

/// Reqwest-backed [`RegionFetch`] implementation.
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, FetchFailure> {
        // No overall request timeout here: the per-region adaptive
        // budget is enforced by the caller.
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchFailure::transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    async fn fetch_page(
        &self,
        query: &SearchQuery,
        uf: UfCode,
        page: u32,
    ) -> Result<UpstreamPage, FetchFailure> {
        let url = format!("{}/v1/avisos", self.config.base_url.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .query(&[
                ("uf", uf.as_str()),
                ("q", &query.normalized()),
                ("pagina", &page.to_string()),
                ("por_pagina", &self.config.page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchFailure::transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FetchFailure::upstream(status.as_u16()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            // Rate limiting is transport-class here: the coordinator's
            // backoff is the right response, not a distinct taxonomy.
            return Err(FetchFailure::transport("upstream rate limit"));
        }
        if !status.is_success() {
            return Err(FetchFailure::transport(format!(
                "unexpected upstream status {}",
                status.as_u16()
            )));
        }

        response
            .json::<UpstreamPage>()
            .await
            .map_err(|e| FetchFailure::transport(format!("malformed upstream payload: {}", e)))
    }
}

#[async_trait]
impl RegionFetch for UpstreamClient {
    async fn fetch_region(
        &self,
        query: &SearchQuery,
        uf: UfCode,
    ) -> Result<Vec<Notice>, FetchFailure> {
        let mut notices = Vec::new();

        for page in 1..=self.config.max_pages_per_uf {
            let result = self.fetch_page(query, uf, page).await?;
            let fetched = result.items.len();
            notices.extend(result.items.into_iter().map(|n| n.into_notice(uf)));

            debug!(uf = %uf, page, fetched, "fetched upstream page");

            if !result.has_more || fetched == 0 {
                break;
            }
        }

        Ok(notices)
    }
}
