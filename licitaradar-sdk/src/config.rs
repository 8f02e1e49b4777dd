//! SDK configuration.

use std::time::Duration;

use crate::error::{SdkError, SdkResult};

/// Configuration for the search client.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Base URL for the API
    pub base_url: String,

    /// Whole-request timeout. Must comfortably exceed the server's
    /// synchronous wait ceiling, since a search can legitimately hold
    /// the call for minutes.
    pub timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Retries after the initial top-level attempt. Only gateway-class
    /// failures are retried.
    pub max_retries: u32,

    /// Backoff before each retry, in order. The last entry repeats if
    /// retries outnumber entries.
    pub retry_backoff: Vec<Duration>,

    /// How long to wait before surfacing the cancel affordance to the
    /// user during a slow search.
    pub cancel_grace: Duration,

    /// Cooldown shown on the manual-retry fallback.
    pub manual_retry_cooldown: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(320),
            connect_timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_backoff: vec![Duration::from_secs(3), Duration::from_secs(8)],
            cancel_grace: Duration::from_secs(10),
            manual_retry_cooldown: Duration::from_secs(30),
            user_agent: format!("licitaradar-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SdkConfig {
    /// Create a new configuration with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the whole-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of top-level retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff schedule for top-level retries
    pub fn with_retry_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the manual-retry cooldown shown on the fallback surface
    pub fn with_manual_retry_cooldown(mut self, cooldown: Duration) -> Self {
        self.manual_retry_cooldown = cooldown;
        self
    }

    /// Backoff before retry number `retry` (zero-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.retry_backoff
            .get(retry as usize)
            .or(self.retry_backoff.last())
            .copied()
            .unwrap_or(Duration::from_secs(3))
    }

    /// Validate the configuration
    pub fn validate(&self) -> SdkResult<()> {
        if self.base_url.is_empty() {
            return Err(SdkError::Configuration("base URL cannot be empty".into()));
        }
        url::Url::parse(&self.base_url)?;
        if self.timeout.is_zero() {
            return Err(SdkError::Configuration("timeout cannot be zero".into()));
        }
        Ok(())
    }
}
