//! Environment-driven configuration for the fetch machinery.
//!
//! Every tunable reads from a `LICITARADAR_*` variable; unparseable
//! values fall back to the default with a logged warning rather than
//! failing startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::breaker::CircuitBreakerConfig;
use crate::cache::ResultCacheConfig;
use crate::retry::RetryConfig;
use crate::upstream::UpstreamConfig;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// LICITARADAR_CACHE_ENABLED
    pub cache_enabled: bool,
    /// LICITARADAR_CACHE_TTL_SECS
    pub cache_ttl: Duration,
    /// LICITARADAR_RETRY_ENABLED
    pub retry_enabled: bool,
    /// LICITARADAR_MAX_RETRIES
    pub max_retries_per_uf: u32,
    /// LICITARADAR_MAX_CONCURRENT
    pub max_concurrent: usize,
    /// LICITARADAR_MAX_PAGES_PER_UF
    pub max_pages_per_uf: u32,
    /// LICITARADAR_UPSTREAM_URL
    pub upstream_base_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            retry_enabled: true,
            max_retries_per_uf: 2,
            max_concurrent: 10,
            max_pages_per_uf: 5,
            upstream_base_url: UpstreamConfig::default().base_url,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_enabled: env_or("LICITARADAR_CACHE_ENABLED", defaults.cache_enabled),
            cache_ttl: Duration::from_secs(env_or(
                "LICITARADAR_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),
            retry_enabled: env_or("LICITARADAR_RETRY_ENABLED", defaults.retry_enabled),
            max_retries_per_uf: env_or("LICITARADAR_MAX_RETRIES", defaults.max_retries_per_uf),
            max_concurrent: env_or("LICITARADAR_MAX_CONCURRENT", defaults.max_concurrent),
            max_pages_per_uf: env_or("LICITARADAR_MAX_PAGES_PER_UF", defaults.max_pages_per_uf),
            upstream_base_url: env::var("LICITARADAR_UPSTREAM_URL")
                .unwrap_or(defaults.upstream_base_url),
        }
    }

    pub fn cache_config(&self) -> ResultCacheConfig {
        ResultCacheConfig {
            enabled: self.cache_enabled,
            ttl: self.cache_ttl,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            enabled: self.retry_enabled,
            max_retries: self.max_retries_per_uf,
            ..Default::default()
        }
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::default()
    }

    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            base_url: self.upstream_base_url.clone(),
            max_pages_per_uf: self.max_pages_per_uf,
            ..Default::default()
        }
    }
}

fn env_or<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, value = %raw, "unparseable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
