//! Environment configuration for the API binary.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// LICITARADAR_BIND_ADDR
    pub bind_addr: SocketAddr,
    /// Longest a POST /api/search caller is held waiting for the
    /// orchestrator; LICITARADAR_MAX_SYNC_WAIT_SECS.
    pub max_sync_wait: Duration,
    /// How long a finished search's event history stays replayable;
    /// LICITARADAR_MAX_STREAM_LIFETIME_SECS.
    pub max_stream_lifetime: Duration,
    /// Registry sweep cadence.
    pub sweep_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 8080).into(),
            max_sync_wait: Duration::from_secs(300),
            max_stream_lifetime: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: parse_or("LICITARADAR_BIND_ADDR", defaults.bind_addr),
            max_sync_wait: Duration::from_secs(parse_or(
                "LICITARADAR_MAX_SYNC_WAIT_SECS",
                defaults.max_sync_wait.as_secs(),
            )),
            max_stream_lifetime: Duration::from_secs(parse_or(
                "LICITARADAR_MAX_STREAM_LIFETIME_SECS",
                defaults.max_stream_lifetime.as_secs(),
            )),
            sweep_interval: defaults.sweep_interval,
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.max_sync_wait, Duration::from_secs(300));
        assert_eq!(config.max_stream_lifetime, Duration::from_secs(600));
    }

    #[test]
    fn env_override() {
        env::set_var("LICITARADAR_MAX_SYNC_WAIT_SECS", "45");
        let config = ApiConfig::from_env();
        assert_eq!(config.max_sync_wait, Duration::from_secs(45));
        env::remove_var("LICITARADAR_MAX_SYNC_WAIT_SECS");
    }
}
