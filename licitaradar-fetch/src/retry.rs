//! Bounded retry-with-backoff around a single region fetch.
//!
//! Each attempt is gated by the region's circuit breaker and runs under
//! the region's current adaptive budget. Every attempt reports its
//! outcome to both the breaker and the timeout manager as it happens, so
//! the circuit can trip mid-sequence and the re-check before each retry
//! is meaningful. An open circuit fails the fetch immediately, consuming
//! no retry budget and no timeout.

use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

use licitaradar_core::{FetchFailure, Notice, RegionFetch, SearchQuery, UfCode};

use crate::breaker::CircuitBreaker;
use crate::timeout::AdaptiveTimeoutManager;

/// Configuration for per-region retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// When disabled, every region gets exactly one attempt.
    pub enabled: bool,
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// First backoff interval; doubles each retry.
    pub initial_backoff: Duration,
    /// Ceiling on any single backoff interval.
    pub max_backoff: Duration,
    /// Add up to 20% random jitter to each interval.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            jitter: true,
        }
    }
}

/// Outcome of a retry-wrapped region fetch.
#[derive(Debug)]
pub struct AttemptedFetch {
    /// Attempts actually made (0 when the circuit was open up front).
    pub attempts: u32,
    pub result: Result<Vec<Notice>, FetchFailure>,
}

impl AttemptedFetch {
    /// Succeeded, but only after at least one failed attempt.
    pub fn recovered(&self) -> bool {
        self.attempts > 1 && self.result.is_ok()
    }
}

/// Wraps single-region fetches with circuit gating, adaptive budgets,
/// and bounded exponential backoff.
pub struct RetryCoordinator {
    config: RetryConfig,
    breaker: Arc<CircuitBreaker>,
    timeouts: Arc<AdaptiveTimeoutManager>,
}

impl RetryCoordinator {
    pub fn new(
        config: RetryConfig,
        breaker: Arc<CircuitBreaker>,
        timeouts: Arc<AdaptiveTimeoutManager>,
    ) -> Self {
        Self {
            config,
            breaker,
            timeouts,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn timeouts(&self) -> &Arc<AdaptiveTimeoutManager> {
        &self.timeouts
    }

    /// Fetch one region, retrying up to the configured budget.
    ///
    /// A success at any attempt returns immediately. Exhaustion returns
    /// the last failure, tagged with its kind.
    pub async fn fetch_with_retry(
        &self,
        fetcher: &dyn RegionFetch,
        query: &SearchQuery,
        uf: UfCode,
    ) -> AttemptedFetch {
        let max_attempts = if self.config.enabled {
            self.config.max_retries + 1
        } else {
            1
        };

        let mut attempts = 0u32;
        let mut last_failure: Option<FetchFailure> = None;

        while attempts < max_attempts {
            if attempts > 0 {
                let backoff = self.backoff_interval(attempts - 1);
                debug!(uf = %uf, attempt = attempts + 1, backoff_ms = backoff.as_millis() as u64, "backing off before retry");
                sleep(backoff).await;
            }

            // One admission check per attempt, after any backoff, so a
            // circuit that tripped while we slept is honored. Each
            // admission is paired with exactly one report below, which
            // is what releases a half-open probe slot.
            if !self.breaker.allow(uf) {
                debug!(uf = %uf, "circuit open, short-circuiting fetch");
                return AttemptedFetch {
                    attempts,
                    result: Err(FetchFailure::circuit_open()),
                };
            }

            let budget = self.timeouts.timeout_for(uf);
            let started = Instant::now();
            let outcome = tokio::time::timeout(budget, fetcher.fetch_region(query, uf)).await;
            let elapsed = started.elapsed();
            attempts += 1;

            match outcome {
                Ok(Ok(notices)) => {
                    self.breaker.report_result(uf, true);
                    self.timeouts.record(uf, elapsed, true);
                    return AttemptedFetch {
                        attempts,
                        result: Ok(notices),
                    };
                }
                Ok(Err(failure)) => {
                    warn!(uf = %uf, attempt = attempts, %failure, "region fetch failed");
                    self.breaker.report_result(uf, false);
                    self.timeouts.record(uf, elapsed, false);
                    last_failure = Some(failure);
                }
                Err(_) => {
                    warn!(uf = %uf, attempt = attempts, budget_secs = budget.as_secs(), "region fetch timed out");
                    self.breaker.report_result(uf, false);
                    self.timeouts.record(uf, budget, false);
                    last_failure = Some(FetchFailure::timeout(budget.as_secs()));
                }
            }
        }

        AttemptedFetch {
            attempts,
            result: Err(last_failure.unwrap_or_else(|| {
                FetchFailure::transport("no attempt was made")
            })),
        }
    }

    fn backoff_interval(&self, retry_index: u32) -> Duration {
        let base = self.config.initial_backoff.as_secs_f64() * 2f64.powi(retry_index as i32);
        let capped = base.min(self.config.max_backoff.as_secs_f64());
        if self.config.jitter {
            let factor = rand::thread_rng().gen_range(1.0..1.2);
            Duration::from_secs_f64(capped * factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::breaker::{CircuitBreakerConfig, CircuitState};
    use crate::timeout::AdaptiveTimeoutConfig;

    fn uf(code: &str) -> UfCode {
        UfCode::parse(code).unwrap()
    }

    fn notice(code: &str) -> Notice {
        Notice {
            uf: uf(code),
            title: "edital".to_string(),
            organ: "Prefeitura".to_string(),
            published_at: chrono::Utc::now(),
            url: "https://example.gov.br/1".to_string(),
            excerpt: None,
        }
    }

    /// Fails a fixed number of times, then succeeds.
    struct FlakyFetcher {
        calls: AtomicU32,
        failures_before_success: u32,
    }

    #[async_trait]
    impl RegionFetch for FlakyFetcher {
        async fn fetch_region(
            &self,
            _query: &SearchQuery,
            uf: UfCode,
        ) -> Result<Vec<Notice>, FetchFailure> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(FetchFailure::upstream(503))
            } else {
                Ok(vec![notice(uf.as_str())])
            }
        }
    }

    fn coordinator(max_retries: u32) -> RetryCoordinator {
        RetryCoordinator::new(
            RetryConfig {
                enabled: true,
                max_retries,
                initial_backoff: Duration::from_millis(10),
                max_backoff: Duration::from_millis(50),
                jitter: false,
            },
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
                failure_threshold: 50,
                ..Default::default()
            })),
            Arc::new(AdaptiveTimeoutManager::new(AdaptiveTimeoutConfig::default())),
        )
    }

    #[tokio::test]
    async fn success_on_first_attempt_stops_immediately() {
        let coord = coordinator(2);
        let fetcher = FlakyFetcher {
            calls: AtomicU32::new(0),
            failures_before_success: 0,
        };

        let outcome = coord
            .fetch_with_retry(&fetcher, &SearchQuery::new("merenda"), uf("SP"))
            .await;

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.recovered());
        assert_eq!(outcome.result.unwrap().len(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_failures_without_exhausting_budget() {
        let coord = coordinator(2);
        let fetcher = FlakyFetcher {
            calls: AtomicU32::new(0),
            failures_before_success: 1,
        };

        let outcome = coord
            .fetch_with_retry(&fetcher, &SearchQuery::new("merenda"), uf("SP"))
            .await;

        assert_eq!(outcome.attempts, 2);
        assert!(outcome.recovered());
        assert!(outcome.result.is_ok());
    }

    #[tokio::test]
    async fn exhaustion_returns_last_failure() {
        let coord = coordinator(2);
        let fetcher = FlakyFetcher {
            calls: AtomicU32::new(0),
            failures_before_success: 99,
        };

        let outcome = coord
            .fetch_with_retry(&fetcher, &SearchQuery::new("merenda"), uf("SP"))
            .await;

        assert_eq!(outcome.attempts, 3);
        let failure = outcome.result.unwrap_err();
        assert_eq!(failure.kind, licitaradar_core::FailureKind::Upstream5xx);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn open_circuit_fails_without_calling_upstream() {
        let coord = coordinator(2);
        // Trip the circuit first.
        let breaker = coord.breaker().clone();
        let breaker_config_threshold = 50;
        for _ in 0..breaker_config_threshold {
            breaker.report_result(uf("RJ"), false);
        }
        assert_eq!(breaker.state(uf("RJ")), CircuitState::Open);

        let fetcher = FlakyFetcher {
            calls: AtomicU32::new(0),
            failures_before_success: 0,
        };
        let outcome = coord
            .fetch_with_retry(&fetcher, &SearchQuery::new("merenda"), uf("RJ"))
            .await;

        assert_eq!(outcome.attempts, 0);
        assert_eq!(
            outcome.result.unwrap_err().kind,
            licitaradar_core::FailureKind::CircuitOpen
        );
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn budget_timeout_is_tagged_as_timeout() {
        struct SlowFetcher;

        #[async_trait]
        impl RegionFetch for SlowFetcher {
            async fn fetch_region(
                &self,
                _query: &SearchQuery,
                uf: UfCode,
            ) -> Result<Vec<Notice>, FetchFailure> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(vec![notice(uf.as_str())])
            }
        }

        let breaker = Arc::new(CircuitBreaker::default());
        let timeouts = Arc::new(AdaptiveTimeoutManager::default());
        // A one-attempt coordinator so the test does not sit through
        // backoff sleeps around a deliberately hung fetcher.
        let coord = RetryCoordinator::new(
            RetryConfig {
                enabled: false,
                ..Default::default()
            },
            breaker,
            timeouts.clone(),
        );

        tokio::time::pause();
        let query = SearchQuery::new("obras");
        let fut = coord.fetch_with_retry(&SlowFetcher, &query, uf("AC"));
        let outcome = fut.await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(
            outcome.result.unwrap_err().kind,
            licitaradar_core::FailureKind::Timeout
        );
    }

    #[tokio::test]
    async fn disabled_retry_gives_single_attempt() {
        let breaker = Arc::new(CircuitBreaker::default());
        let timeouts = Arc::new(AdaptiveTimeoutManager::default());
        let coord = RetryCoordinator::new(
            RetryConfig {
                enabled: false,
                ..Default::default()
            },
            breaker,
            timeouts,
        );
        let fetcher = FlakyFetcher {
            calls: AtomicU32::new(0),
            failures_before_success: 99,
        };

        let outcome = coord
            .fetch_with_retry(&fetcher, &SearchQuery::new("obras"), uf("AC"))
            .await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
