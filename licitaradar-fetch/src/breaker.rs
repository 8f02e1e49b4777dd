//! Per-region circuit breaking.
//!
//! Guards calls into a degraded region so a persistently failing upstream
//! partition is not hammered while it recovers.
//!
//! # States
//!
//! - **Closed**: calls pass through
//! - **Open**: calls are short-circuited without reaching the upstream
//! - **HalfOpen**: a single probe call at a time is admitted
//!
//! Closed trips to Open on either of two conditions: a run of consecutive
//! failures, or the failure rate over a rolling window crossing a
//! threshold. Open relaxes to HalfOpen once the cooldown elapses;
//! HalfOpen closes after enough consecutive probe successes and re-opens
//! on any probe failure.
//!
//! Records are created lazily on a key's first use and live for the
//! process lifetime.

use dashmap::DashMap;
use metrics::counter;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use licitaradar_core::UfCode;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for the per-region circuit breaker.
///
/// Higher thresholds trade faster recovery for more upstream load.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip a closed circuit.
    pub failure_threshold: u32,
    /// Consecutive probe successes that close a half-open circuit.
    pub success_threshold: u32,
    /// Cooldown before an open circuit admits a probe.
    pub open_timeout: Duration,
    /// Failure rate over the rolling window that trips a closed circuit.
    pub failure_rate_threshold: f64,
    /// Width of the rolling failure-rate window.
    pub rate_window: Duration,
    /// The rate condition is ignored until the window holds this many
    /// samples, so one early failure cannot trip it.
    pub rate_min_samples: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(90),
            failure_rate_threshold: 0.6,
            rate_window: Duration::from_secs(60),
            rate_min_samples: 4,
        }
    }
}

/// Per-region state. Never destroyed once created.
#[derive(Debug)]
struct CircuitRecord {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    /// (when, ok) samples for the rolling failure rate.
    window: VecDeque<(Instant, bool)>,
    /// Whether a half-open probe is currently in flight.
    probe_in_flight: bool,
}

impl CircuitRecord {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            window: VecDeque::new(),
            probe_in_flight: false,
        }
    }
}

/// Keyed circuit breaker shared by every search in the process.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    records: DashMap<UfCode, CircuitRecord>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            records: DashMap::new(),
        }
    }

    /// Whether a call to this region may proceed. Performs the
    /// open → half-open transition when the cooldown has elapsed, and
    /// admits at most one probe at a time while half-open.
    pub fn allow(&self, uf: UfCode) -> bool {
        let mut record = self.records.entry(uf).or_insert_with(CircuitRecord::new);

        match record.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let due = record
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.open_timeout)
                    .unwrap_or(true);
                if due {
                    info!(uf = %uf, "circuit half-open, admitting probe");
                    record.state = CircuitState::HalfOpen;
                    record.consecutive_successes = 0;
                    record.probe_in_flight = true;
                    counter!("licitaradar_circuit_half_open_total").increment(1);
                    true
                } else {
                    counter!("licitaradar_circuit_rejected_total").increment(1);
                    false
                }
            }
            CircuitState::HalfOpen => {
                if record.probe_in_flight {
                    counter!("licitaradar_circuit_rejected_total").increment(1);
                    false
                } else {
                    record.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Report the outcome of a call previously admitted by [`allow`].
    ///
    /// [`allow`]: CircuitBreaker::allow
    pub fn report_result(&self, uf: UfCode, ok: bool) {
        let mut record = self.records.entry(uf).or_insert_with(CircuitRecord::new);
        let now = Instant::now();

        record.window.push_back((now, ok));
        let horizon = self.config.rate_window;
        while let Some(&(at, _)) = record.window.front() {
            if now.duration_since(at) > horizon {
                record.window.pop_front();
            } else {
                break;
            }
        }

        if ok {
            record.consecutive_failures = 0;
            match record.state {
                CircuitState::Closed => {}
                CircuitState::HalfOpen => {
                    record.probe_in_flight = false;
                    record.consecutive_successes += 1;
                    if record.consecutive_successes >= self.config.success_threshold {
                        info!(
                            uf = %uf,
                            successes = record.consecutive_successes,
                            "circuit closed after probe successes"
                        );
                        record.state = CircuitState::Closed;
                        record.consecutive_successes = 0;
                        counter!("licitaradar_circuit_closed_total").increment(1);
                    }
                }
                CircuitState::Open => {
                    // A straggler from before the trip; nothing to do.
                }
            }
        } else {
            record.consecutive_failures += 1;
            record.consecutive_successes = 0;
            match record.state {
                CircuitState::Closed => {
                    if record.consecutive_failures >= self.config.failure_threshold
                        || self.rate_exceeded(&record.window)
                    {
                        warn!(
                            uf = %uf,
                            failures = record.consecutive_failures,
                            "circuit opened"
                        );
                        record.state = CircuitState::Open;
                        record.opened_at = Some(now);
                        counter!("licitaradar_circuit_opened_total").increment(1);
                    }
                }
                CircuitState::HalfOpen => {
                    warn!(uf = %uf, "circuit re-opened on probe failure");
                    record.state = CircuitState::Open;
                    record.opened_at = Some(now);
                    record.probe_in_flight = false;
                    counter!("licitaradar_circuit_opened_total").increment(1);
                }
                CircuitState::Open => {}
            }
        }
    }

    /// Current state for a region (`Closed` if the key has never been
    /// used).
    pub fn state(&self, uf: UfCode) -> CircuitState {
        self.records
            .get(&uf)
            .map(|r| r.state)
            .unwrap_or(CircuitState::Closed)
    }

    fn rate_exceeded(&self, window: &VecDeque<(Instant, bool)>) -> bool {
        if window.len() < self.config.rate_min_samples {
            return false;
        }
        let failures = window.iter().filter(|(_, ok)| !ok).count();
        failures as f64 / window.len() as f64 > self.config.failure_rate_threshold
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
