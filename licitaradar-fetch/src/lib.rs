//! Resilient multi-region fetch machinery.
//!
//! Everything here exists so one slow or broken region never takes the
//! whole search down: per-region adaptive timeout budgets, per-region
//! circuit breaking, bounded retries with backoff, a short-TTL result
//! cache, and the orchestrator that composes them and reports progress
//! per region as it happens.

pub mod breaker;
pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod retry;
pub mod timeout;
pub mod upstream;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use cache::{ResultCache, ResultCacheConfig};
pub use config::FetchConfig;
pub use orchestrator::{FetchOrchestrator, SearchOutcome};
pub use retry::{AttemptedFetch, RetryConfig, RetryCoordinator};
pub use timeout::{AdaptiveTimeoutConfig, AdaptiveTimeoutManager, Tier};
pub use upstream::{UpstreamClient, UpstreamConfig};
