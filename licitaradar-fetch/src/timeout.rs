//! Adaptive per-region timeout budgets.
//!
//! Each region gets a budget seeded from its volume tier and nudged by an
//! exponentially weighted update after every completed call: fast
//! successes shrink the budget toward the tier floor, timeouts and
//! near-budget completions grow it toward the tier ceiling. Budgets are
//! always clamped to the tier's [min, max] band.

use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

use licitaradar_core::UfCode;

/// Volume tier of a region. High-volume regions answer slowly and start
/// with a larger budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Fast,
    Medium,
    Slow,
}

impl Tier {
    /// Static hint from historical result volume.
    pub fn hint_for(uf: UfCode) -> Self {
        match uf.as_str() {
            "SP" | "RJ" | "MG" | "BA" | "RS" | "PR" => Tier::Slow,
            "PE" | "CE" | "SC" | "GO" | "DF" | "ES" | "PA" | "MT" => Tier::Medium,
            _ => Tier::Fast,
        }
    }

    pub fn initial_budget(&self) -> Duration {
        match self {
            Tier::Fast => Duration::from_secs(45),
            Tier::Medium => Duration::from_secs(75),
            Tier::Slow => Duration::from_secs(120),
        }
    }

    pub fn min_budget(&self) -> Duration {
        match self {
            Tier::Fast => Duration::from_secs(30),
            Tier::Medium => Duration::from_secs(60),
            Tier::Slow => Duration::from_secs(90),
        }
    }

    pub fn max_budget(&self) -> Duration {
        match self {
            Tier::Fast => Duration::from_secs(60),
            Tier::Medium => Duration::from_secs(90),
            Tier::Slow => Duration::from_secs(180),
        }
    }
}

/// Tuning for the budget update. None of these constants are
/// load-bearing; they only shape how quickly budgets drift.
#[derive(Debug, Clone)]
pub struct AdaptiveTimeoutConfig {
    /// EWMA smoothing factor toward the target budget.
    pub alpha: f64,
    /// Target multiplier on a fast success.
    pub shrink_factor: f64,
    /// Target multiplier on a timeout or near-budget completion.
    pub growth_factor: f64,
    /// A success under this fraction of the budget counts as fast.
    pub fast_fraction: f64,
    /// A completion at or above this fraction of the budget counts as
    /// near-budget.
    pub near_budget_fraction: f64,
}

impl Default for AdaptiveTimeoutConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            shrink_factor: 0.85,
            growth_factor: 1.5,
            fast_fraction: 0.5,
            near_budget_fraction: 0.8,
        }
    }
}

/// Per-region timeout state. Outlives any single search.
#[derive(Debug, Clone)]
pub struct TimeoutProfile {
    pub tier: Tier,
    pub current: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl TimeoutProfile {
    fn new(tier: Tier) -> Self {
        Self {
            tier,
            current: tier.initial_budget(),
            min: tier.min_budget(),
            max: tier.max_budget(),
        }
    }
}

/// Keyed store of timeout profiles, safe for concurrent searches that
/// touch the same region.
pub struct AdaptiveTimeoutManager {
    config: AdaptiveTimeoutConfig,
    profiles: DashMap<UfCode, TimeoutProfile>,
}

impl AdaptiveTimeoutManager {
    pub fn new(config: AdaptiveTimeoutConfig) -> Self {
        Self {
            config,
            profiles: DashMap::new(),
        }
    }

    /// Current budget for a region, creating the profile on first use.
    pub fn timeout_for(&self, uf: UfCode) -> Duration {
        self.profiles
            .entry(uf)
            .or_insert_with(|| TimeoutProfile::new(Tier::hint_for(uf)))
            .current
    }

    /// Snapshot of a region's profile, if one exists yet.
    pub fn profile(&self, uf: UfCode) -> Option<TimeoutProfile> {
        self.profiles.get(&uf).map(|p| p.clone())
    }

    /// Fold one completed call into the region's budget. No side effects
    /// beyond this key's profile.
    pub fn record(&self, uf: UfCode, elapsed: Duration, succeeded: bool) {
        let mut profile = self
            .profiles
            .entry(uf)
            .or_insert_with(|| TimeoutProfile::new(Tier::hint_for(uf)));

        let budget = profile.current.as_secs_f64();
        let used = elapsed.as_secs_f64() / budget;

        let target = if succeeded && used < self.config.fast_fraction {
            budget * self.config.shrink_factor
        } else if !succeeded && used >= self.config.near_budget_fraction {
            // A timeout reports elapsed == budget; a quick transport
            // failure says nothing about latency and leaves the budget
            // alone.
            budget * self.config.growth_factor
        } else if succeeded && used >= self.config.near_budget_fraction {
            budget * self.config.growth_factor
        } else {
            return;
        };

        let next = budget + self.config.alpha * (target - budget);
        let clamped = next.clamp(profile.min.as_secs_f64(), profile.max.as_secs_f64());
        profile.current = Duration::from_secs_f64(clamped);

        debug!(
            uf = %uf,
            elapsed_secs = elapsed.as_secs_f64(),
            succeeded,
            budget_secs = clamped,
            "adjusted timeout budget"
        );
    }
}

impl Default for AdaptiveTimeoutManager {
    fn default() -> Self {
        Self::new(AdaptiveTimeoutConfig::default())
    }
}
