//! Short-TTL cache of unified search results.
//!
//! Keyed by the normalized-query hash. Entries are written once on a
//! successful search and never mutated; expiry drops them on read. A
//! `force_fresh` search bypasses the read path entirely but still writes
//! its result. Process-local; no cross-instance invalidation.

use dashmap::DashMap;
use metrics::counter;
use std::time::{Duration, Instant};
use tracing::debug;

use licitaradar_core::UnifiedResults;

#[derive(Debug, Clone)]
pub struct ResultCacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600),
        }
    }
}

struct StoredEntry {
    payload: UnifiedResults,
    cached_at: Instant,
}

pub struct ResultCache {
    config: ResultCacheConfig,
    entries: DashMap<String, StoredEntry>,
}

impl ResultCache {
    pub fn new(config: ResultCacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// Fresh entry for the key, or a miss. Expired entries are removed
    /// on the way out.
    pub fn get(&self, key: &str) -> Option<UnifiedResults> {
        if !self.config.enabled {
            return None;
        }

        if let Some(entry) = self.entries.get(key) {
            if entry.cached_at.elapsed() < self.config.ttl {
                counter!("licitaradar_cache_hits_total").increment(1);
                return Some(entry.payload.clone());
            }
        } else {
            counter!("licitaradar_cache_misses_total").increment(1);
            return None;
        }

        debug!(key, "dropping expired cache entry");
        self.entries.remove(key);
        counter!("licitaradar_cache_misses_total").increment(1);
        None
    }

    /// Store unconditionally, overwriting any prior entry for the key.
    pub fn put(&self, key: impl Into<String>, payload: UnifiedResults) {
        if !self.config.enabled {
            return;
        }
        self.entries.insert(
            key.into(),
            StoredEntry {
                payload,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(ResultCacheConfig::default())
    }
}
