//! Fans one query out across region keys with bounded parallelism.
//!
//! Composes the cache, the retry coordinator (which carries the circuit
//! breaker and adaptive budgets), and an injected upstream seam. Each
//! region runs as an independent task gated by a semaphore; task results
//! flow through an internal channel into a single aggregator, so event
//! publishing and accumulator updates are serialized through one
//! consumer instead of racing across writers. The terminal `complete`
//! event is emitted only after every region has resolved.

use metrics::counter;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

use licitaradar_core::{
    FailureKind, ProgressEvent, RegionFetch, SearchId, SearchQuery, StreamEvent, UfCode,
    UnifiedResults,
};

use crate::cache::ResultCache;
use crate::retry::{AttemptedFetch, RetryCoordinator};

/// Final shape of one orchestrated search.
#[derive(Debug)]
pub struct SearchOutcome {
    pub search_id: SearchId,
    /// Successful regions only; failed regions are absent. Partial
    /// coverage is a valid result, not an error.
    pub results: UnifiedResults,
    /// Regions that exhausted their retry budget, with the failure kind
    /// of the last attempt.
    pub failed: BTreeMap<UfCode, FailureKind>,
    pub from_cache: bool,
}

impl SearchOutcome {
    pub fn succeeded_count(&self) -> u32 {
        self.results.regions.len() as u32
    }

    pub fn failed_count(&self) -> u32 {
        self.failed.len() as u32
    }

    pub fn total_found(&self) -> u64 {
        self.results.total()
    }
}

enum TaskMessage {
    Started(UfCode),
    Finished { uf: UfCode, outcome: AttemptedFetch },
}

/// Orchestrates one query across many regions.
///
/// All components arrive by `Arc` injection; the orchestrator owns no
/// ambient state, so tests can run several independent instances against
/// the same (or separate) breaker and budget stores.
pub struct FetchOrchestrator {
    fetcher: Arc<dyn RegionFetch>,
    retry: Arc<RetryCoordinator>,
    cache: Arc<ResultCache>,
    max_concurrent: usize,
}

impl FetchOrchestrator {
    pub fn new(
        fetcher: Arc<dyn RegionFetch>,
        retry: Arc<RetryCoordinator>,
        cache: Arc<ResultCache>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            fetcher,
            retry,
            cache,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Run one search to completion.
    ///
    /// Progress is pushed into `events` as it happens; the caller decides
    /// what to do with it (stream it, drop it). A closed receiver never
    /// stops the search; results still land in the cache for the next
    /// caller.
    pub async fn run(
        &self,
        search_id: SearchId,
        query: SearchQuery,
        ufs: Vec<UfCode>,
        force_fresh: bool,
        events: mpsc::Sender<StreamEvent>,
    ) -> SearchOutcome {
        let keys: Vec<UfCode> = ufs.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let cache_key = query.cache_key(&keys);

        for &uf in &keys {
            let _ = events
                .send(ProgressEvent::pending(search_id, uf).into())
                .await;
        }

        if !force_fresh {
            if let Some(cached) = self.cache.get(&cache_key) {
                info!(%search_id, regions = keys.len(), "serving search from cache");
                return self.replay_cached(search_id, &keys, cached, &events).await;
            }
        }
        counter!("licitaradar_searches_dispatched_total").increment(1);

        let (tx, mut rx) = mpsc::channel::<TaskMessage>(keys.len().max(1) * 2 + 2);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        for &uf in &keys {
            let tx = tx.clone();
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            let retry = self.retry.clone();
            let query = query.clone();

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let _ = tx.send(TaskMessage::Started(uf)).await;
                let outcome = retry.fetch_with_retry(fetcher.as_ref(), &query, uf).await;
                let _ = tx.send(TaskMessage::Finished { uf, outcome }).await;
            });
        }
        drop(tx);

        let mut results = UnifiedResults::new();
        let mut failed: BTreeMap<UfCode, FailureKind> = BTreeMap::new();

        // Single consumer: the only place results and counters are
        // touched, and the only publisher of per-region events.
        while let Some(message) = rx.recv().await {
            match message {
                TaskMessage::Started(uf) => {
                    let _ = events
                        .send(ProgressEvent::fetching(search_id, uf).into())
                        .await;
                }
                TaskMessage::Finished { uf, outcome } => {
                    let recovered = outcome.recovered();
                    match outcome.result {
                    Ok(notices) => {
                        let count = notices.len() as u64;
                        let event = if recovered {
                            counter!("licitaradar_regions_recovered_total").increment(1);
                            ProgressEvent::recovered(search_id, uf, count)
                        } else {
                            ProgressEvent::success(search_id, uf, count)
                        };
                        results.insert(uf, notices);
                        let _ = events.send(event.into()).await;
                    }
                    Err(failure) => {
                        counter!("licitaradar_regions_failed_total").increment(1);
                        debug!(%search_id, uf = %uf, %failure, "region resolved as failed");
                        failed.insert(uf, failure.kind);
                        let _ = events
                            .send(
                                ProgressEvent::failed(search_id, uf, failure.kind)
                                    .with_message(failure.message)
                                    .into(),
                            )
                            .await;
                    }
                }
                }
            }
        }

        let _ = events
            .send(StreamEvent::Complete {
                total: results.total(),
                succeeded: results.regions.len() as u32,
                failed: failed.len() as u32,
                from_cache: false,
            })
            .await;

        // Single-shot write: a search that produced nothing usable is
        // not worth replaying to the next caller.
        if !results.is_empty() {
            self.cache.put(cache_key, results.clone());
        }

        info!(
            %search_id,
            succeeded = results.regions.len(),
            failed = failed.len(),
            total = results.total(),
            "search complete"
        );

        SearchOutcome {
            search_id,
            results,
            failed,
            from_cache: false,
        }
    }

    /// Synthesize per-region success events from a cached payload.
    async fn replay_cached(
        &self,
        search_id: SearchId,
        keys: &[UfCode],
        cached: UnifiedResults,
        events: &mpsc::Sender<StreamEvent>,
    ) -> SearchOutcome {
        for &uf in keys {
            let count = cached.count_for(&uf).unwrap_or(0);
            let _ = events
                .send(
                    ProgressEvent::success(search_id, uf, count)
                        .with_message("served from recent results")
                        .into(),
                )
                .await;
        }
        let _ = events
            .send(StreamEvent::Complete {
                total: cached.total(),
                succeeded: keys.len() as u32,
                failed: 0,
                from_cache: true,
            })
            .await;

        SearchOutcome {
            search_id,
            results: cached,
            failed: BTreeMap::new(),
            from_cache: true,
        }
    }
}
