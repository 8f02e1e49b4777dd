//! Per-search event channels: buffered history plus live broadcast.
//!
//! The orchestrator's aggregator is the only publisher for a search, so
//! buffering and broadcasting under one entry lock preserves per-key
//! ordering and lets a late subscriber replay the full history with no
//! gap before live events.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::debug;

use licitaradar_core::{SearchId, StreamEvent};

const BROADCAST_CAPACITY: usize = 256;

struct SearchChannel {
    history: Vec<StreamEvent>,
    sender: broadcast::Sender<StreamEvent>,
    created_at: Instant,
    complete: bool,
}

/// A subscriber's view: everything that already happened, then the live
/// feed (`None` when the search already completed).
pub struct Subscription {
    pub history: Vec<StreamEvent>,
    pub live: Option<broadcast::Receiver<StreamEvent>>,
}

/// All currently-replayable searches in this process.
pub struct SearchRegistry {
    channels: DashMap<SearchId, SearchChannel>,
    max_lifetime: Duration,
}

impl SearchRegistry {
    pub fn new(max_lifetime: Duration) -> Self {
        Self {
            channels: DashMap::new(),
            max_lifetime,
        }
    }

    /// Create the channel for a new search. Must precede the first
    /// publish.
    pub fn register(&self, search_id: SearchId) {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        self.channels.insert(
            search_id,
            SearchChannel {
                history: Vec::new(),
                sender,
                created_at: Instant::now(),
                complete: false,
            },
        );
    }

    /// Append an event to the search's history and fan it out to live
    /// subscribers. Publishing to an unknown (already swept) search is a
    /// no-op: the work is still worth finishing for the cache.
    pub fn publish(&self, search_id: SearchId, event: StreamEvent) {
        if let Some(mut channel) = self.channels.get_mut(&search_id) {
            if event.is_complete() {
                channel.complete = true;
            }
            channel.history.push(event.clone());
            // Send errors just mean nobody is listening right now.
            let _ = channel.sender.send(event);
        }
    }

    /// Subscribe to a search's events: full ordered history plus the
    /// live feed if the search is still running. The entry lock makes
    /// the snapshot-then-subscribe atomic with respect to publishes, so
    /// no event is missed or duplicated at the seam.
    pub fn subscribe(&self, search_id: SearchId) -> Option<Subscription> {
        self.channels.get(&search_id).map(|channel| {
            let live = if channel.complete {
                None
            } else {
                Some(channel.sender.subscribe())
            };
            Subscription {
                history: channel.history.clone(),
                live,
            }
        })
    }

    pub fn contains(&self, search_id: SearchId) -> bool {
        self.channels.contains_key(&search_id)
    }

    /// Drop channels past the maximum stream lifetime. Dropping the
    /// broadcast sender ends any live subscriber's stream.
    pub fn sweep(&self) {
        let horizon = self.max_lifetime;
        let before = self.channels.len();
        self.channels
            .retain(|_, channel| channel.created_at.elapsed() < horizon);
        let swept = before - self.channels.len();
        if swept > 0 {
            debug!(swept, "swept expired search channels");
        }
    }

    /// Periodic sweep, detached for the process lifetime.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.sweep();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licitaradar_core::{ProgressEvent, UfCode};
    use pretty_assertions::assert_eq;

    fn uf(code: &str) -> UfCode {
        UfCode::parse(code).unwrap()
    }

    fn status_event(search_id: SearchId, code: &str) -> StreamEvent {
        ProgressEvent::success(search_id, uf(code), 1).into()
    }

    fn complete_event() -> StreamEvent {
        StreamEvent::Complete {
            total: 1,
            succeeded: 1,
            failed: 0,
            from_cache: false,
        }
    }

    #[tokio::test]
    async fn late_subscriber_replays_history_in_order() {
        let registry = SearchRegistry::new(Duration::from_secs(600));
        let id = SearchId::new();
        registry.register(id);

        registry.publish(id, status_event(id, "AC"));
        registry.publish(id, status_event(id, "SP"));

        let sub = registry.subscribe(id).unwrap();
        assert_eq!(sub.history.len(), 2);
        assert!(sub.live.is_some());
        match &sub.history[0] {
            StreamEvent::UfStatus { uf: code, .. } => assert_eq!(*code, uf("AC")),
            _ => panic!("expected uf_status"),
        }
    }

    #[tokio::test]
    async fn live_events_reach_existing_subscribers() {
        let registry = SearchRegistry::new(Duration::from_secs(600));
        let id = SearchId::new();
        registry.register(id);

        let mut sub = registry.subscribe(id).unwrap();
        let mut live = sub.live.take().unwrap();

        registry.publish(id, status_event(id, "MG"));
        let received = live.recv().await.unwrap();
        match received {
            StreamEvent::UfStatus { uf: code, .. } => assert_eq!(code, uf("MG")),
            _ => panic!("expected uf_status"),
        }
    }

    #[tokio::test]
    async fn completed_search_subscribes_without_live_feed() {
        let registry = SearchRegistry::new(Duration::from_secs(600));
        let id = SearchId::new();
        registry.register(id);

        registry.publish(id, status_event(id, "AC"));
        registry.publish(id, complete_event());

        let sub = registry.subscribe(id).unwrap();
        assert_eq!(sub.history.len(), 2);
        assert!(sub.live.is_none());
        assert!(sub.history.last().unwrap().is_complete());
    }

    #[tokio::test]
    async fn unknown_search_is_none_and_publish_is_noop() {
        let registry = SearchRegistry::new(Duration::from_secs(600));
        let id = SearchId::new();

        assert!(registry.subscribe(id).is_none());
        // Must not panic.
        registry.publish(id, complete_event());
    }

    #[tokio::test]
    async fn sweep_drops_expired_channels() {
        let registry = SearchRegistry::new(Duration::from_millis(10));
        let id = SearchId::new();
        registry.register(id);
        assert!(registry.contains(id));

        tokio::time::sleep(Duration::from_millis(30)).await;
        registry.sweep();
        assert!(!registry.contains(id));
    }
}
