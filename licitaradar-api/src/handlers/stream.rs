use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use licitaradar_core::{SearchId, StreamEvent};

use crate::error::ApiError;
use crate::AppState;

/// SSE progress feed for one search: buffered history first, then live
/// events, ending after the terminal `complete` marker (or when the
/// registry sweeps the channel at end of stream lifetime).
pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let search_id = SearchId::from_uuid(id);
    let subscription = state
        .registry
        .subscribe(search_id)
        .ok_or_else(|| ApiError::UnknownSearch(id.to_string()))?;

    let history = stream::iter(subscription.history);

    let live = match subscription.live {
        Some(receiver) => live_stream(receiver).boxed(),
        None => stream::empty().boxed(),
    };

    let combined = history
        .chain(live)
        .scan(false, |done, event| {
            let emit = if *done {
                None
            } else {
                *done = event.is_complete();
                Some(event)
            };
            futures::future::ready(emit)
        })
        .filter_map(|event| async move { sse_event(&event).map(Ok) });

    Ok(Sse::new(combined).keep_alive(KeepAlive::default()))
}

fn live_stream(
    receiver: broadcast::Receiver<StreamEvent>,
) -> impl Stream<Item = StreamEvent> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((event, receiver)),
                // A lagged subscriber skips to the live edge; terminal
                // state still arrives via the complete marker.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "slow stream subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

fn sse_event(event: &StreamEvent) -> Option<Event> {
    match Event::default().event(event.event_name()).json_data(event) {
        Ok(sse) => Some(sse),
        Err(error) => {
            warn!(%error, "dropping unserializable stream event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licitaradar_core::{ProgressEvent, UfCode};

    #[test]
    fn sse_event_carries_name_and_json() {
        let event: StreamEvent =
            ProgressEvent::success(SearchId::new(), UfCode::parse("SP").unwrap(), 3).into();
        assert!(sse_event(&event).is_some());
    }
}
