//! SSE consumer for the per-search progress feed.
//!
//! The transport is an adapter at the boundary: this module turns the
//! byte stream into typed [`StreamEvent`] values and nothing else.
//! Callers that cannot connect fall back to an all-pending progress view
//! plus the synchronous response.

use futures::stream::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use licitaradar_core::StreamEvent;

use crate::error::{SdkError, SdkResult};

/// Incremental parser for the SSE line protocol.
///
/// Feeds on raw chunks (frames may split anywhere) and yields the `data:`
/// payload of each complete frame. Comment and metadata lines are
/// skipped.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: String,
}

impl SseParser {
    pub(crate) fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut payloads = Vec::new();

        while let Some(boundary) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..boundary + 2).collect();
            let mut data_lines = Vec::new();
            for line in frame.lines() {
                let line = line.trim_end_matches('\r');
                if let Some(rest) = line.strip_prefix("data:") {
                    data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
                }
            }
            if !data_lines.is_empty() {
                payloads.push(data_lines.join("\n"));
            }
        }

        payloads
    }
}

/// A typed stream of progress events for one search.
pub struct EventStream {
    bytes: Pin<Box<dyn Stream<Item = reqwest::Result<bytes::Bytes>> + Send>>,
    parser: SseParser,
    ready: VecDeque<StreamEvent>,
    done: bool,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("ready", &self.ready)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl EventStream {
    /// Open the feed. A connection or non-success response maps to
    /// [`SdkError::StreamUnavailable`] so callers can fall back rather
    /// than fail the search.
    pub async fn connect(http: &reqwest::Client, url: &str) -> SdkResult<Self> {
        let response = http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| SdkError::StreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SdkError::StreamUnavailable(format!(
                "stream endpoint answered {}",
                status.as_u16()
            )));
        }

        Ok(Self {
            bytes: Box::pin(response.bytes_stream()),
            parser: SseParser::default(),
            ready: VecDeque::new(),
            done: false,
        })
    }

    /// Next event, or `None` once the server closes the feed.
    pub async fn next_event(&mut self) -> Option<SdkResult<StreamEvent>> {
        self.next().await
    }
}

impl Stream for EventStream {
    type Item = SdkResult<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match self.bytes.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    self.done = true;
                }
                Poll::Ready(Some(Err(error))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(SdkError::Network(error))));
                }
                Poll::Ready(Some(Ok(chunk))) => {
                    let text = String::from_utf8_lossy(&chunk).into_owned();
                    let payloads = self.parser.push(&text);
                    for payload in payloads {
                        match serde_json::from_str::<StreamEvent>(&payload) {
                            Ok(event) => self.ready.push_back(event),
                            Err(error) => {
                                return Poll::Ready(Some(Err(SdkError::Serialization(error))))
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_complete_frame() {
        let mut parser = SseParser::default();
        let payloads =
            parser.push("event: uf_status\ndata: {\"type\":\"uf_status\"}\n\n");
        assert_eq!(payloads, vec!["{\"type\":\"uf_status\"}"]);
    }

    #[test]
    fn reassembles_frames_split_across_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.push("event: uf_status\nda").is_empty());
        assert!(parser.push("ta: {\"a\":1}").is_empty());
        let payloads = parser.push("\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
    }

    #[test]
    fn skips_keepalive_comments() {
        let mut parser = SseParser::default();
        assert!(parser.push(": keep-alive\n\n").is_empty());
        let payloads = parser.push("data: {\"b\":2}\n\n");
        assert_eq!(payloads, vec!["{\"b\":2}"]);
    }

    #[test]
    fn handles_multiple_frames_per_chunk() {
        let mut parser = SseParser::default();
        let payloads = parser.push("data: one\n\ndata: two\n\n");
        assert_eq!(payloads, vec!["one", "two"]);
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let mut parser = SseParser::default();
        let payloads = parser.push("data: {\"c\":3}\r\n\n");
        assert_eq!(payloads, vec!["{\"c\":3}"]);
    }
}
