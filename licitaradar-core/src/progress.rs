//! Progress events and the stream wire protocol.
//!
//! Events are immutable and append-only within a search. Ordering is
//! guaranteed per region key (pending → fetching → success | failed →
//! optionally recovered), never across keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FailureKind;
use crate::types::{SearchId, UfCode};

/// Lifecycle stage of one region within one search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Fetching,
    Success,
    Failed,
    /// Succeeded on a retry attempt after at least one failure.
    Recovered,
}

impl Stage {
    /// Terminal stages end a key's participation in the search.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Success | Stage::Failed | Stage::Recovered)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::Fetching => "fetching",
            Stage::Success => "success",
            Stage::Failed => "failed",
            Stage::Recovered => "recovered",
        };
        write!(f, "{}", s)
    }
}

/// One per-region progress update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub search_id: SearchId,
    pub uf: UfCode,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<FailureKind>,
}

impl ProgressEvent {
    pub fn pending(search_id: SearchId, uf: UfCode) -> Self {
        Self {
            search_id,
            uf,
            stage: Stage::Pending,
            record_count: None,
            message: None,
            detail: None,
        }
    }

    pub fn fetching(search_id: SearchId, uf: UfCode) -> Self {
        Self {
            search_id,
            uf,
            stage: Stage::Fetching,
            record_count: None,
            message: None,
            detail: None,
        }
    }

    pub fn success(search_id: SearchId, uf: UfCode, record_count: u64) -> Self {
        Self {
            search_id,
            uf,
            stage: Stage::Success,
            record_count: Some(record_count),
            message: None,
            detail: None,
        }
    }

    pub fn recovered(search_id: SearchId, uf: UfCode, record_count: u64) -> Self {
        Self {
            search_id,
            uf,
            stage: Stage::Recovered,
            record_count: Some(record_count),
            message: None,
            detail: None,
        }
    }

    pub fn failed(search_id: SearchId, uf: UfCode, detail: FailureKind) -> Self {
        Self {
            search_id,
            uf,
            stage: Stage::Failed,
            record_count: None,
            message: None,
            detail: Some(detail),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Wire event for the one-directional progress stream.
///
/// `uf_status` carries per-region state; `complete` is the terminal
/// marker emitted once every requested region has resolved (or, on a
/// cache hit, immediately after the synthesized per-region events).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    UfStatus {
        uf: UfCode,
        status: Stage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<FailureKind>,
    },
    Complete {
        total: u64,
        succeeded: u32,
        failed: u32,
        from_cache: bool,
    },
}

impl StreamEvent {
    /// SSE event name for this variant.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::UfStatus { .. } => "uf_status",
            StreamEvent::Complete { .. } => "complete",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. })
    }
}

impl From<ProgressEvent> for StreamEvent {
    fn from(event: ProgressEvent) -> Self {
        StreamEvent::UfStatus {
            uf: event.uf,
            status: event.stage,
            count: event.record_count,
            message: event.message,
            detail: event.detail,
        }
    }
}
