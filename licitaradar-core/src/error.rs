use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown region code: {0}")]
    InvalidRegion(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

/// Why a single region fetch failed.
///
/// Travels on the wire in the `detail` field of a `failed` progress event,
/// so clients can phrase a circuit-open key as "temporarily unavailable"
/// instead of implying an upstream bug. A cache miss is a control-flow
/// branch, never a failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The adaptive budget for the key elapsed.
    Timeout,
    /// Connection, DNS, or protocol-level failure before a response.
    TransportError,
    /// The upstream answered with a server error.
    Upstream5xx,
    /// The key's circuit was open; no network call was made.
    CircuitOpen,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::TransportError => "transport_error",
            FailureKind::Upstream5xx => "upstream_5xx",
            FailureKind::CircuitOpen => "circuit_open",
        };
        write!(f, "{}", s)
    }
}

/// A classified failure from one region fetch attempt.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(budget_secs: u64) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("budget of {}s exceeded", budget_secs),
        )
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::TransportError, message)
    }

    pub fn upstream(status: u16) -> Self {
        Self::new(FailureKind::Upstream5xx, format!("upstream status {}", status))
    }

    pub fn circuit_open() -> Self {
        Self::new(FailureKind::CircuitOpen, "circuit open, call short-circuited")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&FailureKind::TransportError).unwrap(),
            "\"transport_error\""
        );
        assert_eq!(
            serde_json::to_string(&FailureKind::CircuitOpen).unwrap(),
            "\"circuit_open\""
        );
    }

    #[test]
    fn fetch_failure_display_includes_kind() {
        let f = FetchFailure::upstream(503);
        assert_eq!(f.to_string(), "upstream_5xx: upstream status 503");
        let f = FetchFailure::circuit_open();
        assert!(f.to_string().starts_with("circuit_open"));
    }
}
