//! SDK error types.

use thiserror::Error;

/// The main error type for the SDK
#[derive(Error, Debug)]
pub enum SdkError {
    /// API returned an error response
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Network or connection error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Top-level retries exhausted. Terminal, and distinct from a
    /// partial-success response.
    #[error("Search failed after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<SdkError>,
    },

    /// The caller cancelled while the client was backing off.
    #[error("Search cancelled")]
    Cancelled,

    /// The progress stream transport is unavailable.
    #[error("Event stream unavailable: {0}")]
    StreamUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;

impl SdkError {
    /// Whether the top-level retry layer may try again.
    ///
    /// Only gateway-class server failures qualify; auth and rate-limit
    /// responses are handled upstream of this layer and must not be
    /// retried here.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SdkError::Api { status: 500 | 502, .. })
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SdkError::Api { status, .. } => Some(*status),
            SdkError::Exhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_failures_are_retryable() {
        assert!(SdkError::Api { status: 500, message: "".into() }.is_retryable());
        assert!(SdkError::Api { status: 502, message: "".into() }.is_retryable());
    }

    #[test]
    fn auth_and_rate_limits_are_not() {
        for status in [401, 403, 429, 404, 422, 503] {
            let error = SdkError::Api {
                status,
                message: "".into(),
            };
            assert!(!error.is_retryable(), "status {} must not retry", status);
        }
    }

    #[test]
    fn exhausted_reports_underlying_status() {
        let error = SdkError::Exhausted {
            attempts: 3,
            source: Box::new(SdkError::Api {
                status: 502,
                message: "bad gateway".into(),
            }),
        };
        assert_eq!(error.status_code(), Some(502));
        assert!(!error.is_retryable());
    }
}
