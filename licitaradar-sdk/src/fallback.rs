//! Total-unavailability fallback.
//!
//! When the whole search fails after its retries, the user sees plain
//! language: what happened, what they can do next, and the last search
//! that did complete, when one exists. No upstream system names, no
//! status codes, no resilience jargon on this surface.

use std::time::Duration;

use crate::client::SearchResponse;
use crate::error::SdkError;

/// The de-technicalized failure surface.
#[derive(Debug, Clone)]
pub struct FallbackView {
    pub headline: String,
    pub body: String,
    /// Seconds the manual retry stays disabled.
    pub retry_cooldown_secs: u64,
    /// Last successfully completed search, offered as a stand-in.
    pub last_successful: Option<SearchResponse>,
}

impl FallbackView {
    /// Build the fallback for a terminal search failure.
    pub fn for_failure(
        error: &SdkError,
        cooldown: Duration,
        last_successful: Option<SearchResponse>,
    ) -> Self {
        let (headline, body) = match error {
            SdkError::Cancelled => (
                "Search stopped",
                "You stopped this search before it finished. Run it again whenever you like.",
            ),
            _ => (
                "We couldn't finish your search",
                "The notice sources didn't answer this time. This is usually brief. \
                 Please try again in a moment.",
            ),
        };

        Self {
            headline: headline.to_string(),
            body: body.to_string(),
            retry_cooldown_secs: cooldown.as_secs(),
            last_successful,
        }
    }

    /// Whether a previous completed search can be shown meanwhile.
    pub fn has_cached_results(&self) -> bool {
        self.last_successful.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminal_error() -> SdkError {
        SdkError::Exhausted {
            attempts: 3,
            source: Box::new(SdkError::Api {
                status: 502,
                message: "upstream gateway exploded".into(),
            }),
        }
    }

    #[test]
    fn carries_the_cooldown() {
        let view = FallbackView::for_failure(&terminal_error(), Duration::from_secs(30), None);
        assert_eq!(view.retry_cooldown_secs, 30);
        assert!(!view.has_cached_results());
    }

    #[test]
    fn wording_is_de_technicalized() {
        let view = FallbackView::for_failure(&terminal_error(), Duration::from_secs(30), None);
        let text = format!("{} {}", view.headline, view.body).to_lowercase();

        for forbidden in [
            "500", "502", "http", "gateway", "circuit", "upstream", "timeout", "retry budget",
            "5xx", "server error",
        ] {
            assert!(
                !text.contains(forbidden),
                "fallback wording leaked {:?}: {}",
                forbidden,
                text
            );
        }
    }

    #[test]
    fn cancelled_gets_its_own_wording() {
        let view = FallbackView::for_failure(&SdkError::Cancelled, Duration::from_secs(30), None);
        assert_eq!(view.headline, "Search stopped");
    }
}
