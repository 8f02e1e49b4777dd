//! Client-held aggregation of per-region progress.
//!
//! Rebuilt from scratch whenever streaming is disabled or the search
//! changes: the state starts with every requested region pending, which
//! is also the fallback view when the stream transport is unavailable.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use licitaradar_core::{FailureKind, Stage, StreamEvent, UfCode};

/// How long a search must have run, with mixed progress, before the
/// partial-results prompt is offered.
pub const PARTIAL_PROMPT_DELAY: Duration = Duration::from_secs(15);

/// Latest known state of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSnapshot {
    pub stage: Stage,
    pub record_count: Option<u64>,
    pub detail: Option<FailureKind>,
    pub message: Option<String>,
}

impl RegionSnapshot {
    fn pending() -> Self {
        Self {
            stage: Stage::Pending,
            record_count: None,
            detail: None,
            message: None,
        }
    }

    /// User-facing label. Circuit-open regions are phrased as
    /// temporarily unavailable, not as errors.
    pub fn label(&self) -> &'static str {
        match (self.stage, self.detail) {
            (Stage::Pending, _) => "waiting",
            (Stage::Fetching, _) => "searching",
            (Stage::Success, _) => "done",
            (Stage::Recovered, _) => "done (after a hiccup)",
            (Stage::Failed, Some(FailureKind::CircuitOpen)) => "temporarily unavailable",
            (Stage::Failed, _) => "no answer",
        }
    }
}

/// Aggregated progress for one search.
#[derive(Debug)]
pub struct SearchProgressState {
    regions: BTreeMap<UfCode, RegionSnapshot>,
    started_at: Instant,
    complete_marker_seen: bool,
    prompt_dismissed: bool,
}

impl SearchProgressState {
    /// All requested regions start pending.
    pub fn new(requested: impl IntoIterator<Item = UfCode>) -> Self {
        Self {
            regions: requested
                .into_iter()
                .map(|uf| (uf, RegionSnapshot::pending()))
                .collect(),
            started_at: Instant::now(),
            complete_marker_seen: false,
            prompt_dismissed: false,
        }
    }

    /// Fold one stream event in. Events for regions outside the request
    /// and stale regressions (a terminal region going back to pending or
    /// fetching) are ignored; ordering across regions is not assumed.
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::UfStatus {
                uf,
                status,
                count,
                message,
                detail,
            } => {
                let Some(snapshot) = self.regions.get_mut(uf) else {
                    return;
                };
                if snapshot.stage.is_terminal() && !status.is_terminal() {
                    return;
                }
                *snapshot = RegionSnapshot {
                    stage: *status,
                    record_count: *count,
                    detail: *detail,
                    message: message.clone(),
                };
            }
            StreamEvent::Complete { .. } => {
                self.complete_marker_seen = true;
            }
        }
    }

    /// Per-region view, lexicographically ordered by region code.
    pub fn regions(&self) -> impl Iterator<Item = (&UfCode, &RegionSnapshot)> {
        self.regions.iter()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Sum of record counts over regions that have reported one.
    pub fn total_found(&self) -> u64 {
        self.regions
            .values()
            .filter_map(|s| s.record_count)
            .sum()
    }

    /// True only when every requested region has reached a terminal
    /// stage; never while anything is still pending or fetching.
    pub fn all_complete(&self) -> bool {
        self.regions.values().all(|s| s.stage.is_terminal())
    }

    /// Whether the server's terminal marker has arrived.
    pub fn complete_marker_seen(&self) -> bool {
        self.complete_marker_seen
    }

    pub fn succeeded_count(&self) -> usize {
        self.regions
            .values()
            .filter(|s| matches!(s.stage, Stage::Success | Stage::Recovered))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.regions
            .values()
            .filter(|s| s.stage == Stage::Failed)
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.regions
            .values()
            .filter(|s| !s.stage.is_terminal())
            .count()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Offer "view partial results now vs. keep waiting"?
    ///
    /// Only when the search has run at least [`PARTIAL_PROMPT_DELAY`]
    /// with at least one region done and at least one still in flight,
    /// and never again after the user dismissed it for this search.
    pub fn should_offer_partial(&self, elapsed: Duration) -> bool {
        !self.prompt_dismissed
            && elapsed >= PARTIAL_PROMPT_DELAY
            && self.succeeded_count() >= 1
            && self.pending_count() >= 1
    }

    /// Suppress the partial-results prompt for the rest of this search.
    pub fn dismiss_partial_prompt(&mut self) {
        self.prompt_dismissed = true;
    }

    /// One-line human summary, singular/plural aware.
    pub fn summary_line(&self) -> String {
        format!(
            "{} from {} of {}",
            record_phrase(self.total_found()),
            self.succeeded_count(),
            region_phrase(self.region_count())
        )
    }
}

/// "1 region" / "n regions".
pub fn region_phrase(count: usize) -> String {
    if count == 1 {
        "1 region".to_string()
    } else {
        format!("{} regions", count)
    }
}

/// "1 record" / "n records".
pub fn record_phrase(count: u64) -> String {
    if count == 1 {
        "1 record".to_string()
    } else {
        format!("{} records", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licitaradar_core::{ProgressEvent, SearchId};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn uf(code: &str) -> UfCode {
        UfCode::parse(code).unwrap()
    }

    fn requested(n: usize) -> Vec<UfCode> {
        UfCode::all().into_iter().take(n).collect()
    }

    fn success(code: &str, count: u64) -> StreamEvent {
        ProgressEvent::success(SearchId::new(), uf(code), count).into()
    }

    fn fetching(code: &str) -> StreamEvent {
        ProgressEvent::fetching(SearchId::new(), uf(code)).into()
    }

    fn failed(code: &str, kind: FailureKind) -> StreamEvent {
        ProgressEvent::failed(SearchId::new(), uf(code), kind).into()
    }

    #[test_case(1)]
    #[test_case(5)]
    #[test_case(27)]
    fn view_has_exactly_n_entries_in_lexicographic_order(n: usize) {
        let state = SearchProgressState::new(requested(n));
        assert_eq!(state.region_count(), n);

        let codes: Vec<&str> = state.regions().map(|(k, _)| k.as_str()).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn starts_all_pending_and_incomplete() {
        let state = SearchProgressState::new(requested(3));
        assert!(!state.all_complete());
        assert_eq!(state.pending_count(), 3);
        assert_eq!(state.total_found(), 0);
    }

    #[test]
    fn all_complete_requires_every_region_terminal() {
        let mut state = SearchProgressState::new(vec![uf("AC"), uf("AL"), uf("AM")]);

        state.apply(&success("AC", 2));
        state.apply(&failed("AL", FailureKind::Timeout));
        assert!(!state.all_complete());

        state.apply(&fetching("AM"));
        assert!(!state.all_complete());

        state.apply(&success("AM", 1));
        assert!(state.all_complete());
        assert_eq!(state.total_found(), 3);
        assert_eq!(state.succeeded_count(), 2);
        assert_eq!(state.failed_count(), 1);
    }

    #[test]
    fn recovered_counts_as_succeeded_and_terminal() {
        let mut state = SearchProgressState::new(vec![uf("AC")]);
        state.apply(&StreamEvent::from(ProgressEvent::recovered(
            SearchId::new(),
            uf("AC"),
            4,
        )));
        assert!(state.all_complete());
        assert_eq!(state.succeeded_count(), 1);
        assert_eq!(state.total_found(), 4);
    }

    #[test]
    fn stale_regressions_are_ignored() {
        let mut state = SearchProgressState::new(vec![uf("AC")]);
        state.apply(&success("AC", 2));
        state.apply(&fetching("AC"));

        let (_, snapshot) = state.regions().next().unwrap();
        assert_eq!(snapshot.stage, Stage::Success);
        assert!(state.all_complete());
    }

    #[test]
    fn events_for_unrequested_regions_are_ignored() {
        let mut state = SearchProgressState::new(vec![uf("AC")]);
        state.apply(&success("SP", 10));
        assert_eq!(state.region_count(), 1);
        assert_eq!(state.total_found(), 0);
    }

    #[test]
    fn complete_marker_does_not_override_region_stages() {
        let mut state = SearchProgressState::new(vec![uf("AC"), uf("AL")]);
        state.apply(&success("AC", 1));
        state.apply(&StreamEvent::Complete {
            total: 1,
            succeeded: 1,
            failed: 0,
            from_cache: false,
        });

        assert!(state.complete_marker_seen());
        // AL never reported terminal state, so the aggregate is not
        // complete.
        assert!(!state.all_complete());
    }

    #[test]
    fn partial_prompt_requires_time_success_and_pending() {
        let mut state = SearchProgressState::new(vec![uf("AC"), uf("AL")]);
        let long_enough = PARTIAL_PROMPT_DELAY + Duration::from_secs(1);
        let too_soon = Duration::from_secs(5);

        // Nothing succeeded yet.
        assert!(!state.should_offer_partial(long_enough));

        state.apply(&success("AC", 2));
        // One success, one pending, but too early.
        assert!(!state.should_offer_partial(too_soon));
        // Now all three conditions hold.
        assert!(state.should_offer_partial(long_enough));

        // Nothing pending once AL resolves.
        state.apply(&failed("AL", FailureKind::Upstream5xx));
        assert!(!state.should_offer_partial(long_enough));
    }

    #[test]
    fn dismissed_prompt_never_returns() {
        let mut state = SearchProgressState::new(vec![uf("AC"), uf("AL")]);
        state.apply(&success("AC", 2));
        let long_enough = PARTIAL_PROMPT_DELAY + Duration::from_secs(1);

        assert!(state.should_offer_partial(long_enough));
        state.dismiss_partial_prompt();
        assert!(!state.should_offer_partial(long_enough));
        assert!(!state.should_offer_partial(long_enough * 4));
    }

    #[test]
    fn circuit_open_regions_read_as_temporarily_unavailable() {
        let mut state = SearchProgressState::new(vec![uf("AC"), uf("AL")]);
        state.apply(&failed("AC", FailureKind::CircuitOpen));
        state.apply(&failed("AL", FailureKind::Upstream5xx));

        let labels: Vec<&str> = state.regions().map(|(_, s)| s.label()).collect();
        assert_eq!(labels, vec!["temporarily unavailable", "no answer"]);
    }

    #[test_case(1, "1 region"; "singular region")]
    #[test_case(0, "0 regions"; "zero regions")]
    #[test_case(27, "27 regions"; "plural regions")]
    fn region_phrasing(count: usize, expected: &str) {
        assert_eq!(region_phrase(count), expected);
    }

    #[test_case(1, "1 record"; "singular record")]
    #[test_case(2, "2 records"; "plural records")]
    fn record_phrasing(count: u64, expected: &str) {
        assert_eq!(record_phrase(count), expected);
    }

    #[test]
    fn summary_line_phrasing() {
        let mut state = SearchProgressState::new(vec![uf("AC"), uf("AL")]);
        state.apply(&success("AC", 1));
        assert_eq!(state.summary_line(), "1 record from 1 of 2 regions");
    }
}
