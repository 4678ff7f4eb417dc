//! Search lifecycle state and the transitions that drive it.
//!
//! [`SearchState::apply`] is the only way the state changes. [`Orchestrator`]
//! pairs it with a [`SearchBackend`] to run a submission end to end.

use crate::client::{SearchBackend, SearchError};
use crate::types::{SearchCriteria, SearchResponse, SearchResult, SearchSummary};
use std::str::FromStr;
use tracing::{info, warn};

/// Identifies one submission. Tickets increase monotonically per state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

/// How responses to superseded submissions are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFencing {
    /// Every response is applied when it arrives, so with overlapping
    /// submissions the slowest one wins.
    #[default]
    LastWriteWins,
    /// Only the response to the most recently issued ticket is applied.
    LatestOnly,
}

impl FromStr for ResponseFencing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "last-write-wins" => Ok(ResponseFencing::LastWriteWins),
            "latest-only" => Ok(ResponseFencing::LatestOnly),
            other => Err(format!(
                "invalid fencing '{}': expected last-write-wins or latest-only",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SearchEvent {
    Submitted(RequestTicket),
    Succeeded(RequestTicket, SearchResponse),
    Failed(RequestTicket, SearchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub(crate) loading: bool,
    pub(crate) error: Option<String>,
    pub(crate) results: Vec<SearchResult>,
    pub(crate) summary: Option<SearchSummary>,
    latest: u64,
    fencing: ResponseFencing,
}

impl SearchState {
    pub fn new(fencing: ResponseFencing) -> Self {
        Self {
            fencing,
            ..Default::default()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn summary(&self) -> Option<&SearchSummary> {
        self.summary.as_ref()
    }

    pub fn fencing(&self) -> ResponseFencing {
        self.fencing
    }

    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::Pending
        } else if self.error.is_some() {
            Phase::Error
        } else if self.summary.is_some() {
            Phase::Success
        } else {
            Phase::Idle
        }
    }

    /// Issue the next ticket and enter Pending.
    pub fn submit(&mut self) -> RequestTicket {
        let ticket = RequestTicket(self.latest + 1);
        self.apply(SearchEvent::Submitted(ticket));
        ticket
    }

    fn is_stale(&self, ticket: RequestTicket) -> bool {
        self.fencing == ResponseFencing::LatestOnly && ticket.0 != self.latest
    }

    /// Apply one event. Returns `false` when the event was discarded as stale.
    pub fn apply(&mut self, event: SearchEvent) -> bool {
        match event {
            SearchEvent::Submitted(ticket) => {
                self.latest = self.latest.max(ticket.0);
                self.loading = true;
                self.error = None;
                self.results.clear();
                self.summary = None;
            }
            SearchEvent::Succeeded(ticket, response) => {
                if self.is_stale(ticket) {
                    warn!("Discarding response to superseded search #{}", ticket.0);
                    return false;
                }
                self.summary = Some(SearchSummary::from_response(&response));
                self.results = response.results;
                self.error = None;
                self.loading = false;
            }
            SearchEvent::Failed(ticket, err) => {
                if self.is_stale(ticket) {
                    warn!("Discarding failure of superseded search #{}", ticket.0);
                    return false;
                }
                self.error = Some(err.message());
                self.results.clear();
                self.summary = None;
                self.loading = false;
            }
        }
        true
    }
}

/// Owns the search state and the backend requests are sent to.
#[derive(Debug)]
pub struct Orchestrator<B> {
    backend: B,
    state: SearchState,
}

impl<B: SearchBackend> Orchestrator<B> {
    pub fn new(backend: B, fencing: ResponseFencing) -> Self {
        Self {
            backend,
            state: SearchState::new(fencing),
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Enter Pending for `criteria`. The caller sends the request and reports
    /// back through [`Orchestrator::complete`].
    pub fn begin(&mut self, criteria: &SearchCriteria) -> RequestTicket {
        let ticket = self.state.submit();
        info!(
            "Search #{} submitted: query='{}' max_pages={}",
            ticket.0, criteria.normal_query, criteria.max_pages
        );
        ticket
    }

    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<SearchResponse, SearchError>,
    ) -> bool {
        let (event, failure) = match outcome {
            Ok(response) => (SearchEvent::Succeeded(ticket, response), None),
            Err(err) => {
                let reason = err.to_string();
                (SearchEvent::Failed(ticket, err), Some(reason))
            }
        };
        if !self.state.apply(event) {
            return false;
        }
        match failure {
            None => info!(
                "Search #{} succeeded with {} results",
                ticket.0,
                self.state.results().len()
            ),
            Some(reason) => warn!("Search #{} failed: {}", ticket.0, reason),
        }
        true
    }

    /// Submit and wait for the outcome. Failures end up in the state, never
    /// in the return value.
    pub async fn submit(&mut self, criteria: SearchCriteria) -> &SearchState {
        let ticket = self.begin(&criteria);
        let outcome = self.backend.search(&criteria).await;
        self.complete(ticket, outcome);
        &self.state
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::HealthResponse;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Backend that replays queued outcomes in order.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedBackend {
        pub(crate) outcomes: Arc<Mutex<VecDeque<Result<SearchResponse, SearchError>>>>,
        pub(crate) seen: Arc<Mutex<Vec<SearchCriteria>>>,
        pub(crate) unhealthy: bool,
    }

    impl ScriptedBackend {
        pub(crate) fn push(&self, outcome: Result<SearchResponse, SearchError>) {
            self.outcomes.lock().unwrap().push_back(outcome);
        }
    }

    impl SearchBackend for ScriptedBackend {
        async fn search(&self, criteria: &SearchCriteria) -> Result<SearchResponse, SearchError> {
            self.seen.lock().unwrap().push(criteria.clone());
            let next = self.outcomes.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(SearchError::with_detail("no scripted outcome")))
        }

        async fn health(&self) -> Result<HealthResponse, SearchError> {
            if self.unhealthy {
                return Err(SearchError::without_detail());
            }
            Ok(HealthResponse {
                status: "healthy".to_string(),
                message: "scripted".to_string(),
            })
        }
    }

    pub(crate) fn cats_response() -> SearchResponse {
        serde_json::from_value(json!({
            "query": "cats",
            "pages_retrieved": 3,
            "results": [{ "title": "A", "href": "http://a.com" }]
        }))
        .unwrap()
    }

    #[test]
    fn test_initial_state_is_idle() {
        let state = SearchState::default();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(!state.is_loading());
        assert!(state.error().is_none());
        assert!(state.results().is_empty());
        assert!(state.summary().is_none());
    }

    #[test]
    fn test_submit_clears_previous_outcome() {
        let mut state = SearchState::default();
        let first = state.submit();
        state.apply(SearchEvent::Succeeded(first, cats_response()));
        assert_eq!(state.phase(), Phase::Success);

        let second = state.submit();
        assert!(second > first);
        assert_eq!(state.phase(), Phase::Pending);
        assert!(state.results().is_empty());
        assert!(state.summary().is_none());

        state.apply(SearchEvent::Failed(second, SearchError::with_detail("boom")));
        assert_eq!(state.phase(), Phase::Error);
        state.submit();
        assert!(state.error().is_none());
    }

    #[test]
    fn test_success_derives_summary() {
        let mut state = SearchState::default();
        let ticket = state.submit();
        assert!(state.apply(SearchEvent::Succeeded(ticket, cats_response())));

        let summary = state.summary().unwrap();
        assert_eq!(summary.query, "cats");
        assert_eq!(summary.pages_retrieved, 3);
        assert_eq!(summary.total_results, 1);
        assert!(!state.is_loading());
    }

    #[test]
    fn test_empty_success_is_still_success() {
        let mut state = SearchState::default();
        let ticket = state.submit();
        state.apply(SearchEvent::Succeeded(
            ticket,
            SearchResponse {
                query: "nothing".to_string(),
                pages_retrieved: 1,
                results: vec![],
            },
        ));
        assert_eq!(state.phase(), Phase::Success);
        assert_eq!(state.summary().unwrap().total_results, 0);
    }

    #[test]
    fn test_failure_uses_detail_or_fallback() {
        let mut state = SearchState::default();
        let ticket = state.submit();
        state.apply(SearchEvent::Failed(ticket, SearchError::with_detail("upstream timeout")));
        assert_eq!(state.error(), Some("upstream timeout"));

        let ticket = state.submit();
        state.apply(SearchEvent::Failed(ticket, SearchError::without_detail()));
        assert_eq!(state.error(), Some(crate::client::FALLBACK_ERROR_MESSAGE));
        assert!(state.results().is_empty());
        assert!(state.summary().is_none());
    }

    #[test]
    fn test_last_write_wins_applies_stale_response() {
        let mut state = SearchState::new(ResponseFencing::LastWriteWins);
        let first = state.submit();
        let second = state.submit();
        let mut newer = cats_response();
        newer.query = "newer".to_string();

        assert!(state.apply(SearchEvent::Succeeded(second, newer)));
        let mut older = cats_response();
        older.query = "older".to_string();
        assert!(state.apply(SearchEvent::Succeeded(first, older)));
        assert_eq!(state.summary().unwrap().query, "older");
    }

    #[test]
    fn test_latest_only_discards_stale_response() {
        let mut state = SearchState::new(ResponseFencing::LatestOnly);
        let first = state.submit();
        let second = state.submit();

        assert!(!state.apply(SearchEvent::Failed(first, SearchError::with_detail("late"))));
        assert_eq!(state.phase(), Phase::Pending);

        assert!(state.apply(SearchEvent::Succeeded(second, cats_response())));
        assert!(!state.apply(SearchEvent::Succeeded(first, SearchResponse::default())));
        assert_eq!(state.summary().unwrap().query, "cats");
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_discarded_response_is_not_logged_as_success() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let mut orchestrator =
            Orchestrator::new(ScriptedBackend::default(), ResponseFencing::LatestOnly);
        let criteria = SearchCriteria::default();
        tracing::subscriber::with_default(subscriber, || {
            let first = orchestrator.begin(&criteria);
            let second = orchestrator.begin(&criteria);
            assert!(!orchestrator.complete(first, Ok(cats_response())));
            assert!(orchestrator.complete(second, Ok(cats_response())));
        });

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("Discarding response to superseded search #1"));
        assert!(!text.contains("Search #1 succeeded"));
        assert!(text.contains("Search #2 succeeded with 1 results"));
    }

    #[test]
    fn test_fencing_parse() {
        assert_eq!(
            "latest-only".parse::<ResponseFencing>(),
            Ok(ResponseFencing::LatestOnly)
        );
        assert!("newest".parse::<ResponseFencing>().is_err());
    }

    #[tokio::test]
    async fn test_orchestrator_scenario_success() {
        let backend = ScriptedBackend::default();
        backend.push(Ok(cats_response()));
        let mut orchestrator = Orchestrator::new(backend.clone(), ResponseFencing::default());

        let criteria = SearchCriteria {
            normal_query: "cats".to_string(),
            ..Default::default()
        };
        let state = orchestrator.submit(criteria.clone()).await;
        assert_eq!(state.phase(), Phase::Success);
        assert_eq!(state.results()[0].link(), Some("http://a.com"));
        assert_eq!(backend.seen.lock().unwrap().as_slice(), &[criteria]);
    }

    #[tokio::test]
    async fn test_orchestrator_scenario_failure() {
        let backend = ScriptedBackend::default();
        backend.push(Err(SearchError::with_detail("upstream timeout")));
        let mut orchestrator = Orchestrator::new(backend, ResponseFencing::default());

        let state = orchestrator.submit(SearchCriteria::default()).await;
        assert_eq!(state.phase(), Phase::Error);
        assert_eq!(state.error(), Some("upstream timeout"));
    }
}
