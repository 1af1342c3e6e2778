//! Request lifecycle tracking.
//!
//! One [`RequestTracker`] per request class records the latest
//! [`RequestState`] snapshot:
//!
//! State machine: Init -> Loading -> Loaded | Error, and back to Loading on
//! the next dispatch. There is no terminal state.
//!
//! Every dispatch gets a sequence number, strictly increasing per tracker.
//! Whether a completion that is older than the latest dispatch may overwrite
//! the state is decided by the tracker's [`StaleResponsePolicy`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use searchdoc_core::SearchDocument;
use serde_json::Value;

use crate::config::StaleResponsePolicy;
use crate::error::TransportError;

/// The independently tracked request classes of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// The user's search: text, filters, sort and paging.
    Search,
    /// Aggregation-only search used for unfiltered facet counts.
    DefaultSearch,
    /// Typeahead suggestions.
    Suggest,
}

impl RequestClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::DefaultSearch => "default_search",
            Self::Suggest => "suggest",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    /// Nothing dispatched yet.
    Init,
    /// A request is in flight.
    Loading,
    /// The request succeeded; `payload` holds the body.
    Loaded,
    /// The request failed; `error` holds the cause.
    Error,
}

/// Immutable snapshot of a request class.
///
/// `query` and `document` identify the dispatch that produced this snapshot,
/// so observers can tell which request a result belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<Q> {
    pub class: RequestClass,
    pub status: RequestStatus,
    /// Dispatch sequence number; 0 before the first dispatch.
    pub sequence: u64,
    pub query: Option<Q>,
    pub document: Option<SearchDocument>,
    pub payload: Option<Value>,
    pub error: Option<TransportError>,
}

impl<Q> RequestState<Q> {
    /// The state before any dispatch.
    #[must_use]
    pub fn init(class: RequestClass) -> Self {
        Self {
            class,
            status: RequestStatus::Init,
            sequence: 0,
            query: None,
            document: None,
            payload: None,
            error: None,
        }
    }

    /// Returns `true` while a request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == RequestStatus::Loading
    }
}

/// Handle for one in-flight dispatch, consumed when it settles.
#[derive(Debug)]
pub struct DispatchTicket<Q> {
    loading: Arc<RequestState<Q>>,
}

impl<Q> DispatchTicket<Q> {
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.loading.sequence
    }

    /// The `Loading` snapshot recorded for this dispatch.
    #[must_use]
    pub fn loading_state(&self) -> Arc<RequestState<Q>> {
        Arc::clone(&self.loading)
    }
}

/// Result of settling a dispatch.
#[derive(Debug)]
pub struct Settled<Q> {
    /// The `Loaded`/`Error` snapshot of this dispatch.
    pub state: Arc<RequestState<Q>>,
    /// Whether the snapshot became the tracker's current state. `false` when
    /// the completion was stale and discarded by policy.
    pub applied: bool,
}

struct TrackerInner<Q> {
    current: Arc<RequestState<Q>>,
    last_sequence: u64,
}

/// Tracks the lifecycle of one request class.
pub struct RequestTracker<Q> {
    class: RequestClass,
    policy: StaleResponsePolicy,
    inner: Mutex<TrackerInner<Q>>,
}

impl<Q: Clone> RequestTracker<Q> {
    /// Creates a tracker in the `Init` state.
    #[must_use]
    pub fn new(class: RequestClass, policy: StaleResponsePolicy) -> Self {
        Self {
            class,
            policy,
            inner: Mutex::new(TrackerInner {
                current: Arc::new(RequestState::init(class)),
                last_sequence: 0,
            }),
        }
    }

    #[must_use]
    pub fn class(&self) -> RequestClass {
        self.class
    }

    /// The latest recorded snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<RequestState<Q>> {
        Arc::clone(&self.inner.lock().current)
    }

    /// Records a new dispatch and moves to `Loading`.
    pub fn begin(&self, query: Q, document: Option<SearchDocument>) -> DispatchTicket<Q> {
        let mut inner = self.inner.lock();
        inner.last_sequence += 1;
        let loading = Arc::new(RequestState {
            class: self.class,
            status: RequestStatus::Loading,
            sequence: inner.last_sequence,
            query: Some(query),
            document,
            payload: None,
            error: None,
        });
        inner.current = Arc::clone(&loading);
        DispatchTicket { loading }
    }

    /// Settles a dispatch with the transport's outcome.
    pub fn settle(
        &self,
        ticket: DispatchTicket<Q>,
        outcome: Result<Value, TransportError>,
    ) -> Settled<Q> {
        let loading = ticket.loading;
        let (status, payload, error) = match outcome {
            Ok(payload) => (RequestStatus::Loaded, Some(payload), None),
            Err(error) => (RequestStatus::Error, None, Some(error)),
        };
        let state = Arc::new(RequestState {
            class: self.class,
            status,
            sequence: loading.sequence,
            query: loading.query.clone(),
            document: loading.document.clone(),
            payload,
            error,
        });

        let mut inner = self.inner.lock();
        let stale = state.sequence < inner.last_sequence;
        let applied = !stale || self.policy == StaleResponsePolicy::LastCompletionWins;
        if applied {
            inner.current = Arc::clone(&state);
        }
        Settled { state, applied }
    }
}
