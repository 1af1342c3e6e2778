//! Search session: owns the current document and drives requests.
//!
//! Every mutation follows the same path:
//!
//! 1. derive the next document from the current one (`searchdoc_core`);
//! 2. compile it into a query body;
//! 3. under the document lock, track the request as `Loading` and store the
//!    document as current, so newer documents always get newer sequences;
//! 4. publish `DocumentUpdated`, then hand the body to the transport;
//! 5. record `Loaded`/`Error` and publish the new request state.
//!
//! Steps 1 and 2 run before anything is stored, so a codec error leaves the
//! session exactly as it was. The document lock is never held across the
//! transport call; several dispatches may be in flight at once.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use searchdoc_core::{
    compile_default_search, compile_query, decode_url_path, default_text_fields, encode_url_path,
    CodecError, KeywordOp, QueryDsl, RangeBounds, SearchConfig, SearchDocument, SortChange,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use crate::config::ClientConfig;
use crate::error::SearchError;
use crate::notify::{ObserverRegistry, SearchEvent, SearchObserver, SubscriptionId};
use crate::tracker::{DispatchTicket, RequestClass, RequestState, RequestTracker};
use crate::transport::{SearchTransport, TransportRequest};

/// Snapshot of any tracked request class.
#[derive(Debug, Clone)]
pub enum RequestSnapshot {
    Search(Arc<RequestState<QueryDsl>>),
    DefaultSearch(Arc<RequestState<QueryDsl>>),
    Suggest(Arc<RequestState<Value>>),
}

impl RequestSnapshot {
    #[must_use]
    pub fn status(&self) -> crate::tracker::RequestStatus {
        match self {
            Self::Search(state) | Self::DefaultSearch(state) => state.status,
            Self::Suggest(state) => state.status,
        }
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Search(state) | Self::DefaultSearch(state) => state.sequence,
            Self::Suggest(state) => state.sequence,
        }
    }
}

/// One user's search session.
///
/// Collaborators are injected at construction: the search config, the
/// transport, and observers registered through [`SearchSession::subscribe`].
pub struct SearchSession {
    config: ClientConfig,
    search_config: SearchConfig,
    default_text_fields: Vec<String>,
    transport: Arc<dyn SearchTransport>,
    document: RwLock<Arc<SearchDocument>>,
    search: RequestTracker<QueryDsl>,
    default_search: RequestTracker<QueryDsl>,
    suggest: RequestTracker<Value>,
    observers: ObserverRegistry,
}

impl SearchSession {
    /// Creates a session with the default document and all requests in `Init`.
    #[must_use]
    pub fn new(
        config: ClientConfig,
        search_config: SearchConfig,
        transport: Arc<dyn SearchTransport>,
    ) -> Self {
        let policy = config.stale_responses;
        Self {
            config,
            search_config,
            default_text_fields: default_text_fields(),
            transport,
            document: RwLock::new(Arc::new(SearchDocument::default())),
            search: RequestTracker::new(RequestClass::Search, policy),
            default_search: RequestTracker::new(RequestClass::DefaultSearch, policy),
            suggest: RequestTracker::new(RequestClass::Suggest, policy),
            observers: ObserverRegistry::new(),
        }
    }

    /// Overrides the text fields used when the search config names none.
    #[must_use]
    pub fn with_default_text_fields(mut self, fields: Vec<String>) -> Self {
        self.default_text_fields = fields;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn search_config(&self) -> &SearchConfig {
        &self.search_config
    }

    /// The current document.
    #[must_use]
    pub fn current_document(&self) -> Arc<SearchDocument> {
        Arc::clone(&self.document.read())
    }

    /// The current document in URL path form.
    #[must_use]
    pub fn current_url_path(&self) -> String {
        encode_url_path(&self.current_document())
    }

    /// Latest state of the given request class.
    #[must_use]
    pub fn request_state(&self, class: RequestClass) -> RequestSnapshot {
        match class {
            RequestClass::Search => RequestSnapshot::Search(self.search.current()),
            RequestClass::DefaultSearch => {
                RequestSnapshot::DefaultSearch(self.default_search.current())
            }
            RequestClass::Suggest => RequestSnapshot::Suggest(self.suggest.current()),
        }
    }

    #[must_use]
    pub fn search_state(&self) -> Arc<RequestState<QueryDsl>> {
        self.search.current()
    }

    #[must_use]
    pub fn default_search_state(&self) -> Arc<RequestState<QueryDsl>> {
        self.default_search.current()
    }

    #[must_use]
    pub fn suggest_state(&self) -> Arc<RequestState<Value>> {
        self.suggest.current()
    }

    pub fn subscribe(&self, observer: Arc<dyn SearchObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Searches
    // -----------------------------------------------------------------------

    /// Replaces the current document and runs its search.
    ///
    /// Returns the settled state of this search. With the default stale
    /// policy, a result superseded by a newer search is still returned here
    /// but is not recorded as the session's search state.
    ///
    /// # Errors
    ///
    /// [`SearchError::Codec`] if the document does not compile (the session is
    /// unchanged), [`SearchError::Transport`] if the backend call fails.
    pub async fn search(
        &self,
        document: SearchDocument,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        self.apply(|_| Ok(document), false).await
    }

    /// Decodes a deep link and runs its search.
    ///
    /// # Errors
    ///
    /// As [`SearchSession::search`], plus [`SearchError::Codec`] for a
    /// malformed path.
    pub async fn search_url_path(
        &self,
        path: &str,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        let document = decode_url_path(path)?;
        self.search(document).await
    }

    /// Runs the aggregation-only default search with the current page size.
    ///
    /// # Errors
    ///
    /// [`SearchError::Transport`] if the backend call fails.
    pub async fn default_search(&self) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        let document = self.current_document();
        let query = compile_default_search(&document, &self.search_config);
        self.dispatch(
            &self.default_search,
            &self.config.search_path,
            query,
            Some((*document).clone()),
            SearchEvent::DefaultSearchUpdated,
        )
        .await
    }

    /// Sends a typeahead request. The request body is passed through as-is.
    ///
    /// # Errors
    ///
    /// [`SearchError::Transport`] if the backend call fails.
    pub async fn suggest(&self, request: Value) -> Result<Arc<RequestState<Value>>, SearchError> {
        self.dispatch(
            &self.suggest,
            &self.config.suggest_path,
            request,
            None,
            SearchEvent::SuggestUpdated,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Sets the free-text query.
    ///
    /// # Errors
    ///
    /// See [`SearchSession::search`].
    pub async fn set_text(
        &self,
        text: impl Into<String>,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        let text = text.into();
        self.apply(|doc| Ok(doc.set_text(text)), false).await
    }

    /// Clears text and filters.
    ///
    /// # Errors
    ///
    /// See [`SearchSession::search`].
    pub async fn clear_filters(&self) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        self.apply(|doc| Ok(doc.clear_filters()), false).await
    }

    /// Adds a keyword value to an attribute's filter.
    ///
    /// # Errors
    ///
    /// [`SearchError::Codec`] if the attribute holds a range filter; otherwise
    /// see [`SearchSession::search`].
    pub async fn append_keyword_filter(
        &self,
        attribute: &str,
        value: impl Into<String>,
        op: KeywordOp,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        let value = value.into();
        self.apply(|doc| doc.append_keyword_filter(attribute, value, op), false)
            .await
    }

    /// Replaces an attribute's filter with a single keyword value.
    ///
    /// # Errors
    ///
    /// See [`SearchSession::search`].
    pub async fn set_keyword_filter(
        &self,
        attribute: &str,
        value: impl Into<String>,
        op: KeywordOp,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        let value = value.into();
        self.apply(|doc| Ok(doc.set_keyword_filter(attribute, value, op)), false)
            .await
    }

    /// Removes a keyword value (or the whole filter when `value` is `None`).
    /// When nothing matches, no request is sent and the current search state
    /// is returned.
    ///
    /// # Errors
    ///
    /// See [`SearchSession::search`].
    pub async fn remove_keyword_filter(
        &self,
        attribute: &str,
        value: Option<&str>,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        self.apply(|doc| Ok(doc.remove_keyword_filter(attribute, value)), true)
            .await
    }

    /// Sets an attribute's range filter.
    ///
    /// # Errors
    ///
    /// See [`SearchSession::search`].
    pub async fn append_range_filter(
        &self,
        attribute: &str,
        bounds: RangeBounds,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        self.apply(|doc| Ok(doc.append_range_filter(attribute, bounds)), false)
            .await
    }

    /// Removes an attribute's filter. A missing attribute sends nothing.
    ///
    /// # Errors
    ///
    /// See [`SearchSession::search`].
    pub async fn remove_range_filter(
        &self,
        attribute: &str,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        self.apply(|doc| Ok(doc.remove_range_filter(attribute)), true)
            .await
    }

    /// Changes the sort.
    ///
    /// # Errors
    ///
    /// See [`SearchSession::search`].
    pub async fn set_sort(
        &self,
        change: SortChange,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        self.apply(|doc| Ok(doc.set_sort(change)), false).await
    }

    /// Moves the page window; a `limit` of 0 keeps the page size.
    ///
    /// # Errors
    ///
    /// See [`SearchSession::search`].
    pub async fn set_paging(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError> {
        self.apply(|doc| Ok(doc.set_paging(offset, limit)), false)
            .await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Derives, compiles and stores the next document, then searches it.
    async fn apply<F>(
        &self,
        mutate: F,
        skip_if_unchanged: bool,
    ) -> Result<Arc<RequestState<QueryDsl>>, SearchError>
    where
        F: FnOnce(&SearchDocument) -> Result<SearchDocument, CodecError>,
    {
        let (document, ticket, body) = {
            let mut current = self.document.write();
            let next = mutate(&current)?;
            if skip_if_unchanged && next == **current {
                debug!("mutation left the document unchanged; not searching");
                return Ok(self.search.current());
            }
            let query = compile_query(&next, &self.search_config, &self.default_text_fields)?;
            let body = serde_json::to_value(&query)?;
            // Sequence numbers must follow store order, so begin under the lock.
            let ticket = self.search.begin(query, Some(next.clone()));
            let next = Arc::new(next);
            *current = Arc::clone(&next);
            (next, ticket, body)
        };

        self.observers
            .publish(&SearchEvent::DocumentUpdated(Arc::clone(&document)));

        self.send(
            &self.search,
            &self.config.search_path,
            ticket,
            body,
            SearchEvent::SearchUpdated,
        )
        .await
    }

    /// Begins a tracked request and sends it.
    async fn dispatch<Q>(
        &self,
        tracker: &RequestTracker<Q>,
        path: &str,
        query: Q,
        document: Option<SearchDocument>,
        to_event: fn(Arc<RequestState<Q>>) -> SearchEvent,
    ) -> Result<Arc<RequestState<Q>>, SearchError>
    where
        Q: Clone + Serialize + Send + Sync,
    {
        let body = serde_json::to_value(&query)?;
        let ticket = tracker.begin(query, document);
        self.send(tracker, path, ticket, body, to_event).await
    }

    /// Runs a begun dispatch through the transport and settles it.
    async fn send<Q>(
        &self,
        tracker: &RequestTracker<Q>,
        path: &str,
        ticket: DispatchTicket<Q>,
        body: Value,
        to_event: fn(Arc<RequestState<Q>>) -> SearchEvent,
    ) -> Result<Arc<RequestState<Q>>, SearchError>
    where
        Q: Clone + Send + Sync,
    {
        let class = tracker.class();
        let sequence = ticket.sequence();

        debug!(class = %class, sequence, "dispatching search request");
        self.observers.publish(&to_event(ticket.loading_state()));

        let span = info_span!(
            "search_request",
            class = class.as_str(),
            sequence,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        let outcome = async {
            let start = Instant::now();
            let result = self
                .transport
                .execute(TransportRequest::post(path, body))
                .await;

            #[allow(clippy::cast_possible_truncation)]
            let duration_ms = start.elapsed().as_millis() as u64;
            let span = tracing::Span::current();
            span.record("duration_ms", duration_ms);
            span.record("outcome", if result.is_ok() { "ok" } else { "error" });
            result
        }
        .instrument(span)
        .await;

        let failure = outcome.as_ref().err().cloned();
        let settled = tracker.settle(ticket, outcome);

        if settled.applied {
            debug!(class = %class, sequence, status = ?settled.state.status, "search request settled");
            self.observers.publish(&to_event(Arc::clone(&settled.state)));
        } else {
            debug!(class = %class, sequence, "discarding stale search response");
        }

        match failure {
            Some(error) => {
                warn!(class = %class, sequence, error = %error, "search request failed");
                Err(error.into())
            }
            None => Ok(settled.state),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
