//! Change notifications for UI observers.
//!
//! Defines [`SearchEvent`] (one variant per topic), the [`SearchObserver`]
//! trait, and [`ObserverRegistry`], which fans every event out to all
//! registered observers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use searchdoc_core::{QueryDsl, SearchDocument};
use serde_json::Value;

use crate::tracker::{RequestClass, RequestState};

/// Fixed topic names, shared with existing UI listeners.
pub mod topics {
    pub const SEARCH_DOCUMENT_UPDATE: &str = "es-search-document-update";
    pub const DEFAULT_SEARCH_UPDATE: &str = "default-es-search-update";
    pub const SEARCH_UPDATE: &str = "es-search-update";
    pub const SUGGEST_UPDATE: &str = "es-suggest-update";
}

/// A state change published by a session.
#[derive(Debug, Clone)]
pub enum SearchEvent {
    /// The session's current document was replaced.
    DocumentUpdated(Arc<SearchDocument>),
    DefaultSearchUpdated(Arc<RequestState<QueryDsl>>),
    SearchUpdated(Arc<RequestState<QueryDsl>>),
    SuggestUpdated(Arc<RequestState<Value>>),
}

impl SearchEvent {
    /// Topic this event is published under.
    #[must_use]
    pub fn topic(&self) -> &'static str {
        match self {
            Self::DocumentUpdated(_) => topics::SEARCH_DOCUMENT_UPDATE,
            Self::DefaultSearchUpdated(_) => topics::DEFAULT_SEARCH_UPDATE,
            Self::SearchUpdated(_) => topics::SEARCH_UPDATE,
            Self::SuggestUpdated(_) => topics::SUGGEST_UPDATE,
        }
    }

    /// Request class of a request-state event; `None` for document updates.
    #[must_use]
    pub fn request_class(&self) -> Option<RequestClass> {
        match self {
            Self::DocumentUpdated(_) => None,
            Self::DefaultSearchUpdated(_) => Some(RequestClass::DefaultSearch),
            Self::SearchUpdated(_) => Some(RequestClass::Search),
            Self::SuggestUpdated(_) => Some(RequestClass::Suggest),
        }
    }
}

/// Receives session events.
///
/// Called synchronously on the publishing task; implementations should hand
/// work off rather than block.
pub trait SearchObserver: Send + Sync {
    fn on_event(&self, event: &SearchEvent);
}

impl<F> SearchObserver for F
where
    F: Fn(&SearchEvent) + Send + Sync,
{
    fn on_event(&self, event: &SearchEvent) {
        self(event);
    }
}

/// Token returned by [`ObserverRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer fan-out with subscribe/unsubscribe.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn SearchObserver>)>>,
}

impl ObserverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for all topics.
    pub fn subscribe(&self, observer: Arc<dyn SearchObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    /// Removes an observer. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Delivers `event` to every observer, in subscription order.
    pub fn publish(&self, event: &SearchEvent) {
        // Snapshot so observers may subscribe/unsubscribe from inside the callback.
        let observers: Vec<Arc<dyn SearchObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        tracing::trace!(topic = event.topic(), observers = observers.len(), "publish");
        for observer in observers {
            observer.on_event(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex;

    use super::*;

    fn document_event() -> SearchEvent {
        SearchEvent::DocumentUpdated(Arc::new(SearchDocument::default()))
    }

    #[test]
    fn topics_match_wire_names() {
        assert_eq!(document_event().topic(), "es-search-document-update");
        let search = Arc::new(RequestState::<QueryDsl>::init(RequestClass::Search));
        assert_eq!(
            SearchEvent::SearchUpdated(Arc::clone(&search)).topic(),
            "es-search-update"
        );
        assert_eq!(
            SearchEvent::DefaultSearchUpdated(search).topic(),
            "default-es-search-update"
        );
        let suggest = Arc::new(RequestState::<Value>::init(RequestClass::Suggest));
        let event = SearchEvent::SuggestUpdated(suggest);
        assert_eq!(event.topic(), "es-suggest-update");
        assert_eq!(event.request_class(), Some(RequestClass::Suggest));
    }

    #[test]
    fn publish_reaches_every_observer_in_order() {
        let registry = ObserverRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let log = Arc::clone(&log);
            registry.subscribe(Arc::new(move |event: &SearchEvent| {
                log.lock().push((name, event.topic()));
            }));
        }

        registry.publish(&document_event());
        assert_eq!(
            *log.lock(),
            vec![
                ("first", topics::SEARCH_DOCUMENT_UPDATE),
                ("second", topics::SEARCH_DOCUMENT_UPDATE)
            ]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = ObserverRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = registry.subscribe(Arc::new(move |_: &SearchEvent| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        registry.publish(&document_event());
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.publish(&document_event());

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert!(registry.is_empty());
    }
}
