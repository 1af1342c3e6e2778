//! searchdoc client: the search session, its request lifecycle tracking, and
//! the HTTP transport to the search backend.

pub mod config;
pub mod error;
pub mod notify;
pub mod session;
pub mod tracker;
pub mod transport;

pub use config::{ClientConfig, StaleResponsePolicy};
pub use error::{SearchError, TransportError};
pub use notify::{topics, ObserverRegistry, SearchEvent, SearchObserver, SubscriptionId};
pub use session::{RequestSnapshot, SearchSession};
pub use tracker::{RequestClass, RequestState, RequestStatus, RequestTracker};
pub use transport::{HttpTransport, SearchTransport, TransportRequest};
