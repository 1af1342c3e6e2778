//! Client-side configuration for a search session.

use std::time::Duration;

/// What to do with a completion that arrives after a newer request of the
/// same class was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleResponsePolicy {
    /// Drop it: the request state keeps tracking the newest dispatch. The
    /// awaiting caller still receives its own result.
    #[default]
    DiscardStale,
    /// Apply it anyway; whichever request settles last wins.
    LastCompletionWins,
}

/// Session configuration.
///
/// Controls where requests are sent, how long the HTTP transport waits, and
/// how out-of-order completions are handled.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin, without a trailing path.
    pub base_url: String,
    /// Path of the search endpoint (primary and default search).
    pub search_path: String,
    /// Path of the typeahead suggest endpoint.
    pub suggest_path: String,
    /// Maximum time the HTTP transport waits for a response.
    pub request_timeout: Duration,
    /// Handling of out-of-order completions.
    pub stale_responses: StaleResponsePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            search_path: "/rest/search".to_string(),
            suggest_path: "/rest/search/suggest".to_string(),
            request_timeout: Duration::from_secs(30),
            stale_responses: StaleResponsePolicy::DiscardStale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.search_path, "/rest/search");
        assert_eq!(config.suggest_path, "/rest/search/suggest");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.stale_responses, StaleResponsePolicy::DiscardStale);
    }
}
