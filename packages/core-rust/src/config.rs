//! Read-only search configuration: which attributes are facets or ranges and
//! which fields receive the free-text query.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fields searched by the free-text clause when the config names none.
pub const DEFAULT_TEXT_FIELDS: [&str; 2] = ["title", "description"];

/// How an attribute is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetType {
    /// Enumerable values, aggregated with `terms`.
    Facet,
    /// Numeric attribute, aggregated with `min` and `max`.
    Range,
}

/// Per-attribute aggregation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetConfig {
    #[serde(rename = "type")]
    pub facet_type: FacetType,
}

/// Search configuration supplied at session construction.
///
/// Facets keep file order so the compiled aggregation keys come out in a
/// stable order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    #[serde(default)]
    pub facets: IndexMap<String, FacetConfig>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text_fields: Option<Vec<String>>,
}

impl SearchConfig {
    /// Adds a facet, replacing any previous entry for the attribute.
    #[must_use]
    pub fn with_facet(mut self, attribute: impl Into<String>, facet_type: FacetType) -> Self {
        self.facets
            .insert(attribute.into(), FacetConfig { facet_type });
        self
    }

    /// Sets the free-text fields.
    #[must_use]
    pub fn with_text_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Parses a config from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not a valid config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if its content is not a valid config.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Fields for the free-text clause: the configured ones, else `defaults`.
    #[must_use]
    pub fn text_fields_or(&self, defaults: &[String]) -> Vec<String> {
        self.text_fields
            .clone()
            .unwrap_or_else(|| defaults.to_vec())
    }
}

/// [`DEFAULT_TEXT_FIELDS`] as owned strings.
#[must_use]
pub fn default_text_fields() -> Vec<String> {
    DEFAULT_TEXT_FIELDS.iter().map(ToString::to_string).collect()
}
