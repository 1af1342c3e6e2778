//! Search document model.
//!
//! The [`SearchDocument`] is the canonical, serializable description of the
//! user's current search intent: free text, per-attribute filters, sort and
//! paging. Its JSON form uses the same field names as the browser-side search
//! state (`text`, `filters`, `sort`, `limit`, `offset`), with filters tagged by
//! `"type"` (`"keyword"` or `"range"`).

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::CodecError;

/// Page size used when a document or URL does not specify one.
pub const DEFAULT_LIMIT: u32 = 10;

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

// ---------------------------------------------------------------------------
// SearchDocument
// ---------------------------------------------------------------------------

/// Canonical description of a search: text, filters, sort and paging.
///
/// Equality ignores filter insertion order (`IndexMap` compares as a set of
/// entries), so two documents built through different mutation sequences
/// compare equal when they describe the same search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    /// Free-text query. Empty means "no text filter".
    #[serde(default)]
    pub text: String,
    /// Attribute filters keyed by attribute name.
    #[serde(default)]
    pub filters: IndexMap<String, Filter>,
    /// Sort specification. `None` keeps the backend's default ordering.
    #[serde(default)]
    pub sort: Option<SortSpec>,
    /// Page size.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Page start.
    #[serde(default)]
    pub offset: u32,
}

impl Default for SearchDocument {
    fn default() -> Self {
        Self {
            text: String::new(),
            filters: IndexMap::new(),
            sort: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl SearchDocument {
    /// Returns `true` when the document carries neither text nor filters, i.e.
    /// when its compiled query has no `bool` clause.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.text.is_empty() && self.filters.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// A filter attached to a single attribute.
///
/// An attribute holds exactly one filter, so it can never be keyword- and
/// range-filtered at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Filter {
    /// Exact match over one or more discrete values.
    Keyword {
        /// How the values combine.
        op: KeywordOp,
        /// Values in the order they were added.
        value: Vec<String>,
    },
    /// Numeric bound filter.
    Range {
        /// The bound object (`gte`/`lte`/`gt`/`lt`).
        value: RangeBounds,
    },
}

impl Filter {
    /// Creates a keyword filter holding a single value.
    #[must_use]
    pub fn keyword(op: KeywordOp, value: impl Into<String>) -> Self {
        Self::Keyword {
            op,
            value: vec![value.into()],
        }
    }

    /// Creates a range filter.
    #[must_use]
    pub fn range(bounds: RangeBounds) -> Self {
        Self::Range { value: bounds }
    }

    /// The URL marker for this filter: the keyword op, or `"range"`.
    #[must_use]
    pub fn url_marker(&self) -> &str {
        match self {
            Self::Keyword { op, .. } => op.as_str(),
            Self::Range { .. } => RANGE_MARKER,
        }
    }
}

/// URL marker identifying a range filter entry.
pub const RANGE_MARKER: &str = "range";

/// Combination mode of a keyword filter.
///
/// `Or` matches any value (compiled to a `terms` clause), `And` matches all
/// values (one `term` clause per value). Unrecognized ops decoded from a URL
/// are carried verbatim in `Other` so that they survive a round trip; they are
/// rejected when the document is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeywordOp {
    /// Match any of the values.
    #[default]
    Or,
    /// Match all of the values.
    And,
    /// Unrecognized op, kept as written.
    Other(String),
}

impl KeywordOp {
    /// The wire spelling of this op.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Other(op) => op,
        }
    }
}

impl From<String> for KeywordOp {
    fn from(op: String) -> Self {
        match op.as_str() {
            "or" => Self::Or,
            "and" => Self::And,
            _ => Self::Other(op),
        }
    }
}

impl From<&str> for KeywordOp {
    fn from(op: &str) -> Self {
        Self::from(op.to_string())
    }
}

impl From<KeywordOp> for String {
    fn from(op: KeywordOp) -> Self {
        match op {
            KeywordOp::Other(op) => op,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for KeywordOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half- or fully-bounded numeric range.
///
/// Bounds are kept as JSON numbers so integers stay integers on the wire
/// (`{"gte":1931}` rather than `{"gte":1931.0}`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeBounds {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gte: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lte: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gt: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lt: Option<Number>,
}

impl RangeBounds {
    /// Inclusive range `[gte, lte]`.
    #[must_use]
    pub fn between(gte: impl Into<Number>, lte: impl Into<Number>) -> Self {
        Self {
            gte: Some(gte.into()),
            lte: Some(lte.into()),
            ..Self::default()
        }
    }

    /// Returns `true` when no bound is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gte.is_none() && self.lte.is_none() && self.gt.is_none() && self.lt.is_none()
    }
}

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

/// Sort direction for a single-attribute sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// The wire spelling of this direction.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Engine-native sort specification.
///
/// Either an object (`{"year":"desc"}`) or an array of sort entries. The
/// content is passed to the backend verbatim; only the outer shape is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct SortSpec(Value);

impl SortSpec {
    /// Wraps a JSON value, rejecting anything but an object or an array.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedSegment`] for scalars and `null`.
    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Object(_) | Value::Array(_) => Ok(Self(value)),
            other => Err(CodecError::malformed(
                "sort",
                format!("expected an object or array, got `{other}`"),
            )),
        }
    }

    /// Single-attribute sort: `{attribute: direction}`.
    #[must_use]
    pub fn field(attribute: impl Into<String>, direction: SortDirection) -> Self {
        let mut map = serde_json::Map::new();
        map.insert(attribute.into(), Value::String(direction.as_str().to_string()));
        Self(Value::Object(map))
    }

    /// Borrow the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl TryFrom<Value> for SortSpec {
    type Error = CodecError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<SortSpec> for Value {
    fn from(spec: SortSpec) -> Self {
        spec.0
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
