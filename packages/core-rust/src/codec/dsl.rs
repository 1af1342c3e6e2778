//! Search document -> backend query DSL compiler.
//!
//! The body shape is fixed by the existing backend:
//!
//! ```json
//! {
//!   "aggs":  { "<facet>": {"terms": {"field": "<facet>", "size": 1000}},
//!              "<range>-min": {"min": {"field": "<range>"}},
//!              "<range>-max": {"max": {"field": "<range>"}} },
//!   "from":  0,
//!   "size":  10,
//!   "sort":  ...,
//!   "query": { "bool": { "must": [...], "filter": [...] } }
//! }
//! ```
//!
//! `sort` is present only when the document has one, and `query` only when
//! the document has text or filters.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{FacetType, SearchConfig};
use crate::document::{Filter, KeywordOp, RangeBounds, SearchDocument, SortSpec};
use crate::error::CodecError;

/// Bucket cap of every `terms` aggregation.
pub const TERMS_AGG_SIZE: u32 = 1000;

// ---------------------------------------------------------------------------
// Body types
// ---------------------------------------------------------------------------

/// Compiled request body sent to the search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDsl {
    pub aggs: IndexMap<String, Aggregation>,
    pub from: u32,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sort: Option<SortSpec>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub query: Option<Query>,
}

/// A single aggregation request, serialized as `{"<kind>": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Terms(TermsAggregation),
    Min(FieldAggregation),
    Max(FieldAggregation),
}

/// Distinct-value bucket aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsAggregation {
    pub field: String,
    pub size: u32,
}

/// Single-field metric aggregation (`min`, `max`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAggregation {
    pub field: String,
}

/// Query wrapper: `{"bool": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "bool")]
    pub bool_query: BoolQuery,
}

/// Boolean query with scored (`must`) and unscored (`filter`) branches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoolQuery {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub must: Vec<MustClause>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub filter: Vec<FilterClause>,
}

/// Entries of the `must` branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MustClause {
    /// Free-text match over several fields.
    MultiMatch(MultiMatch),
    /// All range filters of the document, keyed by attribute.
    Range(IndexMap<String, RangeBounds>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiMatch {
    pub query: String,
    pub fields: Vec<String>,
}

/// Entries of the `filter` branch, each keyed by a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterClause {
    /// Match any of the values.
    Terms(IndexMap<String, Vec<String>>),
    /// Match exactly one value.
    Term(IndexMap<String, String>),
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Aggregations requested for every configured facet, in config order.
#[must_use]
pub fn aggregations(config: &SearchConfig) -> IndexMap<String, Aggregation> {
    let mut aggs = IndexMap::new();
    for (attribute, facet) in &config.facets {
        match facet.facet_type {
            FacetType::Facet => {
                aggs.insert(
                    attribute.clone(),
                    Aggregation::Terms(TermsAggregation {
                        field: attribute.clone(),
                        size: TERMS_AGG_SIZE,
                    }),
                );
            }
            FacetType::Range => {
                let field = FieldAggregation {
                    field: attribute.clone(),
                };
                aggs.insert(format!("{attribute}-min"), Aggregation::Min(field.clone()));
                aggs.insert(format!("{attribute}-max"), Aggregation::Max(field));
            }
        }
    }
    aggs
}

/// Compiles a document into the backend body.
///
/// The free-text clause searches `config.text_fields`, or
/// `default_text_fields` when the config names none. Clause order follows the
/// document's filter order.
///
/// # Errors
///
/// Returns [`CodecError::UnknownFilterOp`] for a keyword filter whose op is
/// neither `or` nor `and`, and [`CodecError::Validation`] for a keyword filter
/// without values or a range filter without bounds.
pub fn compile_query(
    document: &SearchDocument,
    config: &SearchConfig,
    default_text_fields: &[String],
) -> Result<QueryDsl, CodecError> {
    let mut dsl = QueryDsl {
        aggs: aggregations(config),
        from: document.offset,
        size: document.limit,
        sort: document.sort.clone(),
        query: None,
    };

    if document.is_unfiltered() {
        return Ok(dsl);
    }

    let mut bool_query = BoolQuery::default();

    if !document.text.is_empty() {
        bool_query.must.push(MustClause::MultiMatch(MultiMatch {
            query: document.text.clone(),
            fields: config.text_fields_or(default_text_fields),
        }));
    }

    let mut ranges = IndexMap::new();
    for (attribute, filter) in &document.filters {
        match filter {
            Filter::Keyword { op, value } => {
                if value.is_empty() {
                    return Err(CodecError::validation(attribute, "keyword filter has no values"));
                }
                match op {
                    KeywordOp::Or => bool_query.filter.push(FilterClause::Terms(IndexMap::from([
                        (attribute.clone(), value.clone()),
                    ]))),
                    KeywordOp::And => bool_query.filter.extend(value.iter().map(|v| {
                        FilterClause::Term(IndexMap::from([(attribute.clone(), v.clone())]))
                    })),
                    KeywordOp::Other(op) => {
                        return Err(CodecError::UnknownFilterOp {
                            attribute: attribute.clone(),
                            op: op.clone(),
                        })
                    }
                }
            }
            Filter::Range { value } => {
                if value.is_empty() {
                    return Err(CodecError::validation(attribute, "range filter has no bounds"));
                }
                ranges.insert(attribute.clone(), value.clone());
            }
        }
    }

    if !ranges.is_empty() {
        bool_query.must.push(MustClause::Range(ranges));
    }

    dsl.query = Some(Query { bool_query });
    Ok(dsl)
}

/// Compiles the aggregation-only default search: facet counts over the whole
/// index, reusing only the document's page size.
#[must_use]
pub fn compile_default_search(document: &SearchDocument, config: &SearchConfig) -> QueryDsl {
    QueryDsl {
        aggs: aggregations(config),
        from: 0,
        size: document.limit,
        sort: None,
        query: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::config::default_text_fields;
    use crate::document::SortDirection;

    fn library_config() -> SearchConfig {
        SearchConfig::default()
            .with_facet("year", FacetType::Range)
            .with_facet("genre", FacetType::Facet)
    }

    fn compile(doc: &SearchDocument, config: &SearchConfig) -> Value {
        let dsl = compile_query(doc, config, &default_text_fields()).unwrap();
        serde_json::to_value(dsl).unwrap()
    }

    #[test]
    fn aggregation_shape() {
        let body = compile(&SearchDocument::default(), &library_config());
        assert_eq!(body["aggs"]["year-min"]["min"]["field"], "year");
        assert_eq!(body["aggs"]["year-max"]["max"]["field"], "year");
        assert_eq!(body["aggs"]["genre"]["terms"]["field"], "genre");
        assert_eq!(body["aggs"]["genre"]["terms"]["size"], 1000);

        let keys: Vec<&String> = body["aggs"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["year-min", "year-max", "genre"]);
    }

    #[test]
    fn unfiltered_document_has_no_query_key() {
        let body = compile(&SearchDocument::default(), &library_config());
        assert_eq!(
            body,
            json!({
                "aggs": {
                    "year-min": {"min": {"field": "year"}},
                    "year-max": {"max": {"field": "year"}},
                    "genre": {"terms": {"field": "genre", "size": 1000}}
                },
                "from": 0,
                "size": 10
            })
        );
    }

    #[test]
    fn rivers_scenario() {
        let mut doc = SearchDocument {
            text: "rivers".into(),
            ..SearchDocument::default()
        };
        doc.filters
            .insert("genre".into(), Filter::keyword(KeywordOp::Or, "map"));

        let body = compile(&doc, &SearchConfig::default());
        assert_eq!(
            body["query"],
            json!({
                "bool": {
                    "must": [{"multi_match": {"query": "rivers", "fields": ["title", "description"]}}],
                    "filter": [{"terms": {"genre": ["map"]}}]
                }
            })
        );
        assert_eq!(body["aggs"], json!({}));
    }

    #[test]
    fn configured_text_fields_win() {
        let doc = SearchDocument {
            text: "x".into(),
            ..SearchDocument::default()
        };
        let config = SearchConfig::default().with_text_fields(["label", "notes"]);
        let body = compile(&doc, &config);
        assert_eq!(
            body["query"]["bool"]["must"][0]["multi_match"]["fields"],
            json!(["label", "notes"])
        );
    }

    #[test]
    fn and_filters_become_one_term_per_value() {
        let mut doc = SearchDocument::default();
        doc.filters.insert(
            "tag".into(),
            Filter::Keyword {
                op: KeywordOp::And,
                value: vec!["a".into(), "b".into()],
            },
        );
        let body = compile(&doc, &SearchConfig::default());
        assert_eq!(
            body["query"]["bool"],
            json!({"filter": [{"term": {"tag": "a"}}, {"term": {"tag": "b"}}]})
        );
    }

    #[test]
    fn ranges_merge_into_one_must_entry_after_text() {
        let mut doc = SearchDocument {
            text: "maps".into(),
            ..SearchDocument::default()
        };
        doc.filters
            .insert("year".into(), Filter::range(RangeBounds::between(1931, 1960)));
        doc.filters.insert(
            "scale".into(),
            Filter::range(RangeBounds {
                lt: Some(5000.into()),
                ..RangeBounds::default()
            }),
        );

        let body = compile(&doc, &SearchConfig::default());
        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert!(must[0].get("multi_match").is_some());
        assert_eq!(
            must[1],
            json!({"range": {"year": {"gte": 1931, "lte": 1960}, "scale": {"lt": 5000}}})
        );
        assert!(body["query"]["bool"].get("filter").is_none());
    }

    #[test]
    fn range_only_document_creates_must_branch() {
        let mut doc = SearchDocument::default();
        doc.filters
            .insert("year".into(), Filter::range(RangeBounds::between(1, 2)));
        let dsl = compile_query(&doc, &SearchConfig::default(), &default_text_fields()).unwrap();
        let bool_query = dsl.query.unwrap().bool_query;
        assert_eq!(bool_query.must.len(), 1);
        assert!(matches!(bool_query.must[0], MustClause::Range(_)));
        assert!(bool_query.filter.is_empty());
    }

    #[test]
    fn paging_and_sort_are_copied() {
        let doc = SearchDocument {
            sort: Some(SortSpec::field("year", SortDirection::Asc)),
            limit: 25,
            offset: 50,
            ..SearchDocument::default()
        };
        let body = compile(&doc, &SearchConfig::default());
        assert_eq!(body["from"], 50);
        assert_eq!(body["size"], 25);
        assert_eq!(body["sort"], json!({"year": "asc"}));
    }

    #[test]
    fn unknown_op_is_a_format_error() {
        let mut doc = SearchDocument::default();
        doc.filters
            .insert("genre".into(), Filter::keyword(KeywordOp::from("xor"), "map"));
        let err = compile_query(&doc, &SearchConfig::default(), &[]).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownFilterOp {
                attribute: "genre".into(),
                op: "xor".into()
            }
        );
    }

    #[test]
    fn empty_shapes_are_validation_errors() {
        let mut doc = SearchDocument::default();
        doc.filters
            .insert("year".into(), Filter::range(RangeBounds::default()));
        assert!(matches!(
            compile_query(&doc, &SearchConfig::default(), &[]),
            Err(CodecError::Validation { .. })
        ));

        let mut doc = SearchDocument::default();
        doc.filters.insert(
            "genre".into(),
            Filter::Keyword {
                op: KeywordOp::Or,
                value: Vec::new(),
            },
        );
        assert!(matches!(
            compile_query(&doc, &SearchConfig::default(), &[]),
            Err(CodecError::Validation { .. })
        ));
    }

    #[test]
    fn default_search_ignores_text_filters_and_offset() {
        let mut doc = SearchDocument {
            text: "rivers".into(),
            limit: 30,
            offset: 90,
            sort: Some(SortSpec::field("year", SortDirection::Desc)),
            ..SearchDocument::default()
        };
        doc.filters
            .insert("genre".into(), Filter::keyword(KeywordOp::Or, "map"));

        let body = serde_json::to_value(compile_default_search(&doc, &library_config())).unwrap();
        assert_eq!(body["from"], 0);
        assert_eq!(body["size"], 30);
        assert!(body.get("query").is_none());
        assert!(body.get("sort").is_none());
        assert_eq!(body["aggs"].as_object().unwrap().len(), 3);
    }
}
