//! Search document <-> URL segment codec.
//!
//! A document is carried in exactly five positional segments, in the fixed
//! order `text / filters / sort / limit / offset`. The format is shared with
//! existing deep links and must stay bit-exact:
//!
//! - `text` is the raw query text;
//! - `filters` is a JSON array of `[attribute, opOrType, ...values]` entries,
//!   `[]` when there are none;
//! - `sort` is the JSON sort spec, empty when unset;
//! - `limit` and `offset` are decimal integers, empty when zero. A limit of
//!   `0` is not a page size and decodes to the default, like an empty one;
//! - range bounds are JSON numbers written the way `JSON.stringify` writes
//!   them, so an integral float such as `1e3` or `1000.0` becomes `1000`.
//!   Non-integral and out-of-safe-range floats are kept as floats.
//!
//! In path form each segment is percent-encoded with the `encodeURIComponent`
//! character set and the segments are joined with `/`.

use indexmap::IndexMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Number, Value};

use crate::document::{
    Filter, KeywordOp, RangeBounds, SearchDocument, SortSpec, DEFAULT_LIMIT, RANGE_MARKER,
};
use crate::error::CodecError;

/// Number of positional segments in the URL form.
pub const URL_SEGMENT_COUNT: usize = 5;

/// Separator between segments in path form.
pub const URL_DELIMITER: char = '/';

/// Characters left unescaped by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Builds a document from already percent-decoded URL segments.
///
/// Missing trailing segments take their defaults (`""`, `{}`, no sort, limit
/// 10, offset 0); an empty segment defaults the same way. Segments past the
/// fifth are ignored.
///
/// # Errors
///
/// Returns [`CodecError::MalformedSegment`] if the filters or sort segment is
/// not valid JSON of the expected shape, or limit/offset is not a
/// non-negative integer.
pub fn decode_segments<S: AsRef<str>>(segments: &[S]) -> Result<SearchDocument, CodecError> {
    let mut document = SearchDocument::default();

    if segments.len() > URL_SEGMENT_COUNT {
        tracing::trace!(
            extra = segments.len() - URL_SEGMENT_COUNT,
            "ignoring trailing url segments"
        );
    }

    for (index, segment) in segments.iter().take(URL_SEGMENT_COUNT).enumerate() {
        let part = segment.as_ref();
        match index {
            0 => document.text = part.to_string(),
            1 => document.filters = parse_filters(part)?,
            2 => document.sort = parse_sort(part)?,
            3 => {
                document.limit = parse_count("limit", part)?
                    .filter(|&limit| limit != 0)
                    .unwrap_or(DEFAULT_LIMIT);
            }
            _ => document.offset = parse_count("offset", part)?.unwrap_or(0),
        }
    }

    Ok(document)
}

/// Builds a document from a `/`-joined, percent-encoded path.
///
/// # Errors
///
/// Returns [`CodecError::MalformedSegment`] if a segment does not decode to
/// UTF-8, plus every error of [`decode_segments`].
pub fn decode_url_path(path: &str) -> Result<SearchDocument, CodecError> {
    let segments = path
        .split(URL_DELIMITER)
        .enumerate()
        .map(|(index, raw)| {
            percent_decode_str(raw)
                .decode_utf8()
                .map(|decoded| decoded.into_owned())
                .map_err(|e| CodecError::malformed(segment_name(index), e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    decode_segments(&segments)
}

fn segment_name(index: usize) -> &'static str {
    match index {
        0 => "text",
        1 => "filters",
        2 => "sort",
        3 => "limit",
        4 => "offset",
        _ => "trailing",
    }
}

fn parse_filters(part: &str) -> Result<IndexMap<String, Filter>, CodecError> {
    let mut filters = IndexMap::new();
    if part.is_empty() {
        return Ok(filters);
    }

    let entries: Vec<Vec<Value>> = serde_json::from_str(part)
        .map_err(|e| CodecError::malformed("filters", format!("expected an array of arrays: {e}")))?;

    for entry in entries {
        let mut items = entry.into_iter();
        let (Some(Value::String(attribute)), Some(Value::String(marker))) =
            (items.next(), items.next())
        else {
            return Err(CodecError::malformed(
                "filters",
                "each entry must start with an attribute name and an op",
            ));
        };

        let filter = if marker == RANGE_MARKER {
            let bounds = items.next().ok_or_else(|| {
                CodecError::malformed("filters", format!("range filter on `{attribute}` has no bounds"))
            })?;
            let bounds: RangeBounds = serde_json::from_value(bounds).map_err(|e| {
                CodecError::malformed("filters", format!("range filter on `{attribute}`: {e}"))
            })?;
            Filter::Range {
                value: integral_bounds(bounds),
            }
        } else {
            let value = items
                .map(|item| match item {
                    Value::String(value) => Ok(value),
                    other => Err(CodecError::malformed(
                        "filters",
                        format!("keyword filter on `{attribute}` has non-string value `{other}`"),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Filter::Keyword {
                op: KeywordOp::from(marker),
                value,
            }
        };

        filters.insert(attribute, filter);
    }

    Ok(filters)
}

fn parse_sort(part: &str) -> Result<Option<SortSpec>, CodecError> {
    if part.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(part)
        .map_err(|e| CodecError::malformed("sort", e.to_string()))?;
    SortSpec::from_value(value).map(Some)
}

fn parse_count(segment: &'static str, part: &str) -> Result<Option<u32>, CodecError> {
    if part.is_empty() {
        return Ok(None);
    }
    part.parse::<u32>()
        .map(Some)
        .map_err(|e| CodecError::malformed(segment, format!("`{part}`: {e}")))
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Renders a document as its five raw (not yet percent-encoded) segments.
#[must_use]
pub fn encode_segments(document: &SearchDocument) -> [String; URL_SEGMENT_COUNT] {
    let filters: Vec<Value> = document
        .filters
        .iter()
        .map(|(attribute, filter)| {
            let mut entry = vec![
                Value::String(attribute.clone()),
                Value::String(filter.url_marker().to_string()),
            ];
            match filter {
                Filter::Keyword { value, .. } => {
                    entry.extend(value.iter().cloned().map(Value::String));
                }
                Filter::Range { value } => entry.push(range_value(value)),
            }
            Value::Array(entry)
        })
        .collect();

    [
        document.text.clone(),
        Value::Array(filters).to_string(),
        document
            .sort
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        count_segment(document.limit),
        count_segment(document.offset),
    ]
}

/// Renders a document as a percent-encoded, `/`-joined path.
#[must_use]
pub fn encode_url_path(document: &SearchDocument) -> String {
    encode_segments(document)
        .iter()
        .map(|segment| utf8_percent_encode(segment, URI_COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join(&URL_DELIMITER.to_string())
}

fn range_value(bounds: &RangeBounds) -> Value {
    let mut map = serde_json::Map::new();
    for (key, bound) in [
        ("gte", &bounds.gte),
        ("lte", &bounds.lte),
        ("gt", &bounds.gt),
        ("lt", &bounds.lt),
    ] {
        if let Some(number) = bound {
            map.insert(key.to_string(), Value::Number(integral_number(number)));
        }
    }
    Value::Object(map)
}

/// Largest integer a JS number holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Rewrites an integral float as an integer, as `JSON.stringify` prints it.
fn integral_number(number: &Number) -> Number {
    match number.as_f64() {
        Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER => {
            #[allow(clippy::cast_possible_truncation)]
            let integer = float as i64;
            Number::from(integer)
        }
        _ => number.clone(),
    }
}

fn integral_bounds(bounds: RangeBounds) -> RangeBounds {
    let normalize = |bound: Option<Number>| bound.as_ref().map(integral_number);
    RangeBounds {
        gte: normalize(bounds.gte),
        lte: normalize(bounds.lte),
        gt: normalize(bounds.gt),
        lt: normalize(bounds.lt),
    }
}

fn count_segment(count: u32) -> String {
    if count == 0 {
        String::new()
    } else {
        count.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::document::SortDirection;

    fn rivers_document() -> SearchDocument {
        let mut doc = SearchDocument {
            text: "rivers".into(),
            ..SearchDocument::default()
        };
        doc.filters
            .insert("genre".into(), Filter::keyword(KeywordOp::Or, "map"));
        doc
    }

    #[test]
    fn encodes_rivers_scenario() {
        let segments = encode_segments(&rivers_document());
        assert_eq!(
            segments,
            [
                "rivers".to_string(),
                r#"[["genre","or","map"]]"#.to_string(),
                String::new(),
                "10".to_string(),
                String::new(),
            ]
        );
    }

    #[test]
    fn empty_filters_encode_as_empty_array() {
        let segments = encode_segments(&SearchDocument::default());
        assert_eq!(segments[1], "[]");
    }

    #[test]
    fn path_form_percent_encodes_like_encode_uri_component() {
        let path = encode_url_path(&rivers_document());
        assert_eq!(path, "rivers/%5B%5B%22genre%22%2C%22or%22%2C%22map%22%5D%5D//10/");

        let doc = SearchDocument {
            text: "a/b c(d)".into(),
            ..SearchDocument::default()
        };
        assert!(encode_url_path(&doc).starts_with("a%2Fb%20c(d)/"));
    }

    #[test]
    fn range_filters_flatten_to_one_bound_object() {
        let mut doc = SearchDocument::default();
        doc.filters
            .insert("year".into(), Filter::range(RangeBounds::between(1931, 1960)));
        let segments = encode_segments(&doc);
        assert_eq!(segments[1], r#"[["year","range",{"gte":1931,"lte":1960}]]"#);

        let decoded = decode_segments(&segments).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn decodes_missing_segments_to_defaults() {
        let doc = decode_segments::<&str>(&[]).unwrap();
        assert_eq!(doc, SearchDocument::default());

        let doc = decode_segments(&["maps"]).unwrap();
        assert_eq!(doc.text, "maps");
        assert_eq!(doc.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn decodes_empty_segments_to_defaults() {
        let doc = decode_segments(&["", "", "", "", ""]).unwrap();
        assert_eq!(doc, SearchDocument::default());
    }

    #[test]
    fn ignores_extra_trailing_segments() {
        let doc = decode_segments(&["x", "[]", "", "20", "40", "junk", "more"]).unwrap();
        assert_eq!(doc.limit, 20);
        assert_eq!(doc.offset, 40);
    }

    #[test]
    fn decodes_all_segments() {
        let doc = decode_segments(&[
            "rivers",
            r#"[["genre","and","map","atlas"],["year","range",{"gte":1900}]]"#,
            r#"{"year":"desc"}"#,
            "25",
            "50",
        ])
        .unwrap();

        assert_eq!(doc.text, "rivers");
        assert_eq!(
            doc.filters["genre"],
            Filter::Keyword {
                op: KeywordOp::And,
                value: vec!["map".into(), "atlas".into()],
            }
        );
        assert_eq!(
            doc.filters["year"],
            Filter::Range {
                value: RangeBounds {
                    gte: Some(1900.into()),
                    ..RangeBounds::default()
                }
            }
        );
        assert_eq!(doc.sort, Some(SortSpec::field("year", SortDirection::Desc)));
        assert_eq!(doc.limit, 25);
        assert_eq!(doc.offset, 50);
    }

    #[test]
    fn unknown_op_passes_through_as_keyword() {
        let doc = decode_segments(&["", r#"[["genre","not","map"]]"#]).unwrap();
        assert_eq!(
            doc.filters["genre"],
            Filter::Keyword {
                op: KeywordOp::Other("not".into()),
                value: vec!["map".into()],
            }
        );
        assert_eq!(encode_segments(&doc)[1], r#"[["genre","not","map"]]"#);
    }

    #[test]
    fn rejects_malformed_filters() {
        for bad in [
            "not json",
            r#"{"genre":"map"}"#,
            r#"[["genre"]]"#,
            r#"[[1,"or","map"]]"#,
            r#"[["genre","or",5]]"#,
            r#"[["year","range"]]"#,
            r#"[["year","range",1931]]"#,
        ] {
            let err = decode_segments(&["", bad]).unwrap_err();
            assert!(
                matches!(err, CodecError::MalformedSegment { segment: "filters", .. }),
                "expected filters error for {bad}, got {err:?}"
            );
        }
    }

    #[test]
    fn rejects_malformed_sort_and_counts() {
        assert!(matches!(
            decode_segments(&["", "", "{broken"]),
            Err(CodecError::MalformedSegment { segment: "sort", .. })
        ));
        assert!(matches!(
            decode_segments(&["", "", "42"]),
            Err(CodecError::MalformedSegment { segment: "sort", .. })
        ));
        assert!(matches!(
            decode_segments(&["", "", "", "ten"]),
            Err(CodecError::MalformedSegment { segment: "limit", .. })
        ));
        assert!(matches!(
            decode_segments(&["", "", "", "", "-1"]),
            Err(CodecError::MalformedSegment { segment: "offset", .. })
        ));
    }

    #[test]
    fn path_round_trips_rivers_scenario() {
        let doc = rivers_document();
        assert_eq!(decode_url_path(&encode_url_path(&doc)).unwrap(), doc);
    }

    #[test]
    fn path_rejects_invalid_utf8() {
        let err = decode_url_path("%FF/[]").unwrap_err();
        assert!(matches!(err, CodecError::MalformedSegment { segment: "text", .. }));
    }

    #[test]
    fn native_sort_array_round_trips() {
        let doc = SearchDocument {
            sort: Some(SortSpec::from_value(json!([{"year": {"order": "asc"}}, "_score"])).unwrap()),
            ..SearchDocument::default()
        };
        assert_eq!(decode_segments(&encode_segments(&doc)).unwrap(), doc);
    }

    #[test]
    fn zero_limit_decodes_to_default_page_size() {
        let doc = decode_segments(&["", "", "", "0", "0"]).unwrap();
        assert_eq!(doc.limit, DEFAULT_LIMIT);
        assert_eq!(doc.offset, 0);
        assert_eq!(decode_segments(&encode_segments(&doc)).unwrap(), doc);
    }

    #[test]
    fn integral_float_bounds_encode_as_integers() {
        let doc = decode_segments(&["", r#"[["year","range",{"gte":1e3,"lte":1999.0,"lt":2.5}]]"#])
            .unwrap();
        let segments = encode_segments(&doc);
        assert_eq!(
            segments[1],
            r#"[["year","range",{"gte":1000,"lte":1999,"lt":2.5}]]"#
        );
        assert_eq!(decode_segments(&segments).unwrap(), doc);

        let built = SearchDocument {
            filters: [(
                "year".to_string(),
                Filter::range(RangeBounds {
                    gte: Number::from_f64(1931.0),
                    ..RangeBounds::default()
                }),
            )]
            .into_iter()
            .collect(),
            ..SearchDocument::default()
        };
        assert_eq!(encode_segments(&built)[1], r#"[["year","range",{"gte":1931}]]"#);
    }

    // ---- Round-trip property ----

    fn arb_filter() -> impl Strategy<Value = Filter> {
        prop_oneof![
            (
                prop_oneof![Just(KeywordOp::Or), Just(KeywordOp::And)],
                prop::collection::vec("\\PC{0,12}", 1..4),
            )
                .prop_map(|(op, value)| Filter::Keyword { op, value }),
            (
                prop::option::of(-10_000i64..10_000),
                prop::option::of(-10_000i64..10_000),
                prop::option::of(any::<u32>()),
            )
                .prop_filter("at least one bound", |(a, b, c)| {
                    a.is_some() || b.is_some() || c.is_some()
                })
                .prop_map(|(gte, lte, lt)| Filter::Range {
                    value: RangeBounds {
                        gte: gte.map(Into::into),
                        lte: lte.map(Into::into),
                        gt: None,
                        lt: lt.map(Into::into),
                    },
                }),
        ]
    }

    fn arb_document() -> impl Strategy<Value = SearchDocument> {
        (
            "\\PC{0,24}",
            prop::collection::vec(("[a-z_]{1,10}", arb_filter()), 0..5),
            prop::option::of((
                "[a-z]{1,8}",
                prop_oneof![Just(SortDirection::Asc), Just(SortDirection::Desc)],
            )),
            1u32..500,
            0u32..10_000,
        )
            .prop_map(|(text, filters, sort, limit, offset)| SearchDocument {
                text,
                filters: filters.into_iter().collect(),
                sort: sort.map(|(attribute, direction)| SortSpec::field(attribute, direction)),
                limit,
                offset,
            })
    }

    proptest! {
        #[test]
        fn segments_round_trip(doc in arb_document()) {
            let decoded = decode_segments(&encode_segments(&doc)).unwrap();
            prop_assert_eq!(decoded, doc);
        }

        #[test]
        fn path_round_trips(doc in arb_document()) {
            let decoded = decode_url_path(&encode_url_path(&doc)).unwrap();
            prop_assert_eq!(decoded, doc);
        }
    }
}
