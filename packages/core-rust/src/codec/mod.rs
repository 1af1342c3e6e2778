//! Pure translations of a [`SearchDocument`](crate::SearchDocument):
//! to and from its URL form, and into the backend query body.

pub mod dsl;
pub mod url;

pub use dsl::{
    aggregations, compile_default_search, compile_query, Aggregation, BoolQuery,
    FieldAggregation, FilterClause, MultiMatch, MustClause, Query, QueryDsl, TermsAggregation,
    TERMS_AGG_SIZE,
};
pub use url::{
    decode_segments, decode_url_path, encode_segments, encode_url_path, URL_DELIMITER,
    URL_SEGMENT_COUNT,
};
