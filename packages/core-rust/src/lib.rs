//! searchdoc core: the search document model, its URL and query DSL
//! translations, and the mutations that keep it consistent.
//!
//! Everything in this crate is synchronous and free of I/O. The async session
//! that dispatches compiled queries lives in `searchdoc-client`.

pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod mutate;

pub use codec::{
    compile_default_search, compile_query, decode_segments, decode_url_path, encode_segments,
    encode_url_path, QueryDsl,
};
pub use config::{default_text_fields, FacetConfig, FacetType, SearchConfig, DEFAULT_TEXT_FIELDS};
pub use document::{
    Filter, KeywordOp, RangeBounds, SearchDocument, SortDirection, SortSpec, DEFAULT_LIMIT,
};
pub use error::{CodecError, ConfigError, ErrorKind};
pub use mutate::SortChange;

#[cfg(test)]
mod tests {
    use super::*;

    /// Deep link -> mutation -> deep link, through the public surface only.
    #[test]
    fn deep_link_survives_a_mutation() {
        let doc = decode_url_path("rivers/%5B%5B%22genre%22%2C%22or%22%2C%22map%22%5D%5D//10/20")
            .unwrap();
        assert_eq!(doc.offset, 20);

        let next = doc
            .append_keyword_filter("genre", "atlas", KeywordOp::Or)
            .unwrap();
        assert_eq!(
            encode_segments(&next)[1],
            r#"[["genre","or","map","atlas"]]"#
        );
        assert_eq!(encode_segments(&next)[4], "");

        let dsl = compile_query(&next, &SearchConfig::default(), &default_text_fields()).unwrap();
        assert_eq!(dsl.from, 0);
        assert_eq!(dsl.size, 10);
    }
}
