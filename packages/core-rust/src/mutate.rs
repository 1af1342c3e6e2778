//! Document mutations driven by user actions.
//!
//! Every mutation borrows the current document and returns the next one, so
//! a failed mutation leaves the caller's document untouched. Any change to
//! text, filters or sort moves the page start back to 0; only
//! [`SearchDocument::set_paging`] changes `offset`.
//!
//! Removing an attribute or value that is not present returns an equal
//! document, offset included.

use crate::document::{Filter, KeywordOp, RangeBounds, SearchDocument, SortDirection, SortSpec};
use crate::error::CodecError;

/// Requested change to the document's sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortChange {
    /// Remove the sort; the backend orders results.
    Clear,
    /// Use an engine-native sort spec as-is.
    Spec(SortSpec),
    /// Sort on one attribute. An empty attribute clears the sort; a missing
    /// direction leaves the current sort in place.
    Attribute {
        attribute: String,
        direction: Option<SortDirection>,
    },
}

impl SortChange {
    /// Single-attribute sort in the given direction.
    #[must_use]
    pub fn by(attribute: impl Into<String>, direction: SortDirection) -> Self {
        Self::Attribute {
            attribute: attribute.into(),
            direction: Some(direction),
        }
    }
}

impl SearchDocument {
    fn reset_page(mut self) -> Self {
        self.offset = 0;
        self
    }

    /// Replaces the free-text query.
    #[must_use]
    pub fn set_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
        .reset_page()
    }

    /// Clears the text and every filter.
    #[must_use]
    pub fn clear_filters(&self) -> Self {
        let mut next = self.clone();
        next.text.clear();
        next.filters.clear();
        next.reset_page()
    }

    /// Adds `value` to the keyword filter on `attribute`, creating the filter
    /// with `op` if the attribute has none. An existing filter keeps its op.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Validation`] if the attribute holds a range
    /// filter.
    pub fn append_keyword_filter(
        &self,
        attribute: &str,
        value: impl Into<String>,
        op: KeywordOp,
    ) -> Result<Self, CodecError> {
        let mut next = self.clone();
        match next.filters.get_mut(attribute) {
            None => {
                next.filters
                    .insert(attribute.to_string(), Filter::keyword(op, value));
            }
            Some(Filter::Keyword { value: values, .. }) => values.push(value.into()),
            Some(Filter::Range { .. }) => {
                return Err(CodecError::validation(
                    attribute,
                    "cannot append a keyword value to a range filter",
                ));
            }
        }
        Ok(next.reset_page())
    }

    /// Replaces whatever filter `attribute` holds with a single-value keyword
    /// filter.
    #[must_use]
    pub fn set_keyword_filter(&self, attribute: &str, value: impl Into<String>, op: KeywordOp) -> Self {
        let mut next = self.clone();
        next.filters
            .insert(attribute.to_string(), Filter::keyword(op, value));
        next.reset_page()
    }

    /// Removes one value from the keyword filter on `attribute`, dropping the
    /// filter once it has no values. With `value` of `None` the whole filter
    /// is dropped.
    #[must_use]
    pub fn remove_keyword_filter(&self, attribute: &str, value: Option<&str>) -> Self {
        if !self.filters.contains_key(attribute) {
            return self.clone();
        }

        let mut next = self.clone();
        match value {
            None => {
                next.filters.shift_remove(attribute);
            }
            Some(value) => {
                let Some(Filter::Keyword { value: values, .. }) = next.filters.get_mut(attribute)
                else {
                    return self.clone();
                };
                let Some(index) = values.iter().position(|v| v == value) else {
                    return self.clone();
                };
                values.remove(index);
                if values.is_empty() {
                    next.filters.shift_remove(attribute);
                }
            }
        }
        next.reset_page()
    }

    /// Sets the range filter on `attribute`, replacing any previous filter.
    #[must_use]
    pub fn append_range_filter(&self, attribute: &str, bounds: RangeBounds) -> Self {
        let mut next = self.clone();
        next.filters
            .insert(attribute.to_string(), Filter::range(bounds));
        next.reset_page()
    }

    /// Drops the filter on `attribute`.
    #[must_use]
    pub fn remove_range_filter(&self, attribute: &str) -> Self {
        if !self.filters.contains_key(attribute) {
            return self.clone();
        }
        let mut next = self.clone();
        next.filters.shift_remove(attribute);
        next.reset_page()
    }

    /// Applies a sort change.
    #[must_use]
    pub fn set_sort(&self, change: SortChange) -> Self {
        let mut next = self.clone();
        match change {
            SortChange::Clear => next.sort = None,
            SortChange::Spec(spec) => next.sort = Some(spec),
            SortChange::Attribute { attribute, .. } if attribute.is_empty() => next.sort = None,
            SortChange::Attribute {
                attribute,
                direction: Some(direction),
            } => next.sort = Some(SortSpec::field(attribute, direction)),
            SortChange::Attribute {
                direction: None, ..
            } => {}
        }
        next.reset_page()
    }

    /// Moves the page window. A `limit` of 0 keeps the current page size.
    #[must_use]
    pub fn set_paging(&self, offset: u32, limit: u32) -> Self {
        let mut next = self.clone();
        next.offset = offset;
        if limit != 0 {
            next.limit = limit;
        }
        next
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
