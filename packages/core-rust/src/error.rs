//! Error types for the search document codec, compiler and mutations.

use thiserror::Error;

/// Broad error category, used by callers that only care whether the input was
/// unreadable or readable-but-invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input could not be parsed into the expected structure.
    Format,
    /// Input parsed, but its shape is not valid for the requested operation.
    Validation,
}

/// Errors raised synchronously by the codec, compiler and mutations.
///
/// None of these are retried; the document is never left partially mutated
/// when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A URL segment (text, filters, sort, limit, offset) could not be parsed.
    #[error("malformed {segment} segment: {reason}")]
    MalformedSegment {
        segment: &'static str,
        reason: String,
    },

    /// A keyword filter uses an op the compiler does not know.
    #[error("filter on `{attribute}` has unrecognized op `{op}`")]
    UnknownFilterOp { attribute: String, op: String },

    /// A filter value does not fit the filter kind.
    #[error("invalid filter on `{attribute}`: {reason}")]
    Validation { attribute: String, reason: String },
}

impl CodecError {
    pub(crate) fn malformed(segment: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedSegment {
            segment,
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedSegment { .. } | Self::UnknownFilterOp { .. } => ErrorKind::Format,
            Self::Validation { .. } => ErrorKind::Validation,
        }
    }
}

/// Errors raised while loading a [`SearchConfig`](crate::SearchConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read search config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid search config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(CodecError::malformed("limit", "x").kind(), ErrorKind::Format);
        assert_eq!(
            CodecError::UnknownFilterOp {
                attribute: "genre".into(),
                op: "xor".into()
            }
            .kind(),
            ErrorKind::Format
        );
        assert_eq!(
            CodecError::validation("year", "no bounds").kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn messages_name_the_offending_part() {
        let err = CodecError::malformed("filters", "expected an array");
        assert_eq!(err.to_string(), "malformed filters segment: expected an array");
    }
}
