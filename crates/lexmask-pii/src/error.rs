//! Error types for the masking pipeline

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PiiError {
    /// Empty or whitespace-only input
    #[error("Text cannot be empty")]
    EmptyText,

    /// Input above the configured character cap
    #[error("Text too long (max {max} characters, got {len})")]
    TextTooLong { len: usize, max: usize },

    /// Policy that cannot be applied
    #[error("Invalid masking policy: {0}")]
    InvalidPolicy(String),

    /// Pattern that failed to compile
    #[error("Invalid pattern for {label}: {source}")]
    Pattern {
        label: String,
        #[source]
        source: regex::Error,
    },

    /// Span offsets no longer match the text they were detected in
    #[error("Span {start}..{end} expected {expected:?} but text holds {found:?}")]
    SpanMismatch {
        start: usize,
        end: usize,
        expected: String,
        found: String,
    },

    /// Two spans of the same pass reached the redactor overlapping
    #[error("Span {start}..{end} overlaps an already redacted span starting at {next_start}")]
    OverlappingSpans {
        start: usize,
        end: usize,
        next_start: usize,
    },
}

impl PiiError {
    /// Whether the error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PiiError::EmptyText | PiiError::TextTooLong { .. } | PiiError::InvalidPolicy(_)
        )
    }
}

pub type PiiResult<T> = std::result::Result<T, PiiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(PiiError::EmptyText.is_client_error());
        assert!(PiiError::TextTooLong { len: 11, max: 10 }.is_client_error());
        assert!(
            !PiiError::OverlappingSpans {
                start: 0,
                end: 4,
                next_start: 2
            }
            .is_client_error()
        );
    }
}
