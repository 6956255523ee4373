//! Span redaction

mod standard_redactor;

pub use standard_redactor::StandardRedactor;

use crate::error::PiiResult;
use lexmask_core::Span;
use serde::Serialize;

/// Result of redacting one text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Redaction {
    /// Text with every span replaced
    pub masked_text: String,

    /// The redacted spans in ascending offset order
    pub entities: Vec<Span>,
}

/// Trait for applying resolved spans to text
pub trait SpanRedactor: Send + Sync {
    /// Replace every span in `text`
    ///
    /// Spans must be non-overlapping and their offsets must refer to `text`.
    fn redact(&self, text: &str, spans: &[Span]) -> PiiResult<Redaction>;
}
