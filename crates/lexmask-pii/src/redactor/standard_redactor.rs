//! Offset-preserving redactor

use crate::error::{PiiError, PiiResult};
use crate::policy::MaskRepresentation;
use crate::redactor::{Redaction, SpanRedactor};
use lexmask_core::{CharIndex, Span};

/// Replaces spans right to left so earlier offsets stay valid
pub struct StandardRedactor {
    representation: MaskRepresentation,
}

impl StandardRedactor {
    pub fn new(representation: MaskRepresentation) -> Self {
        Self { representation }
    }

    pub fn representation(&self) -> &MaskRepresentation {
        &self.representation
    }
}

impl SpanRedactor for StandardRedactor {
    fn redact(&self, text: &str, spans: &[Span]) -> PiiResult<Redaction> {
        if spans.is_empty() {
            return Ok(Redaction {
                masked_text: text.to_string(),
                entities: Vec::new(),
            });
        }

        let index = CharIndex::new(text);
        let mut ordered: Vec<&Span> = spans.iter().collect();
        ordered.sort_by(|a, b| b.start.cmp(&a.start).then_with(|| b.end.cmp(&a.end)));

        let mut masked = text.to_string();
        // start of the span replaced just before this one (to its right)
        let mut right_bound: Option<usize> = None;

        for span in ordered {
            if let Some(next_start) = right_bound
                && span.end > next_start
            {
                return Err(invariant_violation(PiiError::OverlappingSpans {
                    start: span.start,
                    end: span.end,
                    next_start,
                }));
            }

            let found = index.slice(span.start, span.end).unwrap_or_default();
            if span.is_empty() || found != span.matched_text {
                return Err(invariant_violation(PiiError::SpanMismatch {
                    start: span.start,
                    end: span.end,
                    expected: span.matched_text.clone(),
                    found: found.to_string(),
                }));
            }

            let (Some(start_byte), Some(end_byte)) =
                (index.byte_offset(span.start), index.byte_offset(span.end))
            else {
                return Err(invariant_violation(PiiError::SpanMismatch {
                    start: span.start,
                    end: span.end,
                    expected: span.matched_text.clone(),
                    found: String::new(),
                }));
            };

            let replacement = self.representation.replacement(&span.label, span.len());
            masked.replace_range(start_byte..end_byte, &replacement);
            right_bound = Some(span.start);
        }

        let mut entities = spans.to_vec();
        entities.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)));

        Ok(Redaction {
            masked_text: masked,
            entities,
        })
    }
}

fn invariant_violation(err: PiiError) -> PiiError {
    if cfg!(debug_assertions) {
        panic!("redaction invariant violated: {}", err);
    }
    err
}
