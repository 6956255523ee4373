//! Span filtering and overlap resolution

use crate::policy::MaskingPolicy;
use lexmask_core::Span;
use std::cmp::Ordering;
use tracing::debug;

/// Turns the raw spans of one detector pass into a non-overlapping set
///
/// Spans below the policy threshold are dropped, labels are normalized onto
/// the vocabulary and filtered by the allowed types, and overlaps are settled
/// by preferring the earlier start, then the longer span, then the higher
/// confidence, then detector order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanResolver;

impl SpanResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve one pass, returning spans in ascending start order
    pub fn resolve(&self, spans: Vec<Span>, policy: &MaskingPolicy) -> Vec<Span> {
        let raw_count = spans.len();

        let mut candidates: Vec<(usize, Span)> = spans
            .into_iter()
            .filter(|span| span.confidence >= policy.confidence_threshold && !span.is_empty())
            .map(normalize)
            .filter(|span| policy.allows(&span.label))
            .enumerate()
            .collect();

        let eligible = candidates.len();

        candidates.sort_by(|(a_order, a), (b_order, b)| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.len().cmp(&a.len()))
                .then_with(|| {
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a_order.cmp(b_order))
        });

        let mut kept: Vec<Span> = Vec::with_capacity(candidates.len());
        for (_, span) in candidates {
            match kept.last() {
                Some(last) if last.overlaps(&span) => {
                    debug!(
                        "Dropping {} span {}..{} overlapping {} span {}..{}",
                        span.label, span.start, span.end, last.label, last.start, last.end
                    );
                }
                _ => kept.push(span),
            }
        }

        debug!(
            "Resolved {} raw spans into {} ({} below threshold or not allowed)",
            raw_count,
            kept.len(),
            raw_count - eligible
        );

        kept
    }
}

fn normalize(span: Span) -> Span {
    if span.label.is_canonical() {
        return span;
    }
    let label = span.label.normalized();
    Span { label, ..span }
}
