//! Offsets of chained passes, mapped back to the input text

/// One replacement made by an earlier pass, in input coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Replacement {
    start: usize,
    end: usize,
    len: usize,
}

/// Replacements applied to the input so far, ordered by input start
///
/// A later pass sees text in which each recorded `start..end` range has been
/// swapped for `len` characters. Offsets outside those ranges translate by
/// the accumulated length difference.
#[derive(Debug, Clone, Default)]
pub(crate) struct OffsetMap {
    replacements: Vec<Replacement>,
}

impl OffsetMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Map `start..end` of the current text back to the input
    ///
    /// Returns `None` when the range touches replaced text.
    pub(crate) fn to_original(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let mut grown = 0usize;
        let mut shrunk = 0usize;

        for r in &self.replacements {
            let current_start = (r.start + grown).checked_sub(shrunk)?;
            let current_end = current_start + r.len;
            if end <= current_start {
                break;
            }
            if start < current_end {
                return None;
            }
            let replaced = r.end - r.start;
            if r.len > replaced {
                grown += r.len - replaced;
            } else {
                shrunk += replaced - r.len;
            }
        }

        let original_start = (start + shrunk).checked_sub(grown)?;
        let original_end = (end + shrunk).checked_sub(grown)?;
        Some((original_start, original_end))
    }

    /// Record a replacement of the input range `start..end` by `len` characters
    pub(crate) fn record(&mut self, start: usize, end: usize, len: usize) {
        let at = self.replacements.partition_point(|r| r.start < start);
        self.replacements.insert(at, Replacement { start, end, len });
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}
