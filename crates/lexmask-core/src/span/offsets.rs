//! Character offset bookkeeping
//!
//! Spans are reported in character offsets while Rust strings slice by byte.
//! `CharIndex` translates between the two for one piece of text.

/// Character-to-byte offset table for a single text
#[derive(Debug, Clone)]
pub struct CharIndex<'a> {
    text: &'a str,
    // byte offset of every char boundary, including text.len() at the end
    boundaries: Vec<usize>,
}

impl<'a> CharIndex<'a> {
    /// Build the offset table for `text`
    pub fn new(text: &'a str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(byte, _)| byte).collect();
        boundaries.push(text.len());
        Self { text, boundaries }
    }

    /// The indexed text
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Number of characters in the text
    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Byte offset of a character offset (`char_len()` maps to `text.len()`)
    pub fn byte_offset(&self, char_offset: usize) -> Option<usize> {
        self.boundaries.get(char_offset).copied()
    }

    /// Character offset of a byte offset that lies on a char boundary
    pub fn char_offset(&self, byte_offset: usize) -> Option<usize> {
        self.boundaries.binary_search(&byte_offset).ok()
    }

    /// Slice the text by character offsets
    pub fn slice(&self, start: usize, end: usize) -> Option<&'a str> {
        if start > end {
            return None;
        }
        let start_byte = self.byte_offset(start)?;
        let end_byte = self.byte_offset(end)?;
        self.text.get(start_byte..end_byte)
    }
}
