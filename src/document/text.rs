//! Byte offset <-> LSP position conversion.
//!
//! LSP positions count columns in UTF-16 code units while every range the
//! segmenter produces is a byte offset into the UTF-8 text.

use std::ops::Range as Span;
use std::sync::Arc;

use tower_lsp::lsp_types::{Position, Range};

/// Line start table over a shared document text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
    text: Arc<str>,
}

impl LineIndex {
    pub fn new(text: Arc<str>) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { line_starts, text }
    }

    /// Byte span of `line`, excluding its terminating newline.
    fn line_span(&self, line: usize) -> Span<usize> {
        let start = self.line_starts[line];
        let end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        start..end
    }

    /// Convert a byte offset to an LSP position. Offsets past the end clamp
    /// to the end of the text.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = self.line_starts.partition_point(|&s| s <= offset) - 1;
        let span = self.line_span(line);

        let character = self.text[span.start..offset.min(span.end).max(span.start)]
            .chars()
            .map(|c| c.len_utf16() as u32)
            .sum();

        Position::new(line as u32, character)
    }

    /// Convert an LSP position to a byte offset.
    ///
    /// Returns `None` for a line past the end of the document; a column past
    /// the end of its line clamps to the line end.
    pub fn position_to_offset(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        if line >= self.line_starts.len() {
            return None;
        }
        let span = self.line_span(line);

        let mut utf16 = 0u32;
        for (i, c) in self.text[span.clone()].char_indices() {
            if utf16 >= position.character {
                return Some(span.start + i);
            }
            utf16 += c.len_utf16() as u32;
        }
        Some(span.end)
    }

    pub fn span_to_range(&self, span: &Span<usize>) -> Range {
        Range::new(
            self.offset_to_position(span.start),
            self.offset_to_position(span.end),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl LineIndex {
        fn line_count(&self) -> usize {
            self.line_starts.len()
        }
    }

    fn index(text: &str) -> LineIndex {
        LineIndex::new(Arc::from(text))
    }

    #[test]
    fn positions_across_lines() {
        let idx = index("<template>\n  <div/>\n</template>");
        assert_eq!(idx.line_count(), 3);
        assert_eq!(idx.offset_to_position(0), Position::new(0, 0));
        assert_eq!(idx.offset_to_position(10), Position::new(0, 10));
        assert_eq!(idx.offset_to_position(11), Position::new(1, 0));
        assert_eq!(idx.offset_to_position(13), Position::new(1, 2));
        assert_eq!(idx.position_to_offset(Position::new(2, 0)), Some(20));
        assert_eq!(idx.position_to_offset(Position::new(1, 99)), Some(19));
        assert_eq!(idx.position_to_offset(Position::new(3, 0)), None);
    }

    #[test]
    fn utf16_columns() {
        // U+1F600 takes four bytes and two UTF-16 units.
        let idx = index("a\u{1F600}b");
        assert_eq!(idx.offset_to_position(5), Position::new(0, 3));
        assert_eq!(idx.position_to_offset(Position::new(0, 3)), Some(5));
        assert_eq!(idx.position_to_offset(Position::new(0, 1)), Some(1));
    }

    #[test]
    fn offsets_past_end_clamp() {
        let idx = index("ab\ncd");
        assert_eq!(idx.offset_to_position(100), Position::new(1, 2));
    }

    #[test]
    fn span_converts_to_range() {
        let idx = index("hello\nworld");
        let range = idx.span_to_range(&(6..11));
        assert_eq!(range, Range::new(Position::new(1, 0), Position::new(1, 5)));
    }
}
