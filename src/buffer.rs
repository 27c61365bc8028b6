//! The immutable backing store for one contiguous run of ingested text.

use crate::char_class::{read_line_starts, EolStats};
use crate::piece::BufferCursor;

/// One immutable (modulo `append`, which only ever grows it) store of UTF-8
/// text plus the byte offsets of every line start within it.
///
/// `buffers[0]` is the *original* buffer (the document as first built);
/// `buffers[1]`, created lazily, is the sole *added* buffer every later
/// insert appends to. Both are represented by this same type.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    pub content: String,
    pub line_starts: Vec<usize>,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            content: String::new(),
            line_starts: vec![0],
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        let content = text.into();
        let (line_starts, _) = read_line_starts(&content);
        Self {
            content,
            line_starts,
        }
    }

    /// Appends `text` to this buffer, extending `line_starts` in place.
    /// Returns the terminator tally of the appended slice alone (used by
    /// callers that need to know what the newly appended text contributed).
    pub fn append(&mut self, text: &str) -> EolStats {
        let base = self.content.len();
        let (new_starts, stats) = read_line_starts(text);
        self.line_starts
            .extend(new_starts.into_iter().skip(1).map(|o| o + base));
        self.content.push_str(text);
        stats
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn slice(&self, start: usize, end: usize) -> &str {
        &self.content[start..end]
    }

    /// Converts a buffer-local cursor into a byte offset into `content`.
    pub fn offset_at_cursor(&self, cursor: BufferCursor) -> usize {
        self.line_starts[cursor.line] + cursor.column
    }

    /// Converts a byte offset into `content` into a buffer-local cursor.
    pub fn position_at_offset(&self, offset: usize) -> BufferCursor {
        let line = self.line_starts.partition_point(|&o| o <= offset) - 1;
        BufferCursor::new(line, offset - self.line_starts[line])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_empty_with_one_line() {
        let buf = Buffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.line_count(), 1);
    }

    #[test]
    fn from_text_scans_line_starts() {
        let buf = Buffer::from_text("ab\ncd\r\nef");
        assert_eq!(buf.line_starts, vec![0, 3, 7]);
        assert_eq!(buf.line_count(), 3);
    }

    #[test]
    fn append_extends_line_starts_by_base_offset() {
        let mut buf = Buffer::from_text("ab\n");
        let stats = buf.append("cd\n");
        assert_eq!(buf.content, "ab\ncd\n");
        assert_eq!(buf.line_starts, vec![0, 3, 6]);
        assert_eq!(stats.lf, 1);
    }

    #[test]
    fn cursor_offset_round_trip() {
        let buf = Buffer::from_text("ab\ncd\r\nef");
        let cursor = buf.position_at_offset(5);
        assert_eq!(cursor, BufferCursor::new(1, 2));
        assert_eq!(buf.offset_at_cursor(cursor), 5);
    }

    #[test]
    fn position_at_offset_at_exact_line_start() {
        let buf = Buffer::from_text("ab\ncd");
        assert_eq!(buf.position_at_offset(3), BufferCursor::new(1, 0));
    }
}
