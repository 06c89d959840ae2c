//! Document state management and offset conversions
//!
//! Every offset exchanged by the engine is a zero-based UTF-16 code-unit index
//! into the document text, which is also how LSP counts `Position::character`.
//! [`TextIndex`] converts between those offsets, byte offsets into the Rust
//! string, char indices (as reported by the YAML scanner) and line/column pairs.

use tower_lsp::lsp_types::Position;

use crate::WorkflowDocument;

/// Represents the state of a text document
#[derive(Debug, Clone)]
pub struct Document {
    /// The document text content
    pub text: String,
    /// The document version
    pub version: i32,
    /// Result of the last validation pass over `text`
    pub parsed: Option<WorkflowDocument>,
}

impl Document {
    /// Create a new document with the given text and version
    pub fn new(text: String, version: i32) -> Self {
        Self {
            text,
            version,
            parsed: None,
        }
    }

    /// Convert an LSP position into a UTF-16 offset
    pub fn offset_at(&self, position: Position) -> usize {
        TextIndex::new(&self.text).offset(position.line, position.character)
    }

    /// Convert a UTF-16 offset into an LSP position
    pub fn position_at(&self, offset: usize) -> Position {
        let (line, character) = TextIndex::new(&self.text).position(offset);
        Position { line, character }
    }
}

/// Offset lookup tables for one text
#[derive(Debug, Clone)]
pub struct TextIndex<'a> {
    text: &'a str,
    /// UTF-16 offset of every char, plus one trailing entry for the end
    char_utf16: Vec<usize>,
    /// Byte offset of every char, plus one trailing entry for the end
    char_byte: Vec<usize>,
    /// UTF-16 offset of the first char of every line
    line_starts: Vec<usize>,
}

impl<'a> TextIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut char_utf16 = Vec::with_capacity(text.len() + 1);
        let mut char_byte = Vec::with_capacity(text.len() + 1);
        let mut line_starts = vec![0];
        let mut utf16 = 0;

        for (byte, ch) in text.char_indices() {
            char_utf16.push(utf16);
            char_byte.push(byte);
            utf16 += ch.len_utf16();
            if ch == '\n' {
                line_starts.push(utf16);
            }
        }
        char_utf16.push(utf16);
        char_byte.push(text.len());

        Self {
            text,
            char_utf16,
            char_byte,
            line_starts,
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Length of the text in UTF-16 code units
    pub fn len_utf16(&self) -> usize {
        self.char_utf16.last().copied().unwrap_or(0)
    }

    /// Number of chars in the text
    pub fn char_count(&self) -> usize {
        self.char_utf16.len() - 1
    }

    /// UTF-16 offset of the char at `index` (clamped to the end)
    pub fn utf16_of_char(&self, index: usize) -> usize {
        self.char_utf16[index.min(self.char_count())]
    }

    /// Char index containing the UTF-16 offset (rounded down inside surrogate pairs)
    pub fn char_of_utf16(&self, offset: usize) -> usize {
        match self.char_utf16.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index.saturating_sub(1),
        }
    }

    /// Byte offset of a UTF-16 offset (clamped to the end)
    pub fn byte_of_utf16(&self, offset: usize) -> usize {
        self.char_byte[self.char_of_utf16(offset.min(self.len_utf16()))]
    }

    /// Text between two UTF-16 offsets
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let start = self.byte_of_utf16(start);
        let end = self.byte_of_utf16(end).max(start);
        &self.text[start..end]
    }

    /// The char starting at a UTF-16 offset
    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.text[self.byte_of_utf16(offset)..].chars().next()
    }

    /// Zero-based (line, UTF-16 column) of an offset
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.len_utf16());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line - 1,
        };
        (line as u32, (offset - self.line_starts[line]) as u32)
    }

    /// UTF-16 offset of a (line, column) pair, clamped to the line and the text
    pub fn offset(&self, line: u32, character: u32) -> usize {
        let Some(&start) = self.line_starts.get(line as usize) else {
            return self.len_utf16();
        };
        let line_end = self
            .line_starts
            .get(line as usize + 1)
            .map(|next| next - 1)
            .unwrap_or_else(|| self.len_utf16());
        (start + character as usize).min(line_end)
    }

    /// Start offset of the line holding `offset`
    pub fn line_start(&self, offset: usize) -> usize {
        let (line, _) = self.position(offset);
        self.line_starts[line as usize]
    }

    /// Text of the line holding `offset`, up to `offset`
    pub fn line_before(&self, offset: usize) -> &'a str {
        self.slice(self.line_start(offset), offset)
    }

    /// Column of the first non-blank char on the line holding `offset`.
    ///
    /// Blank lines report the column of `offset` itself.
    pub fn indent_at(&self, offset: usize) -> u32 {
        let before = self.line_before(offset);
        let line_rest_start = self.byte_of_utf16(self.line_start(offset));
        let line = self.text[line_rest_start..]
            .split('\n')
            .next()
            .unwrap_or_default();
        match line.find(|c: char| c != ' ' && c != '\t') {
            Some(byte) if line[byte..].trim_end() != "" => {
                line[..byte].encode_utf16().count() as u32
            }
            _ => before.encode_utf16().count() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_round_trip_through_lines() {
        let index = TextIndex::new("on: push\njobs:\n  build:\n");
        assert_eq!(index.position(0), (0, 0));
        assert_eq!(index.position(9), (1, 0));
        assert_eq!(index.position(17), (2, 2));
        assert_eq!(index.offset(2, 2), 17);
        assert_eq!(index.offset(9, 0), index.len_utf16());
    }

    #[test]
    fn test_utf16_offsets_count_surrogate_pairs() {
        let index = TextIndex::new("a: 😀x");
        assert_eq!(index.len_utf16(), 6);
        assert_eq!(index.utf16_of_char(4), 5);
        assert_eq!(index.slice(3, 5), "😀");
        assert_eq!(index.char_at(5), Some('x'));
    }

    #[test]
    fn test_indent_and_line_prefix() {
        let text = "jobs:\n    \n  build:";
        let index = TextIndex::new(text);
        assert_eq!(index.indent_at(10), 4);
        assert_eq!(index.indent_at(13), 2);
        assert_eq!(index.line_before(13), "  ");
    }

    #[test]
    fn test_document_position_conversion() {
        let doc = Document::new("name: ci\non: push".to_string(), 1);
        let position = doc.position_at(12);
        assert_eq!(position, Position { line: 1, character: 3 });
        assert_eq!(doc.offset_at(position), 12);
    }
}
