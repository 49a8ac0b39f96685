//! Byte-offset to line/column conversion, and the source-text wrapper used
//! throughout the grammar engine.
//!
//! Positions are carried as raw byte offsets during matching (cheap to
//! compare and to save/restore around predicates); they are converted to
//! 1-based line/column pairs only at the edges — when an `AstNode` leaf is
//! built or when a structured error is constructed.

use once_cell::unsync::OnceCell;
use std::fmt::{Display, Formatter};

/// A 1-based line and column in a source text.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A source text together with a lazily built table of newline byte offsets.
///
/// The table makes byte-offset to line/column conversion `O(log n)` instead
/// of a linear rescan for every terminal node or error.
pub struct Source<'s> {
    pub text: &'s str,
    line_breaks: OnceCell<Vec<usize>>,
}

impl<'s> Source<'s> {
    pub fn new(text: &'s str) -> Self {
        Self {
            text,
            line_breaks: OnceCell::new(),
        }
    }

    fn line_breaks(&self) -> &Vec<usize> {
        self.line_breaks.get_or_init(|| {
            self.text
                .bytes()
                .enumerate()
                .filter_map(|(i, b)| if b == b'\n' { Some(i) } else { None })
                .collect()
        })
    }

    /// Convert a byte offset into a 1-based line/column pair.
    pub fn position_at(&self, offset: usize) -> Position {
        let breaks = self.line_breaks();
        let line = breaks.partition_point(|&b| b < offset);
        let line_start = if line == 0 { 0 } else { breaks[line - 1] + 1 };
        Position::new(line + 1, offset - line_start + 1)
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Slice of the underlying text, used to build `AstNode::span`.
    pub fn slice(&self, start: usize, end: usize) -> &'s str {
        &self.text[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_first_column() {
        let source = Source::new("abc");
        assert_eq!(source.position_at(0), Position::new(1, 1));
    }

    #[test]
    fn after_newline_resets_column() {
        let source = Source::new("ab\ncd");
        assert_eq!(source.position_at(3), Position::new(2, 1));
        assert_eq!(source.position_at(4), Position::new(2, 2));
    }

    #[test]
    fn multiple_lines() {
        let source = Source::new("a\nb\nc");
        assert_eq!(source.position_at(0), Position::new(1, 1));
        assert_eq!(source.position_at(2), Position::new(2, 1));
        assert_eq!(source.position_at(4), Position::new(3, 1));
    }
}
