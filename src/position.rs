//! Module with the position type and functions.
//! A position is a struct that contains a line and column number.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A position in a source text.
/// The line and column numbers are 1-based, columns count chars.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    /// The line number of the position.
    pub line: usize,
    /// The column number of the position.
    pub column: usize,
}

impl Position {
    /// Create a new position.
    pub fn new(line: usize, column: usize) -> Self {
        debug_assert!(line > 0, "line number must be greater than 0");
        debug_assert!(column > 0, "column number must be greater than 0");
        Self { line, column }
    }

    /// Get the line number of the position.
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Get the column number of the position.
    #[inline]
    pub fn column(&self) -> usize {
        self.column
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Line start offsets of a text, used to turn byte offsets into positions.
#[derive(Debug, Clone, Default)]
pub(crate) struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    /// The position of a byte offset. Offsets past the end are clamped to the text length.
    pub(crate) fn position(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let column = text
            .get(line_start..offset)
            .map_or(offset - line_start, |s| s.chars().count());
        Position::new(line + 1, column + 1)
    }
}
