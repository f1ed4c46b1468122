//! Text positions and row/column to byte-offset conversions.
//!
//! ## Coordinate Conventions
//!
//! - Rows and columns are **1-indexed** (matching editor conventions)
//! - Byte offsets are **0-indexed**
//! - Columns count Unicode scalar values, not bytes
//!
//! A position is either *real* (present in user-authored source) or
//! *virtual* (attached to synthesized tokens, e.g. from macro expansion).
//! Rewrite rules must refuse to act on virtual positions: there is no
//! byte range in the persisted file to edit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A source position: 1-indexed row and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// 1-indexed row.
    pub row: u32,
    /// 1-indexed column.
    pub col: u32,
    /// True when the position was synthesized rather than read from a file.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub virtual_pos: bool,
}

impl Position {
    /// Create a real position.
    ///
    /// # Panics
    /// Panics if `row` or `col` is zero; positions are 1-indexed.
    pub fn new(row: u32, col: u32) -> Self {
        assert!(row >= 1 && col >= 1, "positions are 1-indexed");
        Position {
            row,
            col,
            virtual_pos: false,
        }
    }

    /// Create a virtual (synthesized) position.
    pub fn virtual_at(row: u32, col: u32) -> Self {
        Position {
            row: row.max(1),
            col: col.max(1),
            virtual_pos: true,
        }
    }

    /// True when the position was synthesized rather than read from a file.
    pub fn is_virtual(&self) -> bool {
        self.virtual_pos
    }

    /// Row/column equality, ignoring the virtual flag.
    pub fn equals(&self, other: &Position) -> bool {
        self.row == other.row && self.col == other.col
    }

    /// Strictly before `other` in source order, ignoring the virtual flag.
    pub fn is_before(&self, other: &Position) -> bool {
        (self.row, self.col) < (other.row, other.col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Convert a position to a byte offset into `content`.
///
/// Columns count Unicode scalar values. Positions past the end of a line
/// clamp to the line end; rows past the end of content clamp to the
/// content length.
pub fn position_to_byte_offset(content: &str, pos: Position) -> usize {
    let row = pos.row.max(1);
    let col = pos.col.max(1);

    let mut current_row = 1u32;
    let mut line_start = 0usize;

    if row > 1 {
        let mut found = false;
        for (i, ch) in content.char_indices() {
            if ch == '\n' {
                current_row += 1;
                if current_row == row {
                    line_start = i + 1;
                    found = true;
                    break;
                }
            }
        }
        if !found {
            return content.len();
        }
    }

    let mut current_col = 1u32;
    for (j, c) in content[line_start..].char_indices() {
        if current_col == col {
            return line_start + j;
        }
        if c == '\n' {
            return line_start + j;
        }
        current_col += 1;
    }

    content.len()
}

/// Convert a byte offset to a 1-indexed position.
///
/// Offsets beyond the content clamp to the end of content.
pub fn byte_offset_to_position(content: &str, offset: usize) -> Position {
    let mut row = 1u32;
    let mut col = 1u32;
    let mut current = 0usize;

    for ch in content.chars() {
        if current >= offset {
            break;
        }
        if ch == '\n' {
            row += 1;
            col = 1;
        } else {
            col += 1;
        }
        current += ch.len_utf8();
    }

    Position::new(row, col)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod position_tests {
        use super::*;

        #[test]
        fn ordering_ignores_nothing_but_coordinates() {
            let a = Position::new(1, 5);
            let b = Position::new(2, 1);
            assert!(a.is_before(&b));
            assert!(!b.is_before(&a));
        }

        #[test]
        fn equals_ignores_virtual_flag() {
            let real = Position::new(3, 7);
            let synthesized = Position::virtual_at(3, 7);
            assert!(real.equals(&synthesized));
            assert!(synthesized.is_virtual());
            assert!(!real.is_virtual());
        }

        #[test]
        fn display_is_row_colon_col() {
            assert_eq!(Position::new(12, 4).to_string(), "12:4");
        }
    }

    mod conversion_tests {
        use super::*;

        #[test]
        fn roundtrip() {
            let content = "WRITE 'hi'.\nDATA foo TYPE i.\n";
            for offset in 0..content.len() {
                let pos = byte_offset_to_position(content, offset);
                let recovered = position_to_byte_offset(content, pos);
                assert_eq!(recovered, offset, "roundtrip failed at offset {offset}");
            }
        }

        #[test]
        fn first_char_is_one_one() {
            assert_eq!(byte_offset_to_position("abc", 0), Position::new(1, 1));
            assert_eq!(position_to_byte_offset("abc", Position::new(1, 1)), 0);
        }

        #[test]
        fn second_row() {
            let content = "a.\nbc.\n";
            assert_eq!(position_to_byte_offset(content, Position::new(2, 1)), 3);
            assert_eq!(byte_offset_to_position(content, 3), Position::new(2, 1));
        }

        #[test]
        fn clamps_past_line_end() {
            let content = "ab\ncd\n";
            // col 100 on row 1 clamps to the newline
            assert_eq!(position_to_byte_offset(content, Position::new(1, 100)), 2);
        }

        #[test]
        fn clamps_past_content() {
            let content = "ab";
            assert_eq!(position_to_byte_offset(content, Position::new(9, 1)), 2);
            assert_eq!(byte_offset_to_position(content, 100), Position::new(1, 3));
        }
    }
}
