//! Edit model: range operations against named files.
//!
//! An [`Edit`] is one or more `(file, range, replacement)` operations that
//! belong to a single rewrite. Operations from one rule invocation are
//! combined with [`Edit::merge`]; the merged unit is applied atomically.
//!
//! ## Semantics
//!
//! - Insert: empty range, non-empty text
//! - Delete: non-empty range, empty text
//! - Replace: non-empty range, non-empty text
//!
//! Ranges are half-open `[start, end)` in position space. Callers must
//! never merge edits whose ranges overlap; that is a precondition on the
//! producing rule, not a checked runtime guard.
//!
//! ## Application
//!
//! [`Edit::apply`] splices operations into source text per file, applying
//! in reverse position order so earlier offsets stay valid. Given identical
//! input the result is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::text::{position_to_byte_offset, Position};

/// A single range operation against one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOp {
    /// File the operation applies to.
    pub filename: String,
    /// Start of the replaced range (inclusive).
    pub start: Position,
    /// End of the replaced range (exclusive); equals `start` for inserts.
    pub end: Position,
    /// Replacement text; empty for deletes.
    pub text: String,
}

impl EditOp {
    /// True when this operation's range overlaps another's in the same file.
    ///
    /// Adjacent ranges do not overlap. Two inserts at the same point do.
    pub fn overlaps(&self, other: &EditOp) -> bool {
        if self.filename != other.filename {
            return false;
        }
        if self.start.equals(&self.end) && other.start.equals(&other.end) {
            return self.start.equals(&other.start);
        }
        self.start.is_before(&other.end) && other.start.is_before(&self.end)
    }
}

/// One or more range operations forming a single rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    ops: Vec<EditOp>,
}

impl Edit {
    /// Insert `text` at `pos` in `filename`.
    pub fn insert_at(filename: impl Into<String>, pos: Position, text: impl Into<String>) -> Self {
        Edit {
            ops: vec![EditOp {
                filename: filename.into(),
                start: pos,
                end: pos,
                text: text.into(),
            }],
        }
    }

    /// Delete `[start, end)` in `filename`.
    pub fn delete_range(filename: impl Into<String>, start: Position, end: Position) -> Self {
        Edit {
            ops: vec![EditOp {
                filename: filename.into(),
                start,
                end,
                text: String::new(),
            }],
        }
    }

    /// Replace `[start, end)` in `filename` with `text`.
    pub fn replace_range(
        filename: impl Into<String>,
        start: Position,
        end: Position,
        text: impl Into<String>,
    ) -> Self {
        Edit {
            ops: vec![EditOp {
                filename: filename.into(),
                start,
                end,
                text: text.into(),
            }],
        }
    }

    /// Combine two edits from the same rewrite into one unit.
    ///
    /// Precondition: the two edits' ranges do not overlap. Violating this
    /// is a bug in the producing rule.
    pub fn merge(a: Edit, b: Edit) -> Edit {
        let mut ops = a.ops;
        ops.extend(b.ops);
        Edit { ops }
    }

    /// The operations of this edit.
    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    /// True when any two operations overlap. Diagnostic helper for tests;
    /// production callers uphold non-overlap as a precondition.
    pub fn has_overlaps(&self) -> bool {
        for i in 0..self.ops.len() {
            for j in (i + 1)..self.ops.len() {
                if self.ops[i].overlaps(&self.ops[j]) {
                    return true;
                }
            }
        }
        false
    }

    /// Names of the files this edit touches, deduplicated, sorted.
    pub fn filenames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ops.iter().map(|o| o.filename.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Apply this edit to the given file contents, in place.
    ///
    /// Operations are applied per file in reverse position order so that
    /// earlier offsets remain valid. Files named by the edit must be
    /// present in `files`.
    pub fn apply(&self, files: &mut BTreeMap<String, String>) -> Result<(), CoreError> {
        tracing::trace!(ops = self.ops.len(), "applying edit");
        let mut by_file: BTreeMap<&str, Vec<&EditOp>> = BTreeMap::new();
        for op in &self.ops {
            by_file.entry(op.filename.as_str()).or_default().push(op);
        }

        for (filename, mut ops) in by_file {
            let content = files
                .get(filename)
                .ok_or_else(|| CoreError::FileMissing {
                    filename: filename.to_string(),
                })?
                .clone();

            // reverse position order keeps earlier offsets stable
            ops.sort_by(|a, b| (b.start, b.end).cmp(&(a.start, a.end)));

            let mut result = content.clone();
            for op in ops {
                let start = position_to_byte_offset(&content, op.start);
                let end = position_to_byte_offset(&content, op.end);
                if end < start {
                    return Err(CoreError::InvalidRange {
                        filename: filename.to_string(),
                        start: op.start,
                        end: op.end,
                    });
                }
                result.replace_range(start..end, &op.text);
            }

            files.insert(filename.to_string(), result);
        }

        Ok(())
    }

    /// Apply this edit to a single file's content, returning the new text.
    ///
    /// Convenience for the common single-file case; every operation must
    /// name `filename`.
    pub fn apply_to(&self, filename: &str, content: &str) -> Result<String, CoreError> {
        let mut files = BTreeMap::new();
        files.insert(filename.to_string(), content.to_string());
        self.apply(&mut files)?;
        Ok(files.remove(filename).unwrap_or_default())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(row: u32, col: u32) -> Position {
        Position::new(row, col)
    }

    mod construction {
        use super::*;

        #[test]
        fn insert_has_empty_range() {
            let edit = Edit::insert_at("a.abap", pos(1, 1), "DATA x TYPE i.\n");
            assert_eq!(edit.ops().len(), 1);
            assert!(edit.ops()[0].start.equals(&edit.ops()[0].end));
        }

        #[test]
        fn merge_concatenates_ops() {
            let a = Edit::insert_at("a.abap", pos(1, 1), "x");
            let b = Edit::replace_range("a.abap", pos(2, 1), pos(2, 5), "y");
            let merged = Edit::merge(a, b);
            assert_eq!(merged.ops().len(), 2);
            assert!(!merged.has_overlaps());
        }

        #[test]
        fn overlap_detection() {
            let a = Edit::replace_range("a.abap", pos(1, 1), pos(1, 5), "x");
            let b = Edit::replace_range("a.abap", pos(1, 3), pos(1, 8), "y");
            assert!(Edit::merge(a, b).has_overlaps());

            let c = Edit::replace_range("a.abap", pos(1, 1), pos(1, 5), "x");
            let d = Edit::replace_range("b.abap", pos(1, 3), pos(1, 8), "y");
            assert!(!Edit::merge(c, d).has_overlaps());
        }

        #[test]
        fn adjacent_ranges_do_not_overlap() {
            let a = Edit::replace_range("a.abap", pos(1, 1), pos(1, 5), "x");
            let b = Edit::replace_range("a.abap", pos(1, 5), pos(1, 9), "y");
            assert!(!Edit::merge(a, b).has_overlaps());
        }
    }

    mod application {
        use super::*;

        #[test]
        fn replace_single_range() {
            let edit = Edit::replace_range("a.abap", pos(1, 7), pos(1, 12), "DEFAULT");
            let out = edit.apply_to("a.abap", "WITH  EMPTY KEY.").unwrap();
            assert_eq!(out, "WITH  DEFAULT KEY.");
        }

        #[test]
        fn insert_before_statement() {
            let edit = Edit::insert_at("a.abap", pos(2, 1), "DATA x TYPE i.\n");
            let out = edit.apply_to("a.abap", "WRITE 'a'.\nx = 1.\n").unwrap();
            assert_eq!(out, "WRITE 'a'.\nDATA x TYPE i.\nx = 1.\n");
        }

        #[test]
        fn merged_ops_apply_in_reverse_order() {
            // insert at statement start + replace inside the statement,
            // the shape every outlining rule produces
            let content = "DATA(x) = 1.\n";
            let insert = Edit::insert_at("a.abap", pos(1, 1), "DATA x TYPE i.\n");
            let replace = Edit::replace_range("a.abap", pos(1, 1), pos(1, 13), "x = 1.");
            let edit = Edit::merge(replace, insert);
            let out = edit.apply_to("a.abap", content).unwrap();
            assert_eq!(out, "DATA x TYPE i.\nx = 1.\n");
        }

        #[test]
        fn delete_range() {
            let edit = Edit::delete_range("a.abap", pos(1, 4), pos(1, 8));
            let out = edit.apply_to("a.abap", "abc defg hi").unwrap();
            assert_eq!(out, "abc hi");
        }

        #[test]
        fn missing_file_errors() {
            let edit = Edit::insert_at("missing.abap", pos(1, 1), "x");
            let mut files = BTreeMap::new();
            files.insert("other.abap".to_string(), String::new());
            assert!(matches!(
                edit.apply(&mut files),
                Err(CoreError::FileMissing { .. })
            ));
        }

        #[test]
        fn multi_file_edit() {
            let a = Edit::replace_range("a.abap", pos(1, 1), pos(1, 2), "X");
            let b = Edit::replace_range("b.abap", pos(1, 1), pos(1, 2), "Y");
            let edit = Edit::merge(a, b);
            let mut files = BTreeMap::new();
            files.insert("a.abap".to_string(), "a.".to_string());
            files.insert("b.abap".to_string(), "b.".to_string());
            edit.apply(&mut files).unwrap();
            assert_eq!(files["a.abap"], "X.");
            assert_eq!(files["b.abap"], "Y.");
        }
    }
}
