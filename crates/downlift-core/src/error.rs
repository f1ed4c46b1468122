//! Error types shared across the downlift crates.

use thiserror::Error;

use crate::text::Position;

/// Errors from the core infrastructure.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An edit named a file that was not provided to `apply`.
    #[error("file not found while applying edit: {filename}")]
    FileMissing { filename: String },

    /// An edit's range has end before start.
    #[error("invalid edit range in {filename}: {start}..{end}")]
    InvalidRange {
        filename: String,
        start: Position,
        end: Position,
    },

    /// IO error surfaced to callers that persist edited text.
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
