//! Engine error types.

use thiserror::Error;

/// A "should never happen" failure while re-emitting a structured body
/// (e.g. an unanticipated clause inside a conditional-value expression).
///
/// Signals a grammar/rule mismatch. Caught at the single-statement
/// boundary: the statement is skipped, everything else proceeds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconstructionError {
    #[error("unexpected token while rebuilding expression body: {0}")]
    UnexpectedToken(String),

    #[error("unexpected expression while rebuilding expression body")]
    UnexpectedExpression,
}

impl ReconstructionError {
    pub fn unexpected_token(text: &str) -> Self {
        ReconstructionError::UnexpectedToken(text.to_string())
    }

    pub fn unexpected_expression() -> Self {
        ReconstructionError::UnexpectedExpression
    }
}

/// Errors surfaced by the engine's outer layers (CLI, fix application).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] downlift_core::CoreError),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}
