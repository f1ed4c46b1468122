//! Core infrastructure for downlift.
//!
//! This crate provides language-agnostic infrastructure:
//! - Edit model for representing textual rewrites
//! - Issue type for diagnostics with optional fixes
//! - Text positions and offset conversions
//! - Shared error types

pub mod edit;
pub mod error;
pub mod issue;
pub mod text;

pub use edit::{Edit, EditOp};
pub use error::CoreError;
pub use issue::{Issue, Severity};
pub use text::Position;
