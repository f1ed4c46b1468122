//! Diagnostic issues with optional attached fixes.

use serde::{Deserialize, Serialize};

use crate::edit::Edit;
use crate::text::Position;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    #[default]
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// A single diagnostic: where, what, which rule, and optionally how to fix.
///
/// One rule invocation produces at most one `Issue`, carrying at most one
/// (possibly merged) [`Edit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// File the diagnostic anchors in.
    pub filename: String,
    /// Anchor position, normally the first token of the offending construct.
    pub position: Position,
    /// Human-readable message.
    pub message: String,
    /// Stable rule key.
    pub key: String,
    /// Severity.
    pub severity: Severity,
    /// Attached fix, when the rule could synthesize one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<Edit>,
}

impl Issue {
    /// Create an issue anchored at `position`, without a fix.
    pub fn at_position(
        filename: impl Into<String>,
        position: Position,
        message: impl Into<String>,
        key: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Issue {
            filename: filename.into(),
            position,
            message: message.into(),
            key: key.into(),
            severity,
            fix: None,
        }
    }

    /// Attach a fix.
    pub fn with_fix(mut self, fix: Edit) -> Self {
        self.fix = Some(fix);
        self
    }

    /// True when a fix is attached.
    pub fn has_fix(&self) -> bool {
        self.fix.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Error).unwrap(), "\"error\"");
        assert_eq!(
            serde_json::to_string(&Severity::Warning).unwrap(),
            "\"warning\""
        );
    }

    #[test]
    fn issue_without_fix_omits_field() {
        let issue = Issue::at_position(
            "a.abap",
            Position::new(1, 1),
            "msg",
            "downport",
            Severity::Warning,
        );
        let json = serde_json::to_string(&issue).unwrap();
        assert!(!json.contains("\"fix\""));
        assert!(!issue.has_fix());
    }

    #[test]
    fn issue_with_fix() {
        let fix = Edit::insert_at("a.abap", Position::new(1, 1), "x");
        let issue = Issue::at_position(
            "a.abap",
            Position::new(1, 1),
            "msg",
            "downport",
            Severity::Warning,
        )
        .with_fix(fix);
        assert!(issue.has_fix());
    }
}
