//! CLI-facing report types: JSON and plain text rendering of issues.

use std::fmt::Write as _;

use downlift_core::Issue;
use serde::Serialize;

/// One issue, flattened for output.
#[derive(Debug, Clone, Serialize)]
pub struct IssueReport {
    pub filename: String,
    pub row: u32,
    pub col: u32,
    pub severity: String,
    pub key: String,
    pub message: String,
    pub has_fix: bool,
}

impl From<&Issue> for IssueReport {
    fn from(issue: &Issue) -> Self {
        IssueReport {
            filename: issue.filename.clone(),
            row: issue.position.row,
            col: issue.position.col,
            severity: issue.severity.as_str().to_string(),
            key: issue.key.clone(),
            message: issue.message.clone(),
            has_fix: issue.has_fix(),
        }
    }
}

/// Full check report.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub version: String,
    pub objects_analyzed: usize,
    pub issues: Vec<IssueReport>,
}

impl CheckReport {
    pub fn new(version: String, objects_analyzed: usize, issues: &[Issue]) -> Self {
        CheckReport {
            version,
            objects_analyzed,
            issues: issues.iter().map(IssueReport::from).collect(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for issue in &self.issues {
            let fix = if issue.has_fix { " [fix]" } else { "" };
            let _ = writeln!(
                out,
                "{}:{}:{} {} {}{}",
                issue.filename, issue.row, issue.col, issue.severity, issue.message, fix
            );
        }
        let _ = writeln!(
            out,
            "{} issue(s) in {} object(s), target version {}",
            self.issues.len(),
            self.objects_analyzed,
            self.version
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downlift_core::{Position, Severity};

    #[test]
    fn text_rendering() {
        let issues = vec![Issue::at_position(
            "zprog.prog.abap",
            Position::new(3, 1),
            "Outline DATA",
            "downport",
            Severity::Warning,
        )];
        let report = CheckReport::new("v702".to_string(), 1, &issues);
        let text = report.render_text();
        assert!(text.contains("zprog.prog.abap:3:1 warning Outline DATA"));
        assert!(text.contains("1 issue(s) in 1 object(s), target version v702"));
    }

    #[test]
    fn json_shape() {
        let issues = vec![Issue::at_position(
            "a.abap",
            Position::new(1, 1),
            "msg",
            "downport",
            Severity::Error,
        )];
        let report = CheckReport::new("v702".to_string(), 1, &issues);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["issues"][0]["severity"], "error");
        assert_eq!(json["issues"][0]["has_fix"], false);
    }
}
