//! The downport engine: version gate, high view, per-object rule runs.

use downlift_core::{Issue, Severity};
use downlift_syntax::{Object, Registry, SyntaxLogic};
use serde::{Deserialize, Serialize};

use crate::harness::{build_high_view, HighView};
use crate::rules::{check_statement, RuleCtx};
use crate::select::candidates;

/// Rule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownportConf {
    pub severity: Severity,
}

impl Default for DownportConf {
    fn default() -> Self {
        DownportConf {
            severity: Severity::Warning,
        }
    }
}

/// Descriptive metadata, surfaced by the CLI report.
#[derive(Debug, Clone, Serialize)]
pub struct RuleMetadata {
    pub key: &'static str,
    pub title: &'static str,
    pub short_description: &'static str,
    pub extended_information: &'static str,
    pub tags: &'static [&'static str],
}

/// The version-downporting engine.
///
/// Construction builds the high-version view exactly once, and only when
/// the configured target version is downportable; for any other version
/// every later call is a no-op that returns no issues.
pub struct Downport {
    conf: DownportConf,
    downportable: bool,
    high: Option<HighView>,
}

impl Downport {
    pub fn metadata() -> RuleMetadata {
        RuleMetadata {
            key: "downport",
            title: "Downport statement",
            short_description: "Rewrites newer-syntax statements into 7.02-compatible form",
            extended_information: "\
Statements that only parse under the newest grammar version are reparsed \
in a cloned high-version view; pattern/action rules then synthesize an \
equivalent old-syntax replacement as a textual edit. One rule fires per \
statement per pass, so complex statements converge over repeated \
apply-and-reparse rounds driven by the caller.",
            tags: &["experimental", "downport", "quickfix"],
        }
    }

    /// Gate on the configured version and build the high view if it
    /// passes.
    pub fn initialize(low: &Registry, conf: DownportConf) -> Self {
        let downportable = low.config().version.downportable();
        let high = if downportable {
            Some(build_high_view(low))
        } else {
            tracing::debug!(
                version = %low.config().version,
                "target version is not downportable, engine disabled"
            );
            None
        };
        Downport {
            conf,
            downportable,
            high,
        }
    }

    /// True when a high-version registry was constructed.
    pub fn has_high_view(&self) -> bool {
        self.high.is_some()
    }

    /// Analyze one object, returning at most one issue per candidate
    /// statement.
    ///
    /// The unique-name counter resets to 1 here and then only increments
    /// for the rest of the run, keeping temporaries distinct across all
    /// files and statements of the object.
    pub fn run(&self, low_object: &Object) -> Vec<Issue> {
        let mut issues = Vec::new();
        if !self.downportable {
            return issues;
        }
        let Some(high) = &self.high else {
            return issues;
        };
        let Some(high_object) = high.registry().object(low_object.name()) else {
            return issues;
        };

        let high_syntax = SyntaxLogic::run(high.registry(), high_object.name());
        let mut counter = 1u32;

        for low_file in low_object.files() {
            let Some(high_file) = high_object.file_by_name(low_file.filename()) else {
                continue;
            };
            let Some(pairs) = candidates(low_file, high_file) else {
                continue;
            };
            for (low_stmt, high_stmt) in pairs {
                let mut ctx = RuleCtx {
                    low_file,
                    high_syntax: &high_syntax,
                    counter: &mut counter,
                    key: Self::metadata().key,
                    severity: self.conf.severity,
                };
                match check_statement(&low_stmt, &high_stmt, &mut ctx) {
                    Ok(Some(issue)) => {
                        tracing::debug!(
                            filename = low_file.filename(),
                            message = issue.message.as_str(),
                            "rule fired"
                        );
                        issues.push(issue);
                    }
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(
                            filename = low_file.filename(),
                            %error,
                            "statement skipped: reconstruction failed"
                        );
                    }
                }
            }
        }
        issues
    }
}
