//! Candidate selection: index-wise statement pairing.
//!
//! Statements are paired strictly by index between the low- and
//! high-version parse of the same file. When the counts differ (a prior
//! rewrite in the same pass can desynchronize them) the whole file is
//! skipped for this pass; re-running after the edits are applied
//! re-synchronizes the views. This is a documented, intentionally
//! permissive limitation.

use downlift_syntax::nodes::{ExpressionKind, StatementKind, StatementNode};
use downlift_syntax::ParsedFile;

/// Statement pairs worth attempting a rewrite on, or `None` when the
/// file is skipped because the statement counts differ.
pub fn candidates<'a>(
    low: &'a ParsedFile,
    high: &'a ParsedFile,
) -> Option<Vec<(StatementNode<'a>, StatementNode<'a>)>> {
    let low_statements = low.statements();
    let high_statements = high.statements();
    if low_statements.len() != high_statements.len() {
        tracing::debug!(
            filename = low.filename(),
            low = low_statements.len(),
            high = high_statements.len(),
            "statement counts differ, file skipped for this pass"
        );
        return None;
    }

    let pairs = low_statements
        .into_iter()
        .zip(high_statements)
        .filter(|(l, h)| is_candidate(l, h))
        .collect();
    Some(pairs)
}

/// A pair is a candidate when the low side failed to parse but the high
/// side did, or when the high tree still contains an inline declaration
/// (which can hide inside statements that are legal at the low version).
fn is_candidate(low: &StatementNode<'_>, high: &StatementNode<'_>) -> bool {
    (low.kind() == StatementKind::Unknown && high.kind() != StatementKind::Unknown)
        || high
            .find_first_expression(ExpressionKind::InlineData)
            .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use downlift_syntax::{AbapVersion, Registry, RegistryConfig};

    fn registries(source: &str) -> (Registry, Registry) {
        let mut low = Registry::new(RegistryConfig {
            version: AbapVersion::V702,
            ..RegistryConfig::default()
        });
        low.add_file("zprog.prog.abap", source);
        low.parse();
        let mut high = low.clone_for_version(AbapVersion::highest());
        high.parse();
        (low, high)
    }

    #[test]
    fn unknown_low_known_high_is_candidate() {
        let (low, high) = registries("DATA(x) = 1.\nDATA y TYPE i.\n");
        let low_file = &low.object("zprog").unwrap().files()[0];
        let high_file = &high.object("zprog").unwrap().files()[0];
        let pairs = candidates(low_file, high_file).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.kind(), StatementKind::Unknown);
        assert_eq!(pairs[0].1.kind(), StatementKind::Move);
    }

    #[test]
    fn clean_file_has_no_candidates() {
        let (low, high) = registries("DATA x TYPE i.\nx = 1.\n");
        let low_file = &low.object("zprog").unwrap().files()[0];
        let high_file = &high.object("zprog").unwrap().files()[0];
        assert!(candidates(low_file, high_file).unwrap().is_empty());
    }

    #[test]
    fn count_mismatch_skips_file() {
        let mut low = Registry::new(RegistryConfig {
            version: AbapVersion::V702,
            ..RegistryConfig::default()
        });
        low.add_file("zprog.prog.abap", "DATA x TYPE i.\n");
        low.parse();
        let mut high = Registry::new(RegistryConfig::default());
        high.add_file("zprog.prog.abap", "DATA x TYPE i.\nx = 1.\n");
        high.parse();
        let low_file = &low.object("zprog").unwrap().files()[0];
        let high_file = &high.object("zprog").unwrap().files()[0];
        assert!(candidates(low_file, high_file).is_none());
    }
}
