//! Dual-version parse harness.
//!
//! Builds the high-version view of a program: every file of the low
//! registry, dependency classification preserved, re-parsed under the
//! default (highest supported) grammar version with the same namespace,
//! macro and constant settings. Built once per engine activation and
//! read-only afterwards.

use downlift_syntax::{AbapVersion, Registry};

/// The high-version registry wrapper.
#[derive(Debug)]
pub struct HighView {
    registry: Registry,
}

impl HighView {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Clone and re-parse the program at the highest supported version.
///
/// An object whose files fail to lex or classify simply ends up without
/// a counterpart in the high view and is skipped downstream; building
/// the view itself never fails.
pub fn build_high_view(low: &Registry) -> HighView {
    let mut registry = low.clone_for_version(AbapVersion::highest());
    registry.parse();
    tracing::debug!(
        low_version = %low.config().version,
        high_version = %AbapVersion::highest(),
        "high-version view constructed"
    );
    HighView { registry }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downlift_syntax::nodes::StatementKind;
    use downlift_syntax::{Registry, RegistryConfig};

    #[test]
    fn high_view_reparses_at_highest_version() {
        let mut low = Registry::new(RegistryConfig {
            version: AbapVersion::V702,
            ..RegistryConfig::default()
        });
        low.add_file("zprog.prog.abap", "DATA(x) = 1.\n");
        low.add_dependency("cl_dep.clas.abap", "CLASS cl_dep DEFINITION.\nENDCLASS.\n");
        low.parse();

        let high = build_high_view(&low);
        let obj = high.registry().object("zprog").unwrap();
        assert_eq!(obj.files()[0].statements()[0].kind(), StatementKind::Move);
        // dependency classification survives the clone
        assert!(high.registry().object("cl_dep").unwrap().is_dependency());
        // namespace settings are carried over
        assert_eq!(
            high.registry().config().error_namespace,
            low.config().error_namespace
        );
    }
}
