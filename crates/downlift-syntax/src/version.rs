//! ABAP language version abstraction for version-aware parsing.
//!
//! The statement classifier is version-gated: constructs introduced after
//! 7.02 parse into their productions at [`AbapVersion::V750`] but yield
//! [`Unknown`](crate::nodes::StatementKind::Unknown) statements at the two
//! downportable versions. The downport engine only activates when the
//! configured target version is downportable.

use serde::{Deserialize, Serialize};

/// Target ABAP language version for parsing and analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AbapVersion {
    /// 7.02: no inline declarations, no constructor expressions, classic
    /// Open SQL only.
    V702,
    /// Open source ABAP dialect; same syntax floor as 7.02.
    OpenAbap,
    /// 7.50: the highest supported version; everything parses.
    #[default]
    V750,
}

impl AbapVersion {
    /// The default (highest supported) version, used for the high-side parse.
    pub fn highest() -> Self {
        AbapVersion::V750
    }

    /// True for the two versions the downport engine can target.
    pub fn downportable(self) -> bool {
        matches!(self, AbapVersion::V702 | AbapVersion::OpenAbap)
    }

    /// Inline `DATA(...)` / `FIELD-SYMBOL(...)` declarations.
    pub fn has_inline_declarations(self) -> bool {
        !self.downportable()
    }

    /// Constructor expressions: `NEW`, `VALUE`, `REDUCE`, `COND`, `CONV`, `CAST`.
    pub fn has_constructor_expressions(self) -> bool {
        !self.downportable()
    }

    /// Table expressions `itab[ ... ]`.
    pub fn has_table_expressions(self) -> bool {
        !self.downportable()
    }

    /// `@`-escaped host variables and comma-separated field lists in SQL.
    pub fn has_modern_sql(self) -> bool {
        !self.downportable()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AbapVersion::V702 => "v702",
            AbapVersion::OpenAbap => "open-abap",
            AbapVersion::V750 => "v750",
        }
    }

    /// Parse a version name as used in configuration files and CLI flags.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "v702" | "702" => Some(AbapVersion::V702),
            "open-abap" | "openabap" => Some(AbapVersion::OpenAbap),
            "v750" | "750" | "cloud" => Some(AbapVersion::V750),
            _ => None,
        }
    }
}

impl std::fmt::Display for AbapVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downportable_versions() {
        assert!(AbapVersion::V702.downportable());
        assert!(AbapVersion::OpenAbap.downportable());
        assert!(!AbapVersion::V750.downportable());
    }

    #[test]
    fn highest_parses_everything() {
        let v = AbapVersion::highest();
        assert!(v.has_inline_declarations());
        assert!(v.has_constructor_expressions());
        assert!(v.has_table_expressions());
        assert!(v.has_modern_sql());
    }

    #[test]
    fn parse_names() {
        assert_eq!(AbapVersion::parse("v702"), Some(AbapVersion::V702));
        assert_eq!(AbapVersion::parse("open-abap"), Some(AbapVersion::OpenAbap));
        assert_eq!(AbapVersion::parse("cloud"), Some(AbapVersion::V750));
        assert_eq!(AbapVersion::parse("v9"), None);
    }

    #[test]
    fn serde_kebab_case() {
        let json = serde_json::to_string(&AbapVersion::OpenAbap).unwrap();
        assert_eq!(json, "\"open-abap\"");
    }
}
