//! ABAP type representation and typed identifiers.
//!
//! The downport engine needs just enough of a type model to synthesize
//! declarations: a qualified name when one exists, a structural rendering
//! otherwise, and the void/unknown placeholders that make a rule decline
//! or report "detected but not auto-fixable".

use crate::token::Token;

/// A resolved ABAP type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbapType {
    /// `c LENGTH n`
    Character { length: u32 },
    /// `string`
    StringType,
    /// `i`
    Integer,
    /// `p LENGTH l DECIMALS d`
    Packed { length: u32, decimals: u32 },
    /// Flat structure with named components.
    Structure(Vec<(String, AbapType)>),
    /// Internal table of a row type.
    Table { row: Box<AbapType> },
    /// `REF TO class`
    ObjectRef(String),
    /// Fully generic `data`.
    DataGeneric,
    /// Referenced name could not be resolved to a known definition; the
    /// string names what was voided.
    Void(String),
    /// Resolution failed with a reason; distinct from void so messages can
    /// say why.
    Unknown(String),
    /// A user-defined type referenced by name.
    Named(String),
}

impl AbapType {
    /// The name usable in a `TYPE <name>` clause, when one exists.
    pub fn qualified_name(&self) -> Option<String> {
        match self {
            AbapType::Named(n) => Some(n.to_lowercase()),
            AbapType::ObjectRef(n) => Some(n.to_lowercase()),
            AbapType::Integer => Some("i".to_string()),
            AbapType::StringType => Some("string".to_string()),
            _ => None,
        }
    }

    /// Structural rendering for declarations without a qualified name.
    pub fn to_abap(&self) -> String {
        match self {
            AbapType::Character { length } => format!("c LENGTH {length}"),
            AbapType::StringType => "string".to_string(),
            AbapType::Integer => "i".to_string(),
            AbapType::Packed { length, decimals } => {
                format!("p LENGTH {length} DECIMALS {decimals}")
            }
            AbapType::Named(n) => n.to_lowercase(),
            AbapType::ObjectRef(n) => format!("REF TO {}", n.to_lowercase()),
            AbapType::Table { row } => {
                format!("STANDARD TABLE OF {} WITH DEFAULT KEY", row.to_abap())
            }
            AbapType::Structure(_) | AbapType::DataGeneric | AbapType::Void(_) | AbapType::Unknown(_) => {
                "data".to_string()
            }
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, AbapType::Void(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, AbapType::Unknown(_))
    }

    /// Row type of a table, when this is a table type.
    pub fn row_type(&self) -> Option<&AbapType> {
        match self {
            AbapType::Table { row } => Some(row),
            _ => None,
        }
    }

    /// Component type of a structure.
    pub fn component(&self, name: &str) -> Option<&AbapType> {
        match self {
            AbapType::Structure(fields) => fields
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, t)| t),
            _ => None,
        }
    }
}

/// Metadata flags on a typed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierMeta {
    DataDefinition,
    InlineDefinition,
    MethodImporting,
    MethodExporting,
    MethodChanging,
    MethodReturning,
    EventParameter,
    FormParameter,
}

/// A name bound to a type at a position in a file.
///
/// Name comparisons are case-insensitive; [`upper_name`](Self::upper_name)
/// is the canonical form.
#[derive(Debug, Clone)]
pub struct TypedIdentifier {
    token: Token,
    filename: String,
    ty: AbapType,
    meta: Vec<IdentifierMeta>,
}

impl TypedIdentifier {
    pub fn new(
        token: Token,
        filename: impl Into<String>,
        ty: AbapType,
        meta: Vec<IdentifierMeta>,
    ) -> Self {
        TypedIdentifier {
            token,
            filename: filename.into(),
            ty,
            meta,
        }
    }

    pub fn name(&self) -> &str {
        self.token.text()
    }

    pub fn upper_name(&self) -> String {
        self.token.upper()
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn get_type(&self) -> &AbapType {
        &self.ty
    }

    pub fn meta(&self) -> &[IdentifierMeta] {
        &self.meta
    }

    pub fn has_meta(&self, flag: IdentifierMeta) -> bool {
        self.meta.contains(&flag)
    }
}

// ============================================================================
// Type clause parsing
// ============================================================================

/// Parse a `TYPE ...` clause (tokens starting at `TYPE`) into an
/// [`AbapType`]. `LIKE` clauses are the caller's job since they need
/// scope access.
pub fn parse_type_clause(toks: &[&Token]) -> AbapType {
    if toks.is_empty() || !toks[0].is("TYPE") {
        return AbapType::DataGeneric;
    }
    let rest = &toks[1..];
    if rest.is_empty() {
        return AbapType::DataGeneric;
    }

    if rest[0].is("REF") {
        // TYPE REF TO name
        let name = rest
            .iter()
            .skip(1)
            .find(|t| !t.is("TO"))
            .map(|t| t.text().to_string())
            .unwrap_or_default();
        return AbapType::ObjectRef(name);
    }

    if rest.iter().any(|t| t.is("TABLE")) && rest.iter().any(|t| t.is("OF")) {
        let of = rest.iter().position(|t| t.is("OF")).unwrap();
        let row = rest
            .get(of + 1)
            .map(|t| base_type(t.text(), rest, of + 2))
            .unwrap_or(AbapType::DataGeneric);
        return AbapType::Table { row: Box::new(row) };
    }

    base_type(rest[0].text(), rest, 1)
}

fn base_type(name: &str, rest: &[&Token], after: usize) -> AbapType {
    let length = clause_number(rest, after, "LENGTH");
    let decimals = clause_number(rest, after, "DECIMALS");
    match name.to_lowercase().as_str() {
        "i" | "int8" => AbapType::Integer,
        "string" => AbapType::StringType,
        "c" => AbapType::Character {
            length: length.unwrap_or(1),
        },
        "p" => AbapType::Packed {
            length: length.unwrap_or(8),
            decimals: decimals.unwrap_or(0),
        },
        "data" => AbapType::DataGeneric,
        _ => AbapType::Named(name.to_string()),
    }
}

fn clause_number(rest: &[&Token], from: usize, keyword: &str) -> Option<u32> {
    let idx = rest.iter().skip(from).position(|t| t.is(keyword))? + from;
    rest.get(idx + 1).and_then(|t| t.text().parse().ok())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use downlift_core::Position;

    fn toks(texts: &[&str]) -> Vec<Token> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Token::new(*t, Position::new(1, (i * 10 + 1) as u32)))
            .collect()
    }

    fn parse(texts: &[&str]) -> AbapType {
        let owned = toks(texts);
        let refs: Vec<&Token> = owned.iter().collect();
        parse_type_clause(&refs)
    }

    #[test]
    fn builtin_types() {
        assert_eq!(parse(&["TYPE", "i"]), AbapType::Integer);
        assert_eq!(parse(&["TYPE", "string"]), AbapType::StringType);
        assert_eq!(
            parse(&["TYPE", "c", "LENGTH", "10"]),
            AbapType::Character { length: 10 }
        );
    }

    #[test]
    fn named_and_ref_types() {
        assert_eq!(parse(&["TYPE", "zmy_type"]), AbapType::Named("zmy_type".into()));
        assert_eq!(
            parse(&["TYPE", "REF", "TO", "zcl_foo"]),
            AbapType::ObjectRef("zcl_foo".into())
        );
    }

    #[test]
    fn table_types() {
        let ty = parse(&["TYPE", "STANDARD", "TABLE", "OF", "zline"]);
        assert_eq!(ty.row_type(), Some(&AbapType::Named("zline".into())));
    }

    #[test]
    fn qualified_names() {
        assert_eq!(AbapType::Integer.qualified_name().as_deref(), Some("i"));
        assert_eq!(
            AbapType::Named("ZTY_Foo".into()).qualified_name().as_deref(),
            Some("zty_foo")
        );
        assert_eq!(AbapType::Character { length: 5 }.qualified_name(), None);
        assert_eq!(
            AbapType::ObjectRef("ZCL_A".into()).qualified_name().as_deref(),
            Some("zcl_a")
        );
    }

    #[test]
    fn structural_rendering() {
        assert_eq!(AbapType::Character { length: 5 }.to_abap(), "c LENGTH 5");
        assert_eq!(
            AbapType::Table {
                row: Box::new(AbapType::Named("zline".into()))
            }
            .to_abap(),
            "STANDARD TABLE OF zline WITH DEFAULT KEY"
        );
    }

    #[test]
    fn placeholders() {
        assert!(AbapType::Void("ztab".into()).is_void());
        assert!(AbapType::Unknown("no def".into()).is_unknown());
        assert!(!AbapType::Integer.is_void());
    }

    #[test]
    fn structure_components() {
        let ty = AbapType::Structure(vec![
            ("comp1".into(), AbapType::Integer),
            ("comp2".into(), AbapType::StringType),
        ]);
        assert_eq!(ty.component("COMP2"), Some(&AbapType::StringType));
        assert_eq!(ty.component("missing"), None);
    }
}
