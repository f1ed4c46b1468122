//! Method signature model: typed parameters, defaults, preferred
//! parameter, event-handler resolution.
//!
//! One [`MethodParameters`] is built per `METHODS` / event-handler
//! signature at scope-build time and is immutable afterwards. The
//! downport engine consults [`MethodParameters::default_importing`] when
//! it rewrites modern object construction into explicit construct-object
//! statements.

use std::collections::BTreeMap;

use crate::nodes::{ExpressionKind as E, StatementKind, StatementNode};
use crate::registry::RegistryConfig;
use crate::token::Token;
use crate::types::{parse_type_clause, AbapType, IdentifierMeta, TypedIdentifier};

/// Parsed signature of one method or event handler.
#[derive(Debug, Clone, Default)]
pub struct MethodParameters {
    importing: Vec<TypedIdentifier>,
    exporting: Vec<TypedIdentifier>,
    changing: Vec<TypedIdentifier>,
    returning: Option<TypedIdentifier>,
    /// Upper-cased names of optional parameters.
    optional: Vec<String>,
    /// Upper-cased parameter name to rendered default-value expression.
    defaults: BTreeMap<String, String>,
    preferred: Option<String>,
    exceptions: Vec<String>,
    filename: String,
}

impl MethodParameters {
    /// Parse a `MethodDef` statement.
    ///
    /// `classes` supplies event definitions for the event-handler path;
    /// `config` decides whether an unresolvable handler class is void or
    /// an error-namespace miss.
    pub fn parse(
        node: &StatementNode<'_>,
        filename: &str,
        classes: &BTreeMap<String, ClassDefinition>,
        config: &RegistryConfig,
    ) -> Self {
        debug_assert_eq!(node.kind(), StatementKind::MethodDef);
        let mut out = MethodParameters {
            filename: filename.to_string(),
            ..MethodParameters::default()
        };

        if let Some(handler) = node.find_first_expression(E::EventHandler) {
            out.parse_event_handler(&handler, classes, config);
            return out;
        }

        if let Some(importing) = node.find_direct_expression(E::MethodDefImporting) {
            out.add_section(&importing, IdentifierMeta::MethodImporting);
            if importing
                .concat_tokens()
                .to_uppercase()
                .contains("PREFERRED PARAMETER")
            {
                out.preferred = importing.last_token().map(|t| t.upper());
            }
        }
        if let Some(exporting) = node.find_direct_expression(E::MethodDefExporting) {
            out.add_section(&exporting, IdentifierMeta::MethodExporting);
        }
        if let Some(changing) = node.find_direct_expression(E::MethodDefChanging) {
            out.add_section(&changing, IdentifierMeta::MethodChanging);
        }
        if let Some(returning) = node.find_direct_expression(E::MethodDefReturning) {
            if let Some(param) = returning.find_direct_expressions(E::MethodParam).first() {
                out.returning = out.build_param(param, IdentifierMeta::MethodReturning);
            }
        }

        out.collect_exceptions(node);
        out
    }

    fn parse_event_handler(
        &mut self,
        handler: &crate::nodes::NodeRef<'_>,
        classes: &BTreeMap<String, ClassDefinition>,
        config: &RegistryConfig,
    ) {
        let class_name = handler
            .find_direct_expression(E::ClassName)
            .map(|c| c.concat_tokens())
            .unwrap_or_default();
        let def = classes.get(&class_name.to_uppercase());
        let do_void = def.is_none() && !config.in_error_namespace(&class_name);

        let event_name = handler
            .find_direct_expression(E::Field)
            .map(|f| f.concat_tokens().to_uppercase())
            .unwrap_or_default();
        let event_params = def.and_then(|d| d.event(&event_name));

        for p in handler.find_direct_expressions(E::MethodParamName) {
            let Some(token) = p.first_token() else {
                continue;
            };
            let search = token.upper().replace('!', "");
            // every event-handler parameter is implicitly optional
            self.optional.push(search.clone());

            if search == "SENDER" && def.is_some() {
                self.importing.push(TypedIdentifier::new(
                    token.clone(),
                    &self.filename,
                    AbapType::ObjectRef(class_name.clone()),
                    vec![IdentifierMeta::EventParameter],
                ));
                continue;
            }

            let found = event_params
                .and_then(|ps| ps.iter().find(|e| e.upper_name() == search));
            let ty = match found {
                Some(e) => e.get_type().clone(),
                None if do_void => AbapType::Void(class_name.clone()),
                None => AbapType::Unknown(format!("handler parameter not found \"{search}\"")),
            };
            self.importing.push(TypedIdentifier::new(
                token.clone(),
                &self.filename,
                ty,
                vec![IdentifierMeta::EventParameter],
            ));
        }
    }

    fn add_section(&mut self, section: &crate::nodes::NodeRef<'_>, meta: IdentifierMeta) {
        for param in section.find_direct_expressions(E::MethodParam) {
            if let Some(ident) = self.build_param(&param, meta) {
                let name = ident.upper_name();
                if param.find_direct_token_by_text("OPTIONAL").is_some() {
                    self.optional.push(name);
                } else if let Some(default) = param.find_direct_expression(E::DefaultValue) {
                    self.optional.push(name.clone());
                    if let Some(value) = default.find_direct_expression(E::Source) {
                        self.defaults.insert(name, value.concat_tokens());
                    }
                }
                match meta {
                    IdentifierMeta::MethodImporting => self.importing.push(ident),
                    IdentifierMeta::MethodExporting => self.exporting.push(ident),
                    IdentifierMeta::MethodChanging => self.changing.push(ident),
                    _ => {}
                }
            }
        }
    }

    fn build_param(
        &self,
        param: &crate::nodes::NodeRef<'_>,
        meta: IdentifierMeta,
    ) -> Option<TypedIdentifier> {
        let name = param.find_first_expression(E::MethodParamName)?;
        let token = name.first_token()?.clone();
        let tokens = param.tokens();
        let type_start = tokens
            .iter()
            .position(|t| t.is("TYPE") || t.is("LIKE"))
            .unwrap_or(tokens.len());
        let ty = parse_type_clause(&tokens[type_start..]);
        Some(TypedIdentifier::new(
            token,
            &self.filename,
            ty,
            vec![meta],
        ))
    }

    fn collect_exceptions(&mut self, node: &StatementNode<'_>) {
        let tokens = node.tokens();
        let Some(start) = tokens
            .iter()
            .position(|t| t.is("RAISING") || t.is("EXCEPTIONS"))
        else {
            return;
        };
        for t in tokens.iter().skip(start + 1) {
            if t.text() == "." {
                break;
            }
            if !t.is("RESUMABLE") && t.text() != "(" && t.text() != ")" {
                self.exceptions.push(t.upper());
            }
        }
    }

    // ------------------------------------------------------------------
    // queries
    // ------------------------------------------------------------------

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn importing(&self) -> &[TypedIdentifier] {
        &self.importing
    }

    pub fn exporting(&self) -> &[TypedIdentifier] {
        &self.exporting
    }

    pub fn changing(&self) -> &[TypedIdentifier] {
        &self.changing
    }

    pub fn returning(&self) -> Option<&TypedIdentifier> {
        self.returning.as_ref()
    }

    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    pub fn exceptions(&self) -> &[String] {
        &self.exceptions
    }

    /// Every parameter including the returning one.
    pub fn all(&self) -> Vec<&TypedIdentifier> {
        let mut out: Vec<&TypedIdentifier> = Vec::new();
        if let Some(r) = &self.returning {
            out.push(r);
        }
        out.extend(self.importing.iter());
        out.extend(self.exporting.iter());
        out.extend(self.changing.iter());
        out
    }

    /// Importing and changing parameters the caller must supply.
    pub fn required_parameters(&self) -> Vec<&TypedIdentifier> {
        self.importing
            .iter()
            .chain(self.changing.iter())
            .filter(|p| !self.is_optional(&p.upper_name()))
            .collect()
    }

    pub fn parameter_default(&self, parameter: &str) -> Option<&str> {
        self.defaults
            .get(&parameter.to_uppercase())
            .map(String::as_str)
    }

    fn is_optional(&self, upper_name: &str) -> bool {
        self.optional.iter().any(|o| o == upper_name)
    }

    /// The importing parameter a bare positional argument binds to.
    ///
    /// Resolution: no importing parameters → `None`; exactly one → that
    /// one; several with a preferred name → the preferred name; several
    /// without → the sole non-optional one, else `None`.
    pub fn default_importing(&self) -> Option<String> {
        if self.importing.is_empty() {
            return None;
        }
        if self.importing.len() == 1 {
            return Some(self.importing[0].upper_name());
        }
        if let Some(p) = &self.preferred {
            return Some(p.clone());
        }
        let candidates: Vec<String> = self
            .importing
            .iter()
            .map(|i| i.upper_name())
            .filter(|n| !self.is_optional(n))
            .collect();
        if candidates.len() == 1 {
            return Some(candidates[0].clone());
        }
        None
    }
}

// ============================================================================
// Class definitions
// ============================================================================

/// Methods of a class, keyed by upper-cased name.
#[derive(Debug, Clone, Default)]
pub struct MethodDefinitions {
    map: BTreeMap<String, MethodParameters>,
}

impl MethodDefinitions {
    pub fn insert(&mut self, name: &str, params: MethodParameters) {
        self.map.insert(name.to_uppercase(), params);
    }

    pub fn by_name(&self, name: &str) -> Option<&MethodParameters> {
        self.map.get(&name.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A class definition as seen by scope resolution: its methods and events.
#[derive(Debug, Clone, Default)]
pub struct ClassDefinition {
    name: String,
    methods: MethodDefinitions,
    events: BTreeMap<String, Vec<TypedIdentifier>>,
}

impl ClassDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ClassDefinition {
            name: name.into(),
            ..ClassDefinition::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &MethodDefinitions {
        &self.methods
    }

    pub fn methods_mut(&mut self) -> &mut MethodDefinitions {
        &mut self.methods
    }

    pub fn add_event(&mut self, name: &str, params: Vec<TypedIdentifier>) {
        self.events.insert(name.to_uppercase(), params);
    }

    pub fn event(&self, name: &str) -> Option<&[TypedIdentifier]> {
        self.events.get(&name.to_uppercase()).map(Vec::as_slice)
    }
}

/// Token helper shared with the scope walker: declared name token of an
/// `EVENTS` statement parameter list.
pub(crate) fn event_parameters(
    node: &StatementNode<'_>,
    filename: &str,
) -> Option<(String, Vec<TypedIdentifier>)> {
    if node.kind() != StatementKind::Events {
        return None;
    }
    let name = node
        .find_direct_expression(E::Field)
        .map(|f| f.concat_tokens())?;
    let mut params = Vec::new();
    if let Some(section) = node.find_direct_expression(E::MethodDefExporting) {
        for param in section.find_direct_expressions(E::MethodParam) {
            let Some(pname) = param.find_first_expression(E::MethodParamName) else {
                continue;
            };
            let Some(token) = pname.first_token() else {
                continue;
            };
            let tokens = param.tokens();
            let type_start = tokens
                .iter()
                .position(|t: &&Token| t.is("TYPE") || t.is("LIKE"))
                .unwrap_or(tokens.len());
            let ty = parse_type_clause(&tokens[type_start..]);
            params.push(TypedIdentifier::new(
                token.clone(),
                filename,
                ty,
                vec![IdentifierMeta::EventParameter],
            ));
        }
    }
    Some((name, params))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse_statements;
    use crate::nodes::SyntaxTree;
    use crate::version::AbapVersion;

    fn tree_for(source: &str) -> SyntaxTree {
        parse_statements(&lex(source), AbapVersion::highest())
    }

    fn params_for(source: &str) -> MethodParameters {
        params_with_classes(source, &BTreeMap::new())
    }

    fn params_with_classes(
        source: &str,
        classes: &BTreeMap<String, ClassDefinition>,
    ) -> MethodParameters {
        let tree = tree_for(source);
        let node = tree.statement(0);
        MethodParameters::parse(&node, "zcl_foo.clas.abap", classes, &RegistryConfig::default())
    }

    mod default_importing {
        use super::*;

        #[test]
        fn no_importing_parameters() {
            let p = params_for("METHODS run RETURNING VALUE(rv) TYPE i.");
            assert_eq!(p.default_importing(), None);
        }

        #[test]
        fn single_importing_parameter() {
            let p = params_for("METHODS run IMPORTING iv_x TYPE i.");
            assert_eq!(p.default_importing().as_deref(), Some("IV_X"));
        }

        #[test]
        fn preferred_parameter_wins() {
            let p = params_for(
                "METHODS run IMPORTING iv_a TYPE i iv_b TYPE i PREFERRED PARAMETER iv_b.",
            );
            assert_eq!(p.default_importing().as_deref(), Some("IV_B"));
        }

        #[test]
        fn sole_non_optional_wins() {
            let p = params_for("METHODS run IMPORTING iv_a TYPE i iv_b TYPE i OPTIONAL.");
            assert_eq!(p.default_importing().as_deref(), Some("IV_A"));
        }

        #[test]
        fn ambiguous_returns_none() {
            let p = params_for("METHODS run IMPORTING iv_a TYPE i iv_b TYPE i.");
            assert_eq!(p.default_importing(), None);
        }
    }

    mod sections {
        use super::*;

        #[test]
        fn default_value_makes_optional() {
            let p = params_for("METHODS run IMPORTING iv_a TYPE i DEFAULT 42 iv_b TYPE i.");
            assert_eq!(p.optional(), &["IV_A".to_string()]);
            assert_eq!(p.parameter_default("iv_a"), Some("42"));
            assert_eq!(p.parameter_default("iv_b"), None);
            // the defaulted parameter no longer counts as required
            assert_eq!(p.default_importing().as_deref(), Some("IV_B"));
        }

        #[test]
        fn all_and_required() {
            let p = params_for(
                "METHODS run IMPORTING iv_a TYPE i iv_b TYPE i OPTIONAL CHANGING cv_c TYPE i RETURNING VALUE(rv) TYPE string.",
            );
            assert_eq!(p.all().len(), 4);
            let required: Vec<String> =
                p.required_parameters().iter().map(|i| i.upper_name()).collect();
            assert_eq!(required, vec!["IV_A".to_string(), "CV_C".to_string()]);
            assert_eq!(p.returning().unwrap().get_type(), &AbapType::StringType);
        }

        #[test]
        fn exceptions_collected() {
            let p = params_for("METHODS run IMPORTING iv_a TYPE i RAISING zcx_error cx_static.");
            assert_eq!(
                p.exceptions(),
                &["ZCX_ERROR".to_string(), "CX_STATIC".to_string()]
            );
        }
    }

    mod event_handlers {
        use super::*;

        fn classes_with_event() -> BTreeMap<String, ClassDefinition> {
            let mut def = ClassDefinition::new("zcl_button");
            let token = Token::new("row", downlift_core::Position::new(1, 1));
            def.add_event(
                "click",
                vec![TypedIdentifier::new(
                    token,
                    "zcl_button.clas.abap",
                    AbapType::Integer,
                    vec![IdentifierMeta::EventParameter],
                )],
            );
            let mut map = BTreeMap::new();
            map.insert("ZCL_BUTTON".to_string(), def);
            map
        }

        #[test]
        fn all_parameters_implicitly_optional() {
            let p = params_with_classes(
                "METHODS on_click FOR EVENT click OF zcl_button IMPORTING sender row.",
                &classes_with_event(),
            );
            assert_eq!(p.optional().len(), 2);
            assert_eq!(p.importing().len(), 2);
        }

        #[test]
        fn sender_typed_as_handler_class_ref() {
            let p = params_with_classes(
                "METHODS on_click FOR EVENT click OF zcl_button IMPORTING sender.",
                &classes_with_event(),
            );
            assert_eq!(
                p.importing()[0].get_type(),
                &AbapType::ObjectRef("zcl_button".to_string())
            );
        }

        #[test]
        fn event_parameter_resolved() {
            let p = params_with_classes(
                "METHODS on_click FOR EVENT click OF zcl_button IMPORTING row.",
                &classes_with_event(),
            );
            assert_eq!(p.importing()[0].get_type(), &AbapType::Integer);
        }

        #[test]
        fn unresolved_parameter_of_known_class_is_unknown_type() {
            let p = params_with_classes(
                "METHODS on_click FOR EVENT click OF zcl_button IMPORTING missing.",
                &classes_with_event(),
            );
            assert!(p.importing()[0].get_type().is_unknown());
        }

        #[test]
        fn unresolved_class_outside_namespace_is_void() {
            let p = params_for("METHODS on_click FOR EVENT click OF cl_gui_thing IMPORTING p1.");
            assert!(p.importing()[0].get_type().is_void());
        }

        #[test]
        fn unresolved_class_in_namespace_is_unknown() {
            let p = params_for("METHODS on_click FOR EVENT click OF zcl_missing IMPORTING p1.");
            assert!(p.importing()[0].get_type().is_unknown());
        }
    }
}
