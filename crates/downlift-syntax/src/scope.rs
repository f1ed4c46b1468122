//! Scope resolution: the precomputed position-to-symbol index the
//! downport engine reads ("spaghetti scope").
//!
//! [`SyntaxLogic::run`] walks the statement trees of one object and
//! produces a [`SyntaxResult`]: a tree of scope nodes with covering
//! spans (file → class → method/form, plus expression scopes for `LET` /
//! `FOR` bindings), each owning variables and a reference list. Class
//! definitions across the whole registry (dependencies included) are
//! collected first so constructor and event lookups resolve across
//! objects.
//!
//! The engine only reads this result; it never mutates it.

use std::collections::BTreeMap;

use downlift_core::Position;

use crate::nodes::{ExpressionKind as E, NodeRef, StatementKind, StatementNode};
use crate::params::{event_parameters, ClassDefinition, MethodParameters};
use crate::registry::{ParsedFile, Registry};
use crate::token::{adjacent, Token};
use crate::types::{parse_type_clause, AbapType, IdentifierMeta, TypedIdentifier};

/// Why a reference was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// The inferred type of a construct with no explicit type (`#`).
    InferredType,
    /// A resolved class/interface reference.
    ObjectOriented,
    /// A class reference voided because it lies outside the error namespace.
    ObjectOrientedVoid,
    /// A call site of a built-in function.
    BuiltinFunction,
    DataRead,
    DataWrite,
}

/// What a reference resolved to.
#[derive(Debug, Clone)]
pub enum ResolvedRef {
    Variable(TypedIdentifier),
    Class(String),
    None,
}

/// One entry of the reference index.
#[derive(Debug, Clone)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub token: Token,
    pub resolved: ResolvedRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    File,
    Class,
    Method,
    Form,
    Expression,
}

#[derive(Debug, Clone)]
struct ScopeNode {
    kind: ScopeKind,
    #[allow(dead_code)]
    name: String,
    filename: String,
    start: Position,
    end: Position,
    parent: Option<usize>,
    vars: Vec<TypedIdentifier>,
    refs: Vec<Reference>,
}

/// The scope-resolution result for one object.
#[derive(Debug, Clone, Default)]
pub struct SyntaxResult {
    scopes: Vec<ScopeNode>,
    classes: BTreeMap<String, ClassDefinition>,
}

/// A view into one scope node; variable lookups walk the ancestors.
#[derive(Debug, Clone, Copy)]
pub struct ScopeView<'a> {
    result: &'a SyntaxResult,
    index: usize,
}

impl SyntaxResult {
    /// Deepest scope covering `pos` in `filename`.
    pub fn lookup_position(&self, pos: Position, filename: &str) -> Option<ScopeView<'_>> {
        let mut best: Option<usize> = None;
        let mut best_depth = 0usize;
        for (i, node) in self.scopes.iter().enumerate() {
            if node.filename != filename {
                continue;
            }
            let contains = !pos.is_before(&node.start) && pos.is_before(&node.end);
            if !contains {
                continue;
            }
            let depth = self.depth(i);
            if best.is_none() || depth >= best_depth {
                best = Some(i);
                best_depth = depth;
            }
        }
        best.map(|index| ScopeView {
            result: self,
            index,
        })
    }

    pub fn class_definition(&self, name: &str) -> Option<&ClassDefinition> {
        self.classes.get(&name.to_uppercase())
    }

    fn depth(&self, mut index: usize) -> usize {
        let mut depth = 0;
        while let Some(parent) = self.scopes[index].parent {
            depth += 1;
            index = parent;
        }
        depth
    }
}

impl<'a> ScopeView<'a> {
    /// Case-insensitive variable lookup, walking scope ancestors.
    pub fn find_variable(&self, name: &str) -> Option<&'a TypedIdentifier> {
        let upper = name.to_uppercase();
        let mut index = Some(self.index);
        while let Some(i) = index {
            let node = &self.result.scopes[i];
            if let Some(found) = node.vars.iter().find(|v| v.upper_name() == upper) {
                return Some(found);
            }
            index = node.parent;
        }
        None
    }

    /// References recorded in this scope node.
    pub fn references(&self) -> &'a [Reference] {
        &self.result.scopes[self.index].refs
    }

    pub fn kind(&self) -> ScopeKind {
        self.result.scopes[self.index].kind
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Scope resolution entry point.
pub struct SyntaxLogic;

impl SyntaxLogic {
    /// Resolve scopes and references for `object_name` in `registry`.
    pub fn run(registry: &Registry, object_name: &str) -> SyntaxResult {
        let classes = collect_classes(registry);
        let mut walker = Walker {
            scopes: Vec::new(),
            stack: Vec::new(),
            classes: &classes,
            aliases: BTreeMap::new(),
            filename: String::new(),
            expr_scope: None,
        };
        if let Some(object) = registry.object(object_name) {
            for file in object.files() {
                walker.walk_file(file);
            }
        }
        SyntaxResult {
            scopes: walker.scopes,
            classes,
        }
    }
}

/// Collect class definitions (methods, events) across the whole registry.
fn collect_classes(registry: &Registry) -> BTreeMap<String, ClassDefinition> {
    let mut classes: BTreeMap<String, ClassDefinition> = BTreeMap::new();

    // events and class shells first, method signatures second: event
    // handler parameters resolve against any class in the registry
    for object in registry.objects() {
        for file in object.files() {
            let mut current: Option<String> = None;
            for stmt in file.statements() {
                match stmt.kind() {
                    StatementKind::ClassDefStart => {
                        let name = stmt
                            .find_direct_expression(E::ClassName)
                            .map(|c| c.concat_tokens())
                            .unwrap_or_default();
                        let upper = name.to_uppercase();
                        classes
                            .entry(upper.clone())
                            .or_insert_with(|| ClassDefinition::new(name));
                        current = Some(upper);
                    }
                    StatementKind::EndClass => current = None,
                    StatementKind::Events => {
                        if let Some(class) = &current {
                            if let Some((event, params)) =
                                event_parameters(&stmt, file.filename())
                            {
                                if let Some(def) = classes.get_mut(class) {
                                    def.add_event(&event, params);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    let mut methods: Vec<(String, String, MethodParameters)> = Vec::new();
    for object in registry.objects() {
        for file in object.files() {
            let mut current: Option<String> = None;
            for stmt in file.statements() {
                match stmt.kind() {
                    StatementKind::ClassDefStart => {
                        current = stmt
                            .find_direct_expression(E::ClassName)
                            .map(|c| c.concat_tokens().to_uppercase());
                    }
                    StatementKind::EndClass => current = None,
                    StatementKind::MethodDef => {
                        if let Some(class) = &current {
                            let name = stmt
                                .find_direct_expression(E::Field)
                                .map(|f| f.concat_tokens())
                                .unwrap_or_default();
                            let params = MethodParameters::parse(
                                &stmt,
                                file.filename(),
                                &classes,
                                registry.config(),
                            );
                            methods.push((class.clone(), name, params));
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    for (class, method, params) in methods {
        if let Some(def) = classes.get_mut(&class) {
            def.methods_mut().insert(&method, params);
        }
    }

    classes
}

struct Walker<'a> {
    scopes: Vec<ScopeNode>,
    stack: Vec<usize>,
    classes: &'a BTreeMap<String, ClassDefinition>,
    aliases: BTreeMap<String, AbapType>,
    filename: String,
    /// Expression scope of the statement being walked, if any; references
    /// recorded while walking the statement land here so position lookups
    /// inside the statement see them.
    expr_scope: Option<usize>,
}

impl Walker<'_> {
    fn walk_file(&mut self, file: &ParsedFile) {
        self.filename = file.filename().to_string();
        self.aliases.clear();
        self.stack.clear();
        let file_scope = self.push_scope(ScopeKind::File, "", Position::new(1, 1));

        for stmt in file.statements() {
            let Some(start) = stmt.start() else { continue };
            self.expr_scope = self.walk_expression_bindings(&stmt);
            match stmt.kind() {
                StatementKind::ClassDefStart | StatementKind::ClassImplStart => {
                    let name = stmt
                        .find_direct_expression(E::ClassName)
                        .map(|c| c.concat_tokens())
                        .unwrap_or_default();
                    self.push_scope(ScopeKind::Class, &name, start);
                }
                StatementKind::EndClass => self.pop_scope(&stmt, ScopeKind::Class),
                StatementKind::MethodImplStart => {
                    let name = stmt
                        .find_direct_expression(E::Field)
                        .map(|f| f.concat_tokens())
                        .unwrap_or_default();
                    let class = self.enclosing_name(ScopeKind::Class);
                    self.push_scope(ScopeKind::Method, &name, start);
                    self.inject_method_parameters(&class, &name);
                }
                StatementKind::EndMethod => self.pop_scope(&stmt, ScopeKind::Method),
                StatementKind::Form => {
                    let name = stmt
                        .find_direct_expression(E::Field)
                        .map(|f| f.concat_tokens())
                        .unwrap_or_default();
                    self.push_scope(ScopeKind::Form, &name, start);
                    self.inject_form_parameters(&stmt);
                }
                StatementKind::EndForm => self.pop_scope(&stmt, ScopeKind::Form),
                StatementKind::Data | StatementKind::Types => self.walk_declaration(&stmt),
                StatementKind::FieldSymbol => self.walk_field_symbol(&stmt),
                StatementKind::Select => self.walk_select(&stmt),
                StatementKind::Loop => self.walk_loop(&stmt),
                StatementKind::Move => self.walk_move(&stmt),
                _ => self.walk_generic_inline(&stmt),
            }
            self.record_builtin_references(&stmt);
            self.record_class_references(&stmt);
            self.expr_scope = None;
        }

        // close everything still open at end of file
        while self.stack.len() > 1 {
            let idx = self.stack.pop().unwrap();
            self.scopes[idx].end = Position::new(u32::MAX, u32::MAX);
        }
        let _ = file_scope;
        self.stack.pop();
    }

    // ------------------------------------------------------------------
    // scope maintenance
    // ------------------------------------------------------------------

    fn push_scope(&mut self, kind: ScopeKind, name: &str, start: Position) -> usize {
        let parent = self.stack.last().copied();
        self.scopes.push(ScopeNode {
            kind,
            name: name.to_string(),
            filename: self.filename.clone(),
            start,
            end: Position::new(u32::MAX, u32::MAX),
            parent,
            vars: Vec::new(),
            refs: Vec::new(),
        });
        let index = self.scopes.len() - 1;
        self.stack.push(index);
        index
    }

    fn pop_scope(&mut self, stmt: &StatementNode<'_>, expected: ScopeKind) {
        if self.stack.len() <= 1 {
            return;
        }
        let top = *self.stack.last().unwrap();
        if self.scopes[top].kind != expected {
            return;
        }
        if let Some(end) = stmt.end() {
            self.scopes[top].end = end;
        }
        self.stack.pop();
    }

    fn enclosing_name(&self, kind: ScopeKind) -> String {
        for &i in self.stack.iter().rev() {
            if self.scopes[i].kind == kind {
                return self.scopes[i].name.clone();
            }
        }
        String::new()
    }

    fn current_scope(&mut self) -> &mut ScopeNode {
        let idx = *self.stack.last().unwrap();
        &mut self.scopes[idx]
    }

    fn add_var(&mut self, var: TypedIdentifier) {
        self.current_scope().vars.push(var);
    }

    fn add_ref(&mut self, reference: Reference) {
        let idx = self
            .expr_scope
            .unwrap_or_else(|| *self.stack.last().unwrap());
        self.scopes[idx].refs.push(reference);
    }

    // ------------------------------------------------------------------
    // declarations
    // ------------------------------------------------------------------

    fn inject_method_parameters(&mut self, class: &str, method: &str) {
        let Some(def) = self.classes.get(&class.to_uppercase()) else {
            return;
        };
        let Some(params) = def.methods().by_name(method) else {
            return;
        };
        let vars: Vec<TypedIdentifier> = params.all().into_iter().cloned().collect();
        for var in vars {
            self.add_var(var);
        }
    }

    fn inject_form_parameters(&mut self, stmt: &StatementNode<'_>) {
        let tokens = stmt.tokens();
        let mut in_params = false;
        let mut skip_next = false;
        let mut vars = Vec::new();
        for (i, t) in tokens.iter().enumerate() {
            if t.is("USING") || t.is("CHANGING") || t.is("TABLES") {
                in_params = true;
                continue;
            }
            if !in_params {
                continue;
            }
            if skip_next {
                skip_next = false;
                continue;
            }
            if t.is("TYPE") || t.is("LIKE") || t.is("LENGTH") || t.is("DECIMALS") {
                skip_next = true;
                continue;
            }
            if t.is("STRUCTURE") {
                skip_next = true;
                continue;
            }
            if t.text() == "." {
                break;
            }
            let ty = parse_type_clause(&tokens[i + 1..]);
            vars.push(TypedIdentifier::new(
                (*t).clone(),
                &self.filename,
                ty,
                vec![IdentifierMeta::FormParameter],
            ));
        }
        for var in vars {
            self.add_var(var);
        }
    }

    /// `DATA` / `TYPES` declarations, including `:` chains and
    /// `BEGIN OF` structures.
    fn walk_declaration(&mut self, stmt: &StatementNode<'_>) {
        let is_types = stmt
            .first_token()
            .is_some_and(|t| t.is("TYPES"));
        let tokens = stmt.tokens();
        let mut body: &[&Token] = &tokens[1..];
        if body.first().is_some_and(|t| t.text() == ":") {
            body = &body[1..];
        }
        if body.last().is_some_and(|t| t.text() == ".") {
            body = &body[..body.len() - 1];
        }

        let mut structure: Option<(String, Vec<(String, AbapType)>)> = None;
        for part in split_top_level(body, ",") {
            if part.is_empty() {
                continue;
            }
            if part[0].is("BEGIN") {
                if let Some(name) = part.get(2) {
                    structure = Some((name.text().to_string(), Vec::new()));
                }
                continue;
            }
            if part[0].is("END") {
                if let Some((name, fields)) = structure.take() {
                    let ty = AbapType::Structure(fields);
                    if is_types {
                        self.aliases.insert(name.to_uppercase(), ty);
                    } else if let Some(tok) = part.get(2) {
                        self.add_var(TypedIdentifier::new(
                            (*tok).clone(),
                            &self.filename,
                            ty,
                            vec![IdentifierMeta::DataDefinition],
                        ));
                    }
                }
                continue;
            }

            let name = part[0];
            let ty = self.declared_type(&part[1..]);
            if let Some((_, fields)) = &mut structure {
                fields.push((name.text().to_string(), ty));
            } else if is_types {
                self.aliases.insert(name.upper(), ty);
            } else {
                self.add_var(TypedIdentifier::new(
                    name.clone(),
                    &self.filename,
                    ty,
                    vec![IdentifierMeta::DataDefinition],
                ));
            }
        }
    }

    fn declared_type(&mut self, clause: &[&Token]) -> AbapType {
        if clause.first().is_some_and(|t| t.is("LIKE")) {
            if clause.get(1).is_some_and(|t| t.is("LINE")) {
                // LIKE LINE OF tab
                let ty = clause
                    .get(3)
                    .map(|t| self.resolve(self.chain_type(t.text())))
                    .unwrap_or(AbapType::DataGeneric);
                return ty.row_type().cloned().unwrap_or(AbapType::DataGeneric);
            }
            return clause
                .get(1)
                .map(|t| self.chain_type(t.text()))
                .unwrap_or(AbapType::DataGeneric);
        }
        // aliases stay unresolved so declarations keep their qualified
        // names; resolution happens at component/row lookups
        parse_type_clause(clause)
    }

    fn walk_field_symbol(&mut self, stmt: &StatementNode<'_>) {
        let Some(name) = stmt.find_direct_expression(E::TargetFieldSymbol) else {
            return;
        };
        let Some(token) = name.first_token() else {
            return;
        };
        let tokens = stmt.tokens();
        let type_start = tokens
            .iter()
            .position(|t| t.is("TYPE") || t.is("LIKE"))
            .unwrap_or(tokens.len());
        let ty = parse_type_clause(&tokens[type_start..]);
        self.add_var(TypedIdentifier::new(
            token.clone(),
            &self.filename,
            ty,
            vec![IdentifierMeta::DataDefinition],
        ));
    }

    fn walk_select(&mut self, stmt: &StatementNode<'_>) {
        let table = stmt
            .find_first_expression(E::SqlFromSource)
            .and_then(|f| f.find_direct_expression(E::DatabaseTable))
            .map(|d| d.concat_tokens())
            .unwrap_or_else(|| "dbtab".to_string());
        for target in stmt.find_all_expressions_recursive(E::SqlTarget) {
            let Some(inline) = target.find_first_expression(E::InlineData) else {
                continue;
            };
            let Some(name) = inline
                .find_first_expression(E::TargetField)
                .and_then(|f| f.first_token())
            else {
                continue;
            };
            // database tables are not part of the analyzed program: void
            self.add_var(TypedIdentifier::new(
                name.clone(),
                &self.filename,
                AbapType::Void(table.clone()),
                vec![IdentifierMeta::InlineDefinition],
            ));
        }
    }

    fn walk_loop(&mut self, stmt: &StatementNode<'_>) {
        let row_type = stmt
            .find_direct_expression(E::SimpleSource)
            .map(|s| self.resolve(self.chain_type(&s.concat_tokens())))
            .and_then(|t| t.row_type().cloned())
            .unwrap_or_else(|| AbapType::Unknown("loop source not resolvable".to_string()));

        if let Some(target) = stmt.find_direct_expression(E::Target) {
            if let Some(inline) = target.find_direct_expression(E::InlineData) {
                if let Some(name) = inline
                    .find_first_expression(E::TargetField)
                    .and_then(|f| f.first_token())
                {
                    self.add_var(TypedIdentifier::new(
                        name.clone(),
                        &self.filename,
                        row_type.clone(),
                        vec![IdentifierMeta::InlineDefinition],
                    ));
                }
            }
        }
        if let Some(fs_target) = stmt.find_direct_expression(E::FsTarget) {
            if let Some(inline) = fs_target.find_direct_expression(E::InlineFs) {
                if let Some(name) = inline
                    .find_first_expression(E::TargetFieldSymbol)
                    .and_then(|f| f.first_token())
                {
                    self.add_var(TypedIdentifier::new(
                        name.clone(),
                        &self.filename,
                        row_type,
                        vec![IdentifierMeta::InlineDefinition],
                    ));
                }
            }
        }
    }

    fn walk_move(&mut self, stmt: &StatementNode<'_>) {
        let source = stmt.find_direct_expression(E::Source);

        // inline declarations pick up the inferred type of the source
        if let Some(target) = stmt.find_direct_expression(E::Target) {
            if let Some(inline) = target.find_direct_expression(E::InlineData) {
                if let Some(name) = inline
                    .find_first_expression(E::TargetField)
                    .and_then(|f| f.first_token())
                {
                    let ty = source
                        .as_ref()
                        .map(|s| self.infer_source_type(s))
                        .unwrap_or(AbapType::DataGeneric);
                    self.add_var(TypedIdentifier::new(
                        name.clone(),
                        &self.filename,
                        ty,
                        vec![IdentifierMeta::InlineDefinition],
                    ));
                    return;
                }
            }
        }
        if let Some(fs_target) = stmt.find_direct_expression(E::FsTarget) {
            if let Some(inline) = fs_target.find_direct_expression(E::InlineFs) {
                if let Some(name) = inline
                    .find_first_expression(E::TargetFieldSymbol)
                    .and_then(|f| f.first_token())
                {
                    let ty = source
                        .as_ref()
                        .map(|s| self.infer_source_type(s))
                        .unwrap_or(AbapType::DataGeneric);
                    self.add_var(TypedIdentifier::new(
                        name.clone(),
                        &self.filename,
                        ty,
                        vec![IdentifierMeta::InlineDefinition],
                    ));
                    return;
                }
            }
        }

        // a typed (non-inline) target feeds inferred-type references for
        // `#` constructors on the right-hand side
        let target_type = stmt
            .find_direct_expression(E::Target)
            .map(|t| self.chain_type(&t.concat_tokens()));
        let Some(target_type) = target_type else {
            return;
        };
        if target_type.is_unknown() {
            return;
        }
        let Some(source) = source else { return };

        self.record_inferred_type_refs(&source, &target_type);
    }

    fn record_inferred_type_refs(&mut self, source: &NodeRef<'_>, target_type: &AbapType) {
        // the direct constructor of the source, if any
        let tni = source
            .find_direct_expression(E::TypeNameOrInfer)
            .or_else(|| {
                source
                    .find_direct_expression(E::NewObject)
                    .and_then(|n| n.find_direct_expression(E::TypeNameOrInfer))
            })
            .or_else(|| {
                source
                    .find_direct_expression(E::CastConstructor)
                    .and_then(|c| c.find_direct_expression(E::TypeNameOrInfer))
            });
        let Some(tni) = tni else { return };
        if tni.concat_tokens() != "#" {
            return;
        }
        let Some(token) = tni.first_token() else { return };

        self.add_ref(Reference {
            kind: ReferenceKind::InferredType,
            token: token.clone(),
            resolved: ResolvedRef::Variable(TypedIdentifier::new(
                token.clone(),
                &self.filename,
                target_type.clone(),
                vec![IdentifierMeta::InlineDefinition],
            )),
        });

        // object construction also resolves the class itself
        if let AbapType::ObjectRef(class) = target_type {
            if self.classes.contains_key(&class.to_uppercase()) {
                self.add_ref(Reference {
                    kind: ReferenceKind::ObjectOriented,
                    token: token.clone(),
                    resolved: ResolvedRef::Class(class.to_uppercase()),
                });
            }
        }
    }

    /// Inline declarations inside statements the walker has no dedicated
    /// handler for. `ASSIGN source TO FIELD-SYMBOL(<x>)` types the symbol
    /// from its source; everything else stays unknown, which downstream
    /// rules report as detected-but-not-fixable.
    fn walk_generic_inline(&mut self, stmt: &StatementNode<'_>) {
        let assign_type = stmt.first_token().filter(|t| t.is("ASSIGN")).and_then(|_| {
            stmt.tokens()
                .get(1)
                .map(|t| self.chain_type(t.text()))
        });

        let mut vars = Vec::new();
        for inline in stmt.find_all_expressions_recursive(E::InlineData) {
            if let Some(name) = inline
                .find_first_expression(E::TargetField)
                .and_then(|f| f.first_token())
            {
                vars.push(TypedIdentifier::new(
                    name.clone(),
                    &self.filename,
                    AbapType::Unknown("inline declaration not inferred".to_string()),
                    vec![IdentifierMeta::InlineDefinition],
                ));
            }
        }
        for inline in stmt.find_all_expressions_recursive(E::InlineFs) {
            if let Some(name) = inline
                .find_first_expression(E::TargetFieldSymbol)
                .and_then(|f| f.first_token())
            {
                let ty = assign_type
                    .clone()
                    .unwrap_or_else(|| AbapType::Unknown("inline declaration not inferred".to_string()));
                vars.push(TypedIdentifier::new(
                    name.clone(),
                    &self.filename,
                    ty,
                    vec![IdentifierMeta::InlineDefinition],
                ));
            }
        }
        for var in vars {
            self.add_var(var);
        }
    }

    /// `LET` / `FOR` / `INIT` bindings live in an expression scope that
    /// spans the statement. Returns the scope index when one was created.
    fn walk_expression_bindings(&mut self, stmt: &StatementNode<'_>) -> Option<usize> {
        let mut vars: Vec<TypedIdentifier> = Vec::new();

        for def in stmt.find_all_expressions_recursive(E::InlineFieldDefinition) {
            let Some(name) = def.find_direct_expression(E::Field).and_then(|f| f.first_token())
            else {
                continue;
            };
            let ty = def
                .find_direct_expression(E::Source)
                .map(|s| self.infer_source_type(&s))
                .unwrap_or(AbapType::DataGeneric);
            vars.push(TypedIdentifier::new(
                name.clone(),
                &self.filename,
                ty,
                vec![IdentifierMeta::InlineDefinition],
            ));
        }

        for def in stmt.find_all_expressions_recursive(E::InlineLoopDefinition) {
            let row = def
                .find_first_expression(E::Source)
                .map(|s| self.resolve(self.infer_source_type(&s)))
                .and_then(|t| t.row_type().cloned())
                .unwrap_or_else(|| AbapType::Unknown("loop source not resolvable".to_string()));
            let name = def
                .find_direct_expression(E::TargetField)
                .or_else(|| def.find_direct_expression(E::TargetFieldSymbol))
                .and_then(|f| f.first_token());
            if let Some(name) = name {
                vars.push(TypedIdentifier::new(
                    name.clone(),
                    &self.filename,
                    row,
                    vec![IdentifierMeta::InlineDefinition],
                ));
            }
        }

        if vars.is_empty() {
            return None;
        }
        let (Some(start), Some(end)) = (stmt.start(), stmt.end()) else {
            return None;
        };
        let idx = self.push_scope(ScopeKind::Expression, "", start);
        self.scopes[idx].end = end;
        for var in vars {
            self.add_var(var);
        }
        self.stack.pop();
        Some(idx)
    }

    // ------------------------------------------------------------------
    // references
    // ------------------------------------------------------------------

    fn record_builtin_references(&mut self, stmt: &StatementNode<'_>) {
        let tokens = stmt.tokens();
        let mut refs = Vec::new();
        for (i, t) in tokens.iter().enumerate() {
            if !t.is("XSDBOOL") {
                continue;
            }
            let call = tokens
                .get(i + 1)
                .is_some_and(|n| n.text() == "(" && adjacent(t, n));
            if call {
                refs.push(Reference {
                    kind: ReferenceKind::BuiltinFunction,
                    token: (*t).clone(),
                    resolved: ResolvedRef::None,
                });
            }
        }
        for r in refs {
            self.add_ref(r);
        }
    }

    fn record_class_references(&mut self, stmt: &StatementNode<'_>) {
        let mut refs = Vec::new();
        for new_obj in stmt.find_all_expressions_recursive(E::NewObject) {
            let Some(tni) = new_obj.find_direct_expression(E::TypeNameOrInfer) else {
                continue;
            };
            let name = tni.concat_tokens();
            if name == "#" {
                continue; // handled via the inferred-type path
            }
            let Some(token) = tni.first_token() else { continue };
            if self.classes.contains_key(&name.to_uppercase()) {
                refs.push(Reference {
                    kind: ReferenceKind::ObjectOriented,
                    token: token.clone(),
                    resolved: ResolvedRef::Class(name.to_uppercase()),
                });
            } else {
                refs.push(Reference {
                    kind: ReferenceKind::ObjectOrientedVoid,
                    token: token.clone(),
                    resolved: ResolvedRef::None,
                });
            }
        }
        for r in refs {
            self.add_ref(r);
        }
    }

    // ------------------------------------------------------------------
    // inference
    // ------------------------------------------------------------------

    fn resolve(&self, ty: AbapType) -> AbapType {
        match ty {
            AbapType::Named(ref n) => self
                .aliases
                .get(&n.to_uppercase())
                .cloned()
                .unwrap_or(ty),
            AbapType::Table { row } => AbapType::Table {
                row: Box::new(self.resolve(*row)),
            },
            other => other,
        }
    }

    fn find_var(&self, name: &str) -> Option<&TypedIdentifier> {
        let upper = name.to_uppercase();
        for &i in self.stack.iter().rev() {
            if let Some(found) = self.scopes[i].vars.iter().find(|v| v.upper_name() == upper) {
                return Some(found);
            }
        }
        None
    }

    /// Type of a field chain rendered as text (`var`, `var-comp`).
    fn chain_type(&self, chain: &str) -> AbapType {
        let chain = chain.trim();
        if let Some((base, comp)) = chain.split_once('-') {
            if let Some(var) = self.find_var(base) {
                let base_ty = self.resolve(var.get_type().clone());
                if let Some(found) = base_ty.component(comp) {
                    return found.clone();
                }
                if base_ty.is_void() {
                    return base_ty;
                }
            }
            return AbapType::Unknown(format!("component not resolvable: {chain}"));
        }
        match self.find_var(chain) {
            Some(var) => var.get_type().clone(),
            None => AbapType::Unknown(format!("variable not found: {chain}")),
        }
    }

    /// Return type of a functional call: `meth( )`, `obj->meth( )`,
    /// `cl=>meth( )`, or a known builtin.
    fn method_return_type(&self, name: &str) -> AbapType {
        match name.to_lowercase().as_str() {
            "xsdbool" | "boolc" => return AbapType::Named("abap_bool".to_string()),
            "lines" | "strlen" => return AbapType::Integer,
            "condense" | "to_upper" | "to_lower" | "shift_left" | "shift_right" => {
                return AbapType::StringType
            }
            _ => {}
        }

        let (class, method) = if let Some((cls, meth)) = name.split_once("=>") {
            (Some(cls.to_uppercase()), meth)
        } else if let Some((base, meth)) = name.split_once("->") {
            let cls = self.find_var(base).and_then(|v| match v.get_type() {
                AbapType::ObjectRef(c) => Some(c.to_uppercase()),
                _ => None,
            });
            (cls, meth)
        } else {
            let cls = self.enclosing_name(ScopeKind::Class);
            let cls = (!cls.is_empty()).then(|| cls.to_uppercase());
            (cls, name)
        };

        let Some(class) = class else {
            return AbapType::Unknown(format!("method call result: {name}"));
        };
        self.classes
            .get(&class)
            .and_then(|d| d.methods().by_name(method))
            .and_then(|m| m.returning())
            .map(|r| r.get_type().clone())
            .unwrap_or_else(|| AbapType::Unknown(format!("method call result: {name}")))
    }

    fn infer_source_type(&self, source: &NodeRef<'_>) -> AbapType {
        let children = source.children();

        if let Some(tni) = source.find_direct_expression(E::TypeNameOrInfer) {
            // VALUE / REDUCE / COND / CONV with an explicit or inferred type
            let name = tni.concat_tokens();
            if name == "#" {
                return AbapType::Unknown("inferred constructor type".to_string());
            }
            return self.resolve(named_or_builtin(&name));
        }

        if children.len() == 1 {
            let child = &children[0];
            match child.kind() {
                Some(E::FieldChain) => return self.infer_chain(child),
                Some(E::NewObject) | Some(E::CastConstructor) => {
                    let name = child
                        .find_direct_expression(E::TypeNameOrInfer)
                        .map(|t| t.concat_tokens())
                        .unwrap_or_default();
                    if name == "#" {
                        return AbapType::Unknown("inferred constructor type".to_string());
                    }
                    return AbapType::ObjectRef(name);
                }
                Some(E::StringTemplate) => return AbapType::StringType,
                None => {
                    if let Some(token) = child.token() {
                        return self.literal_or_var(token);
                    }
                }
                _ => {}
            }
        }

        AbapType::Unknown("source type not inferred".to_string())
    }

    fn infer_chain(&self, chain: &NodeRef<'_>) -> AbapType {
        if chain.find_direct_expression(E::TableExpression).is_some() {
            // tab[ ... ] yields the row type
            let base = chain
                .first_token()
                .map(|t| self.resolve(self.chain_type(t.text())))
                .unwrap_or(AbapType::DataGeneric);
            return base
                .row_type()
                .cloned()
                .unwrap_or_else(|| AbapType::Unknown("table expression base".to_string()));
        }
        if let Some(length) = chain.find_direct_expression(E::FieldLength) {
            // offset/length access yields a character slice
            let digits = length
                .tokens()
                .iter()
                .find_map(|t| t.text().parse::<u32>().ok());
            return match digits {
                Some(n) => AbapType::Character { length: n },
                None => AbapType::Unknown("offset/length not literal".to_string()),
            };
        }
        if chain.find_direct_expression(E::FieldOffset).is_some() {
            return AbapType::Unknown("offset without length".to_string());
        }
        let tokens = chain.tokens();
        if tokens.len() == 1 {
            return self.literal_or_var(tokens[0]);
        }
        if tokens.get(1).is_some_and(|t| t.text() == "(") {
            return self.method_return_type(tokens[0].text());
        }
        self.chain_type(&chain.concat_tokens())
    }

    fn literal_or_var(&self, token: &Token) -> AbapType {
        let text = token.text();
        if text.starts_with('\'') {
            let len = text.chars().count().saturating_sub(2).max(1) as u32;
            return AbapType::Character { length: len };
        }
        if text.starts_with('|') {
            return AbapType::StringType;
        }
        if text.chars().next().is_some_and(|c| c.is_ascii_digit())
            || (text.starts_with('-') && text.len() > 1)
        {
            return AbapType::Integer;
        }
        self.chain_type(text)
    }
}

fn named_or_builtin(name: &str) -> AbapType {
    match name.to_lowercase().as_str() {
        "i" => AbapType::Integer,
        "string" => AbapType::StringType,
        other => AbapType::Named(other.to_string()),
    }
}

/// Split a token run on a separator at paren/bracket depth zero.
fn split_top_level<'t>(tokens: &[&'t Token], sep: &str) -> Vec<Vec<&'t Token>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0i32;
    for &t in tokens {
        match t.text() {
            "(" | "[" => depth += 1,
            ")" | "]" => depth -= 1,
            _ => {}
        }
        if depth == 0 && t.text() == sep {
            out.push(std::mem::take(&mut current));
            continue;
        }
        current.push(t);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryConfig;
    use crate::version::AbapVersion;

    fn result_for(source: &str) -> SyntaxResult {
        let mut reg = Registry::new(RegistryConfig {
            version: AbapVersion::highest(),
            ..RegistryConfig::default()
        });
        reg.add_file("zprog.prog.abap", source);
        reg.parse();
        SyntaxLogic::run(&reg, "ZPROG")
    }

    fn view<'a>(result: &'a SyntaxResult, row: u32, col: u32) -> ScopeView<'a> {
        result
            .lookup_position(Position::new(row, col), "zprog.prog.abap")
            .unwrap()
    }

    mod lookup {
        use super::*;

        #[test]
        fn file_scope_variables() {
            let result = result_for("DATA lv_count TYPE i.\nlv_count = 1.\n");
            let scope = view(&result, 2, 1);
            let var = scope.find_variable("LV_COUNT").unwrap();
            assert_eq!(var.get_type(), &AbapType::Integer);
            assert!(scope.find_variable("missing").is_none());
        }

        #[test]
        fn declaration_chains() {
            let result = result_for("DATA: a TYPE i, b TYPE string.\n");
            let scope = view(&result, 1, 1);
            assert_eq!(scope.find_variable("a").unwrap().get_type(), &AbapType::Integer);
            assert_eq!(scope.find_variable("B").unwrap().get_type(), &AbapType::StringType);
        }

        #[test]
        fn structure_types_resolve_components() {
            let result = result_for(
                "TYPES: BEGIN OF ty_line, comp TYPE i, name TYPE string, END OF ty_line.\nDATA ls TYPE ty_line.\nDATA(x) = ls-name.\n",
            );
            let scope = view(&result, 3, 1);
            let var = scope.find_variable("x").unwrap();
            assert_eq!(var.get_type(), &AbapType::StringType);
        }

        #[test]
        fn method_scope_sees_parameters() {
            let result = result_for(
                "CLASS zcl_demo DEFINITION.\nMETHODS run IMPORTING iv_x TYPE i.\nENDCLASS.\nCLASS zcl_demo IMPLEMENTATION.\nMETHOD run.\nDATA lv TYPE i.\nENDMETHOD.\nENDCLASS.\n",
            );
            let scope = view(&result, 6, 1);
            assert!(scope.find_variable("iv_x").is_some());
            assert!(scope.find_variable("lv").is_some());
        }

        #[test]
        fn method_variables_invisible_outside() {
            let result = result_for(
                "CLASS zcl_demo DEFINITION.\nMETHODS run.\nENDCLASS.\nCLASS zcl_demo IMPLEMENTATION.\nMETHOD run.\nDATA lv_inner TYPE i.\nENDMETHOD.\nENDCLASS.\nDATA lv_outer TYPE i.\n",
            );
            let scope = view(&result, 9, 1);
            assert!(scope.find_variable("lv_outer").is_some());
            assert!(scope.find_variable("lv_inner").is_none());
        }
    }

    mod inference {
        use super::*;

        #[test]
        fn inline_from_integer_literal() {
            let result = result_for("DATA(x) = 1.\n");
            let scope = view(&result, 1, 1);
            assert_eq!(scope.find_variable("x").unwrap().get_type(), &AbapType::Integer);
        }

        #[test]
        fn inline_from_variable() {
            let result = result_for("DATA src TYPE string.\nDATA(dst) = src.\n");
            let scope = view(&result, 2, 1);
            assert_eq!(
                scope.find_variable("dst").unwrap().get_type(),
                &AbapType::StringType
            );
        }

        #[test]
        fn inline_from_value_with_explicit_type() {
            let result = result_for("DATA(x) = VALUE zty_thing( ).\n");
            let scope = view(&result, 1, 1);
            assert_eq!(
                scope.find_variable("x").unwrap().get_type(),
                &AbapType::Named("zty_thing".to_string())
            );
        }

        #[test]
        fn loop_inline_target_gets_row_type() {
            let result = result_for(
                "TYPES ty_line TYPE i.\nDATA tab TYPE STANDARD TABLE OF ty_line.\nLOOP AT tab INTO DATA(row).\nENDLOOP.\n",
            );
            let scope = view(&result, 3, 1);
            assert_eq!(scope.find_variable("row").unwrap().get_type(), &AbapType::Integer);
        }

        #[test]
        fn select_inline_target_is_void() {
            let result = result_for("SELECT SINGLE f1 FROM ztab INTO @DATA(ls).\n");
            let scope = view(&result, 1, 1);
            assert!(scope.find_variable("ls").unwrap().get_type().is_void());
        }
    }

    mod references {
        use super::*;

        #[test]
        fn inferred_type_recorded_at_hash() {
            let result = result_for("DATA tgt TYPE i.\ntgt = CONV #( '1' ).\n");
            // the # sits at row 2
            let scope = view(&result, 2, 1);
            let found = scope
                .references()
                .iter()
                .find(|r| r.kind == ReferenceKind::InferredType)
                .unwrap();
            match &found.resolved {
                ResolvedRef::Variable(v) => assert_eq!(v.get_type(), &AbapType::Integer),
                other => panic!("unexpected resolution: {other:?}"),
            }
        }

        #[test]
        fn builtin_reference_for_xsdbool() {
            let result = result_for("DATA b TYPE i.\nb = xsdbool( 1 = 1 ).\n");
            let scope = view(&result, 2, 1);
            assert!(scope
                .references()
                .iter()
                .any(|r| r.kind == ReferenceKind::BuiltinFunction));
        }

        #[test]
        fn class_reference_for_new() {
            let result = result_for(
                "CLASS zcl_thing DEFINITION.\nENDCLASS.\nCLASS zcl_thing IMPLEMENTATION.\nENDCLASS.\nDATA o TYPE REF TO zcl_thing.\no = NEW zcl_thing( ).\n",
            );
            let scope = view(&result, 6, 1);
            let found = scope
                .references()
                .iter()
                .find(|r| r.kind == ReferenceKind::ObjectOriented)
                .unwrap();
            match &found.resolved {
                ResolvedRef::Class(c) => assert_eq!(c, "ZCL_THING"),
                other => panic!("unexpected resolution: {other:?}"),
            }
        }

        #[test]
        fn let_bindings_get_expression_scope() {
            let result = result_for("DATA tgt TYPE i.\ntgt = VALUE i( LET a = 1 IN a ).\n");
            let scope = view(&result, 2, 20);
            assert!(scope.find_variable("a").is_some());
            // expression scope does not leak into the rest of the file
            let outer = view(&result, 1, 1);
            assert!(outer.find_variable("a").is_none());
        }
    }
}
