//! Statement and expression trees.
//!
//! Trees are stored in a per-file arena ([`SyntaxTree`]) with integer
//! handles. Nodes are either expression nodes (a closed
//! [`ExpressionKind`] plus child handles) or token leaves. Statements sit
//! on top as a flat list, each owning its direct children. There are no
//! parent pointers; navigation is always downward from a statement or an
//! expression node.
//!
//! [`StatementNode`] and [`NodeRef`] are lightweight borrowed views that
//! carry the arena reference, so rule code can navigate without touching
//! handle arithmetic.

use crate::token::{concat, Token};

/// Handle into a [`SyntaxTree`] arena.
pub type NodeId = usize;

/// Which statement production matched.
///
/// `Unknown` means the statement failed to parse under the active grammar
/// version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Unknown,
    Comment,
    Move,
    Data,
    Types,
    FieldSymbol,
    Select,
    Loop,
    EndLoop,
    Raise,
    InterfaceDef,
    MethodDef,
    Events,
    ClassDefStart,
    ClassImplStart,
    EndClass,
    MethodImplStart,
    EndMethod,
    Form,
    EndForm,
    CreateObject,
    CallFunction,
    Other,
}

/// Which expression production matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    Source,
    SimpleSource,
    Target,
    TargetField,
    TargetFieldSymbol,
    InlineData,
    InlineFs,
    FsTarget,
    FieldChain,
    FieldOffset,
    FieldLength,
    TableExpression,
    NewObject,
    CastConstructor,
    ValueBody,
    ReduceBody,
    ReduceNext,
    CondBody,
    Cond,
    ConvBody,
    TypeNameOrInfer,
    ClassName,
    ParameterList,
    FieldAssignment,
    Field,
    LetExpression,
    InlineFieldDefinition,
    InlineLoopDefinition,
    StringTemplate,
    StringTemplateSource,
    StringTemplateFormatting,
    SqlIntoStructure,
    SqlIntoTable,
    SqlTarget,
    SqlSource,
    SqlFromSource,
    DatabaseTable,
    SqlFieldList,
    SqlFieldName,
    TypeTable,
    TypeTableKey,
    MethodDefImporting,
    MethodDefExporting,
    MethodDefChanging,
    MethodDefReturning,
    MethodParam,
    MethodParamName,
    EventHandler,
    DefaultValue,
}

#[derive(Debug, Clone)]
enum NodeData {
    Expr {
        kind: ExpressionKind,
        children: Vec<NodeId>,
    },
    Tok(Token),
}

#[derive(Debug, Clone)]
struct StatementData {
    kind: StatementKind,
    children: Vec<NodeId>,
}

/// Arena owning all nodes of one parsed file.
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    statements: Vec<StatementData>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        SyntaxTree::default()
    }

    pub fn add_token(&mut self, token: Token) -> NodeId {
        self.nodes.push(NodeData::Tok(token));
        self.nodes.len() - 1
    }

    pub fn add_expr(&mut self, kind: ExpressionKind, children: Vec<NodeId>) -> NodeId {
        self.nodes.push(NodeData::Expr { kind, children });
        self.nodes.len() - 1
    }

    pub fn add_statement(&mut self, kind: StatementKind, children: Vec<NodeId>) -> usize {
        self.statements.push(StatementData { kind, children });
        self.statements.len() - 1
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    pub fn statement(&self, index: usize) -> StatementNode<'_> {
        StatementNode { tree: self, index }
    }

    pub fn statements(&self) -> impl Iterator<Item = StatementNode<'_>> {
        (0..self.statements.len()).map(move |i| self.statement(i))
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id]
    }

    fn collect_tokens<'a>(&'a self, id: NodeId, out: &mut Vec<&'a Token>) {
        match self.node(id) {
            NodeData::Tok(t) => out.push(t),
            NodeData::Expr { children, .. } => {
                for &c in children {
                    self.collect_tokens(c, out);
                }
            }
        }
    }
}

// ============================================================================
// Borrowed views
// ============================================================================

/// A statement with its arena.
#[derive(Debug, Clone, Copy)]
pub struct StatementNode<'a> {
    tree: &'a SyntaxTree,
    index: usize,
}

/// An expression or token node with its arena.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a SyntaxTree,
    id: NodeId,
}

impl<'a> StatementNode<'a> {
    pub fn kind(&self) -> StatementKind {
        self.tree.statements[self.index].kind
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn children(&self) -> Vec<NodeRef<'a>> {
        self.tree.statements[self.index]
            .children
            .iter()
            .map(|&id| NodeRef {
                tree: self.tree,
                id,
            })
            .collect()
    }

    pub fn tokens(&self) -> Vec<&'a Token> {
        let mut out = Vec::new();
        for &id in &self.tree.statements[self.index].children {
            self.tree.collect_tokens(id, &mut out);
        }
        out
    }

    pub fn first_token(&self) -> Option<&'a Token> {
        self.tokens().first().copied()
    }

    pub fn last_token(&self) -> Option<&'a Token> {
        self.tokens().last().copied()
    }

    /// Start position of the statement's first token.
    pub fn start(&self) -> Option<downlift_core::Position> {
        self.first_token().map(|t| t.start())
    }

    /// End position (one past) of the statement's last token.
    pub fn end(&self) -> Option<downlift_core::Position> {
        self.last_token().map(|t| t.end())
    }

    pub fn concat_tokens(&self) -> String {
        concat(&self.tokens())
    }

    pub fn find_first_expression(&self, kind: ExpressionKind) -> Option<NodeRef<'a>> {
        for child in self.children() {
            if let Some(found) = child.find_self_or_first(kind) {
                return Some(found);
            }
        }
        None
    }

    /// All matches in the subtree, not descending into a match.
    pub fn find_all_expressions(&self, kind: ExpressionKind) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        for child in self.children() {
            child.collect_matches(kind, false, &mut out);
        }
        out
    }

    /// All matches in the subtree, including nested ones.
    pub fn find_all_expressions_recursive(&self, kind: ExpressionKind) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        for child in self.children() {
            child.collect_matches(kind, true, &mut out);
        }
        out
    }

    pub fn find_direct_expression(&self, kind: ExpressionKind) -> Option<NodeRef<'a>> {
        self.children().into_iter().find(|c| c.is_expression(kind))
    }

    pub fn find_direct_expressions(&self, kind: ExpressionKind) -> Vec<NodeRef<'a>> {
        self.children()
            .into_iter()
            .filter(|c| c.is_expression(kind))
            .collect()
    }

    /// Direct token child with the given (case-insensitive) text.
    pub fn find_direct_token_by_text(&self, text: &str) -> Option<&'a Token> {
        self.children()
            .into_iter()
            .filter_map(|c| c.token())
            .find(|t| t.is(text))
    }

    pub fn direct_tokens(&self) -> Vec<&'a Token> {
        self.children().into_iter().filter_map(|c| c.token()).collect()
    }
}

impl<'a> NodeRef<'a> {
    /// Arena handle; stable within one tree, usable as node identity.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> Option<ExpressionKind> {
        match self.tree.node(self.id) {
            NodeData::Expr { kind, .. } => Some(*kind),
            NodeData::Tok(_) => None,
        }
    }

    pub fn is_expression(&self, kind: ExpressionKind) -> bool {
        self.kind() == Some(kind)
    }

    pub fn token(&self) -> Option<&'a Token> {
        match self.tree.node(self.id) {
            NodeData::Tok(t) => Some(t),
            NodeData::Expr { .. } => None,
        }
    }

    pub fn children(&self) -> Vec<NodeRef<'a>> {
        match self.tree.node(self.id) {
            NodeData::Expr { children, .. } => children
                .iter()
                .map(|&id| NodeRef {
                    tree: self.tree,
                    id,
                })
                .collect(),
            NodeData::Tok(_) => Vec::new(),
        }
    }

    pub fn first_child(&self) -> Option<NodeRef<'a>> {
        self.children().into_iter().next()
    }

    pub fn tokens(&self) -> Vec<&'a Token> {
        let mut out = Vec::new();
        self.tree.collect_tokens(self.id, &mut out);
        out
    }

    pub fn first_token(&self) -> Option<&'a Token> {
        self.tokens().first().copied()
    }

    pub fn last_token(&self) -> Option<&'a Token> {
        self.tokens().last().copied()
    }

    pub fn concat_tokens(&self) -> String {
        concat(&self.tokens())
    }

    fn find_self_or_first(&self, kind: ExpressionKind) -> Option<NodeRef<'a>> {
        if self.is_expression(kind) {
            return Some(*self);
        }
        for child in self.children() {
            if let Some(found) = child.find_self_or_first(kind) {
                return Some(found);
            }
        }
        None
    }

    fn collect_matches(&self, kind: ExpressionKind, recursive: bool, out: &mut Vec<NodeRef<'a>>) {
        if self.is_expression(kind) {
            out.push(*self);
            if !recursive {
                return;
            }
        }
        for child in self.children() {
            child.collect_matches(kind, recursive, out);
        }
    }

    pub fn find_first_expression(&self, kind: ExpressionKind) -> Option<NodeRef<'a>> {
        for child in self.children() {
            if let Some(found) = child.find_self_or_first(kind) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_all_expressions(&self, kind: ExpressionKind) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        for child in self.children() {
            child.collect_matches(kind, false, &mut out);
        }
        out
    }

    pub fn find_direct_expression(&self, kind: ExpressionKind) -> Option<NodeRef<'a>> {
        self.children().into_iter().find(|c| c.is_expression(kind))
    }

    pub fn find_direct_expressions(&self, kind: ExpressionKind) -> Vec<NodeRef<'a>> {
        self.children()
            .into_iter()
            .filter(|c| c.is_expression(kind))
            .collect()
    }

    pub fn find_direct_token_by_text(&self, text: &str) -> Option<&'a Token> {
        self.children()
            .into_iter()
            .filter_map(|c| c.token())
            .find(|t| t.is(text))
    }

    pub fn direct_tokens(&self) -> Vec<&'a Token> {
        self.children().into_iter().filter_map(|c| c.token()).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use downlift_core::Position;

    fn tok(text: &str, col: u32) -> Token {
        Token::new(text, Position::new(1, col))
    }

    fn sample_tree() -> SyntaxTree {
        // DATA(x) = 1.  as  Move[Target[InlineData[DATA ( TargetField[x] )]], =, Source[FieldChain[1]], .]
        let mut tree = SyntaxTree::new();
        let t_data = tree.add_token(tok("DATA", 1));
        let t_open = tree.add_token(tok("(", 5));
        let t_x = tree.add_token(tok("x", 6));
        let t_close = tree.add_token(tok(")", 7));
        let t_eq = tree.add_token(tok("=", 9));
        let t_one = tree.add_token(tok("1", 11));
        let t_dot = tree.add_token(tok(".", 12));

        let target_field = tree.add_expr(ExpressionKind::TargetField, vec![t_x]);
        let inline = tree.add_expr(
            ExpressionKind::InlineData,
            vec![t_data, t_open, target_field, t_close],
        );
        let target = tree.add_expr(ExpressionKind::Target, vec![inline]);
        let chain = tree.add_expr(ExpressionKind::FieldChain, vec![t_one]);
        let source = tree.add_expr(ExpressionKind::Source, vec![chain]);
        tree.add_statement(StatementKind::Move, vec![target, t_eq, source, t_dot]);
        tree
    }

    #[test]
    fn statement_tokens_in_order() {
        let tree = sample_tree();
        let stmt = tree.statement(0);
        let texts: Vec<&str> = stmt.tokens().iter().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["DATA", "(", "x", ")", "=", "1", "."]);
        assert_eq!(stmt.concat_tokens(), "DATA(x) = 1.");
    }

    #[test]
    fn find_first_descends() {
        let tree = sample_tree();
        let stmt = tree.statement(0);
        let inline = stmt.find_first_expression(ExpressionKind::InlineData).unwrap();
        let name = inline
            .find_first_expression(ExpressionKind::TargetField)
            .unwrap();
        assert_eq!(name.concat_tokens(), "x");
    }

    #[test]
    fn direct_vs_recursive() {
        let tree = sample_tree();
        let stmt = tree.statement(0);
        assert!(stmt.find_direct_expression(ExpressionKind::InlineData).is_none());
        assert!(stmt.find_direct_expression(ExpressionKind::Target).is_some());
        assert_eq!(
            stmt.find_all_expressions_recursive(ExpressionKind::TargetField)
                .len(),
            1
        );
    }

    #[test]
    fn first_and_last_token() {
        let tree = sample_tree();
        let stmt = tree.statement(0);
        assert_eq!(stmt.first_token().unwrap().text(), "DATA");
        assert_eq!(stmt.last_token().unwrap().text(), ".");
        assert_eq!(stmt.start().unwrap(), Position::new(1, 1));
        assert_eq!(stmt.end().unwrap(), Position::new(1, 13));
    }

    #[test]
    fn direct_token_lookup_is_case_insensitive() {
        let mut tree = SyntaxTree::new();
        let a = tree.add_token(tok("PARTIALLY", 1));
        let b = tree.add_token(tok("IMPLEMENTED", 11));
        tree.add_statement(StatementKind::InterfaceDef, vec![a, b]);
        let stmt = tree.statement(0);
        assert!(stmt.find_direct_token_by_text("partially").is_some());
        assert!(stmt.find_direct_token_by_text("missing").is_none());
    }
}
