//! Version-gated statement classification and expression-tree building.
//!
//! Each raw statement is matched against a closed set of statement
//! productions. At a downportable target version, constructs introduced
//! after 7.02 make the whole statement parse as
//! [`StatementKind::Unknown`]; at the highest version they parse into
//! their productions so the downport engine can inspect them.
//!
//! The expression trees are deliberately shallow: rules navigate by
//! production kind and re-emit text from token concatenation, so the
//! builder only needs to isolate the productions the rule chain inspects.

use crate::lexer::RawStatement;
use crate::nodes::{ExpressionKind as E, NodeId, StatementKind, SyntaxTree};
use crate::token::{adjacent, Token};
use crate::version::AbapVersion;

/// First-token keywords that classify as plain `Other` statements.
const OTHER_KEYWORDS: &[&str] = &[
    "IF", "ELSEIF", "ELSE", "ENDIF", "CASE", "WHEN", "ENDCASE", "DO", "ENDDO", "WHILE",
    "ENDWHILE", "CHECK", "ASSERT", "RETURN", "EXIT", "CONTINUE", "WRITE", "CLEAR", "REFRESH",
    "FREE", "APPEND", "INSERT", "DELETE", "MODIFY", "UPDATE", "READ", "SORT", "CONCATENATE",
    "SPLIT", "CONDENSE", "TRANSLATE", "MESSAGE", "COMMIT", "ROLLBACK", "PERFORM", "SET", "GET",
    "WAIT", "SUBMIT", "LEAVE", "ASSIGN", "UNASSIGN", "IMPORT", "EXPORT", "TRY", "CATCH",
    "ENDTRY", "CLEANUP", "PUBLIC", "PROTECTED", "PRIVATE", "ENDINTERFACE", "INTERFACE",
    "ALIASES", "INCLUDE", "REPORT", "FUNCTION", "ENDFUNCTION", "MODULE", "ENDMODULE",
    "ADD", "SUBTRACT", "MULTIPLY", "DIVIDE", "MOVE-CORRESPONDING",
];

const CONSTRUCTOR_KEYWORDS: &[&str] = &["VALUE", "REDUCE", "COND", "CONV", "NEW", "CAST"];

/// Parse raw statements into a [`SyntaxTree`] at the given version.
pub fn parse_statements(raw: &[RawStatement], version: AbapVersion) -> SyntaxTree {
    let mut tree = SyntaxTree::new();
    for stmt in raw {
        classify(&mut tree, stmt, version);
    }
    tree
}

fn classify(tree: &mut SyntaxTree, stmt: &RawStatement, version: AbapVersion) {
    if stmt.comment {
        let children = add_tokens(tree, &stmt.tokens);
        tree.add_statement(StatementKind::Comment, children);
        return;
    }
    if stmt.tokens.is_empty() {
        return;
    }

    // split off the terminator so sub-parsers see only the body
    let (body, term) = match stmt.tokens.last() {
        Some(t) if t.text() == "." => (
            &stmt.tokens[..stmt.tokens.len() - 1],
            Some(stmt.tokens.last().unwrap().clone()),
        ),
        _ => (&stmt.tokens[..], None),
    };
    if body.is_empty() {
        let children = add_tokens(tree, &stmt.tokens);
        tree.add_statement(StatementKind::Other, children);
        return;
    }

    if version.downportable() && rejected_at_low(body) {
        let children = add_tokens(tree, &stmt.tokens);
        tree.add_statement(StatementKind::Unknown, children);
        return;
    }

    let first = body[0].upper();
    let mut children = match first.as_str() {
        "INTERFACES" => (StatementKind::InterfaceDef, add_tokens(tree, body)),
        "RAISE" => (StatementKind::Raise, parse_raise(tree, body)),
        "TYPES" => (StatementKind::Types, parse_declaration(tree, body)),
        "DATA" => {
            if is_inline_decl(body, 0) {
                (StatementKind::Move, parse_move(tree, body))
            } else {
                (StatementKind::Data, parse_declaration(tree, body))
            }
        }
        "CLASS-DATA" | "STATICS" | "CONSTANTS" => {
            (StatementKind::Data, parse_declaration(tree, body))
        }
        "FIELD-SYMBOLS" => (StatementKind::FieldSymbol, parse_field_symbols(tree, body)),
        "SELECT" => (StatementKind::Select, parse_select(tree, body)),
        "LOOP" => (StatementKind::Loop, parse_loop(tree, body)),
        "ENDLOOP" => (StatementKind::EndLoop, add_tokens(tree, body)),
        "METHODS" | "CLASS-METHODS" => (StatementKind::MethodDef, parse_method_def(tree, body)),
        "EVENTS" | "CLASS-EVENTS" => (StatementKind::Events, parse_events(tree, body)),
        "CLASS" => parse_class(tree, body),
        "ENDCLASS" => (StatementKind::EndClass, add_tokens(tree, body)),
        "METHOD" => (StatementKind::MethodImplStart, parse_method_impl(tree, body)),
        "ENDMETHOD" => (StatementKind::EndMethod, add_tokens(tree, body)),
        "FORM" => (StatementKind::Form, parse_method_impl(tree, body)),
        "ENDFORM" => (StatementKind::EndForm, add_tokens(tree, body)),
        "CREATE" => (StatementKind::CreateObject, add_tokens(tree, body)),
        "CALL" => (StatementKind::CallFunction, add_tokens(tree, body)),
        _ => {
            if OTHER_KEYWORDS.contains(&first.as_str()) {
                (StatementKind::Other, generic_children(tree, body))
            } else if top_level_assignment(body).is_some() {
                (StatementKind::Move, parse_move(tree, body))
            } else {
                (StatementKind::Other, generic_children(tree, body))
            }
        }
    };

    if let Some(t) = term {
        children.1.push(tree.add_token(t));
    }
    tree.add_statement(children.0, children.1);
}

// ============================================================================
// Version gate
// ============================================================================

/// True when the statement uses constructs the downportable versions
/// cannot parse.
fn rejected_at_low(body: &[Token]) -> bool {
    let first = body[0].upper();

    for (i, t) in body.iter().enumerate() {
        let up = t.upper();
        match up.as_str() {
            "DATA" | "FIELD-SYMBOL" if is_inline_decl(body, i) => return true,
            "@" | "[" => return true,
            "EMPTY" if next_is(body, i, "KEY") => return true,
            "PARTIALLY" if next_is(body, i, "IMPLEMENTED") => return true,
            // the boolean-conversion builtin does not exist before 7.40
            "XSDBOOL"
                if body
                    .get(i + 1)
                    .is_some_and(|n| n.text() == "(" && adjacent(t, n)) =>
            {
                return true
            }
            _ => {}
        }
        if CONSTRUCTOR_KEYWORDS.contains(&up.as_str()) && constructor_follows(body, i) {
            return true;
        }
    }

    if first == "RAISE" && contains_upper(body, "MESSAGE") {
        return true;
    }

    if first == "SELECT" {
        // comma-separated field list is post-7.02 shorthand
        let mut depth = 0i32;
        for t in body.iter().skip(1) {
            match t.text() {
                "(" => depth += 1,
                ")" => depth -= 1,
                "," if depth == 0 => return true,
                _ => {}
            }
            if t.is("FROM") {
                break;
            }
        }
    }

    // string-template formatting options (ALPHA) need the modern grammar
    let has_template_open = body
        .iter()
        .any(|t| t.text().starts_with('|') && t.text().ends_with('{'));
    if has_template_open && contains_upper(body, "ALPHA") {
        return true;
    }

    if first == "LOOP" && body.len() > 2 && body[1].is("AT") {
        let end = loop_source_end(body);
        if end > 3 {
            // complex iterated source, e.g. a functional method call
            return true;
        }
    }

    false
}

/// `DATA` / `FIELD-SYMBOL` immediately followed by `(` — an inline
/// declaration, as opposed to the spaced `DATA (len) TYPE c` forms.
fn is_inline_decl(body: &[Token], i: usize) -> bool {
    matches!(body[i].upper().as_str(), "DATA" | "FIELD-SYMBOL")
        && body
            .get(i + 1)
            .is_some_and(|n| n.text() == "(" && adjacent(&body[i], n))
}

/// Constructor expression: keyword followed by `#` or by `name(`.
fn constructor_follows(body: &[Token], i: usize) -> bool {
    let Some(next) = body.get(i + 1) else {
        return false;
    };
    if next.text() == "#" {
        return true;
    }
    if is_name(next) {
        if let Some(after) = body.get(i + 2) {
            return after.text() == "(" && adjacent(next, after);
        }
    }
    false
}

// ============================================================================
// Token helpers
// ============================================================================

fn add_tokens(tree: &mut SyntaxTree, toks: &[Token]) -> Vec<NodeId> {
    toks.iter().map(|t| tree.add_token(t.clone())).collect()
}

fn is_name(t: &Token) -> bool {
    let mut chars = t.text().chars();
    let c = chars.next().unwrap_or(' ');
    c.is_ascii_alphanumeric()
        || c == '_'
        || c == '/'
        || c == '<'
        || c == '\''
        || c == '|'
        || (c == '-' && chars.next().is_some_and(|d| d.is_ascii_digit()))
}

fn next_is(body: &[Token], i: usize, text: &str) -> bool {
    body.get(i + 1).is_some_and(|t| t.is(text))
}

fn contains_upper(body: &[Token], text: &str) -> bool {
    body.iter().any(|t| t.is(text))
}

/// Index of the first top-level (paren/bracket depth zero) token with one
/// of the given texts, at or after `from`.
fn find_top_level(body: &[Token], from: usize, texts: &[&str]) -> Option<usize> {
    let mut depth = 0i32;
    for (i, t) in body.iter().enumerate().skip(from) {
        match t.text() {
            "(" | "[" => depth += 1,
            ")" | "]" => depth -= 1,
            _ => {}
        }
        if depth == 0 && texts.iter().any(|x| t.is(x)) {
            return Some(i);
        }
    }
    None
}

/// Index of the matching closer for the opener at `open`.
fn matching_close(body: &[Token], open: usize) -> Option<usize> {
    let (o, c) = match body[open].text() {
        "(" => ("(", ")"),
        "[" => ("[", "]"),
        _ => return None,
    };
    let mut depth = 0i32;
    for (i, t) in body.iter().enumerate().skip(open) {
        if t.text() == o {
            depth += 1;
        } else if t.text() == c {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Top-level `=` or `?=` marking an assignment; never at index zero.
fn top_level_assignment(body: &[Token]) -> Option<usize> {
    let mut depth = 0i32;
    for (i, t) in body.iter().enumerate() {
        match t.text() {
            "(" | "[" => depth += 1,
            ")" | "]" => depth -= 1,
            "=" | "?=" if depth == 0 && i > 0 => return Some(i),
            _ => {}
        }
    }
    None
}

// ============================================================================
// Statement parsers
// ============================================================================

fn parse_move(tree: &mut SyntaxTree, body: &[Token]) -> Vec<NodeId> {
    let Some(eq) = top_level_assignment(body) else {
        return generic_children(tree, body);
    };
    let target = build_target(tree, &body[..eq]);
    let op = tree.add_token(body[eq].clone());
    let source = parse_source(tree, &body[eq + 1..]);
    vec![target, op, source]
}

fn build_target(tree: &mut SyntaxTree, toks: &[Token]) -> NodeId {
    if toks.len() >= 4 && is_inline_decl(toks, 0) {
        if toks[0].is("DATA") {
            let name = tree.add_token(toks[2].clone());
            let field = tree.add_expr(E::TargetField, vec![name]);
            let mut children = vec![tree.add_token(toks[0].clone()), tree.add_token(toks[1].clone())];
            children.push(field);
            children.push(tree.add_token(toks[3].clone()));
            let inline = tree.add_expr(E::InlineData, children);
            return tree.add_expr(E::Target, vec![inline]);
        }
        // FIELD-SYMBOL(<x>)
        let name = tree.add_token(toks[2].clone());
        let field = tree.add_expr(E::TargetFieldSymbol, vec![name]);
        let mut children = vec![tree.add_token(toks[0].clone()), tree.add_token(toks[1].clone())];
        children.push(field);
        children.push(tree.add_token(toks[3].clone()));
        let inline = tree.add_expr(E::InlineFs, children);
        return tree.add_expr(E::FsTarget, vec![inline]);
    }
    if toks.len() == 1 && toks[0].text().starts_with('<') {
        let name = tree.add_token(toks[0].clone());
        let field = tree.add_expr(E::TargetFieldSymbol, vec![name]);
        return tree.add_expr(E::FsTarget, vec![field]);
    }
    let chain = generic_children(tree, toks);
    tree.add_expr(E::Target, chain)
}

/// Build a `Source` expression for the token run.
pub(crate) fn parse_source(tree: &mut SyntaxTree, toks: &[Token]) -> NodeId {
    let children = source_children(tree, toks);
    tree.add_expr(E::Source, children)
}

fn source_children(tree: &mut SyntaxTree, toks: &[Token]) -> Vec<NodeId> {
    if toks.is_empty() {
        return Vec::new();
    }
    let first = toks[0].upper();
    if CONSTRUCTOR_KEYWORDS.contains(&first.as_str())
        && constructor_follows(toks, 0)
        && matching_close(toks, 2) == Some(toks.len() - 1)
    {
        return constructor_children(tree, toks, &first);
    }
    if toks[0].text().starts_with('|') {
        return vec![string_template(tree, toks)];
    }
    generic_children(tree, toks)
}

/// Children for `KW type( ... )` with the closing paren as last token.
fn constructor_children(tree: &mut SyntaxTree, toks: &[Token], kw: &str) -> Vec<NodeId> {
    let inner = &toks[3..toks.len() - 1];
    match kw {
        "NEW" => vec![new_object(tree, toks)],
        "CAST" => {
            let t_kw = tree.add_token(toks[0].clone());
            let tni_tok = tree.add_token(toks[1].clone());
            let tni = tree.add_expr(E::TypeNameOrInfer, vec![tni_tok]);
            let open = tree.add_token(toks[2].clone());
            let src = parse_source(tree, inner);
            let close = tree.add_token(toks[toks.len() - 1].clone());
            let cast = tree.add_expr(E::CastConstructor, vec![t_kw, tni, open, src, close]);
            vec![cast]
        }
        _ => {
            let t_kw = tree.add_token(toks[0].clone());
            let tni_tok = tree.add_token(toks[1].clone());
            let tni = tree.add_expr(E::TypeNameOrInfer, vec![tni_tok]);
            let open = tree.add_token(toks[2].clone());
            let body = match kw {
                "VALUE" => value_body(tree, inner),
                "REDUCE" => reduce_body(tree, inner),
                "COND" => cond_body(tree, inner),
                _ => {
                    let children = generic_children(tree, inner);
                    tree.add_expr(E::ConvBody, children)
                }
            };
            let close = tree.add_token(toks[toks.len() - 1].clone());
            vec![t_kw, tni, open, body, close]
        }
    }
}

fn new_object(tree: &mut SyntaxTree, toks: &[Token]) -> NodeId {
    let inner = &toks[3..toks.len() - 1];
    let t_new = tree.add_token(toks[0].clone());
    let tni_tok = tree.add_token(toks[1].clone());
    let tni = tree.add_expr(E::TypeNameOrInfer, vec![tni_tok]);
    let open = tree.add_token(toks[2].clone());
    let mut children = vec![t_new, tni, open];
    if !inner.is_empty() {
        if find_top_level(inner, 0, &["="]).is_some() {
            let param_children = add_tokens(tree, inner);
            children.push(tree.add_expr(E::ParameterList, param_children));
        } else {
            children.push(parse_source(tree, inner));
        }
    }
    children.push(tree.add_token(toks[toks.len() - 1].clone()));
    tree.add_expr(E::NewObject, children)
}

fn string_template(tree: &mut SyntaxTree, toks: &[Token]) -> NodeId {
    let mut children = Vec::new();
    let mut i = 0usize;
    while i < toks.len() {
        let t = &toks[i];
        if t.text().starts_with('|') || t.text().starts_with('}') {
            let opens_expression = t.text().ends_with('{');
            children.push(tree.add_token(t.clone()));
            i += 1;
            if opens_expression {
                // content tokens until the next segment token
                let start = i;
                while i < toks.len() && !toks[i].text().starts_with('}') {
                    i += 1;
                }
                let content = &toks[start..i];
                children.push(template_source(tree, content));
            }
        } else {
            children.push(tree.add_token(t.clone()));
            i += 1;
        }
    }
    tree.add_expr(E::StringTemplate, children)
}

fn template_source(tree: &mut SyntaxTree, content: &[Token]) -> NodeId {
    // split a trailing formatting option (ALPHA = IN/OUT) off the value
    let split = content.iter().position(|t| t.is("ALPHA"));
    let (value, formatting) = match split {
        Some(p) => (&content[..p], Some(&content[p..])),
        None => (content, None),
    };
    let src = parse_source(tree, value);
    let mut children = vec![src];
    if let Some(fmt) = formatting {
        let fmt_children = add_tokens(tree, fmt);
        children.push(tree.add_expr(E::StringTemplateFormatting, fmt_children));
    }
    tree.add_expr(E::StringTemplateSource, children)
}

/// Token run with embedded constructor expressions, field chains and
/// table expressions isolated; used for sources and `Other` statements.
fn generic_children(tree: &mut SyntaxTree, toks: &[Token]) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < toks.len() {
        let t = &toks[i];
        let up = t.upper();

        // inline declaration embedded in an arbitrary statement
        if is_inline_decl(toks, i)
            && i + 3 < toks.len()
            && toks[i + 3].text() == ")"
        {
            let (kind, field_kind) = if t.is("DATA") {
                (E::InlineData, E::TargetField)
            } else {
                (E::InlineFs, E::TargetFieldSymbol)
            };
            let kw = tree.add_token(t.clone());
            let open = tree.add_token(toks[i + 1].clone());
            let name = tree.add_token(toks[i + 2].clone());
            let field = tree.add_expr(field_kind, vec![name]);
            let close = tree.add_token(toks[i + 3].clone());
            out.push(tree.add_expr(kind, vec![kw, open, field, close]));
            i += 4;
            continue;
        }

        // embedded constructor expression
        if CONSTRUCTOR_KEYWORDS.contains(&up.as_str()) && constructor_follows(toks, i) {
            if let Some(close) = matching_close(toks, i + 2) {
                out.push(parse_source(tree, &toks[i..=close]));
                i = close + 1;
                continue;
            }
        }

        // field chain with a table expression: name[ ... ]tail
        if is_name(t)
            && toks
                .get(i + 1)
                .is_some_and(|n| n.text() == "[" && adjacent(t, n))
        {
            if let Some(close) = matching_close(toks, i + 1) {
                let chain = table_expression_chain(tree, toks, i, close);
                out.push(chain.0);
                i = chain.1;
                continue;
            }
        }

        // method call: name( ... )
        if is_name(t)
            && !t.text().starts_with('\'')
            && toks
                .get(i + 1)
                .is_some_and(|n| n.text() == "(" && adjacent(t, n))
        {
            if let Some(close) = matching_close(toks, i + 1) {
                let name = tree.add_token(t.clone());
                let open = tree.add_token(toks[i + 1].clone());
                let mut children = vec![name, open];
                children.extend(generic_children(tree, &toks[i + 2..close]));
                children.push(tree.add_token(toks[close].clone()));
                out.push(tree.add_expr(E::FieldChain, children));
                i = close + 1;
                continue;
            }
        }

        // plain value or name, possibly with offset/length
        if is_name(t) {
            let name = tree.add_token(t.clone());
            let mut children = vec![name];
            let mut j = i + 1;
            if toks
                .get(j)
                .is_some_and(|n| n.text() == "+" && adjacent(&toks[j - 1], n))
            {
                let plus = tree.add_token(toks[j].clone());
                let mut off = vec![plus];
                if let Some(n) = toks.get(j + 1) {
                    off.push(tree.add_token(n.clone()));
                    j += 2;
                } else {
                    j += 1;
                }
                children.push(tree.add_expr(E::FieldOffset, off));
            }
            if toks
                .get(j)
                .is_some_and(|n| n.text() == "(" && j > i && adjacent(&toks[j - 1], n))
            {
                if let Some(close) = matching_close(toks, j) {
                    let len_children = add_tokens(tree, &toks[j..=close]);
                    children.push(tree.add_expr(E::FieldLength, len_children));
                    j = close + 1;
                }
            }
            out.push(tree.add_expr(E::FieldChain, children));
            i = j;
            continue;
        }

        out.push(tree.add_token(t.clone()));
        i += 1;
    }
    out
}

/// `(FieldChain node, next index)` for `name[ ... ]tail`.
fn table_expression_chain(
    tree: &mut SyntaxTree,
    toks: &[Token],
    name_idx: usize,
    close: usize,
) -> (NodeId, usize) {
    let name = tree.add_token(toks[name_idx].clone());
    let inner = &toks[name_idx + 2..close];
    let open = tree.add_token(toks[name_idx + 1].clone());
    let mut te_children = vec![open];
    if find_top_level(inner, 0, &["="]).is_some() {
        // key lookup: keep raw so the index-only rule declines
        te_children.extend(add_tokens(tree, inner));
    } else {
        te_children.push(parse_source(tree, inner));
    }
    te_children.push(tree.add_token(toks[close].clone()));
    let te = tree.add_expr(E::TableExpression, te_children);

    let mut children = vec![name, te];
    // trailing component chain: ]-field
    let mut j = close + 1;
    while j < toks.len() && adjacent(&toks[j - 1], &toks[j]) && !toks[j].text().starts_with('(') {
        if toks[j].text() == "," || toks[j].text() == ")" || toks[j].text() == "]" {
            break;
        }
        children.push(tree.add_token(toks[j].clone()));
        j += 1;
    }
    (tree.add_expr(E::FieldChain, children), j)
}

// ---------------------------------------------------------------------------
// constructor bodies
// ---------------------------------------------------------------------------

fn value_body(tree: &mut SyntaxTree, inner: &[Token]) -> NodeId {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < inner.len() {
        let t = &inner[i];
        let up = t.upper();
        if up == "LET" {
            let (node, next) = let_expression(tree, inner, i);
            out.push(node);
            i = next;
            continue;
        }
        if up == "FOR" {
            let (node, next) = inline_loop_definition(tree, inner, i);
            out.push(node);
            i = next;
            continue;
        }
        if t.text() == "(" {
            if let Some(close) = matching_close(inner, i) {
                out.push(tree.add_token(t.clone()));
                let row = &inner[i + 1..close];
                if find_top_level(row, 0, &["="]).is_some() {
                    field_assignments(tree, row, &mut out);
                } else if !row.is_empty() {
                    out.push(parse_source(tree, row));
                }
                out.push(tree.add_token(inner[close].clone()));
                i = close + 1;
                continue;
            }
        }
        if is_name(t) && next_text_is(inner, i + 1, "=") {
            let end = assignment_end(inner, i + 2);
            field_assignments(tree, &inner[i..end], &mut out);
            i = end;
            continue;
        }
        out.push(tree.add_token(t.clone()));
        i += 1;
    }
    tree.add_expr(E::ValueBody, out)
}

fn next_text_is(toks: &[Token], i: usize, text: &str) -> bool {
    toks.get(i).is_some_and(|t| t.text() == text)
}

/// End of the value of an assignment starting at `from` (first token after
/// the `=`): the next top-level `name =` boundary or the end of the run.
fn assignment_end(toks: &[Token], from: usize) -> usize {
    let mut depth = 0i32;
    let mut i = from;
    while i < toks.len() {
        match toks[i].text() {
            "(" | "[" => depth += 1,
            ")" | "]" => depth -= 1,
            _ => {}
        }
        if depth == 0 && is_name(&toks[i]) && next_text_is(toks, i + 1, "=") && i > from {
            return i;
        }
        i += 1;
    }
    toks.len()
}

/// Emit `FieldAssignment` nodes for a `name = value [name = value ...]` run.
fn field_assignments(tree: &mut SyntaxTree, toks: &[Token], out: &mut Vec<NodeId>) {
    let mut i = 0usize;
    while i < toks.len() {
        if is_name(&toks[i]) && next_text_is(toks, i + 1, "=") {
            let end = assignment_end(toks, i + 2);
            let name = tree.add_token(toks[i].clone());
            let field = tree.add_expr(E::Field, vec![name]);
            let eq = tree.add_token(toks[i + 1].clone());
            let value = parse_source(tree, &toks[i + 2..end]);
            out.push(tree.add_expr(E::FieldAssignment, vec![field, eq, value]));
            i = end;
        } else {
            out.push(tree.add_token(toks[i].clone()));
            i += 1;
        }
    }
}

/// `LET a = 1 b = 2 IN`
fn let_expression(tree: &mut SyntaxTree, toks: &[Token], start: usize) -> (NodeId, usize) {
    let mut children = vec![tree.add_token(toks[start].clone())];
    let end = find_top_level(toks, start, &["IN"]).unwrap_or(toks.len());
    let mut i = start + 1;
    while i < end {
        if is_name(&toks[i]) && next_text_is(toks, i + 1, "=") {
            let value_end = assignment_end(toks, i + 2).min(end);
            let name = tree.add_token(toks[i].clone());
            let field = tree.add_expr(E::Field, vec![name]);
            let eq = tree.add_token(toks[i + 1].clone());
            let value = parse_source(tree, &toks[i + 2..value_end]);
            children.push(tree.add_expr(
                E::InlineFieldDefinition,
                vec![field, eq, value],
            ));
            i = value_end;
        } else {
            children.push(tree.add_token(toks[i].clone()));
            i += 1;
        }
    }
    if end < toks.len() {
        children.push(tree.add_token(toks[end].clone()));
    }
    (tree.add_expr(E::LetExpression, children), end + 1)
}

/// `FOR wa IN itab` / `FOR <fs> IN itab`
fn inline_loop_definition(tree: &mut SyntaxTree, toks: &[Token], start: usize) -> (NodeId, usize) {
    let mut children = vec![tree.add_token(toks[start].clone())];
    let mut i = start + 1;
    if i < toks.len() {
        let name = tree.add_token(toks[i].clone());
        let kind = if toks[i].text().starts_with('<') {
            E::TargetFieldSymbol
        } else {
            E::TargetField
        };
        children.push(tree.add_expr(kind, vec![name]));
        i += 1;
    }
    if i < toks.len() && toks[i].is("IN") {
        children.push(tree.add_token(toks[i].clone()));
        i += 1;
    }
    // iterated source runs to the first row-paren or keyword
    let mut depth = 0i32;
    let mut end = toks.len();
    for (j, t) in toks.iter().enumerate().skip(i) {
        match t.text() {
            "(" if depth == 0 => {
                end = j;
                break;
            }
            "(" | "[" => depth += 1,
            ")" | "]" => depth -= 1,
            _ => {}
        }
        if depth == 0 && (t.is("NEXT") || t.is("LET") || t.is("WHERE") || t.is("INDEX")) {
            end = j;
            break;
        }
    }
    if i < end {
        children.push(parse_source(tree, &toks[i..end]));
    }
    (tree.add_expr(E::InlineLoopDefinition, children), end)
}

/// `INIT x = ... FOR wa IN itab NEXT x = ...`
fn reduce_body(tree: &mut SyntaxTree, inner: &[Token]) -> NodeId {
    let mut out = Vec::new();
    let mut i = 0usize;

    if i < inner.len() && inner[i].is("INIT") {
        out.push(tree.add_token(inner[i].clone()));
        i += 1;
        let for_idx = find_top_level(inner, i, &["FOR"]).unwrap_or(inner.len());
        while i < for_idx {
            if is_name(&inner[i]) && next_text_is(inner, i + 1, "=") {
                let end = assignment_end(inner, i + 2).min(for_idx);
                let name = tree.add_token(inner[i].clone());
                let field = tree.add_expr(E::Field, vec![name]);
                let eq = tree.add_token(inner[i + 1].clone());
                let value = parse_source(tree, &inner[i + 2..end]);
                out.push(tree.add_expr(
                    E::InlineFieldDefinition,
                    vec![field, eq, value],
                ));
                i = end;
            } else {
                out.push(tree.add_token(inner[i].clone()));
                i += 1;
            }
        }
    }

    if i < inner.len() && inner[i].is("FOR") {
        let (node, next) = inline_loop_definition(tree, inner, i);
        out.push(node);
        i = next;
    }

    if let Some(next_idx) = find_top_level(inner, i, &["NEXT"]) {
        // anything between the loop definition and NEXT stays raw
        while i < next_idx {
            out.push(tree.add_token(inner[i].clone()));
            i += 1;
        }
        let mut next_children = vec![tree.add_token(inner[next_idx].clone())];
        i = next_idx + 1;
        while i < inner.len() {
            if is_name(&inner[i]) && next_text_is(inner, i + 1, "=") {
                let end = assignment_end(inner, i + 2);
                let name = tree.add_token(inner[i].clone());
                next_children.push(tree.add_expr(E::Field, vec![name]));
                next_children.push(tree.add_token(inner[i + 1].clone()));
                next_children.push(parse_source(tree, &inner[i + 2..end]));
                i = end;
            } else {
                next_children.push(tree.add_token(inner[i].clone()));
                i += 1;
            }
        }
        out.push(tree.add_expr(E::ReduceNext, next_children));
    } else {
        while i < inner.len() {
            out.push(tree.add_token(inner[i].clone()));
            i += 1;
        }
    }

    tree.add_expr(E::ReduceBody, out)
}

/// `WHEN cond THEN src [WHEN ... THEN ...] [ELSE src]`
fn cond_body(tree: &mut SyntaxTree, inner: &[Token]) -> NodeId {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < inner.len() {
        let t = &inner[i];
        if t.is("WHEN") {
            out.push(tree.add_token(t.clone()));
            let then_idx = find_top_level(inner, i + 1, &["THEN"]).unwrap_or(inner.len());
            let cond_children = add_tokens(tree, &inner[i + 1..then_idx]);
            out.push(tree.add_expr(E::Cond, cond_children));
            if then_idx < inner.len() {
                out.push(tree.add_token(inner[then_idx].clone()));
                let end =
                    find_top_level(inner, then_idx + 1, &["WHEN", "ELSE"]).unwrap_or(inner.len());
                out.push(parse_source(tree, &inner[then_idx + 1..end]));
                i = end;
            } else {
                i = then_idx;
            }
            continue;
        }
        if t.is("ELSE") {
            out.push(tree.add_token(t.clone()));
            out.push(parse_source(tree, &inner[i + 1..]));
            break;
        }
        out.push(tree.add_token(t.clone()));
        i += 1;
    }
    tree.add_expr(E::CondBody, out)
}

// ---------------------------------------------------------------------------
// declarations
// ---------------------------------------------------------------------------

/// `DATA name TYPE ...` / `TYPES name TYPE ...`, including table types
/// with key clauses.
fn parse_declaration(tree: &mut SyntaxTree, body: &[Token]) -> Vec<NodeId> {
    let mut children = vec![tree.add_token(body[0].clone())];
    let mut i = 1usize;
    if i < body.len() && body[i].text() == ":" {
        children.push(tree.add_token(body[i].clone()));
        i += 1;
    }
    if i < body.len() && is_name(&body[i]) {
        let name = tree.add_token(body[i].clone());
        children.push(tree.add_expr(E::Field, vec![name]));
        i += 1;
    }

    let rest = &body[i..];
    let has_table = find_top_level(rest, 0, &["TABLE"]).is_some()
        && find_top_level(rest, 0, &["OF"]).is_some();
    if has_table {
        let mut tt_children = Vec::new();
        let mut j = 0usize;
        while j < rest.len() {
            if rest[j].is("WITH") {
                let key_children = add_tokens(tree, &rest[j..]);
                tt_children.push(tree.add_expr(E::TypeTableKey, key_children));
                j = rest.len();
            } else {
                tt_children.push(tree.add_token(rest[j].clone()));
                j += 1;
            }
        }
        children.push(tree.add_expr(E::TypeTable, tt_children));
    } else {
        children.extend(add_tokens(tree, rest));
    }
    children
}

fn parse_field_symbols(tree: &mut SyntaxTree, body: &[Token]) -> Vec<NodeId> {
    let mut children = vec![tree.add_token(body[0].clone())];
    let mut i = 1usize;
    if i < body.len() && body[i].text().starts_with('<') {
        let name = tree.add_token(body[i].clone());
        children.push(tree.add_expr(E::TargetFieldSymbol, vec![name]));
        i += 1;
    }
    children.extend(add_tokens(tree, &body[i..]));
    children
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

fn parse_select(tree: &mut SyntaxTree, body: &[Token]) -> Vec<NodeId> {
    let mut children = vec![tree.add_token(body[0].clone())];
    let mut i = 1usize;
    if i < body.len() && body[i].is("SINGLE") {
        children.push(tree.add_token(body[i].clone()));
        i += 1;
    }

    // field list runs to FROM
    let from_idx = find_top_level(body, i, &["FROM"]).unwrap_or(body.len());
    let mut fl_children = Vec::new();
    for t in &body[i..from_idx] {
        if is_name(t) && t.text() != "*" {
            let tok = tree.add_token(t.clone());
            fl_children.push(tree.add_expr(E::SqlFieldName, vec![tok]));
        } else {
            fl_children.push(tree.add_token(t.clone()));
        }
    }
    children.push(tree.add_expr(E::SqlFieldList, fl_children));
    i = from_idx;

    if i < body.len() {
        children.push(tree.add_token(body[i].clone())); // FROM
        i += 1;
        // first table, then any joined tables
        let section_end =
            find_top_level(body, i, &["INTO", "WHERE", "UP", "ORDER", "GROUP"]).unwrap_or(body.len());
        let mut expect_table = true;
        while i < section_end {
            let t = &body[i];
            if expect_table && is_name(t) {
                let tok = tree.add_token(t.clone());
                let db = tree.add_expr(E::DatabaseTable, vec![tok]);
                children.push(tree.add_expr(E::SqlFromSource, vec![db]));
                expect_table = false;
            } else {
                if t.is("JOIN") {
                    expect_table = true;
                }
                children.push(tree.add_token(t.clone()));
            }
            i += 1;
        }
    }

    while i < body.len() {
        let t = &body[i];
        if t.is("INTO") {
            let (node, next) = sql_into(tree, body, i);
            children.push(node);
            i = next;
            continue;
        }
        if t.is("WHERE") {
            children.push(tree.add_token(t.clone()));
            i += 1;
            let end = find_top_level(body, i, &["INTO", "UP", "ORDER", "GROUP"]).unwrap_or(body.len());
            while i < end {
                if body[i].text() == "@" {
                    let at = tree.add_token(body[i].clone());
                    let mut src_children = vec![at];
                    if i + 1 < end {
                        src_children.push(tree.add_token(body[i + 1].clone()));
                        i += 2;
                    } else {
                        i += 1;
                    }
                    children.push(tree.add_expr(E::SqlSource, src_children));
                } else {
                    children.push(tree.add_token(body[i].clone()));
                    i += 1;
                }
            }
            continue;
        }
        children.push(tree.add_token(t.clone()));
        i += 1;
    }

    children
}

/// `INTO [TABLE] [(t1, t2)| target]`, returning the section node and the
/// index after it.
fn sql_into(tree: &mut SyntaxTree, body: &[Token], into_idx: usize) -> (NodeId, usize) {
    let mut i = into_idx;
    let mut children = vec![tree.add_token(body[i].clone())];
    i += 1;
    let is_table = body.get(i).is_some_and(|t| t.is("TABLE"));
    if is_table {
        children.push(tree.add_token(body[i].clone()));
        i += 1;
    }

    let end = find_top_level(body, i, &["WHERE", "UP", "ORDER", "GROUP", "FROM"]).unwrap_or(body.len());

    if body.get(i).is_some_and(|t| t.text() == "(") {
        // parenthesized target list
        children.push(tree.add_token(body[i].clone()));
        i += 1;
        while i < end && body[i].text() != ")" {
            if body[i].text() == "," {
                children.push(tree.add_token(body[i].clone()));
                i += 1;
                continue;
            }
            let (target, next) = sql_target(tree, body, i, end);
            children.push(target);
            i = next;
        }
        if i < end {
            children.push(tree.add_token(body[i].clone())); // )
            i += 1;
        }
    } else if i < end {
        let (target, next) = sql_target(tree, body, i, end);
        children.push(target);
        i = next;
    }

    let kind = if is_table {
        E::SqlIntoTable
    } else {
        E::SqlIntoStructure
    };
    (tree.add_expr(kind, children), i)
}

fn sql_target(tree: &mut SyntaxTree, body: &[Token], start: usize, end: usize) -> (NodeId, usize) {
    let mut children = Vec::new();
    let mut i = start;
    if body[i].text() == "@" {
        children.push(tree.add_token(body[i].clone()));
        i += 1;
    }
    if i < end && is_inline_decl(body, i) && i + 3 < end {
        let name = tree.add_token(body[i + 2].clone());
        let field = tree.add_expr(E::TargetField, vec![name]);
        let inline = {
            let a = tree.add_token(body[i].clone());
            let b = tree.add_token(body[i + 1].clone());
            let d = tree.add_token(body[i + 3].clone());
            tree.add_expr(E::InlineData, vec![a, b, field, d])
        };
        children.push(inline);
        i += 4;
    } else if i < end {
        children.push(tree.add_token(body[i].clone()));
        i += 1;
    }
    (tree.add_expr(E::SqlTarget, children), i)
}

// ---------------------------------------------------------------------------
// LOOP
// ---------------------------------------------------------------------------

/// Index one past the iterated source of a `LOOP AT` statement.
fn loop_source_end(body: &[Token]) -> usize {
    let mut depth = 0i32;
    for (i, t) in body.iter().enumerate().skip(2) {
        match t.text() {
            "(" | "[" => depth += 1,
            ")" | "]" => depth -= 1,
            _ => {}
        }
        if depth == 0
            && (t.is("INTO")
                || t.is("ASSIGNING")
                || t.is("REFERENCE")
                || t.is("TRANSPORTING")
                || t.is("WHERE")
                || t.is("FROM")
                || t.is("TO")
                || t.is("USING")
                || t.is("GROUP"))
        {
            return i;
        }
    }
    body.len()
}

fn parse_loop(tree: &mut SyntaxTree, body: &[Token]) -> Vec<NodeId> {
    let mut children = vec![tree.add_token(body[0].clone())];
    if body.len() < 3 || !body[1].is("AT") {
        children.extend(add_tokens(tree, &body[1..]));
        return children;
    }
    children.push(tree.add_token(body[1].clone()));

    let src_end = loop_source_end(body);
    let src = &body[2..src_end];
    if src.len() == 1 && is_name(&src[0]) {
        let tok = tree.add_token(src[0].clone());
        children.push(tree.add_expr(E::SimpleSource, vec![tok]));
    } else {
        children.push(parse_source(tree, src));
    }

    let mut i = src_end;
    while i < body.len() {
        let t = &body[i];
        if t.is("INTO") {
            children.push(tree.add_token(t.clone()));
            i += 1;
            if i < body.len() {
                if is_inline_decl(body, i) && i + 3 < body.len() {
                    let name = tree.add_token(body[i + 2].clone());
                    let field = tree.add_expr(E::TargetField, vec![name]);
                    let a = tree.add_token(body[i].clone());
                    let b = tree.add_token(body[i + 1].clone());
                    let d = tree.add_token(body[i + 3].clone());
                    let inline = tree.add_expr(E::InlineData, vec![a, b, field, d]);
                    children.push(tree.add_expr(E::Target, vec![inline]));
                    i += 4;
                } else {
                    let tok = tree.add_token(body[i].clone());
                    let field = tree.add_expr(E::TargetField, vec![tok]);
                    children.push(tree.add_expr(E::Target, vec![field]));
                    i += 1;
                }
            }
            continue;
        }
        if t.is("ASSIGNING") {
            children.push(tree.add_token(t.clone()));
            i += 1;
            if i < body.len() {
                if body[i].is("FIELD-SYMBOL") && i + 3 < body.len() {
                    let name = tree.add_token(body[i + 2].clone());
                    let field = tree.add_expr(E::TargetFieldSymbol, vec![name]);
                    let a = tree.add_token(body[i].clone());
                    let b = tree.add_token(body[i + 1].clone());
                    let d = tree.add_token(body[i + 3].clone());
                    let inline = tree.add_expr(E::InlineFs, vec![a, b, field, d]);
                    children.push(tree.add_expr(E::FsTarget, vec![inline]));
                    i += 4;
                } else {
                    let tok = tree.add_token(body[i].clone());
                    let field = tree.add_expr(E::TargetFieldSymbol, vec![tok]);
                    children.push(tree.add_expr(E::FsTarget, vec![field]));
                    i += 1;
                }
            }
            continue;
        }
        children.push(tree.add_token(t.clone()));
        i += 1;
    }
    children
}

// ---------------------------------------------------------------------------
// RAISE
// ---------------------------------------------------------------------------

fn parse_raise(tree: &mut SyntaxTree, body: &[Token]) -> Vec<NodeId> {
    let mut children = Vec::new();
    let mut i = 0usize;
    let mut saw_class = false;
    while i < body.len() {
        let t = &body[i];
        if t.is("TYPE") && !saw_class {
            children.push(tree.add_token(t.clone()));
            i += 1;
            if i < body.len() {
                let tok = tree.add_token(body[i].clone());
                children.push(tree.add_expr(E::ClassName, vec![tok]));
                i += 1;
            }
            saw_class = true;
            continue;
        }
        if (t.is("ID") || t.is("NUMBER")) && i + 1 < body.len() {
            children.push(tree.add_token(t.clone()));
            let value = parse_source(tree, &body[i + 1..i + 2]);
            children.push(value);
            i += 2;
            continue;
        }
        children.push(tree.add_token(t.clone()));
        i += 1;
    }
    children
}

// ---------------------------------------------------------------------------
// OO definitions
// ---------------------------------------------------------------------------

fn parse_class(tree: &mut SyntaxTree, body: &[Token]) -> (StatementKind, Vec<NodeId>) {
    let kind = if contains_upper(body, "IMPLEMENTATION") {
        StatementKind::ClassImplStart
    } else {
        StatementKind::ClassDefStart
    };
    let mut children = vec![tree.add_token(body[0].clone())];
    let mut i = 1usize;
    if i < body.len() && is_name(&body[i]) {
        let tok = tree.add_token(body[i].clone());
        children.push(tree.add_expr(E::ClassName, vec![tok]));
        i += 1;
    }
    children.extend(add_tokens(tree, &body[i..]));
    (kind, children)
}

fn parse_method_impl(tree: &mut SyntaxTree, body: &[Token]) -> Vec<NodeId> {
    let mut children = vec![tree.add_token(body[0].clone())];
    let mut i = 1usize;
    if i < body.len() && is_name(&body[i]) {
        let tok = tree.add_token(body[i].clone());
        children.push(tree.add_expr(E::Field, vec![tok]));
        i += 1;
    }
    children.extend(add_tokens(tree, &body[i..]));
    children
}

const SECTION_KEYWORDS: &[&str] = &[
    "IMPORTING",
    "EXPORTING",
    "CHANGING",
    "RETURNING",
    "RAISING",
    "EXCEPTIONS",
];

fn parse_method_def(tree: &mut SyntaxTree, body: &[Token]) -> Vec<NodeId> {
    let mut children = vec![tree.add_token(body[0].clone())];
    let mut i = 1usize;
    if i < body.len() && is_name(&body[i]) {
        let tok = tree.add_token(body[i].clone());
        children.push(tree.add_expr(E::Field, vec![tok]));
        i += 1;
    }

    if find_top_level(body, i, &["FOR"]).is_some() && contains_upper(body, "EVENT") {
        let (handler, next) = parse_event_handler(tree, body, i);
        children.push(handler);
        i = next;
        children.extend(add_tokens(tree, &body[i..]));
        return children;
    }

    while i < body.len() {
        let t = &body[i];
        let up = t.upper();
        if SECTION_KEYWORDS.contains(&up.as_str()) {
            let end = find_top_level(body, i + 1, SECTION_KEYWORDS).unwrap_or(body.len());
            let section = &body[i + 1..end];
            match up.as_str() {
                "IMPORTING" => {
                    children.push(tree.add_token(t.clone()));
                    children.push(parse_param_section(tree, section, E::MethodDefImporting));
                }
                "EXPORTING" => {
                    children.push(tree.add_token(t.clone()));
                    children.push(parse_param_section(tree, section, E::MethodDefExporting));
                }
                "CHANGING" => {
                    children.push(tree.add_token(t.clone()));
                    children.push(parse_param_section(tree, section, E::MethodDefChanging));
                }
                "RETURNING" => {
                    children.push(tree.add_token(t.clone()));
                    children.push(parse_param_section(tree, section, E::MethodDefReturning));
                }
                _ => {
                    children.push(tree.add_token(t.clone()));
                    children.extend(add_tokens(tree, section));
                }
            }
            i = end;
        } else {
            children.push(tree.add_token(t.clone()));
            i += 1;
        }
    }
    children
}

/// `FOR EVENT evt OF cls IMPORTING p1 p2`
fn parse_event_handler(tree: &mut SyntaxTree, body: &[Token], start: usize) -> (NodeId, usize) {
    let mut children = Vec::new();
    let mut i = start;
    while i < body.len() {
        let t = &body[i];
        if t.is("EVENT") && i + 1 < body.len() {
            children.push(tree.add_token(t.clone()));
            let tok = tree.add_token(body[i + 1].clone());
            children.push(tree.add_expr(E::Field, vec![tok]));
            i += 2;
            continue;
        }
        if t.is("OF") && i + 1 < body.len() {
            children.push(tree.add_token(t.clone()));
            let tok = tree.add_token(body[i + 1].clone());
            children.push(tree.add_expr(E::ClassName, vec![tok]));
            i += 2;
            continue;
        }
        if t.is("IMPORTING") {
            children.push(tree.add_token(t.clone()));
            i += 1;
            while i < body.len() && is_name(&body[i]) {
                let tok = tree.add_token(body[i].clone());
                children.push(tree.add_expr(E::MethodParamName, vec![tok]));
                i += 1;
            }
            continue;
        }
        children.push(tree.add_token(t.clone()));
        i += 1;
    }
    (tree.add_expr(E::EventHandler, children), i)
}

/// One IMPORTING/EXPORTING/CHANGING/RETURNING section as `MethodParam`
/// nodes plus any trailing `PREFERRED PARAMETER` tokens.
fn parse_param_section(tree: &mut SyntaxTree, section: &[Token], kind: E) -> NodeId {
    let mut children = Vec::new();
    let mut i = 0usize;
    while i < section.len() {
        let t = &section[i];
        if t.is("PREFERRED") {
            children.extend(add_tokens(tree, &section[i..]));
            break;
        }
        let (param, next) = parse_method_param(tree, section, i);
        if next == i {
            children.push(tree.add_token(t.clone()));
            i += 1;
        } else {
            children.push(param);
            i = next;
        }
    }
    tree.add_expr(kind, children)
}

/// `name TYPE ty [OPTIONAL | DEFAULT value]`, with `VALUE(name)` /
/// `REFERENCE(name)` wrappers.
fn parse_method_param(tree: &mut SyntaxTree, toks: &[Token], start: usize) -> (NodeId, usize) {
    let mut children = Vec::new();
    let mut i = start;

    // wrapper
    if (toks[i].is("VALUE") || toks[i].is("REFERENCE"))
        && next_text_is(toks, i + 1, "(")
        && i + 3 < toks.len()
    {
        children.push(tree.add_token(toks[i].clone()));
        children.push(tree.add_token(toks[i + 1].clone()));
        let name = tree.add_token(toks[i + 2].clone());
        children.push(tree.add_expr(E::MethodParamName, vec![name]));
        children.push(tree.add_token(toks[i + 3].clone()));
        i += 4;
    } else if is_name(&toks[i]) {
        let name = tree.add_token(toks[i].clone());
        children.push(tree.add_expr(E::MethodParamName, vec![name]));
        i += 1;
    } else {
        return (0, start);
    }

    // type clause
    if i < toks.len() && (toks[i].is("TYPE") || toks[i].is("LIKE")) {
        children.push(tree.add_token(toks[i].clone()));
        i += 1;
        if i < toks.len() && toks[i].is("REF") {
            children.push(tree.add_token(toks[i].clone()));
            i += 1;
            if i < toks.len() && toks[i].is("TO") {
                children.push(tree.add_token(toks[i].clone()));
                i += 1;
            }
            if i < toks.len() {
                children.push(tree.add_token(toks[i].clone()));
                i += 1;
            }
        } else if i < toks.len()
            && (toks[i].is("STANDARD") || toks[i].is("SORTED") || toks[i].is("HASHED") || toks[i].is("TABLE"))
        {
            while i < toks.len() && !toks[i].is("OF") {
                children.push(tree.add_token(toks[i].clone()));
                i += 1;
            }
            if i < toks.len() {
                children.push(tree.add_token(toks[i].clone())); // OF
                i += 1;
            }
            if i < toks.len() {
                children.push(tree.add_token(toks[i].clone())); // row type
                i += 1;
            }
        } else if i < toks.len() {
            children.push(tree.add_token(toks[i].clone()));
            i += 1;
            while i < toks.len() && (toks[i].is("LENGTH") || toks[i].is("DECIMALS")) {
                children.push(tree.add_token(toks[i].clone()));
                i += 1;
                if i < toks.len() {
                    children.push(tree.add_token(toks[i].clone()));
                    i += 1;
                }
            }
        }
    }

    // OPTIONAL / DEFAULT value
    if i < toks.len() && toks[i].is("OPTIONAL") {
        children.push(tree.add_token(toks[i].clone()));
        i += 1;
    } else if i < toks.len() && toks[i].is("DEFAULT") {
        let mut def_children = vec![tree.add_token(toks[i].clone())];
        i += 1;
        if i < toks.len() {
            def_children.push(parse_source(tree, &toks[i..i + 1]));
            i += 1;
        }
        children.push(tree.add_expr(E::DefaultValue, def_children));
    }

    (tree.add_expr(E::MethodParam, children), i)
}

fn parse_events(tree: &mut SyntaxTree, body: &[Token]) -> Vec<NodeId> {
    let mut children = vec![tree.add_token(body[0].clone())];
    let mut i = 1usize;
    if i < body.len() && is_name(&body[i]) {
        let tok = tree.add_token(body[i].clone());
        children.push(tree.add_expr(E::Field, vec![tok]));
        i += 1;
    }
    while i < body.len() {
        if body[i].is("EXPORTING") {
            children.push(tree.add_token(body[i].clone()));
            children.push(parse_param_section(tree, &body[i + 1..], E::MethodDefExporting));
            break;
        }
        children.push(tree.add_token(body[i].clone()));
        i += 1;
    }
    children
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::nodes::StatementNode;

    fn parse(source: &str, version: AbapVersion) -> SyntaxTree {
        parse_statements(&lex(source), version)
    }

    fn kinds(tree: &SyntaxTree) -> Vec<StatementKind> {
        tree.statements().map(|s| s.kind()).collect()
    }

    fn first(tree: &SyntaxTree) -> StatementNode<'_> {
        tree.statement(0)
    }

    mod version_gate {
        use super::*;

        #[test]
        fn inline_data_unknown_at_low() {
            let tree = parse("DATA(x) = 1.", AbapVersion::V702);
            assert_eq!(kinds(&tree), vec![StatementKind::Unknown]);

            let tree = parse("DATA(x) = 1.", AbapVersion::V750);
            assert_eq!(kinds(&tree), vec![StatementKind::Move]);
        }

        #[test]
        fn plain_data_parses_at_low() {
            let tree = parse("DATA x TYPE i.", AbapVersion::V702);
            assert_eq!(kinds(&tree), vec![StatementKind::Data]);
        }

        #[test]
        fn empty_key_unknown_at_low() {
            let src = "TYPES ty TYPE SORTED TABLE OF line_type WITH EMPTY KEY.";
            assert_eq!(kinds(&parse(src, AbapVersion::V702)), vec![StatementKind::Unknown]);
            assert_eq!(kinds(&parse(src, AbapVersion::V750)), vec![StatementKind::Types]);
        }

        #[test]
        fn constructor_expressions_unknown_at_low() {
            for src in [
                "x = VALUE #( a = 1 ).",
                "x = REDUCE i( INIT s = 0 FOR y IN tab NEXT s = s ).",
                "x = COND #( WHEN a = 1 THEN 2 ELSE 3 ).",
                "x = CONV i( y ).",
                "ref = CAST cl_abap_typedescr( tdesc ).",
                "obj = NEW zcl_foo( ).",
            ] {
                assert_eq!(
                    kinds(&parse(src, AbapVersion::V702)),
                    vec![StatementKind::Unknown],
                    "should reject at low: {src}"
                );
                assert_eq!(
                    kinds(&parse(src, AbapVersion::V750)),
                    vec![StatementKind::Move],
                    "should parse at high: {src}"
                );
            }
        }

        #[test]
        fn returning_value_wrapper_is_not_a_constructor() {
            let src = "METHODS run RETURNING VALUE(rv) TYPE i.";
            assert_eq!(kinds(&parse(src, AbapVersion::V702)), vec![StatementKind::MethodDef]);
        }

        #[test]
        fn modern_sql_unknown_at_low() {
            let src = "SELECT SINGLE field1 FROM tab INTO @DATA(ls_row).";
            assert_eq!(kinds(&parse(src, AbapVersion::V702)), vec![StatementKind::Unknown]);
            assert_eq!(kinds(&parse(src, AbapVersion::V750)), vec![StatementKind::Select]);
        }

        #[test]
        fn table_expression_unknown_at_low() {
            let src = "x = tab[ 2 ].";
            assert_eq!(kinds(&parse(src, AbapVersion::V702)), vec![StatementKind::Unknown]);
            assert_eq!(kinds(&parse(src, AbapVersion::V750)), vec![StatementKind::Move]);
        }

        #[test]
        fn raise_message_unknown_at_low() {
            let src = "RAISE EXCEPTION TYPE zcx_error MESSAGE ID 'ZMSG' TYPE 'E' NUMBER '001'.";
            assert_eq!(kinds(&parse(src, AbapVersion::V702)), vec![StatementKind::Unknown]);
            assert_eq!(kinds(&parse(src, AbapVersion::V750)), vec![StatementKind::Raise]);
        }

        #[test]
        fn partially_implemented_unknown_at_low() {
            let src = "INTERFACES zif_foo PARTIALLY IMPLEMENTED.";
            assert_eq!(kinds(&parse(src, AbapVersion::V702)), vec![StatementKind::Unknown]);
            assert_eq!(kinds(&parse(src, AbapVersion::V750)), vec![StatementKind::InterfaceDef]);
        }

        #[test]
        fn loop_at_method_call_unknown_at_low() {
            let src = "LOOP AT get_lines( ) INTO line.";
            assert_eq!(kinds(&parse(src, AbapVersion::V702)), vec![StatementKind::Unknown]);
            assert_eq!(kinds(&parse(src, AbapVersion::V750)), vec![StatementKind::Loop]);
        }

        #[test]
        fn plain_loop_parses_at_low() {
            let src = "LOOP AT tab INTO wa.";
            assert_eq!(kinds(&parse(src, AbapVersion::V702)), vec![StatementKind::Loop]);
        }
    }

    mod trees {
        use super::*;

        #[test]
        fn move_with_inline_target() {
            let tree = parse("DATA(x) = 1.", AbapVersion::V750);
            let stmt = first(&tree);
            let target = stmt.find_direct_expression(E::Target).unwrap();
            assert!(target.first_child().unwrap().is_expression(E::InlineData));
            let source = stmt.find_direct_expression(E::Source).unwrap();
            assert_eq!(source.children().len(), 1);
            assert!(source.first_child().unwrap().is_expression(E::FieldChain));
            assert_eq!(source.concat_tokens(), "1");
        }

        #[test]
        fn value_constructor_shape() {
            let tree = parse("tab = VALUE #( ( comp = 1 ) ).", AbapVersion::V750);
            let stmt = first(&tree);
            let source = stmt.find_direct_expression(E::Source).unwrap();
            assert_eq!(source.first_token().unwrap().text(), "VALUE");
            let tni = source.find_direct_expression(E::TypeNameOrInfer).unwrap();
            assert_eq!(tni.concat_tokens(), "#");
            let body = source.find_direct_expression(E::ValueBody).unwrap();
            let assignments = body.find_direct_expressions(E::FieldAssignment);
            assert_eq!(assignments.len(), 1);
            assert_eq!(assignments[0].concat_tokens(), "comp = 1");
        }

        #[test]
        fn cond_body_shape() {
            let tree = parse("x = COND i( WHEN a = 1 THEN 2 ELSE 3 ).", AbapVersion::V750);
            let stmt = first(&tree);
            let source = stmt.find_direct_expression(E::Source).unwrap();
            let body = source.find_direct_expression(E::CondBody).unwrap();
            let cond = body.find_direct_expression(E::Cond).unwrap();
            assert_eq!(cond.concat_tokens(), "a = 1");
            let sources = body.find_direct_expressions(E::Source);
            assert_eq!(sources.len(), 2);
            assert_eq!(sources[0].concat_tokens(), "2");
            assert_eq!(sources[1].concat_tokens(), "3");
        }

        #[test]
        fn reduce_body_shape() {
            let tree = parse(
                "x = REDUCE i( INIT s = 0 FOR wa IN tab NEXT s = s + wa ).",
                AbapVersion::V750,
            );
            let stmt = first(&tree);
            let source = stmt.find_direct_expression(E::Source).unwrap();
            let body = source.find_direct_expression(E::ReduceBody).unwrap();
            assert_eq!(body.find_direct_expressions(E::InlineFieldDefinition).len(), 1);
            let l = body.find_direct_expression(E::InlineLoopDefinition).unwrap();
            assert_eq!(l.find_first_expression(E::TargetField).unwrap().concat_tokens(), "wa");
            assert_eq!(l.find_first_expression(E::Source).unwrap().concat_tokens(), "tab");
            let next = body.find_direct_expression(E::ReduceNext).unwrap();
            assert_eq!(next.find_direct_expressions(E::Field).len(), 1);
        }

        #[test]
        fn select_single_inline_shape() {
            let tree = parse(
                "SELECT SINGLE field1 FROM ztab INTO @DATA(ls_row).",
                AbapVersion::V750,
            );
            let stmt = first(&tree);
            let into = stmt.find_first_expression(E::SqlIntoStructure).unwrap();
            let targets = into.find_direct_expressions(E::SqlTarget);
            assert_eq!(targets.len(), 1);
            assert!(targets[0].find_first_expression(E::InlineData).is_some());
            let from = stmt.find_all_expressions(E::SqlFromSource);
            assert_eq!(from.len(), 1);
            assert_eq!(
                from[0].find_direct_expression(E::DatabaseTable).unwrap().concat_tokens(),
                "ztab"
            );
            let fields = stmt
                .find_first_expression(E::SqlFieldList)
                .unwrap()
                .find_direct_expressions(E::SqlFieldName);
            assert_eq!(fields.len(), 1);
        }

        #[test]
        fn loop_with_inline_target() {
            let tree = parse("LOOP AT tab INTO DATA(row).", AbapVersion::V750);
            let stmt = first(&tree);
            assert!(stmt.find_direct_expression(E::SimpleSource).is_some());
            let target = stmt.find_direct_expression(E::Target).unwrap();
            assert!(target.find_direct_expression(E::InlineData).is_some());
        }

        #[test]
        fn loop_with_inline_field_symbol() {
            let tree = parse("LOOP AT tab ASSIGNING FIELD-SYMBOL(<row>).", AbapVersion::V750);
            let stmt = first(&tree);
            let fs = stmt.find_direct_expression(E::FsTarget).unwrap();
            let inline = fs.find_direct_expression(E::InlineFs).unwrap();
            assert_eq!(
                inline.find_direct_expression(E::TargetFieldSymbol).unwrap().concat_tokens(),
                "<row>"
            );
        }

        #[test]
        fn table_expression_in_chain() {
            let tree = parse("x = tab[ 2 ]-field.", AbapVersion::V750);
            let stmt = first(&tree);
            let chains = stmt.find_all_expressions_recursive(E::FieldChain);
            let with_te = chains
                .iter()
                .find(|c| c.find_direct_expression(E::TableExpression).is_some())
                .unwrap();
            let te = with_te.find_direct_expression(E::TableExpression).unwrap();
            assert_eq!(te.children().len(), 3);
            assert_eq!(te.find_first_expression(E::Source).unwrap().concat_tokens(), "2");
        }

        #[test]
        fn type_table_key() {
            let tree = parse(
                "TYPES ty TYPE SORTED TABLE OF line WITH EMPTY KEY.",
                AbapVersion::V750,
            );
            let stmt = first(&tree);
            let tt = stmt.find_direct_expression(E::TypeTable).unwrap();
            let key = tt.find_direct_expression(E::TypeTableKey).unwrap();
            assert!(key.concat_tokens().to_uppercase().contains("WITH EMPTY KEY"));
            assert!(key.find_direct_token_by_text("EMPTY").is_some());
        }

        #[test]
        fn raise_message_sources() {
            let tree = parse(
                "RAISE EXCEPTION TYPE zcx_error MESSAGE ID 'ZMSG' TYPE 'E' NUMBER '001'.",
                AbapVersion::V750,
            );
            let stmt = first(&tree);
            assert!(stmt.find_direct_token_by_text("ID").is_some());
            let sources = stmt.find_direct_expressions(E::Source);
            assert_eq!(sources.len(), 2);
            assert_eq!(sources[0].concat_tokens(), "'ZMSG'");
            assert_eq!(sources[1].concat_tokens(), "'001'");
            assert_eq!(
                stmt.find_direct_expression(E::ClassName).unwrap().concat_tokens(),
                "zcx_error"
            );
        }

        #[test]
        fn string_template_with_alpha() {
            let tree = parse("x = |{ ls-no ALPHA = IN }|.", AbapVersion::V750);
            let stmt = first(&tree);
            let source = stmt.find_direct_expression(E::Source).unwrap();
            let template = source.find_direct_expression(E::StringTemplate).unwrap();
            assert_eq!(template.children().len(), 3);
            assert_eq!(template.first_token().unwrap().text(), "|{");
            assert_eq!(template.last_token().unwrap().text(), "}|");
            let sts = template.find_direct_expression(E::StringTemplateSource).unwrap();
            let fmt = sts.find_direct_expression(E::StringTemplateFormatting).unwrap();
            assert_eq!(fmt.concat_tokens(), "ALPHA = IN");
            assert_eq!(sts.find_direct_expression(E::Source).unwrap().concat_tokens(), "ls-no");
        }

        #[test]
        fn method_def_sections() {
            let tree = parse(
                "METHODS run IMPORTING iv_a TYPE i iv_b TYPE string OPTIONAL RETURNING VALUE(rv) TYPE i.",
                AbapVersion::V750,
            );
            let stmt = first(&tree);
            assert_eq!(stmt.kind(), StatementKind::MethodDef);
            let importing = stmt.find_direct_expression(E::MethodDefImporting).unwrap();
            let params = importing.find_direct_expressions(E::MethodParam);
            assert_eq!(params.len(), 2);
            assert_eq!(
                params[1].find_first_expression(E::MethodParamName).unwrap().concat_tokens(),
                "iv_b"
            );
            assert!(params[1].find_direct_token_by_text("OPTIONAL").is_some());
            let returning = stmt.find_direct_expression(E::MethodDefReturning).unwrap();
            assert_eq!(
                returning.find_first_expression(E::MethodParamName).unwrap().concat_tokens(),
                "rv"
            );
        }

        #[test]
        fn event_handler_shape() {
            let tree = parse(
                "METHODS on_click FOR EVENT click OF zcl_button IMPORTING sender row.",
                AbapVersion::V750,
            );
            let stmt = first(&tree);
            let handler = stmt.find_first_expression(E::EventHandler).unwrap();
            assert_eq!(handler.find_direct_expressions(E::MethodParamName).len(), 2);
            assert_eq!(
                handler.find_direct_expression(E::ClassName).unwrap().concat_tokens(),
                "zcl_button"
            );
        }

        #[test]
        fn new_object_with_positional_source() {
            let tree = parse("obj = NEW zcl_foo( lv_input ).", AbapVersion::V750);
            let stmt = first(&tree);
            let new_obj = stmt.find_first_expression(E::NewObject).unwrap();
            assert_eq!(
                new_obj.find_direct_expression(E::TypeNameOrInfer).unwrap().concat_tokens(),
                "zcl_foo"
            );
            assert_eq!(
                new_obj.find_direct_expression(E::Source).unwrap().concat_tokens(),
                "lv_input"
            );
            assert!(new_obj.find_direct_expression(E::ParameterList).is_none());
        }

        #[test]
        fn new_object_with_named_parameters() {
            let tree = parse("obj = NEW zcl_foo( iv_a = 1 iv_b = 2 ).", AbapVersion::V750);
            let stmt = first(&tree);
            let new_obj = stmt.find_first_expression(E::NewObject).unwrap();
            let params = new_obj.find_direct_expression(E::ParameterList).unwrap();
            assert_eq!(params.concat_tokens(), "iv_a = 1 iv_b = 2");
        }

        #[test]
        fn sql_extras_decorations() {
            let tree = parse(
                "SELECT field1, field2 FROM tab INTO ( @lv_a, @lv_b ) WHERE key = @lv_key.",
                AbapVersion::V750,
            );
            let stmt = first(&tree);
            let targets = stmt.find_all_expressions_recursive(E::SqlTarget);
            assert_eq!(targets.len(), 2);
            assert!(targets.iter().all(|t| t.first_token().unwrap().text() == "@"));
            let sources = stmt.find_all_expressions_recursive(E::SqlSource);
            assert_eq!(sources.len(), 1);
            let field_list = stmt.find_first_expression(E::SqlFieldList).unwrap();
            let commas: Vec<_> = field_list
                .direct_tokens()
                .into_iter()
                .filter(|t| t.text() == ",")
                .collect();
            assert_eq!(commas.len(), 1);
        }
    }
}
