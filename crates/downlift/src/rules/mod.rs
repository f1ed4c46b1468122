//! The ordered rewrite rule chain.
//!
//! Every rule is a pure function of (low statement, high statement, rule
//! context) returning an optional [`Issue`]. For a candidate statement
//! the rules are tried in a fixed total order; the first rule that
//! matches performs the rewrite and the chain stops, so one invocation
//! produces at most one issue. Complex statements downport over several
//! engine passes: each pass peels one construct, the caller re-parses,
//! and the next pass continues.

mod builtins;
mod constructors;
mod interface;
mod keys;
mod loops;
mod objects;
mod outline;
mod raise;
mod sql;
mod table_expr;
mod template;

use downlift_core::{Issue, Position, Severity};
use downlift_syntax::nodes::{ExpressionKind as E, NodeRef, StatementNode};
use downlift_syntax::registry::ParsedFile;
use downlift_syntax::scope::{ReferenceKind, ResolvedRef, SyntaxResult};
use downlift_syntax::token::Token;

use crate::error::ReconstructionError;

/// Shared state threaded into every rule call.
///
/// The unique-name counter lives here explicitly (not in the engine) so
/// a whole run is deterministic and each rule invocation is testable in
/// isolation.
pub struct RuleCtx<'a> {
    pub low_file: &'a ParsedFile,
    pub high_syntax: &'a SyntaxResult,
    pub counter: &'a mut u32,
    pub key: &'a str,
    pub severity: Severity,
}

impl RuleCtx<'_> {
    pub fn filename(&self) -> &str {
        self.low_file.filename()
    }

    /// Collision-free `temp<N>` name at `anchor`.
    ///
    /// The counter increments monotonically for the whole engine run and
    /// never resets between statements or files, so temporaries from
    /// unrelated rewrites in one pass stay distinct.
    pub fn unique_name(&mut self, anchor: Position) -> String {
        let Some(scope) = self.high_syntax.lookup_position(anchor, self.low_file.filename())
        else {
            return "uniqueErrorScope".to_string();
        };
        loop {
            let name = format!("temp{}", self.counter);
            *self.counter += 1;
            if scope.find_variable(&name).is_none() {
                return name;
            }
        }
    }

    /// Type name for a construct with a `TypeNameOrInfer` child: the
    /// explicit name when present, else the inferred-type reference
    /// recorded at the exact `#` position. `None` makes the rule decline.
    pub fn find_type(&self, expr: &NodeRef<'_>) -> Option<String> {
        let tni = expr.find_direct_expression(E::TypeNameOrInfer)?;
        let first = tni.first_token()?;

        let concat = tni.concat_tokens().to_lowercase();
        if concat != "#" {
            return Some(concat);
        }

        let scope = self
            .high_syntax
            .lookup_position(first.start(), self.low_file.filename())?;
        for r in scope.references() {
            if r.kind == ReferenceKind::InferredType && r.token.start().equals(&first.start()) {
                if let ResolvedRef::Variable(v) = &r.resolved {
                    return v.get_type().qualified_name();
                }
            }
        }
        None
    }

    /// Leading spaces matching the statement's first-token column.
    pub fn indentation(&self, stmt: &StatementNode<'_>) -> String {
        let col = stmt.first_token().map(|t| t.start().col).unwrap_or(1);
        " ".repeat(col.saturating_sub(1) as usize)
    }

    pub fn issue_at(&self, token: &Token, message: impl Into<String>) -> Issue {
        Issue::at_position(
            self.low_file.filename(),
            token.start(),
            message,
            self.key,
            self.severity,
        )
    }
}

/// Try the rules in their fixed total order; first match wins.
///
/// A reconstruction failure aborts only the statement it occurred in.
pub fn check_statement(
    low: &StatementNode<'_>,
    high: &StatementNode<'_>,
    ctx: &mut RuleCtx<'_>,
) -> Result<Option<Issue>, ReconstructionError> {
    // synthesized statements have no byte range to edit
    if low
        .first_token()
        .is_some_and(|t| t.start().is_virtual())
    {
        return Ok(None);
    }

    if let Some(found) = interface::partially_implemented(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = raise::raise_exception(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = keys::empty_key(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = template::string_template_alpha(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = sql::select_single_inline(low, high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = sql::select_table_inline(low, high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = sql::sql_extras(low, high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = loops::outline_loop_input(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = loops::outline_loop_target(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = constructors::outline_value(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = constructors::outline_reduce(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = constructors::outline_cast(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = constructors::outline_conv(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = constructors::outline_cond(high, ctx)? {
        return Ok(Some(found));
    }
    if let Some(found) = outline::outline_data_simple(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = outline::outline_data(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = outline::outline_fs(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = objects::new_to_create_object(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = builtins::replace_xsdbool(high, ctx) {
        return Ok(Some(found));
    }
    if let Some(found) = table_expr::replace_table_expression(high, ctx) {
        return Ok(Some(found));
    }

    Ok(None)
}
