//! Rules 15-17: inline-declaration outlining.
//!
//! Rule 15 handles the cheap case: a plain assignment whose target is an
//! inline declaration and whose source is a single unqualified reference,
//! which can be declared with `LIKE` and needs no type resolution. Rules
//! 16 and 17 cover every remaining inline declaration by resolving the
//! variable's inferred type from the scope result; a void or unknown
//! type is reported as detected-but-not-fixable.

use downlift_core::Issue;
use downlift_syntax::nodes::{ExpressionKind as E, StatementKind, StatementNode};
use downlift_syntax::EditHelper;

use super::RuleCtx;

/// Rule 15: `DATA(x) = y.` with a simple right-hand side.
pub fn outline_data_simple(high: &StatementNode<'_>, ctx: &RuleCtx<'_>) -> Option<Issue> {
    if high.kind() != StatementKind::Move {
        return None;
    }
    let target = high.find_direct_expression(E::Target)?;
    if !target.first_child()?.is_expression(E::InlineData) {
        return None;
    }

    let source = high.find_direct_expression(E::Source)?;
    if source.children().len() != 1 {
        return None;
    }
    if !source.first_child()?.is_expression(E::FieldChain) {
        return None;
    }
    if source.find_first_expression(E::FieldOffset).is_some()
        || source.find_first_expression(E::FieldLength).is_some()
    {
        return None;
    }
    // method calls and table expressions need the typed path
    let chain = source.first_child()?;
    if chain.find_direct_expression(E::TableExpression).is_some() || chain.children().len() > 1 {
        return None;
    }

    let target_name = target.find_first_expression(E::TargetField)?.concat_tokens();
    let source_text = source.concat_tokens();
    let indentation = ctx.indentation(high);
    let first = high.first_token()?;
    let last = high.last_token()?;

    let fix1 = EditHelper::insert_at(
        ctx.low_file,
        first.start(),
        format!("DATA {target_name} LIKE {source_text}.\n{indentation}"),
    );
    let fix2 = EditHelper::replace_range(
        ctx.low_file,
        first.start(),
        last.end(),
        format!("{target_name} = {source_text}."),
    );
    let fix = EditHelper::merge(fix2, fix1);
    Some(ctx.issue_at(first, "Outline DATA").with_fix(fix))
}

/// Rule 16: any remaining inline data declaration, typed from the scope
/// result.
pub fn outline_data(high: &StatementNode<'_>, ctx: &RuleCtx<'_>) -> Option<Issue> {
    for inline in high.find_all_expressions_recursive(E::InlineData) {
        let Some(name_token) = inline
            .find_direct_expression(E::TargetField)
            .and_then(|f| f.first_token())
        else {
            continue;
        };
        let name = name_token.text();
        let Some(scope) = ctx
            .high_syntax
            .lookup_position(name_token.start(), ctx.filename())
        else {
            continue;
        };
        let Some(found) = scope.find_variable(name) else {
            continue;
        };
        if found.get_type().is_void() || found.get_type().is_unknown() {
            let anchor = inline.first_token()?;
            return Some(ctx.issue_at(anchor, "Error outlining voided type"));
        }
        let ty = found
            .get_type()
            .qualified_name()
            .unwrap_or_else(|| found.get_type().to_abap());

        let indentation = ctx.indentation(high);
        let code = format!("DATA {name} TYPE {ty}.\n{indentation}");
        let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, code);
        let fix2 = EditHelper::replace_range(
            ctx.low_file,
            inline.first_token()?.start(),
            inline.last_token()?.end(),
            name,
        );
        let fix = EditHelper::merge(fix2, fix1);
        let anchor = inline.first_token()?;
        return Some(ctx.issue_at(anchor, "Outline DATA").with_fix(fix));
    }
    None
}

/// Rule 17: inline field-symbol declarations.
pub fn outline_fs(high: &StatementNode<'_>, ctx: &RuleCtx<'_>) -> Option<Issue> {
    for inline in high.find_all_expressions_recursive(E::InlineFs) {
        let Some(name_token) = inline
            .find_direct_expression(E::TargetFieldSymbol)
            .and_then(|f| f.first_token())
        else {
            continue;
        };
        let name = name_token.text();
        let Some(scope) = ctx
            .high_syntax
            .lookup_position(name_token.start(), ctx.filename())
        else {
            continue;
        };
        let Some(found) = scope.find_variable(name) else {
            continue;
        };
        if found.get_type().is_void() || found.get_type().is_unknown() {
            let anchor = inline.first_token()?;
            return Some(ctx.issue_at(anchor, "Error outlining voided type"));
        }
        let ty = found
            .get_type()
            .qualified_name()
            .unwrap_or_else(|| found.get_type().to_abap());

        let indentation = ctx.indentation(high);
        let code = format!("FIELD-SYMBOLS {name} TYPE {ty}.\n{indentation}");
        let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, code);
        let fix2 = EditHelper::replace_range(
            ctx.low_file,
            inline.first_token()?.start(),
            inline.last_token()?.end(),
            name,
        );
        let fix = EditHelper::merge(fix2, fix1);
        let anchor = inline.first_token()?;
        return Some(ctx.issue_at(anchor, "Outline FIELD-SYMBOL").with_fix(fix));
    }
    None
}
