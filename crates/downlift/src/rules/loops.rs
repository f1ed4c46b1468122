//! Rules 8-9: LOOP input and target outlining.

use downlift_core::Issue;
use downlift_syntax::nodes::{ExpressionKind as E, StatementKind, StatementNode};
use downlift_syntax::EditHelper;

use super::RuleCtx;

/// Rule 8: a complex iterated source is captured in a preceding
/// assignment. The assignment deliberately uses an inline declaration;
/// the next pass outlines it once the loop itself parses.
pub fn outline_loop_input(high: &StatementNode<'_>, ctx: &mut RuleCtx<'_>) -> Option<Issue> {
    if high.kind() != StatementKind::Loop {
        return None;
    }
    if high.find_direct_expression(E::SimpleSource).is_some() {
        return None;
    }
    let source = high.find_direct_expression(E::Source)?;

    let start = high.start()?;
    let name = ctx.unique_name(start);
    let indentation = ctx.indentation(high);

    let code = format!("DATA({name}) = {}.\n{indentation}", source.concat_tokens());
    let fix1 = EditHelper::insert_at(ctx.low_file, start, code);
    let fix2 = EditHelper::replace_range(
        ctx.low_file,
        source.first_token()?.start(),
        source.last_token()?.end(),
        name,
    );
    let fix = EditHelper::merge(fix2, fix1);
    let anchor = high.first_token()?;
    Some(ctx.issue_at(anchor, "Outline LOOP input").with_fix(fix))
}

/// Rule 9: inline row or field-symbol targets become explicit
/// `LIKE LINE OF` declarations.
pub fn outline_loop_target(high: &StatementNode<'_>, ctx: &RuleCtx<'_>) -> Option<Issue> {
    if high.kind() != StatementKind::Loop {
        return None;
    }
    let source_name = high
        .find_direct_expression(E::SimpleSource)?
        .concat_tokens();

    if high.concat_tokens().to_uppercase().contains(" REFERENCE INTO ") {
        return None;
    }
    let indentation = ctx.indentation(high);

    if let Some(inline) = high
        .find_direct_expression(E::Target)
        .and_then(|t| t.find_direct_expression(E::InlineData))
    {
        let target_name = inline
            .find_direct_expression(E::TargetField)?
            .concat_tokens();
        let code = format!("DATA {target_name} LIKE LINE OF {source_name}.\n{indentation}");
        let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, code);
        let fix2 = EditHelper::replace_range(
            ctx.low_file,
            inline.first_token()?.start(),
            inline.last_token()?.end(),
            target_name,
        );
        let fix = EditHelper::merge(fix2, fix1);
        let anchor = high.first_token()?;
        return Some(ctx.issue_at(anchor, "Outline LOOP data target").with_fix(fix));
    }

    if let Some(inline) = high
        .find_direct_expression(E::FsTarget)
        .and_then(|t| t.find_direct_expression(E::InlineFs))
    {
        let target_name = inline
            .find_direct_expression(E::TargetFieldSymbol)?
            .concat_tokens();
        let code =
            format!("FIELD-SYMBOLS {target_name} LIKE LINE OF {source_name}.\n{indentation}");
        let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, code);
        let fix2 = EditHelper::replace_range(
            ctx.low_file,
            inline.first_token()?.start(),
            inline.last_token()?.end(),
            target_name,
        );
        let fix = EditHelper::merge(fix2, fix1);
        let anchor = high.first_token()?;
        return Some(ctx.issue_at(anchor, "Outline LOOP fs target").with_fix(fix));
    }

    None
}
