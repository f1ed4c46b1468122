//! Rule 1: remove `PARTIALLY IMPLEMENTED` from interface statements.

use downlift_core::Issue;
use downlift_syntax::nodes::{StatementKind, StatementNode};
use downlift_syntax::EditHelper;

use super::RuleCtx;

pub fn partially_implemented(high: &StatementNode<'_>, ctx: &RuleCtx<'_>) -> Option<Issue> {
    if high.kind() != StatementKind::InterfaceDef {
        return None;
    }
    let partially = high.find_direct_token_by_text("PARTIALLY")?;
    let implemented = high.find_direct_token_by_text("IMPLEMENTED")?;

    let fix = EditHelper::delete_range(ctx.low_file, partially.start(), implemented.end());
    Some(
        ctx.issue_at(partially, "Downport PARTIALLY IMPLEMENTED")
            .with_fix(fix),
    )
}
