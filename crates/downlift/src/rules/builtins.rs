//! Rule 19: `xsdbool( ... )` becomes `boolc( ... )`.

use downlift_core::Issue;
use downlift_syntax::nodes::StatementNode;
use downlift_syntax::scope::ReferenceKind;
use downlift_syntax::EditHelper;

use super::RuleCtx;

pub fn replace_xsdbool(high: &StatementNode<'_>, ctx: &RuleCtx<'_>) -> Option<Issue> {
    let first = high.first_token()?;
    let scope = ctx
        .high_syntax
        .lookup_position(first.start(), ctx.filename())?;

    for r in scope.references() {
        if r.kind == ReferenceKind::BuiltinFunction && r.token.upper() == "XSDBOOL" {
            let fix = EditHelper::replace_range(
                ctx.low_file,
                r.token.start(),
                r.token.end(),
                "boolc",
            );
            return Some(ctx.issue_at(&r.token, "Use BOOLC").with_fix(fix));
        }
    }
    None
}
