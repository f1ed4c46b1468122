//! Rule 3: `WITH EMPTY KEY` becomes `WITH DEFAULT KEY`.

use downlift_core::Issue;
use downlift_syntax::nodes::{ExpressionKind as E, StatementNode};
use downlift_syntax::EditHelper;

use super::RuleCtx;

pub fn empty_key(high: &StatementNode<'_>, ctx: &RuleCtx<'_>) -> Option<Issue> {
    for table in high.find_all_expressions(E::TypeTable) {
        let Some(key) = table.find_direct_expression(E::TypeTableKey) else {
            continue;
        };
        if !key.concat_tokens().to_uppercase().contains("WITH EMPTY KEY") {
            continue;
        }
        let Some(token) = key.find_direct_token_by_text("EMPTY") else {
            continue;
        };

        let fix = EditHelper::replace_token(ctx.low_file, token, "DEFAULT");
        let anchor = key.first_token()?;
        return Some(ctx.issue_at(anchor, "Downport EMPTY KEY").with_fix(fix));
    }
    None
}
