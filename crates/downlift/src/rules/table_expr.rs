//! Rule 20: table expressions with an index are outlined into a
//! `READ TABLE ... INDEX` with an explicit error check, matching the
//! exception behavior of the original expression.

use downlift_core::Issue;
use downlift_syntax::nodes::{ExpressionKind as E, StatementNode};
use downlift_syntax::EditHelper;

use super::RuleCtx;

pub fn replace_table_expression(high: &StatementNode<'_>, ctx: &mut RuleCtx<'_>) -> Option<Issue> {
    for chain in high.find_all_expressions_recursive(E::FieldChain) {
        let Some(table_expr) = chain.find_direct_expression(E::TableExpression) else {
            continue;
        };
        if table_expr.children().len() > 3 {
            // only the INDEX form is supported
            continue;
        }

        let mut pre = String::new();
        let mut start_token = None;
        for child in chain.children() {
            if start_token.is_none() {
                start_token = child.first_token();
            } else if child.id() == table_expr.id() {
                break;
            }
            pre.push_str(&child.concat_tokens());
        }
        let start_token = start_token?;

        let index = table_expr
            .find_first_expression(E::Source)
            .map(|s| s.concat_tokens())
            .unwrap_or_default();
        let name = ctx.unique_name(high.start()?);
        let indentation = ctx.indentation(high);

        let code = format!(
            "DATA {name} LIKE LINE OF {pre}.\n\
             {indentation}READ TABLE {pre} INDEX {index} INTO {name}.\n\
             {indentation}IF sy-subrc <> 0.\n\
             {indentation}  RAISE EXCEPTION TYPE cx_sy_itab_line_not_found.\n\
             {indentation}ENDIF.\n\
             {indentation}"
        );
        let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, code);
        let fix2 = EditHelper::replace_range(
            ctx.low_file,
            start_token.start(),
            table_expr.last_token()?.end(),
            name,
        );
        let fix = EditHelper::merge(fix2, fix1);
        let anchor = high.first_token()?;
        return Some(ctx.issue_at(anchor, "Outline table expression").with_fix(fix));
    }
    None
}
