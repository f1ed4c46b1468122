//! Rule 2: downport `RAISE EXCEPTION ... MESSAGE ID ... NUMBER ...`.
//!
//! The message-carrying form does not exist in 7.02; the equivalent is a
//! message-key record populated by hand, an explicitly constructed
//! exception object, and a plain object raise.

use downlift_core::Issue;
use downlift_syntax::nodes::{ExpressionKind as E, StatementKind, StatementNode};
use downlift_syntax::EditHelper;

use super::RuleCtx;

pub fn raise_exception(high: &StatementNode<'_>, ctx: &mut RuleCtx<'_>) -> Option<Issue> {
    if high.kind() != StatementKind::Raise {
        return None;
    }
    let id_token = high.find_direct_token_by_text("ID")?;

    let sources = high.find_direct_expressions(E::Source);
    if sources.len() < 2 {
        return None;
    }
    let id = sources[0].concat_tokens();
    let number = sources[1].concat_tokens();

    let class_name = high
        .find_direct_expression(E::ClassName)
        .map(|c| c.concat_tokens())
        .unwrap_or_else(|| "ERROR".to_string());

    let start = high.start()?;
    let end = high.end()?;
    let key_name = ctx.unique_name(start);
    let obj_name = ctx.unique_name(start);
    let indentation = ctx.indentation(high);

    let abap = format!(
        "DATA {key_name} LIKE if_t100_message=>t100key.\n\
         {indentation}{key_name}-msgid = {id}.\n\
         {indentation}{key_name}-msgno = {number}.\n\
         {indentation}DATA {obj_name} TYPE REF TO {class_name}.\n\
         {indentation}CREATE OBJECT {obj_name} EXPORTING textid = {key_name}.\n\
         {indentation}RAISE EXCEPTION {obj_name}."
    );

    let fix = EditHelper::replace_range(ctx.low_file, start, end, abap);
    Some(ctx.issue_at(id_token, "Downport RAISE MESSAGE").with_fix(fix))
}
