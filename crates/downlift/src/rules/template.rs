//! Rule 4: single-assignment string templates with an ALPHA formatting
//! option become conversion-function calls.
//!
//! Only the simplest shape is handled: `target = |{ source ALPHA = IN }|.`
//! Anything with extra segments or other formatting falls through.

use downlift_core::Issue;
use downlift_syntax::nodes::{ExpressionKind as E, StatementKind, StatementNode};
use downlift_syntax::EditHelper;

use super::RuleCtx;

pub fn string_template_alpha(high: &StatementNode<'_>, ctx: &RuleCtx<'_>) -> Option<Issue> {
    if high.kind() != StatementKind::Move {
        return None;
    }
    let top_source = high.find_direct_expression(E::Source)?;
    if top_source.children().len() != 1 {
        return None;
    }
    let child = top_source.first_child()?;
    if !child.is_expression(E::StringTemplate) {
        return None;
    }

    let segments = child.children();
    if segments.len() != 3
        || segments[0].token().map(|t| t.text()) != Some("|{")
        || segments[2].token().map(|t| t.text()) != Some("}|")
    {
        return None;
    }

    let template_source = child.find_direct_expression(E::StringTemplateSource)?;
    let formatting = template_source
        .find_direct_expression(E::StringTemplateFormatting)?
        .concat_tokens()
        .to_uppercase();
    let function_name = match formatting.as_str() {
        "ALPHA = IN" => "CONVERSION_EXIT_ALPHA_INPUT",
        "ALPHA = OUT" => "CONVERSION_EXIT_ALPHA_OUTPUT",
        _ => return None,
    };

    let source = template_source
        .find_direct_expression(E::Source)?
        .concat_tokens();
    let target = high.find_direct_expression(E::Target)?.concat_tokens();
    let indentation = ctx.indentation(high);

    let code = format!(
        "CALL FUNCTION '{function_name}'\n\
         {indentation}  EXPORTING\n\
         {indentation}    input  = {source}\n\
         {indentation}  IMPORTING\n\
         {indentation}    output = {target}."
    );
    let fix = EditHelper::replace_range(ctx.low_file, high.start()?, high.end()?, code);
    let anchor = high.first_token()?;
    Some(ctx.issue_at(anchor, "Downport ALPHA").with_fix(fix))
}
