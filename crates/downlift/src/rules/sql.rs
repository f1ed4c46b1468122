//! Rules 5-7: modern Open SQL downports.
//!
//! Inline targets are outlined into explicit declarations typed from the
//! source table's field list (rules 5 and 6); afterwards the `@` host
//! markers and field-list commas are stripped (rule 7). The inline rules
//! deliberately run first so the declarations are synthesized while the
//! field names are still available.

use downlift_core::{Edit, Issue};
use downlift_syntax::nodes::{ExpressionKind as E, StatementKind, StatementNode};
use downlift_syntax::EditHelper;

use super::RuleCtx;

/// Rule 5: `SELECT ... INTO @DATA(x)` with a single scalar target.
pub fn select_single_inline(
    low: &StatementNode<'_>,
    high: &StatementNode<'_>,
    ctx: &RuleCtx<'_>,
) -> Option<Issue> {
    if low.kind() != StatementKind::Unknown || high.kind() != StatementKind::Select {
        return None;
    }

    let into = high.find_first_expression(E::SqlIntoStructure)?;
    let targets = into.find_direct_expressions(E::SqlTarget);
    if targets.len() != 1 {
        return None;
    }
    let inline = targets[0].find_first_expression(E::InlineData)?;

    let from = high.find_all_expressions(E::SqlFromSource);
    if from.len() != 1 {
        return None;
    }
    let table = from[0]
        .find_direct_expression(E::DatabaseTable)?
        .concat_tokens();

    let field_list = high.find_first_expression(E::SqlFieldList)?;
    let fields = field_list.find_direct_expressions(E::SqlFieldName);
    if fields.is_empty() {
        return None;
    }
    let name = inline
        .find_first_expression(E::TargetField)?
        .concat_tokens();
    let indentation = ctx.indentation(high);

    let declaration = if fields.len() == 1 {
        format!("DATA {name} TYPE {table}-{}.", fields[0].concat_tokens())
    } else {
        let mut components = String::new();
        for f in &fields {
            let field = f.concat_tokens();
            components.push_str(&format!(
                "{indentation}        {field} TYPE {table}-{field},\n"
            ));
        }
        format!(
            "DATA: BEGIN OF {name},\n{components}{indentation}      END OF {name}."
        )
    };

    let fix1 = EditHelper::insert_at(
        ctx.low_file,
        high.start()?,
        format!("{declaration}\n{indentation}"),
    );
    let fix2 = EditHelper::replace_range(
        ctx.low_file,
        inline.first_token()?.start(),
        inline.last_token()?.end(),
        name,
    );
    let fix = EditHelper::merge(fix2, fix1);
    let anchor = inline.first_token()?;
    Some(ctx.issue_at(anchor, "Outline SELECT @DATA").with_fix(fix))
}

/// Rule 6: `SELECT ... INTO TABLE @DATA(x)`.
pub fn select_table_inline(
    low: &StatementNode<'_>,
    high: &StatementNode<'_>,
    ctx: &mut RuleCtx<'_>,
) -> Option<Issue> {
    if low.kind() != StatementKind::Unknown || high.kind() != StatementKind::Select {
        return None;
    }

    let into = high.find_first_expression(E::SqlIntoTable)?;
    let targets = into.find_direct_expressions(E::SqlTarget);
    if targets.len() != 1 {
        return None;
    }
    let inline = targets[0].find_first_expression(E::InlineData)?;

    let from = high.find_all_expressions(E::SqlFromSource);
    if from.len() != 1 {
        return None;
    }
    let table = from[0]
        .find_direct_expression(E::DatabaseTable)?
        .concat_tokens();

    let field_list = high.find_first_expression(E::SqlFieldList)?;
    let fields = field_list.find_direct_expressions(E::SqlFieldName);
    if fields.is_empty() {
        return None;
    }
    let indentation = ctx.indentation(high);
    let mut components = String::new();
    for f in &fields {
        let field = f.concat_tokens();
        components.push_str(&format!(
            "{indentation}        {field} TYPE {table}-{field},\n"
        ));
    }

    let row_type = ctx.unique_name(high.start()?);
    let name = inline
        .find_first_expression(E::TargetField)?
        .concat_tokens();

    let declaration = format!(
        "TYPES: BEGIN OF {row_type},\n{components}{indentation}      END OF {row_type}.\n\
         {indentation}DATA {name} TYPE STANDARD TABLE OF {row_type} WITH DEFAULT KEY.\n\
         {indentation}"
    );
    let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, declaration);
    let fix2 = EditHelper::replace_range(
        ctx.low_file,
        inline.first_token()?.start(),
        inline.last_token()?.end(),
        name,
    );
    let fix = EditHelper::merge(fix2, fix1);
    let anchor = inline.first_token()?;
    Some(ctx.issue_at(anchor, "Outline SELECT @DATA").with_fix(fix))
}

/// Rule 7: strip `@` host markers and field-list commas.
pub fn sql_extras(
    low: &StatementNode<'_>,
    high: &StatementNode<'_>,
    ctx: &RuleCtx<'_>,
) -> Option<Issue> {
    if low.kind() != StatementKind::Unknown || high.kind() != StatementKind::Select {
        return None;
    }

    let mut fix: Option<Edit> = None;
    let add_fix = |edit: Edit, fix: &mut Option<Edit>| {
        *fix = Some(match fix.take() {
            Some(existing) => EditHelper::merge(existing, edit),
            None => edit,
        });
    };

    let mut candidates = high.find_all_expressions_recursive(E::SqlTarget);
    candidates.extend(high.find_all_expressions_recursive(E::SqlSource));
    for c in candidates {
        if let Some(first) = c.first_token() {
            if first.text() == "@" {
                add_fix(EditHelper::delete_token(ctx.low_file, first), &mut fix);
            }
        }
    }

    for field_list in high.find_all_expressions_recursive(E::SqlFieldList) {
        for token in field_list.direct_tokens() {
            if token.text() == "," {
                add_fix(EditHelper::delete_token(ctx.low_file, token), &mut fix);
            }
        }
    }

    let fix = fix?;
    let anchor = low.first_token()?;
    Some(ctx.issue_at(anchor, "SQL, remove @ and ,").with_fix(fix))
}
