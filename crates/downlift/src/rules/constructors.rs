//! Rules 10-14: constructor-expression outlining.
//!
//! `VALUE`, `REDUCE`, `COND`, `CONV` and `CAST` expressions do not exist
//! in 7.02. Each is replaced by an explicit typed temporary plus the
//! statements that rebuild the same value, and the expression itself is
//! replaced by the temporary's name. The synthesized type comes from the
//! construct's explicit type name or from the inferred-type reference at
//! the `#` position; without one the rule declines.

use downlift_core::Issue;
use downlift_syntax::nodes::{ExpressionKind as E, NodeRef, StatementNode};
use downlift_syntax::EditHelper;

use super::RuleCtx;
use crate::error::ReconstructionError;

/// Rule 10: `VALUE type( ... )`.
pub fn outline_value(high: &StatementNode<'_>, ctx: &mut RuleCtx<'_>) -> Option<Issue> {
    for source in high.find_all_expressions_recursive(E::Source) {
        let Some(first) = source.first_token() else {
            continue;
        };
        if first.upper() != "VALUE" {
            continue;
        }
        let Some(ty) = ctx.find_type(&source) else {
            continue;
        };
        let Some(value_body) = source.find_direct_expression(E::ValueBody) else {
            continue;
        };

        let name = ctx.unique_name(first.start());
        let mut indentation = ctx.indentation(high);
        let mut body = String::new();

        let loop_def = value_body.find_first_expression(E::InlineLoopDefinition);
        if let Some(loop_def) = &loop_def {
            let loop_source = loop_def
                .find_first_expression(E::Source)
                .map(|s| s.concat_tokens())
                .unwrap_or_default();
            if let Some(fs) = loop_def.find_direct_expression(E::TargetFieldSymbol) {
                body.push_str(&format!(
                    "{indentation}LOOP AT {loop_source} ASSIGNING FIELD-SYMBOL({}).\n",
                    fs.concat_tokens()
                ));
            } else if let Some(field) = loop_def.find_direct_expression(E::TargetField) {
                body.push_str(&format!(
                    "{indentation}LOOP AT {loop_source} INTO DATA({}).\n",
                    field.concat_tokens()
                ));
            }
            indentation.push_str("  ");
        }

        let mut structure_name = name.clone();
        let mut added = false;
        let mut row_declaration = String::new();
        for child in value_body.children() {
            if let Some(token) = child.token() {
                if token.text() == "(" && !added {
                    structure_name = ctx.unique_name(first.start());
                    row_declaration = format!(
                        "{indentation}DATA {structure_name} LIKE LINE OF {name}.\n"
                    );
                }
                if token.text() == ")" {
                    body.push_str(&format!(
                        "{indentation}APPEND {structure_name} TO {name}.\n"
                    ));
                }
                continue;
            }
            match child.kind() {
                Some(E::FieldAssignment) => {
                    if !added {
                        body.push_str(&row_declaration);
                        added = true;
                    }
                    body.push_str(&format!(
                        "{indentation}{structure_name}-{}.\n",
                        child.concat_tokens()
                    ));
                }
                Some(E::Source) => {
                    structure_name = child.concat_tokens();
                }
                Some(E::LetExpression) => {
                    body.push_str(&outline_let(&child, &indentation, ctx));
                }
                _ => {}
            }
        }

        if loop_def.is_some() {
            indentation.truncate(indentation.len().saturating_sub(2));
            body.push_str(&format!("{indentation}ENDLOOP.\n"));
        }

        let abap = format!("DATA {name} TYPE {ty}.\n{body}{indentation}");
        let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, abap);
        let fix2 = EditHelper::replace_range(
            ctx.low_file,
            first.start(),
            source.last_token()?.end(),
            name,
        );
        let fix = EditHelper::merge(fix2, fix1);
        return Some(ctx.issue_at(first, "Downport VALUE").with_fix(fix));
    }
    None
}

fn outline_let(let_node: &NodeRef<'_>, indentation: &str, ctx: &RuleCtx<'_>) -> String {
    let mut out = String::new();
    for def in let_node.find_direct_expressions(E::InlineFieldDefinition) {
        let Some(field) = def.first_child() else { continue };
        let name = field.concat_tokens().to_lowercase();

        let Some(token) = field.first_token() else { continue };
        let Some(scope) = ctx
            .high_syntax
            .lookup_position(token.start(), ctx.filename())
        else {
            continue;
        };
        let Some(found) = scope.find_variable(&name) else {
            continue;
        };
        let ty = found
            .get_type()
            .qualified_name()
            .unwrap_or_else(|| found.get_type().to_abap());

        out.push_str(&format!("{indentation}DATA {name} TYPE {ty}.\n"));
        if let Some(source) = def.find_first_expression(E::Source) {
            out.push_str(&format!(
                "{indentation}{name} = {}.\n",
                source.concat_tokens()
            ));
        }
    }
    out
}

/// Rule 11: `REDUCE type( INIT ... FOR ... NEXT ... )`.
pub fn outline_reduce(high: &StatementNode<'_>, ctx: &mut RuleCtx<'_>) -> Option<Issue> {
    for source in high.find_all_expressions_recursive(E::Source) {
        let Some(first) = source.first_token() else {
            continue;
        };
        if first.upper() != "REDUCE" {
            continue;
        }
        let Some(ty) = ctx.find_type(&source) else {
            continue;
        };
        let Some(reduce_body) = source.find_direct_expression(E::ReduceBody) else {
            continue;
        };

        let name = ctx.unique_name(first.start());
        let indentation = ctx.indentation(high);
        let mut body = String::new();
        let mut accumulator = String::new();

        for init in reduce_body.find_direct_expressions(E::InlineFieldDefinition) {
            accumulator = init.first_token()?.text().to_string();
            let init_source = reduce_body
                .find_first_expression(E::Source)
                .map(|s| s.concat_tokens())
                .unwrap_or_default();
            body.push_str(&format!("{indentation}DATA({accumulator}) = {init_source}.\n"));
        }

        let loop_def = reduce_body.find_first_expression(E::InlineLoopDefinition)?;
        let loop_source = loop_def
            .find_first_expression(E::Source)
            .map(|s| s.concat_tokens())
            .unwrap_or_default();
        if let Some(field) = loop_def.find_first_expression(E::TargetField) {
            body.push_str(&format!(
                "{indentation}LOOP AT {loop_source} INTO DATA({}).\n",
                field.concat_tokens()
            ));
        } else if let Some(fs) = loop_def.find_first_expression(E::TargetFieldSymbol) {
            body.push_str(&format!(
                "{indentation}LOOP AT {loop_source} ASSIGNING FIELD-SYMBOL({}).\n",
                fs.concat_tokens()
            ));
        }

        let next = reduce_body.find_direct_expression(E::ReduceNext)?;
        for child in next.children() {
            if let Some(token) = child.token() {
                if token.upper() == "NEXT" {
                    continue;
                }
                if token.text() == "=" {
                    body.push_str(" = ");
                }
                continue;
            }
            match child.kind() {
                Some(E::Field) => {
                    body.push_str(&format!("{indentation}  {}", child.concat_tokens()));
                }
                Some(E::Source) => {
                    body.push_str(&format!("{}.\n", child.concat_tokens()));
                }
                _ => {}
            }
        }

        body.push_str(&format!("{indentation}ENDLOOP.\n"));
        body.push_str(&format!("{indentation}{name} = {accumulator}.\n"));

        let abap = format!("DATA {name} TYPE {ty}.\n{body}{indentation}");
        let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, abap);
        let fix2 = EditHelper::replace_range(
            ctx.low_file,
            first.start(),
            source.last_token()?.end(),
            name,
        );
        let fix = EditHelper::merge(fix2, fix1);
        return Some(ctx.issue_at(first, "Downport REDUCE").with_fix(fix));
    }
    None
}

/// Rule 12: `CAST type( ... )` becomes a typed reference plus `?=`.
pub fn outline_cast(high: &StatementNode<'_>, ctx: &mut RuleCtx<'_>) -> Option<Issue> {
    for cast in high.find_all_expressions_recursive(E::CastConstructor) {
        let Some(first) = cast.first_token() else {
            continue;
        };
        let Some(ty) = ctx.find_type(&cast) else {
            continue;
        };
        let Some(body) = cast.find_direct_expression(E::Source) else {
            continue;
        };

        let name = ctx.unique_name(first.start());
        let indentation = ctx.indentation(high);
        let abap = format!(
            "DATA {name} TYPE REF TO {ty}.\n\
             {indentation}{name} ?= {}.\n\
             {indentation}",
            body.concat_tokens()
        );
        let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, abap);
        let fix2 = EditHelper::replace_range(
            ctx.low_file,
            first.start(),
            cast.last_token()?.end(),
            name,
        );
        let fix = EditHelper::merge(fix2, fix1);
        return Some(ctx.issue_at(first, "Downport CAST").with_fix(fix));
    }
    None
}

/// Rule 13: `CONV type( ... )` becomes a typed temporary assignment.
pub fn outline_conv(high: &StatementNode<'_>, ctx: &mut RuleCtx<'_>) -> Option<Issue> {
    for source in high.find_all_expressions_recursive(E::Source) {
        let Some(first) = source.first_token() else {
            continue;
        };
        if first.upper() != "CONV" {
            continue;
        }
        let Some(body) = source.find_direct_expression(E::ConvBody) else {
            continue;
        };
        let Some(ty) = ctx.find_type(&source) else {
            continue;
        };

        let name = ctx.unique_name(first.start());
        let indentation = ctx.indentation(high);
        let abap = format!(
            "DATA {name} TYPE {ty}.\n\
             {indentation}{name} = {}.\n\
             {indentation}",
            body.concat_tokens()
        );
        let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, abap);
        let fix2 = EditHelper::replace_range(
            ctx.low_file,
            first.start(),
            source.last_token()?.end(),
            name,
        );
        let fix = EditHelper::merge(fix2, fix1);
        return Some(ctx.issue_at(first, "Downport CONV").with_fix(fix));
    }
    None
}

/// Rule 14: `COND type( WHEN ... THEN ... ELSE ... )` becomes an
/// IF/ELSEIF/ELSE cascade assigning a typed temporary.
pub fn outline_cond(
    high: &StatementNode<'_>,
    ctx: &mut RuleCtx<'_>,
) -> Result<Option<Issue>, ReconstructionError> {
    for source in high.find_all_expressions_recursive(E::Source) {
        let Some(first) = source.first_token() else {
            continue;
        };
        if first.upper() != "COND" {
            continue;
        }
        let Some(body) = source.find_direct_expression(E::CondBody) else {
            continue;
        };
        let Some(ty) = ctx.find_type(&source) else {
            continue;
        };

        let name = ctx.unique_name(first.start());
        let indentation = ctx.indentation(high);
        let body_code = build_cond_body(&body, &name, &indentation)?;

        let abap = format!("DATA {name} TYPE {ty}.\n{body_code}");
        let Some(start) = high.start() else { continue };
        let fix1 = EditHelper::insert_at(ctx.low_file, start, abap);
        let Some(last) = source.last_token() else {
            continue;
        };
        let fix2 =
            EditHelper::replace_range(ctx.low_file, first.start(), last.end(), name);
        let fix = EditHelper::merge(fix2, fix1);
        return Ok(Some(ctx.issue_at(first, "Downport COND").with_fix(fix)));
    }
    Ok(None)
}

/// Re-emit a conditional-value body as IF/ELSEIF/ELSE assignments.
///
/// Any clause shape outside WHEN/THEN/ELSE means the grammar and this
/// rule disagree; that is a reconstruction failure, aborting only the
/// statement being rewritten.
fn build_cond_body(
    body: &NodeRef<'_>,
    name: &str,
    indentation: &str,
) -> Result<String, ReconstructionError> {
    let mut code = indentation.to_string();
    let mut first_when = true;

    for child in body.children() {
        if let Some(token) = child.token() {
            match token.upper().as_str() {
                "WHEN" => {
                    if first_when {
                        code.push_str("IF ");
                        first_when = false;
                    } else {
                        code.push_str(&format!("{indentation}ELSEIF "));
                    }
                }
                "THEN" => code.push_str(".\n"),
                "ELSE" => code.push_str(&format!("{indentation}ELSE.\n")),
                other => {
                    return Err(ReconstructionError::unexpected_token(other));
                }
            }
            continue;
        }
        match child.kind() {
            Some(E::Cond) => code.push_str(&child.concat_tokens()),
            Some(E::Source) => {
                code.push_str(&format!(
                    "{indentation}  {name} = {}.\n",
                    child.concat_tokens()
                ));
            }
            _ => return Err(ReconstructionError::unexpected_expression()),
        }
    }

    code.push_str(&format!("{indentation}ENDIF.\n"));
    code.push_str(indentation);
    Ok(code)
}
