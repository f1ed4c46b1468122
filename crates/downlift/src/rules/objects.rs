//! Rule 18: `NEW` object construction becomes `CREATE OBJECT`.
//!
//! A bare positional argument (`NEW zcl_foo( value )`) must be rebound
//! to the constructor's default importing parameter, resolved through
//! the method parameter model of the class definition referenced at the
//! type token. When resolution fails the generated statement embeds a
//! diagnostic placeholder token so the failure is visible in the output
//! rather than silently dropped.

use downlift_core::{Edit, Issue};
use downlift_syntax::nodes::{ExpressionKind as E, NodeRef, StatementKind, StatementNode};
use downlift_syntax::scope::{ReferenceKind, ResolvedRef};
use downlift_syntax::EditHelper;

use super::RuleCtx;

pub fn new_to_create_object(high: &StatementNode<'_>, ctx: &mut RuleCtx<'_>) -> Option<Issue> {
    let source = high.find_direct_expression(E::Source);

    let mut fix: Option<Edit> = None;

    // whole-statement form: target = NEW type( ... ).
    if high.kind() == StatementKind::Move {
        if let Some(source) = &source {
            if source.first_token().is_some_and(|t| t.upper() == "NEW") {
                let target = high.find_direct_expression(E::Target);
                let found = source.find_first_expression(E::NewObject);
                if let (Some(target), Some(found)) = (target, found) {
                    if source.concat_tokens() == found.concat_tokens() {
                        if let Some(abap) =
                            new_parameters(&found, &target.concat_tokens(), ctx)
                        {
                            fix = Some(EditHelper::replace_range(
                                ctx.low_file,
                                high.start()?,
                                high.end()?,
                                abap,
                            ));
                        }
                    }
                }
            }
        }
    }

    // embedded form: outline into a temporary reference
    if fix.is_none() {
        let found = high.find_first_expression(E::NewObject)?;
        let first = found.first_token()?;
        let name = ctx.unique_name(first.start());
        let abap = new_parameters(&found, &name, ctx)?;
        let ty = ctx.find_type(&found)?;
        let indentation = ctx.indentation(high);

        let declaration = format!(
            "DATA {name} TYPE REF TO {ty}.\n\
             {indentation}{abap}\n\
             {indentation}"
        );
        let fix1 = EditHelper::insert_at(ctx.low_file, high.start()?, declaration);
        let fix2 = EditHelper::replace_range(
            ctx.low_file,
            first.start(),
            found.last_token()?.end(),
            name,
        );
        fix = Some(EditHelper::merge(fix2, fix1));
    }

    let fix = fix?;
    let anchor = high.first_token()?;
    Some(
        ctx.issue_at(anchor, "Use CREATE OBJECT instead of NEW")
            .with_fix(fix),
    )
}

/// Render the `CREATE OBJECT` statement for a `NewObject` node.
fn new_parameters(found: &NodeRef<'_>, name: &str, ctx: &RuleCtx<'_>) -> Option<String> {
    let type_token = found
        .find_direct_expression(E::TypeNameOrInfer)?
        .first_token()?;
    let mut extra = if type_token.text() == "#" {
        String::new()
    } else {
        format!(" TYPE {}", type_token.text())
    };

    if let Some(parameters) = found.find_first_expression(E::ParameterList) {
        extra.push_str(&format!(" EXPORTING {}", parameters.concat_tokens()));
    } else if let Some(source) = found.find_direct_expression(E::Source) {
        // bare positional argument: resolve the constructor's default
        // importing parameter
        let source_text = source.concat_tokens();
        let scope = ctx
            .high_syntax
            .lookup_position(type_token.start(), ctx.filename());

        let mut class_name: Option<String> = None;
        if let Some(scope) = &scope {
            for r in scope.references() {
                let relevant = matches!(
                    r.kind,
                    ReferenceKind::InferredType | ReferenceKind::ObjectOriented
                );
                if relevant && r.token.start().equals(&type_token.start()) {
                    if let ResolvedRef::Class(c) = &r.resolved {
                        class_name = Some(c.clone());
                    }
                }
            }
        }
        let cdef = class_name
            .as_deref()
            .and_then(|c| ctx.high_syntax.class_definition(c));

        let importing = cdef
            .and_then(|d| d.methods().by_name("CONSTRUCTOR"))
            .and_then(|m| m.default_importing());

        if let Some(importing) = importing {
            extra.push_str(&format!(" EXPORTING {importing} = {source_text}"));
        } else if scope.is_none() {
            extra.push_str(" ScopeUndefined");
        } else if cdef.is_none() {
            extra.push_str(" ClassDefinitionNotFound");
        } else {
            extra.push_str(" DefaultParameterNotFound");
        }
    }

    Some(format!("CREATE OBJECT {name}{extra}."))
}
