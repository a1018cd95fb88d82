//! file: core/src/ir/call.rs
//! description: lowers one call site into one stage.
//!
use std::collections::BTreeMap;

use lazy_static::lazy_static;
use log::debug;

use crate::ast::{AstNode, AstNodeKind, writer};
use crate::eval;

use super::LoweringSession;
use super::env::CallEnv;
use super::err::{LoweringError, LoweringErrorKind};
use super::model::{Applet, SArg, Stage};

lazy_static! {
    /// Stage-name prefixes the platform reserves for generated applets.
    static ref RESERVED_STAGE_PREFIXES: Vec<&'static str> =
        vec!["scatter_", "if_", "eval_", "reorg_"];
    /// Exact stage names the platform reserves.
    static ref RESERVED_STAGE_NAMES: Vec<&'static str> = vec!["common", "outputs", "reorg"];
}

/// The unqualified task name a call resolves against.
pub(crate) fn unqualified_task_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

pub(crate) fn check_stage_name(name: &str) -> Result<(), LoweringError> {
    let illegal = RESERVED_STAGE_NAMES.iter().any(|r| *r == name)
        || RESERVED_STAGE_PREFIXES.iter().any(|p| name.starts_with(p))
        || name.contains("___");
    if illegal {
        return Err(LoweringError::new(
            LoweringErrorKind::IllegalStageName,
            format!("Stage name {} collides with a reserved platform name.", name),
            "stagehand.ir.call.check_stage_name",
        ));
    }
    Ok(())
}

/// Resolve one supplied actual argument. A call argument must reduce to a
/// bound variable, a dotted reference to one, or a constant; arbitrary
/// runtime computation is not lowered into call arguments.
fn resolve_call_argument(
    call_name: &str,
    param: &str,
    expr: &AstNode,
    env: &CallEnv,
) -> Result<SArg, LoweringError> {
    match &expr.kind {
        AstNodeKind::Identifier { name } => match env.lookup(name) {
            Some(var) => Ok(var.sarg.clone()),
            None => Err(LoweringError::new(
                LoweringErrorKind::MissingVariableReference,
                format!(
                    "Argument {} of call {} references {}, which is not bound.",
                    param, call_name, name
                ),
                "stagehand.ir.call.resolve_call_argument",
            )
            .with_location(expr.location.clone())),
        },
        AstNodeKind::MemberAccess { .. } => {
            let Some(dotted) = expr.kind.dotted_name() else {
                return Err(unsupported_argument(call_name, param, expr));
            };
            match env.resolve(&dotted) {
                Some((_, var)) => Ok(var.sarg.clone()),
                None => Err(LoweringError::new(
                    LoweringErrorKind::MissingVariableReference,
                    format!(
                        "Argument {} of call {} references {}, which is not bound.",
                        param, call_name, dotted
                    ),
                    "stagehand.ir.call.resolve_call_argument",
                )
                .with_location(expr.location.clone())),
            }
        }
        _ => match eval::evaluate_const(expr) {
            Ok(value) => Ok(SArg::Const(value)),
            Err(_) => Err(unsupported_argument(call_name, param, expr)),
        },
    }
}

fn unsupported_argument(call_name: &str, param: &str, expr: &AstNode) -> LoweringError {
    LoweringError::new(
        LoweringErrorKind::UnsupportedCallArgument,
        format!(
            "Argument {} of call {} is a computed expression ({}); only variables and constants are supported at a call site.",
            param,
            call_name,
            writer::expr_text(expr)
        ),
        "stagehand.ir.call.resolve_call_argument",
    )
    .with_location(expr.location.clone())
}

/// Convert one call site into a stage bound to a previously lowered applet.
pub fn lower_call(
    call: &AstNode,
    env: &CallEnv,
    applets: &BTreeMap<String, Applet>,
    session: &mut LoweringSession,
) -> Result<Stage, LoweringError> {
    let AstNodeKind::Call { task, alias, inputs } = &call.kind else {
        return Err(LoweringError::internal(
            format!("Expected a call node, found {}", call.kind),
            "stagehand.ir.call.lower_call",
        ));
    };

    let task_name = unqualified_task_name(task);
    let Some(callee) = applets.get(task_name) else {
        return Err(LoweringError::new(
            LoweringErrorKind::UndefinedTask,
            format!("Call references task {}, which has not been lowered.", task),
            "stagehand.ir.call.lower_call",
        )
        .with_location(call.location.clone()));
    };

    let stage_name = alias.clone().unwrap_or_else(|| task_name.to_string());
    check_stage_name(&stage_name)?;

    let mut args = Vec::with_capacity(callee.inputs.len());
    for input in &callee.inputs {
        let supplied = inputs
            .iter()
            .find(|(name, _)| *name == input.name)
            .map(|(_, expr)| expr);
        match supplied {
            Some(expr) => {
                args.push(resolve_call_argument(&stage_name, &input.name, expr, env)?);
            }
            None if input.ty.is_optional() => args.push(SArg::Empty),
            None => {
                return Err(LoweringError::new(
                    LoweringErrorKind::MissingRequiredArgument,
                    format!(
                        "Call {} does not bind required input {} of task {}.",
                        stage_name, input.name, task_name
                    ),
                    "stagehand.ir.call.lower_call",
                )
                .with_location(call.location.clone()));
            }
        }
    }

    let id = session.next_stage_id();
    debug!("lowered call {} -> stage {} (id {})", task, stage_name, id);

    Ok(Stage {
        name: stage_name,
        id,
        applet: callee.name.clone(),
        inputs: args,
        outputs: callee.outputs.clone(),
    })
}
