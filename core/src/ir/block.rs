//! file: core/src/ir/block.rs
//! description: lowers scatter and conditional blocks into applet/stage pairs.
//!
//! A structured block becomes a synthetic applet holding a self-contained
//! sub-workflow closed over its free variables, plus a stage wiring those
//! variables in. Types exported from the block are promoted: arrays under a
//! scatter, optionals under a conditional.
//!
use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::ast::{AstNode, AstNodeKind, WdlType, writer};

use super::LoweringSession;
use super::call::{check_stage_name, unqualified_task_name};
use super::env::{self, CallEnv};
use super::err::{LoweringError, LoweringErrorKind};
use super::model::{Applet, AppletKind, CVar, DockerImage, InstanceType, LinkedVar, Stage};
use super::split::{self, Block};
use super::task::validate_generated;

/// Declarations the compiler generates carry this prefix. Only these are
/// candidates for the block-local output exclusion; user-named declarations
/// are conservatively always exported.
pub(crate) const GENERATED_VAR_PREFIX: &str = "xtmp";

struct BlockShape<'a> {
    is_scatter: bool,
    scatter_variable: Option<&'a str>,
    controlling: &'a AstNode,
    body: &'a [AstNode],
}

fn block_shape(block: &AstNode) -> Result<BlockShape<'_>, LoweringError> {
    match &block.kind {
        AstNodeKind::Scatter {
            variable,
            collection,
            body,
        } => Ok(BlockShape {
            is_scatter: true,
            scatter_variable: Some(variable),
            controlling: collection,
            body,
        }),
        AstNodeKind::Conditional { condition, body } => Ok(BlockShape {
            is_scatter: false,
            scatter_variable: None,
            controlling: condition,
            body,
        }),
        other => Err(LoweringError::internal(
            format!("Expected a scatter or conditional node, found {}", other),
            "stagehand.ir.block.block_shape",
        )),
    }
}

/// Split a block body into its leading declarations and its calls. Only
/// those two member kinds are supported inside a block.
fn split_block_body(body: &[AstNode]) -> Result<(Vec<AstNode>, Vec<AstNode>), LoweringError> {
    let mut leading = Vec::new();
    let mut calls = Vec::new();
    for (index, unit) in split::split(body).into_iter().enumerate() {
        match unit {
            Block::DeclRun(decls) if index == 0 => leading = decls,
            Block::DeclRun(decls) => {
                let name = decls
                    .first()
                    .and_then(|d| match &d.kind {
                        AstNodeKind::Declaration { name, .. } => Some(name.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();
                return Err(LoweringError::new(
                    LoweringErrorKind::UnsupportedBlockElement,
                    format!(
                        "Declaration {} appears after a call; block declarations must precede all calls.",
                        name
                    ),
                    "stagehand.ir.block.split_block_body",
                ));
            }
            Block::ScatterBlock { scatter, .. } => {
                return Err(LoweringError::new(
                    LoweringErrorKind::UnsupportedBlockElement,
                    "Nested scatter blocks are not supported.".to_string(),
                    "stagehand.ir.block.split_block_body",
                )
                .with_location(scatter.location.clone()));
            }
            Block::ConditionalBlock { cond, .. } => {
                return Err(LoweringError::new(
                    LoweringErrorKind::UnsupportedBlockElement,
                    "Nested conditional blocks are not supported.".to_string(),
                    "stagehand.ir.block.split_block_body",
                )
                .with_location(cond.location.clone()));
            }
            Block::OpaqueScope(node) => match &node.kind {
                AstNodeKind::Call { .. } => calls.push(node),
                other => {
                    return Err(LoweringError::new(
                        LoweringErrorKind::UnsupportedBlockElement,
                        format!("A block may contain only declarations and calls, found {}.", other),
                        "stagehand.ir.block.split_block_body",
                    )
                    .with_location(node.location.clone()));
                }
            },
        }
    }
    Ok((leading, calls))
}

fn declaration_parts(decl: &AstNode) -> Option<(&WdlType, &str, Option<&AstNode>)> {
    match &decl.kind {
        AstNodeKind::Declaration { ty, name, expr } => {
            Some((ty, name.as_str(), expr.as_deref()))
        }
        _ => None,
    }
}

fn call_parts(call: &AstNode) -> (&str, &str, &[(String, AstNode)]) {
    match &call.kind {
        AstNodeKind::Call { task, alias, inputs } => {
            let stage = alias.as_deref().unwrap_or(unqualified_task_name(task));
            (task.as_str(), stage, inputs.as_slice())
        }
        _ => ("", "", &[]),
    }
}

pub(crate) fn flatten(name: &str) -> String {
    name.replace('.', "_")
}

/// Structurally rewrite an expression, replacing every member chain bound
/// in the closure with its flattened identifier. References internal to the
/// block are left alone.
pub(crate) fn rewrite_expr(expr: &AstNode, closure_keys: &HashSet<String>) -> AstNode {
    if let Some(dotted) = expr.kind.dotted_name() {
        // Longest closure-bound prefix wins, mirroring environment
        // resolution.
        let mut candidate = dotted.as_str();
        loop {
            if closure_keys.contains(candidate) {
                let mut node = AstNode::new(
                    AstNodeKind::Identifier {
                        name: flatten(candidate),
                    },
                    expr.location.clone(),
                    expr.span.clone(),
                );
                if candidate.len() < dotted.len() {
                    for property in dotted[candidate.len() + 1..].split('.') {
                        node = AstNode::new(
                            AstNodeKind::MemberAccess {
                                object: Box::new(node),
                                property: property.to_string(),
                            },
                            expr.location.clone(),
                            expr.span.clone(),
                        );
                    }
                }
                return node;
            }
            match candidate.rfind('.') {
                Some(idx) => candidate = &dotted[..idx],
                None => break,
            }
        }
    }

    let kind = match &expr.kind {
        AstNodeKind::UnaryOp { op, expr: inner } => AstNodeKind::UnaryOp {
            op: *op,
            expr: Box::new(rewrite_expr(inner, closure_keys)),
        },
        AstNodeKind::BinaryOp { left, op, right } => AstNodeKind::BinaryOp {
            left: Box::new(rewrite_expr(left, closure_keys)),
            op: *op,
            right: Box::new(rewrite_expr(right, closure_keys)),
        },
        AstNodeKind::MemberAccess { object, property } => AstNodeKind::MemberAccess {
            object: Box::new(rewrite_expr(object, closure_keys)),
            property: property.clone(),
        },
        AstNodeKind::Index { object, index } => AstNodeKind::Index {
            object: Box::new(rewrite_expr(object, closure_keys)),
            index: Box::new(rewrite_expr(index, closure_keys)),
        },
        AstNodeKind::Apply { function, args } => AstNodeKind::Apply {
            function: function.clone(),
            args: args.iter().map(|a| rewrite_expr(a, closure_keys)).collect(),
        },
        AstNodeKind::ArrayLiteral { elements } => AstNodeKind::ArrayLiteral {
            elements: elements
                .iter()
                .map(|e| rewrite_expr(e, closure_keys))
                .collect(),
        },
        other => other.clone(),
    };
    AstNode::new(kind, expr.location.clone(), expr.span.clone())
}

pub(crate) fn rewrite_declaration(decl: &AstNode, closure_keys: &HashSet<String>) -> AstNode {
    match &decl.kind {
        AstNodeKind::Declaration { ty, name, expr } => AstNode::new(
            AstNodeKind::Declaration {
                ty: ty.clone(),
                name: name.clone(),
                expr: expr
                    .as_ref()
                    .map(|e| Box::new(rewrite_expr(e, closure_keys))),
            },
            decl.location.clone(),
            decl.span.clone(),
        ),
        _ => decl.clone(),
    }
}

fn rewrite_call(call: &AstNode, closure_keys: &HashSet<String>) -> AstNode {
    match &call.kind {
        AstNodeKind::Call { task, alias, inputs } => AstNode::new(
            AstNodeKind::Call {
                task: task.clone(),
                alias: alias.clone(),
                inputs: inputs
                    .iter()
                    .map(|(name, e)| (name.clone(), rewrite_expr(e, closure_keys)))
                    .collect(),
            },
            call.location.clone(),
            call.span.clone(),
        ),
        _ => call.clone(),
    }
}

/// A signature-only copy of a callee, embedded in the generated
/// sub-program so it re-parses as a self-contained document.
fn applet_stub(callee: &Applet) -> AstNode {
    let mut sections = Vec::new();
    for input in &callee.inputs {
        sections.push(AstNode::new(
            AstNodeKind::Declaration {
                ty: input.ty.clone(),
                name: input.name.clone(),
                expr: None,
            },
            None,
            None,
        ));
    }
    sections.push(AstNode::new(
        AstNodeKind::CommandSection {
            text: String::new(),
        },
        None,
        None,
    ));
    sections.push(AstNode::new(
        AstNodeKind::OutputSection {
            declarations: callee
                .outputs
                .iter()
                .map(|output| {
                    AstNode::new(
                        AstNodeKind::Declaration {
                            ty: output.ty.clone(),
                            name: output.name.clone(),
                            expr: None,
                        },
                        None,
                        None,
                    )
                })
                .collect(),
        },
        None,
        None,
    ));
    AstNode::new(
        AstNodeKind::Task {
            name: callee.name.clone(),
            sections,
        },
        None,
        None,
    )
}

/// Convert a scatter or conditional block, together with the declarations
/// immediately preceding it, into one applet and one stage.
pub fn lower_block(
    preceding: &[AstNode],
    block: &AstNode,
    outer_env: &CallEnv,
    applets: &BTreeMap<String, Applet>,
    session: &mut LoweringSession,
) -> Result<(Stage, Applet), LoweringError> {
    let shape = block_shape(block)?;
    let (leading, calls) = split_block_body(shape.body)?;

    // Names defined by the block itself; references to them never enter
    // the closure.
    let mut local_names: HashSet<String> = HashSet::new();
    if let Some(variable) = shape.scatter_variable {
        local_names.insert(variable.to_string());
    }
    for decl in preceding.iter().chain(leading.iter()) {
        if let Some((_, name, _)) = declaration_parts(decl) {
            local_names.insert(name.to_string());
        }
    }
    for call in &calls {
        let (_, stage, _) = call_parts(call);
        local_names.insert(stage.to_string());
    }

    // The controlling expression must already be a bound name: either in
    // the surrounding environment or one of the preceding declarations.
    let controlling_name = shape.controlling.kind.dotted_name().ok_or_else(|| {
        LoweringError::internal(
            "Computed controlling expression reached block lowering; the validation pass admits only variable references.".to_string(),
            "stagehand.ir.block.lower_block",
        )
    })?;
    let controlling_root = controlling_name
        .split('.')
        .next()
        .unwrap_or(&controlling_name)
        .to_string();
    if outer_env.resolve(&controlling_name).is_none() && !local_names.contains(&controlling_root) {
        return Err(LoweringError::new(
            LoweringErrorKind::MissingVariableReference,
            format!(
                "The controlling expression {} is not bound in the surrounding scope.",
                controlling_name
            ),
            "stagehand.ir.block.lower_block",
        )
        .with_location(shape.controlling.location.clone()));
    }

    // Input closure: everything the preceding declarations, the controlling
    // expression, the leading declarations and the call arguments read from
    // the surrounding environment.
    let mut closure = CallEnv::new();
    for decl in preceding.iter().chain(leading.iter()) {
        if let Some((_, _, Some(expr))) = declaration_parts(decl) {
            closure = env::update_closure(closure, outer_env, expr);
        }
    }
    closure = env::update_closure(closure, outer_env, shape.controlling);
    for call in &calls {
        let (_, _, inputs) = call_parts(call);
        for (_, expr) in inputs {
            closure = env::update_closure(closure, outer_env, expr);
        }
    }

    // Stable input order for the applet signature and the stage arguments.
    let mut closure_entries: Vec<(String, LinkedVar)> =
        closure.iter().cloned().collect();
    closure_entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    let closure_keys: HashSet<String> =
        closure_entries.iter().map(|(name, _)| name.clone()).collect();

    let id = session.next_stage_id();
    let stage_name = if shape.is_scatter {
        format!("scatter_{}", id)
    } else {
        format!("if_{}", id)
    };

    let promote = |ty: &WdlType| {
        if shape.is_scatter {
            ty.promote_array()
        } else {
            ty.promote_optional()
        }
    };

    // Exported variables. Preceding declarations pass through unchanged;
    // everything produced inside the block is promoted. Generated
    // declarations confined to the block are not exported.
    let mut outputs: Vec<CVar> = Vec::new();
    let mut output_decls: Vec<AstNode> = Vec::new();
    for decl in preceding {
        if let Some((ty, name, _)) = declaration_parts(decl) {
            outputs.push(CVar::new(name, ty.clone()).with_source(decl.location.clone()));
            output_decls.push(AstNode::new(
                AstNodeKind::Declaration {
                    ty: ty.clone(),
                    name: name.to_string(),
                    expr: None,
                },
                None,
                None,
            ));
        }
    }
    for decl in &leading {
        if let Some((ty, name, _)) = declaration_parts(decl) {
            if name.starts_with(GENERATED_VAR_PREFIX) {
                continue;
            }
            let promoted = promote(ty);
            outputs.push(CVar::new(name, promoted.clone()).with_source(decl.location.clone()));
            output_decls.push(AstNode::new(
                AstNodeKind::Declaration {
                    ty: promoted,
                    name: name.to_string(),
                    expr: None,
                },
                None,
                None,
            ));
        }
    }

    let mut callee_names: Vec<String> = Vec::new();
    for call in &calls {
        let (task, stage, _) = call_parts(call);
        check_stage_name(stage)?;
        let task_name = unqualified_task_name(task);
        let Some(callee) = applets.get(task_name) else {
            return Err(LoweringError::new(
                LoweringErrorKind::UndefinedTask,
                format!("Call references task {}, which has not been lowered.", task),
                "stagehand.ir.block.lower_block",
            )
            .with_location(call.location.clone()));
        };
        if !callee_names.iter().any(|n| n == &callee.name) {
            callee_names.push(callee.name.clone());
        }
        for output in &callee.outputs {
            let exported = format!("{}.{}", stage, output.name);
            let promoted = promote(&output.ty);
            outputs.push(CVar::new(&exported, promoted.clone()));
            output_decls.push(AstNode::new(
                AstNodeKind::Declaration {
                    ty: promoted,
                    name: flatten(&exported),
                    expr: Some(Box::new(AstNode::new(
                        AstNodeKind::MemberAccess {
                            object: Box::new(AstNode::new(
                                AstNodeKind::Identifier {
                                    name: stage.to_string(),
                                },
                                None,
                                None,
                            )),
                            property: output.name.clone(),
                        },
                        None,
                        None,
                    ))),
                },
                None,
                None,
            ));
        }
    }

    // Assemble the self-contained sub-program: one declaration per closure
    // input, stub tasks for every callee, and the rewritten block.
    let mut workflow_body: Vec<AstNode> = Vec::new();
    for (name, var) in &closure_entries {
        workflow_body.push(AstNode::new(
            AstNodeKind::Declaration {
                ty: var.cvar.ty.clone(),
                name: flatten(name),
                expr: None,
            },
            None,
            None,
        ));
    }
    for decl in preceding {
        workflow_body.push(rewrite_declaration(decl, &closure_keys));
    }

    let mut inner_body: Vec<AstNode> = Vec::new();
    for decl in &leading {
        inner_body.push(rewrite_declaration(decl, &closure_keys));
    }
    for call in &calls {
        inner_body.push(rewrite_call(call, &closure_keys));
    }

    let rewritten_controlling = rewrite_expr(shape.controlling, &closure_keys);
    let block_stmt = if shape.is_scatter {
        AstNode::new(
            AstNodeKind::Scatter {
                variable: shape.scatter_variable.unwrap_or_default().to_string(),
                collection: Box::new(rewritten_controlling),
                body: inner_body,
            },
            block.location.clone(),
            block.span.clone(),
        )
    } else {
        AstNode::new(
            AstNodeKind::Conditional {
                condition: Box::new(rewritten_controlling),
                body: inner_body,
            },
            block.location.clone(),
            block.span.clone(),
        )
    };
    workflow_body.push(block_stmt);
    workflow_body.push(AstNode::new(
        AstNodeKind::OutputSection {
            declarations: output_decls,
        },
        None,
        None,
    ));

    let mut items: Vec<AstNode> = Vec::new();
    for callee_name in &callee_names {
        if let Some(callee) = applets.get(callee_name) {
            items.push(applet_stub(callee));
        }
    }
    items.push(AstNode::new(
        AstNodeKind::Workflow {
            name: stage_name.clone(),
            body: workflow_body,
        },
        None,
        None,
    ));
    let document = AstNode::new(
        AstNodeKind::Document {
            version: None,
            items,
        },
        None,
        None,
    );

    let code = writer::document_text(&document);
    validate_generated(&stage_name, &code)?;

    let kind = if shape.is_scatter {
        if outputs.iter().all(|output| output.ty.is_platform_native()) {
            AppletKind::Scatter(callee_names)
        } else {
            AppletKind::ScatterCollect(callee_names)
        }
    } else {
        AppletKind::If(callee_names)
    };

    debug!(
        "lowered {} block -> stage {} ({} closure inputs, {} outputs)",
        if shape.is_scatter { "scatter" } else { "conditional" },
        stage_name,
        closure_entries.len(),
        outputs.len()
    );

    let applet = Applet {
        name: stage_name.clone(),
        inputs: closure_entries
            .iter()
            .map(|(name, var)| CVar::new(name, var.cvar.ty.clone()))
            .collect(),
        outputs: outputs.clone(),
        instance_type: InstanceType::Default,
        docker: DockerImage::None,
        destination: session.options.destination.clone(),
        kind,
        code,
        source_text: None,
        ast: document,
    };

    let stage = Stage {
        name: stage_name,
        id,
        applet: applet.name.clone(),
        inputs: closure_entries
            .iter()
            .map(|(_, var)| var.sarg.clone())
            .collect(),
        outputs,
    };

    Ok((stage, applet))
}
