//! file: core/src/ir/workflow.rs
//! description: assembles a workflow from its lowered units.
//!
//! Walks the top-level blocks in source order, lowers each one, and threads
//! the environment forward, stitching every stage's outputs back in as
//! visible bindings for the units that follow.
//!
use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::ast::{AstNode, AstNodeKind, writer};
use crate::eval;

use super::LoweringSession;
use super::block::{self, rewrite_declaration};
use super::call;
use super::env::{self, CallEnv};
use super::err::{LoweringError, LoweringErrorKind};
use super::model::{
    Applet, AppletKind, CVar, DockerImage, InstanceType, LinkedVar, Namespace, SArg, Stage,
    Workflow,
};
use super::split::{self, Block};
use super::task::validate_generated;

fn declaration_parts(decl: &AstNode) -> Result<(&AstNode, &str), LoweringError> {
    match &decl.kind {
        AstNodeKind::Declaration { name, .. } => Ok((decl, name.as_str())),
        other => Err(LoweringError::internal(
            format!("Expected a declaration, found {}", other),
            "stagehand.ir.workflow.declaration_parts",
        )),
    }
}

/// Lower a maximal run of plain declarations into a synthetic applet whose
/// sole job is computing them from their closure.
fn lower_eval(
    decls: &[AstNode],
    outer_env: &CallEnv,
    session: &mut LoweringSession,
) -> Result<(Stage, Applet), LoweringError> {
    let mut run_names: HashSet<String> = HashSet::new();
    for decl in decls {
        let (_, name) = declaration_parts(decl)?;
        run_names.insert(name.to_string());
    }

    // Declaration expressions sit in a fully-resolved position: every name
    // must come from the environment or from the run itself.
    let mut closure = CallEnv::new();
    for decl in decls {
        if let AstNodeKind::Declaration {
            expr: Some(expr), ..
        } = &decl.kind
        {
            for reference in env::expression_references(expr) {
                let root = reference.split('.').next().unwrap_or(&reference);
                if outer_env.resolve(&reference).is_none() && !run_names.contains(root) {
                    return Err(LoweringError::new(
                        LoweringErrorKind::MissingVariableReference,
                        format!(
                            "Declaration expression references {}, which is not bound.",
                            reference
                        ),
                        "stagehand.ir.workflow.lower_eval",
                    )
                    .with_location(decl.location.clone()));
                }
            }
            closure = env::update_closure(closure, outer_env, expr);
        }
    }

    let mut closure_entries: Vec<(String, LinkedVar)> = closure.iter().cloned().collect();
    closure_entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    let closure_keys: HashSet<String> =
        closure_entries.iter().map(|(name, _)| name.clone()).collect();

    let id = session.next_stage_id();
    let stage_name = format!("eval_{}", id);

    let mut outputs: Vec<CVar> = Vec::new();
    let mut output_decls: Vec<AstNode> = Vec::new();
    let mut workflow_body: Vec<AstNode> = Vec::new();
    for (name, var) in &closure_entries {
        workflow_body.push(AstNode::new(
            AstNodeKind::Declaration {
                ty: var.cvar.ty.clone(),
                name: block::flatten(name),
                expr: None,
            },
            None,
            None,
        ));
    }
    for decl in decls {
        workflow_body.push(rewrite_declaration(decl, &closure_keys));
        if let AstNodeKind::Declaration { ty, name, .. } = &decl.kind {
            outputs.push(CVar::new(name, ty.clone()).with_source(decl.location.clone()));
            output_decls.push(AstNode::new(
                AstNodeKind::Declaration {
                    ty: ty.clone(),
                    name: name.clone(),
                    expr: None,
                },
                None,
                None,
            ));
        }
    }
    workflow_body.push(AstNode::new(
        AstNodeKind::OutputSection {
            declarations: output_decls,
        },
        None,
        None,
    ));

    let document = AstNode::new(
        AstNodeKind::Document {
            version: None,
            items: vec![AstNode::new(
                AstNodeKind::Workflow {
                    name: stage_name.clone(),
                    body: workflow_body,
                },
                None,
                None,
            )],
        },
        None,
        None,
    );
    let code = writer::document_text(&document);
    validate_generated(&stage_name, &code)?;

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
        kind: AppletKind::Eval,
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

/// The output-reorganization applet: inputs are exactly the workflow
/// outputs, outputs echo them unchanged. Appending its stage forces the
/// workflow to await reorganization before completing.
fn lower_reorg(
    workflow_outputs: &[(CVar, SArg)],
    session: &mut LoweringSession,
) -> Result<(Stage, Applet), LoweringError> {
    let id = session.next_stage_id();
    let stage_name = "reorg".to_string();

    let cvars: Vec<CVar> = workflow_outputs.iter().map(|(cvar, _)| cvar.clone()).collect();
    let mut workflow_body: Vec<AstNode> = Vec::new();
    let mut output_decls: Vec<AstNode> = Vec::new();
    for cvar in &cvars {
        workflow_body.push(AstNode::new(
            AstNodeKind::Declaration {
                ty: cvar.ty.clone(),
                name: cvar.flat_name(),
                expr: None,
            },
            None,
            None,
        ));
        output_decls.push(AstNode::new(
            AstNodeKind::Declaration {
                ty: cvar.ty.clone(),
                name: cvar.flat_name(),
                expr: None,
            },
            None,
            None,
        ));
    }
    workflow_body.push(AstNode::new(
        AstNodeKind::OutputSection {
            declarations: output_decls,
        },
        None,
        None,
    ));
    let document = AstNode::new(
        AstNodeKind::Document {
            version: None,
            items: vec![AstNode::new(
                AstNodeKind::Workflow {
                    name: stage_name.clone(),
                    body: workflow_body,
                },
                None,
                None,
            )],
        },
        None,
        None,
    );
    let code = writer::document_text(&document);
    validate_generated(&stage_name, &code)?;

    let applet = Applet {
        name: stage_name.clone(),
        inputs: cvars.clone(),
        outputs: cvars.clone(),
        instance_type: InstanceType::Default,
        docker: DockerImage::None,
        destination: session.options.destination.clone(),
        kind: AppletKind::OutputReorg,
        code,
        source_text: None,
        ast: document,
    };
    let stage = Stage {
        name: stage_name,
        id,
        applet: applet.name.clone(),
        inputs: workflow_outputs.iter().map(|(_, sarg)| sarg.clone()).collect(),
        outputs: cvars,
    };
    Ok((stage, applet))
}

fn resolve_workflow_output(
    decl: &AstNode,
    final_env: &CallEnv,
) -> Result<(CVar, SArg), LoweringError> {
    let AstNodeKind::Declaration { ty, name, expr } = &decl.kind else {
        return Err(LoweringError::internal(
            format!("Expected an output declaration, found {}", decl.kind),
            "stagehand.ir.workflow.resolve_workflow_output",
        ));
    };
    let cvar = CVar::new(name, ty.clone()).with_source(decl.location.clone());

    let sarg = match expr.as_deref() {
        None => match final_env.resolve(name) {
            Some((_, var)) => var.sarg.clone(),
            None => {
                return Err(missing_output_reference(name, decl));
            }
        },
        Some(e) => match &e.kind {
            AstNodeKind::Identifier { .. } | AstNodeKind::MemberAccess { .. } => {
                let Some(dotted) = e.kind.dotted_name() else {
                    return Err(unsupported_output(name, e, decl));
                };
                match final_env.resolve(&dotted) {
                    Some((_, var)) => var.sarg.clone(),
                    None => return Err(missing_output_reference(&dotted, decl)),
                }
            }
            _ => match eval::evaluate_const(e) {
                Ok(value) => SArg::Const(value),
                Err(_) => return Err(unsupported_output(name, e, decl)),
            },
        },
    };
    Ok((cvar, sarg))
}

fn missing_output_reference(reference: &str, decl: &AstNode) -> LoweringError {
    LoweringError::new(
        LoweringErrorKind::MissingVariableReference,
        format!("Workflow output references {}, which is not bound.", reference),
        "stagehand.ir.workflow.resolve_workflow_output",
    )
    .with_location(decl.location.clone())
}

fn unsupported_output(name: &str, expr: &AstNode, decl: &AstNode) -> LoweringError {
    LoweringError::new(
        LoweringErrorKind::UnsupportedOutputExpression,
        format!(
            "Workflow output {} is a computed expression ({}); outputs must reference bound variables or constants.",
            name,
            writer::expr_text(expr)
        ),
        "stagehand.ir.workflow.resolve_workflow_output",
    )
    .with_location(decl.location.clone())
}

/// Lower a workflow over the applets produced so far, producing the final
/// namespace. Generated applets (eval, scatter, if, reorg) are added to the
/// applet map alongside the task applets.
pub fn lower_workflow(
    workflow: &AstNode,
    mut applets: BTreeMap<String, Applet>,
    session: &mut LoweringSession,
) -> Result<Namespace, LoweringError> {
    let AstNodeKind::Workflow { name, body } = &workflow.kind else {
        return Err(LoweringError::internal(
            format!("Expected a workflow node, found {}", workflow.kind),
            "stagehand.ir.workflow.lower_workflow",
        ));
    };

    // Output declarations are resolved against the final environment, after
    // every unit has been lowered.
    let mut output_decls: Vec<&AstNode> = Vec::new();
    let mut statements: Vec<AstNode> = Vec::new();
    for item in body {
        match &item.kind {
            AstNodeKind::OutputSection { declarations } => {
                output_decls.extend(declarations.iter());
            }
            _ => statements.push(item.clone()),
        }
    }

    // The leading declarations are the workflow's true inputs. They come
    // off the statement list before splitting, so a block at the very top
    // of the body cannot claim them as preceding declarations.
    let input_count = statements
        .iter()
        .take_while(|statement| matches!(statement.kind, AstNodeKind::Declaration { .. }))
        .count();
    let (input_decls, rest) = statements.split_at(input_count);

    let mut env = CallEnv::new();
    let mut workflow_inputs: Vec<(CVar, SArg)> = Vec::new();
    let mut stages: Vec<Stage> = Vec::new();

    for decl in input_decls {
        let AstNodeKind::Declaration { ty, name, expr } = &decl.kind else {
            continue;
        };
        let mut cvar = CVar::new(name, ty.clone()).with_source(decl.location.clone());
        if let Some(default_expr) = expr {
            match eval::evaluate_const(default_expr) {
                Ok(value) => cvar = cvar.with_default(value),
                Err(_) => {
                    return Err(LoweringError::new(
                        LoweringErrorKind::WorkflowInputDefaultNotConst,
                        format!(
                            "Workflow input {} has a non-constant default ({}).",
                            name,
                            writer::expr_text(default_expr)
                        ),
                        "stagehand.ir.workflow.lower_workflow",
                    )
                    .with_location(decl.location.clone()));
                }
            }
        }
        let sarg = SArg::WorkflowInput(cvar.clone());
        env = env.bind(
            name,
            LinkedVar {
                cvar: cvar.clone(),
                sarg: sarg.clone(),
            },
        );
        workflow_inputs.push((cvar, sarg));
    }

    for unit in split::split(rest) {
        match unit {
            Block::DeclRun(decls) => {
                let (stage, applet) = lower_eval(&decls, &env, session)?;
                for output in &stage.outputs {
                    env = env.bind(
                        &output.name,
                        LinkedVar {
                            cvar: output.clone(),
                            sarg: SArg::Link {
                                stage: stage.name.clone(),
                                cvar: output.clone(),
                            },
                        },
                    );
                }
                applets.insert(applet.name.clone(), applet);
                stages.push(stage);
            }
            Block::OpaqueScope(node) => match &node.kind {
                AstNodeKind::Call { .. } => {
                    let stage = call::lower_call(&node, &env, &applets, session)?;
                    for output in &stage.outputs {
                        let qualified = format!("{}.{}", stage.name, output.name);
                        let cvar = CVar::new(&qualified, output.ty.clone());
                        env = env.bind(
                            &qualified,
                            LinkedVar {
                                cvar,
                                sarg: SArg::Link {
                                    stage: stage.name.clone(),
                                    cvar: output.clone(),
                                },
                            },
                        );
                    }
                    stages.push(stage);
                }
                other => {
                    return Err(LoweringError::internal(
                        format!("Unexpected workflow unit: {}", other),
                        "stagehand.ir.workflow.lower_workflow",
                    ));
                }
            },
            Block::ScatterBlock { decls, scatter } => {
                let (stage, applet) =
                    block::lower_block(&decls, &scatter, &env, &applets, session)?;
                for output in &stage.outputs {
                    env = env.bind(
                        &output.name,
                        LinkedVar {
                            cvar: output.clone(),
                            sarg: SArg::Link {
                                stage: stage.name.clone(),
                                cvar: output.clone(),
                            },
                        },
                    );
                }
                applets.insert(applet.name.clone(), applet);
                stages.push(stage);
            }
            Block::ConditionalBlock { decls, cond } => {
                let (stage, applet) = block::lower_block(&decls, &cond, &env, &applets, session)?;
                for output in &stage.outputs {
                    env = env.bind(
                        &output.name,
                        LinkedVar {
                            cvar: output.clone(),
                            sarg: SArg::Link {
                                stage: stage.name.clone(),
                                cvar: output.clone(),
                            },
                        },
                    );
                }
                applets.insert(applet.name.clone(), applet);
                stages.push(stage);
            }
        }
    }

    let mut workflow_outputs: Vec<(CVar, SArg)> = Vec::new();
    for decl in output_decls {
        workflow_outputs.push(resolve_workflow_output(decl, &env)?);
    }

    if session.options.reorg {
        let (stage, applet) = lower_reorg(&workflow_outputs, session)?;
        applets.insert(applet.name.clone(), applet);
        stages.push(stage);
    }

    debug!(
        "lowered workflow {} ({} inputs, {} outputs, {} stages)",
        name,
        workflow_inputs.len(),
        workflow_outputs.len(),
        stages.len()
    );

    Ok(Namespace {
        applets,
        workflow: Some(Workflow {
            name: name.clone(),
            inputs: workflow_inputs,
            outputs: workflow_outputs,
            stages,
        }),
    })
}
