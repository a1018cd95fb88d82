//! file: core/src/ir/task.rs
//! description: lowers one task definition into one applet.
//!
use std::collections::HashMap;

use lazy_static::lazy_static;
use log::debug;

use crate::ast::{self, AstNode, AstNodeKind, writer};
use crate::eval;

use super::LoweringSession;
use super::err::{LoweringError, LoweringErrorKind};
use super::model::{Applet, AppletKind, CVar, DockerImage, InstanceSpec, InstanceType};
use super::value::Value;

/// Container images pinned to a platform asset use this URL scheme.
pub const ASSET_URL_PREFIX: &str = "asset://";

/// Runtime attributes that participate in instance-type resolution.
const INSTANCE_ATTRIBUTES: [&str; 4] = ["memory", "disks", "cpu", "instance_type"];

lazy_static! {
    /// Memory unit suffix -> bytes per unit.
    static ref MEMORY_UNITS: HashMap<&'static str, u64> = {
        let mut m = HashMap::new();
        m.insert("b", 1);
        m.insert("k", 1_000);
        m.insert("kb", 1_000);
        m.insert("m", 1_000_000);
        m.insert("mb", 1_000_000);
        m.insert("g", 1_000_000_000);
        m.insert("gb", 1_000_000_000);
        m.insert("t", 1_000_000_000_000);
        m.insert("tb", 1_000_000_000_000);
        m.insert("kib", 1 << 10);
        m.insert("mib", 1 << 20);
        m.insert("gib", 1 << 30);
        m.insert("tib", 1 << 40);
        m
    };
}

/// The structural pieces of a task definition, borrowed from its AST.
pub(crate) struct TaskParts<'a> {
    pub name: &'a str,
    pub declarations: Vec<&'a AstNode>,
    pub runtime: Vec<(&'a str, &'a AstNode)>,
    pub outputs: Vec<&'a AstNode>,
    pub meta: Vec<(&'a str, &'a str)>,
}

pub(crate) fn task_parts(task: &AstNode) -> Result<TaskParts<'_>, LoweringError> {
    let AstNodeKind::Task { name, sections } = &task.kind else {
        return Err(LoweringError::internal(
            format!("Expected a task node, found {}", task.kind),
            "stagehand.ir.task.task_parts",
        ));
    };

    let mut parts = TaskParts {
        name: name.as_str(),
        declarations: Vec::new(),
        runtime: Vec::new(),
        outputs: Vec::new(),
        meta: Vec::new(),
    };
    for section in sections {
        match &section.kind {
            AstNodeKind::Declaration { .. } => parts.declarations.push(section),
            AstNodeKind::RuntimeSection { attributes } => {
                for (attr_name, expr) in attributes {
                    parts.runtime.push((attr_name.as_str(), expr));
                }
            }
            AstNodeKind::OutputSection { declarations } => {
                parts.outputs.extend(declarations.iter());
            }
            AstNodeKind::MetaSection { entries } => {
                for (key, value) in entries {
                    parts.meta.push((key.as_str(), value.as_str()));
                }
            }
            AstNodeKind::CommandSection { .. } => {}
            other => {
                return Err(LoweringError::internal(
                    format!("Unexpected task section: {}", other),
                    "stagehand.ir.task.task_parts",
                ));
            }
        }
    }
    Ok(parts)
}

/// A declared parameter is an applet input exactly when it is unassigned,
/// or assigned but of optional type. Anything else is a task-local
/// computed value.
pub(crate) fn task_inputs(declarations: &[&AstNode]) -> Vec<CVar> {
    let mut inputs = Vec::new();
    for decl in declarations {
        if let AstNodeKind::Declaration { ty, name, expr } = &decl.kind {
            let is_input = expr.is_none() || ty.is_optional();
            if !is_input {
                continue;
            }
            let mut cvar = CVar::new(name, ty.clone()).with_source(decl.location.clone());
            if let Some(default_expr) = expr {
                if let Ok(value) = eval::evaluate_const(default_expr) {
                    cvar = cvar.with_default(value);
                }
            }
            inputs.push(cvar);
        }
    }
    inputs
}

pub(crate) fn task_outputs(output_decls: &[&AstNode]) -> Vec<CVar> {
    let mut outputs = Vec::new();
    for decl in output_decls {
        if let AstNodeKind::Declaration { ty, name, .. } = &decl.kind {
            outputs.push(CVar::new(name, ty.clone()).with_source(decl.location.clone()));
        }
    }
    outputs
}

fn parse_memory_text(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    let digits_end = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let number: f64 = trimmed[..digits_end].parse().ok()?;
    let unit = trimmed[digits_end..].trim().to_ascii_lowercase();
    let bytes_per_unit = if unit.is_empty() {
        1
    } else {
        *MEMORY_UNITS.get(unit.as_str())?
    };
    let bytes = number * bytes_per_unit as f64;
    Some((bytes / (1u64 << 20) as f64).ceil() as u64)
}

fn parse_memory(value: &Value) -> Option<u64> {
    match value {
        Value::Int(bytes) => Some(((*bytes as f64) / (1u64 << 20) as f64).ceil() as u64),
        Value::Str(text) => parse_memory_text(text),
        _ => None,
    }
}

/// Disk requests look like `local-disk 100 HDD`; a bare integer is taken
/// as gigabytes.
fn parse_disks(value: &Value) -> Option<u64> {
    match value {
        Value::Int(gb) => u64::try_from(*gb).ok(),
        Value::Str(text) => text
            .split_whitespace()
            .find_map(|token| token.parse::<u64>().ok()),
        _ => None,
    }
}

fn parse_cpu(value: &Value) -> Option<u64> {
    match value {
        Value::Int(n) => u64::try_from(*n).ok(),
        Value::Float(n) => Some(n.ceil() as u64),
        Value::Str(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Fold the resource attributes. All present and constant -> `Const`; any
/// one depending on runtime information -> `Runtime`; none at all ->
/// `Default`.
pub(crate) fn resolve_instance_type(runtime: &[(&str, &AstNode)]) -> InstanceType {
    let mut spec = InstanceSpec::default();
    let mut any_present = false;

    for (attr, expr) in runtime {
        if !INSTANCE_ATTRIBUTES.contains(attr) {
            continue;
        }
        any_present = true;
        let value = match eval::evaluate_const(expr) {
            Ok(v) => v,
            Err(_) => return InstanceType::Runtime,
        };
        let recognized = match *attr {
            "memory" => {
                spec.memory_mb = parse_memory(&value);
                spec.memory_mb.is_some()
            }
            "disks" => {
                spec.disk_gb = parse_disks(&value);
                spec.disk_gb.is_some()
            }
            "cpu" => {
                spec.cpu = parse_cpu(&value);
                spec.cpu.is_some()
            }
            "instance_type" => {
                spec.instance = value.as_str().map(str::to_string);
                spec.instance.is_some()
            }
            _ => false,
        };
        if !recognized {
            return InstanceType::Runtime;
        }
    }

    if any_present {
        InstanceType::Const(spec)
    } else {
        InstanceType::Default
    }
}

/// Resolve the `docker` runtime attribute. A constant string under the
/// platform-asset scheme pins the image; any other present value means a
/// network pull at execution time.
pub(crate) fn resolve_docker(runtime: &[(&str, &AstNode)]) -> (DockerImage, Option<String>) {
    let Some((_, expr)) = runtime.iter().find(|(attr, _)| *attr == "docker") else {
        return (DockerImage::None, None);
    };
    match eval::evaluate_const(expr) {
        Ok(Value::Str(url)) => {
            if url.starts_with(ASSET_URL_PREFIX) {
                (DockerImage::PlatformAsset(url.clone()), Some(url))
            } else {
                (DockerImage::Network, None)
            }
        }
        _ => (DockerImage::Network, None),
    }
}

fn native_stub_id(meta: &[(&str, &str)]) -> Option<String> {
    let is_native = meta
        .iter()
        .any(|(key, value)| *key == "type" && *value == "native");
    if !is_native {
        return None;
    }
    meta.iter()
        .find(|(key, _)| *key == "id")
        .map(|(_, id)| id.to_string())
}

/// Rebuild the task with the docker attribute replaced by its resolved
/// asset reference, so generated code never looks the image up at run time.
fn rewrite_docker_attribute(task: &AstNode, resolved: &str) -> AstNode {
    let AstNodeKind::Task { name, sections } = &task.kind else {
        return task.clone();
    };
    let sections = sections
        .iter()
        .map(|section| match &section.kind {
            AstNodeKind::RuntimeSection { attributes } => {
                let attributes = attributes
                    .iter()
                    .map(|(attr, expr)| {
                        if attr == "docker" {
                            let literal = AstNode::new(
                                AstNodeKind::String {
                                    value: resolved.to_string(),
                                },
                                expr.location.clone(),
                                expr.span.clone(),
                            );
                            (attr.clone(), literal)
                        } else {
                            (attr.clone(), expr.clone())
                        }
                    })
                    .collect();
                AstNode::new(
                    AstNodeKind::RuntimeSection { attributes },
                    section.location.clone(),
                    section.span.clone(),
                )
            }
            _ => section.clone(),
        })
        .collect();
    AstNode::new(
        AstNodeKind::Task {
            name: name.clone(),
            sections,
        },
        task.location.clone(),
        task.span.clone(),
    )
}

/// Re-parse a generated sub-program through the front end; lowering fails
/// fast when its own output is not valid source.
pub(crate) fn validate_generated(name: &str, code: &str) -> Result<(), LoweringError> {
    ast::parse_document_text(&format!("{}.gen.wdl", name), code).map_err(|e| {
        LoweringError::new(
            LoweringErrorKind::GeneratedProgramInvalid,
            format!("Generated program for {} does not re-parse: {}", name, e.message()),
            "stagehand.ir.task.validate_generated",
        )
    })?;
    Ok(())
}

/// Convert one task definition into one applet.
pub fn lower_task(
    task: &AstNode,
    source_text: Option<&str>,
    session: &LoweringSession,
) -> Result<Applet, LoweringError> {
    let parts = task_parts(task)?;
    let inputs = task_inputs(&parts.declarations);
    let outputs = task_outputs(&parts.outputs);
    let instance_type = resolve_instance_type(&parts.runtime);
    let (docker, resolved_asset) = resolve_docker(&parts.runtime);

    let kind = match native_stub_id(&parts.meta) {
        Some(id) => AppletKind::NativeStub(id),
        None => AppletKind::Task,
    };

    let rewritten = match &resolved_asset {
        Some(url) => rewrite_docker_attribute(task, url),
        None => task.clone(),
    };
    let code = writer::task_text(&rewritten);
    validate_generated(parts.name, &code)?;

    debug!(
        "lowered task {} ({} inputs, {} outputs, {:?})",
        parts.name,
        inputs.len(),
        outputs.len(),
        instance_type
    );

    Ok(Applet {
        name: parts.name.to_string(),
        inputs,
        outputs,
        instance_type,
        docker,
        destination: session.options.destination.clone(),
        kind,
        code,
        source_text: source_text.map(str::to_string),
        ast: rewritten,
    })
}
