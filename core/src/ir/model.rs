//! file: core/src/ir/model.rs
//! description: the platform-neutral intermediate representation.
//!
//! Value types produced by lowering and consumed by back-end code
//! generation. Everything here is write-once: created during one lowering
//! session and never mutated afterward. Stages reference prior stages only
//! by name, so the whole namespace serializes as a plain nested structure
//! with no cycles.
//!
use std::collections::BTreeMap;

use serde::Serialize;

use crate::ast::{AstNode, WdlType};
use crate::location::Location;

use super::value::Value;

/// Declaration attributes carried on a compiled variable.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DeclAttrs {
    pub help: Option<String>,
    pub default: Option<Value>,
}

/// A named, typed variable slot on an applet or stage boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CVar {
    pub name: String,
    pub ty: WdlType,
    pub attrs: DeclAttrs,
    /// Provenance pointer back to the originating source node. Diagnostics
    /// only; never consulted by lowering decisions.
    pub source: Option<Location>,
}

impl CVar {
    pub fn new(name: &str, ty: WdlType) -> Self {
        CVar {
            name: name.to_string(),
            ty,
            attrs: DeclAttrs::default(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: Option<Location>) -> Self {
        self.source = source;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.attrs.default = Some(default);
        self
    }

    /// The identifier this variable gets inside generated sub-programs,
    /// where dotted names are not legal declaration names.
    pub fn flat_name(&self) -> String {
        self.name.replace('.', "_")
    }
}

/// Where a stage input's value comes from. Exactly one variant is active
/// per instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SArg {
    Const(Value),
    WorkflowInput(CVar),
    Link { stage: String, cvar: CVar },
    /// An intentionally unbound optional input.
    Empty,
}

/// A compiled variable together with the argument currently satisfying it.
/// The unit of value stored in every lexical environment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedVar {
    pub cvar: CVar,
    pub sarg: SArg,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct InstanceSpec {
    pub memory_mb: Option<u64>,
    pub disk_gb: Option<u64>,
    pub cpu: Option<u64>,
    pub instance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InstanceType {
    /// No resource requirements were stated.
    Default,
    /// All stated requirements folded to compile-time constants.
    Const(InstanceSpec),
    /// At least one requirement is only known during execution; generated
    /// code must resolve it at run time.
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DockerImage {
    None,
    /// Pulled over the network at execution time.
    Network,
    /// Pinned to a platform asset; no runtime lookup needed.
    PlatformAsset(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AppletKind {
    Task,
    /// Signature only; the back end binds it to a pre-existing executable
    /// by this id.
    NativeStub(String),
    Eval,
    Scatter(Vec<String>),
    /// A scatter whose outputs cannot map directly onto platform-native
    /// slots and need a follow-up aggregation step.
    ScatterCollect(Vec<String>),
    If(Vec<String>),
    OutputReorg,
}

impl AppletKind {
    pub fn label(&self) -> &'static str {
        match self {
            AppletKind::Task => "task",
            AppletKind::NativeStub(_) => "native",
            AppletKind::Eval => "eval",
            AppletKind::Scatter(_) => "scatter",
            AppletKind::ScatterCollect(_) => "scatter+collect",
            AppletKind::If(_) => "if",
            AppletKind::OutputReorg => "reorg",
        }
    }
}

impl std::fmt::Display for AppletKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One independently compilable unit of work.
///
/// Invariant: every free variable referenced by `ast` is one of `inputs`
/// (closure completeness). Lowering fails rather than emitting an applet
/// that violates this.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Applet {
    pub name: String,
    pub inputs: Vec<CVar>,
    pub outputs: Vec<CVar>,
    pub instance_type: InstanceType,
    pub docker: DockerImage,
    /// Destination folder on the platform this applet compiles into.
    pub destination: String,
    pub kind: AppletKind,
    /// The self-contained sub-program, rendered as source text. Validated
    /// by round-tripping through the parser before the applet is emitted.
    pub code: String,
    /// Verbatim source of the originating task, when the raw document text
    /// was available. Diagnostics only.
    pub source_text: Option<String>,
    #[serde(skip)]
    pub ast: AstNode,
}

/// One instantiation of an applet inside a workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    pub name: String,
    pub id: u32,
    pub applet: String,
    /// Actual arguments, positionally matched to the callee's input CVars.
    pub inputs: Vec<SArg>,
    /// The output variables this stage exposes to later stages.
    pub outputs: Vec<CVar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workflow {
    pub name: String,
    pub inputs: Vec<(CVar, SArg)>,
    pub outputs: Vec<(CVar, SArg)>,
    /// Execution and data-flow order is the sequence order; a binding is
    /// never consumed before the stage that produces it.
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Namespace {
    pub applets: BTreeMap<String, Applet>,
    pub workflow: Option<Workflow>,
}

impl Namespace {
    pub fn applet(&self, name: &str) -> Option<&Applet> {
        self.applets.get(name)
    }

    /// The plain nested record/array structure handed to the back end.
    /// Stages reference prior stages only by name, so this never cycles.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
