pub mod block;
pub mod call;
pub mod env;
pub mod err;
pub mod model;
pub mod split;
pub mod task;
pub mod value;
pub mod workflow;

use std::collections::BTreeMap;

use crate::ast::{AstNode, AstNodeKind};

pub use err::{LoweringError, LoweringErrorKind};
pub use model::Namespace;

/// Options for one lowering session.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Destination folder applets compile into.
    pub destination: String,
    /// Append the output-reorganization applet and stage.
    pub reorg: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            destination: "/".to_string(),
            reorg: false,
        }
    }
}

/// One lowering session. Owns the stage-id counter, so ids are unique and
/// strictly increasing within the session and independent across sessions.
#[derive(Debug)]
pub struct LoweringSession {
    next_stage_id: u32,
    pub options: CompileOptions,
}

impl LoweringSession {
    pub fn new(options: CompileOptions) -> Self {
        LoweringSession {
            next_stage_id: 0,
            options,
        }
    }

    pub fn next_stage_id(&mut self) -> u32 {
        let id = self.next_stage_id;
        self.next_stage_id += 1;
        id
    }
}

/// Lower a parsed document into one IR namespace: every task becomes an
/// applet, then the workflow (if present) becomes stages over them.
///
/// `raw_text` is the original document text, used only to attach verbatim
/// task sources to applets for provenance.
pub fn lower_namespace(
    document: &AstNode,
    raw_text: Option<&str>,
    options: CompileOptions,
) -> Result<Namespace, LoweringError> {
    let AstNodeKind::Document { items, .. } = &document.kind else {
        return Err(LoweringError::internal(
            format!("Expected a document node, found {}", document.kind),
            "stagehand.ir.lower_namespace",
        ));
    };

    let mut session = LoweringSession::new(options);
    let task_sources = raw_text.map(crate::scan::extract_task_sources);

    let mut applets = BTreeMap::new();
    let mut workflow_node: Option<&AstNode> = None;
    for item in items {
        match &item.kind {
            AstNodeKind::Task { name, .. } => {
                let source_text = task_sources
                    .as_ref()
                    .and_then(|sources| sources.get(name))
                    .map(String::as_str);
                let applet = task::lower_task(item, source_text, &session)?;
                applets.insert(applet.name.clone(), applet);
            }
            AstNodeKind::Workflow { .. } => {
                workflow_node = Some(item);
            }
            _ => {}
        }
    }

    match workflow_node {
        Some(node) => workflow::lower_workflow(node, applets, &mut session),
        None => Ok(Namespace {
            applets,
            workflow: None,
        }),
    }
}
