//! file: core/src/analyzers/validate.rs
//! description: structural validation ahead of lowering.
//!
//! The lowering engine assumes a handful of properties the grammar alone
//! cannot promise: unique task names, one workflow per document, call
//! targets that exist, unique stage names, and controlling expressions that
//! are plain variable references. This pass checks all of them up front so
//! lowering can treat violations as defects rather than user errors.
//!
use std::collections::HashSet;

use crate::ast::{AstNode, AstNodeKind};
use crate::error::{Level, StagehandErrorExt};

use super::err::ValidationError;

pub struct Validator {
    diagnostics: Vec<Box<dyn StagehandErrorExt>>,
}

impl Validator {
    pub fn new() -> Self {
        Validator {
            diagnostics: Vec::new(),
        }
    }

    pub fn analyze(&mut self, document: &AstNode) {
        let AstNodeKind::Document { items, .. } = &document.kind else {
            self.report("Top-level node is not a document.", document);
            return;
        };

        let mut task_names: HashSet<&str> = HashSet::new();
        let mut workflow_seen = false;
        for item in items {
            match &item.kind {
                AstNodeKind::Task { name, .. } => {
                    if !task_names.insert(name.as_str()) {
                        self.report(&format!("Duplicate task name: {}", name), item);
                    }
                }
                AstNodeKind::Workflow { .. } => {
                    if workflow_seen {
                        self.report("A document may define at most one workflow.", item);
                    }
                    workflow_seen = true;
                }
                _ => {
                    self.report("Unexpected top-level document item.", item);
                }
            }
        }

        for item in items {
            if let AstNodeKind::Workflow { body, .. } = &item.kind {
                let mut stage_names: HashSet<String> = HashSet::new();
                self.analyze_statements(body, &task_names, &mut stage_names);
            }
        }
    }

    fn analyze_statements(
        &mut self,
        statements: &[AstNode],
        task_names: &HashSet<&str>,
        stage_names: &mut HashSet<String>,
    ) {
        for statement in statements {
            match &statement.kind {
                AstNodeKind::Call { task, alias, .. } => {
                    let target = task.rsplit('.').next().unwrap_or(task);
                    if !task_names.contains(target) {
                        self.report(&format!("Call references unknown task: {}", task), statement);
                    }
                    let stage = alias.clone().unwrap_or_else(|| target.to_string());
                    if !stage_names.insert(stage.clone()) {
                        self.report(&format!("Duplicate stage name: {}", stage), statement);
                    }
                }
                AstNodeKind::Scatter {
                    collection, body, ..
                } => {
                    if collection.kind.dotted_name().is_none() {
                        self.report(
                            "A scatter collection must be a variable reference, not a computed expression.",
                            statement,
                        );
                    }
                    self.analyze_statements(body, task_names, stage_names);
                }
                AstNodeKind::Conditional { condition, body } => {
                    if condition.kind.dotted_name().is_none() {
                        self.report(
                            "A conditional predicate must be a variable reference, not a computed expression.",
                            statement,
                        );
                    }
                    self.analyze_statements(body, task_names, stage_names);
                }
                _ => {}
            }
        }
    }

    fn report(&mut self, message: &str, node: &AstNode) {
        self.diagnostics.push(Box::new(ValidationError::with(
            Level::Error,
            message.to_string(),
            "stagehand.analyzers.validate".to_string(),
            node.location.clone(),
            node.span.clone(),
        )));
    }

    pub fn take_diagnostics(&mut self) -> Vec<Box<dyn StagehandErrorExt>> {
        std::mem::take(&mut self.diagnostics)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a parsed document. Returns all diagnostics at once rather than
/// stopping at the first, so a user can fix a batch of problems per run.
pub fn analyze_document_rules(
    document: &AstNode,
) -> Result<(), Vec<Box<dyn StagehandErrorExt>>> {
    let mut validator = Validator::new();
    validator.analyze(document);
    let diagnostics = validator.take_diagnostics();
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}
