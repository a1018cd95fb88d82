//! file: core/src/ir/split.rs
//! description: partitions statement sequences into lowering units.
//!
use crate::ast::{AstNode, AstNodeKind};

/// One structural unit of a statement sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A maximal contiguous run of plain declarations.
    DeclRun(Vec<AstNode>),
    /// A scatter together with the declarations immediately preceding it.
    ScatterBlock { decls: Vec<AstNode>, scatter: AstNode },
    /// A conditional together with the declarations immediately preceding it.
    ConditionalBlock { decls: Vec<AstNode>, cond: AstNode },
    /// A call, or any statement not otherwise classified.
    OpaqueScope(AstNode),
}

/// Single linear pass, order-preserving, total over any input sequence.
/// Declarations accumulate into a pending run; a scatter or conditional
/// claims the pending run as its preceding declarations; anything else
/// flushes the run first.
pub fn split(statements: &[AstNode]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut pending: Vec<AstNode> = Vec::new();

    for statement in statements {
        match &statement.kind {
            AstNodeKind::Declaration { .. } => {
                pending.push(statement.clone());
            }
            AstNodeKind::Scatter { .. } => {
                blocks.push(Block::ScatterBlock {
                    decls: std::mem::take(&mut pending),
                    scatter: statement.clone(),
                });
            }
            AstNodeKind::Conditional { .. } => {
                blocks.push(Block::ConditionalBlock {
                    decls: std::mem::take(&mut pending),
                    cond: statement.clone(),
                });
            }
            _ => {
                if !pending.is_empty() {
                    blocks.push(Block::DeclRun(std::mem::take(&mut pending)));
                }
                blocks.push(Block::OpaqueScope(statement.clone()));
            }
        }
    }

    if !pending.is_empty() {
        blocks.push(Block::DeclRun(pending));
    }
    blocks
}
