//! file: core/src/ast/kind.rs
//! description: AST node kind definitions and operator enums.
//!
//! Defines `AstNodeKind` along with `BinaryOperator` and `UnaryOperator`.
//! These enums are used throughout parsing, validation and lowering stages.
//!
use super::node::AstNode;
use super::types::WdlType;

/// Represents binary operators in the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,  // ==
    Ne,  // !=
    Lt,  // <
    Le,  // <=
    Gt,  // >
    Ge,  // >=
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Mod, // %
    And, // &&
    Or,  // ||
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

/// Represents unary operators in the AST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,  // +
    Minus, // -
    Not,   // !
}

impl UnaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstNodeKind {
    Document { version: Option<String>, items: Vec<AstNode> },

    Task { name: String, sections: Vec<AstNode> },
    Workflow { name: String, body: Vec<AstNode> },

    CommandSection { text: String },
    RuntimeSection { attributes: Vec<(String, AstNode)> },
    OutputSection { declarations: Vec<AstNode> },
    MetaSection { entries: Vec<(String, String)> },

    Declaration { ty: WdlType, name: String, expr: Option<Box<AstNode>> },
    Call { task: String, alias: Option<String>, inputs: Vec<(String, AstNode)> },
    Scatter { variable: String, collection: Box<AstNode>, body: Vec<AstNode> },
    Conditional { condition: Box<AstNode>, body: Vec<AstNode> },

    UnaryOp { op: UnaryOperator, expr: Box<AstNode> },
    BinaryOp { left: Box<AstNode>, op: BinaryOperator, right: Box<AstNode> },
    MemberAccess { object: Box<AstNode>, property: String },
    Index { object: Box<AstNode>, index: Box<AstNode> },
    Apply { function: String, args: Vec<AstNode> },
    ArrayLiteral { elements: Vec<AstNode> },

    Identifier { name: String },
    String { value: String },
    Integer { value: i64 },
    Float { value: f64 },
    Boolean { value: bool },
}

impl AstNodeKind {
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            AstNodeKind::UnaryOp { .. }
                | AstNodeKind::BinaryOp { .. }
                | AstNodeKind::MemberAccess { .. }
                | AstNodeKind::Index { .. }
                | AstNodeKind::Apply { .. }
                | AstNodeKind::ArrayLiteral { .. }
                | AstNodeKind::Identifier { .. }
                | AstNodeKind::String { .. }
                | AstNodeKind::Integer { .. }
                | AstNodeKind::Float { .. }
                | AstNodeKind::Boolean { .. }
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            AstNodeKind::String { .. }
                | AstNodeKind::Integer { .. }
                | AstNodeKind::Float { .. }
                | AstNodeKind::Boolean { .. }
        )
    }

    /// If this node is a member-access chain rooted at an identifier
    /// (`A`, `A.B`, `A.B.C` ...), return its dotted form.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            AstNodeKind::Identifier { name } => Some(name.clone()),
            AstNodeKind::MemberAccess { object, property } => {
                let prefix = object.kind.dotted_name()?;
                Some(format!("{}.{}", prefix, property))
            }
            _ => None,
        }
    }
}

use std::fmt;

impl fmt::Display for AstNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstNodeKind::Document { .. } => write!(f, "Document"),
            AstNodeKind::Task { .. } => write!(f, "Task"),
            AstNodeKind::Workflow { .. } => write!(f, "Workflow"),
            AstNodeKind::CommandSection { .. } => write!(f, "CommandSection"),
            AstNodeKind::RuntimeSection { .. } => write!(f, "RuntimeSection"),
            AstNodeKind::OutputSection { .. } => write!(f, "OutputSection"),
            AstNodeKind::MetaSection { .. } => write!(f, "MetaSection"),
            AstNodeKind::Declaration { .. } => write!(f, "Declaration"),
            AstNodeKind::Call { .. } => write!(f, "Call"),
            AstNodeKind::Scatter { .. } => write!(f, "Scatter"),
            AstNodeKind::Conditional { .. } => write!(f, "Conditional"),
            AstNodeKind::UnaryOp { .. } => write!(f, "UnaryOp"),
            AstNodeKind::BinaryOp { .. } => write!(f, "BinaryOp"),
            AstNodeKind::MemberAccess { .. } => write!(f, "MemberAccess"),
            AstNodeKind::Index { .. } => write!(f, "Index"),
            AstNodeKind::Apply { .. } => write!(f, "Apply"),
            AstNodeKind::ArrayLiteral { .. } => write!(f, "ArrayLiteral"),
            AstNodeKind::Identifier { .. } => write!(f, "Identifier"),
            AstNodeKind::String { .. } => write!(f, "String"),
            AstNodeKind::Integer { .. } => write!(f, "Integer"),
            AstNodeKind::Float { .. } => write!(f, "Float"),
            AstNodeKind::Boolean { .. } => write!(f, "Boolean"),
        }
    }
}
