//! file: core/src/eval.rs
//! description: constant-expression evaluation.
//!
//! The lowering engine treats this module as an opaque service: it hands an
//! expression and a name-lookup function over, and either gets a constant
//! back or learns the expression is not foldable. A lookup that cannot
//! produce a value for a name makes the whole expression non-constant; it
//! never crashes the caller.
//!
use crate::ast::{AstNode, AstNodeKind, BinaryOperator, UnaryOperator, writer};
use crate::ir::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The expression depends on a name with no compile-time value.
    NotConstant(String),
    /// The expression shape is outside what the evaluator folds.
    Unsupported(String),
    /// Operands were constant but of incompatible types.
    TypeMismatch(String),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::NotConstant(what) => write!(f, "not a constant: {}", what),
            EvalError::Unsupported(what) => write!(f, "unsupported expression: {}", what),
            EvalError::TypeMismatch(what) => write!(f, "type mismatch: {}", what),
        }
    }
}

impl std::error::Error for EvalError {}

/// Evaluate `expr` to a constant, resolving names through `lookup`.
pub fn evaluate(
    expr: &AstNode,
    lookup: &dyn Fn(&str) -> Option<Value>,
) -> Result<Value, EvalError> {
    match &expr.kind {
        AstNodeKind::Integer { value } => Ok(Value::Int(*value)),
        AstNodeKind::Float { value } => Ok(Value::Float(*value)),
        AstNodeKind::Boolean { value } => Ok(Value::Bool(*value)),
        AstNodeKind::String { value } => Ok(Value::Str(value.clone())),
        AstNodeKind::ArrayLiteral { elements } => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(evaluate(element, lookup)?);
            }
            Ok(Value::Array(items))
        }
        AstNodeKind::Identifier { name } => {
            lookup(name).ok_or_else(|| EvalError::NotConstant(name.clone()))
        }
        AstNodeKind::MemberAccess { .. } => match expr.kind.dotted_name() {
            Some(dotted) => lookup(&dotted).ok_or(EvalError::NotConstant(dotted)),
            None => Err(EvalError::Unsupported(writer::expr_text(expr))),
        },
        AstNodeKind::Index { object, index } => {
            let collection = evaluate(object, lookup)?;
            let position = evaluate(index, lookup)?;
            match (collection, position) {
                (Value::Array(items), Value::Int(i)) => {
                    let i = usize::try_from(i)
                        .map_err(|_| EvalError::TypeMismatch("negative index".into()))?;
                    items
                        .get(i)
                        .cloned()
                        .ok_or_else(|| EvalError::TypeMismatch("index out of bounds".into()))
                }
                _ => Err(EvalError::TypeMismatch("indexing a non-array".into())),
            }
        }
        AstNodeKind::UnaryOp { op, expr: inner } => {
            let value = evaluate(inner, lookup)?;
            apply_unary(*op, value)
        }
        AstNodeKind::BinaryOp { left, op, right } => {
            let lhs = evaluate(left, lookup)?;
            let rhs = evaluate(right, lookup)?;
            apply_binary(*op, lhs, rhs)
        }
        AstNodeKind::Apply { function, .. } => {
            // Standard-library calls are runtime territory.
            Err(EvalError::Unsupported(format!("{}(...)", function)))
        }
        _ => Err(EvalError::Unsupported(writer::expr_text(expr))),
    }
}

/// Evaluate with no names in scope: any identifier reference makes the
/// expression non-constant.
pub fn evaluate_const(expr: &AstNode) -> Result<Value, EvalError> {
    evaluate(expr, &|_| None)
}

fn apply_unary(op: UnaryOperator, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOperator::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (UnaryOperator::Minus, Value::Int(v)) => Ok(Value::Int(-v)),
        (UnaryOperator::Minus, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOperator::Plus, v @ Value::Int(_)) | (UnaryOperator::Plus, v @ Value::Float(_)) => {
            Ok(v)
        }
        (op, v) => Err(EvalError::TypeMismatch(format!(
            "{} applied to {}",
            op.symbol(),
            v
        ))),
    }
}

fn apply_binary(op: BinaryOperator, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    use BinaryOperator::*;
    match op {
        And | Or => match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == And {
                a && b
            } else {
                a || b
            })),
            _ => Err(EvalError::TypeMismatch("logical operator on non-booleans".into())),
        },
        Eq | Ne => {
            let equal = lhs == rhs;
            Ok(Value::Bool(if op == Eq { equal } else { !equal }))
        }
        Lt | Le | Gt | Ge => {
            let ordering = match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
                (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
                (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
                (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => None,
            };
            let ordering = ordering
                .ok_or_else(|| EvalError::TypeMismatch("comparison on mixed types".into()))?;
            let result = match op {
                Lt => ordering.is_lt(),
                Le => ordering.is_le(),
                Gt => ordering.is_gt(),
                Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Bool(result))
        }
        Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(a as f64 + b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + b as f64)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (Value::Str(a), b) => Ok(Value::Str(format!("{}{}", a, raw_text(&b)))),
            (a, Value::Str(b)) => Ok(Value::Str(format!("{}{}", raw_text(&a), b))),
            _ => Err(EvalError::TypeMismatch("+ on incompatible types".into())),
        },
        Sub | Mul | Div | Mod => numeric_binary(op, lhs, rhs),
    }
}

fn numeric_binary(op: BinaryOperator, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    use BinaryOperator::*;
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => match op {
            Sub => Ok(Value::Int(a - b)),
            Mul => Ok(Value::Int(a * b)),
            Div => {
                if b == 0 {
                    Err(EvalError::TypeMismatch("division by zero".into()))
                } else {
                    Ok(Value::Int(a / b))
                }
            }
            Mod => {
                if b == 0 {
                    Err(EvalError::TypeMismatch("modulo by zero".into()))
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            _ => unreachable!(),
        },
        (a, b) => {
            let (a, b) = match (a, b) {
                (Value::Float(x), Value::Float(y)) => (x, y),
                (Value::Int(x), Value::Float(y)) => (x as f64, y),
                (Value::Float(x), Value::Int(y)) => (x, y as f64),
                _ => {
                    return Err(EvalError::TypeMismatch(format!(
                        "{} on non-numeric operands",
                        op.symbol()
                    )));
                }
            };
            match op {
                Sub => Ok(Value::Float(a - b)),
                Mul => Ok(Value::Float(a * b)),
                Div => Ok(Value::Float(a / b)),
                Mod => Ok(Value::Float(a % b)),
                _ => unreachable!(),
            }
        }
    }
}

/// String contents without literal quoting, for concatenation.
fn raw_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.to_literal(),
    }
}
