//! file: core/src/ast/writer.rs
//! description: renders AST nodes back into parseable source text.
//!
//! Lowering materializes each applet as a self-contained document and feeds
//! the rendered text back through the parser to validate it. The expression
//! renderer doubles as the canonical string form used in diagnostics.
//!
use super::kind::AstNodeKind;
use super::node::AstNode;

/// Canonical string form of an expression node. Binary and unary
/// applications are parenthesized so the rendered text re-parses with the
/// same shape.
pub fn expr_text(node: &AstNode) -> String {
    match &node.kind {
        AstNodeKind::Identifier { name } => name.clone(),
        AstNodeKind::Integer { value } => value.to_string(),
        AstNodeKind::Float { value } => {
            let s = value.to_string();
            if s.contains('.') || s.contains('e') || s.contains('E') {
                s
            } else {
                format!("{}.0", s)
            }
        }
        AstNodeKind::Boolean { value } => value.to_string(),
        AstNodeKind::String { value } => format!("\"{}\"", escape_string(value)),
        AstNodeKind::MemberAccess { object, property } => {
            format!("{}.{}", expr_text(object), property)
        }
        AstNodeKind::Index { object, index } => {
            format!("{}[{}]", expr_text(object), expr_text(index))
        }
        AstNodeKind::Apply { function, args } => {
            let rendered: Vec<String> = args.iter().map(expr_text).collect();
            format!("{}({})", function, rendered.join(", "))
        }
        AstNodeKind::ArrayLiteral { elements } => {
            let rendered: Vec<String> = elements.iter().map(expr_text).collect();
            format!("[{}]", rendered.join(", "))
        }
        AstNodeKind::UnaryOp { op, expr } => format!("{}{}", op.symbol(), expr_text(expr)),
        AstNodeKind::BinaryOp { left, op, right } => {
            format!("({} {} {})", expr_text(left), op.symbol(), expr_text(right))
        }
        other => format!("<{}>", other),
    }
}

pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push(' ');
    }
}

pub fn declaration_text(node: &AstNode) -> String {
    match &node.kind {
        AstNodeKind::Declaration { ty, name, expr } => match expr {
            Some(e) => format!("{} {} = {}", ty, name, expr_text(e)),
            None => format!("{} {}", ty, name),
        },
        other => format!("<{}>", other),
    }
}

fn write_statement(out: &mut String, node: &AstNode, indent: usize) {
    match &node.kind {
        AstNodeKind::Declaration { .. } => {
            push_indent(out, indent);
            out.push_str(&declaration_text(node));
            out.push('\n');
        }
        AstNodeKind::Call { task, alias, inputs } => {
            push_indent(out, indent);
            out.push_str("call ");
            out.push_str(task);
            if let Some(a) = alias {
                out.push_str(" as ");
                out.push_str(a);
            }
            if !inputs.is_empty() {
                let rendered: Vec<String> = inputs
                    .iter()
                    .map(|(name, e)| format!("{} = {}", name, expr_text(e)))
                    .collect();
                out.push_str(" { input: ");
                out.push_str(&rendered.join(", "));
                out.push_str(" }");
            }
            out.push('\n');
        }
        AstNodeKind::Scatter {
            variable,
            collection,
            body,
        } => {
            push_indent(out, indent);
            out.push_str(&format!("scatter ({} in {}) {{\n", variable, expr_text(collection)));
            for item in body {
                write_statement(out, item, indent + 2);
            }
            push_indent(out, indent);
            out.push_str("}\n");
        }
        AstNodeKind::Conditional { condition, body } => {
            push_indent(out, indent);
            out.push_str(&format!("if ({}) {{\n", expr_text(condition)));
            for item in body {
                write_statement(out, item, indent + 2);
            }
            push_indent(out, indent);
            out.push_str("}\n");
        }
        AstNodeKind::OutputSection { declarations } => {
            push_indent(out, indent);
            out.push_str("output {\n");
            for decl in declarations {
                push_indent(out, indent + 2);
                out.push_str(&declaration_text(decl));
                out.push('\n');
            }
            push_indent(out, indent);
            out.push_str("}\n");
        }
        AstNodeKind::CommandSection { text } => {
            push_indent(out, indent);
            out.push_str("command <<<");
            out.push_str(text);
            out.push_str(">>>\n");
        }
        AstNodeKind::RuntimeSection { attributes } => {
            push_indent(out, indent);
            out.push_str("runtime {\n");
            for (name, e) in attributes {
                push_indent(out, indent + 2);
                out.push_str(&format!("{}: {}\n", name, expr_text(e)));
            }
            push_indent(out, indent);
            out.push_str("}\n");
        }
        AstNodeKind::MetaSection { entries } => {
            push_indent(out, indent);
            out.push_str("meta {\n");
            for (name, value) in entries {
                push_indent(out, indent + 2);
                out.push_str(&format!("{}: \"{}\"\n", name, escape_string(value)));
            }
            push_indent(out, indent);
            out.push_str("}\n");
        }
        other => {
            push_indent(out, indent);
            out.push_str(&format!("<{}>\n", other));
        }
    }
}

pub fn task_text(node: &AstNode) -> String {
    let mut out = String::new();
    if let AstNodeKind::Task { name, sections } = &node.kind {
        out.push_str(&format!("task {} {{\n", name));
        for section in sections {
            write_statement(&mut out, section, 2);
        }
        out.push_str("}\n");
    }
    out
}

pub fn workflow_text(node: &AstNode) -> String {
    let mut out = String::new();
    if let AstNodeKind::Workflow { name, body } = &node.kind {
        out.push_str(&format!("workflow {} {{\n", name));
        for item in body {
            write_statement(&mut out, item, 2);
        }
        out.push_str("}\n");
    }
    out
}

pub fn document_text(node: &AstNode) -> String {
    let mut out = String::new();
    if let AstNodeKind::Document { version, items } = &node.kind {
        if let Some(v) = version {
            out.push_str(&format!("version {}\n\n", v));
        }
        for item in items {
            match &item.kind {
                AstNodeKind::Task { .. } => out.push_str(&task_text(item)),
                AstNodeKind::Workflow { .. } => out.push_str(&workflow_text(item)),
                other => out.push_str(&format!("<{}>\n", other)),
            }
            out.push('\n');
        }
    }
    out
}
