//! file: core/src/ast/stmt.rs
//! description: parsing helpers for documents, tasks, workflows and statements.
//!
//! This module contains functions that parse the structural rules from the
//! `pest`-generated `RulesParser` into `AstNode` structures. Parsing helpers
//! attach `Location`/`Span` metadata using the `rules` helpers to aid
//! diagnostics.
//!
use crate::{
    ast::{AstNode, AstNodeKind, Rule, StagehandErrorExt, WdlType, expr, rules},
    source,
};

use super::expr::syntax_err;

/// Parse a complete `document` rule into an `AstNode::Document`.
pub(crate) fn parse_document_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);

    let mut version = None;
    let mut items = Vec::new();
    for item_pair in inner_pairs {
        match item_pair.as_rule() {
            Rule::version_decl => {
                let mut version_inner = item_pair.into_inner();
                if let Some(id_pair) = version_inner.next() {
                    version = Some(id_pair.as_str().to_string());
                }
            }
            Rule::document_item => {
                items.push(parse_document_item_rule(item_pair, source)?);
            }
            Rule::EOI => {}
            other => {
                return Err(syntax_err(
                    format!("Unexpected rule in document parsing: {:?}", other),
                    "stagehand.ast.stmt.parse_document_rule",
                    &location,
                    &span,
                ));
            }
        }
    }

    Ok(AstNode::new(
        AstNodeKind::Document { version, items },
        location,
        span,
    ))
}

fn parse_document_item_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let next = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    match next.as_rule() {
        Rule::task_def => parse_task_rule(next, source),
        Rule::workflow_def => parse_workflow_rule(next, source),
        other => Err(syntax_err(
            format!("Unexpected document item: {:?}", other),
            "stagehand.ast.stmt.parse_document_item_rule",
            &location,
            &span,
        )),
    }
}

fn parse_task_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let name_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let name = name_pair.as_str().to_string();

    let mut sections = Vec::new();
    for item_pair in inner_pairs {
        sections.push(parse_task_item_rule(item_pair, source)?);
    }

    Ok(AstNode::new(
        AstNodeKind::Task { name, sections },
        location,
        span,
    ))
}

fn parse_task_item_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let next = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    match next.as_rule() {
        Rule::command_section => parse_command_rule(next, source),
        Rule::runtime_section => parse_runtime_rule(next, source),
        Rule::output_section => parse_output_rule(next, source),
        Rule::meta_section => parse_meta_rule(next, source),
        Rule::declaration => parse_declaration_rule(next, source),
        other => Err(syntax_err(
            format!("Unexpected task member: {:?}", other),
            "stagehand.ast.stmt.parse_task_item_rule",
            &location,
            &span,
        )),
    }
}

fn parse_command_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let form_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let mut form_inner = form_pair.into_inner();
    let text = match form_inner.next() {
        Some(body_pair) => body_pair.as_str().to_string(),
        None => String::new(),
    };
    Ok(AstNode::new(
        AstNodeKind::CommandSection { text },
        location,
        span,
    ))
}

fn parse_runtime_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let mut attributes = Vec::new();
    for attr_pair in inner_pairs {
        let (mut attr_inner, a_location, a_span) = rules::get_data_from_rule(&attr_pair, source);
        let name_pair = rules::fetch_next_pair(&mut attr_inner, &a_location, &a_span)?;
        let expr_pair = rules::fetch_next_pair(&mut attr_inner, &a_location, &a_span)?;
        let expr_node = expr::parse_expression_rule(expr_pair, source)?;
        attributes.push((name_pair.as_str().to_string(), expr_node));
    }
    Ok(AstNode::new(
        AstNodeKind::RuntimeSection { attributes },
        location,
        span,
    ))
}

fn parse_output_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let mut declarations = Vec::new();
    for decl_pair in inner_pairs {
        declarations.push(parse_declaration_rule(decl_pair, source)?);
    }
    Ok(AstNode::new(
        AstNodeKind::OutputSection { declarations },
        location,
        span,
    ))
}

fn parse_meta_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let mut entries = Vec::new();
    for attr_pair in inner_pairs {
        let (mut attr_inner, a_location, a_span) = rules::get_data_from_rule(&attr_pair, source);
        let name_pair = rules::fetch_next_pair(&mut attr_inner, &a_location, &a_span)?;
        let value_pair = rules::fetch_next_pair(&mut attr_inner, &a_location, &a_span)?;
        let value = expr::parse_string_rule(value_pair)?;
        entries.push((name_pair.as_str().to_string(), value));
    }
    Ok(AstNode::new(
        AstNodeKind::MetaSection { entries },
        location,
        span,
    ))
}

fn parse_workflow_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let name_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let name = name_pair.as_str().to_string();

    let mut body = Vec::new();
    for item_pair in inner_pairs {
        body.push(parse_workflow_item_rule(item_pair, source)?);
    }

    Ok(AstNode::new(
        AstNodeKind::Workflow { name, body },
        location,
        span,
    ))
}

pub(crate) fn parse_workflow_item_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let next = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    match next.as_rule() {
        Rule::call_stmt => parse_call_rule(next, source),
        Rule::scatter_stmt => parse_scatter_rule(next, source),
        Rule::conditional_stmt => parse_conditional_rule(next, source),
        Rule::output_section => parse_output_rule(next, source),
        Rule::declaration => parse_declaration_rule(next, source),
        other => Err(syntax_err(
            format!("Unexpected workflow member: {:?}", other),
            "stagehand.ast.stmt.parse_workflow_item_rule",
            &location,
            &span,
        )),
    }
}

fn parse_call_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let target_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let task = target_pair.as_str().to_string();

    let mut alias = None;
    let mut inputs = Vec::new();
    for rest_pair in inner_pairs {
        match rest_pair.as_rule() {
            Rule::call_alias => {
                let mut alias_inner = rest_pair.into_inner();
                if let Some(alias_pair) = alias_inner.next() {
                    alias = Some(alias_pair.as_str().to_string());
                }
            }
            Rule::call_body => {
                for inputs_pair in rest_pair.into_inner() {
                    for input_pair in inputs_pair.into_inner() {
                        let (mut input_inner, i_location, i_span) =
                            rules::get_data_from_rule(&input_pair, source);
                        let name_pair =
                            rules::fetch_next_pair(&mut input_inner, &i_location, &i_span)?;
                        let expr_pair =
                            rules::fetch_next_pair(&mut input_inner, &i_location, &i_span)?;
                        let expr_node = expr::parse_expression_rule(expr_pair, source)?;
                        inputs.push((name_pair.as_str().to_string(), expr_node));
                    }
                }
            }
            other => {
                return Err(syntax_err(
                    format!("Unexpected call member: {:?}", other),
                    "stagehand.ast.stmt.parse_call_rule",
                    &location,
                    &span,
                ));
            }
        }
    }

    Ok(AstNode::new(
        AstNodeKind::Call { task, alias, inputs },
        location,
        span,
    ))
}

fn parse_scatter_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let variable_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let collection_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let collection = expr::parse_expression_rule(collection_pair, source)?;

    let mut body = Vec::new();
    for item_pair in inner_pairs {
        body.push(parse_workflow_item_rule(item_pair, source)?);
    }

    Ok(AstNode::new(
        AstNodeKind::Scatter {
            variable: variable_pair.as_str().to_string(),
            collection: Box::new(collection),
            body,
        },
        location,
        span,
    ))
}

fn parse_conditional_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let condition_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let condition = expr::parse_expression_rule(condition_pair, source)?;

    let mut body = Vec::new();
    for item_pair in inner_pairs {
        body.push(parse_workflow_item_rule(item_pair, source)?);
    }

    Ok(AstNode::new(
        AstNodeKind::Conditional {
            condition: Box::new(condition),
            body,
        },
        location,
        span,
    ))
}

pub(crate) fn parse_declaration_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let type_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let ty = parse_type_rule(type_pair, source)?;
    let name_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let name = name_pair.as_str().to_string();

    let expr = match inner_pairs.next() {
        Some(expr_pair) => Some(Box::new(expr::parse_expression_rule(expr_pair, source)?)),
        None => None,
    };

    Ok(AstNode::new(
        AstNodeKind::Declaration { ty, name, expr },
        location,
        span,
    ))
}

pub(crate) fn parse_type_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<WdlType, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let base_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let mut ty = parse_non_optional_type_rule(base_pair, source)?;
    if inner_pairs.next().is_some() {
        ty = WdlType::Optional(Box::new(ty));
    }
    Ok(ty)
}

fn parse_non_optional_type_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<WdlType, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let next = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    match next.as_rule() {
        Rule::primitive_type => match next.as_str() {
            "Boolean" => Ok(WdlType::Boolean),
            "Int" => Ok(WdlType::Int),
            "Float" => Ok(WdlType::Float),
            "String" => Ok(WdlType::Str),
            "File" => Ok(WdlType::File),
            other => Err(syntax_err(
                format!("Unknown primitive type: {}", other),
                "stagehand.ast.stmt.parse_non_optional_type_rule",
                &location,
                &span,
            )),
        },
        Rule::array_type => {
            let mut array_inner = next.into_inner();
            let item_pair = rules::fetch_next_pair(&mut array_inner, &location, &span)?;
            let item = parse_type_rule(item_pair, source)?;
            Ok(WdlType::Array(Box::new(item)))
        }
        Rule::map_type => {
            let mut map_inner = next.into_inner();
            let key_pair = rules::fetch_next_pair(&mut map_inner, &location, &span)?;
            let key = parse_type_rule(key_pair, source)?;
            let value_pair = rules::fetch_next_pair(&mut map_inner, &location, &span)?;
            let value = parse_type_rule(value_pair, source)?;
            Ok(WdlType::Map(Box::new(key), Box::new(value)))
        }
        Rule::pair_type => {
            let mut pair_inner = next.into_inner();
            let left_pair = rules::fetch_next_pair(&mut pair_inner, &location, &span)?;
            let left = parse_type_rule(left_pair, source)?;
            let right_pair = rules::fetch_next_pair(&mut pair_inner, &location, &span)?;
            let right = parse_type_rule(right_pair, source)?;
            Ok(WdlType::Pair(Box::new(left), Box::new(right)))
        }
        other => Err(syntax_err(
            format!("Unexpected type rule: {:?}", other),
            "stagehand.ast.stmt.parse_non_optional_type_rule",
            &location,
            &span,
        )),
    }
}
