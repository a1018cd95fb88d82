//! file: core/src/ast/expr.rs
//! description: parsing helpers for expression rules.
//!
//! Cascaded precedence parsers from `or_expr` down to `primary`, mirroring
//! the grammar. Each function consumes one `pest` pair and produces an
//! `AstNode` carrying `Location`/`Span` metadata for diagnostics.
//!
use crate::{
    ast::{AstNode, AstNodeKind, BinaryOperator, Rule, StagehandErrorExt, UnaryOperator, rules},
    location::{Location, Span},
    source,
};

pub(crate) fn syntax_err(
    message: String,
    issuer: &str,
    location: &Option<Location>,
    span: &Option<Span>,
) -> Box<dyn StagehandErrorExt> {
    Box::<dyn StagehandErrorExt>::from(Box::new(crate::ast::err::SyntaxError::with(
        crate::Level::Error,
        message,
        issuer.to_string(),
        location.clone(),
        span.clone(),
    )))
}

pub(crate) fn parse_expression_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let next = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    match next.as_rule() {
        Rule::expression => parse_expression_rule(next, source),
        Rule::or_expr => parse_or_expression_rule(next, source),
        other => Err(syntax_err(
            format!("Unexpected expression type: {:?}", other),
            "stagehand.ast.expr.parse_expression_rule",
            &location,
            &span,
        )),
    }
}

fn parse_binary_tail(
    mut node: AstNode,
    inner_pairs: &mut pest::iterators::Pairs<Rule>,
    source: &source::Source,
    operand: fn(
        pest::iterators::Pair<Rule>,
        &source::Source,
    ) -> Result<AstNode, Box<dyn StagehandErrorExt>>,
    location: &Option<Location>,
    span: &Option<Span>,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    // Handle zero-or-more (op, right) repetitions
    while let Some(op_pair) = inner_pairs.next() {
        let op = match op_pair.as_str() {
            "||" => BinaryOperator::Or,
            "&&" => BinaryOperator::And,
            "==" => BinaryOperator::Eq,
            "!=" => BinaryOperator::Ne,
            "<" => BinaryOperator::Lt,
            "<=" => BinaryOperator::Le,
            ">" => BinaryOperator::Gt,
            ">=" => BinaryOperator::Ge,
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Sub,
            "*" => BinaryOperator::Mul,
            "/" => BinaryOperator::Div,
            "%" => BinaryOperator::Mod,
            other => {
                return Err(syntax_err(
                    format!("Invalid binary operator: {}", other),
                    "stagehand.ast.expr.parse_binary_tail",
                    location,
                    span,
                ));
            }
        };
        let right_pair = match inner_pairs.next() {
            Some(rp) => rp,
            None => {
                return Err(syntax_err(
                    "Missing right-hand operand for binary operator.".into(),
                    "stagehand.ast.expr.parse_binary_tail",
                    location,
                    span,
                ));
            }
        };
        let right_node = operand(right_pair, source)?;

        node = AstNode::new(
            AstNodeKind::BinaryOp {
                left: Box::new(node),
                op,
                right: Box::new(right_node),
            },
            rules::get_location_from_pair(&op_pair, source),
            rules::get_span_from_pair(&op_pair, source),
        );
    }
    Ok(node)
}

fn parse_or_expression_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let left_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let node = parse_and_expression_rule(left_pair, source)?;
    parse_binary_tail(node, &mut inner_pairs, source, parse_and_expression_rule, &location, &span)
}

fn parse_and_expression_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let left_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let node = parse_equality_expression_rule(left_pair, source)?;
    parse_binary_tail(
        node,
        &mut inner_pairs,
        source,
        parse_equality_expression_rule,
        &location,
        &span,
    )
}

fn parse_equality_expression_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let left_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let node = parse_relational_expression_rule(left_pair, source)?;
    parse_binary_tail(
        node,
        &mut inner_pairs,
        source,
        parse_relational_expression_rule,
        &location,
        &span,
    )
}

fn parse_relational_expression_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let left_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let node = parse_additive_expression_rule(left_pair, source)?;
    parse_binary_tail(
        node,
        &mut inner_pairs,
        source,
        parse_additive_expression_rule,
        &location,
        &span,
    )
}

fn parse_additive_expression_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let left_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let node = parse_multiplicative_expression_rule(left_pair, source)?;
    parse_binary_tail(
        node,
        &mut inner_pairs,
        source,
        parse_multiplicative_expression_rule,
        &location,
        &span,
    )
}

fn parse_multiplicative_expression_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let left_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let node = parse_unary_expression_rule(left_pair, source)?;
    parse_binary_tail(
        node,
        &mut inner_pairs,
        source,
        parse_unary_expression_rule,
        &location,
        &span,
    )
}

fn parse_unary_expression_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let next = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    match next.as_rule() {
        Rule::unary_op => {
            let op = match next.as_str() {
                "!" => UnaryOperator::Not,
                "-" => UnaryOperator::Minus,
                "+" => UnaryOperator::Plus,
                other => {
                    return Err(syntax_err(
                        format!("Invalid unary operator: {}", other),
                        "stagehand.ast.expr.parse_unary_expression_rule",
                        &location,
                        &span,
                    ));
                }
            };
            let operand_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
            let operand = parse_unary_expression_rule(operand_pair, source)?;
            Ok(AstNode::new(
                AstNodeKind::UnaryOp {
                    op,
                    expr: Box::new(operand),
                },
                location,
                span,
            ))
        }
        Rule::postfix_expr => parse_postfix_expression_rule(next, source),
        other => Err(syntax_err(
            format!("Unexpected unary expression member: {:?}", other),
            "stagehand.ast.expr.parse_unary_expression_rule",
            &location,
            &span,
        )),
    }
}

fn parse_postfix_expression_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let primary_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let mut node = parse_primary_rule(primary_pair, source)?;

    // Fold member accesses and index accesses left to right.
    for postfix_pair in inner_pairs {
        let (mut postfix_inner, p_location, p_span) =
            rules::get_data_from_rule(&postfix_pair, source);
        let next = rules::fetch_next_pair(&mut postfix_inner, &p_location, &p_span)?;
        match next.as_rule() {
            Rule::member_access => {
                let mut access_inner = next.into_inner();
                let property_pair = rules::fetch_next_pair(&mut access_inner, &p_location, &p_span)?;
                node = AstNode::new(
                    AstNodeKind::MemberAccess {
                        object: Box::new(node),
                        property: property_pair.as_str().to_string(),
                    },
                    p_location,
                    p_span,
                );
            }
            Rule::index_access => {
                let mut access_inner = next.into_inner();
                let index_pair = rules::fetch_next_pair(&mut access_inner, &p_location, &p_span)?;
                let index_node = parse_expression_rule(index_pair, source)?;
                node = AstNode::new(
                    AstNodeKind::Index {
                        object: Box::new(node),
                        index: Box::new(index_node),
                    },
                    p_location,
                    p_span,
                );
            }
            other => {
                return Err(syntax_err(
                    format!("Unexpected postfix member: {:?}", other),
                    "stagehand.ast.expr.parse_postfix_expression_rule",
                    &p_location,
                    &p_span,
                ));
            }
        }
    }
    Ok(node)
}

fn parse_primary_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let next = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    match next.as_rule() {
        Rule::float => {
            let value: f64 = next.as_str().parse().map_err(|_| {
                syntax_err(
                    format!("Invalid float literal: {}", next.as_str()),
                    "stagehand.ast.expr.parse_primary_rule",
                    &location,
                    &span,
                )
            })?;
            Ok(AstNode::new(AstNodeKind::Float { value }, location, span))
        }
        Rule::integer => {
            let value: i64 = next.as_str().parse().map_err(|_| {
                syntax_err(
                    format!("Invalid integer literal: {}", next.as_str()),
                    "stagehand.ast.expr.parse_primary_rule",
                    &location,
                    &span,
                )
            })?;
            Ok(AstNode::new(AstNodeKind::Integer { value }, location, span))
        }
        Rule::boolean => Ok(AstNode::new(
            AstNodeKind::Boolean {
                value: next.as_str() == "true",
            },
            location,
            span,
        )),
        Rule::string => {
            let value = parse_string_rule(next)?;
            Ok(AstNode::new(AstNodeKind::String { value }, location, span))
        }
        Rule::apply => parse_apply_rule(next, source),
        Rule::identifier => Ok(AstNode::new(
            AstNodeKind::Identifier {
                name: next.as_str().to_string(),
            },
            location,
            span,
        )),
        Rule::array_literal => {
            let mut elements = Vec::new();
            for element_pair in next.into_inner() {
                elements.push(parse_expression_rule(element_pair, source)?);
            }
            Ok(AstNode::new(
                AstNodeKind::ArrayLiteral { elements },
                location,
                span,
            ))
        }
        Rule::paren_expr => {
            let mut paren_inner = next.into_inner();
            let expr_pair = rules::fetch_next_pair(&mut paren_inner, &location, &span)?;
            parse_expression_rule(expr_pair, source)
        }
        other => Err(syntax_err(
            format!("Unexpected primary expression: {:?}", other),
            "stagehand.ast.expr.parse_primary_rule",
            &location,
            &span,
        )),
    }
}

fn parse_apply_rule(
    pair: pest::iterators::Pair<Rule>,
    source: &source::Source,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let (mut inner_pairs, location, span) = rules::get_data_from_rule(&pair, source);
    let name_pair = rules::fetch_next_pair(&mut inner_pairs, &location, &span)?;
    let function = name_pair.as_str().to_string();
    let mut args = Vec::new();
    if let Some(args_pair) = inner_pairs.next() {
        for arg_pair in args_pair.into_inner() {
            args.push(parse_expression_rule(arg_pair, source)?);
        }
    }
    Ok(AstNode::new(
        AstNodeKind::Apply { function, args },
        location,
        span,
    ))
}

/// Decode a `string` pair into its unescaped value.
pub(crate) fn parse_string_rule(
    pair: pest::iterators::Pair<Rule>,
) -> Result<String, Box<dyn StagehandErrorExt>> {
    let raw = match pair.into_inner().next() {
        Some(inner) => inner.as_str().to_string(),
        None => String::new(),
    };
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}
