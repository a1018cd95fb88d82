pub mod err;
pub mod expr;
pub mod kind;
pub mod node;
pub mod rules;
pub mod stmt;
pub mod types;
pub mod writer;

pub use kind::{AstNodeKind, BinaryOperator, UnaryOperator};
pub use node::AstNode;
pub use rules::{Rule, RulesParser};
pub use types::WdlType;

pub use crate::error::StagehandErrorExt;

use crate::source::Source;
use pest::Parser;

/// Parse a loaded `Source` into a `Document` AST node.
pub fn generate_ast_from_source(source: &Source) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    if source.is_empty() {
        return Err(Box::<dyn StagehandErrorExt>::from(Box::new(
            err::EmptyDocumentError::new("stagehand.ast.generate_ast_from_source".into()),
        )));
    }

    let mut pairs = RulesParser::parse(Rule::document, &source.content).map_err(|e| {
        let location = match e.line_col {
            pest::error::LineColLocation::Pos((line, column))
            | pest::error::LineColLocation::Span((line, column), _) => {
                Some(crate::location::Location::new(source.name.clone(), line, column))
            }
        };
        Box::<dyn StagehandErrorExt>::from(Box::new(err::SyntaxError::with(
            crate::Level::Error,
            format!("{}", e.variant.message()),
            "stagehand.ast.generate_ast_from_source".into(),
            location,
            None,
        )))
    })?;

    let document_pair = rules::fetch_next_pair(&mut pairs, &None, &None)?;
    stmt::parse_document_rule(document_pair, source)
}

/// Parse a document given directly as text. Used by round-trip validation
/// of generated sub-programs and by tests.
pub fn parse_document_text(
    name: &str,
    text: &str,
) -> Result<AstNode, Box<dyn StagehandErrorExt>> {
    let source = Source::from_text(name, text);
    generate_ast_from_source(&source)
}
