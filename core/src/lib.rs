pub mod analyzers;
pub mod ast;
pub mod error;
pub mod eval;
pub mod ir;
pub mod location;
pub mod scan;
pub mod source;

pub use analyzers::analyze_document_rules;
pub use ast::RulesParser;
pub use error::{Level, StagehandErrorExt};
pub use ir::{CompileOptions, LoweringError, LoweringErrorKind, Namespace, lower_namespace};
pub use location::{Location, Span};
pub use source::Source;

pub fn generate_error_report<E: StagehandErrorExt + ?Sized>(error: &E) -> String {
    let level = error.level();
    let location = match error.location() {
        Some(loc) => loc.to_string(),
        None => "unknown location".to_string(),
    };
    let message = error.message();

    format!("STAGEHAND | {} | {} | {}", level, location, message)
}

/// Parse, validate and lower one source document into an IR namespace.
pub fn compile_source_to_namespace(
    source: &Source,
    options: CompileOptions,
) -> Result<Namespace, Box<dyn StagehandErrorExt>> {
    let ast = ast::generate_ast_from_source(source)?;
    if let Err(mut diagnostics) = analyze_document_rules(&ast) {
        return Err(diagnostics.remove(0));
    }
    ir::lower_namespace(&ast, Some(&source.content), options)
        .map_err(|e| Box::new(e) as Box<dyn StagehandErrorExt>)
}
