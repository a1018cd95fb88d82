pub mod err;
pub mod validate;

pub use validate::{Validator, analyze_document_rules};
