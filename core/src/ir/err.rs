use crate::error::{Level, StagehandErrorExt};
use crate::location::{Location, Span};

/// The closed set of lowering failures. Callers discriminate on this to
/// tell workflow mistakes apart from compiler defects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoweringErrorKind {
    MissingVariableReference,
    IllegalStageName,
    UndefinedTask,
    MissingRequiredArgument,
    UnsupportedCallArgument,
    UnsupportedBlockElement,
    UnsupportedOutputExpression,
    WorkflowInputDefaultNotConst,
    GeneratedProgramInvalid,
    /// An internal invariant was violated. This is a defect in the lowering
    /// engine, not a mistake in the workflow being compiled.
    Internal,
}

impl std::fmt::Display for LoweringErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoweringErrorKind::MissingVariableReference => "MissingVariableReference",
            LoweringErrorKind::IllegalStageName => "IllegalStageName",
            LoweringErrorKind::UndefinedTask => "UndefinedTask",
            LoweringErrorKind::MissingRequiredArgument => "MissingRequiredArgument",
            LoweringErrorKind::UnsupportedCallArgument => "UnsupportedCallArgument",
            LoweringErrorKind::UnsupportedBlockElement => "UnsupportedBlockElement",
            LoweringErrorKind::UnsupportedOutputExpression => "UnsupportedOutputExpression",
            LoweringErrorKind::WorkflowInputDefaultNotConst => "WorkflowInputDefaultNotConst",
            LoweringErrorKind::GeneratedProgramInvalid => "GeneratedProgramInvalid",
            LoweringErrorKind::Internal => "Internal",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct LoweringError {
    kind: LoweringErrorKind,
    message: String,
    issuer: String,
    location: Option<Location>,
    span: Option<Span>,
}

impl LoweringError {
    pub fn new(kind: LoweringErrorKind, message: String, issuer: &str) -> Self {
        LoweringError {
            kind,
            message,
            issuer: issuer.to_string(),
            location: None,
            span: None,
        }
    }

    /// A defect-class error: an invariant the engine itself must uphold.
    pub fn internal(message: String, issuer: &str) -> Self {
        Self::new(LoweringErrorKind::Internal, message, issuer)
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }

    pub fn kind(&self) -> LoweringErrorKind {
        self.kind
    }
}

impl std::fmt::Display for LoweringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "[{}] {} (at {})", self.kind, self.message, loc)
        } else {
            write!(f, "[{}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for LoweringError {}

impl StagehandErrorExt for LoweringError {
    fn level(&self) -> Level {
        match self.kind {
            LoweringErrorKind::Internal => Level::Critical,
            _ => Level::Error,
        }
    }

    fn message(&self) -> String {
        format!("[{}] {}", self.kind, self.message)
    }

    fn issuer(&self) -> String {
        self.issuer.clone()
    }

    fn span(&self) -> Option<Span> {
        self.span.clone()
    }

    fn location(&self) -> Option<Location> {
        self.location.clone()
    }
}
