//! The closed error taxonomy for the compilation pipeline.
//!
//! Each stage has its own error type with constructor helpers; [`HqlError`]
//! is the sum over all of them. [`Diagnostic`] is the analysis-facing
//! projection consumed by the CLI and the language server: bulk analysis
//! never fails, it collects diagnostics instead.

use std::fmt;

use crate::ast::Span;

/// The reader failed at a source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

impl ParseError {
    #[must_use]
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at {}:{}: {}",
            self.span.start.line, self.span.start.column, self.message
        )
    }
}

/// Macro expansion failed, including iteration-limit exhaustion and
/// arity mismatches on macro calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionError {
    pub span: Option<Span>,
    /// Name of the macro form being expanded, when known.
    pub form: Option<String>,
    pub cause: String,
    /// Set for arity failures: the human-readable expected count (">=1").
    pub expected: Option<String>,
}

impl ExpansionError {
    #[must_use]
    pub fn cause(cause: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            span,
            form: None,
            cause: cause.into(),
            expected: None,
        }
    }

    /// The fixed-point loop exceeded `MAX_EXPANSION_ITERATIONS`.
    #[must_use]
    pub fn iteration_limit(span: Option<Span>) -> Self {
        Self {
            span,
            form: None,
            cause: "iteration limit".to_owned(),
            expected: None,
        }
    }

    /// A macro call with the wrong number of positional arguments.
    #[must_use]
    pub fn arity(form: impl Into<String>, expected: impl Into<String>, actual: usize, span: Option<Span>) -> Self {
        let form = form.into();
        let expected = expected.into();
        Self {
            span,
            cause: format!("macro '{form}' expects {expected} argument(s), got {actual}"),
            form: Some(form),
            expected: Some(expected),
        }
    }
}

impl fmt::Display for ExpansionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.form {
            Some(form) => write!(f, "expansion error in '{form}': {}", self.cause),
            None => write!(f, "expansion error: {}", self.cause),
        }
    }
}

/// A structural contract on a form was violated (missing required clause,
/// wrong arity, wrong argument kind).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub form: String,
    pub expected: String,
    pub actual: String,
    pub span: Option<Span>,
}

impl ValidationError {
    #[must_use]
    pub fn new(
        form: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self {
            form: form.into(),
            expected: expected.into(),
            actual: actual.into(),
            span,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid '{}' form: expected {}, got {}",
            self.form, self.expected, self.actual
        )
    }
}

/// A lowering invariant was violated (unexpected null transform,
/// unknown variant). These indicate compiler bugs, not user mistakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    pub span: Option<Span>,
    pub cause: String,
}

impl TransformError {
    #[must_use]
    pub fn new(cause: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            span,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transform error: {}", self.cause)
    }
}

/// An error raised by the emitted program's execution, carrying the
/// source location mapped back through the source map when available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub message: String,
    /// `(file, line, column)` in the original source.
    pub location: Option<(String, u32, u32)>,
}

impl RuntimeError {
    #[must_use]
    pub fn new(message: impl Into<String>, location: Option<(String, u32, u32)>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some((file, line, column)) => write!(f, "runtime error at {file}:{line}:{column}: {}", self.message),
            None => write!(f, "runtime error: {}", self.message),
        }
    }
}

/// The closed sum over every pipeline error.
#[derive(Debug, Clone, PartialEq)]
pub enum HqlError {
    Parse(ParseError),
    Expansion(ExpansionError),
    Validation(ValidationError),
    Transform(TransformError),
    Runtime(RuntimeError),
}

impl HqlError {
    /// The source span the error points at, when one was recorded.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Parse(e) => Some(e.span),
            Self::Expansion(e) => e.span,
            Self::Validation(e) => e.span,
            Self::Transform(e) => e.span,
            Self::Runtime(_) => None,
        }
    }
}

impl fmt::Display for HqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => e.fmt(f),
            Self::Expansion(e) => e.fmt(f),
            Self::Validation(e) => e.fmt(f),
            Self::Transform(e) => e.fmt(f),
            Self::Runtime(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for HqlError {}

impl From<ParseError> for HqlError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<ExpansionError> for HqlError {
    fn from(e: ExpansionError) -> Self {
        Self::Expansion(e)
    }
}

impl From<ValidationError> for HqlError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<TransformError> for HqlError {
    fn from(e: TransformError) -> Self {
        Self::Transform(e)
    }
}

impl From<RuntimeError> for HqlError {
    fn from(e: RuntimeError) -> Self {
        Self::Runtime(e)
    }
}

/// Diagnostic severity, ordered as the LSP encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Error = 1,
    Warning = 2,
    Info = 3,
    Hint = 4,
}

/// The analysis-facing projection of an error or lint finding.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Option<Span>,
    pub message: String,
    /// Internal code such as `E203`; stripped before user display.
    pub code: Option<String>,
    /// "Did you mean X?" replacement, surfaced as a quick-fix code action
    /// rather than inline in the message.
    pub suggestion: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn error(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Error,
            span,
            message: message.into(),
            code: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: Severity::Warning,
            span,
            message: message.into(),
            code: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// The message as shown to users: error codes stripped.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match &self.code {
            Some(code) => self
                .message
                .strip_prefix(code.as_str())
                .map_or(self.message.as_str(), |rest| rest.trim_start_matches([':', ' '])),
            None => &self.message,
        }
    }
}

impl From<HqlError> for Diagnostic {
    fn from(error: HqlError) -> Self {
        let span = error.span();
        Self::error(error.to_string(), span)
    }
}
