//! The S-expression AST produced by the reader.
//!
//! Nodes are immutable after construction; the reader is their sole
//! producer (the macro expander builds new nodes but never mutates
//! existing ones). Every node carries an optional source span so later
//! stages can report positions without holding the source text.

use std::fmt;

use crate::intern::{Interner, StringId};

/// A 1-based line/column position, as the reader reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A source region: file plus start and end positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Span {
    /// Interned file path - look up in the session interner for the actual path.
    pub file: StringId,
    pub start: Position,
    pub end: Position,
}

impl Span {
    #[must_use]
    pub fn new(file: StringId, start: Position, end: Position) -> Self {
        Self { file, start, end }
    }

    /// A zero-width span at a single position.
    #[must_use]
    pub fn point(file: StringId, at: Position) -> Self {
        Self {
            file,
            start: at,
            end: at,
        }
    }
}

/// A self-evaluating literal value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// An arbitrary-precision integer literal (`123n`).
    ///
    /// The digits are kept verbatim; the emitter passes them straight
    /// through to the target's bigint literal syntax, so no host-side
    /// bigint arithmetic is ever performed.
    BigInt(String),
}

/// The payload of one AST node.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SexpKind {
    Literal(Literal),
    /// An interned symbol name. May carry a leading `.` (method sigil),
    /// a leading `:` (keyword tag), a `js/` path for host interop, or
    /// interior dots (`obj.prop`).
    Symbol(StringId),
    List(Vec<Sexp>),
}

/// One node of the S-expression tree.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sexp {
    pub kind: SexpKind,
    pub span: Option<Span>,
}

impl Sexp {
    #[must_use]
    pub fn literal(literal: Literal, span: Option<Span>) -> Self {
        Self {
            kind: SexpKind::Literal(literal),
            span,
        }
    }

    #[must_use]
    pub fn symbol(name: StringId, span: Option<Span>) -> Self {
        Self {
            kind: SexpKind::Symbol(name),
            span,
        }
    }

    #[must_use]
    pub fn list(items: Vec<Sexp>, span: Option<Span>) -> Self {
        Self {
            kind: SexpKind::List(items),
            span,
        }
    }

    /// A `nil` literal with no span, for synthesized positions.
    #[must_use]
    pub fn nil() -> Self {
        Self::literal(Literal::Nil, None)
    }

    #[must_use]
    pub fn as_symbol(&self) -> Option<StringId> {
        match self.kind {
            SexpKind::Symbol(id) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Sexp]> {
        match &self.kind {
            SexpKind::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            SexpKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// The head symbol of a list form, when there is one.
    #[must_use]
    pub fn head_symbol(&self) -> Option<StringId> {
        self.as_list().and_then(|items| items.first()).and_then(Sexp::as_symbol)
    }

    /// True when this node is the symbol with the given interned id.
    #[must_use]
    pub fn is_symbol(&self, id: StringId) -> bool {
        self.as_symbol() == Some(id)
    }

    /// Returns a displayable view that renders canonical S-expression text.
    ///
    /// `reader ∘ print` is the identity on literal values.
    #[must_use]
    pub fn display<'a>(&'a self, interner: &'a Interner) -> SexpDisplay<'a> {
        SexpDisplay { sexp: self, interner }
    }
}

/// Sigil helpers over resolved symbol names.
///
/// These inspect the textual shape of a symbol; they are used by the
/// lowerer's residual classifier and by the symbol collector.
pub mod sigils {
    /// `.method` - method-call head.
    #[must_use]
    pub fn is_method_sigil(name: &str) -> bool {
        name.len() > 1 && name.starts_with('.') && !name[1..].starts_with(|c: char| c.is_ascii_digit())
    }

    /// `:keyword` - keyword-like tag, lowers to a string.
    #[must_use]
    pub fn is_keyword(name: &str) -> bool {
        name.len() > 1 && name.starts_with(':')
    }

    /// `js/...` - host interop path.
    #[must_use]
    pub fn js_interop_path(name: &str) -> Option<&str> {
        name.strip_prefix("js/").filter(|rest| !rest.is_empty())
    }

    /// `obj.prop` - dotted property access (not a method sigil, not a
    /// float-looking token, at least one interior dot).
    #[must_use]
    pub fn is_dotted_access(name: &str) -> bool {
        !name.starts_with('.')
            && !name.ends_with('.')
            && name.contains('.')
            && !name.chars().next().is_some_and(|c| c.is_ascii_digit())
    }

    /// `$0`, `$1`, ... - implicit positional parameter of the body-only
    /// arrow lambda. Returns the index.
    #[must_use]
    pub fn sigil_param_index(name: &str) -> Option<u32> {
        name.strip_prefix('$').and_then(|digits| digits.parse().ok())
    }
}

/// Borrowing printer for [`Sexp`]; see [`Sexp::display`].
pub struct SexpDisplay<'a> {
    sexp: &'a Sexp,
    interner: &'a Interner,
}

impl fmt::Display for SexpDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sexp(f, self.sexp, self.interner)
    }
}

fn write_sexp(f: &mut fmt::Formatter<'_>, sexp: &Sexp, interner: &Interner) -> fmt::Result {
    match &sexp.kind {
        SexpKind::Literal(Literal::Nil) => write!(f, "nil"),
        SexpKind::Literal(Literal::Bool(b)) => write!(f, "{b}"),
        SexpKind::Literal(Literal::Int(n)) => write!(f, "{n}"),
        SexpKind::Literal(Literal::Float(x)) => {
            // Keep a trailing ".0" so the printed form re-reads as a float.
            if x.fract() == 0.0 && x.is_finite() {
                write!(f, "{x:.1}")
            } else {
                write!(f, "{x}")
            }
        }
        SexpKind::Literal(Literal::Str(s)) => write_string_literal(f, s),
        SexpKind::Literal(Literal::BigInt(digits)) => write!(f, "{digits}n"),
        SexpKind::Symbol(id) => write!(f, "{}", interner.resolve(*id)),
        SexpKind::List(items) => {
            write!(f, "(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write_sexp(f, item, interner)?;
            }
            write!(f, ")")
        }
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            other => write!(f, "{other}")?,
        }
    }
    write!(f, "\"")
}
