//! Binding patterns for `let`/`var`/`fn` forms.
//!
//! A pattern is the destructuring shape on the left of a binding:
//! a plain identifier, a `[a b & rest]` vector pattern with `_` skip
//! holes, a `{key alias}` map pattern with renames and defaults, or a
//! rest binding. Patterns are parsed here and consumed by the lowerer
//! (destructuring emission) and the symbol collector (introduced names).

use crate::{
    ast::{Sexp, SexpKind},
    error::ValidationError,
    intern::{Interner, StringId},
};

/// A destructuring shape attached to a binding position.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// A plain name, optionally annotated and defaulted (`x`, `x: Int`,
    /// `(= x 1)`).
    Ident {
        name: StringId,
        type_annotation: Option<StringId>,
        default: Option<Sexp>,
    },
    /// `[a _ c & rest]` - element patterns with `None` skip holes and an
    /// optional rest element.
    Array {
        elements: Vec<Option<Pattern>>,
        rest: Option<Box<Pattern>>,
    },
    /// `{key binding ...}` - keyed element patterns with rename and
    /// default, plus an optional `& rest` name.
    Object {
        entries: Vec<ObjectEntry>,
        rest: Option<StringId>,
    },
    /// A rest binding (`& name` outside array/object context).
    Rest { name: StringId },
}

/// One keyed entry of an object pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: StringId,
    pub binding: Box<Pattern>,
    pub default: Option<Sexp>,
}

/// One entry of a function parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub type_annotation: Option<StringId>,
    pub default: Option<Sexp>,
}

/// A parsed `[a b & rest]` parameter vector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamList {
    pub params: Vec<Param>,
    pub rest: Option<StringId>,
}

impl Pattern {
    /// A plain identifier pattern.
    #[must_use]
    pub fn ident(name: StringId) -> Self {
        Self::Ident {
            name,
            type_annotation: None,
            default: None,
        }
    }

    /// True when the pattern is a bare identifier with no default, which
    /// lowers to a single declarator without temporaries.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            Self::Ident {
                default: None,
                ..
            }
        )
    }

    /// Appends every name this pattern binds, in source order.
    pub fn collect_bound_names(&self, out: &mut Vec<StringId>) {
        match self {
            Self::Ident { name, .. } | Self::Rest { name } => out.push(*name),
            Self::Array { elements, rest } => {
                for element in elements.iter().flatten() {
                    element.collect_bound_names(out);
                }
                if let Some(rest) = rest {
                    rest.collect_bound_names(out);
                }
            }
            Self::Object { entries, rest } => {
                for entry in entries {
                    entry.binding.collect_bound_names(out);
                }
                if let Some(rest) = rest {
                    out.push(*rest);
                }
            }
        }
    }
}

/// Parses one binding-position form into a [`Pattern`].
pub fn parse_pattern(sexp: &Sexp, interner: &mut Interner) -> Result<Pattern, ValidationError> {
    match &sexp.kind {
        SexpKind::Symbol(id) => Ok(Pattern::ident(*id)),
        SexpKind::List(items) => {
            let head = items.first().and_then(Sexp::as_symbol);
            let vector_id = interner.intern("vector");
            let map_id = interner.intern("hash-map");
            let eq_id = interner.intern("=");
            if head == Some(vector_id) {
                parse_array_pattern(&items[1..], interner, sexp)
            } else if head == Some(map_id) {
                parse_object_pattern(&items[1..], interner, sexp)
            } else if head == Some(eq_id) && items.len() == 3 {
                // `(= name default)` - defaulted identifier.
                let name = items[1].as_symbol().ok_or_else(|| {
                    ValidationError::new("binding", "identifier before default", "non-symbol", items[1].span)
                })?;
                Ok(Pattern::Ident {
                    name,
                    type_annotation: None,
                    default: Some(items[2].clone()),
                })
            } else {
                Err(ValidationError::new(
                    "binding",
                    "identifier, vector pattern, or map pattern",
                    "unsupported form",
                    sexp.span,
                ))
            }
        }
        SexpKind::Literal(_) => Err(ValidationError::new(
            "binding",
            "identifier, vector pattern, or map pattern",
            "literal",
            sexp.span,
        )),
    }
}

fn parse_array_pattern(items: &[Sexp], interner: &mut Interner, origin: &Sexp) -> Result<Pattern, ValidationError> {
    let amp_id = interner.intern("&");
    let skip_id = interner.intern("_");
    let mut elements = Vec::new();
    let mut rest = None;
    let mut iter = items.iter();
    while let Some(item) = iter.next() {
        if item.is_symbol(amp_id) {
            let rest_form = iter.next().ok_or_else(|| {
                ValidationError::new("pattern", "binding after '&'", "end of pattern", origin.span)
            })?;
            rest = Some(Box::new(parse_pattern(rest_form, interner)?));
            if iter.next().is_some() {
                return Err(ValidationError::new(
                    "pattern",
                    "rest binding in final position",
                    "trailing elements after rest",
                    origin.span,
                ));
            }
            break;
        }
        if item.is_symbol(skip_id) {
            elements.push(None);
        } else {
            elements.push(Some(parse_pattern(item, interner)?));
        }
    }
    Ok(Pattern::Array { elements, rest })
}

fn parse_object_pattern(items: &[Sexp], interner: &mut Interner, origin: &Sexp) -> Result<Pattern, ValidationError> {
    let amp_id = interner.intern("&");
    let mut entries = Vec::new();
    let mut rest = None;
    let mut iter = items.iter();
    while let Some(key_form) = iter.next() {
        if key_form.is_symbol(amp_id) {
            let rest_form = iter.next().ok_or_else(|| {
                ValidationError::new("pattern", "binding after '&'", "end of pattern", origin.span)
            })?;
            rest = Some(rest_form.as_symbol().ok_or_else(|| {
                ValidationError::new("pattern", "identifier after '&'", "non-symbol", rest_form.span)
            })?);
            break;
        }
        let key = key_symbol(key_form, interner)?;
        let binding_form = iter.next().ok_or_else(|| {
            ValidationError::new("pattern", "binding after map key", "end of pattern", origin.span)
        })?;
        let binding = parse_pattern(binding_form, interner)?;
        let (binding, default) = match binding {
            Pattern::Ident {
                name,
                type_annotation,
                default: Some(default),
            } => (
                Pattern::Ident {
                    name,
                    type_annotation,
                    default: None,
                },
                Some(default),
            ),
            other => (other, None),
        };
        entries.push(ObjectEntry {
            key,
            binding: Box::new(binding),
            default,
        });
    }
    Ok(Pattern::Object { entries, rest })
}

/// Resolves a map-pattern key: a symbol or a `:keyword` (tag stripped).
fn key_symbol(form: &Sexp, interner: &mut Interner) -> Result<StringId, ValidationError> {
    let id = form
        .as_symbol()
        .ok_or_else(|| ValidationError::new("pattern", "symbol key", "non-symbol key", form.span))?;
    let name = interner.resolve(id).to_owned();
    if let Some(stripped) = name.strip_prefix(':') {
        let stripped = stripped.to_owned();
        return Ok(interner.intern(&stripped));
    }
    Ok(id)
}

/// Parses the element list of a `[a b & rest]` parameter vector.
///
/// Supports `name`, `name: Type` (the annotation consumes the following
/// symbol), `(= name default)`, nested vector/map patterns, and a final
/// `& rest` parameter.
pub fn parse_param_vector(items: &[Sexp], interner: &mut Interner) -> Result<ParamList, ValidationError> {
    let amp_id = interner.intern("&");
    let mut list = ParamList::default();
    let mut iter = items.iter().peekable();
    while let Some(item) = iter.next() {
        if item.is_symbol(amp_id) {
            let rest_form = iter.next().ok_or_else(|| {
                ValidationError::new("fn", "parameter after '&'", "end of parameter vector", item.span)
            })?;
            list.rest = Some(rest_form.as_symbol().ok_or_else(|| {
                ValidationError::new("fn", "identifier after '&'", "non-symbol", rest_form.span)
            })?);
            if iter.next().is_some() {
                return Err(ValidationError::new(
                    "fn",
                    "rest parameter in final position",
                    "trailing parameters after rest",
                    item.span,
                ));
            }
            break;
        }

        // `name:` consumes the next element as the type annotation.
        if let Some(id) = item.as_symbol() {
            let name = interner.resolve(id).to_owned();
            if let Some(bare) = name.strip_suffix(':') {
                if !bare.is_empty() {
                    let annotation_form = iter.next().ok_or_else(|| {
                        ValidationError::new("fn", "type after annotated parameter", "end of parameter vector", item.span)
                    })?;
                    let annotation = annotation_form.as_symbol().ok_or_else(|| {
                        ValidationError::new("fn", "type symbol", "non-symbol annotation", annotation_form.span)
                    })?;
                    let bare = bare.to_owned();
                    let bare_id = interner.intern(&bare);
                    list.params.push(Param {
                        pattern: Pattern::ident(bare_id),
                        type_annotation: Some(annotation),
                        default: None,
                    });
                    continue;
                }
            }
        }

        let pattern = parse_pattern(item, interner)?;
        let (pattern, default) = match pattern {
            Pattern::Ident {
                name,
                type_annotation,
                default: Some(default),
            } => (
                Pattern::Ident {
                    name,
                    type_annotation,
                    default: None,
                },
                Some(default),
            ),
            other => (other, None),
        };
        list.params.push(Param {
            pattern,
            type_annotation: None,
            default,
        });
    }
    Ok(list)
}
