//! Lowering: expanded AST to IR.
//!
//! Top-level dispatch is a static match on the head symbol via
//! [`KernelForm`] (strum gives us the compile-time string table); heads
//! outside the kernel fall through to the residual classifier: method
//! sigils, dotted access, host paths, registered `fn` functions, primitive
//! operators, the property-vs-call fallback, and finally a generic call.
//!
//! Control-flow forms rewrite into JavaScript-shaped IR here: `do` blocks
//! become IIFEs with a depth-tracked early-return throw, `try` becomes an
//! IIFE marked async when anything under it awaits, `loop`/`recur` becomes
//! `while (true)` with reassignment and `continue`. A failing top-level
//! form is dropped and reported; the remaining forms still lower.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ahash::AHashSet;
use smallvec::SmallVec;

use crate::{
    ast::{Literal, Sexp, SexpKind, Span},
    error::{HqlError, TransformError, ValidationError},
    intern::{Interner, StringId},
    ir::{
        BinaryOp, CatchClause, ClassField, ClassMethod, Declarator, EnumCase, ImportSpecifier, IrExpr, IrExprKind,
        IrProgram, IrStmt, IrStmtKind, JsNumber, Lowered, MemberProp, ObjectKey, Params, UnaryOp, VarKind,
        stmts_contain_await,
    },
    pattern::{self, ParamList, Pattern},
    resolve,
};

/// Runtime helper for string-keyed property-vs-call fallback.
pub const HELPER_GET: &str = "__hql_get";
/// Runtime helper for numeric-keyed property-vs-call fallback.
pub const HELPER_GET_NUMERIC: &str = "__hql_getNumeric";
/// Runtime helper backing the `range` form.
pub const HELPER_RANGE: &str = "__hql_range";

/// The fixed kernel of special forms the lowerer handles directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
enum KernelForm {
    #[strum(serialize = "quote")]
    Quote,
    #[strum(serialize = "quasiquote")]
    Quasiquote,
    #[strum(serialize = "unquote")]
    Unquote,
    #[strum(serialize = "unquote-splicing")]
    UnquoteSplicing,
    #[strum(serialize = "vector")]
    Vector,
    #[strum(serialize = "hash-set")]
    HashSet,
    #[strum(serialize = "hash-map", serialize = "hashmap")]
    HashMap,
    #[strum(serialize = "new")]
    New,
    #[strum(serialize = "fn")]
    Fn,
    #[strum(serialize = "=>")]
    Arrow,
    #[strum(serialize = "async")]
    Async,
    #[strum(serialize = "range")]
    Range,
    #[strum(serialize = "await")]
    Await,
    #[strum(serialize = "const", serialize = "def")]
    Def,
    #[strum(serialize = "let")]
    Let,
    #[strum(serialize = "var")]
    Var,
    #[strum(serialize = "if", serialize = "?")]
    If,
    #[strum(serialize = "template-literal")]
    TemplateLiteral,
    #[strum(serialize = "do")]
    Do,
    #[strum(serialize = "try")]
    Try,
    #[strum(serialize = "loop")]
    Loop,
    #[strum(serialize = "recur")]
    Recur,
    #[strum(serialize = "return")]
    Return,
    #[strum(serialize = "throw")]
    Throw,
    #[strum(serialize = "js-new")]
    JsNew,
    #[strum(serialize = "js-get")]
    JsGet,
    #[strum(serialize = "js-call")]
    JsCall,
    #[strum(serialize = "js-get-invoke")]
    JsGetInvoke,
    #[strum(serialize = "js-set")]
    JsSet,
    #[strum(serialize = "class")]
    Class,
    #[strum(serialize = "enum")]
    Enum,
    #[strum(serialize = "import")]
    Import,
    #[strum(serialize = "export")]
    Export,
    #[strum(serialize = "get")]
    Get,
    #[strum(serialize = "js-method")]
    JsMethod,
    #[strum(serialize = "=")]
    Assign,
}

/// Result of lowering a document: the program built from the forms that
/// lowered cleanly plus the per-form failures.
#[derive(Debug)]
pub struct LowerOutcome {
    pub program: IrProgram,
    pub errors: Vec<HqlError>,
}

/// Lowers expanded top-level forms. `current_dir` anchors relative import
/// specifiers so emitted sources point at the compiled neighbors.
pub fn lower_program(forms: &[Sexp], interner: &mut Interner, current_dir: &Path) -> LowerOutcome {
    let mut lowerer = Lowerer::new(interner, current_dir);
    let mut program = IrProgram::default();
    let mut errors = Vec::new();
    for form in forms {
        match lowerer.lower_form(form) {
            Ok(lowered) => program.body.push(lowered.into_stmt()),
            Err(error) => errors.push(error),
        }
    }
    LowerOutcome { program, errors }
}

/// Per-document lowering state.
///
/// The do-block depth counter and the temporary counter live here rather
/// than in process-wide statics so concurrent per-file lowerings cannot
/// interfere.
struct Lowerer<'i> {
    interner: &'i mut Interner,
    current_dir: PathBuf,
    /// Nesting depth of `do` IIFEs; `return` at depth > 0 becomes the
    /// distinguished early-return throw caught by the innermost block.
    do_depth: u32,
    /// Whether each open `do` level saw a `return`, so only those levels
    /// pay for the catching wrapper.
    do_return_used: Vec<bool>,
    /// Stack of `loop` recur-target names, innermost last.
    loop_bindings: Vec<Vec<String>>,
    /// Names declared through the `fn` form; calls to these are plain
    /// function calls in the residual classifier.
    fn_functions: AHashSet<String>,
    /// Inside a class constructor or method body `self` is the receiver.
    in_class_method: bool,
    temp_counter: u32,
}

impl<'i> Lowerer<'i> {
    fn new(interner: &'i mut Interner, current_dir: &Path) -> Self {
        Self {
            interner,
            current_dir: current_dir.to_path_buf(),
            do_depth: 0,
            do_return_used: Vec::new(),
            loop_bindings: Vec::new(),
            fn_functions: AHashSet::new(),
            in_class_method: false,
            temp_counter: 0,
        }
    }

    fn fresh_temp(&mut self, prefix: &str) -> String {
        let name = format!("__{prefix}{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    // =========================================================================
    // Form dispatch
    // =========================================================================

    fn lower_form(&mut self, form: &Sexp) -> Result<Lowered, HqlError> {
        match &form.kind {
            SexpKind::Literal(lit) => Ok(Lowered::Expr(lower_literal(lit, form.span))),
            SexpKind::Symbol(id) => Ok(Lowered::Expr(self.lower_symbol(*id, form.span)?)),
            SexpKind::List(items) => self.lower_list(items, form.span),
        }
    }

    fn lower_expr(&mut self, form: &Sexp) -> Result<IrExpr, HqlError> {
        match self.lower_form(form)? {
            Lowered::Expr(expr) => Ok(expr),
            // A statement in expression position evaluates inside an IIFE;
            // module-level declarations have no value and cannot.
            Lowered::Stmt(stmt) => {
                if matches!(
                    stmt.kind,
                    IrStmtKind::ImportDecl { .. }
                        | IrStmtKind::ExportNamed { .. }
                        | IrStmtKind::ExportVarDecl(_)
                        | IrStmtKind::ExportDefault(_)
                ) {
                    return Err(TransformError::new(
                        "module declaration lowered in expression position",
                        stmt.span,
                    )
                    .into());
                }
                if let IrStmtKind::Block(body) = &stmt.kind {
                    if matches!(body.last().map(|s| &s.kind), Some(IrStmtKind::Continue)) {
                        return Err(ValidationError::new(
                            "recur",
                            "tail position of the enclosing loop",
                            "expression position",
                            stmt.span,
                        )
                        .into());
                    }
                }
                let span = stmt.span;
                Ok(iife(vec![stmt], false, span))
            }
        }
    }

    fn lower_args(&mut self, forms: &[Sexp]) -> Result<Vec<IrExpr>, HqlError> {
        forms.iter().map(|form| self.lower_expr(form)).collect()
    }

    fn lower_list(&mut self, items: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        let Some((head, args)) = items.split_first() else {
            return Ok(Lowered::Expr(IrExpr::null(span)));
        };

        if let Some(head_id) = head.as_symbol() {
            let head_name = self.interner.resolve(head_id).to_owned();
            if let Ok(kernel) = KernelForm::from_str(&head_name) {
                return self.lower_kernel(kernel, &head_name, args, span);
            }
            return self.lower_residual(&head_name, args, span);
        }

        // A computed head: `((fn [x] x) 1)` and friends.
        let callee = self.lower_expr(head)?;
        let args = self.lower_args(args)?;
        Ok(Lowered::Expr(IrExpr::new(
            IrExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            span,
        )))
    }

    fn lower_kernel(
        &mut self,
        kernel: KernelForm,
        head_name: &str,
        args: &[Sexp],
        span: Option<Span>,
    ) -> Result<Lowered, HqlError> {
        match kernel {
            KernelForm::Quote => {
                let arg = require_arg(args, 0, head_name, "1", span)?;
                Ok(Lowered::Expr(self.lower_quoted(arg)))
            }
            KernelForm::Quasiquote => {
                let arg = require_arg(args, 0, head_name, "1", span)?;
                self.lower_quasiquoted(arg, 1).map(Lowered::Expr)
            }
            KernelForm::Unquote | KernelForm::UnquoteSplicing => Err(ValidationError::new(
                head_name,
                "a surrounding quasiquote",
                "unquote outside quasiquote",
                span,
            )
            .into()),
            KernelForm::Vector => {
                let items = self.lower_args(args)?;
                Ok(Lowered::Expr(IrExpr::new(IrExprKind::ArrayLit(items), span)))
            }
            KernelForm::HashSet => {
                let items = self.lower_args(args)?;
                Ok(Lowered::Expr(IrExpr::new(
                    IrExprKind::New {
                        callee: Box::new(IrExpr::js_ident("Set", span)),
                        args: vec![IrExpr::new(IrExprKind::ArrayLit(items), span)],
                    },
                    span,
                )))
            }
            KernelForm::HashMap => self.lower_hash_map(args, span).map(Lowered::Expr),
            KernelForm::New | KernelForm::JsNew => {
                let ctor = require_arg(args, 0, head_name, ">=1", span)?;
                let callee = self.lower_expr(ctor)?;
                let args = self.lower_args(&args[1..])?;
                Ok(Lowered::Expr(IrExpr::new(
                    IrExprKind::New {
                        callee: Box::new(callee),
                        args,
                    },
                    span,
                )))
            }
            KernelForm::Fn => self.lower_fn(args, span, false),
            KernelForm::Arrow => self.lower_arrow(args, span),
            KernelForm::Async => {
                let inner = require_arg(args, 0, head_name, "1", span)?;
                match self.lower_form(inner)? {
                    Lowered::Expr(mut expr) => {
                        if let IrExprKind::FunctionExpr { is_async, .. } = &mut expr.kind {
                            *is_async = true;
                            Ok(Lowered::Expr(expr))
                        } else {
                            Err(ValidationError::new("async", "a function form", "non-function", span).into())
                        }
                    }
                    Lowered::Stmt(mut stmt) => {
                        if let IrStmtKind::FunctionDecl { is_async, .. } = &mut stmt.kind {
                            *is_async = true;
                            Ok(Lowered::Stmt(stmt))
                        } else {
                            Err(ValidationError::new("async", "a function form", "non-function", span).into())
                        }
                    }
                }
            }
            KernelForm::Range => {
                if args.is_empty() || args.len() > 3 {
                    return Err(ValidationError::new("range", "1 to 3 arguments", args.len().to_string(), span).into());
                }
                let args = self.lower_args(args)?;
                Ok(Lowered::Expr(IrExpr::new(
                    IrExprKind::Call {
                        callee: Box::new(IrExpr::js_ident(HELPER_RANGE, span)),
                        args,
                    },
                    span,
                )))
            }
            KernelForm::Await => {
                let arg = require_arg(args, 0, head_name, "1", span)?;
                let inner = self.lower_expr(arg)?;
                Ok(Lowered::Expr(IrExpr::new(IrExprKind::Await(Box::new(inner)), span)))
            }
            KernelForm::Def => self.lower_binding(args, span, VarKind::Const, head_name),
            KernelForm::Let => self.lower_let(args, span),
            KernelForm::Var => self.lower_binding(args, span, VarKind::Var, "var"),
            KernelForm::If => {
                let test = require_arg(args, 0, head_name, "2 or 3", span)?;
                let consequent = require_arg(args, 1, head_name, "2 or 3", span)?;
                let test = self.lower_expr(test)?;
                let consequent = self.lower_expr(consequent)?;
                let alternate = match args.get(2) {
                    Some(alt) => self.lower_expr(alt)?,
                    None => IrExpr::null(span),
                };
                Ok(Lowered::Expr(IrExpr::new(
                    IrExprKind::Conditional {
                        test: Box::new(test),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                    },
                    span,
                )))
            }
            KernelForm::TemplateLiteral => self.lower_template_literal(args, span).map(Lowered::Expr),
            KernelForm::Do => self.lower_do(args, span),
            KernelForm::Try => self.lower_try(args, span),
            KernelForm::Loop => self.lower_loop(args, span),
            KernelForm::Recur => self.lower_recur(args, span),
            KernelForm::Return => {
                let value = match args.first() {
                    Some(form) => Some(self.lower_expr(form)?),
                    None => None,
                };
                Ok(Lowered::Stmt(self.make_return(value, span)))
            }
            KernelForm::Throw => {
                let arg = require_arg(args, 0, head_name, "1", span)?;
                let value = self.lower_expr(arg)?;
                Ok(Lowered::Stmt(IrStmt::new(IrStmtKind::Throw(value), span)))
            }
            KernelForm::JsGet => {
                let object = require_arg(args, 0, head_name, "2", span)?;
                let prop = require_arg(args, 1, head_name, "2", span)?;
                let object = self.lower_expr(object)?;
                let property = match prop.as_literal() {
                    Some(Literal::Str(name)) => MemberProp::Static(name.clone()),
                    _ => MemberProp::Computed(Box::new(self.lower_expr(prop)?)),
                };
                Ok(Lowered::Expr(IrExpr::new(
                    IrExprKind::Member {
                        object: Box::new(object),
                        property,
                    },
                    span,
                )))
            }
            KernelForm::JsCall => {
                let object = require_arg(args, 0, head_name, ">=2", span)?;
                let method = require_arg(args, 1, head_name, ">=2", span)?;
                let object = self.lower_expr(object)?;
                let call_args = self.lower_args(&args[2..])?;
                match method.as_literal() {
                    Some(Literal::Str(name)) => Ok(Lowered::Expr(IrExpr::new(
                        IrExprKind::CallMember {
                            object: Box::new(object),
                            method: name.clone(),
                            args: call_args,
                        },
                        span,
                    ))),
                    _ => {
                        let property = MemberProp::Computed(Box::new(self.lower_expr(method)?));
                        Ok(Lowered::Expr(IrExpr::new(
                            IrExprKind::Call {
                                callee: Box::new(IrExpr::new(
                                    IrExprKind::Member {
                                        object: Box::new(object),
                                        property,
                                    },
                                    span,
                                )),
                                args: call_args,
                            },
                            span,
                        )))
                    }
                }
            }
            KernelForm::JsGetInvoke => {
                let object = require_arg(args, 0, head_name, "2", span)?;
                let prop = require_arg(args, 1, head_name, "2", span)?;
                let object = self.lower_expr(object)?;
                let Some(Literal::Str(property)) = prop.as_literal() else {
                    return Err(ValidationError::new(head_name, "a string property", "non-string", span).into());
                };
                Ok(Lowered::Expr(IrExpr::new(
                    IrExprKind::InteropIife {
                        object: Box::new(object),
                        property: property.clone(),
                    },
                    span,
                )))
            }
            KernelForm::JsSet => {
                let object = require_arg(args, 0, head_name, "3", span)?;
                let prop = require_arg(args, 1, head_name, "3", span)?;
                let value = require_arg(args, 2, head_name, "3", span)?;
                let object = self.lower_expr(object)?;
                let property = match prop.as_literal() {
                    Some(Literal::Str(name)) => MemberProp::Static(name.clone()),
                    _ => MemberProp::Computed(Box::new(self.lower_expr(prop)?)),
                };
                let value = self.lower_expr(value)?;
                let target = IrExpr::new(
                    IrExprKind::Member {
                        object: Box::new(object),
                        property,
                    },
                    span,
                );
                Ok(Lowered::Expr(IrExpr::new(
                    IrExprKind::Assign {
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                    span,
                )))
            }
            KernelForm::JsMethod => {
                let object = require_arg(args, 0, head_name, "2", span)?;
                let method = require_arg(args, 1, head_name, "2", span)?;
                let object = self.lower_expr(object)?;
                let Some(Literal::Str(method)) = method.as_literal() else {
                    return Err(ValidationError::new(head_name, "a string method name", "non-string", span).into());
                };
                Ok(Lowered::Expr(IrExpr::new(
                    IrExprKind::JsMethodAccess {
                        object: Box::new(object),
                        method: method.clone(),
                    },
                    span,
                )))
            }
            KernelForm::Class => self.lower_class(args, span),
            KernelForm::Enum => self.lower_enum(args, span),
            KernelForm::Import => self.lower_import(args, span),
            KernelForm::Export => self.lower_export(args, span),
            KernelForm::Get => {
                let object = require_arg(args, 0, head_name, "2", span)?;
                let key = require_arg(args, 1, head_name, "2", span)?;
                let object = self.lower_expr(object)?;
                let key_expr = self.lower_expr(key)?;
                let helper = match key.as_literal() {
                    Some(Literal::Int(_) | Literal::Float(_)) => HELPER_GET_NUMERIC,
                    _ => HELPER_GET,
                };
                Ok(Lowered::Expr(IrExpr::new(
                    IrExprKind::Call {
                        callee: Box::new(IrExpr::js_ident(helper, span)),
                        args: vec![object, key_expr],
                    },
                    span,
                )))
            }
            KernelForm::Assign => {
                let place = require_arg(args, 0, "=", "2", span)?;
                let value = require_arg(args, 1, "=", "2", span)?;
                let target = self.lower_expr(place)?;
                if !matches!(
                    target.kind,
                    IrExprKind::Identifier { .. } | IrExprKind::Member { .. }
                ) {
                    return Err(
                        ValidationError::new("=", "an identifier or member place", "non-assignable", span).into(),
                    );
                }
                let value = self.lower_expr(value)?;
                Ok(Lowered::Expr(IrExpr::new(
                    IrExprKind::Assign {
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                    span,
                )))
            }
        }
    }

    // =========================================================================
    // Symbols and residual heads
    // =========================================================================

    fn lower_symbol(&mut self, id: StringId, span: Option<Span>) -> Result<IrExpr, HqlError> {
        let name = self.interner.resolve(id).to_owned();

        if name == "_" {
            // Placeholder marking unused positions in macro output.
            return Ok(IrExpr::new(IrExprKind::Str("_".to_owned()), span));
        }
        if name == "self" && self.in_class_method {
            return Ok(IrExpr::js_ident("this", span));
        }
        if let Some(tag) = name.strip_prefix(':') {
            if !tag.is_empty() {
                return Ok(IrExpr::new(IrExprKind::Str(tag.to_owned()), span));
            }
        }
        if let Some(path) = crate::ast::sigils::js_interop_path(&name) {
            return Ok(js_path_expr(path, span));
        }
        if crate::ast::sigils::sigil_param_index(&name).is_some() {
            return Ok(IrExpr::js_ident(name, span));
        }
        if crate::ast::sigils::is_dotted_access(&name) {
            return Ok(self.lower_dotted_symbol(&name, span));
        }
        Ok(IrExpr::ident(name, span))
    }

    /// `obj.prop` in symbol position: `self.x` resolves against the
    /// receiver inside class bodies, everything else defers the access
    /// behind the interop IIFE so surrounding lowerings can rewrite it.
    fn lower_dotted_symbol(&mut self, name: &str, span: Option<Span>) -> IrExpr {
        let mut parts = name.split('.');
        let first = parts.next().expect("dotted name has a first part");
        let mut object = if first == "self" && self.in_class_method {
            IrExpr::js_ident("this", span)
        } else {
            IrExpr::ident(first, span)
        };
        let segments: Vec<&str> = parts.collect();
        let (property, middle) = segments.split_last().expect("dotted name has a last part");
        for segment in middle {
            object = IrExpr::new(
                IrExprKind::Member {
                    object: Box::new(object),
                    property: MemberProp::Static((*segment).to_owned()),
                },
                span,
            );
        }
        if first == "self" && self.in_class_method {
            return IrExpr::new(
                IrExprKind::Member {
                    object: Box::new(object),
                    property: MemberProp::Static((*property).to_owned()),
                },
                span,
            );
        }
        IrExpr::new(
            IrExprKind::InteropIife {
                object: Box::new(object),
                property: (*property).to_owned(),
            },
            span,
        )
    }

    fn lower_residual(&mut self, head_name: &str, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        // `(.method obj arg...)` → `obj.method(arg...)`.
        if crate::ast::sigils::is_method_sigil(head_name) {
            let object = require_arg(args, 0, head_name, ">=1", span)?;
            let object = self.lower_expr(object)?;
            let call_args = self.lower_args(&args[1..])?;
            return Ok(Lowered::Expr(IrExpr::new(
                IrExprKind::CallMember {
                    object: Box::new(object),
                    method: head_name[1..].to_owned(),
                    args: call_args,
                },
                span,
            )));
        }

        // `(:key m)` → keyed lookup through the runtime helper.
        if crate::ast::sigils::is_keyword(head_name) {
            let object = require_arg(args, 0, head_name, "1", span)?;
            let object = self.lower_expr(object)?;
            let key = IrExpr::new(IrExprKind::Str(head_name[1..].to_owned()), span);
            return Ok(Lowered::Expr(IrExpr::new(
                IrExprKind::Call {
                    callee: Box::new(IrExpr::js_ident(HELPER_GET, span)),
                    args: vec![object, key],
                },
                span,
            )));
        }

        // `(js/console.log x)` → host call.
        if let Some(path) = crate::ast::sigils::js_interop_path(head_name) {
            let callee = js_path_expr(path, span);
            let call_args = self.lower_args(args)?;
            return Ok(Lowered::Expr(IrExpr::new(
                IrExprKind::Call {
                    callee: Box::new(callee),
                    args: call_args,
                },
                span,
            )));
        }

        // `(obj.prop arg...)` → `obj.prop(arg...)` dot-notation call.
        if crate::ast::sigils::is_dotted_access(head_name) {
            let (object_path, method) = head_name.rsplit_once('.').expect("dotted access has a dot");
            let object = if object_path.contains('.') {
                self.lower_dotted_object(object_path, span)
            } else if object_path == "self" && self.in_class_method {
                IrExpr::js_ident("this", span)
            } else {
                IrExpr::ident(object_path, span)
            };
            let call_args = self.lower_args(args)?;
            return Ok(Lowered::Expr(IrExpr::new(
                IrExprKind::CallMember {
                    object: Box::new(object),
                    method: method.to_owned(),
                    args: call_args,
                },
                span,
            )));
        }

        if let Some(op) = self.lower_operator(head_name, args, span)? {
            return Ok(Lowered::Expr(op));
        }

        // Property-vs-call: `(m "key")` on a head not known to be a
        // function keeps the lookup pun and falls back to invocation at
        // runtime.
        if args.len() == 1 && !self.fn_functions.contains(head_name) {
            if let Some(lit) = args[0].as_literal() {
                let helper = match lit {
                    Literal::Str(_) => Some(HELPER_GET),
                    Literal::Int(_) | Literal::Float(_) => Some(HELPER_GET_NUMERIC),
                    _ => None,
                };
                if let Some(helper) = helper {
                    let object = IrExpr::ident(head_name, span);
                    let key = self.lower_expr(&args[0])?;
                    return Ok(Lowered::Expr(IrExpr::new(
                        IrExprKind::Call {
                            callee: Box::new(IrExpr::js_ident(helper, span)),
                            args: vec![object, key],
                        },
                        span,
                    )));
                }
            }
        }

        // Generic call.
        let callee = IrExpr::ident(head_name, span);
        let call_args = self.lower_args(args)?;
        Ok(Lowered::Expr(IrExpr::new(
            IrExprKind::Call {
                callee: Box::new(callee),
                args: call_args,
            },
            span,
        )))
    }

    fn lower_dotted_object(&mut self, path: &str, span: Option<Span>) -> IrExpr {
        let mut parts = path.split('.');
        let first = parts.next().expect("dotted path has a first part");
        let mut object = if first == "self" && self.in_class_method {
            IrExpr::js_ident("this", span)
        } else {
            IrExpr::ident(first, span)
        };
        for segment in parts {
            object = IrExpr::new(
                IrExprKind::Member {
                    object: Box::new(object),
                    property: MemberProp::Static(segment.to_owned()),
                },
                span,
            );
        }
        object
    }

    /// Primitive operators. Arithmetic and the logical connectives fold
    /// left-associatively over any arity; comparisons chain pairwise.
    fn lower_operator(&mut self, name: &str, args: &[Sexp], span: Option<Span>) -> Result<Option<IrExpr>, HqlError> {
        let binary = |op: BinaryOp| Some(op);
        let op = match name {
            "+" => binary(BinaryOp::Add),
            "-" => binary(BinaryOp::Sub),
            "*" => binary(BinaryOp::Mul),
            "/" => binary(BinaryOp::Div),
            "%" | "mod" => binary(BinaryOp::Rem),
            "==" | "===" | "eq?" => binary(BinaryOp::StrictEq),
            "!=" | "!==" => binary(BinaryOp::StrictNeq),
            "<" => binary(BinaryOp::Lt),
            ">" => binary(BinaryOp::Gt),
            "<=" => binary(BinaryOp::Le),
            ">=" => binary(BinaryOp::Ge),
            "and" => binary(BinaryOp::And),
            "or" => binary(BinaryOp::Or),
            "instanceof" => binary(BinaryOp::InstanceOf),
            "in" => binary(BinaryOp::In),
            "not" | "!" => {
                let arg = require_arg(args, 0, name, "1", span)?;
                let operand = self.lower_expr(arg)?;
                return Ok(Some(IrExpr::new(
                    IrExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    span,
                )));
            }
            "typeof" => {
                let arg = require_arg(args, 0, name, "1", span)?;
                let operand = self.lower_expr(arg)?;
                return Ok(Some(IrExpr::new(
                    IrExprKind::Unary {
                        op: UnaryOp::TypeOf,
                        operand: Box::new(operand),
                    },
                    span,
                )));
            }
            _ => None,
        };
        let Some(op) = op else {
            return Ok(None);
        };

        // Unary minus.
        if name == "-" && args.len() == 1 {
            let operand = self.lower_expr(&args[0])?;
            return Ok(Some(IrExpr::new(
                IrExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                span,
            )));
        }
        if args.len() < 2 {
            return Err(ValidationError::new(name, ">=2 arguments", args.len().to_string(), span).into());
        }

        let exprs = self.lower_args(args)?;
        let comparison = matches!(
            op,
            BinaryOp::StrictEq | BinaryOp::StrictNeq | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        );
        if comparison && exprs.len() > 2 {
            // `(< a b c)` → `a < b && b < c`.
            let mut chain: Option<IrExpr> = None;
            for pair in exprs.windows(2) {
                let cmp = IrExpr::new(
                    IrExprKind::Binary {
                        op,
                        left: Box::new(pair[0].clone()),
                        right: Box::new(pair[1].clone()),
                    },
                    span,
                );
                chain = Some(match chain {
                    Some(acc) => IrExpr::new(
                        IrExprKind::Binary {
                            op: BinaryOp::And,
                            left: Box::new(acc),
                            right: Box::new(cmp),
                        },
                        span,
                    ),
                    None => cmp,
                });
            }
            return Ok(chain);
        }

        let mut iter = exprs.into_iter();
        let mut acc = iter.next().expect("checked arity above");
        for next in iter {
            acc = IrExpr::new(
                IrExprKind::Binary {
                    op,
                    left: Box::new(acc),
                    right: Box::new(next),
                },
                span,
            );
        }
        Ok(Some(acc))
    }

    // =========================================================================
    // Quote and quasiquote
    // =========================================================================

    /// Quoted data becomes a literal JS structure: symbols print as
    /// strings, vectors and plain lists as arrays, maps as objects.
    fn lower_quoted(&mut self, node: &Sexp) -> IrExpr {
        match &node.kind {
            SexpKind::Literal(lit) => lower_literal(lit, node.span),
            SexpKind::Symbol(id) => {
                let name = self.interner.resolve(*id).to_owned();
                IrExpr::new(IrExprKind::Str(name), node.span)
            }
            SexpKind::List(items) => {
                let vector_id = self.interner.get("vector");
                let skip_head = node.head_symbol().is_some() && node.head_symbol() == vector_id;
                let elements = if skip_head { &items[1..] } else { &items[..] };
                let lowered = elements.iter().map(|item| self.lower_quoted(item)).collect();
                IrExpr::new(IrExprKind::ArrayLit(lowered), node.span)
            }
        }
    }

    /// Residual quasiquote outside macros: quote semantics with unquote
    /// escapes. Splices concatenate through `[].concat(...)`.
    fn lower_quasiquoted(&mut self, node: &Sexp, level: u32) -> Result<IrExpr, HqlError> {
        let unquote_id = self.interner.get("unquote");
        let splice_id = self.interner.get("unquote-splicing");
        let qq_id = self.interner.get("quasiquote");

        if let Some(items) = node.as_list() {
            let head = node.head_symbol();
            if head.is_some() && head == unquote_id && items.len() == 2 {
                if level == 1 {
                    return self.lower_expr(&items[1]);
                }
                return self.lower_quasiquoted(&items[1], level - 1);
            }
            if head.is_some() && head == qq_id && items.len() == 2 {
                return self.lower_quasiquoted(&items[1], level + 1);
            }

            let mut segments: Vec<(bool, IrExpr)> = Vec::with_capacity(items.len());
            let mut any_splice = false;
            for item in items {
                let is_splice = item.head_symbol().is_some()
                    && item.head_symbol() == splice_id
                    && item.as_list().is_some_and(|l| l.len() == 2);
                if is_splice && level == 1 {
                    let inner = &item.as_list().expect("checked list")[1];
                    segments.push((true, self.lower_expr(inner)?));
                    any_splice = true;
                } else {
                    segments.push((false, self.lower_quasiquoted(item, level)?));
                }
            }
            if !any_splice {
                let elements = segments.into_iter().map(|(_, e)| e).collect();
                return Ok(IrExpr::new(IrExprKind::ArrayLit(elements), node.span));
            }
            let parts = segments
                .into_iter()
                .map(|(spliced, expr)| {
                    if spliced {
                        expr
                    } else {
                        let span = expr.span;
                        IrExpr::new(IrExprKind::ArrayLit(vec![expr]), span)
                    }
                })
                .collect();
            return Ok(IrExpr::new(
                IrExprKind::CallMember {
                    object: Box::new(IrExpr::new(IrExprKind::ArrayLit(Vec::new()), node.span)),
                    method: "concat".to_owned(),
                    args: parts,
                },
                node.span,
            ));
        }
        Ok(self.lower_quoted(node))
    }

    // =========================================================================
    // Collections
    // =========================================================================

    fn lower_hash_map(&mut self, args: &[Sexp], span: Option<Span>) -> Result<IrExpr, HqlError> {
        if !args.len().is_multiple_of(2) {
            return Err(ValidationError::new(
                "hash-map",
                "an even number of forms",
                format!("{} form(s)", args.len()),
                span,
            )
            .into());
        }
        let mut entries = Vec::with_capacity(args.len() / 2);
        for pair in args.chunks_exact(2) {
            let key = match &pair[0].kind {
                SexpKind::Literal(Literal::Str(s)) => ObjectKey::Str(s.clone()),
                SexpKind::Literal(Literal::Int(n)) => ObjectKey::Str(n.to_string()),
                SexpKind::Symbol(id) => {
                    let name = self.interner.resolve(*id);
                    let name = name.strip_prefix(':').unwrap_or(name).to_owned();
                    ObjectKey::Ident(name)
                }
                _ => ObjectKey::Computed(Box::new(self.lower_expr(&pair[0])?)),
            };
            let value = self.lower_expr(&pair[1])?;
            entries.push((key, value));
        }
        Ok(IrExpr::new(IrExprKind::ObjectLit(entries), span))
    }

    fn lower_template_literal(&mut self, args: &[Sexp], span: Option<Span>) -> Result<IrExpr, HqlError> {
        // The reader alternates string parts (even positions) and embedded
        // expressions (odd positions); a string literal at an odd position
        // is an expression, not a part.
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        for (index, arg) in args.iter().enumerate() {
            if index.is_multiple_of(2) {
                match arg.as_literal() {
                    Some(Literal::Str(part)) => quasis.push(part.clone()),
                    _ => {
                        quasis.push(String::new());
                        exprs.push(self.lower_expr(arg)?);
                    }
                }
            } else {
                exprs.push(self.lower_expr(arg)?);
            }
        }
        while quasis.len() < exprs.len() + 1 {
            quasis.push(String::new());
        }
        Ok(IrExpr::new(IrExprKind::TemplateLit { quasis, exprs }, span))
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn lower_fn(&mut self, args: &[Sexp], span: Option<Span>, force_async: bool) -> Result<Lowered, HqlError> {
        let vector_id = self.interner.intern("vector");
        let (name, rest) = match args.first() {
            Some(first) if first.as_symbol().is_some() && args.len() > 1 => {
                let id = first.as_symbol().expect("checked symbol");
                (Some(self.interner.resolve(id).to_owned()), &args[1..])
            }
            _ => (None, args),
        };

        let Some(param_form) = rest.first() else {
            return Err(ValidationError::new("fn", "a parameter vector", "end of form", span).into());
        };
        let param_items = match param_form.as_list() {
            Some(items) if param_form.head_symbol() == Some(vector_id) => &items[1..],
            _ => return Err(ValidationError::new("fn", "a parameter vector", "non-vector", param_form.span).into()),
        };
        let param_list = pattern::parse_param_vector(param_items, self.interner)?;

        // Optional `-> ReturnType` between the params and the body.
        let mut body_forms = &rest[1..];
        if body_forms.len() >= 2 {
            let arrow = body_forms[0]
                .as_symbol()
                .map(|id| self.interner.resolve(id) == "->")
                .unwrap_or(false);
            if arrow && body_forms[1].as_symbol().is_some() {
                body_forms = &body_forms[2..];
            }
        }

        let (params, rest_param, mut prelude) = self.lower_params(&param_list)?;
        let saved_depth = std::mem::take(&mut self.do_depth);
        let body = self.lower_body(body_forms, true)?;
        self.do_depth = saved_depth;
        prelude.extend(body);
        let is_async = force_async || stmts_contain_await(&prelude);

        match name {
            Some(name) => {
                self.fn_functions.insert(name.clone());
                Ok(Lowered::Stmt(IrStmt::new(
                    IrStmtKind::FunctionDecl {
                        name,
                        params,
                        rest_param,
                        body: prelude,
                        is_async,
                        is_fn_variant: true,
                    },
                    span,
                )))
            }
            None => Ok(Lowered::Expr(IrExpr::new(
                IrExprKind::FunctionExpr {
                    name: None,
                    params,
                    rest_param,
                    body: prelude,
                    is_async,
                    is_arrow: false,
                },
                span,
            ))),
        }
    }

    /// `(=> [x y] body)` with explicit parameters, or `(=> body)` where
    /// `$0`, `$1`, ... bind implicitly. Sigil parameters bind locally:
    /// a nested arrow's sigils never leak outward.
    fn lower_arrow(&mut self, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        let vector_id = self.interner.intern("vector");
        let explicit_params = args
            .first()
            .is_some_and(|first| first.head_symbol() == Some(vector_id) && args.len() > 1);

        let (params, rest_param, mut prelude, body_forms): (Params, Option<String>, Vec<IrStmt>, &[Sexp]) =
            if explicit_params {
                let param_items = &args[0].as_list().expect("checked list")[1..];
                let param_list = pattern::parse_param_vector(param_items, self.interner)?;
                let (params, rest_param, prelude) = self.lower_params(&param_list)?;
                (params, rest_param, prelude, &args[1..])
            } else {
                let max = args.iter().map(|form| self.max_sigil_index(form)).max().flatten();
                let params: Params = match max {
                    Some(max) => (0..=max).map(|i| format!("${i}")).collect(),
                    None => SmallVec::new(),
                };
                (params, None, Vec::new(), args)
            };

        let saved_depth = std::mem::take(&mut self.do_depth);
        let body = self.lower_body(body_forms, true)?;
        self.do_depth = saved_depth;
        prelude.extend(body);
        let is_async = stmts_contain_await(&prelude);
        Ok(Lowered::Expr(IrExpr::new(
            IrExprKind::FunctionExpr {
                name: None,
                params,
                rest_param,
                body: prelude,
                is_async,
                is_arrow: true,
            },
            span,
        )))
    }

    /// Highest `$N` index in a form, not descending into nested arrows
    /// (their sigil params shadow).
    fn max_sigil_index(&self, form: &Sexp) -> Option<u32> {
        match &form.kind {
            SexpKind::Symbol(id) => crate::ast::sigils::sigil_param_index(self.interner.resolve(*id)),
            SexpKind::List(items) => {
                let head_is_arrow = form
                    .head_symbol()
                    .is_some_and(|id| self.interner.resolve(id) == "=>");
                if head_is_arrow {
                    return None;
                }
                items.iter().filter_map(|item| self.max_sigil_index(item)).max()
            }
            SexpKind::Literal(_) => None,
        }
    }

    /// Parameter list to IR: simple names pass through, compound patterns
    /// bind a fresh temporary destructured in the body prelude, defaults
    /// fill in when the argument arrives undefined.
    fn lower_params(&mut self, list: &ParamList) -> Result<(Params, Option<String>, Vec<IrStmt>), HqlError> {
        let mut params = Params::new();
        let mut prelude = Vec::new();
        for param in &list.params {
            match &param.pattern {
                Pattern::Ident { name, default, .. } => {
                    let name = self.interner.resolve(*name).to_owned();
                    if let Some(default) = default.clone().or_else(|| param.default.clone()) {
                        let default = self.lower_expr(&default)?;
                        prelude.push(default_fill(&name, default));
                    }
                    params.push(name);
                }
                compound => {
                    let temp = self.fresh_temp("p");
                    let init = IrExpr::ident(temp.clone(), None);
                    let declarators = self.destructure(compound, init)?;
                    prelude.push(IrStmt::new(
                        IrStmtKind::VarDecl {
                            kind: VarKind::Const,
                            declarations: declarators,
                        },
                        None,
                    ));
                    params.push(temp);
                }
            }
        }
        let rest = list.rest.map(|id| self.interner.resolve(id).to_owned());
        Ok((params, rest, prelude))
    }

    // =========================================================================
    // Bindings and destructuring
    // =========================================================================

    fn lower_binding(
        &mut self,
        args: &[Sexp],
        span: Option<Span>,
        kind: VarKind,
        form_name: &str,
    ) -> Result<Lowered, HqlError> {
        let target = require_arg(args, 0, form_name, "2", span)?;
        let value = require_arg(args, 1, form_name, "2", span)?;
        let init = self.lower_expr(value)?;
        let pattern = pattern::parse_pattern(target, self.interner)?;
        let declarations = self.destructure(&pattern, init)?;
        Ok(Lowered::Stmt(IrStmt::new(
            IrStmtKind::VarDecl { kind, declarations },
            span,
        )))
    }

    /// `(let name value)` declares; `(let [a 1 b 2] body...)` scopes the
    /// bindings inside an immediately-invoked block and evaluates to the
    /// body's last expression.
    fn lower_let(&mut self, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        let vector_id = self.interner.intern("vector");
        let binding_vector = args.first().is_some_and(|first| first.head_symbol() == Some(vector_id));
        if !binding_vector {
            return self.lower_binding(args, span, VarKind::Let, "let");
        }

        let binding_items = &args[0].as_list().expect("checked list")[1..];
        if !binding_items.len().is_multiple_of(2) {
            return Err(ValidationError::new(
                "let",
                "an even number of binding forms",
                format!("{} form(s)", binding_items.len()),
                args[0].span,
            )
            .into());
        }

        let mut body = Vec::new();
        for pair in binding_items.chunks_exact(2) {
            let init = self.lower_expr(&pair[1])?;
            let pattern = pattern::parse_pattern(&pair[0], self.interner)?;
            let declarations = self.destructure(&pattern, init)?;
            body.push(IrStmt::new(
                IrStmtKind::VarDecl {
                    kind: VarKind::Const,
                    declarations,
                },
                pair[0].span,
            ));
        }
        let tail = self.lower_body(&args[1..], true)?;
        body.extend(tail);
        let is_async = stmts_contain_await(&body);
        let call = iife(body, is_async, span);
        Ok(Lowered::Expr(if is_async {
            IrExpr::new(IrExprKind::Await(Box::new(call)), span)
        } else {
            call
        }))
    }

    /// Flattens a pattern into declarators. Compound sub-patterns bind a
    /// fresh temporary so each leaf name gets exactly one declarator.
    fn destructure(&mut self, pattern: &Pattern, init: IrExpr) -> Result<Vec<Declarator>, HqlError> {
        let mut declarations = Vec::new();
        self.destructure_into(pattern, init, &mut declarations)?;
        Ok(declarations)
    }

    fn destructure_into(
        &mut self,
        pattern: &Pattern,
        init: IrExpr,
        out: &mut Vec<Declarator>,
    ) -> Result<(), HqlError> {
        match pattern {
            Pattern::Ident { name, default, .. } => {
                let name = self.interner.resolve(*name).to_owned();
                let init = match default {
                    Some(default) => {
                        let default = self.lower_expr(default)?;
                        defaulted(init, default)
                    }
                    None => init,
                };
                out.push(Declarator {
                    name,
                    init: Some(init),
                });
            }
            Pattern::Rest { name } => {
                let name = self.interner.resolve(*name).to_owned();
                out.push(Declarator {
                    name,
                    init: Some(init),
                });
            }
            Pattern::Array { elements, rest } => {
                let source = self.bind_temp(init, "d", out);
                for (index, element) in elements.iter().enumerate() {
                    let Some(element) = element else { continue };
                    let item = IrExpr::new(
                        IrExprKind::Member {
                            object: Box::new(source.clone()),
                            property: MemberProp::Computed(Box::new(IrExpr::new(
                                IrExprKind::Num(JsNumber::Int(i64::try_from(index).expect("pattern index fits i64"))),
                                None,
                            ))),
                        },
                        None,
                    );
                    self.destructure_into(element, item, out)?;
                }
                if let Some(rest) = rest {
                    let sliced = IrExpr::new(
                        IrExprKind::CallMember {
                            object: Box::new(source),
                            method: "slice".to_owned(),
                            args: vec![IrExpr::new(
                                IrExprKind::Num(JsNumber::Int(
                                    i64::try_from(elements.len()).expect("pattern length fits i64"),
                                )),
                                None,
                            )],
                        },
                        None,
                    );
                    self.destructure_into(rest, sliced, out)?;
                }
            }
            Pattern::Object { entries, rest } => {
                let source = self.bind_temp(init, "d", out);
                let mut taken = Vec::new();
                for entry in entries {
                    let key = self.interner.resolve(entry.key).to_owned();
                    taken.push(key.clone());
                    let item = IrExpr::new(
                        IrExprKind::Member {
                            object: Box::new(source.clone()),
                            property: MemberProp::Static(key),
                        },
                        None,
                    );
                    let item = match &entry.default {
                        Some(default) => {
                            let default = self.lower_expr(default)?;
                            defaulted(item, default)
                        }
                        None => item,
                    };
                    self.destructure_into(&entry.binding, item, out)?;
                }
                if let Some(rest) = rest {
                    // Shallow copy minus the taken keys.
                    let name = self.interner.resolve(*rest).to_owned();
                    let copy = IrExpr::new(
                        IrExprKind::CallMember {
                            object: Box::new(IrExpr::js_ident("Object", None)),
                            method: "assign".to_owned(),
                            args: vec![IrExpr::new(IrExprKind::ObjectLit(Vec::new()), None), source],
                        },
                        None,
                    );
                    let temp = self.bind_temp(copy, "r", out);
                    for key in taken {
                        out.push(Declarator {
                            name: self.fresh_temp("void"),
                            init: Some(IrExpr::new(
                                IrExprKind::Unary {
                                    op: UnaryOp::Not,
                                    operand: Box::new(IrExpr::new(
                                        IrExprKind::Call {
                                            callee: Box::new(IrExpr::js_ident("Reflect.deleteProperty", None)),
                                            args: vec![
                                                temp.clone(),
                                                IrExpr::new(IrExprKind::Str(key), None),
                                            ],
                                        },
                                        None,
                                    )),
                                },
                                None,
                            )),
                        });
                    }
                    out.push(Declarator {
                        name,
                        init: Some(temp),
                    });
                }
            }
        }
        Ok(())
    }

    /// Binds `init` to a fresh temporary declarator unless it is already a
    /// plain identifier, and returns the expression to read it back.
    fn bind_temp(&mut self, init: IrExpr, prefix: &str, out: &mut Vec<Declarator>) -> IrExpr {
        if matches!(init.kind, IrExprKind::Identifier { .. }) {
            return init;
        }
        let temp = self.fresh_temp(prefix);
        out.push(Declarator {
            name: temp.clone(),
            init: Some(init),
        });
        IrExpr::ident(temp, None)
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    /// Statement sequence for a body; the last form becomes the value via
    /// `return` when `implicit_return` is set.
    fn lower_body(&mut self, forms: &[Sexp], implicit_return: bool) -> Result<Vec<IrStmt>, HqlError> {
        let mut body = Vec::with_capacity(forms.len());
        for (index, form) in forms.iter().enumerate() {
            let lowered = self.lower_form(form)?;
            let is_last = index + 1 == forms.len();
            if is_last && implicit_return {
                match lowered {
                    Lowered::Expr(expr) => {
                        let span = expr.span;
                        body.push(IrStmt::new(IrStmtKind::Return(Some(expr)), span));
                    }
                    Lowered::Stmt(stmt) => body.push(stmt),
                }
            } else {
                body.push(lowered.into_stmt());
            }
        }
        Ok(body)
    }

    /// `(do e1 ... en)` → zero-arg IIFE returning the last expression.
    ///
    /// A `do` of a single expression lowers to that expression directly.
    /// An early `return` inside the block becomes a distinguished throw
    /// carrying the depth, caught by the IIFE of the matching level, so
    /// control returns to the innermost enclosing block rather than the
    /// outer function.
    fn lower_do(&mut self, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        if args.len() == 1 {
            return self.lower_form(&args[0]);
        }
        self.do_depth += 1;
        self.do_return_used.push(false);
        let depth = self.do_depth;
        let body = self.lower_body(args, true);
        let used_return = self.do_return_used.pop().unwrap_or(false);
        self.do_depth -= 1;
        let mut body = body?;

        if used_return {
            let param = "__hql_e".to_owned();
            let marker = IrExpr::new(
                IrExprKind::Member {
                    object: Box::new(IrExpr::js_ident(param.clone(), span)),
                    property: MemberProp::Static("__hql_do".to_owned()),
                },
                span,
            );
            let test = IrExpr::new(
                IrExprKind::Binary {
                    op: BinaryOp::And,
                    left: Box::new(IrExpr::js_ident(param.clone(), span)),
                    right: Box::new(IrExpr::new(
                        IrExprKind::Binary {
                            op: BinaryOp::StrictEq,
                            left: Box::new(marker),
                            right: Box::new(IrExpr::new(IrExprKind::Num(JsNumber::Int(i64::from(depth))), span)),
                        },
                        span,
                    )),
                },
                span,
            );
            let value = IrExpr::new(
                IrExprKind::Member {
                    object: Box::new(IrExpr::js_ident(param.clone(), span)),
                    property: MemberProp::Static("value".to_owned()),
                },
                span,
            );
            let handler = CatchClause {
                param,
                param_type: None,
                body: vec![IrStmt::new(
                    IrStmtKind::If {
                        test,
                        consequent: vec![IrStmt::new(IrStmtKind::Return(Some(value)), span)],
                        alternate: Some(vec![IrStmt::new(
                            IrStmtKind::Throw(IrExpr::js_ident("__hql_e", span)),
                            span,
                        )]),
                    },
                    span,
                )],
            };
            body = vec![IrStmt::new(
                IrStmtKind::Try {
                    block: body,
                    handler: Some(handler),
                    finalizer: None,
                },
                span,
            )];
        }

        let is_async = stmts_contain_await(&body);
        let call = iife(body, is_async, span);
        Ok(Lowered::Expr(if is_async {
            IrExpr::new(IrExprKind::Await(Box::new(call)), span)
        } else {
            call
        }))
    }

    fn make_return(&mut self, value: Option<IrExpr>, span: Option<Span>) -> IrStmt {
        if self.do_depth > 0 {
            if let Some(flag) = self.do_return_used.last_mut() {
                *flag = true;
            }
            let payload = IrExpr::new(
                IrExprKind::ObjectLit(vec![
                    (
                        ObjectKey::Ident("__hql_do".to_owned()),
                        IrExpr::new(IrExprKind::Num(JsNumber::Int(i64::from(self.do_depth))), span),
                    ),
                    (
                        ObjectKey::Ident("value".to_owned()),
                        value.unwrap_or_else(|| IrExpr::null(span)),
                    ),
                ]),
                span,
            );
            return IrStmt::new(IrStmtKind::Throw(payload), span);
        }
        IrStmt::new(IrStmtKind::Return(value), span)
    }

    /// `(try body... (catch e h...) (finally f...))` → IIFE over a try
    /// statement, async when anything under it awaits.
    fn lower_try(&mut self, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        let catch_id = self.interner.intern("catch");
        let finally_id = self.interner.intern("finally");

        let mut body_forms: &[Sexp] = args;
        let mut handler = None;
        let mut finalizer = None;

        if let Some(last) = body_forms.last() {
            if last.head_symbol() == Some(finally_id) {
                let clauses = &last.as_list().expect("checked list")[1..];
                finalizer = Some(self.lower_body(clauses, false)?);
                body_forms = &body_forms[..body_forms.len() - 1];
            }
        }
        if let Some(last) = body_forms.last() {
            if last.head_symbol() == Some(catch_id) {
                let clause = last.as_list().expect("checked list");
                let param_form = clause.get(1).ok_or_else(|| {
                    ValidationError::new("catch", "a parameter", "end of clause", last.span)
                })?;
                let (param, param_type) = self.catch_param(param_form)?;
                let saved = self.in_class_method;
                let body = self.lower_body(&clause[2..], true)?;
                self.in_class_method = saved;
                handler = Some(CatchClause {
                    param,
                    param_type,
                    body,
                });
                body_forms = &body_forms[..body_forms.len() - 1];
            }
        }

        let block = self.lower_body(body_forms, true)?;
        let is_async = stmts_contain_await(&block)
            || handler.as_ref().is_some_and(|h| stmts_contain_await(&h.body))
            || finalizer.as_deref().is_some_and(stmts_contain_await);

        let try_stmt = IrStmt::new(
            IrStmtKind::Try {
                block,
                handler,
                finalizer,
            },
            span,
        );
        let call = iife(vec![try_stmt], is_async, span);
        Ok(Lowered::Expr(if is_async {
            IrExpr::new(IrExprKind::Await(Box::new(call)), span)
        } else {
            call
        }))
    }

    /// `e` or `e: Type` in a catch clause.
    fn catch_param(&mut self, form: &Sexp) -> Result<(String, Option<String>), HqlError> {
        let id = form
            .as_symbol()
            .ok_or_else(|| ValidationError::new("catch", "a parameter name", "non-symbol", form.span))?;
        let raw = self.interner.resolve(id).to_owned();
        match raw.split_once(':') {
            Some((name, ty)) if !name.is_empty() && !ty.is_empty() => {
                Ok((name.to_owned(), Some(ty.to_owned())))
            }
            _ => Ok((raw, None)),
        }
    }

    /// `(loop [i 0 acc 1] body...)` → IIFE over `let` bindings and
    /// `while (true)`; the body's last expression returns out of the loop
    /// and `recur` reassigns the bindings and continues.
    fn lower_loop(&mut self, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        let vector_id = self.interner.intern("vector");
        let binding_form = require_arg(args, 0, "loop", ">=1", span)?;
        let binding_items = match binding_form.as_list() {
            Some(items) if binding_form.head_symbol() == Some(vector_id) => &items[1..],
            _ => return Err(ValidationError::new("loop", "a binding vector", "non-vector", binding_form.span).into()),
        };
        if !binding_items.len().is_multiple_of(2) {
            return Err(ValidationError::new(
                "loop",
                "an even number of binding forms",
                format!("{} form(s)", binding_items.len()),
                binding_form.span,
            )
            .into());
        }

        let mut names = Vec::with_capacity(binding_items.len() / 2);
        let mut declarations = Vec::with_capacity(binding_items.len() / 2);
        for pair in binding_items.chunks_exact(2) {
            let name_id = pair[0]
                .as_symbol()
                .ok_or_else(|| ValidationError::new("loop", "a binding name", "non-symbol", pair[0].span))?;
            let name = self.interner.resolve(name_id).to_owned();
            let init = self.lower_expr(&pair[1])?;
            names.push(name.clone());
            declarations.push(Declarator {
                name,
                init: Some(init),
            });
        }

        self.loop_bindings.push(names);
        let body = self.lower_loop_body(&args[1..]);
        self.loop_bindings.pop();
        let body = body?;

        let mut outer = vec![IrStmt::new(
            IrStmtKind::VarDecl {
                kind: VarKind::Let,
                declarations,
            },
            span,
        )];
        outer.push(IrStmt::new(
            IrStmtKind::While {
                test: IrExpr::new(IrExprKind::Bool(true), span),
                body,
            },
            span,
        ));
        let is_async = stmts_contain_await(&outer);
        let call = iife(outer, is_async, span);
        Ok(Lowered::Expr(if is_async {
            IrExpr::new(IrExprKind::Await(Box::new(call)), span)
        } else {
            call
        }))
    }

    /// Loop bodies lower their tail in statement position so `recur` can
    /// become a bare `continue` instead of escaping into an expression
    /// IIFE (where `continue` would be illegal).
    fn lower_loop_body(&mut self, forms: &[Sexp]) -> Result<Vec<IrStmt>, HqlError> {
        let mut body = Vec::with_capacity(forms.len());
        for (index, form) in forms.iter().enumerate() {
            if index + 1 == forms.len() {
                body.extend(self.lower_tail_stmts(form)?);
            } else {
                body.push(self.lower_form(form)?.into_stmt());
            }
        }
        Ok(body)
    }

    /// Lowers a form in loop-tail position: `if` becomes an if statement
    /// whose branches recurse, `do` flattens, `recur` stays a statement,
    /// and anything else returns its value out of the loop.
    fn lower_tail_stmts(&mut self, form: &Sexp) -> Result<Vec<IrStmt>, HqlError> {
        if let Some(items) = form.as_list() {
            let head = form
                .head_symbol()
                .map(|id| self.interner.resolve(id).to_owned())
                .unwrap_or_default();
            match head.as_str() {
                "recur" => {
                    let lowered = self.lower_recur(&items[1..], form.span)?;
                    return Ok(vec![lowered.into_stmt()]);
                }
                "if" | "?" if items.len() >= 3 => {
                    let test = self.lower_expr(&items[1])?;
                    let consequent = self.lower_tail_stmts(&items[2])?;
                    let alternate = match items.get(3) {
                        Some(alt) => Some(self.lower_tail_stmts(alt)?),
                        None => Some(vec![IrStmt::new(
                            IrStmtKind::Return(Some(IrExpr::null(form.span))),
                            form.span,
                        )]),
                    };
                    return Ok(vec![IrStmt::new(
                        IrStmtKind::If {
                            test,
                            consequent,
                            alternate,
                        },
                        form.span,
                    )]);
                }
                "do" => {
                    let mut body = Vec::new();
                    for (index, inner) in items[1..].iter().enumerate() {
                        if index + 1 == items.len() - 1 {
                            body.extend(self.lower_tail_stmts(inner)?);
                        } else {
                            body.push(self.lower_form(inner)?.into_stmt());
                        }
                    }
                    return Ok(body);
                }
                _ => {}
            }
        }
        match self.lower_form(form)? {
            Lowered::Expr(expr) => {
                let span = expr.span;
                Ok(vec![IrStmt::new(IrStmtKind::Return(Some(expr)), span)])
            }
            Lowered::Stmt(stmt) => Ok(vec![stmt]),
        }
    }

    /// `(recur e...)` → reassign the loop bindings through temporaries
    /// (so earlier reassignments cannot leak into later operands) and
    /// `continue`.
    fn lower_recur(&mut self, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        let Some(names) = self.loop_bindings.last().cloned() else {
            return Err(ValidationError::new("recur", "an enclosing loop", "no loop in scope", span).into());
        };
        if names.len() != args.len() {
            return Err(ValidationError::new(
                "recur",
                format!("{} argument(s)", names.len()),
                args.len().to_string(),
                span,
            )
            .into());
        }

        let mut stmts = Vec::with_capacity(names.len() * 2 + 1);
        let mut temps = Vec::with_capacity(names.len());
        for (name, arg) in names.iter().zip(args) {
            let value = self.lower_expr(arg)?;
            let temp = self.fresh_temp("r");
            stmts.push(IrStmt::new(
                IrStmtKind::VarDecl {
                    kind: VarKind::Const,
                    declarations: vec![Declarator {
                        name: temp.clone(),
                        init: Some(value),
                    }],
                },
                span,
            ));
            temps.push((name.clone(), temp));
        }
        for (name, temp) in temps {
            stmts.push(IrStmt::new(
                IrStmtKind::ExprStmt(IrExpr::new(
                    IrExprKind::Assign {
                        target: Box::new(IrExpr::ident(name, span)),
                        value: Box::new(IrExpr::ident(temp, span)),
                    },
                    span,
                )),
                span,
            ));
        }
        stmts.push(IrStmt::new(IrStmtKind::Continue, span));
        Ok(Lowered::Stmt(IrStmt::new(IrStmtKind::Block(stmts), span)))
    }

    // =========================================================================
    // Classes and enums
    // =========================================================================

    fn lower_class(&mut self, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        let name_form = require_arg(args, 0, "class", ">=1", span)?;
        let name_id = name_form
            .as_symbol()
            .ok_or_else(|| ValidationError::new("class", "a class name", "non-symbol", name_form.span))?;
        let name = self.interner.resolve(name_id).to_owned();

        let vector_id = self.interner.intern("vector");
        let mut fields = Vec::new();
        let mut constructor = None;
        let mut methods = Vec::new();

        for member in &args[1..] {
            let Some(member_items) = member.as_list() else {
                return Err(ValidationError::new("class", "a member form", "non-list member", member.span).into());
            };
            let head = member
                .head_symbol()
                .map(|id| self.interner.resolve(id).to_owned())
                .unwrap_or_default();
            match head.as_str() {
                "var" | "let" | "def" | "const" => {
                    let field_name_form = member_items.get(1).ok_or_else(|| {
                        ValidationError::new("class", "a field name", "end of member", member.span)
                    })?;
                    let field_id = field_name_form.as_symbol().ok_or_else(|| {
                        ValidationError::new("class", "a field name", "non-symbol", field_name_form.span)
                    })?;
                    let init = match member_items.get(2) {
                        Some(form) => Some(self.lower_expr(form)?),
                        None => None,
                    };
                    fields.push(ClassField {
                        name: self.interner.resolve(field_id).to_owned(),
                        is_static: false,
                        init,
                    });
                }
                "constructor" => {
                    let method = self.lower_class_callable("constructor", &member_items[1..], member.span, vector_id)?;
                    constructor = Some(method);
                }
                "fn" | "method" => {
                    let method_name_form = member_items.get(1).ok_or_else(|| {
                        ValidationError::new("class", "a method name", "end of member", member.span)
                    })?;
                    let method_id = method_name_form.as_symbol().ok_or_else(|| {
                        ValidationError::new("class", "a method name", "non-symbol", method_name_form.span)
                    })?;
                    let method_name = self.interner.resolve(method_id).to_owned();
                    let mut method =
                        self.lower_class_callable(&method_name, &member_items[2..], member.span, vector_id)?;
                    method.name = method_name;
                    methods.push(method);
                }
                other => {
                    return Err(ValidationError::new(
                        "class",
                        "a field, constructor, or method",
                        format!("'{other}'"),
                        member.span,
                    )
                    .into());
                }
            }
        }

        Ok(Lowered::Stmt(IrStmt::new(
            IrStmtKind::ClassDecl {
                name,
                fields,
                constructor,
                methods,
            },
            span,
        )))
    }

    /// Shared lowering for constructors and methods: `[params] body...`
    /// with `self` bound to the receiver.
    fn lower_class_callable(
        &mut self,
        name: &str,
        rest: &[Sexp],
        span: Option<Span>,
        vector_id: StringId,
    ) -> Result<ClassMethod, HqlError> {
        let param_form = rest
            .first()
            .ok_or_else(|| ValidationError::new(name, "a parameter vector", "end of member", span))?;
        let param_items = match param_form.as_list() {
            Some(items) if param_form.head_symbol() == Some(vector_id) => &items[1..],
            _ => return Err(ValidationError::new(name, "a parameter vector", "non-vector", param_form.span).into()),
        };
        let param_list = pattern::parse_param_vector(param_items, self.interner)?;
        let (params, rest_param, mut prelude) = self.lower_params(&param_list)?;

        let saved = self.in_class_method;
        self.in_class_method = true;
        let saved_depth = std::mem::take(&mut self.do_depth);
        let body = self.lower_body(&rest[1..], name != "constructor");
        self.do_depth = saved_depth;
        self.in_class_method = saved;
        prelude.extend(body?);

        let is_async = stmts_contain_await(&prelude);
        Ok(ClassMethod {
            name: name.to_owned(),
            params,
            rest_param,
            body: prelude,
            is_async,
            is_static: false,
        })
    }

    fn lower_enum(&mut self, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        let name_form = require_arg(args, 0, "enum", ">=1", span)?;
        let name_id = name_form
            .as_symbol()
            .ok_or_else(|| ValidationError::new("enum", "an enum name", "non-symbol", name_form.span))?;
        let name = self.interner.resolve(name_id).to_owned();

        let case_id = self.interner.intern("case");
        let mut cases = Vec::new();
        for case_form in &args[1..] {
            let Some(items) = case_form.as_list() else {
                return Err(ValidationError::new("enum", "a case form", "non-list case", case_form.span).into());
            };
            if case_form.head_symbol() != Some(case_id) {
                return Err(ValidationError::new("enum", "(case name ...)", "unknown member", case_form.span).into());
            }
            let case_name_form = items
                .get(1)
                .ok_or_else(|| ValidationError::new("case", "a case name", "end of case", case_form.span))?;
            let case_name_id = case_name_form
                .as_symbol()
                .ok_or_else(|| ValidationError::new("case", "a case name", "non-symbol", case_name_form.span))?;
            let case_name = self.interner.resolve(case_name_id).to_owned();

            let payload = &items[2..];
            let all_symbols = !payload.is_empty() && payload.iter().all(|p| p.as_symbol().is_some());
            if all_symbols {
                let params = payload
                    .iter()
                    .map(|p| self.interner.resolve(p.as_symbol().expect("checked symbol")).to_owned())
                    .collect();
                cases.push(EnumCase {
                    name: case_name,
                    raw: None,
                    params,
                });
            } else if let Some(raw_form) = payload.first() {
                let raw = self.lower_expr(raw_form)?;
                cases.push(EnumCase {
                    name: case_name,
                    raw: Some(raw),
                    params: Params::new(),
                });
            } else {
                cases.push(EnumCase {
                    name: case_name,
                    raw: None,
                    params: Params::new(),
                });
            }
        }

        let has_associated = cases.iter().any(|case| !case.params.is_empty());
        Ok(Lowered::Stmt(IrStmt::new(
            IrStmtKind::EnumDecl {
                name,
                cases,
                has_associated,
            },
            span,
        )))
    }

    // =========================================================================
    // Imports and exports
    // =========================================================================

    /// `(import [a b] from "./x.hql")` named, `(import ns from "./x.hql")`
    /// namespace. The emitted specifier is rewritten so compiled modules
    /// import their compiled neighbors.
    fn lower_import(&mut self, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        let from_id = self.interner.intern("from");
        let vector_id = self.interner.intern("vector");
        let target = require_arg(args, 0, "import", "3", span)?;
        let from_kw = require_arg(args, 1, "import", "3", span)?;
        let source_form = require_arg(args, 2, "import", "3", span)?;

        if from_kw.as_symbol() != Some(from_id) {
            return Err(ValidationError::new("import", "'from' keyword", "missing 'from'", from_kw.span).into());
        }
        let Some(Literal::Str(source)) = source_form.as_literal() else {
            return Err(ValidationError::new("import", "a string module path", "non-string", source_form.span).into());
        };

        let emitted_source = self.emitted_import_source(source);
        if let Some(items) = target.as_list() {
            if target.head_symbol() != Some(vector_id) {
                return Err(ValidationError::new("import", "a symbol vector", "non-vector list", target.span).into());
            }
            // `[a b]` imports names as themselves; `[a as b]` renames.
            let as_id = self.interner.intern("as");
            let mut specifiers = Vec::with_capacity(items.len() - 1);
            let mut iter = items[1..].iter().peekable();
            while let Some(item) = iter.next() {
                let id = item
                    .as_symbol()
                    .ok_or_else(|| ValidationError::new("import", "imported symbols", "non-symbol", item.span))?;
                let imported = self.interner.resolve(id).to_owned();
                let local = if iter.peek().is_some_and(|next| next.is_symbol(as_id)) {
                    iter.next();
                    let local_form = iter.next().ok_or_else(|| {
                        ValidationError::new("import", "a local name after 'as'", "end of vector", item.span)
                    })?;
                    let local_id = local_form.as_symbol().ok_or_else(|| {
                        ValidationError::new("import", "a local name after 'as'", "non-symbol", local_form.span)
                    })?;
                    self.interner.resolve(local_id).to_owned()
                } else {
                    imported.clone()
                };
                specifiers.push(ImportSpecifier { imported, local });
            }
            return Ok(Lowered::Stmt(IrStmt::new(
                IrStmtKind::ImportDecl {
                    specifiers,
                    namespace: None,
                    source: emitted_source,
                },
                span,
            )));
        }

        let id = target
            .as_symbol()
            .ok_or_else(|| ValidationError::new("import", "a namespace name or symbol vector", "literal", target.span))?;
        Ok(Lowered::Stmt(IrStmt::new(
            IrStmtKind::ImportDecl {
                specifiers: Vec::new(),
                namespace: Some(self.interner.resolve(id).to_owned()),
                source: emitted_source,
            },
            span,
        )))
    }

    /// Compiled modules import compiled neighbors: a relative specifier
    /// that resolves to an HQL file swaps its extension for `.js`; a bare
    /// relative specifier that resolves via extension completion or a
    /// directory index gets the completed path. External specifiers pass
    /// through verbatim.
    fn emitted_import_source(&self, source: &str) -> String {
        if resolve::is_external_specifier(source) || !source.starts_with('.') {
            return source.to_owned();
        }
        if let Some(stem) = source.strip_suffix(".hql") {
            return format!("{stem}.js");
        }
        let importing_file = self.current_dir.join("__importer__.hql");
        if let Some(resolved) = resolve::resolve_import_path(source, &importing_file, &[]) {
            if resolved.extension().and_then(|e| e.to_str()) == Some("hql") {
                if resolved.file_stem().and_then(|s| s.to_str()) == Some("index")
                    && !source.ends_with("/index")
                {
                    return format!("{}/index.js", source.trim_end_matches('/'));
                }
                return format!("{source}.js");
            }
        }
        source.to_owned()
    }

    /// `(export [a b])` named, `(export [a b] from "./m.hql")` re-export,
    /// `(export name expr)` export-with-declaration, `(export default e)`.
    fn lower_export(&mut self, args: &[Sexp], span: Option<Span>) -> Result<Lowered, HqlError> {
        let vector_id = self.interner.intern("vector");
        let from_id = self.interner.intern("from");
        let default_id = self.interner.intern("default");
        let target = require_arg(args, 0, "export", ">=1", span)?;

        if target.head_symbol() == Some(vector_id) {
            let items = &target.as_list().expect("checked list")[1..];
            let mut specifiers = Vec::with_capacity(items.len());
            for item in items {
                let id = item
                    .as_symbol()
                    .ok_or_else(|| ValidationError::new("export", "exported symbols", "non-symbol", item.span))?;
                let name = self.interner.resolve(id).to_owned();
                specifiers.push((name.clone(), name));
            }
            let source = match (args.get(1), args.get(2)) {
                (Some(kw), Some(source_form)) if kw.as_symbol() == Some(from_id) => {
                    let Some(Literal::Str(source)) = source_form.as_literal() else {
                        return Err(ValidationError::new(
                            "export",
                            "a string module path",
                            "non-string",
                            source_form.span,
                        )
                        .into());
                    };
                    Some(self.emitted_import_source(source))
                }
                _ => None,
            };
            return Ok(Lowered::Stmt(IrStmt::new(
                IrStmtKind::ExportNamed { specifiers, source },
                span,
            )));
        }

        if target.as_symbol() == Some(default_id) {
            let value = require_arg(args, 1, "export", "2", span)?;
            let value = self.lower_expr(value)?;
            return Ok(Lowered::Stmt(IrStmt::new(IrStmtKind::ExportDefault(value), span)));
        }

        let name_id = target
            .as_symbol()
            .ok_or_else(|| ValidationError::new("export", "a name, vector, or 'default'", "literal", target.span))?;
        let value = require_arg(args, 1, "export", "2", span)?;
        let init = self.lower_expr(value)?;
        let decl = IrStmt::new(
            IrStmtKind::VarDecl {
                kind: VarKind::Const,
                declarations: vec![Declarator {
                    name: self.interner.resolve(name_id).to_owned(),
                    init: Some(init),
                }],
            },
            span,
        );
        Ok(Lowered::Stmt(IrStmt::new(IrStmtKind::ExportVarDecl(Box::new(decl)), span)))
    }
}

// =============================================================================
// Free helpers
// =============================================================================

fn lower_literal(lit: &Literal, span: Option<Span>) -> IrExpr {
    let kind = match lit {
        Literal::Nil => IrExprKind::Null,
        Literal::Bool(b) => IrExprKind::Bool(*b),
        Literal::Int(n) => IrExprKind::Num(JsNumber::Int(*n)),
        Literal::Float(x) => IrExprKind::Num(JsNumber::Float(*x)),
        Literal::Str(s) => IrExprKind::Str(s.clone()),
        Literal::BigInt(digits) => IrExprKind::BigInt(digits.clone()),
    };
    IrExpr::new(kind, span)
}

/// `js/a.b.c` → member chain rooted at a host identifier.
fn js_path_expr(path: &str, span: Option<Span>) -> IrExpr {
    let mut parts = path.split('.');
    let first = parts.next().expect("js path has a first part");
    let mut expr = IrExpr::js_ident(first, span);
    for segment in parts {
        expr = IrExpr::new(
            IrExprKind::Member {
                object: Box::new(expr),
                property: MemberProp::Static(segment.to_owned()),
            },
            span,
        );
    }
    expr
}

/// A zero-arg function expression invoked immediately.
fn iife(body: Vec<IrStmt>, is_async: bool, span: Option<Span>) -> IrExpr {
    let function = IrExpr::new(
        IrExprKind::FunctionExpr {
            name: None,
            params: Params::new(),
            rest_param: None,
            body,
            is_async,
            is_arrow: false,
        },
        span,
    );
    IrExpr::new(
        IrExprKind::Call {
            callee: Box::new(function),
            args: Vec::new(),
        },
        span,
    )
}

/// `value === undefined ? default : value`.
fn defaulted(value: IrExpr, default: IrExpr) -> IrExpr {
    let span = value.span;
    IrExpr::new(
        IrExprKind::Conditional {
            test: Box::new(IrExpr::new(
                IrExprKind::Binary {
                    op: BinaryOp::StrictEq,
                    left: Box::new(value.clone()),
                    right: Box::new(IrExpr::js_ident("undefined", span)),
                },
                span,
            )),
            consequent: Box::new(default),
            alternate: Box::new(value),
        },
        span,
    )
}

/// `name = name === undefined ? default : name;` for parameter defaults.
fn default_fill(name: &str, default: IrExpr) -> IrStmt {
    let read = IrExpr::ident(name, None);
    IrStmt::new(
        IrStmtKind::ExprStmt(IrExpr::new(
            IrExprKind::Assign {
                target: Box::new(read.clone()),
                value: Box::new(defaulted(read, default)),
            },
            None,
        )),
        None,
    )
}

fn require_arg<'a>(
    args: &'a [Sexp],
    index: usize,
    form: &str,
    expected: &str,
    span: Option<Span>,
) -> Result<&'a Sexp, HqlError> {
    args.get(index).ok_or_else(|| {
        HqlError::Validation(ValidationError::new(
            form,
            format!("{expected} argument(s)"),
            args.len().to_string(),
            span,
        ))
    })
}
