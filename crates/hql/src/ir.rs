//! The intermediate representation the lowerer produces.
//!
//! The IR mirrors JavaScript's shapes - expressions and statements are
//! separate tagged trees - plus two synthetic expression nodes for host
//! interop ([`IrExprKind::InteropIife`], [`IrExprKind::JsMethodAccess`]).
//! The expression/statement split makes the statement-position invariant
//! structural: an expression can only enter a program body through
//! [`Lowered::into_stmt`], which wraps it in an expression statement.

use smallvec::SmallVec;
use strum::IntoStaticStr;

use crate::ast::Span;

/// Parameter names of a function-like node.
pub type Params = SmallVec<[String; 4]>;

/// Binary operators, serialized exactly as emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Rem,
    #[strum(serialize = "===")]
    StrictEq,
    #[strum(serialize = "!==")]
    StrictNeq,
    #[strum(serialize = "==")]
    LooseEq,
    #[strum(serialize = "!=")]
    LooseNeq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "instanceof")]
    InstanceOf,
    #[strum(serialize = "in")]
    In,
}

/// Unary operators, serialized exactly as emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "typeof")]
    TypeOf,
}

/// A numeric literal, preserving the int/float distinction for emission.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum JsNumber {
    Int(i64),
    Float(f64),
}

/// An object-literal key.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ObjectKey {
    Ident(String),
    Str(String),
    Computed(Box<IrExpr>),
}

/// A member-access property.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MemberProp {
    Static(String),
    Computed(Box<IrExpr>),
}

/// An IR expression with its source span.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IrExpr {
    pub span: Option<Span>,
    pub kind: IrExprKind,
}

impl IrExpr {
    #[must_use]
    pub fn new(kind: IrExprKind, span: Option<Span>) -> Self {
        Self { span, kind }
    }

    /// A plain (non-host) identifier.
    #[must_use]
    pub fn ident(name: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(
            IrExprKind::Identifier {
                name: name.into(),
                is_js: false,
            },
            span,
        )
    }

    /// A host identifier, emitted verbatim without name mangling.
    #[must_use]
    pub fn js_ident(name: impl Into<String>, span: Option<Span>) -> Self {
        Self::new(
            IrExprKind::Identifier {
                name: name.into(),
                is_js: true,
            },
            span,
        )
    }

    #[must_use]
    pub fn null(span: Option<Span>) -> Self {
        Self::new(IrExprKind::Null, span)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum IrExprKind {
    Str(String),
    Num(JsNumber),
    Bool(bool),
    Null,
    BigInt(String),
    Identifier {
        name: String,
        /// Host names are emitted verbatim; HQL names are sanitized.
        is_js: bool,
    },
    Member {
        object: Box<IrExpr>,
        property: MemberProp,
    },
    Call {
        callee: Box<IrExpr>,
        args: Vec<IrExpr>,
    },
    CallMember {
        object: Box<IrExpr>,
        method: String,
        args: Vec<IrExpr>,
    },
    New {
        callee: Box<IrExpr>,
        args: Vec<IrExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<IrExpr>,
        right: Box<IrExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<IrExpr>,
    },
    Conditional {
        test: Box<IrExpr>,
        consequent: Box<IrExpr>,
        alternate: Box<IrExpr>,
    },
    ArrayLit(Vec<IrExpr>),
    ObjectLit(Vec<(ObjectKey, IrExpr)>),
    FunctionExpr {
        name: Option<String>,
        params: Params,
        rest_param: Option<String>,
        body: Vec<IrStmt>,
        is_async: bool,
        is_arrow: bool,
    },
    Assign {
        target: Box<IrExpr>,
        value: Box<IrExpr>,
    },
    Await(Box<IrExpr>),
    TemplateLit {
        /// Always `exprs.len() + 1` string parts.
        quasis: Vec<String>,
        exprs: Vec<IrExpr>,
    },
    /// Deferred `obj.prop` access wrapped in an IIFE so surrounding
    /// lowerings can still rewrite the access into a call.
    InteropIife {
        object: Box<IrExpr>,
        property: String,
    },
    /// An object/method pair kept apart for later call rewriting.
    JsMethodAccess {
        object: Box<IrExpr>,
        method: String,
    },
}

/// Declaration kind of a variable statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum VarKind {
    #[strum(serialize = "const")]
    Const,
    #[strum(serialize = "let")]
    Let,
    #[strum(serialize = "var")]
    Var,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Declarator {
    pub name: String,
    pub init: Option<IrExpr>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CatchClause {
    pub param: String,
    pub param_type: Option<String>,
    pub body: Vec<IrStmt>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassField {
    pub name: String,
    pub is_static: bool,
    pub init: Option<IrExpr>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassMethod {
    pub name: String,
    pub params: Params,
    pub rest_param: Option<String>,
    pub body: Vec<IrStmt>,
    pub is_async: bool,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnumCase {
    pub name: String,
    /// Explicit raw value for label enums (`(case A 1)`).
    pub raw: Option<IrExpr>,
    /// Associated-value parameter names (`(case A x y)`).
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImportSpecifier {
    pub imported: String,
    pub local: String,
}

/// An IR statement with its source span.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IrStmt {
    pub span: Option<Span>,
    pub kind: IrStmtKind,
}

impl IrStmt {
    #[must_use]
    pub fn new(kind: IrStmtKind, span: Option<Span>) -> Self {
        Self { span, kind }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum IrStmtKind {
    VarDecl {
        kind: VarKind,
        declarations: Vec<Declarator>,
    },
    FunctionDecl {
        name: String,
        params: Params,
        rest_param: Option<String>,
        body: Vec<IrStmt>,
        is_async: bool,
        /// Set for functions declared with the `fn` form; the residual
        /// classifier treats calls to these as plain function calls.
        is_fn_variant: bool,
    },
    ClassDecl {
        name: String,
        fields: Vec<ClassField>,
        constructor: Option<ClassMethod>,
        methods: Vec<ClassMethod>,
    },
    EnumDecl {
        name: String,
        cases: Vec<EnumCase>,
        /// True when any case carries associated values; such enums lower
        /// to a constructor with a `type` tag and a `values` map.
        has_associated: bool,
    },
    Return(Option<IrExpr>),
    Throw(IrExpr),
    Block(Vec<IrStmt>),
    ExprStmt(IrExpr),
    If {
        test: IrExpr,
        consequent: Vec<IrStmt>,
        alternate: Option<Vec<IrStmt>>,
    },
    Try {
        block: Vec<IrStmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<IrStmt>>,
    },
    While {
        test: IrExpr,
        body: Vec<IrStmt>,
    },
    Continue,
    Break,
    ImportDecl {
        specifiers: Vec<ImportSpecifier>,
        namespace: Option<String>,
        source: String,
    },
    ExportNamed {
        /// `(local, exported)` pairs.
        specifiers: Vec<(String, String)>,
        /// Re-export source module, when exporting straight from another
        /// module.
        source: Option<String>,
    },
    ExportVarDecl(Box<IrStmt>),
    ExportDefault(IrExpr),
}

/// The result of lowering one form: either tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Lowered {
    Expr(IrExpr),
    Stmt(IrStmt),
}

impl Lowered {
    /// The single place the statement-position invariant is enforced: an
    /// expression at statement position is wrapped in an expression
    /// statement; statements pass through.
    #[must_use]
    pub fn into_stmt(self) -> IrStmt {
        match self {
            Self::Expr(expr) => {
                let span = expr.span;
                IrStmt::new(IrStmtKind::ExprStmt(expr), span)
            }
            Self::Stmt(stmt) => stmt,
        }
    }

    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Expr(e) => e.span,
            Self::Stmt(s) => s.span,
        }
    }
}

/// A lowered program: statements only.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IrProgram {
    pub body: Vec<IrStmt>,
}

// =============================================================================
// Await detection
// =============================================================================

/// True when any statement in the slice awaits, not counting nested
/// function expressions (their async-ness is their own).
#[must_use]
pub fn stmts_contain_await(stmts: &[IrStmt]) -> bool {
    stmts.iter().any(stmt_contains_await)
}

fn stmt_contains_await(stmt: &IrStmt) -> bool {
    match &stmt.kind {
        IrStmtKind::VarDecl { declarations, .. } => declarations
            .iter()
            .filter_map(|d| d.init.as_ref())
            .any(expr_contains_await),
        // Function and class bodies own their async-ness.
        IrStmtKind::FunctionDecl { .. } | IrStmtKind::ClassDecl { .. } | IrStmtKind::EnumDecl { .. } => false,
        IrStmtKind::Return(value) => value.as_ref().is_some_and(expr_contains_await),
        IrStmtKind::Throw(expr) | IrStmtKind::ExprStmt(expr) => expr_contains_await(expr),
        IrStmtKind::Block(body) => stmts_contain_await(body),
        IrStmtKind::If {
            test,
            consequent,
            alternate,
        } => {
            expr_contains_await(test)
                || stmts_contain_await(consequent)
                || alternate.as_deref().is_some_and(stmts_contain_await)
        }
        IrStmtKind::Try {
            block,
            handler,
            finalizer,
        } => {
            stmts_contain_await(block)
                || handler.as_ref().is_some_and(|h| stmts_contain_await(&h.body))
                || finalizer.as_deref().is_some_and(stmts_contain_await)
        }
        IrStmtKind::While { test, body } => expr_contains_await(test) || stmts_contain_await(body),
        IrStmtKind::Continue | IrStmtKind::Break | IrStmtKind::ImportDecl { .. } | IrStmtKind::ExportNamed { .. } => {
            false
        }
        IrStmtKind::ExportVarDecl(decl) => stmt_contains_await(decl),
        IrStmtKind::ExportDefault(expr) => expr_contains_await(expr),
    }
}

/// True when the expression awaits, stopping at nested function
/// expressions but continuing through blocks, conditionals, literals,
/// calls, and the synthetic interop nodes.
#[must_use]
pub fn expr_contains_await(expr: &IrExpr) -> bool {
    match &expr.kind {
        IrExprKind::Await(_) => true,
        IrExprKind::Str(_)
        | IrExprKind::Num(_)
        | IrExprKind::Bool(_)
        | IrExprKind::Null
        | IrExprKind::BigInt(_)
        | IrExprKind::Identifier { .. } => false,
        IrExprKind::Member { object, property } => {
            expr_contains_await(object)
                || match property {
                    MemberProp::Computed(inner) => expr_contains_await(inner),
                    MemberProp::Static(_) => false,
                }
        }
        IrExprKind::Call { callee, args } | IrExprKind::New { callee, args } => {
            expr_contains_await(callee) || args.iter().any(expr_contains_await)
        }
        IrExprKind::CallMember { object, args, .. } => {
            expr_contains_await(object) || args.iter().any(expr_contains_await)
        }
        IrExprKind::Binary { left, right, .. } => expr_contains_await(left) || expr_contains_await(right),
        IrExprKind::Unary { operand, .. } => expr_contains_await(operand),
        IrExprKind::Conditional {
            test,
            consequent,
            alternate,
        } => expr_contains_await(test) || expr_contains_await(consequent) || expr_contains_await(alternate),
        IrExprKind::ArrayLit(items) => items.iter().any(expr_contains_await),
        IrExprKind::ObjectLit(entries) => entries.iter().any(|(key, value)| {
            expr_contains_await(value)
                || match key {
                    ObjectKey::Computed(inner) => expr_contains_await(inner),
                    ObjectKey::Ident(_) | ObjectKey::Str(_) => false,
                }
        }),
        IrExprKind::FunctionExpr { .. } => false,
        IrExprKind::Assign { target, value } => expr_contains_await(target) || expr_contains_await(value),
        IrExprKind::TemplateLit { exprs, .. } => exprs.iter().any(expr_contains_await),
        IrExprKind::InteropIife { object, .. } | IrExprKind::JsMethodAccess { object, .. } => {
            expr_contains_await(object)
        }
    }
}
