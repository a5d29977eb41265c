//! Emission: IR to JavaScript source plus a source map.
//!
//! Statement order is preserved, `is_js` identifiers are never mangled,
//! and every node carrying a span contributes at least one mapping at the
//! position where its text begins. When the program references the
//! runtime helpers (property-vs-call fallback, `range`) the prelude is
//! prepended and all user mappings shift with it automatically, since
//! mappings record real generated positions.

use crate::{
    ast::Span,
    intern::Interner,
    ir::{
        ClassMethod, Declarator, EnumCase, IrExpr, IrExprKind, IrProgram, IrStmt, IrStmtKind, JsNumber, MemberProp,
        ObjectKey,
    },
    lower::{HELPER_GET, HELPER_GET_NUMERIC, HELPER_RANGE},
    sourcemap::{RawMapping, SourceMap, SourceMapBuilder},
};

const PRELUDE_GET: &str = r#"function __hql_get(obj, key) {
  if (obj == null) return undefined;
  if (obj instanceof Map) return obj.get(key);
  const value = obj[key];
  if (value !== undefined) return value;
  return typeof obj === "function" ? obj(key) : value;
}
"#;

const PRELUDE_GET_NUMERIC: &str = r#"function __hql_getNumeric(obj, index) {
  if (obj == null) return undefined;
  const value = obj[index];
  if (value !== undefined) return value;
  return typeof obj === "function" ? obj(index) : value;
}
"#;

const PRELUDE_RANGE: &str = r#"function __hql_range(start, end, step) {
  if (end === undefined) { end = start; start = 0; }
  if (step === undefined) step = start <= end ? 1 : -1;
  const out = [];
  if (step > 0) { for (let i = start; i < end; i += step) out.push(i); }
  else if (step < 0) { for (let i = start; i > end; i += step) out.push(i); }
  return out;
}
"#;

/// Emission options.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Name recorded as the source map's generated file.
    pub file_name: String,
    /// Prepend the runtime helpers when the program references them.
    pub include_prelude: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            file_name: "out.js".to_owned(),
            include_prelude: true,
        }
    }
}

/// The emitted artifact.
#[derive(Debug)]
pub struct Emitted {
    pub code: String,
    pub source_map: SourceMap,
    /// Lines the injected prelude occupies; user code starts below them.
    pub prelude_lines: u32,
}

/// Emits a lowered program as JavaScript.
#[must_use]
pub fn emit(program: &IrProgram, interner: &Interner, options: &EmitOptions) -> Emitted {
    let mut emitter = Emitter {
        out: String::new(),
        line: 0,
        column: 0,
        indent: 0,
        map: SourceMapBuilder::new(),
        interner,
    };

    if options.include_prelude {
        let needs = helper_usage(program);
        if needs.get {
            emitter.push_raw(PRELUDE_GET);
        }
        if needs.get_numeric {
            emitter.push_raw(PRELUDE_GET_NUMERIC);
        }
        if needs.range {
            emitter.push_raw(PRELUDE_RANGE);
        }
    }
    let prelude_lines = emitter.line;

    for stmt in &program.body {
        emitter.emit_stmt(stmt);
        emitter.push_raw("\n");
    }

    let code = emitter.out;
    let source_map = emitter.map.build(&options.file_name);
    Emitted {
        code,
        source_map,
        prelude_lines,
    }
}

/// Rewrites HQL surface names into valid JavaScript identifiers.
///
/// Host (`is_js`) identifiers never pass through here.
#[must_use]
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '-' => out.push('_'),
            '?' => out.push_str("_QMARK_"),
            '!' => out.push_str("_BANG_"),
            '*' => out.push_str("_STAR_"),
            '<' => out.push_str("_LT_"),
            '>' => out.push_str("_GT_"),
            '=' => out.push_str("_EQ_"),
            '+' => out.push_str("_PLUS_"),
            '/' => out.push_str("_SLASH_"),
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, Default, Clone, Copy)]
struct HelperUsage {
    get: bool,
    get_numeric: bool,
    range: bool,
}

fn helper_usage(program: &IrProgram) -> HelperUsage {
    let mut usage = HelperUsage::default();
    for stmt in &program.body {
        scan_stmt(stmt, &mut usage);
    }
    usage
}

fn scan_stmt(stmt: &IrStmt, usage: &mut HelperUsage) {
    match &stmt.kind {
        IrStmtKind::VarDecl { declarations, .. } => {
            for decl in declarations {
                if let Some(init) = &decl.init {
                    scan_expr(init, usage);
                }
            }
        }
        IrStmtKind::FunctionDecl { body, .. } | IrStmtKind::Block(body) | IrStmtKind::While { body, .. } => {
            for stmt in body {
                scan_stmt(stmt, usage);
            }
        }
        IrStmtKind::ClassDecl {
            fields,
            constructor,
            methods,
            ..
        } => {
            for field in fields {
                if let Some(init) = &field.init {
                    scan_expr(init, usage);
                }
            }
            for method in constructor.iter().chain(methods) {
                for stmt in &method.body {
                    scan_stmt(stmt, usage);
                }
            }
        }
        IrStmtKind::EnumDecl { cases, .. } => {
            for case in cases {
                if let Some(raw) = &case.raw {
                    scan_expr(raw, usage);
                }
            }
        }
        IrStmtKind::Return(value) => {
            if let Some(value) = value {
                scan_expr(value, usage);
            }
        }
        IrStmtKind::Throw(expr) | IrStmtKind::ExprStmt(expr) | IrStmtKind::ExportDefault(expr) => {
            scan_expr(expr, usage);
        }
        IrStmtKind::If {
            test,
            consequent,
            alternate,
        } => {
            scan_expr(test, usage);
            for stmt in consequent.iter().chain(alternate.iter().flatten()) {
                scan_stmt(stmt, usage);
            }
        }
        IrStmtKind::Try {
            block,
            handler,
            finalizer,
        } => {
            for stmt in block
                .iter()
                .chain(handler.iter().flat_map(|h| h.body.iter()))
                .chain(finalizer.iter().flatten())
            {
                scan_stmt(stmt, usage);
            }
        }
        IrStmtKind::ExportVarDecl(decl) => scan_stmt(decl, usage),
        IrStmtKind::Continue | IrStmtKind::Break | IrStmtKind::ImportDecl { .. } | IrStmtKind::ExportNamed { .. } => {}
    }
}

fn scan_expr(expr: &IrExpr, usage: &mut HelperUsage) {
    if let IrExprKind::Identifier { name, is_js: true } = &expr.kind {
        match name.as_str() {
            HELPER_GET => usage.get = true,
            HELPER_GET_NUMERIC => usage.get_numeric = true,
            HELPER_RANGE => usage.range = true,
            _ => {}
        }
    }
    match &expr.kind {
        IrExprKind::Member { object, property } => {
            scan_expr(object, usage);
            if let MemberProp::Computed(inner) = property {
                scan_expr(inner, usage);
            }
        }
        IrExprKind::Call { callee, args } | IrExprKind::New { callee, args } => {
            scan_expr(callee, usage);
            for arg in args {
                scan_expr(arg, usage);
            }
        }
        IrExprKind::CallMember { object, args, .. } => {
            scan_expr(object, usage);
            for arg in args {
                scan_expr(arg, usage);
            }
        }
        IrExprKind::Binary { left, right, .. } => {
            scan_expr(left, usage);
            scan_expr(right, usage);
        }
        IrExprKind::Unary { operand, .. } | IrExprKind::Await(operand) => scan_expr(operand, usage),
        IrExprKind::Conditional {
            test,
            consequent,
            alternate,
        } => {
            scan_expr(test, usage);
            scan_expr(consequent, usage);
            scan_expr(alternate, usage);
        }
        IrExprKind::ArrayLit(items) | IrExprKind::TemplateLit { exprs: items, .. } => {
            for item in items {
                scan_expr(item, usage);
            }
        }
        IrExprKind::ObjectLit(entries) => {
            for (key, value) in entries {
                if let ObjectKey::Computed(inner) = key {
                    scan_expr(inner, usage);
                }
                scan_expr(value, usage);
            }
        }
        IrExprKind::FunctionExpr { body, .. } => {
            for stmt in body {
                scan_stmt(stmt, usage);
            }
        }
        IrExprKind::Assign { target, value } => {
            scan_expr(target, usage);
            scan_expr(value, usage);
        }
        IrExprKind::InteropIife { object, .. } | IrExprKind::JsMethodAccess { object, .. } => {
            scan_expr(object, usage);
        }
        IrExprKind::Str(_)
        | IrExprKind::Num(_)
        | IrExprKind::Bool(_)
        | IrExprKind::Null
        | IrExprKind::BigInt(_)
        | IrExprKind::Identifier { .. } => {}
    }
}

struct Emitter<'a> {
    out: String,
    line: u32,
    column: u32,
    indent: usize,
    map: SourceMapBuilder,
    interner: &'a Interner,
}

impl Emitter<'_> {
    fn push_raw(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        self.push_raw("\n");
        for _ in 0..self.indent {
            self.push_raw("  ");
        }
    }

    /// Records a mapping from the current generated position to the span.
    fn mark(&mut self, span: Option<Span>) {
        let Some(span) = span else { return };
        let source = self.interner.resolve(span.file).to_owned();
        let source_index = self.map.add_source(&source);
        self.map.add_mapping(RawMapping {
            generated_line: self.line,
            generated_column: self.column,
            source_index,
            original_line: span.start.line.saturating_sub(1),
            original_column: span.start.column.saturating_sub(1),
        });
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn emit_stmt(&mut self, stmt: &IrStmt) {
        self.mark(stmt.span);
        match &stmt.kind {
            IrStmtKind::VarDecl { kind, declarations } => {
                let keyword: &str = (*kind).into();
                self.push_raw(keyword);
                self.push_raw(" ");
                self.emit_declarators(declarations);
                self.push_raw(";");
            }
            IrStmtKind::FunctionDecl {
                name,
                params,
                rest_param,
                body,
                is_async,
                ..
            } => {
                if *is_async {
                    self.push_raw("async ");
                }
                self.push_raw("function ");
                let name = sanitize_identifier(name);
                self.push_raw(&name);
                self.emit_param_list(params, rest_param.as_deref());
                self.push_raw(" ");
                self.emit_block(body);
            }
            IrStmtKind::ClassDecl {
                name,
                fields,
                constructor,
                methods,
            } => self.emit_class(name, fields, constructor.as_ref(), methods),
            IrStmtKind::EnumDecl {
                name,
                cases,
                has_associated,
            } => self.emit_enum(name, cases, *has_associated),
            IrStmtKind::Return(value) => {
                self.push_raw("return");
                if let Some(value) = value {
                    self.push_raw(" ");
                    self.emit_expr(value);
                }
                self.push_raw(";");
            }
            IrStmtKind::Throw(value) => {
                self.push_raw("throw ");
                self.emit_expr(value);
                self.push_raw(";");
            }
            IrStmtKind::Block(body) => {
                self.emit_block(body);
            }
            IrStmtKind::ExprStmt(expr) => {
                // Leading `{` or `function` would re-parse as a statement.
                let needs_parens = matches!(expr.kind, IrExprKind::ObjectLit(_) | IrExprKind::FunctionExpr { .. });
                if needs_parens {
                    self.push_raw("(");
                }
                self.emit_expr(expr);
                if needs_parens {
                    self.push_raw(")");
                }
                self.push_raw(";");
            }
            IrStmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.push_raw("if (");
                self.emit_expr(test);
                self.push_raw(") ");
                self.emit_block(consequent);
                if let Some(alternate) = alternate {
                    self.push_raw(" else ");
                    self.emit_block(alternate);
                }
            }
            IrStmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.push_raw("try ");
                self.emit_block(block);
                if let Some(handler) = handler {
                    self.push_raw(" catch (");
                    let param = sanitize_identifier(&handler.param);
                    self.push_raw(&param);
                    self.push_raw(") ");
                    self.emit_block(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.push_raw(" finally ");
                    self.emit_block(finalizer);
                }
            }
            IrStmtKind::While { test, body } => {
                self.push_raw("while (");
                self.emit_expr(test);
                self.push_raw(") ");
                self.emit_block(body);
            }
            IrStmtKind::Continue => {
                self.push_raw("continue;");
            }
            IrStmtKind::Break => {
                self.push_raw("break;");
            }
            IrStmtKind::ImportDecl {
                specifiers,
                namespace,
                source,
            } => {
                self.push_raw("import ");
                if let Some(namespace) = namespace {
                    self.push_raw("* as ");
                    let name = sanitize_identifier(namespace);
                    self.push_raw(&name);
                } else {
                    self.push_raw("{ ");
                    for (index, spec) in specifiers.iter().enumerate() {
                        if index > 0 {
                            self.push_raw(", ");
                        }
                        let imported = sanitize_identifier(&spec.imported);
                        self.push_raw(&imported);
                        if spec.local != spec.imported {
                            self.push_raw(" as ");
                            let local = sanitize_identifier(&spec.local);
                            self.push_raw(&local);
                        }
                    }
                    self.push_raw(" }");
                }
                self.push_raw(" from ");
                self.emit_string(source);
                self.push_raw(";");
            }
            IrStmtKind::ExportNamed { specifiers, source } => {
                self.push_raw("export { ");
                for (index, (local, exported)) in specifiers.iter().enumerate() {
                    if index > 0 {
                        self.push_raw(", ");
                    }
                    let local_name = sanitize_identifier(local);
                    self.push_raw(&local_name);
                    if exported != local {
                        self.push_raw(" as ");
                        let exported_name = sanitize_identifier(exported);
                        self.push_raw(&exported_name);
                    }
                }
                self.push_raw(" }");
                if let Some(source) = source {
                    self.push_raw(" from ");
                    self.emit_string(source);
                }
                self.push_raw(";");
            }
            IrStmtKind::ExportVarDecl(decl) => {
                self.push_raw("export ");
                self.emit_stmt(decl);
            }
            IrStmtKind::ExportDefault(expr) => {
                self.push_raw("export default ");
                self.emit_expr(expr);
                self.push_raw(";");
            }
        }
    }

    fn emit_declarators(&mut self, declarations: &[Declarator]) {
        for (index, decl) in declarations.iter().enumerate() {
            if index > 0 {
                self.push_raw(", ");
            }
            let name = sanitize_identifier(&decl.name);
            self.push_raw(&name);
            if let Some(init) = &decl.init {
                self.push_raw(" = ");
                self.emit_expr(init);
            }
        }
    }

    fn emit_param_list(&mut self, params: &[String], rest: Option<&str>) {
        self.push_raw("(");
        for (index, param) in params.iter().enumerate() {
            if index > 0 {
                self.push_raw(", ");
            }
            let name = sanitize_identifier(param);
            self.push_raw(&name);
        }
        if let Some(rest) = rest {
            if !params.is_empty() {
                self.push_raw(", ");
            }
            self.push_raw("...");
            let name = sanitize_identifier(rest);
            self.push_raw(&name);
        }
        self.push_raw(")");
    }

    fn emit_block(&mut self, body: &[IrStmt]) {
        if body.is_empty() {
            self.push_raw("{}");
            return;
        }
        self.push_raw("{");
        self.indent += 1;
        for stmt in body {
            self.newline();
            self.emit_stmt(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.push_raw("}");
    }

    fn emit_class(
        &mut self,
        name: &str,
        fields: &[crate::ir::ClassField],
        constructor: Option<&ClassMethod>,
        methods: &[ClassMethod],
    ) {
        self.push_raw("class ");
        let class_name = sanitize_identifier(name);
        self.push_raw(&class_name);
        self.push_raw(" {");
        self.indent += 1;
        for field in fields {
            self.newline();
            if field.is_static {
                self.push_raw("static ");
            }
            let field_name = sanitize_identifier(&field.name);
            self.push_raw(&field_name);
            if let Some(init) = &field.init {
                self.push_raw(" = ");
                self.emit_expr(init);
            }
            self.push_raw(";");
        }
        if let Some(ctor) = constructor {
            self.newline();
            self.push_raw("constructor");
            self.emit_param_list(&ctor.params, ctor.rest_param.as_deref());
            self.push_raw(" ");
            self.emit_block(&ctor.body);
        }
        for method in methods {
            self.newline();
            if method.is_static {
                self.push_raw("static ");
            }
            if method.is_async {
                self.push_raw("async ");
            }
            let method_name = sanitize_identifier(&method.name);
            self.push_raw(&method_name);
            self.emit_param_list(&method.params, method.rest_param.as_deref());
            self.push_raw(" ");
            self.emit_block(&method.body);
        }
        self.indent -= 1;
        self.newline();
        self.push_raw("}");
    }

    /// Bare enums freeze into a label object; associated-value enums
    /// become a tagged constructor with per-case factories and an `is`
    /// predicate.
    fn emit_enum(&mut self, name: &str, cases: &[EnumCase], has_associated: bool) {
        let enum_name = sanitize_identifier(name);
        if !has_associated {
            self.push_raw("const ");
            self.push_raw(&enum_name);
            self.push_raw(" = Object.freeze({");
            self.indent += 1;
            for case in cases {
                self.newline();
                let case_name = sanitize_identifier(&case.name);
                self.push_raw(&case_name);
                self.push_raw(": ");
                match &case.raw {
                    Some(raw) => self.emit_expr(raw),
                    None => self.emit_string(&case.name),
                }
                self.push_raw(",");
            }
            self.indent -= 1;
            self.newline();
            self.push_raw("});");
            return;
        }

        self.push_raw("class ");
        self.push_raw(&enum_name);
        self.push_raw(" {");
        self.indent += 1;
        self.newline();
        self.push_raw("constructor(type, values) { this.type = type; this.values = values; }");
        self.newline();
        self.push_raw("is(tag) { return this.type === tag; }");
        self.indent -= 1;
        self.newline();
        self.push_raw("}");
        self.newline();
        for case in cases {
            self.push_raw(&enum_name);
            self.push_raw(".");
            let case_name = sanitize_identifier(&case.name);
            self.push_raw(&case_name);
            self.push_raw(" = ");
            if case.params.is_empty() {
                self.push_raw("new ");
                self.push_raw(&enum_name);
                self.push_raw("(");
                self.emit_string(&case.name);
                self.push_raw(", {});");
            } else {
                self.push_raw("(");
                for (index, param) in case.params.iter().enumerate() {
                    if index > 0 {
                        self.push_raw(", ");
                    }
                    let param_name = sanitize_identifier(param);
                    self.push_raw(&param_name);
                }
                self.push_raw(") => new ");
                self.push_raw(&enum_name);
                self.push_raw("(");
                self.emit_string(&case.name);
                self.push_raw(", { ");
                for (index, param) in case.params.iter().enumerate() {
                    if index > 0 {
                        self.push_raw(", ");
                    }
                    let param_name = sanitize_identifier(param);
                    self.push_raw(&param_name);
                }
                self.push_raw(" });");
            }
            self.newline();
        }
        self.push_raw("Object.freeze(");
        self.push_raw(&enum_name);
        self.push_raw(");");
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn emit_expr(&mut self, expr: &IrExpr) {
        self.mark(expr.span);
        match &expr.kind {
            IrExprKind::Str(s) => self.emit_string(s),
            IrExprKind::Num(JsNumber::Int(n)) => {
                let text = n.to_string();
                self.push_raw(&text);
            }
            IrExprKind::Num(JsNumber::Float(x)) => {
                let text = x.to_string();
                self.push_raw(&text);
            }
            IrExprKind::Bool(b) => self.push_raw(if *b { "true" } else { "false" }),
            IrExprKind::Null => self.push_raw("null"),
            IrExprKind::BigInt(digits) => {
                self.push_raw(digits);
                self.push_raw("n");
            }
            IrExprKind::Identifier { name, is_js } => {
                if *is_js {
                    let name = name.clone();
                    self.push_raw(&name);
                } else {
                    let name = sanitize_identifier(name);
                    self.push_raw(&name);
                }
            }
            IrExprKind::Member { object, property } => {
                self.emit_operand(object, operand_needs_parens_for_member(object));
                match property {
                    MemberProp::Static(name) => {
                        self.push_raw(".");
                        let name = name.clone();
                        self.push_raw(&name);
                    }
                    MemberProp::Computed(inner) => {
                        self.push_raw("[");
                        self.emit_expr(inner);
                        self.push_raw("]");
                    }
                }
            }
            IrExprKind::Call { callee, args } => {
                self.emit_operand(callee, callee_needs_parens(callee));
                self.emit_call_args(args);
            }
            IrExprKind::CallMember { object, method, args } => {
                self.emit_operand(object, operand_needs_parens_for_member(object));
                self.push_raw(".");
                let method = sanitize_identifier(method);
                self.push_raw(&method);
                self.emit_call_args(args);
            }
            IrExprKind::New { callee, args } => {
                self.push_raw("new ");
                self.emit_operand(callee, callee_needs_parens(callee));
                self.emit_call_args(args);
            }
            IrExprKind::Binary { op, left, right } => {
                self.emit_operand(left, !is_primary(left));
                self.push_raw(" ");
                let op_text: &str = (*op).into();
                self.push_raw(op_text);
                self.push_raw(" ");
                self.emit_operand(right, !is_primary(right));
            }
            IrExprKind::Unary { op, operand } => {
                let op_text: &str = (*op).into();
                self.push_raw(op_text);
                if matches!(op_text, "typeof") {
                    self.push_raw(" ");
                }
                self.emit_operand(operand, !is_primary(operand));
            }
            IrExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.emit_operand(test, !is_primary(test));
                self.push_raw(" ? ");
                self.emit_operand(consequent, !is_primary(consequent));
                self.push_raw(" : ");
                self.emit_operand(alternate, !is_primary(alternate));
            }
            IrExprKind::ArrayLit(items) => {
                self.push_raw("[");
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        self.push_raw(", ");
                    }
                    self.emit_expr(item);
                }
                self.push_raw("]");
            }
            IrExprKind::ObjectLit(entries) => {
                if entries.is_empty() {
                    self.push_raw("{}");
                    return;
                }
                self.push_raw("{ ");
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        self.push_raw(", ");
                    }
                    match key {
                        ObjectKey::Ident(name) => {
                            if is_valid_js_ident(name) {
                                let name = name.clone();
                                self.push_raw(&name);
                            } else {
                                self.emit_string(name);
                            }
                        }
                        ObjectKey::Str(s) => self.emit_string(s),
                        ObjectKey::Computed(inner) => {
                            self.push_raw("[");
                            self.emit_expr(inner);
                            self.push_raw("]");
                        }
                    }
                    self.push_raw(": ");
                    self.emit_expr(value);
                }
                self.push_raw(" }");
            }
            IrExprKind::FunctionExpr {
                name,
                params,
                rest_param,
                body,
                is_async,
                is_arrow,
            } => {
                if *is_arrow {
                    if *is_async {
                        self.push_raw("async ");
                    }
                    self.emit_param_list(params, rest_param.as_deref());
                    self.push_raw(" => ");
                    self.emit_block(body);
                } else {
                    if *is_async {
                        self.push_raw("async ");
                    }
                    self.push_raw("function ");
                    if let Some(name) = name {
                        let name = sanitize_identifier(name);
                        self.push_raw(&name);
                    }
                    self.emit_param_list(params, rest_param.as_deref());
                    self.push_raw(" ");
                    self.emit_block(body);
                }
            }
            IrExprKind::Assign { target, value } => {
                self.emit_expr(target);
                self.push_raw(" = ");
                self.emit_operand(value, matches!(value.kind, IrExprKind::Assign { .. }));
            }
            IrExprKind::Await(inner) => {
                self.push_raw("await ");
                self.emit_operand(inner, !is_primary(inner));
            }
            IrExprKind::TemplateLit { quasis, exprs } => {
                self.push_raw("`");
                for (index, quasi) in quasis.iter().enumerate() {
                    let escaped = escape_template_part(quasi);
                    self.push_raw(&escaped);
                    if index < exprs.len() {
                        self.push_raw("${");
                        self.emit_expr(&exprs[index]);
                        self.push_raw("}");
                    }
                }
                self.push_raw("`");
            }
            IrExprKind::InteropIife { object, property } => {
                // Defer the access: read once, bind functions to the object.
                self.push_raw("((__o) => { const __v = __o.");
                let property = sanitize_identifier(property);
                self.push_raw(&property);
                self.push_raw("; return typeof __v === \"function\" ? __v.bind(__o) : __v; })(");
                self.emit_expr(object);
                self.push_raw(")");
            }
            IrExprKind::JsMethodAccess { object, method } => {
                self.push_raw("((__o) => __o.");
                let method = sanitize_identifier(method);
                self.push_raw(&method);
                self.push_raw(".bind(__o))(");
                self.emit_expr(object);
                self.push_raw(")");
            }
        }
    }

    fn emit_call_args(&mut self, args: &[IrExpr]) {
        self.push_raw("(");
        for (index, arg) in args.iter().enumerate() {
            if index > 0 {
                self.push_raw(", ");
            }
            self.emit_expr(arg);
        }
        self.push_raw(")");
    }

    fn emit_operand(&mut self, expr: &IrExpr, parens: bool) {
        if parens {
            self.push_raw("(");
            self.emit_expr(expr);
            self.push_raw(")");
        } else {
            self.emit_expr(expr);
        }
    }

    fn emit_string(&mut self, s: &str) {
        let quoted = serde_json::to_string(s).expect("string serialization cannot fail");
        self.push_raw(&quoted);
    }
}

/// Expressions that never need parenthesization as an operand.
fn is_primary(expr: &IrExpr) -> bool {
    matches!(
        expr.kind,
        IrExprKind::Str(_)
            | IrExprKind::Num(_)
            | IrExprKind::Bool(_)
            | IrExprKind::Null
            | IrExprKind::BigInt(_)
            | IrExprKind::Identifier { .. }
            | IrExprKind::Member { .. }
            | IrExprKind::Call { .. }
            | IrExprKind::CallMember { .. }
            | IrExprKind::New { .. }
            | IrExprKind::ArrayLit(_)
            | IrExprKind::ObjectLit(_)
            | IrExprKind::TemplateLit { .. }
            | IrExprKind::InteropIife { .. }
            | IrExprKind::JsMethodAccess { .. }
    )
}

fn callee_needs_parens(callee: &IrExpr) -> bool {
    !matches!(
        callee.kind,
        IrExprKind::Identifier { .. }
            | IrExprKind::Member { .. }
            | IrExprKind::Call { .. }
            | IrExprKind::CallMember { .. }
            | IrExprKind::InteropIife { .. }
            | IrExprKind::JsMethodAccess { .. }
    )
}

fn operand_needs_parens_for_member(object: &IrExpr) -> bool {
    // `1 .x` is a syntax hazard; everything non-primary also wraps.
    matches!(object.kind, IrExprKind::Num(_)) || !is_primary(object)
}

fn is_valid_js_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn escape_template_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut chars = part.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            other => out.push(other),
        }
    }
    out
}
