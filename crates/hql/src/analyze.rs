//! Per-file analysis: read, expand, collect symbols, lower for
//! diagnostics.
//!
//! Analysis never fails. Reader errors, expansion errors, and lowering
//! errors all become diagnostics on the result, and the symbol collector
//! runs over whatever forms survived, so the language server and the
//! project index always get a usable (possibly partial) picture.

use std::path::Path;

use crate::{
    ast::{Literal, Sexp, Span},
    error::Diagnostic,
    expand::{self, MacroTable},
    intern::Interner,
    lower, pattern, reader,
    symbols::{Location, ScopeArena, ScopeId, ScopeKind, SymbolRecord},
};

/// One named import recorded for the project index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSymbol {
    pub name: String,
    pub local_name: String,
    pub line: u32,
    pub column: u32,
}

/// One import form, coalesced per module path by the project index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub module_path: String,
    pub symbols: Vec<ImportedSymbol>,
    pub is_namespace: bool,
    pub namespace_name: Option<String>,
}

/// One exported name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub name: String,
    pub local_name: String,
    pub is_re_export: bool,
    /// Always set for re-exports, never otherwise.
    pub original_module: Option<String>,
    pub line: u32,
    pub column: u32,
}

/// Everything analysis learned about one file.
#[derive(Debug)]
pub struct AnalysisResult {
    /// Raw forms as read.
    pub forms: Vec<Sexp>,
    /// Forms after macro expansion (macro definitions removed).
    pub expanded: Vec<Sexp>,
    pub symbols: ScopeArena,
    /// The module scope holding this file's definitions.
    pub file_scope: ScopeId,
    pub imports: Vec<ImportEntry>,
    pub exports: Vec<ExportEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Analyzes one file. `globals` seeds the root scope with the session's
/// builtins so lookups and completion see them; the file's own
/// definitions land in a dedicated module child scope.
pub fn analyze(
    source: &str,
    path: &str,
    table: &mut MacroTable,
    interner: &mut Interner,
    globals: &[SymbolRecord],
) -> AnalysisResult {
    let mut diagnostics = Vec::new();

    let read_outcome = reader::read(source, path, interner);
    for error in &read_outcome.errors {
        diagnostics.push(Diagnostic::error(error.message.clone(), Some(error.span)));
    }

    let expand_outcome = expand::expand_forms(&read_outcome.forms, table, interner);
    for error in expand_outcome.errors {
        diagnostics.push(error.into());
    }

    let mut symbols = ScopeArena::new("global");
    let root = symbols.root();
    for record in globals {
        symbols.define(root, record.clone());
    }
    let file_scope = symbols.create_child(root, format!("module:{path}"));

    let mut collector = Collector {
        interner,
        symbols: &mut symbols,
        path,
        imports: Vec::new(),
        exports: Vec::new(),
    };
    // Macro definitions are stripped by expansion; collect them from the
    // raw forms so hover and completion still see them.
    for form in &read_outcome.forms {
        collector.collect_macro_definition(form, file_scope);
    }
    for form in &expand_outcome.forms {
        collector.collect_form(form, file_scope);
    }
    let imports = std::mem::take(&mut collector.imports);
    let exports = std::mem::take(&mut collector.exports);

    // Mark exported locals so document symbols can badge them.
    for export in &exports {
        symbols.update(file_scope, &export.local_name, |record| {
            record.is_exported = true;
        });
    }

    let current_dir = Path::new(path).parent().unwrap_or_else(|| Path::new("."));
    let lower_outcome = lower::lower_program(&expand_outcome.forms, interner, current_dir);
    for error in lower_outcome.errors {
        diagnostics.push(error.into());
    }

    push_suggestions(&mut diagnostics, &symbols, file_scope);

    AnalysisResult {
        forms: read_outcome.forms,
        expanded: expand_outcome.forms,
        symbols,
        file_scope,
        imports,
        exports,
        diagnostics,
    }
}

/// Walks expanded forms registering definitions and references.
struct Collector<'a> {
    interner: &'a mut Interner,
    symbols: &'a mut ScopeArena,
    path: &'a str,
    imports: Vec<ImportEntry>,
    exports: Vec<ExportEntry>,
}

impl Collector<'_> {
    fn location(&self, span: Option<Span>) -> Option<Location> {
        span.map(|span| Location {
            file_path: self.path.to_owned(),
            line: span.start.line,
            column: span.start.column,
        })
    }

    fn collect_macro_definition(&mut self, form: &Sexp, scope: ScopeId) {
        let Some(head) = form.head_symbol() else { return };
        if self.interner.resolve(head) != "macro" {
            return;
        }
        let Some(items) = form.as_list() else { return };
        let Some(name_id) = items.get(1).and_then(Sexp::as_symbol) else {
            return;
        };
        let name = self.interner.resolve(name_id).to_owned();
        let params = items
            .get(2)
            .and_then(Sexp::as_list)
            .map(|params| {
                params[1..]
                    .iter()
                    .filter_map(Sexp::as_symbol)
                    .map(|id| self.interner.resolve(id).to_owned())
                    .collect()
            })
            .unwrap_or_default();
        let record = SymbolRecord::macro_definition(name, params).with_location(self.location(items[1].span));
        self.symbols.define(scope, record);
    }

    fn collect_form(&mut self, form: &Sexp, scope: ScopeId) {
        let Some(items) = form.as_list() else {
            self.collect_reference(form, scope);
            return;
        };
        let Some(head) = form.head_symbol() else {
            for item in items {
                self.collect_form(item, scope);
            }
            return;
        };

        let head_name = self.interner.resolve(head).to_owned();
        match head_name.as_str() {
            "quote" | "quasiquote" => {}
            "fn" => self.collect_fn(items, scope),
            "def" | "const" | "let" | "var" => self.collect_binding(&head_name, items, scope),
            "class" => self.collect_class(items, scope),
            "enum" => self.collect_enum(items, scope),
            "import" => self.collect_import(items, scope),
            "export" => self.collect_export(items, scope),
            _ => {
                // The head of an ordinary call is a name use too.
                self.collect_reference(&items[0], scope);
                for item in &items[1..] {
                    self.collect_form(item, scope);
                }
            }
        }
    }

    fn collect_reference(&mut self, form: &Sexp, scope: ScopeId) {
        let Some(id) = form.as_symbol() else { return };
        let Some(span) = form.span else { return };
        let name = self.interner.resolve(id).to_owned();
        if name.starts_with(':') || name == "_" {
            return;
        }
        self.symbols.add_reference(scope, name, span);
    }

    fn collect_fn(&mut self, items: &[Sexp], scope: ScopeId) {
        let vector_id = self.interner.intern("vector");
        let named = items.len() > 2 && items[1].as_symbol().is_some();
        let (name, param_form, body) = if named {
            (Some(&items[1]), items.get(2), &items[3.min(items.len())..])
        } else {
            (None, items.get(1), &items[2.min(items.len())..])
        };

        let param_names: Vec<String> = param_form
            .and_then(|form| {
                if form.head_symbol() == Some(vector_id) {
                    form.as_list().map(|list| {
                        let mut names = Vec::new();
                        for item in &list[1..] {
                            if let Ok(pattern) = pattern::parse_pattern(item, self.interner) {
                                let mut bound = Vec::new();
                                pattern.collect_bound_names(&mut bound);
                                names.extend(bound.into_iter().map(|id| self.interner.resolve(id).to_owned()));
                            }
                        }
                        names
                    })
                } else {
                    None
                }
            })
            .unwrap_or_default();

        let fn_scope = if let Some(name_form) = name {
            let name_id = name_form.as_symbol().expect("checked symbol");
            let fn_name = self.interner.resolve(name_id).to_owned();
            let record = SymbolRecord::function(fn_name.clone(), ScopeKind::Module, param_names.clone(), None)
                .with_location(self.location(name_form.span));
            self.symbols.define(scope, record);
            self.symbols.create_child(scope, fn_name)
        } else {
            self.symbols.create_child(scope, "fn")
        };

        for param in &param_names {
            let record = SymbolRecord::variable(param.clone(), ScopeKind::Parameter);
            self.symbols.define(fn_scope, record);
        }
        for form in body {
            self.collect_form(form, fn_scope);
        }
    }

    fn collect_binding(&mut self, head: &str, items: &[Sexp], scope: ScopeId) {
        let vector_id = self.interner.intern("vector");

        // `(let [a 1 b 2] body...)` introduces a block scope.
        if head == "let" && items.get(1).is_some_and(|form| form.head_symbol() == Some(vector_id)) {
            let block = self.symbols.create_child(scope, "let");
            let bindings = &items[1].as_list().expect("checked list")[1..];
            for pair in bindings.chunks(2) {
                if pair.len() != 2 {
                    break;
                }
                self.collect_form(&pair[1], block);
                self.define_pattern_names(&pair[0], block, ScopeKind::Local, /* constant */ true);
            }
            for form in &items[2..] {
                self.collect_form(form, block);
            }
            return;
        }

        if let Some(value) = items.get(2) {
            self.collect_form(value, scope);
        }
        if let Some(target) = items.get(1) {
            let scope_kind = match self.symbols.parent_of(scope) {
                None => ScopeKind::Global,
                Some(parent) if parent == self.symbols.root() => ScopeKind::Module,
                Some(_) => ScopeKind::Local,
            };
            let constant = matches!(head, "def" | "const");
            self.define_pattern_names(target, scope, scope_kind, constant);
        }
    }

    fn define_pattern_names(&mut self, target: &Sexp, scope: ScopeId, scope_kind: ScopeKind, constant: bool) {
        let Ok(parsed) = pattern::parse_pattern(target, self.interner) else {
            return;
        };
        let mut bound = Vec::new();
        parsed.collect_bound_names(&mut bound);
        let location = self.location(target.span);
        for id in bound {
            let name = self.interner.resolve(id).to_owned();
            let record = if constant {
                SymbolRecord::constant(name, scope_kind)
            } else {
                SymbolRecord::variable(name, scope_kind)
            };
            self.symbols.define(scope, record.with_location(location.clone()));
        }
    }

    fn collect_class(&mut self, items: &[Sexp], scope: ScopeId) {
        let Some(name_form) = items.get(1) else { return };
        let Some(name_id) = name_form.as_symbol() else { return };
        let class_name = self.interner.resolve(name_id).to_owned();

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        for member in &items[2..] {
            let Some(member_items) = member.as_list() else { continue };
            let head = member
                .head_symbol()
                .map(|id| self.interner.resolve(id).to_owned())
                .unwrap_or_default();
            match head.as_str() {
                "var" | "let" | "def" | "const" => {
                    if let Some(field_id) = member_items.get(1).and_then(Sexp::as_symbol) {
                        fields.push(self.interner.resolve(field_id).to_owned());
                    }
                }
                "fn" | "method" | "constructor" => {
                    if head == "constructor" {
                        methods.push("constructor".to_owned());
                    } else if let Some(method_id) = member_items.get(1).and_then(Sexp::as_symbol) {
                        methods.push(self.interner.resolve(method_id).to_owned());
                    }
                }
                _ => {}
            }
        }

        let record = SymbolRecord::class(class_name.clone(), ScopeKind::Module, fields.clone(), methods.clone())
            .with_location(self.location(name_form.span));
        self.symbols.define(scope, record);

        let class_scope = self.symbols.create_child(scope, class_name.clone());
        for field in fields {
            let record = SymbolRecord::field(field, class_name.clone());
            self.symbols.define(class_scope, record);
        }
        for member in &items[2..] {
            let Some(member_items) = member.as_list() else { continue };
            let head = member
                .head_symbol()
                .map(|id| self.interner.resolve(id).to_owned())
                .unwrap_or_default();
            if matches!(head.as_str(), "fn" | "method" | "constructor") {
                let (method_name, body_at) = if head == "constructor" {
                    ("constructor".to_owned(), 2)
                } else {
                    let name = member_items
                        .get(1)
                        .and_then(Sexp::as_symbol)
                        .map(|id| self.interner.resolve(id).to_owned())
                        .unwrap_or_default();
                    (name, 3)
                };
                let record = SymbolRecord::method(method_name.clone(), class_name.clone(), Vec::new())
                    .with_location(self.location(member.span));
                self.symbols.define(class_scope, record);
                let method_scope = self.symbols.create_child(class_scope, method_name);
                for form in &member_items[body_at.min(member_items.len())..] {
                    self.collect_form(form, method_scope);
                }
            }
        }
    }

    fn collect_enum(&mut self, items: &[Sexp], scope: ScopeId) {
        let Some(name_form) = items.get(1) else { return };
        let Some(name_id) = name_form.as_symbol() else { return };
        let enum_name = self.interner.resolve(name_id).to_owned();

        let mut cases = Vec::new();
        for case_form in &items[2..] {
            if let Some(case_items) = case_form.as_list() {
                if let Some(case_id) = case_items.get(1).and_then(Sexp::as_symbol) {
                    cases.push(self.interner.resolve(case_id).to_owned());
                }
            }
        }

        let record = SymbolRecord::enumeration(enum_name.clone(), ScopeKind::Module, cases.clone())
            .with_location(self.location(name_form.span));
        self.symbols.define(scope, record);
        for case in cases {
            let record = SymbolRecord::enum_case(case, enum_name.clone());
            self.symbols.define(scope, record);
        }
    }

    fn collect_import(&mut self, items: &[Sexp], scope: ScopeId) {
        let vector_id = self.interner.intern("vector");
        let as_id = self.interner.intern("as");
        let Some(target) = items.get(1) else { return };
        let Some(source) = items.get(3).and_then(Sexp::as_literal) else {
            return;
        };
        let Literal::Str(module_path) = source else { return };

        if target.head_symbol() == Some(vector_id) {
            let names = &target.as_list().expect("checked list")[1..];
            let mut symbols = Vec::new();
            let mut iter = names.iter().peekable();
            while let Some(item) = iter.next() {
                let Some(id) = item.as_symbol() else { continue };
                let imported = self.interner.resolve(id).to_owned();
                let local = if iter.peek().is_some_and(|next| next.is_symbol(as_id)) {
                    iter.next();
                    iter.next()
                        .and_then(Sexp::as_symbol)
                        .map(|local_id| self.interner.resolve(local_id).to_owned())
                        .unwrap_or_else(|| imported.clone())
                } else {
                    imported.clone()
                };
                let (line, column) = item
                    .span
                    .map_or((0, 0), |span| (span.start.line, span.start.column));
                let alias = (local != imported).then(|| imported.clone());
                let record = SymbolRecord::import(local.clone(), module_path.clone(), alias)
                    .with_location(self.location(item.span));
                self.symbols.define(scope, record);
                symbols.push(ImportedSymbol {
                    name: imported,
                    local_name: local,
                    line,
                    column,
                });
            }
            self.imports.push(ImportEntry {
                module_path: module_path.clone(),
                symbols,
                is_namespace: false,
                namespace_name: None,
            });
            return;
        }

        if let Some(id) = target.as_symbol() {
            let namespace = self.interner.resolve(id).to_owned();
            let record = SymbolRecord::namespace_import(namespace.clone(), module_path.clone())
                .with_location(self.location(target.span));
            self.symbols.define(scope, record);
            self.imports.push(ImportEntry {
                module_path: module_path.clone(),
                symbols: Vec::new(),
                is_namespace: true,
                namespace_name: Some(namespace),
            });
        }
    }

    fn collect_export(&mut self, items: &[Sexp], scope: ScopeId) {
        let vector_id = self.interner.intern("vector");
        let from_id = self.interner.intern("from");
        let Some(target) = items.get(1) else { return };

        let source = match (items.get(2), items.get(3)) {
            (Some(kw), Some(source_form)) if kw.as_symbol() == Some(from_id) => {
                match source_form.as_literal() {
                    Some(Literal::Str(source)) => Some(source.clone()),
                    _ => None,
                }
            }
            _ => None,
        };

        if target.head_symbol() == Some(vector_id) {
            for item in &target.as_list().expect("checked list")[1..] {
                let Some(id) = item.as_symbol() else { continue };
                let name = self.interner.resolve(id).to_owned();
                let (line, column) = item
                    .span
                    .map_or((0, 0), |span| (span.start.line, span.start.column));
                self.exports.push(ExportEntry {
                    name: name.clone(),
                    local_name: name,
                    is_re_export: source.is_some(),
                    original_module: source.clone(),
                    line,
                    column,
                });
            }
            return;
        }

        // `(export name expr)` exports a fresh constant.
        if let Some(id) = target.as_symbol() {
            let name = self.interner.resolve(id).to_owned();
            if name == "default" {
                return;
            }
            if let Some(value) = items.get(2) {
                self.collect_form(value, scope);
            }
            let record = SymbolRecord::constant(name.clone(), ScopeKind::Module)
                .with_location(self.location(target.span));
            self.symbols.define(scope, record);
            let (line, column) = target
                .span
                .map_or((0, 0), |span| (span.start.line, span.start.column));
            self.exports.push(ExportEntry {
                name: name.clone(),
                local_name: name,
                is_re_export: false,
                original_module: None,
                line,
                column,
            });
        }
    }
}

/// Attaches "did you mean" suggestions: references that resolve nowhere
/// but sit one edit away from a visible symbol become hint diagnostics
/// carrying the candidate, surfaced by the server as quick fixes.
fn push_suggestions(diagnostics: &mut Vec<Diagnostic>, symbols: &ScopeArena, file_scope: ScopeId) {
    let known: Vec<String> = symbols
        .all_symbols(file_scope)
        .into_iter()
        .map(|record| record.name.clone())
        .collect();
    for reference in symbols.all_references() {
        if known.iter().any(|name| *name == reference.name) {
            continue;
        }
        let Some(candidate) = known
            .iter()
            .find(|name| levenshtein_at_most_one(name, &reference.name))
        else {
            continue;
        };
        let diagnostic = Diagnostic::warning(
            format!("unknown symbol '{}'", reference.name),
            Some(reference.span),
        )
        .with_suggestion(candidate.clone());
        diagnostics.push(diagnostic);
    }
}

/// True when `a` and `b` differ by at most one edit.
fn levenshtein_at_most_one(a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    let (a_len, b_len) = (a.chars().count(), b.chars().count());
    if a_len.abs_diff(b_len) > 1 || a_len < 3 {
        return false;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_len == b_len {
        return a_chars.iter().zip(&b_chars).filter(|(x, y)| x != y).count() == 1;
    }
    let (longer, shorter) = if a_len > b_len {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };
    let mut skipped = false;
    let (mut i, mut j) = (0, 0);
    while i < longer.len() && j < shorter.len() {
        if longer[i] == shorter[j] {
            i += 1;
            j += 1;
        } else if skipped {
            return false;
        } else {
            skipped = true;
            i += 1;
        }
    }
    true
}
