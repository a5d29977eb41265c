//! The LSP method layer.
//!
//! Translates JSON-RPC payloads into calls on the core: per-document
//! analysis, the scope arena for local answers, and the project index
//! for cross-file navigation. Documents analyze lazily - a request for a
//! dirty document re-analyzes it first, and the resulting diagnostics
//! are queued as `publishDiagnostics` notifications the server flushes
//! alongside the response, so a client never sees a diagnostic for a
//! range that no longer exists.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use serde_json::{Value, json};

use hql::{
    AnalysisResult, CompilerSession, Diagnostic, ProjectIndex, ScopeKind, Severity, Sexp, SexpKind, Span, SymbolKind,
};

/// Semantic token types advertised in the legend, in index order.
const TOKEN_TYPES: &[&str] = &[
    "namespace",
    "type",
    "class",
    "enum",
    "parameter",
    "variable",
    "property",
    "enumMember",
    "function",
    "macro",
    "keyword",
    "comment",
    "string",
    "number",
    "operator",
];

/// Semantic token modifiers advertised in the legend, in bit order.
const TOKEN_MODIFIERS: &[&str] = &["declaration", "definition", "readonly", "defaultLibrary"];

struct Document {
    text: String,
}

/// See the module docs.
pub struct LspHandler {
    session: CompilerSession,
    index: ProjectIndex,
    documents: HashMap<String, Document>,
    analyses: HashMap<String, AnalysisResult>,
    dirty: BTreeSet<String>,
    pending_notifications: Vec<Value>,
}

impl Default for LspHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl LspHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: CompilerSession::new(),
            index: ProjectIndex::new(),
            documents: HashMap::new(),
            analyses: HashMap::new(),
            dirty: BTreeSet::new(),
            pending_notifications: Vec::new(),
        }
    }

    /// Notifications produced while answering the last request.
    pub fn take_pending_notifications(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.pending_notifications)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn initialize(&mut self, params: &Value) -> Value {
        let mut roots = Vec::new();
        if let Some(uri) = params.get("rootUri").and_then(Value::as_str) {
            if let Some(path) = uri_to_path(uri) {
                roots.push(path);
            }
        }
        if let Some(folders) = params.get("workspaceFolders").and_then(Value::as_array) {
            for folder in folders {
                if let Some(path) = folder.get("uri").and_then(Value::as_str).and_then(uri_to_path) {
                    if !roots.contains(&path) {
                        roots.push(path);
                    }
                }
            }
        }
        tracing::info!(roots = roots.len(), "initializing workspace");
        self.session.set_workspace_roots(roots.clone());
        self.index.set_workspace_roots(roots);

        json!({
            "capabilities": {
                "textDocumentSync": 1,
                "hoverProvider": true,
                "completionProvider": { "triggerCharacters": ["(", " ", ".", ":"] },
                "signatureHelpProvider": { "triggerCharacters": ["(", " "] },
                "definitionProvider": true,
                "documentSymbolProvider": true,
                "workspaceSymbolProvider": true,
                "referencesProvider": true,
                "renameProvider": { "prepareProvider": true },
                "codeActionProvider": { "codeActionKinds": ["quickfix", "refactor.extract"] },
                "semanticTokensProvider": {
                    "legend": {
                        "tokenTypes": TOKEN_TYPES,
                        "tokenModifiers": TOKEN_MODIFIERS,
                    },
                    "full": true,
                    "range": false,
                },
            },
            "serverInfo": {
                "name": "hql-lsp",
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    pub fn did_open(&mut self, params: &Value) -> Vec<Value> {
        let Some(uri) = params.pointer("/textDocument/uri").and_then(Value::as_str) else {
            return Vec::new();
        };
        let text = params
            .pointer("/textDocument/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        self.documents.insert(uri.to_owned(), Document { text });
        self.dirty.insert(uri.to_owned());
        self.flush_dirty()
    }

    pub fn did_change(&mut self, params: &Value) {
        let Some(uri) = params.pointer("/textDocument/uri").and_then(Value::as_str) else {
            return;
        };
        // Full sync: the last content change carries the whole document.
        let Some(text) = params
            .pointer("/contentChanges")
            .and_then(Value::as_array)
            .and_then(|changes| changes.last())
            .and_then(|change| change.get("text"))
            .and_then(Value::as_str)
        else {
            return;
        };
        self.documents.insert(
            uri.to_owned(),
            Document {
                text: text.to_owned(),
            },
        );
        self.dirty.insert(uri.to_owned());
    }

    pub fn did_close(&mut self, params: &Value) -> Vec<Value> {
        let Some(uri) = params.pointer("/textDocument/uri").and_then(Value::as_str) else {
            return Vec::new();
        };
        self.documents.remove(uri);
        self.analyses.remove(uri);
        self.dirty.remove(uri);
        // Clear diagnostics for the closed document.
        vec![json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": { "uri": uri, "diagnostics": [] },
        })]
    }

    /// Analyzes every dirty document and returns their diagnostics
    /// notifications. The index update happens before diagnostics are
    /// built, preserving the analysis → index → publish order.
    pub fn flush_dirty(&mut self) -> Vec<Value> {
        let uris: Vec<String> = std::mem::take(&mut self.dirty).into_iter().collect();
        let mut notifications = Vec::new();
        for uri in uris {
            if let Some(notification) = self.analyze_document(&uri) {
                notifications.push(notification);
            }
        }
        notifications
    }

    fn analyze_document(&mut self, uri: &str) -> Option<Value> {
        let document = self.documents.get(uri)?;
        let path = uri_to_path(uri)?;
        let path_str = path.to_string_lossy().into_owned();
        let analysis = self.session.analyze(&document.text, &path_str);
        self.index.index_file(&path, &analysis);

        let diagnostics: Vec<Value> = analysis.diagnostics.iter().map(diagnostic_to_lsp).collect();
        self.analyses.insert(uri.to_owned(), analysis);
        Some(json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": { "uri": uri, "diagnostics": diagnostics },
        }))
    }

    /// Re-analyzes a dirty document before a request answers from it.
    fn ensure_analyzed(&mut self, uri: &str) {
        if self.dirty.remove(uri) || !self.analyses.contains_key(uri) {
            if let Some(notification) = self.analyze_document(uri) {
                self.pending_notifications.push(notification);
            }
        }
    }

    // =========================================================================
    // Hover, completion, signature help
    // =========================================================================

    pub fn hover(&mut self, params: &Value) -> Value {
        let Some((uri, line, character)) = text_document_position(params) else {
            return Value::Null;
        };
        self.ensure_analyzed(&uri);
        let Some(document) = self.documents.get(&uri) else {
            return Value::Null;
        };
        let Some((word, start, end)) = word_at(&document.text, line, character) else {
            return Value::Null;
        };
        let Some(analysis) = self.analyses.get(&uri) else {
            return Value::Null;
        };

        let record = analysis.symbols.lookup(analysis.file_scope, &word);
        let Some(record) = record else { return Value::Null };
        let mut contents = format!("**{}** _{}_", record.name, record.kind);
        if let Some(params) = &record.params {
            contents.push_str(&format!("\n\n`({} [{}])`", record.name, params.join(" ")));
        }
        if let Some(doc) = &record.documentation {
            contents.push_str("\n\n");
            contents.push_str(doc);
        }
        if let Some(cases) = &record.cases {
            contents.push_str(&format!("\n\ncases: {}", cases.join(", ")));
        }
        json!({
            "contents": { "kind": "markdown", "value": contents },
            "range": {
                "start": { "line": line, "character": start },
                "end": { "line": line, "character": end },
            }
        })
    }

    pub fn completion(&mut self, params: &Value) -> Value {
        let Some((uri, _, _)) = text_document_position(params) else {
            return json!([]);
        };
        self.ensure_analyzed(&uri);
        let Some(analysis) = self.analyses.get(&uri) else {
            return json!([]);
        };

        let mut items = Vec::new();
        let mut seen = BTreeSet::new();
        for record in analysis.symbols.all_symbols(analysis.file_scope) {
            if !seen.insert(record.name.clone()) {
                continue;
            }
            items.push(json!({
                "label": &record.name,
                "kind": completion_kind(record.kind),
                "detail": record.kind.to_string(),
                "documentation": &record.documentation,
            }));
        }
        for name in self.session.macro_names() {
            if seen.insert(name.clone()) {
                items.push(json!({
                    "label": name,
                    "kind": 3,
                    "detail": "macro",
                }));
            }
        }
        json!(items)
    }

    pub fn signature_help(&mut self, params: &Value) -> Value {
        let Some((uri, line, character)) = text_document_position(params) else {
            return Value::Null;
        };
        self.ensure_analyzed(&uri);
        let Some(document) = self.documents.get(&uri) else {
            return Value::Null;
        };
        let Some((head, active_parameter)) = enclosing_call(&document.text, line, character) else {
            return Value::Null;
        };
        let Some(analysis) = self.analyses.get(&uri) else {
            return Value::Null;
        };
        let Some(record) = analysis.symbols.lookup(analysis.file_scope, &head) else {
            return Value::Null;
        };
        let params_list = record.params.clone().unwrap_or_default();
        let label = format!("({} {})", record.name, params_list.join(" "));
        json!({
            "signatures": [{
                "label": label,
                "parameters": params_list.iter().map(|p| json!({ "label": p })).collect::<Vec<_>>(),
            }],
            "activeSignature": 0,
            "activeParameter": active_parameter.min(params_list.len().saturating_sub(1)),
        })
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn definition(&mut self, params: &Value) -> Value {
        let Some((uri, line, character)) = text_document_position(params) else {
            return Value::Null;
        };
        self.ensure_analyzed(&uri);
        let Some(document) = self.documents.get(&uri) else {
            return Value::Null;
        };
        let Some((word, _, _)) = word_at(&document.text, line, character) else {
            return Value::Null;
        };
        let Some(analysis) = self.analyses.get(&uri) else {
            return Value::Null;
        };

        // Local definition wins.
        if let Some(record) = analysis.symbols.lookup(analysis.file_scope, &word) {
            if let Some(location) = &record.location {
                return location_to_lsp(location);
            }
            // Imported: chase the export through the index.
            if record.is_imported {
                if let Some(module) = &record.source_module {
                    let original = record.alias_of.clone().unwrap_or_else(|| word.clone());
                    if let Some(path) = uri_to_path(&uri) {
                        if let Some(resolved) =
                            hql::resolve_import_path(module, &path, self.session.workspace_roots())
                        {
                            if let Some(found) = self.index.get_exported_symbol(&original, &resolved) {
                                if let Some(location) = &found.location {
                                    return location_to_lsp(location);
                                }
                            }
                        }
                    }
                }
            }
        }

        // Fall back to any file exporting the name.
        for path in self.index.find_exports(&word) {
            if let Some(found) = self.index.get_exported_symbol(&word, &path) {
                if let Some(location) = &found.location {
                    return location_to_lsp(location);
                }
            }
        }
        Value::Null
    }

    pub fn references(&mut self, params: &Value) -> Value {
        let Some((uri, line, character)) = text_document_position(params) else {
            return json!([]);
        };
        self.ensure_analyzed(&uri);
        let Some(document) = self.documents.get(&uri) else {
            return json!([]);
        };
        let Some((word, _, _)) = word_at(&document.text, line, character) else {
            return json!([]);
        };

        let mut locations = Vec::new();
        for (doc_uri, document) in &self.documents {
            for (line_index, start, end) in token_occurrences(&document.text, &word) {
                locations.push(json!({
                    "uri": doc_uri,
                    "range": {
                        "start": { "line": line_index, "character": start },
                        "end": { "line": line_index, "character": end },
                    }
                }));
            }
        }
        json!(locations)
    }

    pub fn prepare_rename(&mut self, params: &Value) -> Value {
        let Some((uri, line, character)) = text_document_position(params) else {
            return Value::Null;
        };
        let Some(document) = self.documents.get(&uri) else {
            return Value::Null;
        };
        let Some((word, start, end)) = word_at(&document.text, line, character) else {
            return Value::Null;
        };
        json!({
            "range": {
                "start": { "line": line, "character": start },
                "end": { "line": line, "character": end },
            },
            "placeholder": word,
        })
    }

    pub fn rename(&mut self, params: &Value) -> Value {
        let Some((uri, line, character)) = text_document_position(params) else {
            return Value::Null;
        };
        let Some(new_name) = params.get("newName").and_then(Value::as_str) else {
            return Value::Null;
        };
        let Some(document) = self.documents.get(&uri) else {
            return Value::Null;
        };
        let Some((word, _, _)) = word_at(&document.text, line, character) else {
            return Value::Null;
        };

        let mut changes = serde_json::Map::new();
        for (doc_uri, document) in &self.documents {
            let edits: Vec<Value> = token_occurrences(&document.text, &word)
                .into_iter()
                .map(|(line_index, start, end)| {
                    json!({
                        "range": {
                            "start": { "line": line_index, "character": start },
                            "end": { "line": line_index, "character": end },
                        },
                        "newText": new_name,
                    })
                })
                .collect();
            if !edits.is_empty() {
                changes.insert(doc_uri.clone(), Value::Array(edits));
            }
        }
        json!({ "changes": changes })
    }

    pub fn document_symbols(&mut self, params: &Value) -> Value {
        let Some(uri) = params.pointer("/textDocument/uri").and_then(Value::as_str) else {
            return json!([]);
        };
        let uri = uri.to_owned();
        self.ensure_analyzed(&uri);
        let Some(analysis) = self.analyses.get(&uri) else {
            return json!([]);
        };
        let symbols: Vec<Value> = analysis
            .symbols
            .entries(analysis.file_scope)
            .filter_map(|record| {
                let location = record.location.as_ref()?;
                Some(json!({
                    "name": &record.name,
                    "kind": symbol_kind_lsp(record.kind),
                    "location": {
                        "uri": uri.as_str(),
                        "range": point_range(location.line, location.column, record.name.len()),
                    },
                }))
            })
            .collect();
        json!(symbols)
    }

    pub fn workspace_symbols(&mut self, params: &Value) -> Value {
        let query = params.get("query").and_then(Value::as_str).unwrap_or_default();
        let results = self.index.search_symbols(query, 100);
        let symbols: Vec<Value> = results
            .into_iter()
            .filter_map(|(path, record)| {
                let location = record.location.clone()?;
                Some(json!({
                    "name": &record.name,
                    "kind": symbol_kind_lsp(record.kind),
                    "location": {
                        "uri": path_to_uri(&path),
                        "range": point_range(location.line, location.column, record.name.len()),
                    },
                }))
            })
            .collect();
        json!(symbols)
    }

    // =========================================================================
    // Code actions and semantic tokens
    // =========================================================================

    pub fn code_actions(&mut self, params: &Value) -> Value {
        let Some(uri) = params.pointer("/textDocument/uri").and_then(Value::as_str) else {
            return json!([]);
        };
        let uri = uri.to_owned();
        self.ensure_analyzed(&uri);
        let Some(analysis) = self.analyses.get(&uri) else {
            return json!([]);
        };

        let range_start_line = params
            .pointer("/range/start/line")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let range_end_line = params
            .pointer("/range/end/line")
            .and_then(Value::as_u64)
            .unwrap_or(u64::from(range_start_line)) as u32;

        let mut actions = Vec::new();

        // "Did you mean" quick fixes from suggestion diagnostics.
        for diagnostic in &analysis.diagnostics {
            let (Some(suggestion), Some(span)) = (&diagnostic.suggestion, diagnostic.span) else {
                continue;
            };
            let line = span.start.line.saturating_sub(1);
            if line < range_start_line || line > range_end_line {
                continue;
            }
            actions.push(json!({
                "title": format!("Did you mean '{suggestion}'?"),
                "kind": "quickfix",
                "diagnostics": [diagnostic_to_lsp(diagnostic)],
                "edit": {
                    "changes": {
                        (uri.clone()): [{
                            "range": span_to_range(span),
                            "newText": suggestion,
                        }]
                    }
                }
            }));
        }

        // Extract the selected top-level form into a definition.
        if let Some(document) = self.documents.get(&uri) {
            if range_end_line >= range_start_line {
                if let Some(selection) = selected_text(&document.text, params) {
                    if selection.trim().starts_with('(') {
                        let new_text = format!("(def extracted {})\n", selection.trim());
                        actions.push(json!({
                            "title": "Extract to definition",
                            "kind": "refactor.extract",
                            "edit": {
                                "changes": {
                                    (uri.clone()): [
                                        {
                                            "range": {
                                                "start": { "line": 0, "character": 0 },
                                                "end": { "line": 0, "character": 0 },
                                            },
                                            "newText": new_text,
                                        },
                                        {
                                            "range": params.get("range").cloned().unwrap_or_default(),
                                            "newText": "extracted",
                                        }
                                    ]
                                }
                            }
                        }));
                    }
                }
            }
        }

        json!(actions)
    }

    pub fn semantic_tokens_full(&mut self, params: &Value) -> Value {
        let Some(uri) = params.pointer("/textDocument/uri").and_then(Value::as_str) else {
            return json!({ "data": [] });
        };
        let uri = uri.to_owned();
        self.ensure_analyzed(&uri);
        let (Some(analysis), Some(document)) = (self.analyses.get(&uri), self.documents.get(&uri)) else {
            return json!({ "data": [] });
        };

        let mut tokens = Vec::new();
        for form in &analysis.forms {
            collect_semantic_tokens(form, analysis, self.session.interner(), true, &mut tokens);
        }
        collect_comment_tokens(&document.text, &mut tokens);

        tokens.sort_by_key(|token| (token.line, token.start));
        tokens.dedup_by_key(|token| (token.line, token.start));

        // LSP delta encoding: line delta, start delta, length, type, modifiers.
        let mut data = Vec::with_capacity(tokens.len() * 5);
        let (mut prev_line, mut prev_start) = (0u32, 0u32);
        for token in &tokens {
            let delta_line = token.line - prev_line;
            let delta_start = if delta_line == 0 {
                token.start - prev_start
            } else {
                token.start
            };
            data.extend_from_slice(&[delta_line, delta_start, token.length, token.token_type, token.modifiers]);
            prev_line = token.line;
            prev_start = token.start;
        }
        json!({ "data": data })
    }
}

// =============================================================================
// Semantic token collection
// =============================================================================

struct SemanticToken {
    line: u32,
    start: u32,
    length: u32,
    token_type: u32,
    modifiers: u32,
}

fn token_type_index(name: &str) -> u32 {
    TOKEN_TYPES
        .iter()
        .position(|t| *t == name)
        .map_or(0, |index| u32::try_from(index).expect("legend fits u32"))
}

fn span_token(span: Span, token_type: u32, modifiers: u32) -> Option<SemanticToken> {
    if span.start.line != span.end.line || span.end.column <= span.start.column {
        return None;
    }
    Some(SemanticToken {
        line: span.start.line - 1,
        start: span.start.column - 1,
        length: span.end.column - span.start.column,
        token_type,
        modifiers,
    })
}

fn collect_semantic_tokens(
    form: &Sexp,
    analysis: &AnalysisResult,
    interner: &hql::Interner,
    head_position: bool,
    out: &mut Vec<SemanticToken>,
) {
    match &form.kind {
        SexpKind::Literal(literal) => {
            let Some(span) = form.span else { return };
            let token_type = match literal {
                hql::Literal::Str(_) => token_type_index("string"),
                hql::Literal::Int(_) | hql::Literal::Float(_) | hql::Literal::BigInt(_) => {
                    token_type_index("number")
                }
                hql::Literal::Bool(_) | hql::Literal::Nil => token_type_index("keyword"),
            };
            out.extend(span_token(span, token_type, 0));
        }
        SexpKind::Symbol(id) => {
            let Some(span) = form.span else { return };
            let name = interner.resolve(*id);
            let token_type = classify_symbol(name, head_position, analysis);
            out.extend(span_token(span, token_type, symbol_modifiers(name, analysis)));
        }
        SexpKind::List(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_semantic_tokens(item, analysis, interner, index == 0, out);
            }
        }
    }
}

fn classify_symbol(name: &str, head_position: bool, analysis: &AnalysisResult) -> u32 {
    if name.starts_with(':') {
        return token_type_index("property");
    }
    if let Some(record) = analysis.symbols.lookup(analysis.file_scope, name) {
        let token = match record.kind {
            SymbolKind::Function | SymbolKind::Method | SymbolKind::Builtin => "function",
            SymbolKind::Macro => "macro",
            SymbolKind::SpecialForm => "keyword",
            SymbolKind::Operator => "operator",
            SymbolKind::Class => "class",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumCase => "enumMember",
            SymbolKind::Type | SymbolKind::Interface | SymbolKind::Alias => "type",
            SymbolKind::Module | SymbolKind::Namespace | SymbolKind::Import => "namespace",
            SymbolKind::Field | SymbolKind::Property => "property",
            SymbolKind::Constant | SymbolKind::Variable | SymbolKind::Export => {
                if record.scope == ScopeKind::Parameter {
                    "parameter"
                } else {
                    "variable"
                }
            }
        };
        return token_type_index(token);
    }
    if head_position {
        return token_type_index("function");
    }
    token_type_index("variable")
}

fn symbol_modifiers(name: &str, analysis: &AnalysisResult) -> u32 {
    let Some(record) = analysis.symbols.lookup(analysis.file_scope, name) else {
        return 0;
    };
    let mut modifiers = 0u32;
    if record.location.is_some() {
        // declaration | definition
        modifiers |= 0b11;
    }
    if record.kind == SymbolKind::Constant {
        // readonly
        modifiers |= 0b100;
    }
    if matches!(record.kind, SymbolKind::Builtin | SymbolKind::SpecialForm | SymbolKind::Operator) {
        // defaultLibrary
        modifiers |= 0b1000;
    }
    modifiers
}

/// Line comments: everything from an unquoted `;` to end of line.
fn collect_comment_tokens(text: &str, out: &mut Vec<SemanticToken>) {
    for (line_index, line) in text.lines().enumerate() {
        let mut in_string = false;
        let mut escaped = false;
        for (char_index, c) in line.chars().enumerate() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                ';' if !in_string => {
                    let length = line.chars().count() - char_index;
                    out.push(SemanticToken {
                        line: u32::try_from(line_index).expect("line fits u32"),
                        start: u32::try_from(char_index).expect("column fits u32"),
                        length: u32::try_from(length).expect("length fits u32"),
                        token_type: token_type_index("comment"),
                        modifiers: 0,
                    });
                    break;
                }
                _ => {}
            }
        }
    }
}

// =============================================================================
// JSON helpers
// =============================================================================

fn diagnostic_to_lsp(diagnostic: &Diagnostic) -> Value {
    let range = diagnostic.span.map_or_else(
        || json!({ "start": { "line": 0, "character": 0 }, "end": { "line": 0, "character": 0 } }),
        span_to_range,
    );
    json!({
        "range": range,
        "severity": severity_to_lsp(diagnostic.severity),
        "source": "hql",
        "message": diagnostic.user_message(),
    })
}

fn severity_to_lsp(severity: Severity) -> u8 {
    match severity {
        Severity::Error => 1,
        Severity::Warning => 2,
        Severity::Info => 3,
        Severity::Hint => 4,
    }
}

fn span_to_range(span: Span) -> Value {
    json!({
        "start": { "line": span.start.line.saturating_sub(1), "character": span.start.column.saturating_sub(1) },
        "end": { "line": span.end.line.saturating_sub(1), "character": span.end.column.saturating_sub(1) },
    })
}

fn point_range(line: u32, column: u32, length: usize) -> Value {
    let line = line.saturating_sub(1);
    let start = column.saturating_sub(1);
    json!({
        "start": { "line": line, "character": start },
        "end": { "line": line, "character": start + u32::try_from(length).unwrap_or(0) },
    })
}

fn location_to_lsp(location: &hql::Location) -> Value {
    json!({
        "uri": path_to_uri(Path::new(&location.file_path)),
        "range": point_range(location.line, location.column, 1),
    })
}

fn completion_kind(kind: SymbolKind) -> u8 {
    match kind {
        SymbolKind::Function | SymbolKind::Builtin | SymbolKind::Macro => 3,
        SymbolKind::Method => 2,
        SymbolKind::Field => 5,
        SymbolKind::Variable => 6,
        SymbolKind::Class => 7,
        SymbolKind::Interface => 8,
        SymbolKind::Module | SymbolKind::Namespace | SymbolKind::Import => 9,
        SymbolKind::Property => 10,
        SymbolKind::Enum => 13,
        SymbolKind::SpecialForm => 14,
        SymbolKind::EnumCase => 20,
        SymbolKind::Constant | SymbolKind::Export => 21,
        SymbolKind::Type | SymbolKind::Alias => 22,
        SymbolKind::Operator => 24,
    }
}

fn symbol_kind_lsp(kind: SymbolKind) -> u8 {
    match kind {
        SymbolKind::Module | SymbolKind::Import => 2,
        SymbolKind::Namespace => 3,
        SymbolKind::Class => 5,
        SymbolKind::Method => 6,
        SymbolKind::Property => 7,
        SymbolKind::Field => 8,
        SymbolKind::Enum => 10,
        SymbolKind::Interface => 11,
        SymbolKind::Function | SymbolKind::Builtin | SymbolKind::Macro | SymbolKind::SpecialForm => 12,
        SymbolKind::Variable => 13,
        SymbolKind::Constant | SymbolKind::Export => 14,
        SymbolKind::EnumCase => 22,
        SymbolKind::Operator => 25,
        SymbolKind::Type | SymbolKind::Alias => 26,
    }
}

// =============================================================================
// Text utilities
// =============================================================================

fn text_document_position(params: &Value) -> Option<(String, u32, u32)> {
    let uri = params.pointer("/textDocument/uri")?.as_str()?.to_owned();
    let line = u32::try_from(params.pointer("/position/line")?.as_u64()?).ok()?;
    let character = u32::try_from(params.pointer("/position/character")?.as_u64()?).ok()?;
    Some((uri, line, character))
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | ',' | '\'' | '`' | '~')
}

/// The identifier-like token at a zero-based position, with its column
/// bounds.
fn word_at(text: &str, line: u32, character: u32) -> Option<(String, u32, u32)> {
    let line_text = text.lines().nth(line as usize)?;
    let chars: Vec<char> = line_text.chars().collect();
    let at = (character as usize).min(chars.len().saturating_sub(1));
    if chars.is_empty() || !is_word_char(chars[at]) {
        return None;
    }
    let mut start = at;
    while start > 0 && is_word_char(chars[start - 1]) {
        start -= 1;
    }
    let mut end = at;
    while end < chars.len() && is_word_char(chars[end]) {
        end += 1;
    }
    let word: String = chars[start..end].iter().collect();
    Some((
        word,
        u32::try_from(start).expect("column fits u32"),
        u32::try_from(end).expect("column fits u32"),
    ))
}

/// Every whole-token occurrence of `word`, as `(line, start, end)`.
fn token_occurrences(text: &str, word: &str) -> Vec<(u32, u32, u32)> {
    let mut out = Vec::new();
    for (line_index, line) in text.lines().enumerate() {
        let chars: Vec<char> = line.chars().collect();
        let word_chars: Vec<char> = word.chars().collect();
        if word_chars.is_empty() {
            continue;
        }
        let mut index = 0;
        while index + word_chars.len() <= chars.len() {
            let matches = chars[index..index + word_chars.len()] == word_chars[..];
            let boundary_before = index == 0 || !is_word_char(chars[index - 1]);
            let after = index + word_chars.len();
            let boundary_after = after == chars.len() || !is_word_char(chars[after]);
            if matches && boundary_before && boundary_after {
                out.push((
                    u32::try_from(line_index).expect("line fits u32"),
                    u32::try_from(index).expect("column fits u32"),
                    u32::try_from(after).expect("column fits u32"),
                ));
                index = after;
            } else {
                index += 1;
            }
        }
    }
    out
}

/// The head word of the innermost unclosed call at a position, plus the
/// zero-based index of the argument being typed.
fn enclosing_call(text: &str, line: u32, character: u32) -> Option<(String, usize)> {
    // Flatten the document up to the cursor.
    let mut flat = String::new();
    for (index, line_text) in text.lines().enumerate() {
        match (index as u32).cmp(&line) {
            std::cmp::Ordering::Less => {
                flat.push_str(line_text);
                flat.push('\n');
            }
            std::cmp::Ordering::Equal => {
                let prefix: String = line_text.chars().take(character as usize).collect();
                flat.push_str(&prefix);
            }
            std::cmp::Ordering::Greater => break,
        }
    }

    // Walk backwards to the innermost unclosed open paren.
    let chars: Vec<char> = flat.chars().collect();
    let mut depth = 0i32;
    let mut open = None;
    for index in (0..chars.len()).rev() {
        match chars[index] {
            ')' => depth += 1,
            '(' => {
                if depth == 0 {
                    open = Some(index);
                    break;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    let open = open?;

    let rest: String = chars[open + 1..].iter().collect();
    let mut parts = rest.split_whitespace();
    let head = parts.next()?.to_owned();
    let arg_count = parts.count();
    // When the cursor follows whitespace a new argument is starting.
    let trailing_space = rest.ends_with(char::is_whitespace);
    let active = if trailing_space { arg_count } else { arg_count.saturating_sub(1) };
    Some((head, active))
}

fn selected_text(text: &str, params: &Value) -> Option<String> {
    let start_line = params.pointer("/range/start/line")?.as_u64()? as usize;
    let start_char = params.pointer("/range/start/character")?.as_u64()? as usize;
    let end_line = params.pointer("/range/end/line")?.as_u64()? as usize;
    let end_char = params.pointer("/range/end/character")?.as_u64()? as usize;
    if start_line == end_line && start_char == end_char {
        return None;
    }
    let lines: Vec<&str> = text.lines().collect();
    if start_line >= lines.len() || end_line >= lines.len() {
        return None;
    }
    if start_line == end_line {
        let chars: Vec<char> = lines[start_line].chars().collect();
        let end_char = end_char.min(chars.len());
        if start_char >= end_char {
            return None;
        }
        return Some(chars[start_char..end_char].iter().collect());
    }
    let mut out = String::new();
    for (index, line) in lines.iter().enumerate().take(end_line + 1).skip(start_line) {
        let chars: Vec<char> = line.chars().collect();
        if index == start_line {
            out.extend(chars.iter().skip(start_char));
        } else if index == end_line {
            out.extend(chars.iter().take(end_char.min(chars.len())));
        } else {
            out.push_str(line);
        }
        if index != end_line {
            out.push('\n');
        }
    }
    Some(out)
}

fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let path = uri.strip_prefix("file://")?;
    // Minimal percent decoding: spaces only.
    Some(PathBuf::from(path.replace("%20", " ")))
}

fn path_to_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}
