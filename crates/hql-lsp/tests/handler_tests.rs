//! Handler-level tests: the LSP methods are exercised directly with
//! JSON payloads, without the stdio transport.

use hql_lsp::handler::LspHandler;
use serde_json::{Value, json};

const URI: &str = "file:///ws/main.hql";

fn open(handler: &mut LspHandler, source: &str) -> Vec<Value> {
    handler.did_open(&json!({
        "textDocument": { "uri": URI, "text": source, "version": 1, "languageId": "hql" }
    }))
}

fn position_params(line: u32, character: u32) -> Value {
    json!({
        "textDocument": { "uri": URI },
        "position": { "line": line, "character": character },
    })
}

#[test]
fn initialize_advertises_the_capability_set() {
    let mut handler = LspHandler::new();
    let result = handler.initialize(&json!({ "rootUri": "file:///ws" }));
    let caps = &result["capabilities"];
    assert_eq!(caps["textDocumentSync"], 1);
    assert_eq!(caps["hoverProvider"], true);
    assert_eq!(caps["completionProvider"]["triggerCharacters"], json!(["(", " ", ".", ":"]));
    assert_eq!(caps["signatureHelpProvider"]["triggerCharacters"], json!(["(", " "]));
    assert_eq!(caps["renameProvider"]["prepareProvider"], true);
    assert_eq!(
        caps["codeActionProvider"]["codeActionKinds"],
        json!(["quickfix", "refactor.extract"])
    );
    let legend = &caps["semanticTokensProvider"]["legend"];
    assert_eq!(legend["tokenTypes"].as_array().map(Vec::len), Some(15));
    assert_eq!(legend["tokenModifiers"].as_array().map(Vec::len), Some(4));
    assert_eq!(caps["semanticTokensProvider"]["range"], false);
}

#[test]
fn did_open_publishes_diagnostics_for_broken_sources() {
    let mut handler = LspHandler::new();
    let notifications = open(&mut handler, "(def broken");
    assert_eq!(notifications.len(), 1);
    let params = &notifications[0]["params"];
    assert_eq!(params["uri"], URI);
    let diagnostics = params["diagnostics"].as_array().expect("diagnostics array");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["source"], "hql");
    assert_eq!(diagnostics[0]["severity"], 1);
}

#[test]
fn clean_documents_publish_empty_diagnostics() {
    let mut handler = LspHandler::new();
    let notifications = open(&mut handler, "(def x 1)");
    let diagnostics = notifications[0]["params"]["diagnostics"].as_array().expect("array");
    assert!(diagnostics.is_empty(), "got: {diagnostics:?}");
}

/// Diagnostics are only published after re-analysis, so a change followed
/// by a flush reflects the new content, not the old.
#[test]
fn changes_debounce_until_flushed() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(def x 1)");
    handler.did_change(&json!({
        "textDocument": { "uri": URI, "version": 2 },
        "contentChanges": [{ "text": "(def broken" }],
    }));
    let notifications = handler.flush_dirty();
    assert_eq!(notifications.len(), 1);
    let diagnostics = notifications[0]["params"]["diagnostics"].as_array().expect("array");
    assert_eq!(diagnostics.len(), 1, "the re-analysis sees the broken content");

    // Nothing dirty, nothing published.
    assert!(handler.flush_dirty().is_empty());
}

#[test]
fn hover_reports_kind_and_signature() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(fn add [x y] (+ x y))\n(add 1 2)");
    let result = handler.hover(&position_params(1, 1));
    let contents = result["contents"]["value"].as_str().expect("markdown contents");
    assert!(contents.contains("**add**"), "got: {contents}");
    assert!(contents.contains("function"), "got: {contents}");
    assert!(contents.contains("(add [x y])"), "got: {contents}");
}

#[test]
fn completion_offers_locals_macros_and_builtins() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(fn add [x y] (+ x y))");
    let result = handler.completion(&position_params(0, 0));
    let labels: Vec<&str> = result
        .as_array()
        .expect("completion list")
        .iter()
        .filter_map(|item| item["label"].as_str())
        .collect();
    assert!(labels.contains(&"add"), "locals complete");
    assert!(labels.contains(&"when"), "bootstrap macros complete");
    assert!(labels.contains(&"if"), "special forms complete");
}

#[test]
fn signature_help_tracks_the_active_parameter() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(fn add [x y] (+ x y))\n(add 1 ");
    let result = handler.signature_help(&position_params(1, 8));
    assert_eq!(result["signatures"][0]["label"], "(add x y)");
    assert_eq!(result["activeParameter"], 1, "after one argument and a space, y is active");
}

#[test]
fn definition_resolves_locally() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(fn add [x y] (+ x y))\n(add 1 2)");
    let result = handler.definition(&position_params(1, 1));
    assert_eq!(result["uri"], URI);
    assert_eq!(result["range"]["start"]["line"], 0);
}

#[test]
fn references_find_every_token_occurrence() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(fn add [x y] (+ x y))\n(add 1 (add 2 3))");
    let result = handler.references(&position_params(1, 1));
    let locations = result.as_array().expect("locations array");
    assert_eq!(locations.len(), 3, "definition plus two call sites");
}

#[test]
fn rename_edits_whole_tokens_only() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(fn add [x y] (+ x y))\n(add 1 (madden 2))");
    let prepare = handler.prepare_rename(&position_params(1, 1));
    assert_eq!(prepare["placeholder"], "add");

    let result = handler.rename(&json!({
        "textDocument": { "uri": URI },
        "position": { "line": 1, "character": 1 },
        "newName": "plus",
    }));
    let edits = result["changes"][URI].as_array().expect("edits array");
    assert_eq!(edits.len(), 2, "madden must not be touched");
    for edit in edits {
        assert_eq!(edit["newText"], "plus");
    }
}

#[test]
fn document_symbols_list_top_level_definitions() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(fn add [x y] x)\n(def pi 3.14)\n(class Point)");
    let result = handler.document_symbols(&json!({ "textDocument": { "uri": URI } }));
    let names: Vec<&str> = result
        .as_array()
        .expect("symbols array")
        .iter()
        .filter_map(|symbol| symbol["name"].as_str())
        .collect();
    assert!(names.contains(&"add"), "got {names:?}");
    assert!(names.contains(&"pi"), "got {names:?}");
    assert!(names.contains(&"Point"), "got {names:?}");
}

#[test]
fn workspace_symbols_search_the_index() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(fn computeTotal [xs] xs)");
    let result = handler.workspace_symbols(&json!({ "query": "total" }));
    let names: Vec<&str> = result
        .as_array()
        .expect("symbols array")
        .iter()
        .filter_map(|symbol| symbol["name"].as_str())
        .collect();
    assert!(names.contains(&"computeTotal"), "got {names:?}");
}

#[test]
fn code_actions_surface_did_you_mean_fixes() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(fn total [xs] xs)\n(def t (totl [1]))");
    let result = handler.code_actions(&json!({
        "textDocument": { "uri": URI },
        "range": {
            "start": { "line": 1, "character": 0 },
            "end": { "line": 1, "character": 18 },
        },
        "context": { "diagnostics": [] },
    }));
    let actions = result.as_array().expect("actions array");
    let quickfix = actions
        .iter()
        .find(|action| action["kind"] == "quickfix")
        .expect("a did-you-mean quickfix");
    assert_eq!(quickfix["title"], "Did you mean 'total'?");
    let edit = &quickfix["edit"]["changes"][URI][0];
    assert_eq!(edit["newText"], "total");
}

#[test]
fn semantic_tokens_cover_the_document() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(fn add [x y] (+ x y)) ; sum\n(def s \"txt\")");
    let result = handler.semantic_tokens_full(&json!({ "textDocument": { "uri": URI } }));
    let data = result["data"].as_array().expect("token data");
    assert!(!data.is_empty());
    assert_eq!(data.len() % 5, 0, "tokens encode in groups of five");
}

#[test]
fn closing_a_document_clears_its_diagnostics() {
    let mut handler = LspHandler::new();
    open(&mut handler, "(def broken");
    let notifications = handler.did_close(&json!({ "textDocument": { "uri": URI } }));
    assert_eq!(notifications.len(), 1);
    let diagnostics = notifications[0]["params"]["diagnostics"].as_array().expect("array");
    assert!(diagnostics.is_empty());
}
