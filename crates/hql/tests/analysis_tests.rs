//! Per-file analysis: partial results, diagnostics, symbol collection,
//! and scope structure.

use hql::{CompilerSession, ScopeKind, Severity, SymbolKind};
use pretty_assertions::assert_eq;

fn analyze(source: &str) -> hql::AnalysisResult {
    let mut session = CompilerSession::new();
    session.analyze(source, "/ws/main.hql")
}

/// Analysis never fails: a broken document still yields the forms read
/// before the error plus an error diagnostic.
#[test]
fn broken_documents_yield_partial_results() {
    let analysis = analyze("(def ok 1)\n(def broken");
    assert_eq!(analysis.forms.len(), 1, "the sound prefix is kept");
    assert_eq!(analysis.diagnostics.len(), 1);
    assert_eq!(analysis.diagnostics[0].severity, Severity::Error);
    assert!(
        analysis.symbols.lookup(analysis.file_scope, "ok").is_some(),
        "symbols from the sound prefix are still collected"
    );
}

#[test]
fn function_definitions_record_params_and_location() {
    let analysis = analyze("(fn add [x y] (+ x y))");
    let record = analysis
        .symbols
        .lookup(analysis.file_scope, "add")
        .expect("function is registered");
    assert_eq!(record.kind, SymbolKind::Function);
    assert_eq!(record.params.as_deref(), Some(["x".to_owned(), "y".to_owned()].as_slice()));
    let location = record.location.as_ref().expect("definition carries a location");
    assert_eq!(location.file_path, "/ws/main.hql");
    assert_eq!(location.line, 1);
}

#[test]
fn bindings_distinguish_constants_and_variables() {
    let analysis = analyze("(def pi 3.14)\n(var counter 0)");
    assert_eq!(
        analysis.symbols.lookup(analysis.file_scope, "pi").map(|r| r.kind),
        Some(SymbolKind::Constant)
    );
    assert_eq!(
        analysis.symbols.lookup(analysis.file_scope, "counter").map(|r| r.kind),
        Some(SymbolKind::Variable)
    );
}

#[test]
fn builtins_are_visible_from_the_file_scope() {
    let analysis = analyze("(def x 1)");
    let record = analysis
        .symbols
        .lookup(analysis.file_scope, "if")
        .expect("special forms are seeded into the root scope");
    assert_eq!(record.kind, SymbolKind::SpecialForm);
    assert!(record.documentation.is_some());
}

/// Shadowing: lookup returns the innermost record.
#[test]
fn inner_scopes_shadow_outer_names() {
    let analysis = analyze("(def x 1)\n(fn f [x] x)");
    // From the module scope the constant is visible.
    assert_eq!(
        analysis.symbols.lookup(analysis.file_scope, "x").map(|r| r.kind),
        Some(SymbolKind::Constant)
    );
    // The parameter lives in the function's child scope.
    let params = analysis.symbols.symbols_by_scope_kind(analysis.file_scope, ScopeKind::Parameter);
    assert!(params.is_empty(), "parameters must not leak into the module scope");
}

#[test]
fn class_members_register_under_the_class() {
    let analysis = analyze("(class Point (var x 0) (fn len [] 0))");
    let record = analysis
        .symbols
        .lookup(analysis.file_scope, "Point")
        .expect("class is registered");
    assert_eq!(record.kind, SymbolKind::Class);
    assert_eq!(record.fields.as_deref(), Some(["x".to_owned()].as_slice()));
    assert_eq!(record.methods.as_deref(), Some(["len".to_owned()].as_slice()));
}

#[test]
fn enums_register_cases() {
    let analysis = analyze("(enum Color (case Red) (case Green))");
    let record = analysis
        .symbols
        .lookup(analysis.file_scope, "Color")
        .expect("enum is registered");
    assert_eq!(record.kind, SymbolKind::Enum);
    assert_eq!(
        record.cases.as_deref(),
        Some(["Red".to_owned(), "Green".to_owned()].as_slice())
    );
    assert_eq!(
        analysis.symbols.lookup(analysis.file_scope, "Red").map(|r| r.kind),
        Some(SymbolKind::EnumCase)
    );
}

#[test]
fn macros_survive_expansion_for_navigation() {
    let analysis = analyze("(macro add-one [x] `(+ 1 ~x))\n(def y (add-one 1))");
    let record = analysis
        .symbols
        .lookup(analysis.file_scope, "add-one")
        .expect("macro definitions register even though expansion strips them");
    assert_eq!(record.kind, SymbolKind::Macro);
    assert_eq!(analysis.expanded.len(), 1, "the macro definition is stripped from output");
}

#[test]
fn imports_and_exports_are_recorded() {
    let analysis = analyze("(import [add as plus] from \"./a.hql\")\n(fn mine [] 1)\n(export [mine])");
    assert_eq!(analysis.imports.len(), 1);
    assert_eq!(analysis.imports[0].module_path, "./a.hql");
    assert_eq!(analysis.imports[0].symbols[0].name, "add");
    assert_eq!(analysis.imports[0].symbols[0].local_name, "plus");

    assert_eq!(analysis.exports.len(), 1);
    assert!(!analysis.exports[0].is_re_export);
    assert_eq!(analysis.exports[0].original_module, None);

    let local = analysis
        .symbols
        .lookup(analysis.file_scope, "mine")
        .expect("exported local");
    assert!(local.is_exported, "export marks the local record");

    let imported = analysis
        .symbols
        .lookup(analysis.file_scope, "plus")
        .expect("import binds the local alias");
    assert!(imported.is_imported);
    assert_eq!(imported.alias_of.as_deref(), Some("add"));
}

/// Re-exports always carry the original module; plain exports never do.
#[test]
fn re_export_invariant_holds() {
    let analysis = analyze("(export [x] from \"./other.hql\")");
    assert_eq!(analysis.exports.len(), 1);
    assert!(analysis.exports[0].is_re_export);
    assert_eq!(analysis.exports[0].original_module.as_deref(), Some("./other.hql"));
}

/// A near-miss reference produces a warning carrying the suggestion.
#[test]
fn typos_get_did_you_mean_suggestions() {
    let analysis = analyze("(fn total [xs] xs)\n(def t (totl [1]))");
    let suggestion = analysis
        .diagnostics
        .iter()
        .find(|d| d.suggestion.is_some())
        .expect("a one-edit typo should produce a suggestion");
    assert_eq!(suggestion.severity, Severity::Warning);
    assert_eq!(suggestion.suggestion.as_deref(), Some("total"));
    assert!(suggestion.message.contains("totl"), "got: {}", suggestion.message);
}

/// Expansion failures drop the offending form but keep analyzing.
#[test]
fn expansion_errors_are_per_form() {
    let analysis = analyze("(unless)\n(def x 1)");
    assert_eq!(analysis.diagnostics.iter().filter(|d| d.severity == Severity::Error).count(), 1);
    assert!(analysis.symbols.lookup(analysis.file_scope, "x").is_some());
}
