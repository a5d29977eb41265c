//! End-to-end emission through a session: JavaScript shape, identifier
//! sanitization, the helper prelude, and source-map behavior.

use hql::CompilerSession;

fn compile(source: &str) -> hql::Emitted {
    let mut session = CompilerSession::new();
    session.compile(source, "main.hql").expect("compilation should succeed")
}

#[test]
fn const_binding_emits_a_const() {
    let emitted = compile("(def x 1)");
    assert!(emitted.code.contains("const x = 1;"), "got:\n{}", emitted.code);
}

#[test]
fn function_declaration_returns_its_last_expression() {
    let emitted = compile("(fn add [a b] (+ a b))");
    assert!(emitted.code.contains("function add(a, b)"), "got:\n{}", emitted.code);
    assert!(emitted.code.contains("return a + b;"), "got:\n{}", emitted.code);
}

/// HQL surface names sanitize; host names never do.
#[test]
fn identifier_sanitization_respects_is_js() {
    let emitted = compile("(def my-value 1)\n(js/console.log my-value)");
    assert!(emitted.code.contains("const my_value = 1;"), "got:\n{}", emitted.code);
    assert!(emitted.code.contains("console.log(my_value)"), "got:\n{}", emitted.code);
}

#[test]
fn predicate_names_survive_sanitization() {
    let emitted = compile("(fn empty? [xs] (=== (js-get xs \"length\") 0))");
    assert!(
        emitted.code.contains("function empty_QMARK_"),
        "got:\n{}",
        emitted.code
    );
    assert!(emitted.code.contains("xs.length === 0"), "got:\n{}", emitted.code);
}

#[test]
fn template_literals_emit_with_interpolations() {
    let emitted = compile("(fn greet [name] `Hello, ${name}!`)");
    assert!(emitted.code.contains("`Hello, ${name}!`"), "got:\n{}", emitted.code);
}

#[test]
fn bigint_literals_pass_through() {
    let emitted = compile("(def big 9007199254740993n)");
    assert!(emitted.code.contains("9007199254740993n"), "got:\n{}", emitted.code);
}

#[test]
fn async_functions_emit_the_async_keyword() {
    let emitted = compile("(fn fetch-it [url] (await (js/fetch url)))");
    assert!(
        emitted.code.contains("async function fetch_it"),
        "await in the body must mark the function async, got:\n{}",
        emitted.code
    );
}

#[test]
fn imports_and_exports_emit_esm() {
    let emitted = compile("(import [add] from \"./math.hql\")\n(export [add])");
    assert!(
        emitted.code.contains("import { add } from \"./math.js\";"),
        "got:\n{}",
        emitted.code
    );
    assert!(emitted.code.contains("export { add };"), "got:\n{}", emitted.code);
}

#[test]
fn hash_map_emits_an_object_literal() {
    let emitted = compile("(def point {x 1 y 2})");
    assert!(emitted.code.contains("{ x: 1, y: 2 }"), "got:\n{}", emitted.code);
}

#[test]
fn hash_set_emits_a_set_constructor() {
    let emitted = compile("(def s #[1 2 3])");
    assert!(emitted.code.contains("new Set([1, 2, 3])"), "got:\n{}", emitted.code);
}

/// The prelude is injected only when a helper is referenced, and user
/// mappings account for it: a runtime error on the first user line maps
/// back to line 1 of the source.
#[test]
fn prelude_shifts_source_mappings() {
    let emitted = compile("(get [1 2 3] 0)");
    assert!(
        emitted.code.starts_with("function __hql_getNumeric"),
        "numeric get pulls its helper into the prelude, got:\n{}",
        emitted.code
    );
    assert!(emitted.prelude_lines > 0);

    let (source, line, column) = emitted
        .source_map
        .lookup(emitted.prelude_lines, 0)
        .expect("the first user line must map");
    assert_eq!(source, "main.hql");
    assert_eq!(line, 0, "zero-based line 0 is source line 1");
    assert_eq!(column, 0);
}

/// A runtime error reported against the emitted line of the first user
/// statement maps back to source line 1, despite the prelude above it.
#[test]
fn runtime_errors_map_through_the_prelude_offset() {
    let emitted = compile("(get [1 2 3] 0)");
    let error = hql::map_runtime_error("TypeError: boom", emitted.prelude_lines + 1, 1, &emitted);
    let (file, line, column) = error.location.expect("position maps");
    assert_eq!(file, "main.hql");
    assert_eq!(line, 1, "the runtime error reports user line 1, not the emitted line");
    assert_eq!(column, 1);
}

#[test]
fn no_helpers_means_no_prelude() {
    let emitted = compile("(def x 1)");
    assert_eq!(emitted.prelude_lines, 0);
    assert!(emitted.code.starts_with("const x"), "got:\n{}", emitted.code);
}

/// Every recorded mapping points into the original file and carries a
/// generated position inside the emitted text.
#[test]
fn source_map_round_trips_recorded_positions() {
    let emitted = compile("(def a 1)\n(def b (+ a 2))\n(fn twice [x] (* x 2))");
    let line_count = u32::try_from(emitted.code.lines().count()).expect("line count fits");
    let mappings = emitted.source_map.mappings();
    assert!(!mappings.is_empty());
    for mapping in mappings {
        assert!(mapping.generated_line < line_count);
        let (source, line, column) = emitted
            .source_map
            .lookup(mapping.generated_line, mapping.generated_column)
            .expect("every mapping is its own lookup answer");
        assert_eq!(source, "main.hql");
        assert!(line.abs_diff(mapping.original_line) == 0);
        assert!(column.abs_diff(mapping.original_column) <= 1);
    }
}

#[test]
fn source_map_serializes_as_v3() {
    let emitted = compile("(def x 1)");
    let json = emitted.source_map.to_json();
    assert!(json.contains("\"version\":3"), "got: {json}");
    assert!(json.contains("\"sources\":[\"main.hql\"]"), "got: {json}");
    assert!(json.contains("\"mappings\""), "got: {json}");
}

#[test]
fn range_pulls_its_helper() {
    let emitted = compile("(def xs (range 5))");
    assert!(
        emitted.code.contains("function __hql_range"),
        "got:\n{}",
        emitted.code
    );
    assert!(emitted.code.contains("__hql_range(5)"), "got:\n{}", emitted.code);
}

#[test]
fn compile_failures_carry_positions() {
    let mut session = CompilerSession::new();
    let failure = session
        .compile("(def broken", "main.hql")
        .expect_err("unterminated form must fail");
    let rendered = failure.to_string();
    assert!(rendered.contains("1:"), "failure should cite a position, got: {rendered}");
}

/// Compiled output is deterministic for the same session state.
#[test]
fn compilation_is_deterministic() {
    let source = "(fn add [a b] (+ a b))\n(def total (add 1 2))";
    let first = compile(source);
    let second = compile(source);
    assert_eq!(first.code, second.code);
    assert_eq!(first.source_map.to_json(), second.source_map.to_json());
}

/// User macros defined through the session persist across compiles and
/// vanish on reset.
#[test]
fn session_macros_persist_until_reset() {
    let mut session = CompilerSession::new();
    session
        .define_macro("(macro add-one [x] `(+ 1 ~x))")
        .expect("macro definition should succeed");

    let emitted = session.compile("(def y (add-one 2))", "main.hql").expect("compiles");
    assert!(emitted.code.contains("1 + 2"), "got:\n{}", emitted.code);

    session.reset();
    let emitted = session.compile("(def y (add-one 2))", "main.hql").expect("compiles");
    assert!(
        emitted.code.contains("__hql_getNumeric(add_one, 2)"),
        "after reset the head is unknown, so the single-literal call takes the lookup fallback, got:\n{}",
        emitted.code
    );
}
