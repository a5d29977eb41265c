//! Macro expansion: definition, fixed points, quasiquote templates,
//! splicing, gensym, arity failures, and the iteration bound.

use hql::{HqlError, Interner, MacroTable, expand_form, expand_forms, read_strict};
use pretty_assertions::assert_eq;

struct Fixture {
    interner: Interner,
    table: MacroTable,
}

impl Fixture {
    fn new() -> Self {
        let mut interner = Interner::new();
        let table = MacroTable::bootstrap(&mut interner);
        Self { interner, table }
    }

    /// Expands all forms in `source`, asserting no errors, and renders
    /// the surviving forms.
    fn expand(&mut self, source: &str) -> Vec<String> {
        let forms = read_strict(source, "test.hql", &mut self.interner).expect("source should parse");
        let outcome = expand_forms(&forms, &mut self.table, &mut self.interner);
        assert!(outcome.errors.is_empty(), "unexpected errors: {:?}", outcome.errors);
        outcome
            .forms
            .iter()
            .map(|form| form.display(&self.interner).to_string())
            .collect()
    }

    fn expand_err(&mut self, source: &str) -> HqlError {
        let forms = read_strict(source, "test.hql", &mut self.interner).expect("source should parse");
        let outcome = expand_forms(&forms, &mut self.table, &mut self.interner);
        outcome.errors.into_iter().next().expect("expected an expansion error")
    }
}

/// Defining `add-one` and expanding `(add-one 5)` yields `(+ 1 5)`; the
/// result is already the fixed point.
#[test]
fn template_macro_expands_to_fixed_point() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(macro add-one [x] `(+ 1 ~x))\n(add-one 5)");
    assert_eq!(forms, vec!["(+ 1 5)".to_owned()]);

    // Idempotence: expanding the result again changes nothing.
    let reread = read_strict("(+ 1 5)", "test.hql", &mut fx.interner).expect("parses");
    let again = expand_form(&reread[0], &mut fx.table, &mut fx.interner).expect("expansion succeeds");
    assert_eq!(again.display(&fx.interner).to_string(), "(+ 1 5)");
}

/// `(unless)` with `(macro unless [test & body] ...)` fails with an arity
/// error naming the form and the `>=1` expectation.
#[test]
fn missing_macro_arguments_fail_with_arity() {
    let mut fx = Fixture::new();
    let error = fx.expand_err("(unless)");
    let HqlError::Expansion(expansion) = error else {
        panic!("expected an expansion error, got {error:?}");
    };
    assert_eq!(expansion.form.as_deref(), Some("unless"));
    assert_eq!(expansion.expected.as_deref(), Some(">=1"));
}

#[test]
fn surplus_arguments_without_rest_fail_with_arity() {
    let mut fx = Fixture::new();
    let error = fx.expand_err("(macro single [x] `(id ~x))\n(single 1 2)");
    let HqlError::Expansion(expansion) = error else {
        panic!("expected an expansion error, got {error:?}");
    };
    assert_eq!(expansion.form.as_deref(), Some("single"));
    assert_eq!(expansion.expected.as_deref(), Some("1"));
}

#[test]
fn rest_parameters_splice_into_templates() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(macro wrap [& xs] `(list ~@xs))\n(wrap 1 2 3)");
    assert_eq!(forms, vec!["(list 1 2 3)".to_owned()]);
}

#[test]
fn when_macro_builds_an_if_over_do() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(when ready (launch) (cleanup))");
    assert_eq!(forms, vec!["(if ready (do (launch) (cleanup)) nil)".to_owned()]);
}

#[test]
fn unless_macro_inverts_the_branches() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(unless done (work))");
    assert_eq!(forms, vec!["(if done nil (do (work)))".to_owned()]);
}

#[test]
fn cond_builds_a_nested_if_chain() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(cond (< x 0) -1 (> x 0) 1 else 0)");
    assert_eq!(forms, vec!["(if (< x 0) -1 (if (> x 0) 1 0))".to_owned()]);
}

#[test]
fn thread_first_inserts_after_the_head() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(-> x (f 1) g)");
    assert_eq!(forms, vec!["(g (f x 1))".to_owned()]);
}

#[test]
fn thread_last_appends_to_the_call() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(->> x (f 1) g)");
    assert_eq!(forms, vec!["(g (f 1 x))".to_owned()]);
}

/// `tmp#` resolves to one fresh name per expansion, never leaking the
/// literal `tmp#` spelling and never colliding between expansions.
#[test]
fn auto_gensym_is_stable_within_one_expansion() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(macro stash [v] `(do (def tmp# ~v) tmp#))\n(stash 1)\n(stash 2)");
    assert_eq!(forms.len(), 2);
    for form in &forms {
        assert!(!form.contains("tmp#"), "auto-gensym should be replaced, got {form}");
    }
    let first_name = forms[0]
        .split_whitespace()
        .find(|word| word.contains("__tmp_"))
        .expect("expansion should contain a gensym name")
        .trim_matches(|c| c == '(' || c == ')');
    assert!(
        forms[0].matches(first_name).count() >= 2,
        "the same fresh name should appear at both use sites: {}",
        forms[0]
    );
    assert!(
        !forms[1].contains(first_name),
        "a second expansion must get a different fresh name: {} vs {}",
        forms[0],
        forms[1]
    );
}

#[test]
fn gensym_call_produces_a_fresh_symbol() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(macro fresh [] `(def ~(gensym) 1))\n(fresh)");
    assert!(forms[0].starts_with("(def __g"), "got {}", forms[0]);
}

#[test]
fn nested_quasiquote_preserves_levels() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(macro deep [x] ``(~~x))\n(deep 9)");
    // The inner unquote escapes one level; the outer quasiquote survives.
    assert_eq!(forms, vec!["(quasiquote ((unquote 9)))".to_owned()]);
}

#[test]
fn splicing_a_non_list_fails() {
    let mut fx = Fixture::new();
    let error = fx.expand_err("(macro bad [x] `(list ~@x))\n(bad 1)");
    assert!(matches!(error, HqlError::Expansion(_)), "got {error:?}");
}

/// A self-reproducing macro exhausts the iteration bound.
#[test]
fn iteration_limit_is_enforced() {
    let mut fx = Fixture::new();
    let error = fx.expand_err("(macro loopy [x] `(loopy ~x))\n(loopy 1)");
    let HqlError::Expansion(expansion) = error else {
        panic!("expected an expansion error, got {error:?}");
    };
    assert_eq!(expansion.cause, "iteration limit");
}

/// Constant arithmetic inside an unquote folds; division by zero while
/// folding is an expansion error.
#[test]
fn template_arithmetic_folds_and_fails_loudly() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(macro six [] `(def six ~(+ 1 2 3)))\n(six)");
    assert_eq!(forms, vec!["(def six 6)".to_owned()]);

    let error = fx.expand_err("(macro boom [] `(def x ~(/ 1 0)))\n(boom)");
    assert!(matches!(error, HqlError::Expansion(_)), "got {error:?}");
}

#[test]
fn quoted_forms_are_opaque_to_expansion() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(macro add-one [x] `(+ 1 ~x))\n(quote (add-one 5))");
    assert_eq!(forms, vec!["(quote (add-one 5))".to_owned()]);
}

#[test]
fn macros_expand_inside_nested_forms() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(macro add-one [x] `(+ 1 ~x))\n(def y (add-one 4))");
    assert_eq!(forms, vec!["(def y (+ 1 4))".to_owned()]);
}

#[test]
fn when_let_binds_and_tests() {
    let mut fx = Fixture::new();
    let forms = fx.expand("(when-let [v (find)] (use v))");
    assert_eq!(
        forms,
        vec!["((fn (vector v) (if v (do (use v)) nil)) (find))".to_owned()]
    );
}
