//! Lowering: kernel dispatch, control-flow rewrites, the residual
//! classifier, and the statement-position invariant.

use std::path::Path;

use hql::{
    Interner, IrExprKind, IrProgram, IrStmtKind, lower_program, read_strict,
    ir::{BinaryOp, JsNumber, MemberProp},
};

fn lower(source: &str) -> IrProgram {
    let mut interner = Interner::new();
    let forms = read_strict(source, "test.hql", &mut interner).expect("source should parse");
    let outcome = lower_program(&forms, &mut interner, Path::new("."));
    assert!(outcome.errors.is_empty(), "unexpected errors: {:?}", outcome.errors);
    outcome.program
}

fn lower_with_errors(source: &str) -> (IrProgram, usize) {
    let mut interner = Interner::new();
    let forms = read_strict(source, "test.hql", &mut interner).expect("source should parse");
    let outcome = lower_program(&forms, &mut interner, Path::new("."));
    (outcome.program, outcome.errors.len())
}

/// `(if (> x 0) 1 -1)` lowers to a conditional expression wrapped in an
/// expression statement at the top level.
#[test]
fn if_lowers_to_a_wrapped_conditional() {
    let program = lower("(if (> x 0) 1 -1)");
    assert_eq!(program.body.len(), 1);
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("top-level expression should wrap in ExprStmt, got {:?}", program.body[0].kind);
    };
    let IrExprKind::Conditional {
        test,
        consequent,
        alternate,
    } = &expr.kind
    else {
        panic!("if should lower to a conditional, got {:?}", expr.kind);
    };
    assert!(matches!(
        test.kind,
        IrExprKind::Binary {
            op: BinaryOp::Gt,
            ..
        }
    ));
    assert!(matches!(consequent.kind, IrExprKind::Num(JsNumber::Int(1))));
    assert!(matches!(alternate.kind, IrExprKind::Num(JsNumber::Int(-1))));
}

/// `(try (await p) (catch e 0))` wraps in an IIFE whose function
/// expression is async.
#[test]
fn await_in_try_marks_the_iife_async() {
    let program = lower("(try (await p) (catch e 0))");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Await(call) = &expr.kind else {
        panic!("an async IIFE is awaited at the use site, got {:?}", expr.kind);
    };
    let IrExprKind::Call { callee, .. } = &call.kind else {
        panic!("expected the IIFE call");
    };
    let IrExprKind::FunctionExpr { is_async, body, .. } = &callee.kind else {
        panic!("expected a function expression callee");
    };
    assert!(*is_async, "await inside try must mark the wrapping IIFE async");
    assert!(matches!(body[0].kind, IrStmtKind::Try { .. }));
}

/// A try without awaits stays synchronous.
#[test]
fn synchronous_try_stays_synchronous() {
    let program = lower("(try (run) (catch e 0))");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Call { callee, .. } = &expr.kind else {
        panic!("expected the IIFE call, got {:?}", expr.kind);
    };
    let IrExprKind::FunctionExpr { is_async, .. } = &callee.kind else {
        panic!("expected a function expression callee");
    };
    assert!(!is_async);
}

/// An async callee nested inside the try body does not leak its
/// async-ness outward.
#[test]
fn nested_function_async_does_not_propagate() {
    let program = lower("(try ((fn [] (await p))) (catch e 0))");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Call { callee, .. } = &expr.kind else {
        panic!("expected the IIFE call, got {:?}", expr.kind);
    };
    let IrExprKind::FunctionExpr { is_async, .. } = &callee.kind else {
        panic!("expected a function expression callee");
    };
    assert!(!is_async, "a nested function's await must not mark the outer IIFE");
}

/// Lowering `(do e)` of a single expression equals lowering `e`.
#[test]
fn single_expression_do_is_transparent() {
    let program = lower("(do (+ 1 2))");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    assert!(
        matches!(expr.kind, IrExprKind::Binary { op: BinaryOp::Add, .. }),
        "single-expression do should lower to the expression itself, got {:?}",
        expr.kind
    );
}

#[test]
fn multi_form_do_becomes_an_iife_returning_the_last() {
    let program = lower("(do (step) 42)");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Call { callee, .. } = &expr.kind else {
        panic!("do should lower to an IIFE, got {:?}", expr.kind);
    };
    let IrExprKind::FunctionExpr { body, .. } = &callee.kind else {
        panic!("expected a function expression callee");
    };
    assert!(matches!(&body[1].kind, IrStmtKind::Return(Some(_))));
}

/// `loop`/`recur` become `while (true)` with reassignment and continue.
#[test]
fn loop_recur_lowers_to_while_true() {
    let program = lower("(loop [i 0 acc 1] (if (< i 3) (recur (+ i 1) (* acc 2)) acc))");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Call { callee, .. } = &expr.kind else {
        panic!("loop should lower to an IIFE, got {:?}", expr.kind);
    };
    let IrExprKind::FunctionExpr { body, .. } = &callee.kind else {
        panic!("expected a function expression callee");
    };
    assert!(matches!(&body[0].kind, IrStmtKind::VarDecl { .. }), "bindings first");
    let IrStmtKind::While { test, body: loop_body } = &body[1].kind else {
        panic!("expected while(true), got {:?}", body[1].kind);
    };
    assert!(matches!(test.kind, IrExprKind::Bool(true)));
    let IrStmtKind::If { consequent, alternate, .. } = &loop_body[0].kind else {
        panic!("tail if should lower as a statement, got {:?}", loop_body[0].kind);
    };
    let IrStmtKind::Block(recur_block) = &consequent[0].kind else {
        panic!("recur should lower to a block, got {:?}", consequent[0].kind);
    };
    assert!(
        matches!(recur_block.last().map(|s| &s.kind), Some(IrStmtKind::Continue)),
        "recur ends in continue"
    );
    let exit = alternate.as_ref().expect("the non-recur branch exits the loop");
    assert!(matches!(&exit[0].kind, IrStmtKind::Return(Some(_))));
}

#[test]
fn recur_outside_a_loop_is_rejected() {
    let (_, errors) = lower_with_errors("(recur 1)");
    assert_eq!(errors, 1);
}

/// `(m "key")` with an unknown head keeps the lookup pun via the runtime
/// helper; `(m 0)` routes to the numeric helper.
#[test]
fn property_vs_call_falls_back_to_helpers() {
    let program = lower("(m \"key\")");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Call { callee, args } = &expr.kind else {
        panic!("expected a helper call, got {:?}", expr.kind);
    };
    assert!(
        matches!(&callee.kind, IrExprKind::Identifier { name, is_js: true } if name == "__hql_get"),
        "string keys use __hql_get"
    );
    assert_eq!(args.len(), 2);

    let program = lower("(m 0)");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Call { callee, .. } = &expr.kind else {
        panic!("expected a helper call");
    };
    assert!(
        matches!(&callee.kind, IrExprKind::Identifier { name, is_js: true } if name == "__hql_getNumeric"),
        "numeric keys use __hql_getNumeric"
    );
}

/// A head declared through `fn` is a known function, so a single literal
/// argument is an ordinary call.
#[test]
fn fn_declared_heads_call_directly() {
    let program = lower("(fn m [k] k)\n(m \"key\")");
    let IrStmtKind::ExprStmt(expr) = &program.body[1].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Call { callee, .. } = &expr.kind else {
        panic!("expected a call, got {:?}", expr.kind);
    };
    assert!(
        matches!(&callee.kind, IrExprKind::Identifier { name, is_js: false } if name == "m"),
        "registered fn heads bypass the helper"
    );
}

#[test]
fn method_sigil_lowers_to_a_member_call() {
    let program = lower("(.push arr 1)");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::CallMember { method, args, .. } = &expr.kind else {
        panic!("expected a member call, got {:?}", expr.kind);
    };
    assert_eq!(method, "push");
    assert_eq!(args.len(), 1);
}

/// A dotted symbol in expression position defers through the interop
/// IIFE so surrounding forms can still rewrite it.
#[test]
fn dotted_symbol_defers_behind_interop_iife() {
    let program = lower("(def f obj.prop)");
    let IrStmtKind::VarDecl { declarations, .. } = &program.body[0].kind else {
        panic!("expected a declaration");
    };
    let init = declarations[0].init.as_ref().expect("declarator has an init");
    assert!(
        matches!(&init.kind, IrExprKind::InteropIife { property, .. } if property == "prop"),
        "got {:?}",
        init.kind
    );
}

#[test]
fn js_interop_path_is_a_host_member_chain() {
    let program = lower("(js/console.log \"hi\")");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Call { callee, .. } = &expr.kind else {
        panic!("expected a call");
    };
    let IrExprKind::Member { object, property } = &callee.kind else {
        panic!("expected a member callee, got {:?}", callee.kind);
    };
    assert!(matches!(&object.kind, IrExprKind::Identifier { name, is_js: true } if name == "console"));
    assert!(matches!(property, MemberProp::Static(name) if name == "log"));
}

/// `(=> body)` with sigil parameters binds `$0`/`$1` implicitly; nested
/// arrows keep their own sigils.
#[test]
fn arrow_sigils_bind_positionally() {
    let program = lower("(=> (+ $0 $1))");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::FunctionExpr { params, is_arrow, .. } = &expr.kind else {
        panic!("expected a function expression, got {:?}", expr.kind);
    };
    assert!(is_arrow);
    assert_eq!(params.as_slice(), ["$0".to_owned(), "$1".to_owned()]);

    let program = lower("(=> ((=> $0) 1))");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::FunctionExpr { params, .. } = &expr.kind else {
        panic!("expected a function expression");
    };
    assert!(
        params.is_empty(),
        "the nested arrow's sigils must not leak outward, got {params:?}"
    );
}

#[test]
fn assignment_targets_places_only() {
    let program = lower("(= x 5)");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    assert!(matches!(expr.kind, IrExprKind::Assign { .. }));

    let (_, errors) = lower_with_errors("(= 1 2)");
    assert_eq!(errors, 1, "a literal place must be rejected");
}

#[test]
fn bare_enum_lowers_to_labels() {
    let program = lower("(enum Color (case Red) (case Green 3))");
    let IrStmtKind::EnumDecl {
        name,
        cases,
        has_associated,
    } = &program.body[0].kind
    else {
        panic!("expected an enum declaration");
    };
    assert_eq!(name, "Color");
    assert_eq!(cases.len(), 2);
    assert!(!has_associated);
    assert!(cases[0].raw.is_none());
    assert!(cases[1].raw.is_some());
}

#[test]
fn associated_enum_is_flagged() {
    let program = lower("(enum Shape (case Circle r) (case Point))");
    let IrStmtKind::EnumDecl { has_associated, cases, .. } = &program.body[0].kind else {
        panic!("expected an enum declaration");
    };
    assert!(has_associated);
    assert_eq!(cases[0].params.as_slice(), ["r".to_owned()]);
}

/// `self` resolves to the receiver inside class bodies.
#[test]
fn class_lowering_rewrites_self() {
    let program = lower("(class Point (var x 0) (constructor [x] (= self.x x)) (fn getX [] self.x))");
    let IrStmtKind::ClassDecl {
        name,
        fields,
        constructor,
        methods,
    } = &program.body[0].kind
    else {
        panic!("expected a class declaration");
    };
    assert_eq!(name, "Point");
    assert_eq!(fields.len(), 1);
    let ctor = constructor.as_ref().expect("constructor present");
    let IrStmtKind::ExprStmt(assign) = &ctor.body[0].kind else {
        panic!("constructor body should assign");
    };
    let IrExprKind::Assign { target, .. } = &assign.kind else {
        panic!("expected an assignment");
    };
    let IrExprKind::Member { object, .. } = &target.kind else {
        panic!("expected a member target, got {:?}", target.kind);
    };
    assert!(
        matches!(&object.kind, IrExprKind::Identifier { name, is_js: true } if name == "this"),
        "self must rewrite to the receiver"
    );
    assert_eq!(methods.len(), 1);
    assert!(matches!(&methods[0].body[0].kind, IrStmtKind::Return(Some(_))));
}

/// Destructuring introduces one declarator per leaf, reading through a
/// shared temporary.
#[test]
fn array_pattern_destructures_with_temporaries() {
    let program = lower("(def [a _ b & rest] xs)");
    let IrStmtKind::VarDecl { declarations, .. } = &program.body[0].kind else {
        panic!("expected a declaration");
    };
    let names: Vec<&str> = declarations.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "rest"], "skip holes bind nothing");
}

#[test]
fn object_pattern_reads_keys_with_defaults() {
    let program = lower("(def {name n age (= a 30)} person)");
    let IrStmtKind::VarDecl { declarations, .. } = &program.body[0].kind else {
        panic!("expected a declaration");
    };
    let names: Vec<&str> = declarations.iter().map(|d| d.name.as_str()).collect();
    assert!(names.contains(&"n"), "rename binds the alias, got {names:?}");
    assert!(names.contains(&"a"), "defaulted entry binds, got {names:?}");
}

/// A failing form is dropped; later forms still lower.
#[test]
fn failing_forms_drop_without_aborting_the_program() {
    let (program, errors) = lower_with_errors("(if)\n(def x 1)");
    assert_eq!(errors, 1);
    assert_eq!(program.body.len(), 1, "the sound form still lowers");
}

#[test]
fn import_rewrites_hql_sources_to_js() {
    let program = lower("(import [add as plus] from \"./math.hql\")");
    let IrStmtKind::ImportDecl {
        specifiers, source, ..
    } = &program.body[0].kind
    else {
        panic!("expected an import declaration");
    };
    assert_eq!(source, "./math.js");
    assert_eq!(specifiers[0].imported, "add");
    assert_eq!(specifiers[0].local, "plus");
}

#[test]
fn export_variants_lower_distinctly() {
    let program = lower("(export [a b])\n(export answer 42)\n(export default (fn [] 1))");
    assert!(matches!(&program.body[0].kind, IrStmtKind::ExportNamed { .. }));
    assert!(matches!(&program.body[1].kind, IrStmtKind::ExportVarDecl(_)));
    assert!(matches!(&program.body[2].kind, IrStmtKind::ExportDefault(_)));
}

/// The placeholder `_` lowers to the string `"_"`.
#[test]
fn underscore_is_the_placeholder_string() {
    let program = lower("(f _)");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Call { args, .. } = &expr.kind else {
        panic!("expected a call");
    };
    assert!(matches!(&args[0].kind, IrExprKind::Str(s) if s == "_"));
}

#[test]
fn keyword_heads_look_up_through_the_helper() {
    let program = lower("(:name person)");
    let IrStmtKind::ExprStmt(expr) = &program.body[0].kind else {
        panic!("expected an expression statement");
    };
    let IrExprKind::Call { callee, args } = &expr.kind else {
        panic!("expected a call");
    };
    assert!(matches!(&callee.kind, IrExprKind::Identifier { name, is_js: true } if name == "__hql_get"));
    assert!(matches!(&args[1].kind, IrExprKind::Str(s) if s == "name"));
}
