//! Reader behavior: positions, reader macros, template literals,
//! numeric forms, and error recovery.

use hql::{Interner, Literal, Sexp, SexpKind, read, read_strict};
use pretty_assertions::assert_eq;

fn read_one(source: &str, interner: &mut Interner) -> Sexp {
    let forms = read_strict(source, "test.hql", interner).expect("source should parse");
    assert_eq!(forms.len(), 1, "expected exactly one form from {source:?}");
    forms.into_iter().next().expect("checked length")
}

/// `(a 1)` positions: the head symbol starts at column 2 and the integer
/// at column 4, 1-based.
#[test]
fn reader_records_positions() {
    let mut interner = Interner::new();
    let form = read_one("(a 1)", &mut interner);
    let items = form.as_list().expect("form is a list");
    assert_eq!(items.len(), 2);

    let head_span = items[0].span.expect("head has a span");
    assert_eq!(head_span.start.line, 1);
    assert_eq!(head_span.start.column, 2, "head symbol should start at column 2");

    let int_span = items[1].span.expect("int has a span");
    assert_eq!(int_span.start.column, 4, "integer should start at column 4");
    assert_eq!(items[1].as_literal(), Some(&Literal::Int(1)));
}

#[test]
fn named_literals_read_as_literals() {
    let mut interner = Interner::new();
    assert_eq!(read_one("nil", &mut interner).as_literal(), Some(&Literal::Nil));
    assert_eq!(read_one("true", &mut interner).as_literal(), Some(&Literal::Bool(true)));
    assert_eq!(read_one("false", &mut interner).as_literal(), Some(&Literal::Bool(false)));
}

#[test]
fn numeric_literals_cover_radixes_and_bigints() {
    let mut interner = Interner::new();
    assert_eq!(read_one("42", &mut interner).as_literal(), Some(&Literal::Int(42)));
    assert_eq!(read_one("-7", &mut interner).as_literal(), Some(&Literal::Int(-7)));
    assert_eq!(read_one("0xff", &mut interner).as_literal(), Some(&Literal::Int(255)));
    assert_eq!(read_one("0b101", &mut interner).as_literal(), Some(&Literal::Int(5)));
    assert_eq!(read_one("0o17", &mut interner).as_literal(), Some(&Literal::Int(15)));
    assert_eq!(read_one("2.5", &mut interner).as_literal(), Some(&Literal::Float(2.5)));
    assert_eq!(read_one("1e3", &mut interner).as_literal(), Some(&Literal::Float(1000.0)));
    assert_eq!(
        read_one("123n", &mut interner).as_literal(),
        Some(&Literal::BigInt("123".to_owned()))
    );
}

/// A leading `-` reads as a number only when a digit follows.
#[test]
fn minus_symbol_is_not_a_number() {
    let mut interner = Interner::new();
    let form = read_one("-", &mut interner);
    assert!(matches!(form.kind, SexpKind::Symbol(_)), "bare '-' should be a symbol");
    let arrow = read_one("->", &mut interner);
    assert!(matches!(arrow.kind, SexpKind::Symbol(_)), "'->' should be a symbol");
}

#[test]
fn commas_are_whitespace() {
    let mut interner = Interner::new();
    let form = read_one("[1, 2, 3]", &mut interner);
    let items = form.as_list().expect("vector reads as a list");
    // vector head plus three elements
    assert_eq!(items.len(), 4);
}

#[test]
fn quote_and_unquote_prefixes_expand() {
    let mut interner = Interner::new();
    assert_eq!(read_one("'x", &mut interner).display(&interner).to_string(), "(quote x)");
    assert_eq!(
        read_one("`(+ 1 ~x)", &mut interner).display(&interner).to_string(),
        "(quasiquote (+ 1 (unquote x)))"
    );
    assert_eq!(
        read_one("`(list ~@xs)", &mut interner).display(&interner).to_string(),
        "(quasiquote (list (unquote-splicing xs)))"
    );
}

#[test]
fn bracket_literals_expand_to_vector_and_map_and_set() {
    let mut interner = Interner::new();
    assert_eq!(
        read_one("[1 2]", &mut interner).display(&interner).to_string(),
        "(vector 1 2)"
    );
    assert_eq!(
        read_one("{a 1}", &mut interner).display(&interner).to_string(),
        "(hash-map a 1)"
    );
    assert_eq!(
        read_one("#[1 2]", &mut interner).display(&interner).to_string(),
        "(hash-set 1 2)"
    );
}

#[test]
fn template_literal_expands_with_interpolations() {
    let mut interner = Interner::new();
    let form = read_one("`hi ${name}!`", &mut interner);
    let items = form.as_list().expect("template literal reads as a list");
    assert_eq!(
        items[0].as_symbol().map(|id| interner.resolve(id)),
        Some("template-literal")
    );
    assert_eq!(items[1].as_literal(), Some(&Literal::Str("hi ".to_owned())));
    assert!(items[2].as_symbol().is_some(), "interpolation should read as a form");
    assert_eq!(items[3].as_literal(), Some(&Literal::Str("!".to_owned())));
}

/// Interpolations keep their real source positions.
#[test]
fn template_interpolation_positions_anchor_in_source() {
    let mut interner = Interner::new();
    let form = read_one("`a${x}b`", &mut interner);
    let items = form.as_list().expect("template literal reads as a list");
    let expr_span = items[2].span.expect("interpolated form has a span");
    // `a${x}b` - x sits at column 5.
    assert_eq!(expr_span.start.column, 5);
}

#[test]
fn string_escapes_apply() {
    let mut interner = Interner::new();
    assert_eq!(
        read_one(r#""a\nb\t\"c\"""#, &mut interner).as_literal(),
        Some(&Literal::Str("a\nb\t\"c\"".to_owned()))
    );
    assert_eq!(
        read_one(r#""nul:\0""#, &mut interner).as_literal(),
        Some(&Literal::Str("nul:\0".to_owned())),
        "backslash-zero decodes to a NUL byte, not the character '0'"
    );
}

#[test]
fn unicode_escapes_decode_to_scalars() {
    let mut interner = Interner::new();
    assert_eq!(
        read_one(r#""\u{41}""#, &mut interner).as_literal(),
        Some(&Literal::Str("A".to_owned()))
    );
    assert_eq!(
        read_one(r#""\u{1F600}""#, &mut interner).as_literal(),
        Some(&Literal::Str("\u{1F600}".to_owned())),
        "astral-plane escapes decode to one scalar"
    );
}

#[test]
fn template_literals_decode_the_same_escapes() {
    let mut interner = Interner::new();
    let form = read_one(r"`a\u{41}b\0`", &mut interner);
    let items = form.as_list().expect("template literal reads as a list");
    assert_eq!(items[1].as_literal(), Some(&Literal::Str("aAb\0".to_owned())));
}

#[test]
fn malformed_unicode_escapes_are_errors() {
    for source in [
        r#""\u{ZZ}""#,     // non-hex digit
        r#""\u{}""#,       // empty braces
        r#""\u{41""#,      // unterminated braces
        r#""\u41}""#,      // missing opening brace
        r#""\u{110000}""#, // beyond the last scalar value
    ] {
        let mut interner = Interner::new();
        let outcome = read(source, "test.hql", &mut interner);
        assert_eq!(outcome.errors.len(), 1, "{source} should fail to read");
        assert!(
            outcome.errors[0].message.contains("unicode escape")
                || outcome.errors[0].message.contains("scalar value"),
            "{source} should report the escape, got: {}",
            outcome.errors[0].message
        );
    }
}

#[test]
fn line_comments_are_skipped() {
    let mut interner = Interner::new();
    let outcome = read("; heading\n(a) ; trailing\n(b)", "test.hql", &mut interner);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.forms.len(), 2);
}

/// The reader keeps forms read before the error and stops at the error.
#[test]
fn reader_keeps_prefix_on_error() {
    let mut interner = Interner::new();
    let outcome = read("(def ok 1)\n(def broken", "test.hql", &mut interner);
    assert_eq!(outcome.forms.len(), 1, "the form before the error should be kept");
    assert_eq!(outcome.errors.len(), 1);
    assert!(
        outcome.errors[0].message.contains("unterminated"),
        "got: {}",
        outcome.errors[0].message
    );
}

#[test]
fn unexpected_close_paren_is_an_error() {
    let mut interner = Interner::new();
    let outcome = read(")", "test.hql", &mut interner);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.forms.is_empty());
}

/// reader ∘ print is the identity on literal values.
#[test]
fn print_round_trips_literals() {
    let mut interner = Interner::new();
    for source in ["nil", "true", "false", "42", "-7", "2.5", "\"hi\"", "123n"] {
        let first = read_one(source, &mut interner);
        let printed = first.display(&interner).to_string();
        let second = read_one(&printed, &mut interner);
        assert_eq!(
            first.as_literal(),
            second.as_literal(),
            "literal {source:?} should round-trip through print"
        );
    }
}

#[test]
fn deref_prefix_reads_as_await() {
    let mut interner = Interner::new();
    assert_eq!(
        read_one("@p", &mut interner).display(&interner).to_string(),
        "(await p)"
    );
}
