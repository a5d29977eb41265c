//! The reader: source text to S-expression AST with source positions.
//!
//! One pass, hand-rolled, no separate token stream: the reader consumes
//! characters and produces [`Sexp`] nodes directly. Commas are whitespace,
//! `;` starts a line comment, and the reader-macro prefixes are expanded
//! inline: `'x` → `(quote x)`, `` `(...) `` → `(quasiquote ...)`,
//! `~x` → `(unquote x)`, `~@x` → `(unquote-splicing x)`, `@x` → `(await x)`,
//! `[...]` → `(vector ...)`, `{...}` → `(hash-map ...)`,
//! `#[...]` → `(hash-set ...)`.
//!
//! A backtick starts a quasiquote when immediately followed by an opening
//! delimiter, `~`, or another backtick, and a template literal otherwise;
//! template literals expand to
//! `(template-literal p0 e0 p1 ... pn)` with `${...}` sub-expressions read
//! recursively at their real source positions.

use crate::{
    ast::{Literal, Position, Sexp, Span},
    error::ParseError,
    intern::{Interner, StringId},
};

/// Result of reading one document: the top-level forms read so far plus
/// any parse error. On an unrecoverable error the reader records one
/// error and stops reading further top-level forms; forms already read
/// are kept so partial analysis can proceed.
#[derive(Debug)]
pub struct ReadOutcome {
    pub forms: Vec<Sexp>,
    pub errors: Vec<ParseError>,
}

/// Reads all top-level forms from `text`.
pub fn read(text: &str, file: &str, interner: &mut Interner) -> ReadOutcome {
    let file_id = interner.intern(file);
    let mut reader = Reader::new(text, file_id, Position::new(1, 1), interner);
    let mut forms = Vec::new();
    let mut errors = Vec::new();

    loop {
        reader.skip_trivia();
        if reader.at_eof() {
            break;
        }
        match reader.read_form() {
            Ok(form) => forms.push(form),
            Err(error) => {
                errors.push(error);
                break;
            }
        }
    }

    ReadOutcome { forms, errors }
}

/// Convenience wrapper returning a hard error when anything failed.
pub fn read_strict(text: &str, file: &str, interner: &mut Interner) -> Result<Vec<Sexp>, ParseError> {
    let outcome = read(text, file, interner);
    match outcome.errors.into_iter().next() {
        Some(error) => Err(error),
        None => Ok(outcome.forms),
    }
}

struct Reader<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    file_id: StringId,
    interner: &'a mut Interner,
}

impl<'a> Reader<'a> {
    fn new(text: &str, file_id: StringId, start: Position, interner: &'a mut Interner) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: start.line,
            column: start.column,
            file_id,
            interner,
        }
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(self.file_id, start, self.position())
    }

    fn error(&self, message: impl Into<String>, start: Position) -> ParseError {
        ParseError::syntax(message, self.span_from(start))
    }

    /// Skips whitespace (commas included) and `;` line comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() || c == ',' => {
                    self.bump();
                }
                Some(';') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_form(&mut self) -> Result<Sexp, ParseError> {
        self.skip_trivia();
        let start = self.position();
        let Some(c) = self.peek() else {
            return Err(self.error("unexpected end of input", start));
        };

        match c {
            '(' => {
                self.bump();
                let items = self.read_until(')', start)?;
                Ok(Sexp::list(items, Some(self.span_from(start))))
            }
            '[' => {
                self.bump();
                let items = self.read_until(']', start)?;
                Ok(self.wrapped_list("vector", items, start))
            }
            '{' => {
                self.bump();
                let items = self.read_until('}', start)?;
                Ok(self.wrapped_list("hash-map", items, start))
            }
            '#' if self.peek_at(1) == Some('[') => {
                self.bump();
                self.bump();
                let items = self.read_until(']', start)?;
                Ok(self.wrapped_list("hash-set", items, start))
            }
            ')' | ']' | '}' => Err(self.error(format!("unexpected '{c}'"), start)),
            '\'' => {
                self.bump();
                self.read_prefixed("quote", start)
            }
            '~' => {
                self.bump();
                if self.peek() == Some('@') {
                    self.bump();
                    self.read_prefixed("unquote-splicing", start)
                } else {
                    self.read_prefixed("unquote", start)
                }
            }
            '@' => {
                self.bump();
                self.read_prefixed("await", start)
            }
            '`' => {
                self.bump();
                // Backtick directly before an opening delimiter (or another
                // quasiquote level) is quasiquote; anything else starts a
                // template literal.
                if matches!(self.peek(), Some('(' | '[' | '{' | '~' | '`')) {
                    self.read_prefixed("quasiquote", start)
                } else {
                    self.read_template_literal(start)
                }
            }
            '"' => {
                self.bump();
                let value = self.read_string_body('"', start)?;
                Ok(Sexp::literal(Literal::Str(value), Some(self.span_from(start))))
            }
            c if c.is_ascii_digit() => self.read_number(start),
            '-' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(start),
            _ => self.read_symbol_or_named_literal(start),
        }
    }

    /// Reads forms until the closing delimiter, which is consumed.
    fn read_until(&mut self, close: char, open_start: Position) -> Result<Vec<Sexp>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(self.error(format!("unterminated list, expected '{close}'"), open_start)),
                Some(c) if c == close => {
                    self.bump();
                    return Ok(items);
                }
                Some(_) => items.push(self.read_form()?),
            }
        }
    }

    /// `(head items...)` with the span of the bracketed region.
    fn wrapped_list(&mut self, head: &str, items: Vec<Sexp>, start: Position) -> Sexp {
        let span = self.span_from(start);
        let head_id = self.interner.intern(head);
        let mut list = Vec::with_capacity(items.len() + 1);
        list.push(Sexp::symbol(head_id, Some(span)));
        list.extend(items);
        Sexp::list(list, Some(span))
    }

    /// Reads one form and wraps it as `(prefix form)`.
    fn read_prefixed(&mut self, prefix: &str, start: Position) -> Result<Sexp, ParseError> {
        let form = self.read_form()?;
        let span = self.span_from(start);
        let head_id = self.interner.intern(prefix);
        Ok(Sexp::list(vec![Sexp::symbol(head_id, Some(span)), form], Some(span)))
    }

    /// Reads a string body up to the (consumed) terminator, applying escapes.
    fn read_string_body(&mut self, terminator: char, start: Position) -> Result<String, ParseError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal", start)),
                Some(c) if c == terminator => return Ok(value),
                Some('\\') => value.push(self.read_escape(start)?),
                Some(c) => value.push(c),
            }
        }
    }

    /// Decodes one backslash escape; the backslash is already consumed.
    ///
    /// `\n`, `\t`, `\r`, `\0`, and `\u{...}` decode; any other escaped
    /// character stands for itself (`\\`, `\"`, `` \` ``, `\$`, `\'`).
    fn read_escape(&mut self, start: Position) -> Result<char, ParseError> {
        match self.bump() {
            None => Err(self.error("unterminated escape sequence", start)),
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('u') => self.read_unicode_escape(start),
            Some(other) => Ok(other),
        }
    }

    /// `\u{XXXX}`: braced hex digits decoding to a Unicode scalar value.
    fn read_unicode_escape(&mut self, start: Position) -> Result<char, ParseError> {
        if self.peek() != Some('{') {
            return Err(self.error("expected '{' after \\u in a unicode escape", start));
        }
        self.bump();
        let mut digits = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated unicode escape", start)),
                Some('}') => break,
                Some(c) if c.is_ascii_hexdigit() && digits.len() < 6 => digits.push(c),
                Some(c) => {
                    return Err(self.error(format!("invalid character '{c}' in unicode escape"), start));
                }
            }
        }
        if digits.is_empty() {
            return Err(self.error("empty unicode escape", start));
        }
        let value = u32::from_str_radix(&digits, 16)
            .map_err(|_| self.error(format!("invalid unicode escape '\\u{{{digits}}}'"), start))?;
        char::from_u32(value)
            .ok_or_else(|| self.error(format!("\\u{{{digits}}} is not a valid unicode scalar value"), start))
    }

    /// Reads a backtick template literal into
    /// `(template-literal p0 e0 p1 ... pn)` where `pi` are string parts
    /// and `ei` are the expressions read from within `${...}`.
    fn read_template_literal(&mut self, start: Position) -> Result<Sexp, ParseError> {
        let mut parts: Vec<Sexp> = Vec::new();
        let mut current = String::new();
        let mut part_start = self.position();

        loop {
            match self.peek() {
                None => return Err(self.error("unterminated template literal", start)),
                Some('`') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    current.push(self.read_escape(start)?);
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    let part_span = Span::new(self.file_id, part_start, self.position());
                    parts.push(Sexp::literal(Literal::Str(std::mem::take(&mut current)), Some(part_span)));
                    self.bump();
                    self.bump();
                    let expr_start = self.position();
                    let inner = self.capture_interpolation(start)?;
                    parts.push(self.read_interpolation(&inner, expr_start)?);
                    part_start = self.position();
                }
                Some(_) => {
                    let c = self.bump().expect("peeked char");
                    current.push(c);
                }
            }
        }

        let part_span = Span::new(self.file_id, part_start, self.position());
        parts.push(Sexp::literal(Literal::Str(current), Some(part_span)));

        let span = self.span_from(start);
        let head_id = self.interner.intern("template-literal");
        let mut list = Vec::with_capacity(parts.len() + 1);
        list.push(Sexp::symbol(head_id, Some(span)));
        list.extend(parts);
        Ok(Sexp::list(list, Some(span)))
    }

    /// Captures the text of one `${...}` interpolation, handling nested
    /// braces and strings, consuming the closing `}`.
    fn capture_interpolation(&mut self, start: Position) -> Result<String, ParseError> {
        let mut inner = String::new();
        let mut depth = 1usize;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated interpolation in template literal", start)),
                Some('{') => {
                    depth += 1;
                    inner.push('{');
                    self.bump();
                }
                Some('}') => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        return Ok(inner);
                    }
                    inner.push('}');
                }
                Some('"') => {
                    inner.push('"');
                    self.bump();
                    loop {
                        match self.bump() {
                            None => return Err(self.error("unterminated string in interpolation", start)),
                            Some('\\') => {
                                inner.push('\\');
                                if let Some(next) = self.bump() {
                                    inner.push(next);
                                }
                            }
                            Some('"') => {
                                inner.push('"');
                                break;
                            }
                            Some(c) => inner.push(c),
                        }
                    }
                }
                Some(_) => {
                    let c = self.bump().expect("peeked char");
                    inner.push(c);
                }
            }
        }
    }

    /// Reads the captured interpolation text as a single form, keeping
    /// source positions anchored at the interpolation's real location.
    fn read_interpolation(&mut self, text: &str, at: Position) -> Result<Sexp, ParseError> {
        let mut sub = Reader::new(text, self.file_id, at, self.interner);
        sub.skip_trivia();
        if sub.at_eof() {
            return Err(ParseError::syntax(
                "empty interpolation in template literal",
                Span::point(self.file_id, at),
            ));
        }
        let form = sub.read_form()?;
        sub.skip_trivia();
        if !sub.at_eof() {
            return Err(ParseError::syntax(
                "interpolation must contain exactly one expression",
                Span::point(self.file_id, at),
            ));
        }
        Ok(form)
    }

    fn read_number(&mut self, start: Position) -> Result<Sexp, ParseError> {
        let token = self.take_token();
        let span = self.span_from(start);
        parse_number(&token).map(|lit| Sexp::literal(lit, Some(span))).ok_or_else(|| {
            ParseError::syntax(format!("invalid numeric literal '{token}'"), span)
        })
    }

    fn read_symbol_or_named_literal(&mut self, start: Position) -> Result<Sexp, ParseError> {
        let token = self.take_token();
        let span = self.span_from(start);
        if token.is_empty() {
            return Err(ParseError::syntax("unexpected character", span));
        }
        let node = match token.as_str() {
            "nil" => Sexp::literal(Literal::Nil, Some(span)),
            "true" => Sexp::literal(Literal::Bool(true), Some(span)),
            "false" => Sexp::literal(Literal::Bool(false), Some(span)),
            _ => {
                let id = self.interner.intern(&token);
                Sexp::symbol(id, Some(span))
            }
        };
        Ok(node)
    }

    /// Takes the longest run of non-delimiter, non-whitespace characters.
    fn take_token(&mut self) -> String {
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            token.push(c);
            self.bump();
        }
        token
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | '\'' | '`' | '~')
}

/// Parses one numeric token: int, float (with exponent), radix-prefixed
/// (`0x`, `0b`, `0o`), and the BigInt `n` suffix.
fn parse_number(token: &str) -> Option<Literal> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    if let Some(big) = digits.strip_suffix('n') {
        if !big.is_empty() && big.chars().all(|c| c.is_ascii_digit()) {
            let rendered = if negative { format!("-{big}") } else { big.to_owned() };
            return Some(Literal::BigInt(rendered));
        }
        return None;
    }

    let radix = match digits.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0b" | "0B") => Some(2),
        Some("0o" | "0O") => Some(8),
        _ => None,
    };
    if let Some(radix) = radix {
        let value = i64::from_str_radix(&digits[2..], radix).ok()?;
        return Some(Literal::Int(if negative { -value } else { value }));
    }

    if digits.contains(['.', 'e', 'E']) {
        let value: f64 = token.parse().ok()?;
        return Some(Literal::Float(value));
    }

    let value: i64 = token.parse().ok()?;
    Some(Literal::Int(value))
}
