//! The macro expander: fixed-point template expansion over the AST.
//!
//! Macros come in two flavors. Template macros are defined in HQL itself
//! with `(macro name [params] body)` and instantiated by substitution with
//! quasiquote/unquote/unquote-splicing and gensym. A handful of bootstrap
//! forms whose rewriting needs real control flow (`cond`, the threading
//! arrows, `doto`, `when-let`, `if-let`) are native single-step rewrites.
//!
//! Expansion runs to a fixed point per top-level form, bounded by
//! [`MAX_EXPANSION_ITERATIONS`]; macro-definition forms register and are
//! removed from the output. Expansion is purely functional over the
//! immutable AST; gensym determinism is per-session (serial within a file).

use ahash::AHashMap;

use crate::{
    ast::{Literal, Sexp, SexpKind, Span},
    error::{ExpansionError, HqlError, ValidationError},
    intern::{Interner, StringId},
    reader,
};

/// Upper bound on fixed-point iterations per top-level form.
pub const MAX_EXPANSION_ITERATIONS: usize = 100;

/// Bootstrap macros shipped with the system, defined in HQL source.
///
/// These are parsed and registered when a [`MacroTable`] is built; they
/// survive `reset` while user macros do not.
const SYSTEM_MACRO_SOURCE: &str = r#"
(macro when [test & body] `(if ~test (do ~@body) nil))
(macro unless [test & body] `(if ~test nil (do ~@body)))
(macro inc [x] `(+ ~x 1))
(macro dec [x] `(- ~x 1))
(macro str? [x] `(=== (typeof ~x) "string"))
(macro num? [x] `(=== (typeof ~x) "number"))
(macro bool? [x] `(=== (typeof ~x) "boolean"))
(macro fn? [x] `(=== (typeof ~x) "function"))
(macro nil? [x] `(=== ~x nil))
"#;

/// A template macro: positional parameters, an optional rest parameter,
/// and the body template.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub params: Vec<StringId>,
    pub rest_param: Option<StringId>,
    pub body: Sexp,
}

/// Bootstrap rewrites that need structural logic rather than a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NativeMacro {
    Cond,
    ThreadFirst,
    ThreadLast,
    Doto,
    WhenLet,
    IfLet,
}

#[derive(Debug, Clone)]
enum MacroEntry {
    Template(MacroDef),
    Native(NativeMacro),
}

/// Interned ids for the structural symbols the expander dispatches on.
#[derive(Debug, Clone, Copy)]
struct ExpandIds {
    quote: StringId,
    quasiquote: StringId,
    unquote: StringId,
    unquote_splicing: StringId,
    macro_head: StringId,
    gensym: StringId,
    vector: StringId,
}

impl ExpandIds {
    fn new(interner: &mut Interner) -> Self {
        Self {
            quote: interner.intern("quote"),
            quasiquote: interner.intern("quasiquote"),
            unquote: interner.intern("unquote"),
            unquote_splicing: interner.intern("unquote-splicing"),
            macro_head: interner.intern("macro"),
            gensym: interner.intern("gensym"),
            vector: interner.intern("vector"),
        }
    }
}

/// The registry of macros known to a session.
#[derive(Debug)]
pub struct MacroTable {
    system: AHashMap<StringId, MacroEntry>,
    user: AHashMap<StringId, MacroEntry>,
    ids: ExpandIds,
    gensym_counter: u64,
}

impl MacroTable {
    /// Builds a table with the bootstrap macros registered.
    pub fn bootstrap(interner: &mut Interner) -> Self {
        let ids = ExpandIds::new(interner);
        let mut table = Self {
            system: AHashMap::new(),
            user: AHashMap::new(),
            ids,
            gensym_counter: 0,
        };

        for (name, native) in [
            ("cond", NativeMacro::Cond),
            ("->", NativeMacro::ThreadFirst),
            ("->>", NativeMacro::ThreadLast),
            ("doto", NativeMacro::Doto),
            ("when-let", NativeMacro::WhenLet),
            ("if-let", NativeMacro::IfLet),
        ] {
            let id = interner.intern(name);
            table.system.insert(id, MacroEntry::Native(native));
        }

        let forms = reader::read_strict(SYSTEM_MACRO_SOURCE, "<builtin-macros>", interner)
            .expect("builtin macro source must parse");
        for form in &forms {
            let (name, def) = parse_macro_definition(form, interner).expect("builtin macro source must be valid");
            table.system.insert(name, MacroEntry::Template(def));
        }
        table
    }

    /// True when `name` heads a registered macro.
    #[must_use]
    pub fn is_macro(&self, name: StringId) -> bool {
        self.user.contains_key(&name) || self.system.contains_key(&name)
    }

    /// Registers a user macro, shadowing any previous definition.
    pub fn define(&mut self, name: StringId, def: MacroDef) {
        self.user.insert(name, MacroEntry::Template(def));
    }

    /// Drops every user macro, keeping the bootstrap set.
    pub fn reset(&mut self) {
        self.user.clear();
        self.gensym_counter = 0;
    }

    /// All registered macro names, resolved; used by completion.
    #[must_use]
    pub fn macro_names(&self, interner: &Interner) -> Vec<String> {
        let mut names: Vec<String> = self
            .system
            .keys()
            .chain(self.user.keys())
            .map(|id| interner.resolve(*id).to_owned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn entry(&self, name: StringId) -> Option<&MacroEntry> {
        self.user.get(&name).or_else(|| self.system.get(&name))
    }

    fn fresh_symbol(&mut self, prefix: &str, interner: &mut Interner) -> StringId {
        let name = format!("{prefix}{}", self.gensym_counter);
        self.gensym_counter += 1;
        interner.intern(&name)
    }
}

/// Result of expanding a document's forms: macro definitions registered
/// and removed, every other form expanded to its fixed point. A form that
/// fails is dropped; the error is collected and later forms still expand.
#[derive(Debug)]
pub struct ExpandOutcome {
    pub forms: Vec<Sexp>,
    pub errors: Vec<HqlError>,
}

/// Expands all top-level forms. See [`ExpandOutcome`].
pub fn expand_forms(forms: &[Sexp], table: &mut MacroTable, interner: &mut Interner) -> ExpandOutcome {
    let mut out = Vec::with_capacity(forms.len());
    let mut errors = Vec::new();
    for form in forms {
        if form.head_symbol() == Some(table.ids.macro_head) {
            match parse_macro_definition(form, interner) {
                Ok((name, def)) => table.define(name, def),
                Err(error) => errors.push(error.into()),
            }
            continue;
        }
        match expand_form(form, table, interner) {
            Ok(expanded) => out.push(expanded),
            Err(error) => errors.push(error.into()),
        }
    }
    ExpandOutcome { forms: out, errors }
}

/// Expands a single form to its fixed point.
pub fn expand_form(form: &Sexp, table: &mut MacroTable, interner: &mut Interner) -> Result<Sexp, ExpansionError> {
    let mut current = form.clone();
    for _ in 0..MAX_EXPANSION_ITERATIONS {
        let (next, changed) = expand_step(&current, table, interner)?;
        if !changed {
            return Ok(next);
        }
        current = next;
    }
    Err(ExpansionError::iteration_limit(form.span))
}

/// One expansion step: the outermost macro call in each subtree is
/// replaced by its expansion; quote and quasiquote subtrees are opaque.
fn expand_step(node: &Sexp, table: &mut MacroTable, interner: &mut Interner) -> Result<(Sexp, bool), ExpansionError> {
    let SexpKind::List(items) = &node.kind else {
        return Ok((node.clone(), false));
    };

    if let Some(head) = node.head_symbol() {
        // Quoted data is never expanded; quasiquote delays until a macro
        // instantiates the template.
        if head == table.ids.quote || head == table.ids.quasiquote {
            return Ok((node.clone(), false));
        }
        if table.entry(head).is_some() {
            let name = interner.resolve(head).to_owned();
            let expanded = apply_macro(&name, head, &items[1..], node.span, table, interner)?;
            return Ok((expanded, true));
        }
    }

    let mut changed = false;
    let mut new_items = Vec::with_capacity(items.len());
    for item in items {
        let (expanded, item_changed) = expand_step(item, table, interner)?;
        changed |= item_changed;
        new_items.push(expanded);
    }
    Ok((Sexp::list(new_items, node.span), changed))
}

/// Parses `(macro name [params] body...)` into a definition.
fn parse_macro_definition(form: &Sexp, interner: &mut Interner) -> Result<(StringId, MacroDef), ValidationError> {
    let items = form.as_list().unwrap_or_default();
    if items.len() < 4 {
        return Err(ValidationError::new(
            "macro",
            "(macro name [params] body)",
            format!("{} element(s)", items.len()),
            form.span,
        ));
    }
    let name = items[1]
        .as_symbol()
        .ok_or_else(|| ValidationError::new("macro", "symbol name", "non-symbol", items[1].span))?;

    let vector_id = interner.intern("vector");
    let amp_id = interner.intern("&");
    let param_items = match &items[2].kind {
        SexpKind::List(elems) if items[2].head_symbol() == Some(vector_id) => &elems[1..],
        _ => {
            return Err(ValidationError::new(
                "macro",
                "parameter vector",
                "non-vector parameters",
                items[2].span,
            ));
        }
    };

    let mut params = Vec::new();
    let mut rest_param = None;
    let mut iter = param_items.iter();
    while let Some(item) = iter.next() {
        let id = item
            .as_symbol()
            .ok_or_else(|| ValidationError::new("macro", "symbol parameter", "non-symbol", item.span))?;
        if id == amp_id {
            let rest = iter.next().ok_or_else(|| {
                ValidationError::new("macro", "rest parameter after '&'", "end of vector", items[2].span)
            })?;
            rest_param = Some(rest.as_symbol().ok_or_else(|| {
                ValidationError::new("macro", "symbol rest parameter", "non-symbol", rest.span)
            })?);
            break;
        }
        params.push(id);
    }

    // Multiple body forms behave as an implicit `do`.
    let body = if items.len() == 4 {
        items[3].clone()
    } else {
        let do_id = interner.intern("do");
        let mut body_items = Vec::with_capacity(items.len() - 2);
        body_items.push(Sexp::symbol(do_id, form.span));
        body_items.extend(items[3..].iter().cloned());
        Sexp::list(body_items, form.span)
    };

    Ok((
        name,
        MacroDef {
            params,
            rest_param,
            body,
        },
    ))
}

/// A parameter binding during instantiation: one node, or the remaining
/// argument nodes for a rest parameter.
#[derive(Debug, Clone)]
enum Binding {
    One(Sexp),
    Many(Vec<Sexp>),
}

type Env = AHashMap<StringId, Binding>;

fn apply_macro(
    name: &str,
    head: StringId,
    args: &[Sexp],
    span: Option<Span>,
    table: &mut MacroTable,
    interner: &mut Interner,
) -> Result<Sexp, ExpansionError> {
    let entry = table.entry(head).cloned().expect("caller checked the entry exists");
    match entry {
        MacroEntry::Native(native) => expand_native(native, name, args, span, table, interner),
        MacroEntry::Template(def) => {
            if args.len() < def.params.len() {
                let expected = expected_arity(&def);
                return Err(ExpansionError::arity(name, expected, args.len(), span));
            }
            if args.len() > def.params.len() && def.rest_param.is_none() {
                let expected = expected_arity(&def);
                return Err(ExpansionError::arity(name, expected, args.len(), span));
            }

            let mut env: Env = AHashMap::new();
            for (param, arg) in def.params.iter().zip(args) {
                env.insert(*param, Binding::One(arg.clone()));
            }
            if let Some(rest) = def.rest_param {
                env.insert(rest, Binding::Many(args[def.params.len()..].to_vec()));
            }

            let mut instantiation = Instantiation {
                env: &env,
                table,
                interner,
                auto_gensyms: AHashMap::new(),
            };
            instantiation.instantiate(&def.body)
        }
    }
}

fn expected_arity(def: &MacroDef) -> String {
    if def.rest_param.is_some() {
        format!(">={}", def.params.len())
    } else {
        format!("{}", def.params.len())
    }
}

/// One macro application in progress: the parameter environment plus the
/// per-expansion-site auto-gensym map (`x#` resolves to the same fresh
/// symbol everywhere within a single expansion).
struct Instantiation<'a> {
    env: &'a Env,
    table: &'a mut MacroTable,
    interner: &'a mut Interner,
    auto_gensyms: AHashMap<StringId, StringId>,
}

enum QqOut {
    One(Sexp),
    Spliced(Vec<Sexp>),
}

impl Instantiation<'_> {
    /// Instantiates a template outside quasiquote: parameter symbols
    /// substitute directly, `(quasiquote x)` evaluates the template.
    fn instantiate(&mut self, node: &Sexp) -> Result<Sexp, ExpansionError> {
        match &node.kind {
            SexpKind::Literal(_) => Ok(node.clone()),
            SexpKind::Symbol(id) => Ok(self.substitute_symbol(*id, node)),
            SexpKind::List(items) => {
                let head = node.head_symbol();
                if head == Some(self.table.ids.quasiquote) && items.len() == 2 {
                    return match self.quasi(&items[1], 1)? {
                        QqOut::One(out) => Ok(out),
                        QqOut::Spliced(_) => Err(ExpansionError::cause(
                            "unquote-splicing cannot appear at the top of a template",
                            node.span,
                        )),
                    };
                }
                if head == Some(self.table.ids.unquote) && items.len() == 2 {
                    return self.eval_template_expr(&items[1]);
                }
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.instantiate(item)?);
                }
                Ok(Sexp::list(out, node.span))
            }
        }
    }

    fn substitute_symbol(&mut self, id: StringId, node: &Sexp) -> Sexp {
        match self.env.get(&id) {
            Some(Binding::One(bound)) => bound.clone(),
            Some(Binding::Many(bound)) => Sexp::list(bound.clone(), node.span),
            None => node.clone(),
        }
    }

    /// Quasiquote instantiation with level tracking. Inside quasiquote
    /// nothing substitutes until an unquote brings it back to level zero.
    fn quasi(&mut self, node: &Sexp, level: u32) -> Result<QqOut, ExpansionError> {
        match &node.kind {
            SexpKind::Literal(_) => Ok(QqOut::One(node.clone())),
            SexpKind::Symbol(id) => Ok(QqOut::One(self.auto_gensym(*id, node))),
            SexpKind::List(items) => {
                let head = node.head_symbol();
                if head == Some(self.table.ids.unquote) && items.len() == 2 {
                    if level == 1 {
                        return Ok(QqOut::One(self.eval_template_expr(&items[1])?));
                    }
                    let inner = self.quasi_rebuild(&items[1], level - 1)?;
                    return Ok(QqOut::One(self.rewrap(&items[0], inner, node.span)));
                }
                if head == Some(self.table.ids.unquote_splicing) && items.len() == 2 {
                    if level == 1 {
                        let value = self.eval_template_expr(&items[1])?;
                        return Ok(QqOut::Spliced(self.splice_items(&value, node.span)?));
                    }
                    let inner = self.quasi_rebuild(&items[1], level - 1)?;
                    return Ok(QqOut::One(self.rewrap(&items[0], inner, node.span)));
                }
                if head == Some(self.table.ids.quasiquote) && items.len() == 2 {
                    let inner = self.quasi_rebuild(&items[1], level + 1)?;
                    return Ok(QqOut::One(self.rewrap(&items[0], inner, node.span)));
                }

                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match self.quasi(item, level)? {
                        QqOut::One(one) => out.push(one),
                        QqOut::Spliced(many) => out.extend(many),
                    }
                }
                Ok(QqOut::One(Sexp::list(out, node.span)))
            }
        }
    }

    fn quasi_rebuild(&mut self, node: &Sexp, level: u32) -> Result<Sexp, ExpansionError> {
        match self.quasi(node, level)? {
            QqOut::One(out) => Ok(out),
            QqOut::Spliced(_) => Err(ExpansionError::cause(
                "unquote-splicing outside list context",
                node.span,
            )),
        }
    }

    fn rewrap(&self, head: &Sexp, inner: Sexp, span: Option<Span>) -> Sexp {
        Sexp::list(vec![head.clone(), inner], span)
    }

    /// `x#` resolves to one fresh symbol per expansion site.
    fn auto_gensym(&mut self, id: StringId, node: &Sexp) -> Sexp {
        let name = self.interner.resolve(id);
        if name.len() > 1 && name.ends_with('#') {
            let base = name[..name.len() - 1].to_owned();
            if let Some(&fresh) = self.auto_gensyms.get(&id) {
                return Sexp::symbol(fresh, node.span);
            }
            let fresh = self.table.fresh_symbol(&format!("__{base}_"), self.interner);
            self.auto_gensyms.insert(id, fresh);
            return Sexp::symbol(fresh, node.span);
        }
        node.clone()
    }

    /// The items to splice for `~@x`: a raw list, or a vector literal's
    /// elements. Anything else violates the splicing contract.
    fn splice_items(&self, value: &Sexp, span: Option<Span>) -> Result<Vec<Sexp>, ExpansionError> {
        match &value.kind {
            SexpKind::List(items) => {
                if value.head_symbol() == Some(self.table.ids.vector) {
                    Ok(items[1..].to_vec())
                } else {
                    Ok(items.clone())
                }
            }
            _ => Err(ExpansionError::cause("unquote-splicing requires a list", span)),
        }
    }

    /// Evaluates an unquoted template expression: parameter references,
    /// `(gensym)` calls, and constant arithmetic over numeric literals.
    fn eval_template_expr(&mut self, expr: &Sexp) -> Result<Sexp, ExpansionError> {
        match &expr.kind {
            SexpKind::Literal(_) => Ok(expr.clone()),
            SexpKind::Symbol(id) => Ok(self.substitute_symbol(*id, expr)),
            SexpKind::List(items) => {
                if expr.head_symbol() == Some(self.table.ids.gensym) {
                    let prefix = match items.get(1).and_then(Sexp::as_literal) {
                        Some(Literal::Str(p)) => format!("__{p}_"),
                        _ => "__g".to_owned(),
                    };
                    let fresh = self.table.fresh_symbol(&prefix, self.interner);
                    return Ok(Sexp::symbol(fresh, expr.span));
                }
                if let Some(head) = expr.head_symbol() {
                    let op = self.interner.resolve(head).to_owned();
                    if matches!(op.as_str(), "+" | "-" | "*" | "/") && items.len() >= 3 {
                        if let Some(folded) = self.try_fold_arithmetic(&op, &items[1..], expr.span)? {
                            return Ok(folded);
                        }
                    }
                }
                // Not a computable form: instantiate as a nested template.
                self.instantiate(expr)
            }
        }
    }

    /// Folds arithmetic over literal operands; a non-numeric operand in an
    /// otherwise-literal computation is a type error, and integer division
    /// by zero is a numeric error. Operands that are not literals at all
    /// leave the form to be instantiated structurally.
    fn try_fold_arithmetic(
        &mut self,
        op: &str,
        operands: &[Sexp],
        span: Option<Span>,
    ) -> Result<Option<Sexp>, ExpansionError> {
        let mut values = Vec::with_capacity(operands.len());
        for operand in operands {
            let evaluated = self.eval_template_expr(operand)?;
            match evaluated.as_literal() {
                Some(Literal::Int(n)) => values.push(Num::Int(*n)),
                Some(Literal::Float(x)) => values.push(Num::Float(*x)),
                Some(_) => {
                    return Err(ExpansionError::cause(
                        format!("cannot apply '{op}' to a non-numeric literal in a macro body"),
                        span,
                    ));
                }
                None => return Ok(None),
            }
        }

        let mut acc = values[0];
        for value in &values[1..] {
            acc = acc.apply(op, *value).map_err(|cause| ExpansionError::cause(cause, span))?;
        }
        Ok(Some(Sexp::literal(acc.into_literal(), span)))
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Float(x) => x,
        }
    }

    fn apply(self, op: &str, rhs: Self) -> Result<Self, String> {
        if let (Self::Int(a), Self::Int(b)) = (self, rhs) {
            let out = match op {
                "+" => a.checked_add(b),
                "-" => a.checked_sub(b),
                "*" => a.checked_mul(b),
                "/" => {
                    if b == 0 {
                        return Err("division by zero while computing a macro literal".to_owned());
                    }
                    if a % b == 0 {
                        a.checked_div(b)
                    } else {
                        return Ok(Self::Float(a as f64 / b as f64));
                    }
                }
                _ => None,
            };
            return out
                .map(Self::Int)
                .ok_or_else(|| "integer overflow while computing a macro literal".to_owned());
        }
        let (a, b) = (self.as_f64(), rhs.as_f64());
        let out = match op {
            "+" => a + b,
            "-" => a - b,
            "*" => a * b,
            "/" => a / b,
            _ => return Err(format!("unsupported operator '{op}' in a macro literal")),
        };
        Ok(Self::Float(out))
    }

    fn into_literal(self) -> Literal {
        match self {
            Self::Int(n) => Literal::Int(n),
            Self::Float(x) => Literal::Float(x),
        }
    }
}

/// Single-step rewrites for the bootstrap forms that need structure.
fn expand_native(
    native: NativeMacro,
    name: &str,
    args: &[Sexp],
    span: Option<Span>,
    table: &mut MacroTable,
    interner: &mut Interner,
) -> Result<Sexp, ExpansionError> {
    match native {
        NativeMacro::Cond => expand_cond(args, span, interner),
        NativeMacro::ThreadFirst => expand_thread(args, span, name, /* first */ true),
        NativeMacro::ThreadLast => expand_thread(args, span, name, /* first */ false),
        NativeMacro::Doto => expand_doto(args, span, name, table, interner),
        NativeMacro::WhenLet => expand_binding_conditional(args, span, name, interner, /* has_else */ false),
        NativeMacro::IfLet => expand_binding_conditional(args, span, name, interner, /* has_else */ true),
    }
}

/// `(cond t1 e1 t2 e2 ... [else e])` → nested `if` chain ending in `nil`.
fn expand_cond(args: &[Sexp], span: Option<Span>, interner: &mut Interner) -> Result<Sexp, ExpansionError> {
    if !args.len().is_multiple_of(2) {
        return Err(ExpansionError::cause("cond requires an even number of forms", span));
    }
    let if_id = interner.intern("if");
    let else_id = interner.intern("else");
    let else_kw_id = interner.intern(":else");

    let mut result = Sexp::nil();
    for pair in args.chunks_exact(2).rev() {
        let test = &pair[0];
        let value = pair[1].clone();
        if test.is_symbol(else_id) || test.is_symbol(else_kw_id) {
            result = value;
            continue;
        }
        result = Sexp::list(
            vec![Sexp::symbol(if_id, test.span), test.clone(), value, result],
            span,
        );
    }
    Ok(result)
}

/// Threading arrows: `(-> x (f a) g)` → `(g (f x a))`; `->>` appends the
/// threaded value instead of inserting it after the head.
fn expand_thread(args: &[Sexp], span: Option<Span>, name: &str, first: bool) -> Result<Sexp, ExpansionError> {
    let Some((seed, stages)) = args.split_first() else {
        return Err(ExpansionError::arity(name, ">=1", 0, span));
    };
    let mut acc = seed.clone();
    for stage in stages {
        acc = match &stage.kind {
            SexpKind::List(items) if !items.is_empty() => {
                let mut call = Vec::with_capacity(items.len() + 1);
                if first {
                    call.push(items[0].clone());
                    call.push(acc);
                    call.extend(items[1..].iter().cloned());
                } else {
                    call.extend(items.iter().cloned());
                    call.push(acc);
                }
                Sexp::list(call, stage.span)
            }
            _ => Sexp::list(vec![stage.clone(), acc], stage.span),
        };
    }
    Ok(acc)
}

/// `(doto x form...)` → binds `x` once, applies each form with the bound
/// value inserted as the first argument, and evaluates to the bound value.
fn expand_doto(
    args: &[Sexp],
    span: Option<Span>,
    name: &str,
    table: &mut MacroTable,
    interner: &mut Interner,
) -> Result<Sexp, ExpansionError> {
    let Some((target, forms)) = args.split_first() else {
        return Err(ExpansionError::arity(name, ">=1", 0, span));
    };
    let do_id = interner.intern("do");
    let def_id = interner.intern("def");
    let bound = table.fresh_symbol("__doto", interner);
    let bound_sym = Sexp::symbol(bound, target.span);

    let mut body = Vec::with_capacity(forms.len() + 3);
    body.push(Sexp::symbol(do_id, span));
    body.push(Sexp::list(
        vec![Sexp::symbol(def_id, span), bound_sym.clone(), target.clone()],
        span,
    ));
    for form in forms {
        let call = match &form.kind {
            SexpKind::List(items) if !items.is_empty() => {
                let mut call = Vec::with_capacity(items.len() + 1);
                call.push(items[0].clone());
                call.push(bound_sym.clone());
                call.extend(items[1..].iter().cloned());
                Sexp::list(call, form.span)
            }
            _ => Sexp::list(vec![form.clone(), bound_sym.clone()], form.span),
        };
        body.push(call);
    }
    body.push(bound_sym);
    Ok(Sexp::list(body, span))
}

/// `(when-let [name expr] body...)` and `(if-let [name expr] then else?)`:
/// the binding is introduced by an immediately-applied `fn` so the bound
/// name cannot capture anything in the surrounding scope.
fn expand_binding_conditional(
    args: &[Sexp],
    span: Option<Span>,
    name: &str,
    interner: &mut Interner,
    has_else: bool,
) -> Result<Sexp, ExpansionError> {
    let vector_id = interner.intern("vector");
    let Some((binding, rest)) = args.split_first() else {
        return Err(ExpansionError::arity(name, ">=2", args.len(), span));
    };
    let binding_items = match binding.as_list() {
        Some(items) if binding.head_symbol() == Some(vector_id) && items.len() == 3 => &items[1..],
        _ => {
            return Err(ExpansionError::cause(
                format!("{name} requires a [name expr] binding vector"),
                binding.span,
            ));
        }
    };
    let bound_name = binding_items[0].clone();
    let bound_expr = binding_items[1].clone();

    let if_id = interner.intern("if");
    let do_id = interner.intern("do");
    let fn_id = interner.intern("fn");

    let (then_branch, else_branch) = if has_else {
        let then = rest
            .first()
            .cloned()
            .ok_or_else(|| ExpansionError::arity(name, ">=2", args.len(), span))?;
        let alt = rest.get(1).cloned().unwrap_or_else(Sexp::nil);
        (then, alt)
    } else {
        let mut body = Vec::with_capacity(rest.len() + 1);
        body.push(Sexp::symbol(do_id, span));
        body.extend(rest.iter().cloned());
        (Sexp::list(body, span), Sexp::nil())
    };

    let test = Sexp::list(
        vec![
            Sexp::symbol(if_id, span),
            bound_name.clone(),
            then_branch,
            else_branch,
        ],
        span,
    );
    let params = Sexp::list(vec![Sexp::symbol(vector_id, span), bound_name], span);
    let lambda = Sexp::list(vec![Sexp::symbol(fn_id, span), params, test], span);
    Ok(Sexp::list(vec![lambda, bound_expr], span))
}
