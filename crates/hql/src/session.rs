//! The compiler session: long-lived state shared across compilations.
//!
//! A session owns the interner (StringIds stay stable across REPL lines
//! and LSP re-analysis), the macro table (user macros persist across
//! evaluations until `reset`), the builtin symbol records seeded into
//! every analysis, and the module probe cache. Sessions are
//! single-threaded; gensym determinism is per-session.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{
    analyze::{self, AnalysisResult},
    emit::{self, EmitOptions, Emitted},
    error::{Diagnostic, HqlError, RuntimeError, Severity, ValidationError},
    expand::{self, MacroTable},
    intern::Interner,
    lower, reader,
    resolve::{self, ModuleProbe, ModuleProbeCache},
    symbols::SymbolRecord,
};

/// A failed compilation: every diagnostic the pipeline produced.
#[derive(Debug)]
pub struct CompileFailure {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, diagnostic) in self.diagnostics.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            match diagnostic.span {
                Some(span) => write!(
                    f,
                    "{}:{}: {}",
                    span.start.line,
                    span.start.column,
                    diagnostic.user_message()
                )?,
                None => write!(f, "{}", diagnostic.user_message())?,
            }
        }
        Ok(())
    }
}

/// Long-lived compiler state. See the module docs.
pub struct CompilerSession {
    interner: Interner,
    macros: MacroTable,
    globals: Vec<SymbolRecord>,
    probe_cache: ModuleProbeCache,
    workspace_roots: Vec<PathBuf>,
}

impl Default for CompilerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerSession {
    /// Creates a session with the bootstrap macros and builtin symbols
    /// registered.
    #[must_use]
    pub fn new() -> Self {
        let mut interner = Interner::new();
        let macros = MacroTable::bootstrap(&mut interner);
        let globals = builtin_records();
        Self {
            interner,
            macros,
            globals,
            probe_cache: ModuleProbeCache::new(),
            workspace_roots: Vec::new(),
        }
    }

    pub fn set_workspace_roots(&mut self, roots: Vec<PathBuf>) {
        self.workspace_roots = roots;
    }

    #[must_use]
    pub fn workspace_roots(&self) -> &[PathBuf] {
        &self.workspace_roots
    }

    #[must_use]
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// All registered macro names; completion feeds from this.
    #[must_use]
    pub fn macro_names(&self) -> Vec<String> {
        self.macros.macro_names(&self.interner)
    }

    /// The builtin records seeded into every per-file analysis.
    #[must_use]
    pub fn global_records(&self) -> &[SymbolRecord] {
        &self.globals
    }

    /// Compiles one document end to end: read, expand, lower, emit.
    ///
    /// Any stage error fails the compile, but lowering still walks every
    /// form so the failure carries all diagnostics, not just the first.
    pub fn compile(&mut self, source: &str, path: &str) -> Result<Emitted, CompileFailure> {
        let mut diagnostics = Vec::new();

        let read_outcome = reader::read(source, path, &mut self.interner);
        for error in &read_outcome.errors {
            diagnostics.push(Diagnostic::error(error.message.clone(), Some(error.span)));
        }

        let expand_outcome = expand::expand_forms(&read_outcome.forms, &mut self.macros, &mut self.interner);
        for error in expand_outcome.errors {
            diagnostics.push(error.into());
        }

        let current_dir = Path::new(path).parent().unwrap_or_else(|| Path::new("."));
        let lower_outcome = lower::lower_program(&expand_outcome.forms, &mut self.interner, current_dir);
        for error in lower_outcome.errors {
            diagnostics.push(error.into());
        }

        if diagnostics.iter().any(|d| d.severity == Severity::Error) {
            return Err(CompileFailure { diagnostics });
        }

        let file_name = Path::new(path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map_or_else(|| "out.js".to_owned(), |stem| format!("{stem}.js"));
        let options = EmitOptions {
            file_name,
            include_prelude: true,
        };
        Ok(emit::emit(&lower_outcome.program, &self.interner, &options))
    }

    /// Analyzes one document; never fails. See [`analyze::analyze`].
    pub fn analyze(&mut self, source: &str, path: &str) -> AnalysisResult {
        analyze::analyze(source, path, &mut self.macros, &mut self.interner, &self.globals)
    }

    /// Parses and registers user macros from HQL source. Every top-level
    /// form must be a `(macro ...)` definition.
    pub fn define_macro(&mut self, source: &str) -> Result<(), HqlError> {
        let forms = reader::read_strict(source, "<define-macro>", &mut self.interner)?;
        let macro_id = self.interner.intern("macro");
        for form in &forms {
            if form.head_symbol() != Some(macro_id) {
                return Err(ValidationError::new(
                    "macro",
                    "(macro name [params] body)",
                    "non-macro form",
                    form.span,
                )
                .into());
            }
        }
        let outcome = expand::expand_forms(&forms, &mut self.macros, &mut self.interner);
        if let Some(error) = outcome.errors.into_iter().next() {
            return Err(error);
        }
        Ok(())
    }

    /// Clears user macros and cached module probes; bootstrap macros and
    /// builtins survive.
    pub fn reset(&mut self) {
        self.macros.reset();
        self.probe_cache.clear();
    }

    /// Probes a module specifier for its exported symbols, memoized with
    /// per-kind TTLs.
    pub fn probe_module(&mut self, spec: &str, importing_file: &Path) -> ModuleProbe {
        let resolved = resolve::resolve_import_path(spec, importing_file, &self.workspace_roots);
        self.probe_cache
            .probe(spec, |spec| match &resolved {
                Some(path) => resolve::probe_local_exports(path),
                None => ModuleProbe {
                    specifier: spec.to_owned(),
                    symbols: Vec::new(),
                },
            })
            .clone()
    }
}

/// Wraps a failure from the emitted program's execution as a
/// [`RuntimeError`], mapping the generated position (1-based, as runtimes
/// report them) back to the original source through the source map.
#[must_use]
pub fn map_runtime_error(message: &str, generated_line: u32, generated_column: u32, emitted: &Emitted) -> RuntimeError {
    let location = emitted
        .source_map
        .lookup(generated_line.saturating_sub(1), generated_column.saturating_sub(1))
        .map(|(source, line, column)| (source.to_owned(), line + 1, column + 1));
    RuntimeError::new(message, location)
}

/// The builtin, operator, and special-form records registered once per
/// session and visible from every scope.
fn builtin_records() -> Vec<SymbolRecord> {
    let mut records = Vec::new();

    for (name, doc) in [
        ("fn", "Defines a function: (fn name [params] body) or (fn [params] body)."),
        ("def", "Binds an immutable value: (def name value)."),
        ("const", "Alias of def: binds an immutable value."),
        ("let", "Binds a value or scopes bindings over a body: (let [a 1] ...)."),
        ("var", "Binds a mutable value: (var name value)."),
        ("if", "Conditional expression: (if test then else?)."),
        ("do", "Evaluates forms in order, yielding the last."),
        ("loop", "Binds recur targets and loops: (loop [i 0] ...)."),
        ("recur", "Rebinds the enclosing loop's targets and continues."),
        ("try", "Exception handling: (try body (catch e ...) (finally ...))."),
        ("throw", "Throws a value."),
        ("return", "Returns from the enclosing function or do-block."),
        ("await", "Awaits a promise."),
        ("async", "Marks a function async."),
        ("new", "Constructs an instance: (new Ctor args)."),
        ("class", "Defines a class with fields, a constructor, and methods."),
        ("enum", "Defines an enumeration: (enum Name (case A) ...)."),
        ("import", "Imports symbols: (import [a b] from \"./m.hql\")."),
        ("export", "Exports symbols: (export [a b])."),
        ("macro", "Defines a macro: (macro name [params] template)."),
        ("quote", "Quotes a form as data."),
        ("quasiquote", "Quotes with unquote escapes."),
        ("=>", "Arrow lambda: (=> [x] body) or (=> body) with $0 sigils."),
        ("=", "Assigns to a place: (= place value)."),
    ] {
        records.push(SymbolRecord::special_form(name, doc));
    }

    for name in [
        "+", "-", "*", "/", "%", "==", "!=", "<", ">", "<=", ">=", "and", "or", "not", "instanceof", "in", "typeof",
    ] {
        records.push(SymbolRecord::operator(name));
    }

    for (name, doc) in [
        ("print", "Prints values to the console."),
        ("str", "Concatenates values into a string."),
        ("get", "Looks a key up with call fallback: (get coll key)."),
        ("range", "Produces an array of numbers: (range start end step?)."),
        ("vector", "Builds an array: [1 2 3]."),
        ("hash-map", "Builds an object: {k v}."),
        ("hash-set", "Builds a Set: #[1 2 3]."),
    ] {
        records.push(SymbolRecord::builtin(name, doc));
    }

    records
}
