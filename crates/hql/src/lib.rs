//! HQL: an S-expression language that compiles to JavaScript.
//!
//! The pipeline is read → macro-expand → lower to IR → emit, with source
//! positions threaded end to end into a source-map v3 document. The same
//! reader and symbol infrastructure backs the language server: per-file
//! analysis never fails, and the project index answers workspace-wide
//! navigation over export/import graphs with re-export chain resolution.
//!
//! The crate is organized leaves-first: [`intern`] and [`ast`] under
//! everything; [`reader`], [`expand`], and [`lower`] as the pipeline
//! stages; [`emit`] and [`sourcemap`] for output; [`symbols`],
//! [`analyze`], [`index`], and [`resolve`] for the workspace layer;
//! [`session`] tying it together.

pub mod analyze;
pub mod ast;
pub mod emit;
pub mod error;
pub mod expand;
pub mod index;
pub mod intern;
pub mod ir;
pub mod lower;
pub mod pattern;
pub mod reader;
pub mod resolve;
pub mod session;
pub mod sourcemap;
pub mod symbols;

pub use crate::{
    analyze::{AnalysisResult, ExportEntry, ImportEntry, ImportedSymbol, analyze},
    ast::{Literal, Position, Sexp, SexpKind, Span},
    emit::{EmitOptions, Emitted, emit, sanitize_identifier},
    error::{Diagnostic, ExpansionError, HqlError, ParseError, RuntimeError, Severity, TransformError, ValidationError},
    expand::{MAX_EXPANSION_ITERATIONS, MacroTable, expand_form, expand_forms},
    index::{ExportInfo, FileIndex, ImportInfo, IndexStats, ProjectIndex},
    intern::{Interner, StringId},
    ir::{IrExpr, IrExprKind, IrProgram, IrStmt, IrStmtKind, Lowered},
    lower::{HELPER_GET, HELPER_GET_NUMERIC, HELPER_RANGE, LowerOutcome, lower_program},
    pattern::{Param, ParamList, Pattern},
    reader::{ReadOutcome, read, read_strict},
    resolve::{ModuleProbe, ModuleProbeCache, is_external_specifier, probe_local_exports, resolve_import_path},
    session::{CompileFailure, CompilerSession, map_runtime_error},
    sourcemap::{RawMapping, SourceMap, SourceMapBuilder},
    symbols::{Location, ScopeArena, ScopeId, ScopeKind, SymbolKind, SymbolRecord},
};
