//! The project index: workspace-wide symbols, exports, imports, and the
//! derived dependency graphs.
//!
//! Re-indexing a file is total replacement: every entry derived from the
//! old file state is removed before the new state is inserted, so stale
//! data cannot survive. The derived structures (export index, import
//! graph, dependent graph) are invalidated and rebuilt for the file, not
//! patched in place.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    time::SystemTime,
};

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::{
    analyze::{AnalysisResult, ImportedSymbol},
    resolve,
    symbols::{Location, SymbolRecord},
};

/// One import form of a file, coalesced per module path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    pub module_path: String,
    pub resolved_path: Option<PathBuf>,
    pub imported_symbols: Vec<ImportedSymbol>,
    pub is_namespace_import: bool,
    pub namespace_name: Option<String>,
}

/// One exported name of a file.
///
/// Invariant: `original_module` is always set for re-exports and never
/// set otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInfo {
    pub symbol_name: String,
    pub local_name: String,
    /// Index of the local symbol in the file's symbol map, when it exists.
    pub symbol_id: Option<usize>,
    pub is_re_export: bool,
    pub original_module: Option<String>,
}

/// Everything indexed about one file.
#[derive(Debug, Clone)]
pub struct FileIndex {
    pub file_path: PathBuf,
    pub last_modified: Option<SystemTime>,
    pub symbols: IndexMap<String, SymbolRecord>,
    pub exports: IndexMap<String, ExportInfo>,
    pub imports: Vec<ImportInfo>,
}

/// Aggregate counts exposed for diagnostics and status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub files: usize,
    pub symbols: usize,
    pub exports: usize,
    pub imports: usize,
}

/// The workspace-wide index.
#[derive(Debug, Default)]
pub struct ProjectIndex {
    file_indices: IndexMap<PathBuf, FileIndex>,
    export_index: AHashMap<String, BTreeSet<PathBuf>>,
    import_graph: AHashMap<PathBuf, BTreeSet<PathBuf>>,
    dependent_graph: AHashMap<PathBuf, BTreeSet<PathBuf>>,
    workspace_roots: Vec<PathBuf>,
}

impl ProjectIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_workspace_roots(roots: Vec<PathBuf>) -> Self {
        Self {
            workspace_roots: roots,
            ..Self::default()
        }
    }

    pub fn set_workspace_roots(&mut self, roots: Vec<PathBuf>) {
        self.workspace_roots = roots;
    }

    /// Indexes (or fully re-indexes) one file from its analysis.
    pub fn index_file(&mut self, path: &Path, analysis: &AnalysisResult) {
        self.remove_file(path);

        let mut symbols = IndexMap::new();
        for record in analysis.symbols.entries(analysis.file_scope) {
            symbols.insert(record.name.clone(), record.clone());
        }

        let mut exports = IndexMap::new();
        for export in &analysis.exports {
            let symbol_id = symbols.get_index_of(export.local_name.as_str());
            exports.insert(
                export.name.clone(),
                ExportInfo {
                    symbol_name: export.name.clone(),
                    local_name: export.local_name.clone(),
                    symbol_id,
                    is_re_export: export.is_re_export,
                    original_module: if export.is_re_export {
                        export.original_module.clone()
                    } else {
                        None
                    },
                },
            );
        }

        // Imports coalesce per module path.
        let mut imports: Vec<ImportInfo> = Vec::new();
        for entry in &analysis.imports {
            if let Some(existing) = imports
                .iter_mut()
                .find(|info| info.module_path == entry.module_path && !entry.is_namespace)
            {
                existing.imported_symbols.extend(entry.symbols.iter().cloned());
                continue;
            }
            let resolved_path = resolve::resolve_import_path(&entry.module_path, path, &self.workspace_roots);
            imports.push(ImportInfo {
                module_path: entry.module_path.clone(),
                resolved_path,
                imported_symbols: entry.symbols.clone(),
                is_namespace_import: entry.is_namespace,
                namespace_name: entry.namespace_name.clone(),
            });
        }

        for name in exports.keys() {
            self.export_index.entry(name.clone()).or_default().insert(path.to_path_buf());
        }
        let resolved: BTreeSet<PathBuf> = imports.iter().filter_map(|info| info.resolved_path.clone()).collect();
        for target in &resolved {
            self.dependent_graph.entry(target.clone()).or_default().insert(path.to_path_buf());
        }
        if !resolved.is_empty() {
            self.import_graph.insert(path.to_path_buf(), resolved);
        }

        let last_modified = std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
        tracing::debug!(path = %path.display(), symbols = symbols.len(), exports = exports.len(), "indexed file");
        self.file_indices.insert(
            path.to_path_buf(),
            FileIndex {
                file_path: path.to_path_buf(),
                last_modified,
                symbols,
                exports,
                imports,
            },
        );
    }

    /// Drops one file and every derived entry referencing it.
    pub fn remove_file(&mut self, path: &Path) {
        let Some(index) = self.file_indices.shift_remove(path) else {
            return;
        };
        for name in index.exports.keys() {
            if let Some(paths) = self.export_index.get_mut(name) {
                paths.remove(path);
                if paths.is_empty() {
                    self.export_index.remove(name);
                }
            }
        }
        if let Some(targets) = self.import_graph.remove(path) {
            for target in targets {
                if let Some(dependents) = self.dependent_graph.get_mut(&target) {
                    dependents.remove(path);
                    if dependents.is_empty() {
                        self.dependent_graph.remove(&target);
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn file(&self, path: &Path) -> Option<&FileIndex> {
        self.file_indices.get(path)
    }

    /// Follows re-export chains to the original definition. A visited set
    /// terminates cycles by returning `None`.
    #[must_use]
    pub fn get_exported_symbol(&self, name: &str, path: &Path) -> Option<SymbolRecord> {
        let mut visited = BTreeSet::new();
        self.exported_symbol_inner(name, path, &mut visited)
    }

    fn exported_symbol_inner(&self, name: &str, path: &Path, visited: &mut BTreeSet<PathBuf>) -> Option<SymbolRecord> {
        if !visited.insert(path.to_path_buf()) {
            return None;
        }
        let index = self.file_indices.get(path)?;
        let info = index.exports.get(name)?;

        if !info.is_re_export {
            if let Some(record) = index.symbols.get(info.local_name.as_str()) {
                let mut record = record.clone();
                if record.location.is_none() {
                    record.location = Some(Location {
                        file_path: path.to_string_lossy().into_owned(),
                        line: 0,
                        column: 0,
                    });
                }
                return Some(record);
            }
            // Exported but not locally indexed (export of an import):
            // synthesize a minimal record at this file.
            let mut record = SymbolRecord::constant(info.local_name.clone(), crate::symbols::ScopeKind::Module);
            record.location = Some(Location {
                file_path: path.to_string_lossy().into_owned(),
                line: 0,
                column: 0,
            });
            return Some(record);
        }

        let module = info.original_module.as_deref()?;
        let target = self.resolve_module_to_path(module, path)?;
        self.exported_symbol_inner(name, &target, visited)
    }

    /// Resolves a module path to an indexed file. The import info's
    /// already-resolved path wins; filesystem resolution is next; the
    /// filename-suffix match over indexed files is the last resort, with
    /// a note when it is ambiguous.
    fn resolve_module_to_path(&self, module: &str, importing: &Path) -> Option<PathBuf> {
        if let Some(index) = self.file_indices.get(importing) {
            if let Some(info) = index.imports.iter().find(|info| info.module_path == module) {
                if let Some(resolved) = &info.resolved_path {
                    return Some(resolved.clone());
                }
            }
        }
        if let Some(resolved) = resolve::resolve_import_path(module, importing, &self.workspace_roots) {
            if self.file_indices.contains_key(&resolved) {
                return Some(resolved);
            }
        }

        let file_name = module.rsplit('/').next().unwrap_or(module);
        let mut matches: Vec<&PathBuf> = self
            .file_indices
            .keys()
            .filter(|path| {
                path.file_name().and_then(|n| n.to_str()).is_some_and(|n| {
                    n == file_name
                        || resolve::RESOLVE_EXTENSIONS.iter().any(|ext| format!("{file_name}.{ext}") == n)
                })
            })
            .collect();
        matches.sort();
        if matches.len() > 1 {
            tracing::debug!(
                module,
                candidates = matches.len(),
                "ambiguous re-export module suffix match"
            );
        }
        matches.first().map(|path| (*path).clone())
    }

    /// All files exporting `name`.
    #[must_use]
    pub fn find_exports(&self, name: &str) -> Vec<PathBuf> {
        self.export_index
            .get(name)
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Case-insensitive substring search over every indexed symbol.
    #[must_use]
    pub fn search_symbols(&self, query: &str, max_results: usize) -> Vec<(PathBuf, SymbolRecord)> {
        let needle = query.to_lowercase();
        let mut out = Vec::new();
        for (path, index) in &self.file_indices {
            for record in index.symbols.values() {
                if record.name.to_lowercase().contains(&needle) {
                    out.push((path.clone(), record.clone()));
                    if out.len() >= max_results {
                        return out;
                    }
                }
            }
        }
        out
    }

    #[must_use]
    pub fn get_imports(&self, path: &Path) -> Vec<ImportInfo> {
        self.file_indices
            .get(path)
            .map(|index| index.imports.clone())
            .unwrap_or_default()
    }

    /// Files that import `path` (the transpose edge set).
    #[must_use]
    pub fn get_dependents(&self, path: &Path) -> Vec<PathBuf> {
        self.dependent_graph
            .get(path)
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Files `path` imports, restricted to resolved paths.
    #[must_use]
    pub fn get_imported_files(&self, path: &Path) -> Vec<PathBuf> {
        self.import_graph
            .get(path)
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get_all_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.file_indices.keys().cloned().collect();
        files.sort();
        files
    }

    /// Paths exporting `name`, exposed for invariant checks in tests.
    #[must_use]
    pub fn exported_names(&self) -> Vec<(String, Vec<PathBuf>)> {
        let mut out: Vec<(String, Vec<PathBuf>)> = self
            .export_index
            .iter()
            .map(|(name, paths)| (name.clone(), paths.iter().cloned().collect()))
            .collect();
        out.sort();
        out
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            files: self.file_indices.len(),
            symbols: self.file_indices.values().map(|index| index.symbols.len()).sum(),
            exports: self.file_indices.values().map(|index| index.exports.len()).sum(),
            imports: self.file_indices.values().map(|index| index.imports.len()).sum(),
        }
    }
}
