//! Project index behavior: cross-file resolution, re-export chains,
//! graph invariants, incremental re-indexing, and workspace search.

use std::fs;
use std::path::{Path, PathBuf};

use hql::{CompilerSession, ProjectIndex, resolve_import_path};
use pretty_assertions::assert_eq;

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
    session: CompilerSession,
    index: ProjectIndex,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        let mut session = CompilerSession::new();
        session.set_workspace_roots(vec![root.clone()]);
        Self {
            _dir: dir,
            root: root.clone(),
            session,
            index: ProjectIndex::with_workspace_roots(vec![root.clone()]),
        }
    }

    fn write(&mut self, name: &str, source: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, source).expect("write source file");
        path
    }

    fn index_file(&mut self, path: &Path) {
        let source = fs::read_to_string(path).expect("read source file");
        let analysis = self.session.analyze(&source, &path.to_string_lossy());
        self.index.index_file(path, &analysis);
    }
}

/// `a.hql` exports `add`; `b.hql` imports it. Resolving the import path
/// and asking the index for the export lands on the definition in a.hql.
#[test]
fn cross_file_export_resolves_to_definition() {
    let mut ws = Workspace::new();
    let a = ws.write("a.hql", "(fn add [x y] (+ x y))\n(export [add])");
    let b = ws.write("b.hql", "(import [add] from \"./a.hql\")");
    ws.index_file(&a);
    ws.index_file(&b);

    let resolved = resolve_import_path("./a.hql", &b, &[]).expect("relative import resolves");
    assert_eq!(resolved, a);

    let record = ws
        .index
        .get_exported_symbol("add", &resolved)
        .expect("the export chain ends at a definition");
    let location = record.location.expect("definitions carry a location");
    assert_eq!(location.file_path, a.to_string_lossy());
}

/// Mutually re-exporting files terminate resolution and return None.
#[test]
fn re_export_cycles_terminate() {
    let mut ws = Workspace::new();
    let a = ws.write("a.hql", "(export [x] from \"./b.hql\")");
    let b = ws.write("b.hql", "(export [x] from \"./a.hql\")");
    ws.index_file(&a);
    ws.index_file(&b);

    assert_eq!(ws.index.get_exported_symbol("x", &a), None);
    assert_eq!(ws.index.get_exported_symbol("x", &b), None);
}

/// A single-hop re-export chain lands on the original definition.
#[test]
fn re_export_chain_follows_to_the_origin() {
    let mut ws = Workspace::new();
    let core = ws.write("core.hql", "(fn helper [] 1)\n(export [helper])");
    let facade = ws.write("facade.hql", "(export [helper] from \"./core.hql\")");
    ws.index_file(&core);
    ws.index_file(&facade);

    let record = ws
        .index
        .get_exported_symbol("helper", &facade)
        .expect("re-export resolves through the chain");
    assert_eq!(
        record.location.expect("definition location").file_path,
        core.to_string_lossy()
    );
}

/// `export_index[name]` is exactly the set of files exporting the name.
#[test]
fn export_index_matches_file_exports() {
    let mut ws = Workspace::new();
    let a = ws.write("a.hql", "(fn add [x y] x)\n(export [add])");
    let b = ws.write("b.hql", "(fn add [x y] y)\n(fn sub [x y] x)\n(export [add sub])");
    ws.index_file(&a);
    ws.index_file(&b);

    let mut add_exporters = ws.index.find_exports("add");
    add_exporters.sort();
    assert_eq!(add_exporters, vec![a.clone(), b.clone()]);
    assert_eq!(ws.index.find_exports("sub"), vec![b.clone()]);
    assert!(ws.index.find_exports("missing").is_empty());

    for (name, paths) in ws.index.exported_names() {
        for path in paths {
            let file = ws.index.file(&path).expect("exporting file is indexed");
            assert!(
                file.exports.contains_key(&name),
                "export index lists {} for {} but the file index disagrees",
                name,
                path.display()
            );
        }
    }
}

/// Import edges and dependent edges are transposes of each other.
#[test]
fn dependency_graphs_are_transposed() {
    let mut ws = Workspace::new();
    let a = ws.write("a.hql", "(fn add [x y] x)\n(export [add])");
    let b = ws.write("b.hql", "(import [add] from \"./a.hql\")\n(def two (add 1 1))");
    ws.index_file(&a);
    ws.index_file(&b);

    assert_eq!(ws.index.get_imported_files(&b), vec![a.clone()]);
    assert_eq!(ws.index.get_dependents(&a), vec![b.clone()]);
    assert!(ws.index.get_dependents(&b).is_empty());
}

/// Re-indexing identical content leaves the index structurally unchanged.
#[test]
fn reindexing_identical_content_is_stable() {
    let mut ws = Workspace::new();
    let a = ws.write("a.hql", "(fn add [x y] x)\n(export [add])");
    let b = ws.write("b.hql", "(import [add] from \"./a.hql\")");
    ws.index_file(&a);
    ws.index_file(&b);

    let stats_before = ws.index.stats();
    let exports_before = ws.index.exported_names();
    let dependents_before = ws.index.get_dependents(&a);

    ws.index_file(&b);
    ws.index_file(&a);

    assert_eq!(ws.index.stats(), stats_before);
    assert_eq!(ws.index.exported_names(), exports_before);
    assert_eq!(ws.index.get_dependents(&a), dependents_before);
}

/// Removal drops the file and every derived entry.
#[test]
fn removing_a_file_prunes_derived_state() {
    let mut ws = Workspace::new();
    let a = ws.write("a.hql", "(fn add [x y] x)\n(export [add])");
    let b = ws.write("b.hql", "(import [add] from \"./a.hql\")");
    ws.index_file(&a);
    ws.index_file(&b);

    ws.index.remove_file(&b);
    assert!(ws.index.get_dependents(&a).is_empty(), "b's edges must disappear");
    assert!(ws.index.file(&b).is_none());

    ws.index.remove_file(&a);
    assert!(ws.index.find_exports("add").is_empty(), "export entries must prune");
    assert_eq!(ws.index.stats().files, 0);
}

/// Imports from the same module coalesce under one import info.
#[test]
fn imports_coalesce_per_module() {
    let mut ws = Workspace::new();
    ws.write("a.hql", "(fn add [x y] x)\n(fn sub [x y] y)\n(export [add sub])");
    let b = ws.write(
        "b.hql",
        "(import [add] from \"./a.hql\")\n(import [sub] from \"./a.hql\")",
    );
    ws.index_file(&b);

    let imports = ws.index.get_imports(&b);
    assert_eq!(imports.len(), 1, "same-module imports share one entry");
    assert_eq!(imports[0].imported_symbols.len(), 2);
}

#[test]
fn namespace_imports_record_their_name() {
    let mut ws = Workspace::new();
    ws.write("util.hql", "(fn helper [] 1)\n(export [helper])");
    let b = ws.write("b.hql", "(import util from \"./util.hql\")");
    ws.index_file(&b);

    let imports = ws.index.get_imports(&b);
    assert_eq!(imports.len(), 1);
    assert!(imports[0].is_namespace_import);
    assert_eq!(imports[0].namespace_name.as_deref(), Some("util"));
}

#[test]
fn workspace_symbol_search_is_case_insensitive_substring() {
    let mut ws = Workspace::new();
    let a = ws.write("a.hql", "(fn computeTotal [xs] xs)\n(def grandTotal 0)");
    ws.index_file(&a);

    let hits = ws.index.search_symbols("total", 100);
    let names: Vec<&str> = hits.iter().map(|(_, record)| record.name.as_str()).collect();
    assert!(names.contains(&"computeTotal"), "got {names:?}");
    assert!(names.contains(&"grandTotal"), "got {names:?}");

    let capped = ws.index.search_symbols("total", 1);
    assert_eq!(capped.len(), 1, "max_results caps the hits");
}

#[test]
fn get_all_files_lists_indexed_paths() {
    let mut ws = Workspace::new();
    let a = ws.write("a.hql", "(def x 1)");
    let b = ws.write("b.hql", "(def y 2)");
    ws.index_file(&a);
    ws.index_file(&b);
    assert_eq!(ws.index.get_all_files(), vec![a, b]);
}

/// External specifiers never resolve locally.
#[test]
fn external_prefixes_short_circuit_resolution() {
    for spec in ["npm:chalk", "jsr:@std/path", "http://x.dev/m.ts", "https://x.dev/m.ts", "node:fs"] {
        assert!(hql::is_external_specifier(spec), "{spec} is external");
        assert_eq!(resolve_import_path(spec, Path::new("/tmp/a.hql"), &[]), None);
    }
}

/// Extension completion and directory indexes resolve in order.
#[test]
fn resolution_completes_extensions_and_indexes() {
    let mut ws = Workspace::new();
    let lib = ws.write("lib.hql", "(def x 1)");
    let importer = ws.write("main.hql", "(import [x] from \"./lib\")");
    assert_eq!(resolve_import_path("./lib", &importer, &[]), Some(lib));

    fs::create_dir(ws.root.join("pkg")).expect("mkdir");
    let index_file = ws.root.join("pkg").join("index.hql");
    fs::write(&index_file, "(def y 2)").expect("write");
    assert_eq!(resolve_import_path("./pkg", &importer, &[]), Some(index_file));
}
