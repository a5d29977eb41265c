//! Module specifier resolution and external-module probing.
//!
//! Relative specifiers resolve against the importing file's directory and
//! then against workspace roots, completing extensions and directory
//! indexes. The external prefixes (`npm:`, `jsr:`, `http:`, `https:`,
//! `node:`) short-circuit local resolution entirely.
//!
//! [`ModuleProbeCache`] memoizes per-specifier symbol probes with a TTL -
//! short for local files, which change under the editor, longer for
//! remote registries. Repeated callers for the same specifier share the
//! cached result instead of re-probing.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use ahash::AHashMap;

use crate::{intern::Interner, reader};

/// Extensions accepted when completing an extensionless specifier, in
/// preference order.
pub const RESOLVE_EXTENSIONS: &[&str] = &["hql", "ts", "js", "mjs", "cjs"];

const EXTERNAL_PREFIXES: &[&str] = &["npm:", "jsr:", "http:", "https:", "node:"];

/// True when the specifier names an external module that never resolves
/// against the local filesystem.
#[must_use]
pub fn is_external_specifier(spec: &str) -> bool {
    EXTERNAL_PREFIXES.iter().any(|prefix| spec.starts_with(prefix))
}

/// Resolves an import specifier to a file on disk.
///
/// Relative specifiers resolve against the containing file's directory;
/// bare specifiers fall back to the workspace roots. Resolution tries the
/// exact path, then extension completion, then a directory index.
#[must_use]
pub fn resolve_import_path(spec: &str, importing_file: &Path, workspace_roots: &[PathBuf]) -> Option<PathBuf> {
    if is_external_specifier(spec) {
        return None;
    }

    if spec.starts_with("./") || spec.starts_with("../") {
        let base = importing_file.parent()?;
        if let Some(found) = complete_path(&base.join(spec)) {
            return Some(found);
        }
    }

    for root in workspace_roots {
        let candidate = root.join(spec.trim_start_matches("./"));
        if let Some(found) = complete_path(&candidate) {
            return Some(found);
        }
    }
    None
}

fn complete_path(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() {
        return Some(normalize(candidate));
    }
    for ext in RESOLVE_EXTENSIONS {
        let mut with_ext = candidate.as_os_str().to_owned();
        with_ext.push(".");
        with_ext.push(ext);
        let with_ext = PathBuf::from(with_ext);
        if with_ext.is_file() {
            return Some(normalize(&with_ext));
        }
    }
    if candidate.is_dir() {
        for ext in RESOLVE_EXTENSIONS {
            let index = candidate.join(format!("index.{ext}"));
            if index.is_file() {
                return Some(normalize(&index));
            }
        }
    }
    None
}

/// Lexically removes `.` and `..` segments; no symlink traversal.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// What a module probe learned about a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProbe {
    pub specifier: String,
    /// Exported names, when the probe could determine them.
    pub symbols: Vec<String>,
}

struct CacheEntry {
    probe: ModuleProbe,
    inserted: Instant,
    ttl: Duration,
}

/// Memoized module probes with per-kind TTLs.
pub struct ModuleProbeCache {
    entries: AHashMap<String, CacheEntry>,
    local_ttl: Duration,
    remote_ttl: Duration,
}

impl Default for ModuleProbeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleProbeCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
            local_ttl: Duration::from_secs(5),
            remote_ttl: Duration::from_secs(30 * 60),
        }
    }

    #[must_use]
    pub fn with_ttls(local_ttl: Duration, remote_ttl: Duration) -> Self {
        Self {
            entries: AHashMap::new(),
            local_ttl,
            remote_ttl,
        }
    }

    /// Returns the cached probe for `spec`, running `load` only when no
    /// fresh entry exists. Concurrent callers within the TTL window all
    /// observe the single loaded result.
    pub fn probe(&mut self, spec: &str, load: impl FnOnce(&str) -> ModuleProbe) -> &ModuleProbe {
        let now = Instant::now();
        let fresh = self
            .entries
            .get(spec)
            .is_some_and(|entry| now.duration_since(entry.inserted) < entry.ttl);
        if !fresh {
            tracing::debug!(specifier = spec, "module probe cache miss");
            let ttl = if is_external_specifier(spec) {
                self.remote_ttl
            } else {
                self.local_ttl
            };
            let probe = load(spec);
            self.entries.insert(
                spec.to_owned(),
                CacheEntry {
                    probe,
                    inserted: now,
                    ttl,
                },
            );
        }
        &self.entries[spec].probe
    }

    /// Drops every cached probe.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Probes a local HQL file for its exported names by reading its export
/// forms; no expansion or lowering runs.
#[must_use]
pub fn probe_local_exports(path: &Path) -> ModuleProbe {
    let specifier = path.to_string_lossy().into_owned();
    let Ok(text) = std::fs::read_to_string(path) else {
        return ModuleProbe {
            specifier,
            symbols: Vec::new(),
        };
    };
    let mut interner = Interner::new();
    let outcome = reader::read(&text, &specifier, &mut interner);
    let export_id = interner.get("export");
    let vector_id = interner.get("vector");
    let mut symbols = Vec::new();
    for form in &outcome.forms {
        if form.head_symbol() != export_id || export_id.is_none() {
            continue;
        }
        let Some(items) = form.as_list() else { continue };
        match items.get(1) {
            Some(target) if target.head_symbol().is_some() && target.head_symbol() == vector_id => {
                for item in &target.as_list().unwrap_or_default()[1..] {
                    if let Some(id) = item.as_symbol() {
                        symbols.push(interner.resolve(id).to_owned());
                    }
                }
            }
            Some(target) => {
                if let Some(id) = target.as_symbol() {
                    symbols.push(interner.resolve(id).to_owned());
                }
            }
            None => {}
        }
    }
    ModuleProbe { specifier, symbols }
}
