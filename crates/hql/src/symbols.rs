//! Scoped symbol records and the scope tree.
//!
//! Scopes live in an arena: children hold a `ScopeId` index to their
//! parent for lookup, and never mutate a parent through it. Traversals are
//! iterative. Within one scope the symbol name is the primary key;
//! cross-scope duplicates shadow, and lookup returns the innermost.
//!
//! The registration constructors at the bottom are the single source of
//! truth for record shapes: every producer (expander, lowerer, workspace
//! indexing) goes through them so field metadata never drifts between
//! producers - the project index depends on that.

use indexmap::IndexMap;
use strum::{Display, EnumString, IntoStaticStr};

use crate::ast::Span;

/// What a symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "kebab-case")]
pub enum SymbolKind {
    Variable,
    Constant,
    Function,
    Macro,
    Type,
    Enum,
    EnumCase,
    Class,
    Field,
    Method,
    Interface,
    Module,
    Import,
    Export,
    Namespace,
    Alias,
    Builtin,
    SpecialForm,
    Operator,
    Property,
}

/// What kind of scope a symbol was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "kebab-case")]
pub enum ScopeKind {
    Global,
    Module,
    Namespace,
    Class,
    Function,
    Block,
    Parameter,
    Local,
}

/// A definition site.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Location {
    pub file_path: String,
    /// 1-based, as the reader reports.
    pub line: u32,
    pub column: u32,
}

/// One symbol's record. See the module docs: construct these through the
/// registration helpers, not by hand.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SymbolRecord {
    pub name: String,
    pub kind: SymbolKind,
    pub scope: ScopeKind,
    pub parent: Option<String>,
    pub type_annotation: Option<String>,
    pub params: Option<Vec<String>>,
    pub return_type: Option<String>,
    pub cases: Option<Vec<String>>,
    pub fields: Option<Vec<String>>,
    pub methods: Option<Vec<String>>,
    pub source_module: Option<String>,
    pub alias_of: Option<String>,
    pub is_exported: bool,
    pub is_imported: bool,
    pub location: Option<Location>,
    pub documentation: Option<String>,
    pub meta: IndexMap<String, String>,
}

impl SymbolRecord {
    fn base(name: impl Into<String>, kind: SymbolKind, scope: ScopeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            scope,
            parent: None,
            type_annotation: None,
            params: None,
            return_type: None,
            cases: None,
            fields: None,
            methods: None,
            source_module: None,
            alias_of: None,
            is_exported: false,
            is_imported: false,
            location: None,
            documentation: None,
            meta: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    #[must_use]
    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }
}

/// A name use recorded against a scope for find-references and rename.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: String,
    pub span: Span,
}

/// Index of a scope in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ScopeId(u32);

impl ScopeId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Scope {
    name: String,
    parent: Option<ScopeId>,
    entries: IndexMap<String, SymbolRecord>,
    references: Vec<Reference>,
}

/// Arena of scopes forming one tree; index 0 is the root.
#[derive(Debug, Clone)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    /// Creates an arena containing only the named root scope.
    #[must_use]
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            scopes: vec![Scope {
                name: root_name.into(),
                parent: None,
                entries: IndexMap::new(),
                references: Vec::new(),
            }],
        }
    }

    /// The root scope's id.
    #[must_use]
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Adds a child scope and returns its id.
    pub fn create_child(&mut self, parent: ScopeId, name: impl Into<String>) -> ScopeId {
        let id = ScopeId(u32::try_from(self.scopes.len()).expect("scope arena overflow"));
        self.scopes.push(Scope {
            name: name.into(),
            parent: Some(parent),
            entries: IndexMap::new(),
            references: Vec::new(),
        });
        id
    }

    /// Inserts a record into the given scope. Within one scope the name is
    /// the primary key, so redefinition replaces.
    pub fn define(&mut self, scope: ScopeId, record: SymbolRecord) {
        self.scopes[scope.index()].entries.insert(record.name.clone(), record);
    }

    /// Looks a name up, walking the parent chain; the innermost match wins.
    #[must_use]
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&SymbolRecord> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.index()];
            if let Some(record) = scope.entries.get(name) {
                return Some(record);
            }
            current = scope.parent;
        }
        None
    }

    /// The scope on the parent chain that owns `name`, if any.
    #[must_use]
    pub fn owner_of(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.index()];
            if scope.entries.contains_key(name) {
                return Some(id);
            }
            current = scope.parent;
        }
        None
    }

    /// True when the name is defined in this exact scope (no parent walk).
    #[must_use]
    pub fn has_in_current(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope.index()].entries.contains_key(name)
    }

    /// Patches the record in its owning scope (the first scope on the
    /// chain containing the name). Returns false when the name is unknown.
    pub fn update(&mut self, scope: ScopeId, name: &str, patch: impl FnOnce(&mut SymbolRecord)) -> bool {
        let Some(owner) = self.owner_of(scope, name) else {
            return false;
        };
        let record = self.scopes[owner.index()]
            .entries
            .get_mut(name)
            .expect("owner_of guarantees presence");
        patch(record);
        true
    }

    /// Records a name use at a span against the given scope.
    pub fn add_reference(&mut self, scope: ScopeId, name: impl Into<String>, span: Span) {
        self.scopes[scope.index()].references.push(Reference {
            name: name.into(),
            span,
        });
    }

    /// All references recorded anywhere in the arena.
    #[must_use]
    pub fn all_references(&self) -> Vec<&Reference> {
        self.scopes.iter().flat_map(|scope| scope.references.iter()).collect()
    }

    /// Every symbol visible from `scope`: this scope plus ancestors,
    /// innermost first, shadowed names excluded. Iterative by design -
    /// recursive collection would copy ancestor vectors quadratically.
    #[must_use]
    pub fn all_symbols(&self, scope: ScopeId) -> Vec<&SymbolRecord> {
        let mut seen = ahash::AHashSet::new();
        let mut out = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.index()];
            for (name, record) in &scope.entries {
                if seen.insert(name.as_str()) {
                    out.push(record);
                }
            }
            current = scope.parent;
        }
        out
    }

    /// Symbols of one kind visible from `scope`.
    #[must_use]
    pub fn symbols_by_kind(&self, scope: ScopeId, kind: SymbolKind) -> Vec<&SymbolRecord> {
        self.all_symbols(scope).into_iter().filter(|r| r.kind == kind).collect()
    }

    /// Symbols declared under one scope kind, visible from `scope`.
    #[must_use]
    pub fn symbols_by_scope_kind(&self, scope: ScopeId, kind: ScopeKind) -> Vec<&SymbolRecord> {
        self.all_symbols(scope).into_iter().filter(|r| r.scope == kind).collect()
    }

    /// Exported symbols declared directly in `scope`.
    #[must_use]
    pub fn exported(&self, scope: ScopeId) -> Vec<&SymbolRecord> {
        self.scopes[scope.index()].entries.values().filter(|r| r.is_exported).collect()
    }

    /// Imported symbols declared directly in `scope`.
    #[must_use]
    pub fn imported(&self, scope: ScopeId) -> Vec<&SymbolRecord> {
        self.scopes[scope.index()].entries.values().filter(|r| r.is_imported).collect()
    }

    /// Symbols declared directly in `scope`, in insertion order.
    #[must_use]
    pub fn entries(&self, scope: ScopeId) -> impl Iterator<Item = &SymbolRecord> {
        self.scopes[scope.index()].entries.values()
    }

    #[must_use]
    pub fn parent_of(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.index()].parent
    }

    #[must_use]
    pub fn name_of(&self, scope: ScopeId) -> &str {
        &self.scopes[scope.index()].name
    }

    /// Number of scopes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

// =============================================================================
// Registration helpers
// =============================================================================
//
// All producers must build records through these so the project index sees
// identical metadata regardless of which stage registered a symbol.

impl SymbolRecord {
    #[must_use]
    pub fn variable(name: impl Into<String>, scope: ScopeKind) -> Self {
        Self::base(name, SymbolKind::Variable, scope)
    }

    #[must_use]
    pub fn constant(name: impl Into<String>, scope: ScopeKind) -> Self {
        Self::base(name, SymbolKind::Constant, scope)
    }

    #[must_use]
    pub fn function(name: impl Into<String>, scope: ScopeKind, params: Vec<String>, return_type: Option<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Function, scope);
        record.params = Some(params);
        record.return_type = return_type;
        record
    }

    #[must_use]
    pub fn macro_definition(name: impl Into<String>, params: Vec<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Macro, ScopeKind::Global);
        record.params = Some(params);
        record
    }

    #[must_use]
    pub fn class(name: impl Into<String>, scope: ScopeKind, fields: Vec<String>, methods: Vec<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Class, scope);
        record.fields = Some(fields);
        record.methods = Some(methods);
        record
    }

    #[must_use]
    pub fn enumeration(name: impl Into<String>, scope: ScopeKind, cases: Vec<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Enum, scope);
        record.cases = Some(cases);
        record
    }

    #[must_use]
    pub fn enum_case(name: impl Into<String>, parent: impl Into<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::EnumCase, ScopeKind::Module);
        record.parent = Some(parent.into());
        record
    }

    #[must_use]
    pub fn field(name: impl Into<String>, parent: impl Into<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Field, ScopeKind::Class);
        record.parent = Some(parent.into());
        record
    }

    #[must_use]
    pub fn method(name: impl Into<String>, parent: impl Into<String>, params: Vec<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Method, ScopeKind::Class);
        record.parent = Some(parent.into());
        record.params = Some(params);
        record
    }

    /// An imported name. `alias_of` is the exporting module's name for the
    /// symbol when the import renames it.
    #[must_use]
    pub fn import(name: impl Into<String>, source_module: impl Into<String>, alias_of: Option<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Import, ScopeKind::Module);
        record.source_module = Some(source_module.into());
        record.alias_of = alias_of;
        record.is_imported = true;
        record
    }

    /// A namespace import (`(import ns from "...")`).
    #[must_use]
    pub fn namespace_import(name: impl Into<String>, source_module: impl Into<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Namespace, ScopeKind::Module);
        record.source_module = Some(source_module.into());
        record.is_imported = true;
        record
    }

    /// An export entry. `alias_of` is the local name when re-exporting
    /// under a different public name.
    #[must_use]
    pub fn export(name: impl Into<String>, alias_of: Option<String>, source_module: Option<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Export, ScopeKind::Module);
        record.alias_of = alias_of;
        record.source_module = source_module;
        record.is_exported = true;
        record
    }

    #[must_use]
    pub fn module(name: impl Into<String>) -> Self {
        Self::base(name, SymbolKind::Module, ScopeKind::Global)
    }

    #[must_use]
    pub fn builtin(name: impl Into<String>, documentation: impl Into<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Builtin, ScopeKind::Global);
        record.documentation = Some(documentation.into());
        record
    }

    #[must_use]
    pub fn special_form(name: impl Into<String>, documentation: impl Into<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::SpecialForm, ScopeKind::Global);
        record.documentation = Some(documentation.into());
        record
    }

    #[must_use]
    pub fn operator(name: impl Into<String>) -> Self {
        Self::base(name, SymbolKind::Operator, ScopeKind::Global)
    }

    #[must_use]
    pub fn type_alias(name: impl Into<String>, aliased: impl Into<String>) -> Self {
        let mut record = Self::base(name, SymbolKind::Alias, ScopeKind::Module);
        record.alias_of = Some(aliased.into());
        record
    }
}
