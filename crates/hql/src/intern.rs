//! String interning for symbol names and file paths.
//!
//! The reader interns every symbol name and file path once and passes
//! `StringId`s through the pipeline; the expander and lowerer compare ids
//! instead of strings. Resolution back to `&str` is needed only for
//! dispatch on head symbols, diagnostics, and emission.
//!
//! The interner is append-only: a `CompilerSession` owns one interner for
//! its whole lifetime, so ids created while compiling one snippet stay
//! valid for every later snippet (REPL lines, LSP re-analysis).

use ahash::AHashMap;

/// Index into the string interner's storage.
///
/// Uses `u32` to save space (4 bytes vs 8 bytes for `usize`). This limits us
/// to ~4 billion unique interns, which is more than sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Append-only storage of unique strings with id lookup in both directions.
#[derive(Debug, Default, Clone)]
pub struct Interner {
    strings: Vec<String>,
    ids: AHashMap<String, StringId>,
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string, returning the existing id when already present.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.ids.get(s) {
            return id;
        }
        let id = StringId(u32::try_from(self.strings.len()).expect("interner overflow"));
        self.strings.push(s.to_owned());
        self.ids.insert(s.to_owned(), id);
        id
    }

    /// Resolves an id back to its string.
    ///
    /// # Panics
    /// Panics if the id did not come from this interner.
    #[must_use]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Looks up the id of an already-interned string without inserting.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<StringId> {
        self.ids.get(s).copied()
    }

    /// Number of unique strings interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        assert_eq!(a, b, "interning the same string twice should return the same id");
        assert_eq!(interner.resolve(a), "foo");
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        assert_ne!(a, b);
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn get_does_not_insert() {
        let mut interner = Interner::new();
        assert!(interner.get("missing").is_none());
        let id = interner.intern("present");
        assert_eq!(interner.get("present"), Some(id));
        assert_eq!(interner.len(), 1);
    }
}
