//! Atom table — the runtime's string interner
//!
//! Strings added by the compiler or by name-based property access get a
//! stable dense integer id. Atom ids are usable as shape keys, compare by
//! integer equality, and survive until runtime teardown. The table is
//! read-mostly: lookups take a read lock, interning writes are rare and
//! serialized.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::string::JsString;

/// A dense integer id for an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

macro_rules! preinterned {
    ($(($konst:ident, $idx:expr, $text:literal)),* $(,)?) => {
        /// Atoms with fixed, pre-assigned ids, registered at table creation.
        pub mod atoms {
            use super::Atom;
            $(
                #[doc = concat!("The `", $text, "` atom")]
                pub const $konst: Atom = Atom($idx);
            )*
        }

        const PREINTERNED: &[&str] = &[$($text),*];
    };
}

preinterned! {
    (LENGTH, 0, "length"),
    (NAME, 1, "name"),
    (PROTOTYPE, 2, "prototype"),
    (CONSTRUCTOR, 3, "constructor"),
    (MESSAGE, 4, "message"),
    (STACK, 5, "stack"),
    (VALUE, 6, "value"),
    (WRITABLE, 7, "writable"),
    (ENUMERABLE, 8, "enumerable"),
    (CONFIGURABLE, 9, "configurable"),
    (GET, 10, "get"),
    (SET, 11, "set"),
    (DONE, 12, "done"),
    (NEXT, 13, "next"),
    (RETURN, 14, "return"),
    (THROW, 15, "throw"),
    (TO_STRING, 16, "toString"),
    (VALUE_OF, 17, "valueOf"),
    (CALLEE, 18, "callee"),
    (CALLER, 19, "caller"),
    (THEN, 20, "then"),
    (GLOBAL_THIS, 21, "globalThis"),
    (UNDEFINED, 22, "undefined"),
    (NAN, 23, "NaN"),
    (INFINITY, 24, "Infinity"),
    (ARGUMENTS, 25, "arguments"),
    (CAUSE, 26, "cause"),
    (ERRORS, 27, "errors"),
    (RAW, 28, "raw"),
    (RESOLVE, 29, "resolve"),
    (REJECT, 30, "reject"),
    (PROMISE, 31, "promise"),
    (STATUS, 32, "status"),
    (REASON, 33, "reason"),
    (FULFILLED, 34, "fulfilled"),
    (REJECTED, 35, "rejected"),
    (EMPTY, 36, ""),
    (PROTO, 37, "__proto__"),
    (ERROR_SLOT, 38, "error"),
    (SUPPRESSED, 39, "suppressed"),
}

/// The runtime-wide string interner.
pub struct AtomTable {
    names: RwLock<Vec<Arc<JsString>>>,
    ids: RwLock<FxHashMap<Arc<JsString>, Atom>>,
}

impl AtomTable {
    /// Create a table with the pre-interned atoms registered.
    pub fn new() -> Self {
        let table = Self {
            names: RwLock::new(Vec::with_capacity(PREINTERNED.len() * 2)),
            ids: RwLock::new(FxHashMap::default()),
        };
        for text in PREINTERNED {
            table.intern(text);
        }
        table
    }

    /// Intern a string, returning its atom. Repeated interning of equal
    /// strings returns the same id.
    pub fn intern(&self, s: &str) -> Atom {
        // Lookup key without allocating unless we have to insert.
        {
            let ids = self.ids.read();
            let probe = JsString::new(s);
            if let Some(&atom) = ids.get(&probe) {
                return atom;
            }
        }
        self.intern_string(&JsString::new(s))
    }

    /// Intern an existing `JsString`.
    pub fn intern_string(&self, s: &Arc<JsString>) -> Atom {
        {
            let ids = self.ids.read();
            if let Some(&atom) = ids.get(s) {
                return atom;
            }
        }
        let mut names = self.names.write();
        let mut ids = self.ids.write();
        // Re-check under the write locks; another thread may have won.
        if let Some(&atom) = ids.get(s) {
            return atom;
        }
        let atom = Atom(names.len() as u32);
        names.push(s.clone());
        ids.insert(s.clone(), atom);
        atom
    }

    /// Look up an atom without interning.
    pub fn lookup(&self, s: &str) -> Option<Atom> {
        let probe = JsString::new(s);
        self.ids.read().get(&probe).copied()
    }

    /// The string for an atom.
    ///
    /// # Panics
    /// Panics if the atom was not produced by this table.
    pub fn name(&self, atom: Atom) -> Arc<JsString> {
        self.names.read()[atom.0 as usize].clone()
    }

    /// Number of interned atoms.
    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    /// Whether the table is empty (never true in practice — the pre-interned
    /// set registers at creation).
    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AtomTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomTable")
            .field("atoms", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preinterned_ids_are_fixed() {
        let table = AtomTable::new();
        assert_eq!(table.intern("length"), atoms::LENGTH);
        assert_eq!(table.intern("prototype"), atoms::PROTOTYPE);
        assert_eq!(table.name(atoms::TO_STRING).as_str(), "toString");
    }

    #[test]
    fn test_intern_is_stable() {
        let table = AtomTable::new();
        let a = table.intern("someProperty");
        let b = table.intern("someProperty");
        let c = table.intern("otherProperty");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.name(a).as_str(), "someProperty");
    }

    #[test]
    fn test_lookup_does_not_intern() {
        let table = AtomTable::new();
        let before = table.len();
        assert!(table.lookup("neverInterned").is_none());
        assert_eq!(table.len(), before);
    }
}
