//! JavaScript symbols
//!
//! Symbols compare by id. Well-known symbols have fixed, pre-assigned ids
//! below [`well_known::FIRST_DYNAMIC`]; the runtime's registry hands out the
//! rest and backs `Symbol.for`/`Symbol.keyFor`.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::string::JsString;

/// A JavaScript Symbol.
#[derive(Debug)]
pub struct JsSymbol {
    /// Unique id; fixed for well-known symbols.
    pub id: u64,
    /// Optional description.
    pub description: Option<Arc<JsString>>,
}

impl JsSymbol {
    /// Display form, `Symbol(description)`.
    pub fn to_display_string(&self) -> String {
        match &self.description {
            Some(d) => format!("Symbol({d})"),
            None => "Symbol()".to_string(),
        }
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl std::hash::Hash for JsSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Fixed ids for well-known symbols.
pub mod well_known {
    /// `Symbol.iterator`
    pub const ITERATOR: u64 = 1;
    /// `Symbol.asyncIterator`
    pub const ASYNC_ITERATOR: u64 = 2;
    /// `Symbol.toStringTag`
    pub const TO_STRING_TAG: u64 = 3;
    /// `Symbol.toPrimitive`
    pub const TO_PRIMITIVE: u64 = 4;
    /// `Symbol.hasInstance`
    pub const HAS_INSTANCE: u64 = 5;
    /// `Symbol.isConcatSpreadable`
    pub const IS_CONCAT_SPREADABLE: u64 = 6;
    /// `Symbol.species`
    pub const SPECIES: u64 = 7;
    /// `Symbol.match`
    pub const MATCH: u64 = 8;
    /// `Symbol.matchAll`
    pub const MATCH_ALL: u64 = 9;
    /// `Symbol.replace`
    pub const REPLACE: u64 = 10;
    /// `Symbol.search`
    pub const SEARCH: u64 = 11;
    /// `Symbol.split`
    pub const SPLIT: u64 = 12;
    /// `Symbol.unscopables`
    pub const UNSCOPABLES: u64 = 13;
    /// `Symbol.dispose`
    pub const DISPOSE: u64 = 14;
    /// `Symbol.asyncDispose`
    pub const ASYNC_DISPOSE: u64 = 15;

    /// First id available for dynamically created symbols.
    pub const FIRST_DYNAMIC: u64 = 64;
}

/// The set of well-known symbol instances, created once per runtime.
#[derive(Debug, Clone)]
pub struct WellKnownSymbols {
    /// `@@iterator`
    pub iterator: Arc<JsSymbol>,
    /// `@@asyncIterator`
    pub async_iterator: Arc<JsSymbol>,
    /// `@@toStringTag`
    pub to_string_tag: Arc<JsSymbol>,
    /// `@@toPrimitive`
    pub to_primitive: Arc<JsSymbol>,
    /// `@@hasInstance`
    pub has_instance: Arc<JsSymbol>,
    /// `@@isConcatSpreadable`
    pub is_concat_spreadable: Arc<JsSymbol>,
    /// `@@species`
    pub species: Arc<JsSymbol>,
    /// `@@match`
    pub r#match: Arc<JsSymbol>,
    /// `@@matchAll`
    pub match_all: Arc<JsSymbol>,
    /// `@@replace`
    pub replace: Arc<JsSymbol>,
    /// `@@search`
    pub search: Arc<JsSymbol>,
    /// `@@split`
    pub split: Arc<JsSymbol>,
    /// `@@unscopables`
    pub unscopables: Arc<JsSymbol>,
    /// `@@dispose`
    pub dispose: Arc<JsSymbol>,
    /// `@@asyncDispose`
    pub async_dispose: Arc<JsSymbol>,
}

impl WellKnownSymbols {
    fn make(id: u64, description: &str) -> Arc<JsSymbol> {
        Arc::new(JsSymbol {
            id,
            description: Some(JsString::new(description)),
        })
    }

    /// Create the full well-known set with fixed ids.
    pub fn new() -> Self {
        Self {
            iterator: Self::make(well_known::ITERATOR, "Symbol.iterator"),
            async_iterator: Self::make(well_known::ASYNC_ITERATOR, "Symbol.asyncIterator"),
            to_string_tag: Self::make(well_known::TO_STRING_TAG, "Symbol.toStringTag"),
            to_primitive: Self::make(well_known::TO_PRIMITIVE, "Symbol.toPrimitive"),
            has_instance: Self::make(well_known::HAS_INSTANCE, "Symbol.hasInstance"),
            is_concat_spreadable: Self::make(
                well_known::IS_CONCAT_SPREADABLE,
                "Symbol.isConcatSpreadable",
            ),
            species: Self::make(well_known::SPECIES, "Symbol.species"),
            r#match: Self::make(well_known::MATCH, "Symbol.match"),
            match_all: Self::make(well_known::MATCH_ALL, "Symbol.matchAll"),
            replace: Self::make(well_known::REPLACE, "Symbol.replace"),
            search: Self::make(well_known::SEARCH, "Symbol.search"),
            split: Self::make(well_known::SPLIT, "Symbol.split"),
            unscopables: Self::make(well_known::UNSCOPABLES, "Symbol.unscopables"),
            dispose: Self::make(well_known::DISPOSE, "Symbol.dispose"),
            async_dispose: Self::make(well_known::ASYNC_DISPOSE, "Symbol.asyncDispose"),
        }
    }
}

impl Default for WellKnownSymbols {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates unique symbols and backs the `Symbol.for` registry.
pub struct SymbolRegistry {
    next_id: AtomicU64,
    /// `Symbol.for` key → symbol
    registered: Mutex<FxHashMap<String, Arc<JsSymbol>>>,
}

impl SymbolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(well_known::FIRST_DYNAMIC),
            registered: Mutex::new(FxHashMap::default()),
        }
    }

    /// Create a fresh unique symbol.
    pub fn create(&self, description: Option<Arc<JsString>>) -> Arc<JsSymbol> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(JsSymbol { id, description })
    }

    /// `Symbol.for(key)` — look up or create the registered symbol.
    pub fn for_key(&self, key: &str) -> Arc<JsSymbol> {
        let mut registered = self.registered.lock();
        if let Some(sym) = registered.get(key) {
            return sym.clone();
        }
        let sym = self.create(Some(JsString::new(key)));
        registered.insert(key.to_string(), sym.clone());
        sym
    }

    /// `Symbol.keyFor(sym)` — the registration key, if registered.
    pub fn key_for(&self, sym: &JsSymbol) -> Option<String> {
        self.registered
            .lock()
            .iter()
            .find(|(_, s)| s.id == sym.id)
            .map(|(k, _)| k.clone())
    }
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SymbolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolRegistry").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_ids_are_fixed() {
        let a = WellKnownSymbols::new();
        let b = WellKnownSymbols::new();
        assert_eq!(a.iterator.id, well_known::ITERATOR);
        assert_eq!(a.iterator, b.iterator);
        assert_eq!(a.dispose.id, well_known::DISPOSE);
    }

    #[test]
    fn test_dynamic_symbols_are_unique() {
        let registry = SymbolRegistry::new();
        let a = registry.create(None);
        let b = registry.create(None);
        assert_ne!(a.id, b.id);
        assert!(a.id >= well_known::FIRST_DYNAMIC);
    }

    #[test]
    fn test_symbol_for_registry() {
        let registry = SymbolRegistry::new();
        let a = registry.for_key("app.token");
        let b = registry.for_key("app.token");
        assert_eq!(a, b);
        assert_eq!(registry.key_for(&a).as_deref(), Some("app.token"));

        let unregistered = registry.create(None);
        assert_eq!(registry.key_for(&unregistered), None);
    }
}
