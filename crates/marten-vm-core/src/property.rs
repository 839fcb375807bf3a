//! Property keys, descriptors, and the per-object property store
//!
//! Keys are atoms (interned strings), array indices, or symbols. The store
//! preserves insertion order; `ownKeys` ordering (indices ascending, then
//! strings, then symbols, each in insertion order) is synthesized on demand.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::atom::Atom;
use crate::symbol::JsSymbol;
use crate::value::Value;

/// A property key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Array index (a canonical numeric string below 2^32-1)
    Index(u32),
    /// Interned string
    Atom(Atom),
    /// Symbol, compared by id
    Symbol(Arc<JsSymbol>),
}

impl PropertyKey {
    /// Parse a string as an array index if it is the canonical form:
    /// `"0"`, or a digit string without leading zero, below `2^32 - 1`.
    pub fn index_from_str(s: &str) -> Option<u32> {
        if s.is_empty() || s.len() > 10 {
            return None;
        }
        if s == "0" {
            return Some(0);
        }
        if s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let n: u64 = s.parse().ok()?;
        if n < u32::MAX as u64 { Some(n as u32) } else { None }
    }

    /// Whether this key is an array index.
    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        PropertyKey::Index(i)
    }
}

impl From<Atom> for PropertyKey {
    fn from(a: Atom) -> Self {
        PropertyKey::Atom(a)
    }
}

impl From<Arc<JsSymbol>> for PropertyKey {
    fn from(s: Arc<JsSymbol>) -> Self {
        PropertyKey::Symbol(s)
    }
}

/// A fully populated property as stored on an object.
#[derive(Debug, Clone)]
pub enum Property {
    /// Data property
    Data {
        /// The value
        value: Value,
        /// [[Writable]]
        writable: bool,
        /// [[Enumerable]]
        enumerable: bool,
        /// [[Configurable]]
        configurable: bool,
    },
    /// Accessor property
    Accessor {
        /// Getter, `None` encodes `undefined`
        get: Option<Value>,
        /// Setter, `None` encodes `undefined`
        set: Option<Value>,
        /// [[Enumerable]]
        enumerable: bool,
        /// [[Configurable]]
        configurable: bool,
    },
}

impl Property {
    /// A `{writable, enumerable, configurable}` data property.
    pub fn data(value: Value) -> Self {
        Property::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// A data property with explicit attributes.
    pub fn data_with(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Property::Data {
            value,
            writable,
            enumerable,
            configurable,
        }
    }

    /// The method/builtin attribute set: writable and configurable, not
    /// enumerable.
    pub fn method(value: Value) -> Self {
        Property::Data {
            value,
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    /// Whether this property is enumerable.
    pub fn is_enumerable(&self) -> bool {
        match self {
            Property::Data { enumerable, .. } | Property::Accessor { enumerable, .. } => {
                *enumerable
            }
        }
    }

    /// Whether this property is configurable.
    pub fn is_configurable(&self) -> bool {
        match self {
            Property::Data { configurable, .. } | Property::Accessor { configurable, .. } => {
                *configurable
            }
        }
    }

    /// The value of a data property.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Property::Data { value, .. } => Some(value),
            Property::Accessor { .. } => None,
        }
    }

    /// Whether a data property is writable (accessors answer false).
    pub fn is_writable(&self) -> bool {
        match self {
            Property::Data { writable, .. } => *writable,
            Property::Accessor { .. } => false,
        }
    }

    /// Convert to the partial-descriptor form with every field present.
    pub fn to_descriptor(&self) -> PropertyDescriptor {
        match self {
            Property::Data {
                value,
                writable,
                enumerable,
                configurable,
            } => PropertyDescriptor {
                value: Some(value.clone()),
                writable: Some(*writable),
                get: None,
                set: None,
                enumerable: Some(*enumerable),
                configurable: Some(*configurable),
            },
            Property::Accessor {
                get,
                set,
                enumerable,
                configurable,
            } => PropertyDescriptor {
                value: None,
                writable: None,
                get: Some(get.clone().unwrap_or(Value::Undefined)),
                set: Some(set.clone().unwrap_or(Value::Undefined)),
                enumerable: Some(*enumerable),
                configurable: Some(*configurable),
            },
        }
    }
}

/// A partial property descriptor: every field tracks presence so
/// `defineProperty` can honor ES partial-descriptor semantics.
#[derive(Debug, Clone, Default)]
pub struct PropertyDescriptor {
    /// [[Value]], when specified
    pub value: Option<Value>,
    /// [[Writable]], when specified
    pub writable: Option<bool>,
    /// [[Get]], when specified (`Value::Undefined` is a legal getter)
    pub get: Option<Value>,
    /// [[Set]], when specified
    pub set: Option<Value>,
    /// [[Enumerable]], when specified
    pub enumerable: Option<bool>,
    /// [[Configurable]], when specified
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// An empty (fully generic) descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a full `{value, writable, enumerable, configurable}`
    /// data descriptor.
    pub fn data(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            get: None,
            set: None,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    /// Shorthand for a full accessor descriptor.
    pub fn accessor(
        get: Option<Value>,
        set: Option<Value>,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            value: None,
            writable: None,
            get: Some(get.unwrap_or(Value::Undefined)),
            set: Some(set.unwrap_or(Value::Undefined)),
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    /// IsDataDescriptor.
    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    /// IsAccessorDescriptor.
    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// IsGenericDescriptor.
    pub fn is_generic(&self) -> bool {
        !self.is_data() && !self.is_accessor()
    }

    /// CompletePropertyDescriptor: fill absent fields with defaults and
    /// produce the stored form.
    pub fn complete(&self) -> Property {
        if self.is_accessor() {
            Property::Accessor {
                get: self.get.clone().filter(|v| !v.is_undefined()),
                set: self.set.clone().filter(|v| !v.is_undefined()),
                enumerable: self.enumerable.unwrap_or(false),
                configurable: self.configurable.unwrap_or(false),
            }
        } else {
            Property::Data {
                value: self.value.clone().unwrap_or(Value::Undefined),
                writable: self.writable.unwrap_or(false),
                enumerable: self.enumerable.unwrap_or(false),
                configurable: self.configurable.unwrap_or(false),
            }
        }
    }
}

/// Ordered key → property map.
///
/// Insertion order is observable through `ownKeys` and enumeration, so the
/// store is an `IndexMap`; the index/string/symbol partition of `own_keys`
/// is computed per call.
#[derive(Debug, Default)]
pub struct PropertyStore {
    entries: IndexMap<PropertyKey, Property>,
}

impl PropertyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of own properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a property.
    pub fn get(&self, key: &PropertyKey) -> Option<&Property> {
        self.entries.get(key)
    }

    /// Look up a property mutably.
    pub fn get_mut(&mut self, key: &PropertyKey) -> Option<&mut Property> {
        self.entries.get_mut(key)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace; replacement keeps the original insertion position.
    pub fn insert(&mut self, key: PropertyKey, property: Property) {
        self.entries.insert(key, property);
    }

    /// Remove a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &PropertyKey) -> Option<Property> {
        self.entries.shift_remove(key)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &Property)> {
        self.entries.iter()
    }

    /// `[[OwnPropertyKeys]]` order: integer indices ascending, then string
    /// keys in insertion order, then symbol keys in insertion order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut indices: Vec<u32> = Vec::new();
        let mut strings: Vec<PropertyKey> = Vec::new();
        let mut symbols: Vec<PropertyKey> = Vec::new();
        for key in self.entries.keys() {
            match key {
                PropertyKey::Index(i) => indices.push(*i),
                PropertyKey::Atom(_) => strings.push(key.clone()),
                PropertyKey::Symbol(_) => symbols.push(key.clone()),
            }
        }
        indices.sort_unstable();
        let mut keys = Vec::with_capacity(self.entries.len());
        keys.extend(indices.into_iter().map(PropertyKey::Index));
        keys.extend(strings);
        keys.extend(symbols);
        keys
    }

    /// Index keys in descending order — the deletion order of
    /// `Array.length` truncation.
    pub fn index_keys_descending(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self
            .entries
            .keys()
            .filter_map(PropertyKey::as_index)
            .collect();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::atoms;

    #[test]
    fn test_index_from_str() {
        assert_eq!(PropertyKey::index_from_str("0"), Some(0));
        assert_eq!(PropertyKey::index_from_str("42"), Some(42));
        assert_eq!(PropertyKey::index_from_str("01"), None);
        assert_eq!(PropertyKey::index_from_str("-0"), None);
        assert_eq!(PropertyKey::index_from_str("1.5"), None);
        assert_eq!(PropertyKey::index_from_str(""), None);
        assert_eq!(PropertyKey::index_from_str("4294967295"), None); // 2^32-1
        assert_eq!(PropertyKey::index_from_str("4294967294"), Some(u32::MAX - 1));
    }

    #[test]
    fn test_own_keys_ordering() {
        let mut store = PropertyStore::new();
        store.insert(PropertyKey::Atom(atoms::NAME), Property::data(Value::Null));
        store.insert(PropertyKey::Index(2), Property::data(Value::Null));
        store.insert(PropertyKey::Atom(atoms::VALUE), Property::data(Value::Null));
        store.insert(PropertyKey::Index(0), Property::data(Value::Null));

        let keys = store.own_keys();
        assert_eq!(
            keys,
            vec![
                PropertyKey::Index(0),
                PropertyKey::Index(2),
                PropertyKey::Atom(atoms::NAME),
                PropertyKey::Atom(atoms::VALUE),
            ]
        );
    }

    #[test]
    fn test_descriptor_classification() {
        assert!(PropertyDescriptor::data(Value::Null, true, true, true).is_data());
        assert!(PropertyDescriptor::accessor(None, None, false, false).is_accessor());
        assert!(PropertyDescriptor::new().is_generic());
    }

    #[test]
    fn test_complete_defaults() {
        let stored = PropertyDescriptor {
            value: Some(Value::int32(1)),
            ..Default::default()
        }
        .complete();
        match stored {
            Property::Data {
                writable,
                enumerable,
                configurable,
                ..
            } => {
                assert!(!writable && !enumerable && !configurable);
            }
            other => panic!("expected data property, got {other:?}"),
        }
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut store = PropertyStore::new();
        store.insert(PropertyKey::Atom(atoms::NAME), Property::data(Value::Null));
        store.insert(PropertyKey::Atom(atoms::VALUE), Property::data(Value::Null));
        store.insert(PropertyKey::Atom(atoms::STACK), Property::data(Value::Null));
        store.remove(&PropertyKey::Atom(atoms::VALUE));

        let keys = store.own_keys();
        assert_eq!(
            keys,
            vec![
                PropertyKey::Atom(atoms::NAME),
                PropertyKey::Atom(atoms::STACK)
            ]
        );
    }
}
