//! Map and Set backing stores
//!
//! Insertion-ordered, keyed by SameValueZero. Keys are wrapped in
//! [`ValueKey`] to give `Value` the hash/equality the collections need
//! (`NaN` equals `NaN`, `-0` equals `+0`, objects by identity).

use indexmap::IndexMap;
use std::hash::{Hash, Hasher};

use crate::value::Value;

/// Hash/Eq adapter over `Value` with SameValueZero semantics.
#[derive(Debug, Clone)]
pub struct ValueKey(pub Value);

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.same_value_zero(&other.0)
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Undefined => 0u8.hash(state),
            Value::Null => 1u8.hash(state),
            Value::Boolean(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Number(n) => {
                3u8.hash(state);
                // Canonicalize NaN payloads and -0 so SameValueZero-equal
                // numbers hash alike.
                let canonical = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0f64.to_bits()
                } else {
                    n.to_bits()
                };
                canonical.hash(state);
            }
            Value::BigInt(b) => {
                4u8.hash(state);
                b.hash(state);
            }
            Value::String(s) => {
                5u8.hash(state);
                s.hash_value().hash(state);
            }
            Value::Symbol(s) => {
                6u8.hash(state);
                s.id.hash(state);
            }
            Value::Object(o) => {
                7u8.hash(state);
                o.id().hash(state);
            }
        }
    }
}

/// The store behind `Map`.
#[derive(Debug, Default)]
pub struct OrderedMap {
    entries: IndexMap<ValueKey, Value>,
}

impl OrderedMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or update, preserving first-insertion order.
    pub fn set(&mut self, key: Value, value: Value) {
        self.entries.insert(ValueKey(key), value);
    }

    /// Look up by SameValueZero.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(&ValueKey(key.clone()))
    }

    /// Whether a key is present.
    pub fn has(&self, key: &Value) -> bool {
        self.entries.contains_key(&ValueKey(key.clone()))
    }

    /// Remove a key, preserving the order of remaining entries.
    pub fn delete(&mut self, key: &Value) -> bool {
        self.entries.shift_remove(&ValueKey(key.clone())).is_some()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (&k.0, v))
    }

    /// Visit entries in insertion order.
    pub fn for_each<F: FnMut(&Value, &Value)>(&self, mut f: F) {
        for (k, v) in self.iter() {
            f(k, v);
        }
    }

    /// Entry at position `i` (iteration support).
    pub fn entry_at(&self, i: usize) -> Option<(Value, Value)> {
        self.entries
            .get_index(i)
            .map(|(k, v)| (k.0.clone(), v.clone()))
    }
}

/// The store behind `Set`.
#[derive(Debug, Default)]
pub struct OrderedSet {
    entries: IndexMap<ValueKey, ()>,
}

impl OrderedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a value; re-adding keeps the original position.
    pub fn add(&mut self, value: Value) {
        self.entries.entry(ValueKey(value)).or_insert(());
    }

    /// Membership by SameValueZero.
    pub fn has(&self, value: &Value) -> bool {
        self.entries.contains_key(&ValueKey(value.clone()))
    }

    /// Remove a value.
    pub fn delete(&mut self, value: &Value) -> bool {
        self.entries.shift_remove(&ValueKey(value.clone())).is_some()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.keys().map(|k| &k.0)
    }

    /// Visit values in insertion order.
    pub fn for_each<F: FnMut(&Value)>(&self, mut f: F) {
        for v in self.iter() {
            f(v);
        }
    }

    /// Value at position `i` (iteration support).
    pub fn value_at(&self, i: usize) -> Option<Value> {
        self.entries.get_index(i).map(|(k, _)| k.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_value_zero_keys() {
        let mut map = OrderedMap::new();
        map.set(Value::number(f64::NAN), Value::string("nan"));
        assert!(map.has(&Value::number(f64::NAN)));

        map.set(Value::number(0.0), Value::string("zero"));
        assert!(map.has(&Value::number(-0.0)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut set = OrderedSet::new();
        set.add(Value::string("b"));
        set.add(Value::string("a"));
        set.add(Value::string("b")); // no move
        let order: Vec<String> = set
            .iter()
            .map(|v| v.as_string().unwrap().as_str().to_string())
            .collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_delete_keeps_order() {
        let mut map = OrderedMap::new();
        map.set(Value::int32(1), Value::Undefined);
        map.set(Value::int32(2), Value::Undefined);
        map.set(Value::int32(3), Value::Undefined);
        assert!(map.delete(&Value::int32(2)));
        let keys: Vec<f64> = map.iter().map(|(k, _)| k.as_number().unwrap()).collect();
        assert_eq!(keys, vec![1.0, 3.0]);
    }
}
