//! Ephemeron table — the storage behind `WeakMap` and `WeakSet`.
//!
//! Keys are held weakly by identity; values are held strongly only while the
//! key is alive. Dead entries are pruned opportunistically on every mutating
//! access and by the collector's sweep hook.

use rustc_hash::FxHashMap;

use crate::handle::{GcRef, ObjectId, WeakGc};

/// An identity-keyed weak table.
pub struct EphemeronTable<K, V> {
    entries: FxHashMap<ObjectId, (WeakGc<K>, V)>,
}

impl<K, V> EphemeronTable<K, V> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Number of live entries. Dead entries are pruned first.
    pub fn len(&mut self) -> usize {
        self.sweep_dead();
        self.entries.len()
    }

    /// Whether the table has no live entries.
    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Insert or replace the value for `key`.
    pub fn set(&mut self, key: &GcRef<K>, value: V) {
        self.sweep_dead();
        self.entries.insert(key.id(), (key.downgrade(), value));
    }

    /// Get the value for `key`, if the key is present and alive.
    pub fn get(&self, key: &GcRef<K>) -> Option<&V> {
        let (weak, value) = self.entries.get(&key.id())?;
        if weak.is_alive() { Some(value) } else { None }
    }

    /// Whether `key` is present and alive.
    pub fn has(&self, key: &GcRef<K>) -> bool {
        self.get(key).is_some()
    }

    /// Remove the entry for `key`. Returns true if a live entry was removed.
    pub fn delete(&mut self, key: &GcRef<K>) -> bool {
        match self.entries.remove(&key.id()) {
            Some((weak, _)) => weak.is_alive(),
            None => false,
        }
    }

    /// Drop entries whose key died. The collector's sweep hook and mutating
    /// accessors both call this.
    pub fn sweep_dead(&mut self) {
        self.entries.retain(|_, (weak, _)| weak.is_alive());
    }

    /// Visit the values of all live entries (for tracing).
    pub fn for_each_live<F: FnMut(&V)>(&self, mut f: F) {
        for (weak, value) in self.entries.values() {
            if weak.is_alive() {
                f(value);
            }
        }
    }
}

impl<K, V> Default for EphemeronTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for EphemeronTable<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeronTable")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let key = GcRef::new("k");
        let mut table = EphemeronTable::new();

        table.set(&key, 42);
        assert_eq!(table.get(&key), Some(&42));
        assert!(table.has(&key));

        assert!(table.delete(&key));
        assert!(!table.has(&key));
        assert!(!table.delete(&key));
    }

    #[test]
    fn test_entries_die_with_key() {
        let mut table = EphemeronTable::new();
        let key = GcRef::new("k");
        table.set(&key, String::from("held"));
        assert_eq!(table.len(), 1);

        drop(key);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_identity_not_equality() {
        let mut table = EphemeronTable::new();
        let a = GcRef::new(1u32);
        let b = GcRef::new(1u32);

        table.set(&a, "a");
        assert!(table.has(&a));
        assert!(!table.has(&b));
    }
}
