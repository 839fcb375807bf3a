//! Interned JavaScript strings
//!
//! Strings are immutable and deduplicated through the runtime's atom table.
//! Storage is UTF-8 with UTF-16 accessors: JavaScript indices are in UTF-16
//! code units, so every position-based operation converts at the boundary.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An immutable JavaScript string.
#[derive(Clone)]
pub struct JsString {
    data: Arc<str>,
    /// Precomputed hash for fast table lookups
    hash: u64,
}

impl JsString {
    /// Create a string from UTF-8 data.
    pub fn new(s: impl Into<Arc<str>>) -> Arc<Self> {
        let data: Arc<str> = s.into();
        let hash = Self::compute_hash(&data);
        Arc::new(Self { data, hash })
    }

    /// Create a string from UTF-16 code units. Unpaired surrogates are
    /// replaced, matching the engine's lossy UTF-16 boundary.
    pub fn from_utf16(units: &[u16]) -> Arc<Self> {
        Self::new(String::from_utf16_lossy(units))
    }

    /// The string as a UTF-8 slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Length in UTF-16 code units (the JS-visible `length`).
    pub fn len_utf16(&self) -> usize {
        self.data.encode_utf16().count()
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the string is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Precomputed hash value.
    #[inline]
    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    /// UTF-16 code unit at `index`, if in range.
    pub fn code_unit_at(&self, index: usize) -> Option<u16> {
        self.data.encode_utf16().nth(index)
    }

    /// Substring by UTF-16 code-unit indices, clamped to the string.
    pub fn substring_utf16(&self, start: usize, end: usize) -> Arc<Self> {
        let units: Vec<u16> = self.data.encode_utf16().collect();
        let start = start.min(units.len());
        let end = end.min(units.len()).max(start);
        Self::from_utf16(&units[start..end])
    }

    /// Concatenate two strings.
    pub fn concat(&self, other: &JsString) -> Arc<Self> {
        let mut result = String::with_capacity(self.len() + other.len());
        result.push_str(&self.data);
        result.push_str(&other.data);
        Self::new(result)
    }

    /// Lexicographic comparison by UTF-16 code units (the ES relational
    /// ordering for strings).
    pub fn compare_utf16(&self, other: &JsString) -> std::cmp::Ordering {
        self.data.encode_utf16().cmp(other.data.encode_utf16())
    }

    fn compute_hash(s: &str) -> u64 {
        let mut hasher = FxHasher::default();
        s.hash(&mut hasher);
        hasher.finish()
    }
}

impl std::fmt::Debug for JsString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JsString({:?})", self.data)
    }
}

impl std::fmt::Display for JsString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.data)
    }
}

impl PartialEq for JsString {
    fn eq(&self, other: &Self) -> bool {
        // Fast path on the precomputed hash, then verify.
        self.hash == other.hash && self.data == other.data
    }
}

impl Eq for JsString {}

impl Hash for JsString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_utf16() {
        // Surrogate pair counts as two code units.
        let s = JsString::new("a😀b");
        assert_eq!(s.len_utf16(), 4);
        assert_eq!(JsString::new("abc").len_utf16(), 3);
    }

    #[test]
    fn test_substring_utf16() {
        let s = JsString::new("a😀b");
        assert_eq!(s.substring_utf16(0, 1).as_str(), "a");
        assert_eq!(s.substring_utf16(1, 3).as_str(), "😀");
        assert_eq!(s.substring_utf16(3, 10).as_str(), "b");
    }

    #[test]
    fn test_equality_and_hash() {
        let a = JsString::new("hello");
        let b = JsString::new("hello");
        let c = JsString::new("world");
        assert_eq!(*a, *b);
        assert_eq!(a.hash_value(), b.hash_value());
        assert_ne!(*a, *c);
    }

    #[test]
    fn test_compare_utf16() {
        use std::cmp::Ordering;
        let a = JsString::new("a");
        let b = JsString::new("b");
        assert_eq!(a.compare_utf16(&b), Ordering::Less);
        assert_eq!(b.compare_utf16(&a), Ordering::Greater);
        assert_eq!(a.compare_utf16(&JsString::new("a")), Ordering::Equal);
    }
}
