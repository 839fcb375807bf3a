//! GC handles and the trace interface

use std::sync::{Arc, Weak};

/// Stable identity of a heap object, used as a key for weak collections and
/// for cycle detection. Valid for as long as any handle to the object exists.
pub type ObjectId = usize;

/// Trait for types the collector can walk.
///
/// `trace` reports the identity of every strong reference held by the object.
/// Types with `NEEDS_TRACE = false` hold no references and may be skipped.
pub trait Trace {
    /// Whether this type can hold references to other heap objects.
    const NEEDS_TRACE: bool = true;

    /// Visit the identity of every strong reference held by `self`.
    fn trace(&self, tracer: &mut dyn FnMut(ObjectId));
}

/// A shared handle to a heap-allocated VM object.
///
/// Handles are reference-counted roots; the external collector reclaims
/// unreachable cycles behind this interface. Equality of handles is identity,
/// not structural.
pub struct GcRef<T: ?Sized> {
    inner: Arc<T>,
}

impl<T> GcRef<T> {
    /// Allocate a new heap object and return the handle.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// The object's stable identity.
    pub fn id(&self) -> ObjectId {
        Arc::as_ptr(&self.inner) as ObjectId
    }

    /// Identity comparison.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Create a weak handle that does not keep the object alive.
    pub fn downgrade(&self) -> WeakGc<T> {
        WeakGc {
            inner: Arc::downgrade(&self.inner),
            id: self.id(),
        }
    }
}

impl<T: ?Sized> Clone for GcRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> std::ops::Deref for GcRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for GcRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GcRef({:p})", Arc::as_ptr(&self.inner))
    }
}

/// A weak handle to a heap object. Never keeps its target reachable.
pub struct WeakGc<T: ?Sized> {
    inner: Weak<T>,
    id: ObjectId,
}

impl<T> WeakGc<T> {
    /// Recover a strong handle if the target is still alive.
    pub fn upgrade(&self) -> Option<GcRef<T>> {
        self.inner.upgrade().map(|inner| GcRef { inner })
    }

    /// Whether the target is still alive.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// The identity the target had when this weak handle was created.
    /// Stable even after the target dies.
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl<T: ?Sized> Clone for WeakGc<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            id: self.id,
        }
    }
}

impl<T> std::fmt::Debug for WeakGc<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakGc")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_identity() {
        let a = GcRef::new(1u32);
        let b = a.clone();
        let c = GcRef::new(1u32);

        assert!(GcRef::ptr_eq(&a, &b));
        assert!(!GcRef::ptr_eq(&a, &c));
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_weak_does_not_keep_alive() {
        let a = GcRef::new(String::from("target"));
        let w = a.downgrade();
        assert!(w.is_alive());
        assert!(w.upgrade().is_some());

        drop(a);
        assert!(!w.is_alive());
        assert!(w.upgrade().is_none());
    }
}
