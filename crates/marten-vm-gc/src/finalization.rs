//! FinalizationRegistry support — tracks weak targets for cleanup scheduling.
//!
//! Registrations hold the target weakly and a held value strongly. When a
//! target dies, its held value moves to a pending queue; the owning context
//! drains the queue and runs the cleanup callback as a microtask. Finalizer
//! code never runs synchronously with a sweep.

use crate::handle::{GcRef, ObjectId, Trace, WeakGc};

struct Registration<T, H> {
    target: WeakGc<T>,
    held: H,
    /// Identity of the unregister token, if one was supplied.
    token: Option<ObjectId>,
}

/// Data backing a single `FinalizationRegistry`.
pub struct FinalizationRegistryData<T, H> {
    registrations: Vec<Registration<T, H>>,
    pending: Vec<H>,
}

impl<T, H> FinalizationRegistryData<T, H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Register `target` with a held value and optional unregister token.
    pub fn register(&mut self, target: &GcRef<T>, held: H, token: Option<ObjectId>) {
        self.registrations.push(Registration {
            target: target.downgrade(),
            held,
            token,
        });
    }

    /// Remove every registration made under `token`. Returns true if any
    /// registration was removed.
    pub fn unregister(&mut self, token: ObjectId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.token != Some(token));
        self.registrations.len() != before
    }

    /// Move held values of dead targets to the pending queue. Returns the
    /// number of registrations that became pending.
    pub fn sweep_dead_targets(&mut self) -> usize {
        let mut swept = 0;
        let mut kept = Vec::with_capacity(self.registrations.len());
        for r in self.registrations.drain(..) {
            if r.target.is_alive() {
                kept.push(r);
            } else {
                self.pending.push(r.held);
                swept += 1;
            }
        }
        self.registrations = kept;
        #[cfg(feature = "gc_logging")]
        if swept > 0 {
            tracing::trace!(swept, "finalization registry sweep");
        }
        swept
    }

    /// Drain held values queued for cleanup.
    pub fn drain_pending(&mut self) -> Vec<H> {
        std::mem::take(&mut self.pending)
    }

    /// Whether cleanups are queued.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of live registrations.
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Visit held values of all registrations and pending cleanups (for
    /// tracing — held values are strong references).
    pub fn for_each_held<F: FnMut(&H)>(&self, mut f: F) {
        for r in &self.registrations {
            f(&r.held);
        }
        for h in &self.pending {
            f(h);
        }
    }
}

impl<T, H> Default for FinalizationRegistryData<T, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, H> std::fmt::Debug for FinalizationRegistryData<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizationRegistryData")
            .field("registrations", &self.registrations.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<T, H> Trace for FinalizationRegistryData<T, H> {
    // Targets are weak; held values are traced through `for_each_held` by the
    // owning object.
    const NEEDS_TRACE: bool = false;

    fn trace(&self, _tracer: &mut dyn FnMut(ObjectId)) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_moves_held_to_pending() {
        let mut registry = FinalizationRegistryData::new();
        let target = GcRef::new(());
        registry.register(&target, "gone", None);

        assert_eq!(registry.sweep_dead_targets(), 0);
        assert!(!registry.has_pending());

        drop(target);
        assert_eq!(registry.sweep_dead_targets(), 1);
        assert_eq!(registry.drain_pending(), vec!["gone"]);
        assert!(!registry.has_pending());
    }

    #[test]
    fn test_unregister_by_token() {
        let mut registry = FinalizationRegistryData::new();
        let target = GcRef::new(());
        let token = GcRef::new(());

        registry.register(&target, 1, Some(token.id()));
        registry.register(&target, 2, None);

        assert!(registry.unregister(token.id()));
        assert_eq!(registry.registration_count(), 1);

        drop(target);
        registry.sweep_dead_targets();
        assert_eq!(registry.drain_pending(), vec![2]);
    }
}
