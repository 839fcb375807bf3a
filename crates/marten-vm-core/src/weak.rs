//! Weak collections — WeakMap/WeakSet/WeakRef/FinalizationRegistry slots
//!
//! All four build on the `marten-vm-gc` weak primitives: entries never keep
//! their target reachable. A registry's cleanup callbacks are queued onto
//! the owning context's microtask queue by the finalization sweep; finalizer
//! code never runs synchronously with a collection pass.

use marten_vm_gc::FinalizationRegistryData;

use crate::object::JsObject;
use crate::value::Value;

/// Internal slots of a `FinalizationRegistry`.
pub struct RegistryState {
    /// Weak registrations and the pending-cleanup queue.
    pub data: FinalizationRegistryData<JsObject, Value>,
    /// The cleanup callback, invoked with each held value.
    pub callback: Value,
}

impl RegistryState {
    /// Create a registry around `callback`.
    pub fn new(callback: Value) -> Self {
        Self {
            data: FinalizationRegistryData::new(),
            callback,
        }
    }
}

impl std::fmt::Debug for RegistryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryState")
            .field("data", &self.data)
            .finish()
    }
}
