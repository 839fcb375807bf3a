//! Weak-reference semantics across the oracle types.

use marten_vm_gc::{EphemeronTable, FinalizationRegistryData, GcRef, WeakSlot};

#[test]
fn weak_slot_clears_when_target_dies() {
    let target = GcRef::new(vec![1, 2, 3]);
    let slot = WeakSlot::new(&target);

    let strong = slot.deref_target().expect("target alive");
    assert!(GcRef::ptr_eq(&strong, &target));

    drop(strong);
    drop(target);
    assert!(slot.deref_target().is_none());
}

#[test]
fn ephemeron_value_unreachable_after_key_death() {
    // A value held only through a dead key must not be observable.
    let mut table: EphemeronTable<u32, GcRef<String>> = EphemeronTable::new();
    let key = GcRef::new(0u32);
    let value = GcRef::new(String::from("payload"));
    table.set(&key, value.clone());

    drop(key);
    table.sweep_dead();
    let mut seen = 0;
    table.for_each_live(|_| seen += 1);
    assert_eq!(seen, 0);
}

#[test]
fn registry_sweep_is_idempotent() {
    let mut registry = FinalizationRegistryData::new();
    let target = GcRef::new(());
    registry.register(&target, "held", None);
    drop(target);

    assert_eq!(registry.sweep_dead_targets(), 1);
    assert_eq!(registry.sweep_dead_targets(), 0);
    assert_eq!(registry.drain_pending().len(), 1);
    assert_eq!(registry.drain_pending().len(), 0);
}

#[test]
fn registry_keeps_live_targets() {
    let mut registry = FinalizationRegistryData::new();
    let live = GcRef::new(());
    let dead = GcRef::new(());
    registry.register(&live, "live", None);
    registry.register(&dead, "dead", None);
    drop(dead);

    registry.sweep_dead_targets();
    assert_eq!(registry.drain_pending(), vec!["dead"]);
    assert_eq!(registry.registration_count(), 1);
}
