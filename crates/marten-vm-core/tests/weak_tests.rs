//! Weak collections and finalization-registry cleanup scheduling.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use marten_vm_core::function::native_function;
use marten_vm_core::interpreter::call_value;
use marten_vm_core::object::{JsObject, ObjectKind};
use marten_vm_core::{Context, Runtime, Value};

fn new_context() -> (std::sync::Arc<Runtime>, Context) {
    let runtime = Runtime::new();
    let cx = runtime.create_context();
    (runtime, cx)
}

fn get_global_fn(cx: &mut Context, name: &str) -> Value {
    let global = cx.global().clone();
    let key = cx.key(name);
    global
        .get(cx, &key, &Value::Object(global.clone()))
        .unwrap()
}

#[test]
fn weak_map_entries_do_not_keep_keys_alive() {
    let (_rt, mut cx) = new_context();
    let ctor = get_global_fn(&mut cx, "WeakMap");
    let map = marten_vm_core::interpreter::construct_value(&mut cx, &ctor, &[], &ctor).unwrap();
    let Value::Object(map_obj) = &map else {
        panic!("expected object");
    };

    let key = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    {
        let ObjectKind::WeakMap(table) = map_obj.kind() else {
            panic!("expected weak map slots");
        };
        table.borrow_mut().set(&key, Value::string("held"));
        assert!(table.borrow().has(&key));
    }

    drop(key);
    let ObjectKind::WeakMap(table) = map_obj.kind() else {
        unreachable!()
    };
    table.borrow_mut().sweep_dead();
    assert_eq!(table.borrow_mut().len(), 0);
}

#[test]
fn finalization_registry_cleanup_runs_on_the_owning_context() {
    // Register `o` with held value "gone", drop it, trigger collection,
    // drain — the callback runs exactly once, with "gone", on this thread.
    let (_rt, mut cx) = new_context();

    let calls: Arc<Mutex<Vec<(String, std::thread::ThreadId)>>> = Arc::new(Mutex::new(Vec::new()));
    let calls_in_cb = calls.clone();
    let callback = Value::Object(native_function(
        &mut cx,
        "cleanup",
        1,
        Arc::new(move |_cx, _this, args| {
            let held = match args.first() {
                Some(Value::String(s)) => s.as_str().to_string(),
                other => format!("{other:?}"),
            };
            calls_in_cb
                .lock()
                .push((held, std::thread::current().id()));
            Ok(Value::Undefined)
        }),
    ));

    let ctor = get_global_fn(&mut cx, "FinalizationRegistry");
    let registry =
        marten_vm_core::interpreter::construct_value(&mut cx, &ctor, &[callback], &ctor).unwrap();
    let Value::Object(registry_obj) = &registry else {
        panic!("expected registry object");
    };

    let register_key = cx.key("register");
    let register = registry_obj
        .get(&mut cx, &register_key, &registry)
        .unwrap();
    let target = Value::Object(JsObject::ordinary(Some(
        cx.intrinsics().object_prototype.clone(),
    )));
    call_value(
        &mut cx,
        &register,
        &registry,
        &[target.clone(), Value::string("gone")],
    )
    .unwrap();

    // Nothing is queued while the target is reachable.
    cx.run_finalization_sweep();
    cx.process_microtasks();
    assert!(calls.lock().is_empty());

    // Drop the only strong reference and consult the oracle.
    drop(target);
    cx.run_finalization_sweep();

    // The callback has not run yet — it is queued, never synchronous with
    // the sweep.
    assert!(calls.lock().is_empty());
    cx.process_microtasks();

    let seen = calls.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "gone");
    assert_eq!(seen[0].1, std::thread::current().id());
}

#[test]
fn monitor_thread_raises_the_sweep_hint() {
    let (_rt, mut cx) = new_context();
    let calls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let calls_in_cb = calls.clone();
    let callback = Value::Object(native_function(
        &mut cx,
        "cleanup",
        1,
        Arc::new(move |_cx, _this, args| {
            if let Some(Value::String(s)) = args.first() {
                calls_in_cb.lock().push(s.as_str().to_string());
            }
            Ok(Value::Undefined)
        }),
    ));

    let ctor = get_global_fn(&mut cx, "FinalizationRegistry");
    let registry =
        marten_vm_core::interpreter::construct_value(&mut cx, &ctor, &[callback], &ctor).unwrap();
    let Value::Object(registry_obj) = &registry else {
        panic!("expected registry object");
    };
    let register_key = cx.key("register");
    let register = registry_obj
        .get(&mut cx, &register_key, &registry)
        .unwrap();

    let target = Value::Object(JsObject::ordinary(Some(
        cx.intrinsics().object_prototype.clone(),
    )));
    call_value(
        &mut cx,
        &register,
        &registry,
        &[target.clone(), Value::string("watched")],
    )
    .unwrap();
    drop(target);

    // Give the background monitor time to notice the dead target; the
    // cleanup itself still runs here, at the drain boundary.
    std::thread::sleep(Duration::from_millis(120));
    cx.process_microtasks();
    assert_eq!(*calls.lock(), vec!["watched"]);
}

#[test]
fn weak_ref_deref_after_collection_is_undefined() {
    let (_rt, mut cx) = new_context();
    let ctor = get_global_fn(&mut cx, "WeakRef");
    let target = Value::Object(JsObject::ordinary(Some(
        cx.intrinsics().object_prototype.clone(),
    )));
    let weak_ref =
        marten_vm_core::interpreter::construct_value(&mut cx, &ctor, &[target.clone()], &ctor)
            .unwrap();
    let Value::Object(weak_obj) = &weak_ref else {
        panic!("expected object");
    };
    let deref_key = cx.key("deref");
    let deref = weak_obj.get(&mut cx, &deref_key, &weak_ref).unwrap();

    let alive = call_value(&mut cx, &deref, &weak_ref, &[]).unwrap();
    assert!(alive.strict_equals(&target));

    drop(alive);
    drop(target);
    let gone = call_value(&mut cx, &deref, &weak_ref, &[]).unwrap();
    assert!(gone.is_undefined());
}
