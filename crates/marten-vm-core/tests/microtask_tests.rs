//! Microtask FIFO ordering and promise reaction scheduling.

use parking_lot::Mutex;
use std::sync::Arc;

use marten_vm_core::function::native_function;
use marten_vm_core::interpreter::call_value;
use marten_vm_core::promise::{self, PromiseState};
use marten_vm_core::{Context, Runtime, Value};

fn new_context() -> (std::sync::Arc<Runtime>, Context) {
    let runtime = Runtime::new();
    let cx = runtime.create_context();
    (runtime, cx)
}

type Log = Arc<Mutex<Vec<String>>>;

fn logger(cx: &mut Context, log: &Log, tag: &str) -> Value {
    let log = log.clone();
    let tag = tag.to_string();
    Value::Object(native_function(
        cx,
        "log",
        0,
        Arc::new(move |_cx, _this, _args| {
            log.lock().push(tag.clone());
            Ok(Value::Undefined)
        }),
    ))
}

#[test]
fn microtasks_run_in_fifo_registration_order() {
    // Promise.resolve().then(A); Promise.resolve().then(B);
    // queueMicrotask(C); log('sync') — drained order: sync, A, B, C.
    let (_rt, mut cx) = new_context();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let p1 = promise::promise_resolve(&mut cx, Value::Undefined).unwrap();
    let a = logger(&mut cx, &log, "A");
    promise::perform_then(&mut cx, &p1, Some(a), None);

    let p2 = promise::promise_resolve(&mut cx, Value::Undefined).unwrap();
    let b = logger(&mut cx, &log, "B");
    promise::perform_then(&mut cx, &p2, Some(b), None);

    let global = cx.global().clone();
    let queue_key = cx.key("queueMicrotask");
    let queue_fn = global
        .get(&mut cx, &queue_key, &Value::Object(global.clone()))
        .unwrap();
    let c = logger(&mut cx, &log, "C");
    call_value(&mut cx, &queue_fn, &Value::Undefined, &[c]).unwrap();

    log.lock().push("sync".to_string());
    cx.process_microtasks();

    assert_eq!(*log.lock(), vec!["sync", "A", "B", "C"]);
}

#[test]
fn jobs_enqueued_during_drain_run_in_the_same_drain() {
    let (_rt, mut cx) = new_context();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let outer_log = log.clone();
    cx.enqueue_microtask(Box::new(move |cx: &mut Context| {
        outer_log.lock().push("first".to_string());
        let inner_log = outer_log.clone();
        cx.enqueue_microtask(Box::new(move |_cx: &mut Context| {
            inner_log.lock().push("nested".to_string());
        }));
    }));
    let second_log = log.clone();
    cx.enqueue_microtask(Box::new(move |_cx: &mut Context| {
        second_log.lock().push("second".to_string());
    }));

    cx.process_microtasks();
    assert_eq!(*log.lock(), vec!["first", "second", "nested"]);
}

#[test]
fn promise_settles_at_most_once() {
    let (_rt, mut cx) = new_context();
    let p = promise::new_promise(&mut cx);
    let (resolve, reject) = promise::create_resolving_functions(&mut cx, &p);

    call_value(&mut cx, &resolve, &Value::Undefined, &[Value::int32(1)]).unwrap();
    call_value(&mut cx, &resolve, &Value::Undefined, &[Value::int32(2)]).unwrap();
    call_value(&mut cx, &reject, &Value::Undefined, &[Value::string("no")]).unwrap();
    cx.process_microtasks();

    match promise::state_of(&p) {
        PromiseState::Fulfilled(v) => assert!(v.strict_equals(&Value::int32(1))),
        other => panic!("expected first fulfillment to stick, got {other:?}"),
    }

    // Reactions attached after settlement still observe the same state.
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let late_log = log.clone();
    let late = Value::Object(native_function(
        &mut cx,
        "late",
        1,
        Arc::new(move |_cx, _this, args| {
            let v = args.first().and_then(Value::as_number).unwrap_or(f64::NAN);
            late_log.lock().push(format!("late:{v}"));
            Ok(Value::Undefined)
        }),
    ));
    promise::perform_then(&mut cx, &p, Some(late), None);
    cx.process_microtasks();
    assert_eq!(*log.lock(), vec!["late:1"]);
}

#[test]
fn reactions_registered_before_settlement_run_first() {
    let (_rt, mut cx) = new_context();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    let p = promise::new_promise(&mut cx);
    let early = logger(&mut cx, &log, "early");
    promise::perform_then(&mut cx, &p, Some(early), None);

    promise::resolve_with(&mut cx, &p, Value::Undefined).unwrap();
    let late = logger(&mut cx, &log, "late");
    promise::perform_then(&mut cx, &p, Some(late), None);

    cx.process_microtasks();
    assert_eq!(*log.lock(), vec!["early", "late"]);
}

#[test]
fn thenable_resolution_assimilates_via_a_job() {
    let (_rt, mut cx) = new_context();

    // A thenable whose `then` immediately fulfills with 7.
    let thenable = marten_vm_core::JsObject::ordinary(Some(
        cx.intrinsics().object_prototype.clone(),
    ));
    let then_fn = Value::Object(native_function(
        &mut cx,
        "then",
        2,
        Arc::new(|cx, _this, args| {
            let resolve = args.first().cloned().unwrap_or(Value::Undefined);
            call_value(cx, &resolve, &Value::Undefined, &[Value::int32(7)])
        }),
    ));
    let then_key = cx.key("then");
    thenable.insert_property(then_key, marten_vm_core::property::Property::data(then_fn));

    let p = promise::new_promise(&mut cx);
    promise::resolve_with(&mut cx, &p, Value::Object(thenable)).unwrap();

    // Assimilation is deferred: still pending before the drain.
    assert!(matches!(promise::state_of(&p), PromiseState::Pending));
    cx.process_microtasks();
    match promise::state_of(&p) {
        PromiseState::Fulfilled(v) => assert!(v.strict_equals(&Value::int32(7))),
        other => panic!("expected fulfillment, got {other:?}"),
    }
}

#[test]
fn unhandled_rejections_reach_the_callback() {
    let (_rt, mut cx) = new_context();
    let seen: Log = Arc::new(Mutex::new(Vec::new()));
    let seen_in_cb = seen.clone();
    cx.set_promise_reject_callback(Arc::new(move |cx, reason| {
        let rendered = marten_vm_core::convert::display_value(cx, &reason);
        seen_in_cb.lock().push(rendered);
    }));

    let p = promise::new_promise(&mut cx);
    promise::reject_promise_with(&mut cx, &p, Value::string("lost"));
    cx.process_microtasks();
    assert_eq!(*seen.lock(), vec!["lost"]);

    // A handled rejection stays quiet.
    let q = promise::new_promise(&mut cx);
    let noop = Value::Object(native_function(
        &mut cx,
        "noop",
        1,
        Arc::new(|_cx, _this, _args| Ok(Value::Undefined)),
    ));
    promise::perform_then(&mut cx, &q, None, Some(noop));
    promise::reject_promise_with(&mut cx, &q, Value::string("handled"));
    cx.process_microtasks();
    assert_eq!(seen.lock().len(), 1);
}
