//! Proxy traps, revocation, and the chain depth guard.

use std::sync::Arc;

use marten_vm_core::object::{self, JsObject, ObjectKind};
use marten_vm_core::property::{Property, PropertyKey};
use marten_vm_core::proxy::ProxyData;
use marten_vm_core::{Context, GcRef, Runtime, Value, VmError};

fn new_context() -> (std::sync::Arc<Runtime>, Context) {
    let runtime = Runtime::new();
    let cx = runtime.create_context();
    (runtime, cx)
}

fn empty_handler(cx: &mut Context) -> Value {
    Value::Object(JsObject::ordinary(Some(
        cx.intrinsics().object_prototype.clone(),
    )))
}

fn proxy_over(target: Value, handler: Value) -> GcRef<JsObject> {
    JsObject::new(ObjectKind::Proxy(ProxyData::new(target, handler)), None)
}

/// A chain of `depth` proxies whose innermost target is an array.
fn proxy_chain(cx: &mut Context, depth: usize) -> Value {
    let mut current = Value::Object(marten_vm_core::array::new_array(cx, vec![]));
    for _ in 0..depth {
        let handler = empty_handler(cx);
        current = Value::Object(proxy_over(current, handler));
    }
    current
}

#[test]
fn is_array_terminates_within_the_depth_guard() {
    let (_rt, mut cx) = new_context();
    let chain = proxy_chain(&mut cx, 1000);
    assert!(object::is_array(&chain).unwrap());
}

#[test]
fn is_array_throws_past_the_depth_guard() {
    let (_rt, mut cx) = new_context();
    let chain = proxy_chain(&mut cx, 1001);
    let err = object::is_array(&chain).unwrap_err();
    match err {
        VmError::TypeError(msg) => assert!(msg.contains("recursion"), "message was {msg}"),
        other => panic!("expected TypeError, got {other:?}"),
    }
}

#[test]
fn revoked_proxy_fails_every_operation() {
    let (_rt, mut cx) = new_context();
    let target = Value::Object(JsObject::ordinary(Some(
        cx.intrinsics().object_prototype.clone(),
    )));
    let handler = empty_handler(&mut cx);
    let proxy = proxy_over(target, handler);

    let key = cx.key("x");
    let receiver = Value::Object(proxy.clone());
    assert!(proxy.get(&mut cx, &key, &receiver).is_ok());

    let ObjectKind::Proxy(data) = proxy.kind() else {
        unreachable!()
    };
    data.revoke();

    assert!(proxy.get(&mut cx, &key, &receiver).is_err());
    assert!(proxy.has(&mut cx, &key).is_err());
    assert!(proxy.delete(&mut cx, &key).is_err());
    assert!(proxy.own_keys(&mut cx).is_err());
    assert!(object::is_array(&receiver).is_err());
}

#[test]
fn get_trap_sees_key_and_receiver() {
    let (_rt, mut cx) = new_context();
    let target = Value::Object(JsObject::ordinary(Some(
        cx.intrinsics().object_prototype.clone(),
    )));

    let trap = marten_vm_core::function::native_function(
        &mut cx,
        "get",
        3,
        Arc::new(|cx, _this, args| {
            // (target, key, receiver) — answer with the key, uppercased.
            let key = args.get(1).cloned().unwrap_or(Value::Undefined);
            let s = marten_vm_core::convert::to_string_value(cx, &key)?;
            Ok(Value::string(s.as_str().to_uppercase()))
        }),
    );
    let handler = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    let get_key = cx.key("get");
    handler.insert_property(get_key, Property::method(Value::Object(trap)));

    let proxy = proxy_over(target, Value::Object(handler));
    let receiver = Value::Object(proxy.clone());
    let key = cx.key("color");
    let got = proxy.get(&mut cx, &key, &receiver).unwrap();
    assert!(got.strict_equals(&Value::string("COLOR")));
}

#[test]
fn get_trap_must_respect_frozen_data_properties() {
    let (_rt, mut cx) = new_context();
    let target_obj = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    let key = cx.key("pinned");
    target_obj.insert_property(
        key.clone(),
        Property::data_with(Value::int32(1), false, true, false),
    );
    let target = Value::Object(target_obj);

    let lying_trap = marten_vm_core::function::native_function(
        &mut cx,
        "get",
        3,
        Arc::new(|_cx, _this, _args| Ok(Value::int32(2))),
    );
    let handler = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    let get_key = cx.key("get");
    handler.insert_property(get_key, Property::method(Value::Object(lying_trap)));

    let proxy = proxy_over(target, Value::Object(handler));
    let receiver = Value::Object(proxy.clone());
    assert!(proxy.get(&mut cx, &key, &receiver).is_err());
}

#[test]
fn missing_traps_forward_to_the_target() {
    let (_rt, mut cx) = new_context();
    let target_obj = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    let key = cx.key("answer");
    target_obj.insert_property(key.clone(), Property::data(Value::int32(42)));

    let handler = empty_handler(&mut cx);
    let proxy = proxy_over(Value::Object(target_obj.clone()), handler);
    let receiver = Value::Object(proxy.clone());

    let got = proxy.get(&mut cx, &key, &receiver).unwrap();
    assert!(got.strict_equals(&Value::int32(42)));
    assert!(proxy.has(&mut cx, &key).unwrap());

    let fresh_key = cx.key("fresh");
    proxy
        .set(&mut cx, &fresh_key, Value::int32(1), &receiver)
        .unwrap();
    assert!(target_obj.has(&mut cx, &fresh_key).unwrap());
}
