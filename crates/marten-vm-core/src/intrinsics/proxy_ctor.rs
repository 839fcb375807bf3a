//! The `Proxy` constructor and `Proxy.revocable`

use std::sync::Arc;

use crate::context::Context;
use crate::error::{VmError, VmResult};
use crate::function::{self, NativeFn};
use crate::intrinsics::method;
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyKey};
use crate::proxy::ProxyData;
use crate::value::Value;

/// Install `Proxy`. It has no `prototype` property.
pub fn install(cx: &mut Context) {
    let ctor = function::native_constructor(
        cx,
        "Proxy",
        2,
        Arc::new(proxy_ctor) as NativeFn,
        true,
    );
    method(cx, &ctor, "revocable", 2, proxy_revocable);
    let global = cx.global().clone();
    let key = PropertyKey::Atom(cx.atom("Proxy"));
    global.insert_property(key, Property::method(Value::Object(ctor)));
}

fn make_proxy(_cx: &mut Context, args: &[Value]) -> VmResult<marten_vm_gc::GcRef<JsObject>> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    let handler = args.get(1).cloned().unwrap_or(Value::Undefined);
    if !target.is_object() {
        return Err(VmError::type_error(
            "Cannot create proxy with a non-object as target",
        ));
    }
    if !handler.is_object() {
        return Err(VmError::type_error(
            "Cannot create proxy with a non-object as handler",
        ));
    }
    // Proxies have no own prototype; every lookup routes through the traps.
    Ok(JsObject::new(
        ObjectKind::Proxy(ProxyData::new(target, handler)),
        None,
    ))
}

fn proxy_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Object(make_proxy(cx, args)?))
}

/// `Proxy.revocable(target, handler)` — `{proxy, revoke}`.
fn proxy_revocable(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let proxy = make_proxy(cx, args)?;

    let revoke_target = proxy.clone();
    let revoke: NativeFn = Arc::new(move |_cx, _this, _args| {
        if let ObjectKind::Proxy(data) = revoke_target.kind() {
            data.revoke();
        }
        Ok(Value::Undefined)
    });
    let revoke_fn = function::native_function(cx, "revoke", 0, revoke);

    let result = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    let proxy_key = PropertyKey::Atom(cx.atom("proxy"));
    result.insert_property(proxy_key, Property::data(Value::Object(proxy)));
    let revoke_key = PropertyKey::Atom(cx.atom("revoke"));
    result.insert_property(revoke_key, Property::data(Value::Object(revoke_fn)));
    Ok(Value::Object(result))
}
