//! Proxy exotic object
//!
//! Stores target and handler; every operation consults the corresponding
//! trap, falling back to the target. Revoked proxies fail every operation
//! with `TypeError`. Chain-sensitive queries (`IsArray`, `IsCallable`,
//! `IsConstructor`) carry a fixed depth guard — see
//! [`crate::object::PROXY_DEPTH_LIMIT`].

use std::cell::RefCell;

use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::interpreter;
use crate::object::JsObject;
use crate::property::{Property, PropertyDescriptor, PropertyKey};
use crate::value::Value;

/// Internal slots of a proxy: target and handler, cleared on revocation.
#[derive(Debug)]
pub struct ProxyData {
    inner: RefCell<Option<(Value, Value)>>,
}

impl ProxyData {
    /// Create proxy slots over `target` and `handler`.
    pub fn new(target: Value, handler: Value) -> Self {
        Self {
            inner: RefCell::new(Some((target, handler))),
        }
    }

    /// The target, unless revoked.
    pub fn target(&self) -> Option<Value> {
        self.inner.borrow().as_ref().map(|(t, _)| t.clone())
    }

    /// The handler, unless revoked.
    pub fn handler(&self) -> Option<Value> {
        self.inner.borrow().as_ref().map(|(_, h)| h.clone())
    }

    /// Revoke: clear both slots.
    pub fn revoke(&self) {
        *self.inner.borrow_mut() = None;
    }

    /// Whether the proxy has been revoked.
    pub fn is_revoked(&self) -> bool {
        self.inner.borrow().is_none()
    }
}

fn slots(obj: &JsObject) -> &ProxyData {
    match obj.kind() {
        crate::object::ObjectKind::Proxy(p) => p,
        _ => unreachable!("proxy operation on non-proxy"),
    }
}

fn parts(obj: &JsObject, op: &str) -> VmResult<(Value, Value)> {
    slots(obj).inner.borrow().clone().ok_or_else(|| {
        VmError::type_error(format!(
            "Cannot perform '{op}' on a proxy that has been revoked"
        ))
    })
}

/// Fetch a trap from the handler; `undefined`/`null` means absent.
fn trap(cx: &mut Context, handler: &Value, name: &str) -> VmResult<Option<Value>> {
    let Value::Object(handler_obj) = handler else {
        return Err(VmError::type_error("proxy handler is not an object"));
    };
    let key = PropertyKey::Atom(cx.atom(name));
    let value = handler_obj.get(cx, &key, handler)?;
    if value.is_nullish() {
        return Ok(None);
    }
    if !value.is_callable() {
        return Err(VmError::type_error(format!("proxy trap '{name}' is not callable")));
    }
    Ok(Some(value))
}

/// `[[Get]]` trap.
pub fn proxy_get(
    cx: &mut Context,
    obj: &JsObject,
    key: &PropertyKey,
    receiver: &Value,
) -> VmResult<Value> {
    let (target, handler) = parts(obj, "get")?;
    let Some(trap_fn) = trap(cx, &handler, "get")? else {
        let Value::Object(t) = &target else {
            return Err(VmError::type_error("proxy target is not an object"));
        };
        return t.get(cx, key, receiver);
    };
    let key_value = convert::key_to_value(cx, key);
    let result = interpreter::call_value(
        cx,
        &trap_fn,
        &handler,
        &[target.clone(), key_value, receiver.clone()],
    )?;

    // Invariant: a non-configurable non-writable data property must be
    // reported faithfully.
    if let Value::Object(t) = &target {
        if let Some(Property::Data {
            value,
            writable: false,
            configurable: false,
            ..
        }) = t.get_own_property(cx, key)?
        {
            if !result.same_value(&value) {
                return Err(VmError::type_error(
                    "proxy 'get' trap violated the target's non-configurable property",
                ));
            }
        }
    }
    Ok(result)
}

/// `[[Set]]` trap.
pub fn proxy_set(
    cx: &mut Context,
    obj: &JsObject,
    key: &PropertyKey,
    value: Value,
    receiver: &Value,
) -> VmResult<bool> {
    let (target, handler) = parts(obj, "set")?;
    let Some(trap_fn) = trap(cx, &handler, "set")? else {
        let Value::Object(t) = &target else {
            return Err(VmError::type_error("proxy target is not an object"));
        };
        return t.set(cx, key, value, receiver);
    };
    let key_value = convert::key_to_value(cx, key);
    let result = interpreter::call_value(
        cx,
        &trap_fn,
        &handler,
        &[target, key_value, value, receiver.clone()],
    )?;
    Ok(result.is_truthy())
}

/// `[[Has]]` trap.
pub fn proxy_has(cx: &mut Context, obj: &JsObject, key: &PropertyKey) -> VmResult<bool> {
    let (target, handler) = parts(obj, "has")?;
    let Some(trap_fn) = trap(cx, &handler, "has")? else {
        let Value::Object(t) = &target else {
            return Err(VmError::type_error("proxy target is not an object"));
        };
        return t.has(cx, key);
    };
    let key_value = convert::key_to_value(cx, key);
    let result = interpreter::call_value(cx, &trap_fn, &handler, &[target, key_value])?;
    Ok(result.is_truthy())
}

/// `[[Delete]]` trap.
pub fn proxy_delete(cx: &mut Context, obj: &JsObject, key: &PropertyKey) -> VmResult<bool> {
    let (target, handler) = parts(obj, "deleteProperty")?;
    let Some(trap_fn) = trap(cx, &handler, "deleteProperty")? else {
        let Value::Object(t) = &target else {
            return Err(VmError::type_error("proxy target is not an object"));
        };
        return t.delete(cx, key);
    };
    let key_value = convert::key_to_value(cx, key);
    let result = interpreter::call_value(cx, &trap_fn, &handler, &[target, key_value])?;
    Ok(result.is_truthy())
}

/// `[[GetOwnProperty]]` trap.
pub fn proxy_get_own_property(
    cx: &mut Context,
    obj: &JsObject,
    key: &PropertyKey,
) -> VmResult<Option<Property>> {
    let (target, handler) = parts(obj, "getOwnPropertyDescriptor")?;
    let Value::Object(t) = target.clone() else {
        return Err(VmError::type_error("proxy target is not an object"));
    };
    let Some(trap_fn) = trap(cx, &handler, "getOwnPropertyDescriptor")? else {
        return t.get_own_property(cx, key);
    };
    let key_value = convert::key_to_value(cx, key);
    let result = interpreter::call_value(cx, &trap_fn, &handler, &[target, key_value])?;
    if result.is_undefined() {
        return Ok(None);
    }
    let desc = convert::to_property_descriptor(cx, &result)?;
    Ok(Some(desc.complete()))
}

/// `[[DefineOwnProperty]]` trap.
pub fn proxy_define_own_property(
    cx: &mut Context,
    obj: &JsObject,
    key: &PropertyKey,
    desc: PropertyDescriptor,
) -> VmResult<bool> {
    let (target, handler) = parts(obj, "defineProperty")?;
    let Value::Object(t) = target.clone() else {
        return Err(VmError::type_error("proxy target is not an object"));
    };
    let Some(trap_fn) = trap(cx, &handler, "defineProperty")? else {
        return t.define_own_property(cx, key, desc);
    };
    let key_value = convert::key_to_value(cx, key);
    let desc_obj = convert::from_property_descriptor(cx, &desc);
    let result = interpreter::call_value(
        cx,
        &trap_fn,
        &handler,
        &[target, key_value, desc_obj],
    )?;
    Ok(result.is_truthy())
}

/// `[[OwnPropertyKeys]]` trap.
pub fn proxy_own_keys(cx: &mut Context, obj: &JsObject) -> VmResult<Vec<PropertyKey>> {
    let (target, handler) = parts(obj, "ownKeys")?;
    let Value::Object(t) = target.clone() else {
        return Err(VmError::type_error("proxy target is not an object"));
    };
    let Some(trap_fn) = trap(cx, &handler, "ownKeys")? else {
        return t.own_keys(cx);
    };
    let result = interpreter::call_value(cx, &trap_fn, &handler, &[target])?;
    let Value::Object(list) = result else {
        return Err(VmError::type_error("proxy 'ownKeys' trap must return an array"));
    };
    let len = crate::array::length_of(&list);
    let mut keys = Vec::with_capacity(len as usize);
    for i in 0..len {
        let element = list.get(cx, &PropertyKey::Index(i), &Value::Object(list.clone()))?;
        keys.push(convert::to_property_key(cx, &element)?);
    }
    Ok(keys)
}

/// `[[GetPrototypeOf]]` trap.
pub fn proxy_get_prototype_of(cx: &mut Context, obj: &JsObject) -> VmResult<Value> {
    let (target, handler) = parts(obj, "getPrototypeOf")?;
    let Value::Object(t) = target.clone() else {
        return Err(VmError::type_error("proxy target is not an object"));
    };
    let Some(trap_fn) = trap(cx, &handler, "getPrototypeOf")? else {
        return t.get_prototype_of(cx);
    };
    let result = interpreter::call_value(cx, &trap_fn, &handler, &[target])?;
    if !result.is_object() && !result.is_null() {
        return Err(VmError::type_error(
            "proxy 'getPrototypeOf' trap must return an object or null",
        ));
    }
    Ok(result)
}

/// `[[SetPrototypeOf]]` trap.
pub fn proxy_set_prototype_of(
    cx: &mut Context,
    obj: &JsObject,
    proto: Option<marten_vm_gc::GcRef<JsObject>>,
) -> VmResult<bool> {
    let (target, handler) = parts(obj, "setPrototypeOf")?;
    let Value::Object(t) = target.clone() else {
        return Err(VmError::type_error("proxy target is not an object"));
    };
    let Some(trap_fn) = trap(cx, &handler, "setPrototypeOf")? else {
        return t.set_prototype_of(cx, proto);
    };
    let proto_value = match proto {
        Some(p) => Value::Object(p),
        None => Value::Null,
    };
    let result = interpreter::call_value(cx, &trap_fn, &handler, &[target, proto_value])?;
    Ok(result.is_truthy())
}

/// `[[IsExtensible]]` trap.
pub fn proxy_is_extensible(cx: &mut Context, obj: &JsObject) -> VmResult<bool> {
    let (target, handler) = parts(obj, "isExtensible")?;
    let Value::Object(t) = target.clone() else {
        return Err(VmError::type_error("proxy target is not an object"));
    };
    let Some(trap_fn) = trap(cx, &handler, "isExtensible")? else {
        return t.is_extensible(cx);
    };
    let result = interpreter::call_value(cx, &trap_fn, &handler, &[target.clone()])?;
    let answer = result.is_truthy();
    // Invariant: must agree with the target.
    let Value::Object(t) = &target else {
        unreachable!()
    };
    if answer != t.is_extensible(cx)? {
        return Err(VmError::type_error(
            "proxy 'isExtensible' trap disagrees with the target",
        ));
    }
    Ok(answer)
}

/// `[[PreventExtensions]]` trap.
pub fn proxy_prevent_extensions(cx: &mut Context, obj: &JsObject) -> VmResult<bool> {
    let (target, handler) = parts(obj, "preventExtensions")?;
    let Value::Object(t) = target.clone() else {
        return Err(VmError::type_error("proxy target is not an object"));
    };
    let Some(trap_fn) = trap(cx, &handler, "preventExtensions")? else {
        return t.prevent_extensions(cx);
    };
    let result = interpreter::call_value(cx, &trap_fn, &handler, &[target])?;
    Ok(result.is_truthy())
}

/// `[[Call]]` trap — used by the interpreter's call path.
pub fn proxy_call(
    cx: &mut Context,
    obj: &JsObject,
    this: &Value,
    args: &[Value],
) -> VmResult<Value> {
    let (target, handler) = parts(obj, "apply")?;
    let Some(trap_fn) = trap(cx, &handler, "apply")? else {
        return interpreter::call_value(cx, &target, this, args);
    };
    let args_array = Value::Object(crate::array::new_array(cx, args.to_vec()));
    interpreter::call_value(cx, &trap_fn, &handler, &[target, this.clone(), args_array])
}

/// `[[Construct]]` trap — used by the interpreter's construct path.
pub fn proxy_construct(
    cx: &mut Context,
    obj: &JsObject,
    args: &[Value],
    new_target: &Value,
) -> VmResult<Value> {
    let (target, handler) = parts(obj, "construct")?;
    let Some(trap_fn) = trap(cx, &handler, "construct")? else {
        return interpreter::construct_value(cx, &target, args, new_target);
    };
    let args_array = Value::Object(crate::array::new_array(cx, args.to_vec()));
    let result = interpreter::call_value(
        cx,
        &trap_fn,
        &handler,
        &[target, args_array, new_target.clone()],
    )?;
    if !result.is_object() {
        return Err(VmError::type_error("proxy 'construct' trap must return an object"));
    }
    Ok(result)
}
