//! `Promise` constructor, statics, and prototype

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::atom::atoms;
use crate::context::Context;
use crate::error::{VmError, VmResult};
use crate::function::{self, NativeFn};
use crate::interpreter;
use crate::intrinsics::{self, method};
use crate::object::{JsObject, ObjectKind};
use crate::promise::{self, new_capability};
use crate::property::{Property, PropertyKey};
use crate::value::Value;

/// Install `Promise`.
pub fn install(cx: &mut Context) {
    let proto = cx.intrinsics().promise_prototype.clone();
    method(cx, &proto, "then", 2, promise_then);
    method(cx, &proto, "catch", 1, promise_catch);
    method(cx, &proto, "finally", 1, promise_finally);
    let tag = cx.well_known().to_string_tag.clone();
    proto.insert_property(
        PropertyKey::Symbol(tag),
        Property::data_with(Value::string("Promise"), false, false, true),
    );

    let ctor = intrinsics::install_constructor(cx, "Promise", 1, &proto, true, promise_ctor);
    method(cx, &ctor, "resolve", 1, promise_static_resolve);
    method(cx, &ctor, "reject", 1, promise_static_reject);
    method(cx, &ctor, "all", 1, promise_all);
    method(cx, &ctor, "allSettled", 1, promise_all_settled);
    method(cx, &ctor, "any", 1, promise_any);
    method(cx, &ctor, "race", 1, promise_race);
    method(cx, &ctor, "withResolvers", 0, promise_with_resolvers);
}

fn promise_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let executor = args.first().cloned().unwrap_or(Value::Undefined);
    if !executor.is_callable() {
        return Err(VmError::type_error("Promise resolver is not a function"));
    }
    let p = promise::new_promise(cx);
    let (resolve, reject) = promise::create_resolving_functions(cx, &p);
    if let Err(e) = interpreter::call_value(cx, &executor, &Value::Undefined, &[resolve, reject]) {
        let reason = cx.make_error_value(&e);
        promise::reject_promise_with(cx, &p, reason);
    }
    Ok(Value::Object(p))
}

fn this_promise<'a>(this: &'a Value, op: &str) -> VmResult<&'a marten_vm_gc::GcRef<JsObject>> {
    match this {
        Value::Object(obj) if matches!(obj.kind(), ObjectKind::Promise(_)) => Ok(obj),
        _ => Err(VmError::type_error(format!(
            "Promise.prototype.{op} called on incompatible receiver"
        ))),
    }
}

fn promise_then(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let p = this_promise(this, "then")?.clone();
    let on_fulfilled = args.first().cloned().filter(Value::is_callable);
    let on_rejected = args.get(1).cloned().filter(Value::is_callable);
    let derived = promise::perform_then(cx, &p, on_fulfilled, on_rejected);
    Ok(Value::Object(derived))
}

fn promise_catch(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let p = this_promise(this, "catch")?.clone();
    let on_rejected = args.first().cloned().filter(Value::is_callable);
    let derived = promise::perform_then(cx, &p, None, on_rejected);
    Ok(Value::Object(derived))
}

fn promise_finally(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let p = this_promise(this, "finally")?.clone();
    let on_finally = args.first().cloned().unwrap_or(Value::Undefined);

    let (on_fulfilled, on_rejected) = if on_finally.is_callable() {
        let pass = on_finally.clone();
        let fulfilled: NativeFn = Arc::new(move |cx, _this, args| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            interpreter::call_value(cx, &pass, &Value::Undefined, &[])?;
            Ok(value)
        });
        let rethrow = on_finally.clone();
        let rejected: NativeFn = Arc::new(move |cx, _this, args| {
            let reason = args.first().cloned().unwrap_or(Value::Undefined);
            interpreter::call_value(cx, &rethrow, &Value::Undefined, &[])?;
            Err(VmError::exception(reason, cx.capture_stack()))
        });
        (
            Some(Value::Object(function::native_function(cx, "", 1, fulfilled))),
            Some(Value::Object(function::native_function(cx, "", 1, rejected))),
        )
    } else {
        (None, None)
    };
    let derived = promise::perform_then(cx, &p, on_fulfilled, on_rejected);
    Ok(Value::Object(derived))
}

fn promise_static_resolve(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    Ok(Value::Object(promise::promise_resolve(cx, value)?))
}

fn promise_static_reject(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let reason = args.first().cloned().unwrap_or(Value::Undefined);
    let p = promise::new_promise(cx);
    promise::reject_promise_with(cx, &p, reason);
    Ok(Value::Object(p))
}

/// `Promise.withResolvers` — `{promise, resolve, reject}`, single-shot.
fn promise_with_resolvers(cx: &mut Context, _this: &Value, _args: &[Value]) -> VmResult<Value> {
    let capability = new_capability(cx);
    let result = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    result.insert_property(
        PropertyKey::Atom(atoms::PROMISE),
        Property::data(Value::Object(capability.promise)),
    );
    result.insert_property(
        PropertyKey::Atom(atoms::RESOLVE),
        Property::data(capability.resolve),
    );
    result.insert_property(
        PropertyKey::Atom(atoms::REJECT),
        Property::data(capability.reject),
    );
    Ok(Value::Object(result))
}

fn promise_all(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let iterable = args.first().cloned().unwrap_or(Value::Undefined);
    let items = interpreter::iterate_to_vec(cx, &iterable)?;
    let capability = new_capability(cx);

    let total = items.len();
    if total == 0 {
        let empty = Value::Object(crate::array::new_array(cx, Vec::new()));
        interpreter::call_value(cx, &capability.resolve, &Value::Undefined, &[empty])?;
        return Ok(Value::Object(capability.promise));
    }

    let results = Arc::new(parking_lot::Mutex::new(vec![Value::Undefined; total]));
    let remaining = Arc::new(AtomicUsize::new(total));

    for (i, item) in items.into_iter().enumerate() {
        let inner = promise::promise_resolve(cx, item)?;
        let results = results.clone();
        let remaining = remaining.clone();
        let resolve = capability.resolve.clone();
        let reject = capability.reject.clone();
        promise::attach_native_reaction(
            cx,
            &inner,
            Box::new(move |cx, settled| match settled {
                Ok(value) => {
                    results.lock()[i] = value;
                    if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                        let values = std::mem::take(&mut *results.lock());
                        let array = Value::Object(crate::array::new_array(cx, values));
                        let _ = interpreter::call_value(cx, &resolve, &Value::Undefined, &[array]);
                    }
                }
                Err(reason) => {
                    let _ = interpreter::call_value(cx, &reject, &Value::Undefined, &[reason]);
                }
            }),
        );
    }
    Ok(Value::Object(capability.promise))
}

fn promise_all_settled(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let iterable = args.first().cloned().unwrap_or(Value::Undefined);
    let items = interpreter::iterate_to_vec(cx, &iterable)?;
    let capability = new_capability(cx);

    let total = items.len();
    if total == 0 {
        let empty = Value::Object(crate::array::new_array(cx, Vec::new()));
        interpreter::call_value(cx, &capability.resolve, &Value::Undefined, &[empty])?;
        return Ok(Value::Object(capability.promise));
    }

    let results = Arc::new(parking_lot::Mutex::new(vec![Value::Undefined; total]));
    let remaining = Arc::new(AtomicUsize::new(total));

    for (i, item) in items.into_iter().enumerate() {
        let inner = promise::promise_resolve(cx, item)?;
        let results = results.clone();
        let remaining = remaining.clone();
        let resolve = capability.resolve.clone();
        promise::attach_native_reaction(
            cx,
            &inner,
            Box::new(move |cx, settled| {
                let entry = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
                match settled {
                    Ok(value) => {
                        entry.insert_property(
                            PropertyKey::Atom(atoms::STATUS),
                            Property::data(Value::string("fulfilled")),
                        );
                        entry.insert_property(PropertyKey::Atom(atoms::VALUE), Property::data(value));
                    }
                    Err(reason) => {
                        entry.insert_property(
                            PropertyKey::Atom(atoms::STATUS),
                            Property::data(Value::string("rejected")),
                        );
                        entry
                            .insert_property(PropertyKey::Atom(atoms::REASON), Property::data(reason));
                    }
                }
                results.lock()[i] = Value::Object(entry);
                if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    let values = std::mem::take(&mut *results.lock());
                    let array = Value::Object(crate::array::new_array(cx, values));
                    let _ = interpreter::call_value(cx, &resolve, &Value::Undefined, &[array]);
                }
            }),
        );
    }
    Ok(Value::Object(capability.promise))
}

fn promise_any(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let iterable = args.first().cloned().unwrap_or(Value::Undefined);
    let items = interpreter::iterate_to_vec(cx, &iterable)?;
    let capability = new_capability(cx);

    let total = items.len();
    if total == 0 {
        let error = cx.create_error(
            crate::error::JsErrorKind::AggregateError,
            "All promises were rejected",
        );
        interpreter::call_value(cx, &capability.reject, &Value::Undefined, &[error])?;
        return Ok(Value::Object(capability.promise));
    }

    let errors = Arc::new(parking_lot::Mutex::new(vec![Value::Undefined; total]));
    let remaining = Arc::new(AtomicUsize::new(total));

    for (i, item) in items.into_iter().enumerate() {
        let inner = promise::promise_resolve(cx, item)?;
        let errors = errors.clone();
        let remaining = remaining.clone();
        let resolve = capability.resolve.clone();
        let reject = capability.reject.clone();
        promise::attach_native_reaction(
            cx,
            &inner,
            Box::new(move |cx, settled| match settled {
                Ok(value) => {
                    let _ = interpreter::call_value(cx, &resolve, &Value::Undefined, &[value]);
                }
                Err(reason) => {
                    errors.lock()[i] = reason;
                    if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                        let error = cx.create_error(
                            crate::error::JsErrorKind::AggregateError,
                            "All promises were rejected",
                        );
                        if let Value::Object(error_obj) = &error {
                            let list = std::mem::take(&mut *errors.lock());
                            let array = crate::array::new_array(cx, list);
                            error_obj.insert_property(
                                PropertyKey::Atom(atoms::ERRORS),
                                Property::method(Value::Object(array)),
                            );
                        }
                        let _ = interpreter::call_value(cx, &reject, &Value::Undefined, &[error]);
                    }
                }
            }),
        );
    }
    Ok(Value::Object(capability.promise))
}

fn promise_race(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let iterable = args.first().cloned().unwrap_or(Value::Undefined);
    let items = interpreter::iterate_to_vec(cx, &iterable)?;
    let capability = new_capability(cx);

    for item in items {
        let inner = promise::promise_resolve(cx, item)?;
        let resolve = capability.resolve.clone();
        let reject = capability.reject.clone();
        promise::attach_native_reaction(
            cx,
            &inner,
            Box::new(move |cx, settled| {
                let (target, value) = match settled {
                    Ok(v) => (resolve, v),
                    Err(v) => (reject, v),
                };
                let _ = interpreter::call_value(cx, &target, &Value::Undefined, &[value]);
            }),
        );
    }
    Ok(Value::Object(capability.promise))
}
