//! `DisposableStack` and `AsyncDisposableStack`
//!
//! Explicit resource management: a stack of disposers run in reverse order.
//! Disposal failures chain into `SuppressedError`. The async variant settles
//! a promise instead of throwing.

use std::cell::RefCell;
use std::sync::Arc;

use crate::atom::atoms;
use crate::context::Context;
use crate::error::{JsErrorKind, VmError, VmResult};
use crate::function::{self, NativeFn};
use crate::interpreter;
use crate::intrinsics::{self, method};
use crate::object::{DisposableState, JsObject, ObjectKind};
use crate::property::{Property, PropertyKey};
use crate::value::Value;

/// Install both stack types.
pub fn install(cx: &mut Context) {
    let sync_proto = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    method(cx, &sync_proto, "use", 1, stack_use);
    method(cx, &sync_proto, "adopt", 2, stack_adopt);
    method(cx, &sync_proto, "defer", 1, stack_defer);
    method(cx, &sync_proto, "dispose", 0, stack_dispose);
    let dispose_sym = cx.well_known().dispose.clone();
    intrinsics::symbol_method(cx, &sync_proto, dispose_sym, "[Symbol.dispose]", 0, stack_dispose);
    intrinsics::install_constructor(cx, "DisposableStack", 0, &sync_proto, true, |cx, t, a| {
        stack_ctor(cx, t, a, false)
    });

    let async_proto = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    method(cx, &async_proto, "use", 1, stack_use);
    method(cx, &async_proto, "adopt", 2, stack_adopt);
    method(cx, &async_proto, "defer", 1, stack_defer);
    method(cx, &async_proto, "disposeAsync", 0, stack_dispose_async);
    let async_dispose_sym = cx.well_known().async_dispose.clone();
    intrinsics::symbol_method(
        cx,
        &async_proto,
        async_dispose_sym,
        "[Symbol.asyncDispose]",
        0,
        stack_dispose_async,
    );
    intrinsics::install_constructor(
        cx,
        "AsyncDisposableStack",
        0,
        &async_proto,
        true,
        |cx, t, a| stack_ctor(cx, t, a, true),
    );
}

fn stack_ctor(cx: &mut Context, _this: &Value, _args: &[Value], is_async: bool) -> VmResult<Value> {
    let name = if is_async {
        "AsyncDisposableStack"
    } else {
        "DisposableStack"
    };
    let proto = constructor_prototype(cx, name)?;
    let state = DisposableState {
        is_async,
        ..Default::default()
    };
    Ok(Value::Object(JsObject::new(
        ObjectKind::DisposableStack(RefCell::new(state)),
        Some(proto),
    )))
}

fn constructor_prototype(
    cx: &mut Context,
    name: &str,
) -> VmResult<marten_vm_gc::GcRef<JsObject>> {
    let global = cx.global().clone();
    let key = PropertyKey::Atom(cx.atom(name));
    let ctor = global.get(cx, &key, &Value::Object(global.clone()))?;
    let Value::Object(ctor_obj) = ctor else {
        return Err(VmError::internal("disposable stack constructor missing"));
    };
    match ctor_obj.get(cx, &PropertyKey::Atom(atoms::PROTOTYPE), &Value::Object(ctor_obj.clone()))? {
        Value::Object(p) => Ok(p),
        _ => Err(VmError::internal("disposable stack prototype missing")),
    }
}

fn slots<'a>(this: &'a Value, op: &str) -> VmResult<&'a RefCell<DisposableState>> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::DisposableStack(state) => Ok(state),
            _ => Err(VmError::type_error(format!(
                "{op} called on an incompatible receiver"
            ))),
        },
        _ => Err(VmError::type_error(format!(
            "{op} called on an incompatible receiver"
        ))),
    }
}

fn push_disposer(this: &Value, op: &str, disposer: Value) -> VmResult<()> {
    let state = slots(this, op)?;
    let mut state = state.borrow_mut();
    if state.disposed {
        return Err(VmError::reference_error("stack has already been disposed"));
    }
    state.disposers.push(disposer);
    Ok(())
}

/// `use(value)` — register `value[@@dispose]` and pass the value through.
fn stack_use(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    slots(this, "use")?;
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    if value.is_nullish() {
        return Ok(value);
    }
    let Value::Object(obj) = &value else {
        return Err(VmError::type_error("value is not disposable"));
    };
    let dispose_key = PropertyKey::Symbol(cx.well_known().dispose.clone());
    let async_key = PropertyKey::Symbol(cx.well_known().async_dispose.clone());
    let mut dispose_fn = obj.get(cx, &dispose_key, &value)?;
    if !dispose_fn.is_callable() {
        dispose_fn = obj.get(cx, &async_key, &value)?;
    }
    if !dispose_fn.is_callable() {
        return Err(VmError::type_error("value is not disposable"));
    }
    let target = value.clone();
    let bound: NativeFn = Arc::new(move |cx, _this, _args| {
        interpreter::call_value(cx, &dispose_fn, &target, &[])
    });
    let disposer = function::native_function(cx, "", 0, bound);
    push_disposer(this, "use", Value::Object(disposer))?;
    Ok(value)
}

/// `adopt(value, onDispose)` — register `onDispose(value)`.
fn stack_adopt(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    slots(this, "adopt")?;
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    let on_dispose = args.get(1).cloned().unwrap_or(Value::Undefined);
    if !on_dispose.is_callable() {
        return Err(VmError::type_error("onDispose is not a function"));
    }
    let passed = value.clone();
    let bound: NativeFn = Arc::new(move |cx, _this, _args| {
        interpreter::call_value(cx, &on_dispose, &Value::Undefined, &[passed.clone()])
    });
    let disposer = function::native_function(cx, "", 0, bound);
    push_disposer(this, "adopt", Value::Object(disposer))?;
    Ok(value)
}

/// `defer(onDispose)`.
fn stack_defer(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let on_dispose = args.first().cloned().unwrap_or(Value::Undefined);
    if !on_dispose.is_callable() {
        return Err(VmError::type_error("onDispose is not a function"));
    }
    push_disposer(this, "defer", on_dispose)?;
    Ok(Value::Undefined)
}

/// Run disposers in reverse registration order; later failures suppress
/// earlier ones via `SuppressedError`.
fn stack_dispose(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let disposers = {
        let state = slots(this, "dispose")?;
        let mut state = state.borrow_mut();
        if state.disposed {
            return Ok(Value::Undefined);
        }
        state.disposed = true;
        std::mem::take(&mut state.disposers)
    };

    let mut pending_error: Option<Value> = None;
    for disposer in disposers.into_iter().rev() {
        match interpreter::call_value(cx, &disposer, &Value::Undefined, &[]) {
            Ok(_) => {}
            Err(e) => {
                let error = cx.make_error_value(&e);
                pending_error = Some(match pending_error.take() {
                    None => error,
                    Some(suppressed) => {
                        let combined = cx.create_error(
                            JsErrorKind::SuppressedError,
                            "An error was suppressed during disposal",
                        );
                        if let Value::Object(obj) = &combined {
                            obj.insert_property(
                                PropertyKey::Atom(atoms::ERROR_SLOT),
                                Property::method(error),
                            );
                            obj.insert_property(
                                PropertyKey::Atom(atoms::SUPPRESSED),
                                Property::method(suppressed),
                            );
                        }
                        combined
                    }
                });
            }
        }
    }
    match pending_error {
        Some(error) => Err(VmError::exception(error, cx.capture_stack())),
        None => Ok(Value::Undefined),
    }
}

/// Async disposal settles a promise rather than throwing.
fn stack_dispose_async(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    match stack_dispose(cx, this, &[]) {
        Ok(_) => Ok(Value::Object(crate::promise::promise_resolve(
            cx,
            Value::Undefined,
        )?)),
        Err(e) => {
            let reason = cx.make_error_value(&e);
            let p = crate::promise::new_promise(cx);
            crate::promise::reject_promise_with(cx, &p, reason);
            Ok(Value::Object(p))
        }
    }
}
