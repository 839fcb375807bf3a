//! Weak collections: `WeakMap`, `WeakSet`, `WeakRef`, `FinalizationRegistry`
//!
//! Targets must be objects; entries never keep their target alive. Registry
//! registrations additionally hook the runtime's finalization monitor so
//! dead targets get their cleanup callbacks queued onto this context.

use marten_vm_gc::{EphemeronTable, GcRef, WeakSlot};
use std::cell::RefCell;

use crate::context::Context;
use crate::error::{VmError, VmResult};
use crate::intrinsics::{self, method};
use crate::object::{JsObject, ObjectKind};
use crate::value::Value;
use crate::weak::RegistryState;

/// Install the weak collection constructors.
pub fn install(cx: &mut Context) {
    let weak_map_proto = cx.intrinsics().weak_map_prototype.clone();
    method(cx, &weak_map_proto, "get", 1, weak_map_get);
    method(cx, &weak_map_proto, "set", 2, weak_map_set);
    method(cx, &weak_map_proto, "has", 1, weak_map_has);
    method(cx, &weak_map_proto, "delete", 1, weak_map_delete);
    intrinsics::install_constructor(cx, "WeakMap", 0, &weak_map_proto, true, weak_map_ctor);

    let weak_set_proto = cx.intrinsics().weak_set_prototype.clone();
    method(cx, &weak_set_proto, "add", 1, weak_set_add);
    method(cx, &weak_set_proto, "has", 1, weak_set_has);
    method(cx, &weak_set_proto, "delete", 1, weak_set_delete);
    intrinsics::install_constructor(cx, "WeakSet", 0, &weak_set_proto, true, weak_set_ctor);

    let weak_ref_proto = cx.intrinsics().weak_ref_prototype.clone();
    method(cx, &weak_ref_proto, "deref", 0, weak_ref_deref);
    intrinsics::install_constructor(cx, "WeakRef", 1, &weak_ref_proto, true, weak_ref_ctor);

    let registry_proto = cx.intrinsics().finalization_registry_prototype.clone();
    method(cx, &registry_proto, "register", 2, registry_register);
    method(cx, &registry_proto, "unregister", 1, registry_unregister);
    intrinsics::install_constructor(
        cx,
        "FinalizationRegistry",
        1,
        &registry_proto,
        true,
        registry_ctor,
    );
}

fn target_object(value: Option<&Value>, what: &str) -> VmResult<GcRef<JsObject>> {
    match value {
        Some(Value::Object(o)) => Ok(o.clone()),
        _ => Err(VmError::type_error(format!(
            "Invalid value used as {what}"
        ))),
    }
}

// ---- WeakMap ----

fn weak_map_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let map = JsObject::new(
        ObjectKind::WeakMap(RefCell::new(EphemeronTable::new())),
        Some(cx.intrinsics().weak_map_prototype.clone()),
    );
    if let Some(iterable) = args.first() {
        if !iterable.is_nullish() {
            let entries = crate::interpreter::iterate_to_vec(cx, iterable)?;
            for entry in entries {
                let Value::Object(pair) = &entry else {
                    return Err(VmError::type_error("Iterator value is not an entry object"));
                };
                let k = pair.get(cx, &crate::property::PropertyKey::Index(0), &entry)?;
                let v = pair.get(cx, &crate::property::PropertyKey::Index(1), &entry)?;
                let key = target_object(Some(&k), "weak map key")?;
                let ObjectKind::WeakMap(table) = map.kind() else {
                    unreachable!()
                };
                table.borrow_mut().set(&key, v);
            }
        }
    }
    Ok(Value::Object(map))
}

fn weak_map_slots<'a>(
    this: &'a Value,
) -> VmResult<&'a RefCell<EphemeronTable<JsObject, Value>>> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::WeakMap(t) => Ok(t),
            _ => Err(VmError::type_error(
                "WeakMap method called on incompatible receiver",
            )),
        },
        _ => Err(VmError::type_error(
            "WeakMap method called on incompatible receiver",
        )),
    }
}

fn weak_map_get(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let slots = weak_map_slots(this)?;
    match args.first() {
        Some(Value::Object(key)) => Ok(slots
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(Value::Undefined)),
        _ => Ok(Value::Undefined),
    }
}

fn weak_map_set(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let key = target_object(args.first(), "weak map key")?;
    let value = args.get(1).cloned().unwrap_or(Value::Undefined);
    weak_map_slots(this)?.borrow_mut().set(&key, value);
    Ok(this.clone())
}

fn weak_map_has(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    match args.first() {
        Some(Value::Object(key)) => Ok(Value::Boolean(weak_map_slots(this)?.borrow().has(key))),
        _ => Ok(Value::Boolean(false)),
    }
}

fn weak_map_delete(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    match args.first() {
        Some(Value::Object(key)) => Ok(Value::Boolean(
            weak_map_slots(this)?.borrow_mut().delete(key),
        )),
        _ => Ok(Value::Boolean(false)),
    }
}

// ---- WeakSet ----

fn weak_set_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let set = JsObject::new(
        ObjectKind::WeakSet(RefCell::new(EphemeronTable::new())),
        Some(cx.intrinsics().weak_set_prototype.clone()),
    );
    if let Some(iterable) = args.first() {
        if !iterable.is_nullish() {
            let values = crate::interpreter::iterate_to_vec(cx, iterable)?;
            for v in values {
                let target = target_object(Some(&v), "weak set value")?;
                let ObjectKind::WeakSet(table) = set.kind() else {
                    unreachable!()
                };
                table.borrow_mut().set(&target, ());
            }
        }
    }
    Ok(Value::Object(set))
}

fn weak_set_slots<'a>(this: &'a Value) -> VmResult<&'a RefCell<EphemeronTable<JsObject, ()>>> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::WeakSet(t) => Ok(t),
            _ => Err(VmError::type_error(
                "WeakSet method called on incompatible receiver",
            )),
        },
        _ => Err(VmError::type_error(
            "WeakSet method called on incompatible receiver",
        )),
    }
}

fn weak_set_add(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = target_object(args.first(), "weak set value")?;
    weak_set_slots(this)?.borrow_mut().set(&target, ());
    Ok(this.clone())
}

fn weak_set_has(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    match args.first() {
        Some(Value::Object(target)) => {
            Ok(Value::Boolean(weak_set_slots(this)?.borrow().has(target)))
        }
        _ => Ok(Value::Boolean(false)),
    }
}

fn weak_set_delete(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    match args.first() {
        Some(Value::Object(target)) => Ok(Value::Boolean(
            weak_set_slots(this)?.borrow_mut().delete(target),
        )),
        _ => Ok(Value::Boolean(false)),
    }
}

// ---- WeakRef ----

fn weak_ref_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = target_object(args.first(), "WeakRef target")?;
    Ok(Value::Object(JsObject::new(
        ObjectKind::WeakRef(WeakSlot::new(&target)),
        Some(cx.intrinsics().weak_ref_prototype.clone()),
    )))
}

fn weak_ref_deref(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::WeakRef(slot) => Ok(slot
                .deref_target()
                .map(Value::Object)
                .unwrap_or(Value::Undefined)),
            _ => Err(VmError::type_error(
                "WeakRef.prototype.deref called on incompatible receiver",
            )),
        },
        _ => Err(VmError::type_error(
            "WeakRef.prototype.deref called on incompatible receiver",
        )),
    }
}

// ---- FinalizationRegistry ----

fn registry_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let callback = args.first().cloned().unwrap_or(Value::Undefined);
    if !callback.is_callable() {
        return Err(VmError::type_error("cleanup must be callable"));
    }
    Ok(Value::Object(JsObject::new(
        ObjectKind::FinalizationRegistry(RefCell::new(RegistryState::new(callback))),
        Some(cx.intrinsics().finalization_registry_prototype.clone()),
    )))
}

fn registry_object<'a>(this: &'a Value) -> VmResult<&'a GcRef<JsObject>> {
    match this {
        Value::Object(obj) if matches!(obj.kind(), ObjectKind::FinalizationRegistry(_)) => Ok(obj),
        _ => Err(VmError::type_error(
            "FinalizationRegistry method called on incompatible receiver",
        )),
    }
}

fn registry_register(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let registry = registry_object(this)?.clone();
    let target = target_object(args.first(), "FinalizationRegistry target")?;
    let held = args.get(1).cloned().unwrap_or(Value::Undefined);
    if let Value::Object(held_obj) = &held {
        if GcRef::ptr_eq(held_obj, &target) {
            return Err(VmError::type_error(
                "target and holdings must not be the same",
            ));
        }
    }
    let token = match args.get(2) {
        None | Some(Value::Undefined) => None,
        Some(Value::Object(t)) => Some(t.id()),
        Some(_) => {
            return Err(VmError::type_error("unregisterToken must be an object"));
        }
    };

    {
        let ObjectKind::FinalizationRegistry(state) = registry.kind() else {
            unreachable!()
        };
        state.borrow_mut().data.register(&target, held, token);
    }
    cx.watch_finalization_target(&registry, &target);
    Ok(Value::Undefined)
}

fn registry_unregister(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let registry = registry_object(this)?;
    let token = target_object(args.first(), "unregister token")?;
    let ObjectKind::FinalizationRegistry(state) = registry.kind() else {
        unreachable!()
    };
    let removed = state.borrow_mut().data.unregister(token.id());
    Ok(Value::Boolean(removed))
}
