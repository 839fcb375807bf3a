//! `Map` and `Set`

use marten_vm_gc::GcRef;
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::atom::atoms;
use crate::context::Context;
use crate::error::{VmError, VmResult};
use crate::function::{self, NativeFn};
use crate::interpreter;
use crate::intrinsics::{self, getter, method};
use crate::map_data::{OrderedMap, OrderedSet};
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyKey};
use crate::value::Value;

/// Install `Map` and `Set`.
pub fn install(cx: &mut Context) {
    let map_proto = cx.intrinsics().map_prototype.clone();
    method(cx, &map_proto, "get", 1, map_get);
    method(cx, &map_proto, "set", 2, map_set);
    method(cx, &map_proto, "has", 1, map_has);
    method(cx, &map_proto, "delete", 1, map_delete);
    method(cx, &map_proto, "clear", 0, map_clear);
    method(cx, &map_proto, "forEach", 1, map_for_each);
    method(cx, &map_proto, "keys", 0, map_keys);
    method(cx, &map_proto, "values", 0, map_values);
    method(cx, &map_proto, "entries", 0, map_entries);
    getter(cx, &map_proto, "size", map_size);
    install_iterator_alias(cx, &map_proto, map_entries);
    intrinsics::install_constructor(cx, "Map", 0, &map_proto, true, map_ctor);

    let set_proto = cx.intrinsics().set_prototype.clone();
    method(cx, &set_proto, "add", 1, set_add);
    method(cx, &set_proto, "has", 1, set_has);
    method(cx, &set_proto, "delete", 1, set_delete);
    method(cx, &set_proto, "clear", 0, set_clear);
    method(cx, &set_proto, "forEach", 1, set_for_each);
    method(cx, &set_proto, "values", 0, set_values);
    method(cx, &set_proto, "keys", 0, set_values);
    method(cx, &set_proto, "entries", 0, set_entries);
    getter(cx, &set_proto, "size", set_size);
    install_iterator_alias(cx, &set_proto, set_values);
    intrinsics::install_constructor(cx, "Set", 0, &set_proto, true, set_ctor);
}

fn install_iterator_alias(
    cx: &mut Context,
    proto: &GcRef<JsObject>,
    f: intrinsics::RawNative,
) {
    let sym = cx.well_known().iterator.clone();
    let func = function::native_function(cx, "[Symbol.iterator]", 0, Arc::new(f) as NativeFn);
    proto.insert_property(
        PropertyKey::Symbol(sym),
        Property::method(Value::Object(func)),
    );
}

fn map_slots<'a>(this: &'a Value, op: &str) -> VmResult<&'a RefCell<OrderedMap>> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::Map(m) => Ok(m),
            _ => Err(VmError::type_error(format!(
                "Method Map.prototype.{op} called on incompatible receiver"
            ))),
        },
        _ => Err(VmError::type_error(format!(
            "Method Map.prototype.{op} called on incompatible receiver"
        ))),
    }
}

fn set_slots<'a>(this: &'a Value, op: &str) -> VmResult<&'a RefCell<OrderedSet>> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::Set(s) => Ok(s),
            _ => Err(VmError::type_error(format!(
                "Method Set.prototype.{op} called on incompatible receiver"
            ))),
        },
        _ => Err(VmError::type_error(format!(
            "Method Set.prototype.{op} called on incompatible receiver"
        ))),
    }
}

fn map_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let map = JsObject::new(
        ObjectKind::Map(RefCell::new(OrderedMap::new())),
        Some(cx.intrinsics().map_prototype.clone()),
    );
    if let Some(iterable) = args.first() {
        if !iterable.is_nullish() {
            let entries = interpreter::iterate_to_vec(cx, iterable)?;
            for entry in entries {
                let Value::Object(pair) = &entry else {
                    return Err(VmError::type_error(
                        "Iterator value is not an entry object",
                    ));
                };
                let k = pair.get(cx, &PropertyKey::Index(0), &entry)?;
                let v = pair.get(cx, &PropertyKey::Index(1), &entry)?;
                let ObjectKind::Map(m) = map.kind() else {
                    unreachable!()
                };
                m.borrow_mut().set(k, v);
            }
        }
    }
    Ok(Value::Object(map))
}

fn map_get(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let key = args.first().cloned().unwrap_or(Value::Undefined);
    let slots = map_slots(this, "get")?;
    Ok(slots.borrow().get(&key).cloned().unwrap_or(Value::Undefined))
}

fn map_set(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let key = args.first().cloned().unwrap_or(Value::Undefined);
    let value = args.get(1).cloned().unwrap_or(Value::Undefined);
    map_slots(this, "set")?.borrow_mut().set(key, value);
    Ok(this.clone())
}

fn map_has(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let key = args.first().cloned().unwrap_or(Value::Undefined);
    Ok(Value::Boolean(map_slots(this, "has")?.borrow().has(&key)))
}

fn map_delete(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let key = args.first().cloned().unwrap_or(Value::Undefined);
    Ok(Value::Boolean(
        map_slots(this, "delete")?.borrow_mut().delete(&key),
    ))
}

fn map_clear(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    map_slots(this, "clear")?.borrow_mut().clear();
    Ok(Value::Undefined)
}

fn map_size(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(map_slots(this, "size")?.borrow().len() as f64))
}

fn map_for_each(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let f = args.first().cloned().unwrap_or(Value::Undefined);
    if !f.is_callable() {
        return Err(VmError::type_error("callback is not a function"));
    }
    let this_arg = args.get(1).cloned().unwrap_or(Value::Undefined);
    // Snapshot under the borrow, call outside it.
    let mut index = 0usize;
    loop {
        let entry = map_slots(this, "forEach")?.borrow().entry_at(index);
        let Some((k, v)) = entry else {
            break;
        };
        interpreter::call_value(cx, &f, &this_arg, &[v, k, this.clone()])?;
        index += 1;
    }
    Ok(Value::Undefined)
}

#[derive(Clone, Copy)]
enum MapIterKind {
    Keys,
    Values,
    Entries,
}

fn make_map_iterator(cx: &mut Context, this: &Value, kind: MapIterKind) -> VmResult<Value> {
    map_slots(this, "entries")?;
    let target = this.clone();
    let index = Arc::new(AtomicUsize::new(0));
    let next: NativeFn = Arc::new(move |cx, _this, _args| {
        let i = index.fetch_add(1, Ordering::Relaxed);
        let entry = map_slots(&target, "next")?.borrow().entry_at(i);
        match entry {
            None => Ok(Value::Object(crate::generator::create_iter_result(
                cx,
                Value::Undefined,
                true,
            ))),
            Some((k, v)) => {
                let value = match kind {
                    MapIterKind::Keys => k,
                    MapIterKind::Values => v,
                    MapIterKind::Entries => {
                        Value::Object(crate::array::new_array(cx, vec![k, v]))
                    }
                };
                Ok(Value::Object(crate::generator::create_iter_result(
                    cx, value, false,
                )))
            }
        }
    });
    let iterator = JsObject::ordinary(Some(cx.intrinsics().map_iterator_prototype.clone()));
    let next_fn = function::native_function(cx, "next", 0, next);
    iterator.insert_property(
        PropertyKey::Atom(atoms::NEXT),
        Property::method(Value::Object(next_fn)),
    );
    Ok(Value::Object(iterator))
}

fn map_keys(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    make_map_iterator(cx, this, MapIterKind::Keys)
}

fn map_values(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    make_map_iterator(cx, this, MapIterKind::Values)
}

fn map_entries(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    make_map_iterator(cx, this, MapIterKind::Entries)
}

fn set_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let set = JsObject::new(
        ObjectKind::Set(RefCell::new(OrderedSet::new())),
        Some(cx.intrinsics().set_prototype.clone()),
    );
    if let Some(iterable) = args.first() {
        if !iterable.is_nullish() {
            let values = interpreter::iterate_to_vec(cx, iterable)?;
            let ObjectKind::Set(s) = set.kind() else {
                unreachable!()
            };
            let mut slots = s.borrow_mut();
            for v in values {
                slots.add(v);
            }
        }
    }
    Ok(Value::Object(set))
}

fn set_add(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    set_slots(this, "add")?.borrow_mut().add(value);
    Ok(this.clone())
}

fn set_has(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    Ok(Value::Boolean(set_slots(this, "has")?.borrow().has(&value)))
}

fn set_delete(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    Ok(Value::Boolean(
        set_slots(this, "delete")?.borrow_mut().delete(&value),
    ))
}

fn set_clear(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    set_slots(this, "clear")?.borrow_mut().clear();
    Ok(Value::Undefined)
}

fn set_size(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(set_slots(this, "size")?.borrow().len() as f64))
}

fn set_for_each(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let f = args.first().cloned().unwrap_or(Value::Undefined);
    if !f.is_callable() {
        return Err(VmError::type_error("callback is not a function"));
    }
    let this_arg = args.get(1).cloned().unwrap_or(Value::Undefined);
    let mut index = 0usize;
    loop {
        let value = set_slots(this, "forEach")?.borrow().value_at(index);
        let Some(v) = value else {
            break;
        };
        interpreter::call_value(cx, &f, &this_arg, &[v.clone(), v, this.clone()])?;
        index += 1;
    }
    Ok(Value::Undefined)
}

#[derive(Clone, Copy)]
enum SetIterKind {
    Values,
    Entries,
}

fn make_set_iterator(cx: &mut Context, this: &Value, kind: SetIterKind) -> VmResult<Value> {
    set_slots(this, "values")?;
    let target = this.clone();
    let index = Arc::new(AtomicUsize::new(0));
    let next: NativeFn = Arc::new(move |cx, _this, _args| {
        let i = index.fetch_add(1, Ordering::Relaxed);
        let value = set_slots(&target, "next")?.borrow().value_at(i);
        match value {
            None => Ok(Value::Object(crate::generator::create_iter_result(
                cx,
                Value::Undefined,
                true,
            ))),
            Some(v) => {
                let value = match kind {
                    SetIterKind::Values => v,
                    SetIterKind::Entries => {
                        Value::Object(crate::array::new_array(cx, vec![v.clone(), v]))
                    }
                };
                Ok(Value::Object(crate::generator::create_iter_result(
                    cx, value, false,
                )))
            }
        }
    });
    let iterator = JsObject::ordinary(Some(cx.intrinsics().set_iterator_prototype.clone()));
    let next_fn = function::native_function(cx, "next", 0, next);
    iterator.insert_property(
        PropertyKey::Atom(atoms::NEXT),
        Property::method(Value::Object(next_fn)),
    );
    Ok(Value::Object(iterator))
}

fn set_values(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    make_set_iterator(cx, this, SetIterKind::Values)
}

fn set_entries(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    make_set_iterator(cx, this, SetIterKind::Entries)
}
