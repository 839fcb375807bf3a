//! `Array` constructor and prototype

use marten_vm_gc::GcRef;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::array::{self, length_of};
use crate::atom::atoms;
use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::function::{self, NativeFn};
use crate::interpreter;
use crate::intrinsics::{self, method, symbol_method};
use crate::object::{self, JsObject};
use crate::property::{Property, PropertyKey};
use crate::value::Value;

/// Install `Array`.
pub fn install(cx: &mut Context) {
    let proto = cx.intrinsics().array_prototype.clone();
    // The bootstrapped prototype needs its array shape: a `length` slot.
    proto.insert_property(
        PropertyKey::Atom(atoms::LENGTH),
        Property::data_with(Value::number(0.0), true, false, false),
    );

    method(cx, &proto, "push", 1, array_push);
    method(cx, &proto, "pop", 0, array_pop);
    method(cx, &proto, "shift", 0, array_shift);
    method(cx, &proto, "unshift", 1, array_unshift);
    method(cx, &proto, "slice", 2, array_slice);
    method(cx, &proto, "concat", 1, array_concat);
    method(cx, &proto, "join", 1, array_join);
    method(cx, &proto, "indexOf", 1, array_index_of);
    method(cx, &proto, "includes", 1, array_includes);
    method(cx, &proto, "forEach", 1, array_for_each);
    method(cx, &proto, "map", 1, array_map);
    method(cx, &proto, "filter", 1, array_filter);
    method(cx, &proto, "reduce", 1, array_reduce);
    method(cx, &proto, "some", 1, array_some);
    method(cx, &proto, "every", 1, array_every);
    method(cx, &proto, "find", 1, array_find);
    method(cx, &proto, "findIndex", 1, array_find_index);
    method(cx, &proto, "reverse", 0, array_reverse);
    method(cx, &proto, "fill", 1, array_fill);
    method(cx, &proto, "flat", 0, array_flat);
    method(cx, &proto, "keys", 0, array_keys);
    method(cx, &proto, "entries", 0, array_entries);
    method(cx, &proto, "toString", 0, array_to_string);

    // `values` and `@@iterator` are the same shared function object.
    let values_fn = cx.intrinsics().array_values_fn.clone();
    let values_key = PropertyKey::Atom(cx.atom("values"));
    proto.insert_property(values_key, Property::method(Value::Object(values_fn.clone())));
    let iterator_sym = cx.well_known().iterator.clone();
    proto.insert_property(
        PropertyKey::Symbol(iterator_sym),
        Property::method(Value::Object(values_fn)),
    );

    let ctor = intrinsics::install_constructor(cx, "Array", 1, &proto, false, array_ctor);
    method(cx, &ctor, "isArray", 1, array_is_array);
    method(cx, &ctor, "of", 0, array_of);
    method(cx, &ctor, "from", 1, array_from);
    let species = cx.well_known().species.clone();
    symbol_method(cx, &ctor, species, "[Symbol.species]", 0, species_self);
}

fn species_self(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(this.clone())
}

fn array_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    if args.len() == 1 {
        if let Value::Number(n) = &args[0] {
            let len = convert::to_uint32(*n);
            if len as f64 != *n {
                return Err(VmError::range_error("Invalid array length"));
            }
            let arr = array::new_array(cx, Vec::new());
            arr.insert_property(
                PropertyKey::Atom(atoms::LENGTH),
                Property::data_with(Value::number(len as f64), true, false, false),
            );
            return Ok(Value::Object(arr));
        }
    }
    Ok(Value::Object(array::new_array(cx, args.to_vec())))
}

fn array_is_array(_cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let r = object::is_array(args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::Boolean(r))
}

fn array_of(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Object(array::new_array(cx, args.to_vec())))
}

fn array_from(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let source = args.first().cloned().unwrap_or(Value::Undefined);
    let map_fn = args.get(1).cloned();
    let iterator_key = PropertyKey::Symbol(cx.well_known().iterator.clone());
    let has_iterator = !convert::get_property_of_value(cx, &source, &iterator_key)?.is_nullish();

    let raw = if has_iterator {
        interpreter::iterate_to_vec(cx, &source)?
    } else {
        // Array-like path.
        let obj = convert::to_object(cx, &source)?;
        let receiver = Value::Object(obj.clone());
        let len_value = obj.get(cx, &PropertyKey::Atom(atoms::LENGTH), &receiver)?;
        let len = convert::to_length(cx, &len_value)?;
        let mut out = Vec::with_capacity(len as usize);
        for i in 0..len {
            out.push(obj.get(cx, &PropertyKey::Index(i as u32), &receiver)?);
        }
        out
    };

    let mapped = match map_fn {
        Some(f) if !f.is_undefined() => {
            if !f.is_callable() {
                return Err(VmError::type_error("Array.from map function is not callable"));
            }
            let mut out = Vec::with_capacity(raw.len());
            for (i, v) in raw.into_iter().enumerate() {
                out.push(interpreter::call_value(
                    cx,
                    &f,
                    &Value::Undefined,
                    &[v, Value::number(i as f64)],
                )?);
            }
            out
        }
        _ => raw,
    };
    Ok(Value::Object(array::new_array(cx, mapped)))
}

fn this_array(cx: &mut Context, this: &Value) -> VmResult<GcRef<JsObject>> {
    convert::to_object(cx, this)
}

/// ArraySpeciesCreate — consult `constructor[@@species]` of the original.
fn species_create(cx: &mut Context, original: &GcRef<JsObject>, length: usize) -> VmResult<Value> {
    if !object::is_array(&Value::Object(original.clone()))? {
        return Ok(Value::Object(array::new_array(cx, Vec::new())));
    }
    let receiver = Value::Object(original.clone());
    let ctor = original.get(cx, &PropertyKey::Atom(atoms::CONSTRUCTOR), &receiver)?;
    let species = match &ctor {
        Value::Object(ctor_obj) => {
            let species_key = PropertyKey::Symbol(cx.well_known().species.clone());
            ctor_obj.get(cx, &species_key, &ctor)?
        }
        _ => Value::Undefined,
    };
    if species.is_nullish() {
        return Ok(Value::Object(array::new_array(cx, Vec::new())));
    }
    interpreter::construct_value(cx, &species, &[Value::number(length as f64)], &species)
}

fn array_push(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let mut len = length_of(&obj);
    for arg in args {
        obj.set(cx, &PropertyKey::Index(len), arg.clone(), this)?;
        len += 1;
    }
    obj.set(
        cx,
        &PropertyKey::Atom(atoms::LENGTH),
        Value::number(len as f64),
        this,
    )?;
    Ok(Value::number(len as f64))
}

fn array_pop(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    if len == 0 {
        return Ok(Value::Undefined);
    }
    let last = obj.get(cx, &PropertyKey::Index(len - 1), this)?;
    obj.delete(cx, &PropertyKey::Index(len - 1))?;
    obj.set(
        cx,
        &PropertyKey::Atom(atoms::LENGTH),
        Value::number((len - 1) as f64),
        this,
    )?;
    Ok(last)
}

fn array_shift(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    if len == 0 {
        return Ok(Value::Undefined);
    }
    let first = obj.get(cx, &PropertyKey::Index(0), this)?;
    for i in 1..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        obj.set(cx, &PropertyKey::Index(i - 1), v, this)?;
    }
    obj.delete(cx, &PropertyKey::Index(len - 1))?;
    obj.set(
        cx,
        &PropertyKey::Atom(atoms::LENGTH),
        Value::number((len - 1) as f64),
        this,
    )?;
    Ok(first)
}

fn array_unshift(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let shift = args.len() as u32;
    for i in (0..len).rev() {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        obj.set(cx, &PropertyKey::Index(i + shift), v, this)?;
    }
    for (i, arg) in args.iter().enumerate() {
        obj.set(cx, &PropertyKey::Index(i as u32), arg.clone(), this)?;
    }
    let new_len = len + shift;
    obj.set(
        cx,
        &PropertyKey::Atom(atoms::LENGTH),
        Value::number(new_len as f64),
        this,
    )?;
    Ok(Value::number(new_len as f64))
}

fn relative_index(len: u32, arg: Option<&Value>, default: u32, cx: &mut Context) -> VmResult<u32> {
    let Some(v) = arg else {
        return Ok(default);
    };
    if v.is_undefined() {
        return Ok(default);
    }
    let n = convert::to_number(cx, v)?;
    if n.is_nan() {
        return Ok(0);
    }
    let r = if n < 0.0 {
        (len as f64 + n).max(0.0)
    } else {
        n.min(len as f64)
    };
    Ok(r as u32)
}

fn array_slice(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let start = relative_index(len, args.first(), 0, cx)?;
    let end = relative_index(len, args.get(1), len, cx)?;

    let target = species_create(cx, &obj, end.saturating_sub(start) as usize)?;
    let Value::Object(target_obj) = &target else {
        return Err(VmError::type_error("species constructor returned non-object"));
    };
    let mut out = 0u32;
    for i in start..end {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        target_obj.set(cx, &PropertyKey::Index(out), v, &target)?;
        out += 1;
    }
    target_obj.set(
        cx,
        &PropertyKey::Atom(atoms::LENGTH),
        Value::number(out as f64),
        &target,
    )?;
    Ok(target)
}

/// IsConcatSpreadable: `@@isConcatSpreadable` when present, else `IsArray`.
fn is_concat_spreadable(cx: &mut Context, value: &Value) -> VmResult<bool> {
    let Value::Object(obj) = value else {
        return Ok(false);
    };
    let key = PropertyKey::Symbol(cx.well_known().is_concat_spreadable.clone());
    let flag = obj.get(cx, &key, value)?;
    if flag.is_undefined() {
        return object::is_array(value);
    }
    Ok(flag.is_truthy())
}

fn array_concat(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let target = species_create(cx, &obj, 0)?;
    let Value::Object(target_obj) = &target else {
        return Err(VmError::type_error("species constructor returned non-object"));
    };
    let mut out = 0u32;
    let mut parts = vec![this.clone()];
    parts.extend(args.iter().cloned());
    for part in parts {
        if is_concat_spreadable(cx, &part)? {
            let part_obj = convert::to_object(cx, &part)?;
            let len = {
                let receiver = part.clone();
                let len_value = part_obj.get(cx, &PropertyKey::Atom(atoms::LENGTH), &receiver)?;
                convert::to_length(cx, &len_value)? as u32
            };
            for i in 0..len {
                let v = part_obj.get(cx, &PropertyKey::Index(i), &part)?;
                target_obj.set(cx, &PropertyKey::Index(out), v, &target)?;
                out += 1;
            }
        } else {
            target_obj.set(cx, &PropertyKey::Index(out), part, &target)?;
            out += 1;
        }
    }
    target_obj.set(
        cx,
        &PropertyKey::Atom(atoms::LENGTH),
        Value::number(out as f64),
        &target,
    )?;
    Ok(target)
}

fn array_join(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let separator = match args.first() {
        None | Some(Value::Undefined) => ",".to_string(),
        Some(v) => convert::to_string_value(cx, v)?.as_str().to_string(),
    };
    let mut out = String::new();
    for i in 0..len {
        if i > 0 {
            out.push_str(&separator);
        }
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        if !v.is_nullish() {
            out.push_str(convert::to_string_value(cx, &v)?.as_str());
        }
    }
    Ok(Value::string(out))
}

fn array_to_string(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    array_join(cx, this, &[])
}

fn array_index_of(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let needle = args.first().cloned().unwrap_or(Value::Undefined);
    for i in 0..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        if v.strict_equals(&needle) {
            return Ok(Value::number(i as f64));
        }
    }
    Ok(Value::number(-1.0))
}

fn array_includes(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let needle = args.first().cloned().unwrap_or(Value::Undefined);
    for i in 0..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        if v.same_value_zero(&needle) {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

fn callback_args(v: Value, i: u32, this: &Value) -> [Value; 3] {
    [v, Value::number(i as f64), this.clone()]
}

fn require_callable(args: &[Value], what: &str) -> VmResult<Value> {
    let f = args.first().cloned().unwrap_or(Value::Undefined);
    if !f.is_callable() {
        return Err(VmError::type_error(format!("{what} is not a function")));
    }
    Ok(f)
}

fn array_for_each(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let f = require_callable(args, "callback")?;
    let this_arg = args.get(1).cloned().unwrap_or(Value::Undefined);
    for i in 0..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        interpreter::call_value(cx, &f, &this_arg, &callback_args(v, i, this))?;
    }
    Ok(Value::Undefined)
}

fn array_map(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let f = require_callable(args, "callback")?;
    let this_arg = args.get(1).cloned().unwrap_or(Value::Undefined);

    let target = species_create(cx, &obj, len as usize)?;
    let Value::Object(target_obj) = &target else {
        return Err(VmError::type_error("species constructor returned non-object"));
    };
    for i in 0..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        let mapped = interpreter::call_value(cx, &f, &this_arg, &callback_args(v, i, this))?;
        target_obj.set(cx, &PropertyKey::Index(i), mapped, &target)?;
    }
    target_obj.set(
        cx,
        &PropertyKey::Atom(atoms::LENGTH),
        Value::number(len as f64),
        &target,
    )?;
    Ok(target)
}

fn array_filter(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let f = require_callable(args, "callback")?;
    let this_arg = args.get(1).cloned().unwrap_or(Value::Undefined);
    let mut kept = Vec::new();
    for i in 0..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        let keep =
            interpreter::call_value(cx, &f, &this_arg, &callback_args(v.clone(), i, this))?;
        if keep.is_truthy() {
            kept.push(v);
        }
    }
    Ok(Value::Object(array::new_array(cx, kept)))
}

fn array_reduce(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let f = require_callable(args, "callback")?;
    let mut accumulator = args.get(1).cloned();
    let mut start = 0;
    if accumulator.is_none() {
        if len == 0 {
            return Err(VmError::type_error("Reduce of empty array with no initial value"));
        }
        accumulator = Some(obj.get(cx, &PropertyKey::Index(0), this)?);
        start = 1;
    }
    let mut acc = accumulator.expect("set above");
    for i in start..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        acc = interpreter::call_value(
            cx,
            &f,
            &Value::Undefined,
            &[acc, v, Value::number(i as f64), this.clone()],
        )?;
    }
    Ok(acc)
}

fn array_some(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let f = require_callable(args, "callback")?;
    for i in 0..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        if interpreter::call_value(cx, &f, &Value::Undefined, &callback_args(v, i, this))?
            .is_truthy()
        {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

fn array_every(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let f = require_callable(args, "callback")?;
    for i in 0..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        if !interpreter::call_value(cx, &f, &Value::Undefined, &callback_args(v, i, this))?
            .is_truthy()
        {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(Value::Boolean(true))
}

fn array_find(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let f = require_callable(args, "predicate")?;
    for i in 0..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        if interpreter::call_value(cx, &f, &Value::Undefined, &callback_args(v.clone(), i, this))?
            .is_truthy()
        {
            return Ok(v);
        }
    }
    Ok(Value::Undefined)
}

fn array_find_index(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let f = require_callable(args, "predicate")?;
    for i in 0..len {
        let v = obj.get(cx, &PropertyKey::Index(i), this)?;
        if interpreter::call_value(cx, &f, &Value::Undefined, &callback_args(v, i, this))?
            .is_truthy()
        {
            return Ok(Value::number(i as f64));
        }
    }
    Ok(Value::number(-1.0))
}

fn array_reverse(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let mut values = Vec::with_capacity(len as usize);
    for i in 0..len {
        values.push(obj.get(cx, &PropertyKey::Index(i), this)?);
    }
    values.reverse();
    for (i, v) in values.into_iter().enumerate() {
        obj.set(cx, &PropertyKey::Index(i as u32), v, this)?;
    }
    Ok(this.clone())
}

fn array_fill(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = this_array(cx, this)?;
    let len = length_of(&obj);
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    let start = relative_index(len, args.get(1), 0, cx)?;
    let end = relative_index(len, args.get(2), len, cx)?;
    for i in start..end {
        obj.set(cx, &PropertyKey::Index(i), value.clone(), this)?;
    }
    Ok(this.clone())
}

fn array_flat(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let depth = match args.first() {
        None | Some(Value::Undefined) => 1,
        Some(v) => convert::to_number(cx, v)?.max(0.0) as u32,
    };
    let mut out = Vec::new();
    flatten_into(cx, this, depth, &mut out)?;
    Ok(Value::Object(array::new_array(cx, out)))
}

fn flatten_into(cx: &mut Context, value: &Value, depth: u32, out: &mut Vec<Value>) -> VmResult<()> {
    let obj = this_array(cx, value)?;
    let len = length_of(&obj);
    for i in 0..len {
        let v = obj.get(cx, &PropertyKey::Index(i), value)?;
        if depth > 0 && object::is_array(&v)? {
            flatten_into(cx, &v, depth - 1, out)?;
        } else {
            out.push(v);
        }
    }
    Ok(())
}

// ====================================================================
// Array iterators
// ====================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum IterKind {
    Keys,
    Values,
    Entries,
}

fn make_array_iterator(cx: &mut Context, target: Value, kind: IterKind) -> VmResult<Value> {
    let obj = convert::to_object(cx, &target)?;
    let index = Arc::new(AtomicUsize::new(0));
    let next: NativeFn = Arc::new(move |cx, _this, _args| {
        let i = index.fetch_add(1, Ordering::Relaxed) as u32;
        let receiver = Value::Object(obj.clone());
        let len = {
            let len_value = obj.get(cx, &PropertyKey::Atom(atoms::LENGTH), &receiver)?;
            convert::to_length(cx, &len_value)? as u32
        };
        if i >= len {
            return Ok(Value::Object(crate::generator::create_iter_result(
                cx,
                Value::Undefined,
                true,
            )));
        }
        let value = match kind {
            IterKind::Keys => Value::number(i as f64),
            IterKind::Values => obj.get(cx, &PropertyKey::Index(i), &receiver)?,
            IterKind::Entries => {
                let v = obj.get(cx, &PropertyKey::Index(i), &receiver)?;
                Value::Object(crate::array::new_array(
                    cx,
                    vec![Value::number(i as f64), v],
                ))
            }
        };
        Ok(Value::Object(crate::generator::create_iter_result(
            cx, value, false,
        )))
    });

    let iterator = JsObject::ordinary(Some(cx.intrinsics().array_iterator_prototype.clone()));
    let next_fn = function::native_function(cx, "next", 0, next);
    iterator.insert_property(
        PropertyKey::Atom(atoms::NEXT),
        Property::method(Value::Object(next_fn)),
    );
    Ok(Value::Object(iterator))
}

/// `Array.prototype.values`, shared with arguments objects — hence a free
/// function wired during bootstrap.
pub fn array_values_native(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    make_array_iterator(cx, this.clone(), IterKind::Values)
}

fn array_keys(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    make_array_iterator(cx, this.clone(), IterKind::Keys)
}

fn array_entries(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    make_array_iterator(cx, this.clone(), IterKind::Entries)
}
