//! `Object` constructor and prototype

use marten_vm_gc::GcRef;

use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::intrinsics::{self, method};
use crate::object::JsObject;
use crate::property::{Property, PropertyDescriptor, PropertyKey};
use crate::value::Value;

/// Install `Object` (its prototype's methods first, then the constructor).
pub fn install(cx: &mut Context) {
    let proto = cx.intrinsics().object_prototype.clone();
    method(cx, &proto, "hasOwnProperty", 1, has_own_property);
    method(cx, &proto, "isPrototypeOf", 1, is_prototype_of);
    method(cx, &proto, "propertyIsEnumerable", 1, property_is_enumerable);
    method(cx, &proto, "toString", 0, object_to_string);
    method(cx, &proto, "toLocaleString", 0, object_to_string);
    method(cx, &proto, "valueOf", 0, object_value_of);

    let ctor = intrinsics::install_constructor(cx, "Object", 1, &proto, false, object_ctor);
    method(cx, &ctor, "keys", 1, object_keys);
    method(cx, &ctor, "values", 1, object_values);
    method(cx, &ctor, "entries", 1, object_entries);
    method(cx, &ctor, "assign", 2, object_assign);
    method(cx, &ctor, "create", 2, object_create);
    method(cx, &ctor, "defineProperty", 3, object_define_property);
    method(cx, &ctor, "defineProperties", 2, object_define_properties);
    method(cx, &ctor, "getOwnPropertyDescriptor", 2, get_own_property_descriptor);
    method(cx, &ctor, "getOwnPropertyNames", 1, get_own_property_names);
    method(cx, &ctor, "getOwnPropertySymbols", 1, get_own_property_symbols);
    method(cx, &ctor, "getPrototypeOf", 1, object_get_prototype_of);
    method(cx, &ctor, "setPrototypeOf", 2, object_set_prototype_of);
    method(cx, &ctor, "preventExtensions", 1, object_prevent_extensions);
    method(cx, &ctor, "isExtensible", 1, object_is_extensible);
    method(cx, &ctor, "freeze", 1, object_freeze);
    method(cx, &ctor, "isFrozen", 1, object_is_frozen);
    method(cx, &ctor, "seal", 1, object_seal);
    method(cx, &ctor, "isSealed", 1, object_is_sealed);
    method(cx, &ctor, "is", 2, object_is);
    method(cx, &ctor, "fromEntries", 1, object_from_entries);
}

fn object_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    match args.first() {
        None | Some(Value::Undefined) | Some(Value::Null) => Ok(Value::Object(JsObject::ordinary(
            Some(cx.intrinsics().object_prototype.clone()),
        ))),
        Some(value) => Ok(Value::Object(convert::to_object(cx, value)?)),
    }
}

fn this_object(cx: &mut Context, this: &Value) -> VmResult<GcRef<JsObject>> {
    convert::to_object(cx, this)
}

fn arg_object(args: &[Value], index: usize, op: &str) -> VmResult<GcRef<JsObject>> {
    match args.get(index) {
        Some(Value::Object(o)) => Ok(o.clone()),
        _ => Err(VmError::type_error(format!("{op} called on non-object"))),
    }
}

fn has_own_property(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let key = convert::to_property_key(cx, args.first().unwrap_or(&Value::Undefined))?;
    let obj = this_object(cx, this)?;
    Ok(Value::Boolean(obj.get_own_property(cx, &key)?.is_some()))
}

fn is_prototype_of(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let Some(Value::Object(candidate)) = args.first() else {
        return Ok(Value::Boolean(false));
    };
    let target = this_object(cx, this)?;
    let mut cursor = candidate.proto();
    while let Some(p) = cursor {
        if GcRef::ptr_eq(&p, &target) {
            return Ok(Value::Boolean(true));
        }
        cursor = p.proto();
    }
    Ok(Value::Boolean(false))
}

fn property_is_enumerable(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let key = convert::to_property_key(cx, args.first().unwrap_or(&Value::Undefined))?;
    let obj = this_object(cx, this)?;
    let enumerable = obj
        .get_own_property(cx, &key)?
        .map(|p| p.is_enumerable())
        .unwrap_or(false);
    Ok(Value::Boolean(enumerable))
}

fn object_to_string(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let tag = match this {
        Value::Undefined => "Undefined".to_string(),
        Value::Null => "Null".to_string(),
        Value::Object(obj) => {
            let tag_key = PropertyKey::Symbol(cx.well_known().to_string_tag.clone());
            match obj.get(cx, &tag_key, this)? {
                Value::String(s) => s.as_str().to_string(),
                _ => obj.kind().class_name().to_string(),
            }
        }
        other => {
            let obj = convert::to_object(cx, other)?;
            obj.kind().class_name().to_string()
        }
    };
    Ok(Value::string(format!("[object {tag}]")))
}

fn object_value_of(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::Object(this_object(cx, this)?))
}

fn enumerable_own_entries(
    cx: &mut Context,
    obj: &GcRef<JsObject>,
) -> VmResult<Vec<(PropertyKey, Value)>> {
    let receiver = Value::Object(obj.clone());
    let mut out = Vec::new();
    for key in obj.own_keys(cx)? {
        if matches!(key, PropertyKey::Symbol(_)) {
            continue;
        }
        let Some(prop) = obj.get_own_property(cx, &key)? else {
            continue;
        };
        if !prop.is_enumerable() {
            continue;
        }
        let value = obj.get(cx, &key, &receiver)?;
        out.push((key, value));
    }
    Ok(out)
}

fn object_keys(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = convert::to_object(cx, args.first().unwrap_or(&Value::Undefined))?;
    let entries = enumerable_own_entries(cx, &obj)?;
    let keys = entries
        .into_iter()
        .map(|(k, _)| convert::key_to_value(cx, &k))
        .collect();
    Ok(Value::Object(crate::array::new_array(cx, keys)))
}

fn object_values(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = convert::to_object(cx, args.first().unwrap_or(&Value::Undefined))?;
    let entries = enumerable_own_entries(cx, &obj)?;
    let values = entries.into_iter().map(|(_, v)| v).collect();
    Ok(Value::Object(crate::array::new_array(cx, values)))
}

fn object_entries(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = convert::to_object(cx, args.first().unwrap_or(&Value::Undefined))?;
    let entries = enumerable_own_entries(cx, &obj)?;
    let pairs = entries
        .into_iter()
        .map(|(k, v)| {
            let key_value = convert::key_to_value(cx, &k);
            Value::Object(crate::array::new_array(cx, vec![key_value, v]))
        })
        .collect();
    Ok(Value::Object(crate::array::new_array(cx, pairs)))
}

fn object_assign(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = convert::to_object(cx, args.first().unwrap_or(&Value::Undefined))?;
    let target_value = Value::Object(target.clone());
    for source in args.iter().skip(1) {
        if source.is_nullish() {
            continue;
        }
        let source_obj = convert::to_object(cx, source)?;
        for (key, value) in enumerable_own_entries(cx, &source_obj)? {
            target.set(cx, &key, value, &target_value)?;
        }
    }
    Ok(target_value)
}

fn object_create(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let proto = match args.first() {
        Some(Value::Object(o)) => Some(o.clone()),
        Some(Value::Null) => None,
        _ => {
            return Err(VmError::type_error(
                "Object prototype may only be an Object or null",
            ));
        }
    };
    let obj = JsObject::ordinary(proto);
    if let Some(props) = args.get(1) {
        if !props.is_undefined() {
            define_properties_from(cx, &obj, props)?;
        }
    }
    Ok(Value::Object(obj))
}

fn object_define_property(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, 0, "Object.defineProperty")?;
    let key = convert::to_property_key(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    let desc = convert::to_property_descriptor(cx, args.get(2).unwrap_or(&Value::Undefined))?;
    if !obj.define_own_property(cx, &key, desc)? {
        return Err(VmError::type_error(format!(
            "Cannot redefine property: {}",
            match &key {
                PropertyKey::Index(i) => i.to_string(),
                PropertyKey::Atom(a) => cx.atom_name(*a).as_str().to_string(),
                PropertyKey::Symbol(s) => s.to_display_string(),
            }
        )));
    }
    Ok(Value::Object(obj))
}

fn object_define_properties(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, 0, "Object.defineProperties")?;
    define_properties_from(cx, &obj, args.get(1).unwrap_or(&Value::Undefined))?;
    Ok(Value::Object(obj))
}

fn define_properties_from(
    cx: &mut Context,
    obj: &GcRef<JsObject>,
    props: &Value,
) -> VmResult<()> {
    let props_obj = convert::to_object(cx, props)?;
    for (key, descriptor_value) in enumerable_own_entries(cx, &props_obj)? {
        let desc = convert::to_property_descriptor(cx, &descriptor_value)?;
        if !obj.define_own_property(cx, &key, desc)? {
            return Err(VmError::type_error("Cannot define property"));
        }
    }
    Ok(())
}

fn get_own_property_descriptor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = convert::to_object(cx, args.first().unwrap_or(&Value::Undefined))?;
    let key = convert::to_property_key(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    match obj.get_own_property(cx, &key)? {
        Some(prop) => Ok(convert::from_property_descriptor(cx, &prop.to_descriptor())),
        None => Ok(Value::Undefined),
    }
}

fn get_own_property_names(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = convert::to_object(cx, args.first().unwrap_or(&Value::Undefined))?;
    let keys = obj
        .own_keys(cx)?
        .into_iter()
        .filter(|k| !matches!(k, PropertyKey::Symbol(_)))
        .map(|k| convert::key_to_value(cx, &k))
        .collect();
    Ok(Value::Object(crate::array::new_array(cx, keys)))
}

fn get_own_property_symbols(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = convert::to_object(cx, args.first().unwrap_or(&Value::Undefined))?;
    let keys = obj
        .own_keys(cx)?
        .into_iter()
        .filter(|k| matches!(k, PropertyKey::Symbol(_)))
        .map(|k| convert::key_to_value(cx, &k))
        .collect();
    Ok(Value::Object(crate::array::new_array(cx, keys)))
}

fn object_get_prototype_of(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = convert::to_object(cx, args.first().unwrap_or(&Value::Undefined))?;
    obj.get_prototype_of(cx)
}

fn object_set_prototype_of(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    let proto = match args.get(1) {
        Some(Value::Object(o)) => Some(o.clone()),
        Some(Value::Null) => None,
        _ => {
            return Err(VmError::type_error(
                "Object prototype may only be an Object or null",
            ));
        }
    };
    let Value::Object(obj) = &target else {
        // Primitives pass through untouched.
        return Ok(target);
    };
    if !obj.set_prototype_of(cx, proto)? {
        return Err(VmError::type_error("#<Object> is not extensible"));
    }
    Ok(target)
}

fn object_prevent_extensions(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    if let Value::Object(obj) = &target {
        obj.prevent_extensions(cx)?;
    }
    Ok(target)
}

fn object_is_extensible(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    match args.first() {
        Some(Value::Object(obj)) => Ok(Value::Boolean(obj.is_extensible(cx)?)),
        _ => Ok(Value::Boolean(false)),
    }
}

fn seal_with(cx: &mut Context, obj: &GcRef<JsObject>, freeze: bool) -> VmResult<()> {
    obj.prevent_extensions(cx)?;
    for key in obj.own_keys(cx)? {
        let mut desc = PropertyDescriptor {
            configurable: Some(false),
            ..Default::default()
        };
        if freeze {
            if let Some(Property::Data { .. }) = obj.get_own_property(cx, &key)? {
                desc.writable = Some(false);
            }
        }
        obj.define_own_property(cx, &key, desc)?;
    }
    Ok(())
}

fn object_freeze(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    if let Value::Object(obj) = &target {
        seal_with(cx, obj, true)?;
    }
    Ok(target)
}

fn object_seal(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    if let Value::Object(obj) = &target {
        seal_with(cx, obj, false)?;
    }
    Ok(target)
}

fn check_integrity(cx: &mut Context, obj: &GcRef<JsObject>, frozen: bool) -> VmResult<bool> {
    if obj.is_extensible(cx)? {
        return Ok(false);
    }
    for key in obj.own_keys(cx)? {
        if let Some(prop) = obj.get_own_property(cx, &key)? {
            if prop.is_configurable() {
                return Ok(false);
            }
            if frozen {
                if let Property::Data { writable: true, .. } = prop {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

fn object_is_frozen(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    match args.first() {
        Some(Value::Object(obj)) => Ok(Value::Boolean(check_integrity(cx, obj, true)?)),
        _ => Ok(Value::Boolean(true)),
    }
}

fn object_is_sealed(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    match args.first() {
        Some(Value::Object(obj)) => Ok(Value::Boolean(check_integrity(cx, obj, false)?)),
        _ => Ok(Value::Boolean(true)),
    }
}

fn object_is(_cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let a = args.first().unwrap_or(&Value::Undefined);
    let b = args.get(1).unwrap_or(&Value::Undefined);
    Ok(Value::Boolean(a.same_value(b)))
}

fn object_from_entries(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let iterable = args.first().cloned().unwrap_or(Value::Undefined);
    let entries = crate::interpreter::iterate_to_vec(cx, &iterable)?;
    let obj = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    for entry in entries {
        let Value::Object(pair) = &entry else {
            return Err(VmError::type_error("Iterator value is not an entry object"));
        };
        let receiver = entry.clone();
        let k = pair.get(cx, &PropertyKey::Index(0), &receiver)?;
        let v = pair.get(cx, &PropertyKey::Index(1), &receiver)?;
        let key = convert::to_property_key(cx, &k)?;
        obj.create_data_property(cx, key, v)?;
    }
    Ok(Value::Object(obj))
}
