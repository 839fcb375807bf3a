//! The `Reflect` namespace — thin wrappers over the object operations

use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::interpreter;
use crate::intrinsics::{install_namespace, method};
use crate::value::Value;

/// Install `Reflect`.
pub fn install(cx: &mut Context) {
    let reflect = install_namespace(cx, "Reflect");
    method(cx, &reflect, "get", 2, reflect_get);
    method(cx, &reflect, "set", 3, reflect_set);
    method(cx, &reflect, "has", 2, reflect_has);
    method(cx, &reflect, "deleteProperty", 2, reflect_delete_property);
    method(cx, &reflect, "ownKeys", 1, reflect_own_keys);
    method(cx, &reflect, "getOwnPropertyDescriptor", 2, reflect_get_own);
    method(cx, &reflect, "defineProperty", 3, reflect_define_property);
    method(cx, &reflect, "getPrototypeOf", 1, reflect_get_prototype_of);
    method(cx, &reflect, "setPrototypeOf", 2, reflect_set_prototype_of);
    method(cx, &reflect, "isExtensible", 1, reflect_is_extensible);
    method(cx, &reflect, "preventExtensions", 1, reflect_prevent_extensions);
    method(cx, &reflect, "apply", 3, reflect_apply);
    method(cx, &reflect, "construct", 2, reflect_construct);
}

fn arg_object(args: &[Value], op: &str) -> VmResult<marten_vm_gc::GcRef<crate::object::JsObject>> {
    match args.first() {
        Some(Value::Object(o)) => Ok(o.clone()),
        _ => Err(VmError::type_error(format!(
            "Reflect.{op} called on non-object"
        ))),
    }
}

fn reflect_get(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "get")?;
    let key = convert::to_property_key(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    let receiver = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| args[0].clone());
    obj.get(cx, &key, &receiver)
}

fn reflect_set(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "set")?;
    let key = convert::to_property_key(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    let value = args.get(2).cloned().unwrap_or(Value::Undefined);
    let receiver = args
        .get(3)
        .cloned()
        .unwrap_or_else(|| args[0].clone());
    Ok(Value::Boolean(obj.set(cx, &key, value, &receiver)?))
}

fn reflect_has(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "has")?;
    let key = convert::to_property_key(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    Ok(Value::Boolean(obj.has(cx, &key)?))
}

fn reflect_delete_property(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "deleteProperty")?;
    let key = convert::to_property_key(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    Ok(Value::Boolean(obj.delete(cx, &key)?))
}

fn reflect_own_keys(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "ownKeys")?;
    let keys = obj
        .own_keys(cx)?
        .into_iter()
        .map(|k| convert::key_to_value(cx, &k))
        .collect();
    Ok(Value::Object(crate::array::new_array(cx, keys)))
}

fn reflect_get_own(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "getOwnPropertyDescriptor")?;
    let key = convert::to_property_key(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    match obj.get_own_property(cx, &key)? {
        Some(prop) => Ok(convert::from_property_descriptor(cx, &prop.to_descriptor())),
        None => Ok(Value::Undefined),
    }
}

fn reflect_define_property(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "defineProperty")?;
    let key = convert::to_property_key(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    let desc = convert::to_property_descriptor(cx, args.get(2).unwrap_or(&Value::Undefined))?;
    Ok(Value::Boolean(obj.define_own_property(cx, &key, desc)?))
}

fn reflect_get_prototype_of(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "getPrototypeOf")?;
    obj.get_prototype_of(cx)
}

fn reflect_set_prototype_of(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "setPrototypeOf")?;
    let proto = match args.get(1) {
        Some(Value::Object(p)) => Some(p.clone()),
        Some(Value::Null) => None,
        _ => {
            return Err(VmError::type_error(
                "Object prototype may only be an Object or null",
            ));
        }
    };
    Ok(Value::Boolean(obj.set_prototype_of(cx, proto)?))
}

fn reflect_is_extensible(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "isExtensible")?;
    Ok(Value::Boolean(obj.is_extensible(cx)?))
}

fn reflect_prevent_extensions(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let obj = arg_object(args, "preventExtensions")?;
    Ok(Value::Boolean(obj.prevent_extensions(cx)?))
}

fn reflect_apply(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    let this_arg = args.get(1).cloned().unwrap_or(Value::Undefined);
    let list = match args.get(2) {
        Some(Value::Object(list)) => crate::array::elements_of(cx, list)?,
        _ => Vec::new(),
    };
    interpreter::call_value(cx, &target, &this_arg, &list)
}

fn reflect_construct(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    let list = match args.get(1) {
        Some(Value::Object(list)) => crate::array::elements_of(cx, list)?,
        _ => Vec::new(),
    };
    let new_target = args.get(2).cloned().unwrap_or_else(|| target.clone());
    interpreter::construct_value(cx, &target, &list, &new_target)
}
