//! Array exotic behavior
//!
//! Arrays keep `length` as a real own property (writable, non-enumerable,
//! non-configurable) and enforce the coupling between `length` and index
//! properties: growing writes bump `length`, truncating `length` deletes
//! indices in descending order and stops at the first non-configurable one.

use marten_vm_gc::GcRef;

use crate::atom::atoms;
use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyDescriptor, PropertyKey};
use crate::value::Value;

/// Allocate an array with the given elements.
pub fn new_array(cx: &mut Context, elements: Vec<Value>) -> GcRef<JsObject> {
    let proto = cx.intrinsics().array_prototype.clone();
    let obj = JsObject::new(ObjectKind::Array, Some(proto));
    let len = elements.len() as u32;
    for (i, element) in elements.into_iter().enumerate() {
        obj.insert_property(PropertyKey::Index(i as u32), Property::data(element));
    }
    obj.insert_property(
        PropertyKey::Atom(atoms::LENGTH),
        Property::data_with(Value::number(len as f64), true, false, false),
    );
    obj
}

/// Current `length` value.
pub fn length_of(obj: &JsObject) -> u32 {
    match obj.store().get(&PropertyKey::Atom(atoms::LENGTH)) {
        Some(Property::Data { value, .. }) => value.as_number().unwrap_or(0.0) as u32,
        _ => 0,
    }
}

fn length_writable(obj: &JsObject) -> bool {
    match obj.store().get(&PropertyKey::Atom(atoms::LENGTH)) {
        Some(p) => p.is_writable(),
        None => true,
    }
}

fn store_length(obj: &JsObject, len: u32, writable: bool) {
    obj.insert_property(
        PropertyKey::Atom(atoms::LENGTH),
        Property::data_with(Value::number(len as f64), writable, false, false),
    );
}

/// `[[DefineOwnProperty]]` for an array index.
pub fn define_index(obj: &JsObject, index: u32, desc: PropertyDescriptor) -> VmResult<bool> {
    let old_len = length_of(obj);
    if index >= old_len && !length_writable(obj) {
        return Ok(false);
    }
    if !obj.validate_and_apply(&PropertyKey::Index(index), desc) {
        return Ok(false);
    }
    if index >= old_len {
        store_length(obj, index + 1, length_writable(obj));
    }
    Ok(true)
}

/// ArraySetLength.
pub fn define_length(cx: &mut Context, obj: &JsObject, desc: PropertyDescriptor) -> VmResult<bool> {
    let Some(len_value) = desc.value.clone() else {
        // Attribute-only change (e.g. freezing `length`).
        return Ok(obj.validate_and_apply(&PropertyKey::Atom(atoms::LENGTH), desc));
    };

    let number_len = convert::to_number(cx, &len_value)?;
    let new_len = convert::to_uint32(number_len);
    if new_len as f64 != number_len {
        return Err(VmError::range_error("Invalid array length"));
    }

    let old_len = length_of(obj);
    let was_writable = length_writable(obj);
    let new_writable = desc.writable.unwrap_or(was_writable);

    if new_len >= old_len {
        if !was_writable && (new_len != old_len || desc.writable == Some(true)) {
            return Ok(false);
        }
        store_length(obj, new_len, new_writable);
        return Ok(true);
    }

    if !was_writable {
        return Ok(false);
    }

    // Delete indices >= new_len in descending order; a non-configurable index
    // clamps the length just above itself.
    let doomed: Vec<u32> = obj
        .store()
        .index_keys_descending()
        .into_iter()
        .filter(|i| *i >= new_len)
        .collect();
    for index in doomed {
        let key = PropertyKey::Index(index);
        let configurable = obj
            .store()
            .get(&key)
            .map(|p| p.is_configurable())
            .unwrap_or(true);
        if !configurable {
            store_length(obj, index + 1, new_writable);
            return Ok(false);
        }
        obj.store_mut().remove(&key);
    }

    store_length(obj, new_len, new_writable);
    Ok(true)
}

/// Collect the dense element view `0..length`, holes as `undefined`.
pub fn elements_of(cx: &mut Context, obj: &GcRef<JsObject>) -> VmResult<Vec<Value>> {
    let len = length_of(obj);
    let mut out = Vec::with_capacity(len as usize);
    for i in 0..len {
        out.push(obj.get(cx, &PropertyKey::Index(i), &Value::Object(obj.clone()))?);
    }
    Ok(out)
}
