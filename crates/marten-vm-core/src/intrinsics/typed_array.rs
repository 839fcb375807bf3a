//! The TypedArray constructors and `%TypedArray%.prototype`

use crate::atom::atoms;
use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::intrinsics::{self, getter, method};
use crate::object::ObjectKind;
use crate::property::{Property, PropertyKey};
use crate::typed_array::{self, TypedArrayData, TypedArrayKind};
use crate::value::Value;

/// Install `%TypedArray%` and every element-typed constructor.
pub fn install(cx: &mut Context) {
    let base_proto = cx.intrinsics().typed_array_prototype.clone();
    getter(cx, &base_proto, "length", ta_length);
    getter(cx, &base_proto, "byteLength", ta_byte_length);
    getter(cx, &base_proto, "byteOffset", ta_byte_offset);
    getter(cx, &base_proto, "buffer", ta_buffer);
    method(cx, &base_proto, "fill", 1, ta_fill);
    method(cx, &base_proto, "set", 1, ta_set);
    method(cx, &base_proto, "subarray", 2, ta_subarray);
    method(cx, &base_proto, "at", 1, ta_at);
    method(cx, &base_proto, "indexOf", 1, ta_index_of);
    method(cx, &base_proto, "includes", 1, ta_includes);
    let iterator_sym = cx.well_known().iterator.clone();
    intrinsics::symbol_method(
        cx,
        &base_proto,
        iterator_sym,
        "[Symbol.iterator]",
        0,
        ta_values,
    );
    method(cx, &base_proto, "values", 0, ta_values);

    for kind in TypedArrayKind::all() {
        install_kind(cx, kind);
    }
}

fn install_kind(cx: &mut Context, kind: TypedArrayKind) {
    let proto = cx.intrinsics().typed_array_prototypes[typed_array::kind_slot(kind)].clone();

    let ctor_fn: intrinsics::RawNative = match kind {
        TypedArrayKind::Int8 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::Int8),
        TypedArrayKind::Uint8 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::Uint8),
        TypedArrayKind::Uint8Clamped => {
            |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::Uint8Clamped)
        }
        TypedArrayKind::Int16 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::Int16),
        TypedArrayKind::Uint16 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::Uint16),
        TypedArrayKind::Int32 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::Int32),
        TypedArrayKind::Uint32 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::Uint32),
        TypedArrayKind::Float16 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::Float16),
        TypedArrayKind::Float32 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::Float32),
        TypedArrayKind::Float64 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::Float64),
        TypedArrayKind::BigInt64 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::BigInt64),
        TypedArrayKind::BigUint64 => |cx, t, a| ctor_for(cx, t, a, TypedArrayKind::BigUint64),
    };
    let ctor = intrinsics::install_constructor(cx, kind.name(), 3, &proto, true, ctor_fn);
    let elem_size = Value::number(kind.element_size() as f64);
    let bpe_key = PropertyKey::Atom(cx.atom("BYTES_PER_ELEMENT"));
    ctor.insert_property(bpe_key.clone(), Property::data_with(elem_size.clone(), false, false, false));
    proto.insert_property(bpe_key, Property::data_with(elem_size, false, false, false));
}

fn ctor_for(
    cx: &mut Context,
    _this: &Value,
    args: &[Value],
    kind: TypedArrayKind,
) -> VmResult<Value> {
    match args.first() {
        // new Uint8Array(buffer, byteOffset?, length?)
        Some(Value::Object(obj))
            if matches!(
                obj.kind(),
                ObjectKind::ArrayBuffer(_) | ObjectKind::SharedArrayBuffer(_)
            ) =>
        {
            let byte_offset = match args.get(1) {
                None | Some(Value::Undefined) => 0,
                Some(v) => convert::to_index(cx, v)?,
            };
            let length = match args.get(2) {
                None | Some(Value::Undefined) => None,
                Some(v) => Some(convert::to_index(cx, v)?),
            };
            let view = typed_array::with_buffer(cx, kind, obj.clone(), byte_offset, length)?;
            Ok(Value::Object(view))
        }
        // new Uint8Array(typedArray) / new Uint8Array(arrayLike)
        Some(Value::Object(obj)) => {
            let source = Value::Object(obj.clone());
            let values: Vec<Value> = if let ObjectKind::TypedArray(src) = obj.kind() {
                (0..typed_array::view_length(src))
                    .map(|i| typed_array::get_index(src, i))
                    .collect()
            } else {
                let len_value = obj.get(cx, &PropertyKey::Atom(atoms::LENGTH), &source)?;
                let len = convert::to_length(cx, &len_value)? as usize;
                let mut out = Vec::with_capacity(len);
                for i in 0..len {
                    out.push(obj.get(cx, &PropertyKey::Index(i as u32), &source)?);
                }
                out
            };
            let view = typed_array::with_length(cx, kind, values.len());
            let ObjectKind::TypedArray(data) = view.kind() else {
                unreachable!()
            };
            for (i, v) in values.into_iter().enumerate() {
                typed_array::set_index(cx, data, i, v)?;
            }
            Ok(Value::Object(view))
        }
        // new Uint8Array(length?)
        None | Some(Value::Undefined) => {
            Ok(Value::Object(typed_array::with_length(cx, kind, 0)))
        }
        Some(v) => {
            let len = convert::to_index(cx, v)?;
            Ok(Value::Object(typed_array::with_length(cx, kind, len)))
        }
    }
}

fn this_typed_array<'a>(this: &'a Value, op: &str) -> VmResult<&'a TypedArrayData> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::TypedArray(data) => Ok(data),
            _ => Err(VmError::type_error(format!(
                "%TypedArray%.prototype.{op} called on incompatible receiver"
            ))),
        },
        _ => Err(VmError::type_error(format!(
            "%TypedArray%.prototype.{op} called on incompatible receiver"
        ))),
    }
}

fn ta_length(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(
        typed_array::view_length(this_typed_array(this, "length")?) as f64,
    ))
}

fn ta_byte_length(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(
        typed_array::view_byte_length(this_typed_array(this, "byteLength")?) as f64,
    ))
}

fn ta_byte_offset(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(
        this_typed_array(this, "byteOffset")?.byte_offset() as f64,
    ))
}

fn ta_buffer(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::Object(
        this_typed_array(this, "buffer")?.buffer_object().clone(),
    ))
}

fn ta_fill(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    let len = typed_array::view_length(this_typed_array(this, "fill")?);
    let start = match args.get(1) {
        None | Some(Value::Undefined) => 0,
        Some(v) => relative(convert::to_number(cx, v)?, len),
    };
    let end = match args.get(2) {
        None | Some(Value::Undefined) => len,
        Some(v) => relative(convert::to_number(cx, v)?, len),
    };
    for i in start..end {
        let data = this_typed_array(this, "fill")?;
        typed_array::set_index(cx, data, i, value.clone())?;
    }
    Ok(this.clone())
}

fn relative(n: f64, len: usize) -> usize {
    if n < 0.0 {
        ((len as f64 + n).max(0.0)) as usize
    } else {
        (n as usize).min(len)
    }
}

fn ta_set(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let source = args.first().cloned().unwrap_or(Value::Undefined);
    let offset = match args.get(1) {
        None | Some(Value::Undefined) => 0,
        Some(v) => convert::to_index(cx, v)?,
    };
    let Value::Object(source_obj) = &source else {
        return Err(VmError::type_error("invalid source for %TypedArray%.prototype.set"));
    };
    let values: Vec<Value> = if let ObjectKind::TypedArray(src) = source_obj.kind() {
        (0..typed_array::view_length(src))
            .map(|i| typed_array::get_index(src, i))
            .collect()
    } else {
        let len_value = source_obj.get(cx, &PropertyKey::Atom(atoms::LENGTH), &source)?;
        let len = convert::to_length(cx, &len_value)? as usize;
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            out.push(source_obj.get(cx, &PropertyKey::Index(i as u32), &source)?);
        }
        out
    };
    {
        let data = this_typed_array(this, "set")?;
        if offset + values.len() > typed_array::view_length(data) {
            return Err(VmError::range_error("offset is out of bounds"));
        }
    }
    for (i, v) in values.into_iter().enumerate() {
        let data = this_typed_array(this, "set")?;
        typed_array::set_index(cx, data, offset + i, v)?;
    }
    Ok(Value::Undefined)
}

fn ta_subarray(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let (kind, buffer, byte_offset, len) = {
        let data = this_typed_array(this, "subarray")?;
        (
            data.kind(),
            data.buffer_object().clone(),
            data.byte_offset(),
            typed_array::view_length(data),
        )
    };
    let start = match args.first() {
        None | Some(Value::Undefined) => 0,
        Some(v) => relative(convert::to_number(cx, v)?, len),
    };
    let end = match args.get(1) {
        None | Some(Value::Undefined) => len,
        Some(v) => relative(convert::to_number(cx, v)?, len),
    };
    let new_len = end.saturating_sub(start);
    let view = typed_array::with_buffer(
        cx,
        kind,
        buffer,
        byte_offset + start * kind.element_size(),
        Some(new_len),
    )?;
    Ok(Value::Object(view))
}

fn ta_at(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_typed_array(this, "at")?;
    let len = typed_array::view_length(data) as f64;
    let n = convert::to_number(cx, args.first().unwrap_or(&Value::Undefined))?;
    let index = if n < 0.0 { len + n } else { n };
    if index < 0.0 || index >= len {
        return Ok(Value::Undefined);
    }
    let data = this_typed_array(this, "at")?;
    Ok(typed_array::get_index(data, index as usize))
}

fn ta_index_of(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_typed_array(this, "indexOf")?;
    let needle = args.first().cloned().unwrap_or(Value::Undefined);
    for i in 0..typed_array::view_length(data) {
        if typed_array::get_index(data, i).strict_equals(&needle) {
            return Ok(Value::number(i as f64));
        }
    }
    Ok(Value::number(-1.0))
}

fn ta_includes(_cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let data = this_typed_array(this, "includes")?;
    let needle = args.first().cloned().unwrap_or(Value::Undefined);
    for i in 0..typed_array::view_length(data) {
        if typed_array::get_index(data, i).same_value_zero(&needle) {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

fn ta_values(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    this_typed_array(this, "values")?;
    crate::intrinsics::array::array_values_native(cx, this, &[])
}
