//! `ArrayBuffer`, `SharedArrayBuffer`, and `DataView`

use marten_vm_gc::GcRef;

use crate::array_buffer::ArrayBufferData;
use crate::context::Context;
use crate::convert;
use crate::data_view::DataViewData;
use crate::error::{VmError, VmResult};
use crate::intrinsics::{self, getter, method};
use crate::object::{JsObject, ObjectKind};
use crate::property::PropertyKey;
use crate::shared_buffer::SharedBufferData;
use crate::typed_array::TypedArrayKind;
use crate::value::Value;

/// Install the buffer family.
pub fn install(cx: &mut Context) {
    let ab_proto = cx.intrinsics().array_buffer_prototype.clone();
    getter(cx, &ab_proto, "byteLength", ab_byte_length);
    getter(cx, &ab_proto, "maxByteLength", ab_max_byte_length);
    getter(cx, &ab_proto, "resizable", ab_resizable);
    getter(cx, &ab_proto, "detached", ab_detached);
    method(cx, &ab_proto, "resize", 1, ab_resize);
    method(cx, &ab_proto, "transfer", 1, ab_transfer);
    method(cx, &ab_proto, "transferToFixedLength", 1, ab_transfer_fixed);
    method(cx, &ab_proto, "slice", 2, ab_slice);
    method(cx, &ab_proto, "detach", 0, ab_detach);
    let ab_ctor =
        intrinsics::install_constructor(cx, "ArrayBuffer", 1, &ab_proto, true, array_buffer_ctor);
    method(cx, &ab_ctor, "isView", 1, ab_is_view);

    let sab_proto = cx.intrinsics().shared_array_buffer_prototype.clone();
    getter(cx, &sab_proto, "byteLength", sab_byte_length);
    getter(cx, &sab_proto, "maxByteLength", sab_max_byte_length);
    getter(cx, &sab_proto, "growable", sab_growable);
    method(cx, &sab_proto, "grow", 1, sab_grow);
    intrinsics::install_constructor(
        cx,
        "SharedArrayBuffer",
        1,
        &sab_proto,
        true,
        shared_array_buffer_ctor,
    );

    let dv_proto = cx.intrinsics().data_view_prototype.clone();
    getter(cx, &dv_proto, "buffer", dv_buffer);
    getter(cx, &dv_proto, "byteLength", dv_byte_length);
    getter(cx, &dv_proto, "byteOffset", dv_byte_offset);
    install_data_view_accessors(cx, &dv_proto);
    intrinsics::install_constructor(cx, "DataView", 1, &dv_proto, true, data_view_ctor);
}

fn option_max_byte_length(cx: &mut Context, args: &[Value]) -> VmResult<Option<usize>> {
    let Some(Value::Object(options)) = args.get(1) else {
        return Ok(None);
    };
    let key = PropertyKey::Atom(cx.atom("maxByteLength"));
    let receiver = Value::Object(options.clone());
    let value = options.get(cx, &key, &receiver)?;
    if value.is_undefined() {
        return Ok(None);
    }
    Ok(Some(convert::to_index(cx, &value)?))
}

fn array_buffer_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let byte_length = convert::to_index(cx, args.first().unwrap_or(&Value::Undefined))?;
    let max = option_max_byte_length(cx, args)?;
    let data = match max {
        Some(max) => {
            if byte_length > max {
                return Err(VmError::range_error(
                    "ArrayBuffer length exceeds maxByteLength",
                ));
            }
            ArrayBufferData::new_resizable(byte_length, max)
        }
        None => ArrayBufferData::new(byte_length),
    };
    Ok(Value::Object(JsObject::new(
        ObjectKind::ArrayBuffer(data),
        Some(cx.intrinsics().array_buffer_prototype.clone()),
    )))
}

fn this_array_buffer<'a>(this: &'a Value, op: &str) -> VmResult<(&'a GcRef<JsObject>, &'a ArrayBufferData)> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::ArrayBuffer(data) => Ok((obj, data)),
            _ => Err(VmError::type_error(format!(
                "ArrayBuffer.prototype.{op} called on incompatible receiver"
            ))),
        },
        _ => Err(VmError::type_error(format!(
            "ArrayBuffer.prototype.{op} called on incompatible receiver"
        ))),
    }
}

fn ab_byte_length(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let (_, data) = this_array_buffer(this, "byteLength")?;
    Ok(Value::number(data.byte_length() as f64))
}

fn ab_max_byte_length(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let (_, data) = this_array_buffer(this, "maxByteLength")?;
    Ok(Value::number(
        data.max_byte_length().unwrap_or(data.byte_length()) as f64,
    ))
}

fn ab_resizable(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let (_, data) = this_array_buffer(this, "resizable")?;
    Ok(Value::Boolean(data.is_resizable()))
}

fn ab_detached(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let (_, data) = this_array_buffer(this, "detached")?;
    Ok(Value::Boolean(data.is_detached()))
}

fn ab_resize(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let new_length = convert::to_index(cx, args.first().unwrap_or(&Value::Undefined))?;
    let (_, data) = this_array_buffer(this, "resize")?;
    data.resize(new_length)?;
    Ok(Value::Undefined)
}

fn ab_detach(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let (_, data) = this_array_buffer(this, "detach")?;
    data.detach();
    Ok(Value::Undefined)
}

fn ab_transfer(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let new_length = match args.first() {
        None | Some(Value::Undefined) => None,
        Some(v) => Some(convert::to_index(cx, v)?),
    };
    let moved = {
        let (_, data) = this_array_buffer(this, "transfer")?;
        data.transfer(new_length)?
    };
    Ok(Value::Object(JsObject::new(
        ObjectKind::ArrayBuffer(moved),
        Some(cx.intrinsics().array_buffer_prototype.clone()),
    )))
}

fn ab_transfer_fixed(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let new_length = match args.first() {
        None | Some(Value::Undefined) => {
            let (_, data) = this_array_buffer(this, "transferToFixedLength")?;
            Some(data.byte_length())
        }
        Some(v) => Some(convert::to_index(cx, v)?),
    };
    let moved = {
        let (_, data) = this_array_buffer(this, "transferToFixedLength")?;
        data.transfer(new_length)?
    };
    Ok(Value::Object(JsObject::new(
        ObjectKind::ArrayBuffer(moved),
        Some(cx.intrinsics().array_buffer_prototype.clone()),
    )))
}

fn ab_slice(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let (_, data) = this_array_buffer(this, "slice")?;
    let len = data.byte_length();
    let start = slice_index(cx, args.first(), 0, len)?;
    let end = slice_index(cx, args.get(1), len, len)?;
    let (_, data) = this_array_buffer(this, "slice")?;
    let copied = data.slice(start, end)?;
    Ok(Value::Object(JsObject::new(
        ObjectKind::ArrayBuffer(copied),
        Some(cx.intrinsics().array_buffer_prototype.clone()),
    )))
}

fn slice_index(
    cx: &mut Context,
    arg: Option<&Value>,
    default: usize,
    len: usize,
) -> VmResult<usize> {
    match arg {
        None | Some(Value::Undefined) => Ok(default),
        Some(v) => {
            let n = convert::to_number(cx, v)?;
            Ok(if n < 0.0 {
                ((len as f64 + n).max(0.0)) as usize
            } else {
                (n as usize).min(len)
            })
        }
    }
}

fn ab_is_view(_cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Boolean(matches!(
        args.first(),
        Some(Value::Object(obj))
            if matches!(obj.kind(), ObjectKind::TypedArray(_) | ObjectKind::DataView(_))
    )))
}

// ---- SharedArrayBuffer ----

fn shared_array_buffer_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let byte_length = convert::to_index(cx, args.first().unwrap_or(&Value::Undefined))?;
    let max = option_max_byte_length(cx, args)?;
    let data = match max {
        Some(max) => {
            if byte_length > max {
                return Err(VmError::range_error(
                    "SharedArrayBuffer length exceeds maxByteLength",
                ));
            }
            SharedBufferData::new_growable(byte_length, max)
        }
        None => SharedBufferData::new(byte_length),
    };
    Ok(Value::Object(JsObject::new(
        ObjectKind::SharedArrayBuffer(data),
        Some(cx.intrinsics().shared_array_buffer_prototype.clone()),
    )))
}

fn this_shared<'a>(this: &'a Value, op: &str) -> VmResult<&'a SharedBufferData> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::SharedArrayBuffer(data) => Ok(data),
            _ => Err(VmError::type_error(format!(
                "SharedArrayBuffer.prototype.{op} called on incompatible receiver"
            ))),
        },
        _ => Err(VmError::type_error(format!(
            "SharedArrayBuffer.prototype.{op} called on incompatible receiver"
        ))),
    }
}

fn sab_byte_length(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(this_shared(this, "byteLength")?.byte_length() as f64))
}

fn sab_max_byte_length(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(
        this_shared(this, "maxByteLength")?.max_byte_length() as f64,
    ))
}

fn sab_growable(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::Boolean(this_shared(this, "growable")?.is_growable()))
}

fn sab_grow(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let new_length = convert::to_index(cx, args.first().unwrap_or(&Value::Undefined))?;
    this_shared(this, "grow")?.grow(new_length)?;
    Ok(Value::Undefined)
}

// ---- DataView ----

fn data_view_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let Some(Value::Object(buffer)) = args.first() else {
        return Err(VmError::type_error(
            "First argument to DataView constructor must be an ArrayBuffer",
        ));
    };
    let buffer_len = match buffer.kind() {
        ObjectKind::ArrayBuffer(ab) => {
            if ab.is_detached() {
                return Err(VmError::type_error(
                    "Cannot construct DataView on a detached ArrayBuffer",
                ));
            }
            ab.byte_length()
        }
        ObjectKind::SharedArrayBuffer(sab) => sab.byte_length(),
        _ => {
            return Err(VmError::type_error(
                "First argument to DataView constructor must be an ArrayBuffer",
            ));
        }
    };
    let byte_offset = match args.get(1) {
        None | Some(Value::Undefined) => 0,
        Some(v) => convert::to_index(cx, v)?,
    };
    if byte_offset > buffer_len {
        return Err(VmError::range_error("Start offset is outside the bounds of the buffer"));
    }
    let byte_length = match args.get(2) {
        None | Some(Value::Undefined) => None,
        Some(v) => {
            let len = convert::to_index(cx, v)?;
            if byte_offset + len > buffer_len {
                return Err(VmError::range_error("Invalid DataView length"));
            }
            Some(len)
        }
    };
    Ok(Value::Object(JsObject::new(
        ObjectKind::DataView(DataViewData::new(buffer.clone(), byte_offset, byte_length)),
        Some(cx.intrinsics().data_view_prototype.clone()),
    )))
}

fn this_data_view<'a>(this: &'a Value, op: &str) -> VmResult<&'a DataViewData> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::DataView(data) => Ok(data),
            _ => Err(VmError::type_error(format!(
                "DataView.prototype.{op} called on incompatible receiver"
            ))),
        },
        _ => Err(VmError::type_error(format!(
            "DataView.prototype.{op} called on incompatible receiver"
        ))),
    }
}

fn dv_buffer(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::Object(
        this_data_view(this, "buffer")?.buffer_object().clone(),
    ))
}

fn dv_byte_length(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(
        this_data_view(this, "byteLength")?.byte_length() as f64,
    ))
}

fn dv_byte_offset(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(
        this_data_view(this, "byteOffset")?.byte_offset() as f64,
    ))
}

macro_rules! data_view_get {
    ($name:ident, $kind:expr) => {
        fn $name(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
            let offset = convert::to_index(cx, args.first().unwrap_or(&Value::Undefined))?;
            let little_endian = args.get(1).map(Value::is_truthy).unwrap_or(false);
            this_data_view(this, "get")?.get_value($kind, offset, little_endian)
        }
    };
}

macro_rules! data_view_set {
    ($name:ident, $kind:expr) => {
        fn $name(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
            let offset = convert::to_index(cx, args.first().unwrap_or(&Value::Undefined))?;
            let value = args.get(1).cloned().unwrap_or(Value::Undefined);
            let little_endian = args.get(2).map(Value::is_truthy).unwrap_or(false);
            let raw = crate::typed_array::element_bytes(cx, $kind, &value)?;
            this_data_view(this, "set")?.set_raw($kind, offset, raw, little_endian)?;
            Ok(Value::Undefined)
        }
    };
}

data_view_get!(dv_get_int8, TypedArrayKind::Int8);
data_view_get!(dv_get_uint8, TypedArrayKind::Uint8);
data_view_get!(dv_get_int16, TypedArrayKind::Int16);
data_view_get!(dv_get_uint16, TypedArrayKind::Uint16);
data_view_get!(dv_get_int32, TypedArrayKind::Int32);
data_view_get!(dv_get_uint32, TypedArrayKind::Uint32);
data_view_get!(dv_get_float16, TypedArrayKind::Float16);
data_view_get!(dv_get_float32, TypedArrayKind::Float32);
data_view_get!(dv_get_float64, TypedArrayKind::Float64);
data_view_get!(dv_get_big_int64, TypedArrayKind::BigInt64);
data_view_get!(dv_get_big_uint64, TypedArrayKind::BigUint64);

data_view_set!(dv_set_int8, TypedArrayKind::Int8);
data_view_set!(dv_set_uint8, TypedArrayKind::Uint8);
data_view_set!(dv_set_int16, TypedArrayKind::Int16);
data_view_set!(dv_set_uint16, TypedArrayKind::Uint16);
data_view_set!(dv_set_int32, TypedArrayKind::Int32);
data_view_set!(dv_set_uint32, TypedArrayKind::Uint32);
data_view_set!(dv_set_float16, TypedArrayKind::Float16);
data_view_set!(dv_set_float32, TypedArrayKind::Float32);
data_view_set!(dv_set_float64, TypedArrayKind::Float64);
data_view_set!(dv_set_big_int64, TypedArrayKind::BigInt64);
data_view_set!(dv_set_big_uint64, TypedArrayKind::BigUint64);

fn install_data_view_accessors(cx: &mut Context, proto: &GcRef<JsObject>) {
    method(cx, proto, "getInt8", 1, dv_get_int8);
    method(cx, proto, "getUint8", 1, dv_get_uint8);
    method(cx, proto, "getInt16", 1, dv_get_int16);
    method(cx, proto, "getUint16", 1, dv_get_uint16);
    method(cx, proto, "getInt32", 1, dv_get_int32);
    method(cx, proto, "getUint32", 1, dv_get_uint32);
    method(cx, proto, "getFloat16", 1, dv_get_float16);
    method(cx, proto, "getFloat32", 1, dv_get_float32);
    method(cx, proto, "getFloat64", 1, dv_get_float64);
    method(cx, proto, "getBigInt64", 1, dv_get_big_int64);
    method(cx, proto, "getBigUint64", 1, dv_get_big_uint64);
    method(cx, proto, "setInt8", 2, dv_set_int8);
    method(cx, proto, "setUint8", 2, dv_set_uint8);
    method(cx, proto, "setInt16", 2, dv_set_int16);
    method(cx, proto, "setUint16", 2, dv_set_uint16);
    method(cx, proto, "setInt32", 2, dv_set_int32);
    method(cx, proto, "setUint32", 2, dv_set_uint32);
    method(cx, proto, "setFloat16", 2, dv_set_float16);
    method(cx, proto, "setFloat32", 2, dv_set_float32);
    method(cx, proto, "setFloat64", 2, dv_set_float64);
    method(cx, proto, "setBigInt64", 2, dv_set_big_int64);
    method(cx, proto, "setBigUint64", 2, dv_set_big_uint64);
}
