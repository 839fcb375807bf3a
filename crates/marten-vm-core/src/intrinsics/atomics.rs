//! The `Atomics` namespace
//!
//! Width-correct atomic reads/writes/RMWs over `SharedArrayBuffer`-backed
//! integer typed arrays, plus the `wait`/`notify` rendezvous. Non-shared
//! buffers are accepted for everything except `wait`.

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::time::Duration;

use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::intrinsics::{install_namespace, method};
use crate::object::ObjectKind;
use crate::typed_array::{TypedArrayData, TypedArrayKind};
use crate::value::Value;

/// Install `Atomics`.
pub fn install(cx: &mut Context) {
    let atomics = install_namespace(cx, "Atomics");
    method(cx, &atomics, "load", 2, atomics_load);
    method(cx, &atomics, "store", 3, atomics_store);
    method(cx, &atomics, "add", 3, |cx, t, a| rmw(cx, t, a, |old, v| old.wrapping_add(v)));
    method(cx, &atomics, "sub", 3, |cx, t, a| rmw(cx, t, a, |old, v| old.wrapping_sub(v)));
    method(cx, &atomics, "and", 3, |cx, t, a| rmw(cx, t, a, |old, v| old & v));
    method(cx, &atomics, "or", 3, |cx, t, a| rmw(cx, t, a, |old, v| old | v));
    method(cx, &atomics, "xor", 3, |cx, t, a| rmw(cx, t, a, |old, v| old ^ v));
    method(cx, &atomics, "exchange", 3, |cx, t, a| rmw(cx, t, a, |_old, v| v));
    method(cx, &atomics, "compareExchange", 4, atomics_compare_exchange);
    method(cx, &atomics, "isLockFree", 1, atomics_is_lock_free);
    method(cx, &atomics, "wait", 4, atomics_wait);
    method(cx, &atomics, "notify", 3, atomics_notify);
}

struct Access<'a> {
    ta: &'a TypedArrayData,
    kind: TypedArrayKind,
    byte_offset: usize,
    width: usize,
}

fn integer_access<'a>(
    cx: &mut Context,
    args: &'a [Value],
    op: &str,
) -> VmResult<Access<'a>> {
    let Some(Value::Object(obj)) = args.first() else {
        return Err(VmError::type_error(format!(
            "Atomics.{op} called with non-typed-array"
        )));
    };
    let ObjectKind::TypedArray(ta) = obj.kind() else {
        return Err(VmError::type_error(format!(
            "Atomics.{op} called with non-typed-array"
        )));
    };
    let kind = ta.kind();
    if matches!(
        kind,
        TypedArrayKind::Float16 | TypedArrayKind::Float32 | TypedArrayKind::Float64
            | TypedArrayKind::Uint8Clamped
    ) {
        return Err(VmError::type_error(
            "Atomics operations require an integer typed array",
        ));
    }
    let index = convert::to_index(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    if index >= crate::typed_array::view_length(ta) {
        return Err(VmError::range_error("Atomics access out of bounds"));
    }
    let width = kind.element_size();
    Ok(Access {
        ta,
        kind,
        byte_offset: ta.byte_offset() + index * width,
        width,
    })
}

fn lane_to_value(kind: TypedArrayKind, lane: u64) -> Value {
    match kind {
        TypedArrayKind::Int8 => Value::number(lane as u8 as i8 as f64),
        TypedArrayKind::Uint8 => Value::number(lane as u8 as f64),
        TypedArrayKind::Int16 => Value::number(lane as u16 as i16 as f64),
        TypedArrayKind::Uint16 => Value::number(lane as u16 as f64),
        TypedArrayKind::Int32 => Value::number(lane as u32 as i32 as f64),
        TypedArrayKind::Uint32 => Value::number(lane as u32 as f64),
        TypedArrayKind::BigInt64 => Value::bigint(BigInt::from(lane as i64)),
        TypedArrayKind::BigUint64 => Value::bigint(BigInt::from(lane)),
        _ => Value::Undefined,
    }
}

fn value_to_lane(cx: &mut Context, kind: TypedArrayKind, value: &Value) -> VmResult<u64> {
    if kind.is_bigint() {
        let b = convert::to_bigint(cx, value)?;
        let modulus = BigInt::from(1u128 << 64);
        let mut m = (*b).clone() % &modulus;
        if m.sign() == num_bigint::Sign::Minus {
            m += &modulus;
        }
        return Ok(m.to_u64().unwrap_or(0));
    }
    let n = convert::to_number(cx, value)?;
    Ok(match kind {
        TypedArrayKind::Int8 => convert::to_int32(n) as i8 as u8 as u64,
        TypedArrayKind::Uint8 => convert::to_uint32(n) as u8 as u64,
        TypedArrayKind::Int16 => convert::to_int32(n) as i16 as u16 as u64,
        TypedArrayKind::Uint16 => convert::to_uint32(n) as u16 as u64,
        TypedArrayKind::Int32 => convert::to_int32(n) as u32 as u64,
        TypedArrayKind::Uint32 => convert::to_uint32(n) as u64,
        _ => 0,
    })
}

enum Storage<'a> {
    Shared(&'a crate::shared_buffer::SharedBufferData),
    Plain(&'a crate::array_buffer::ArrayBufferData),
}

fn storage<'a>(access: &Access<'a>) -> VmResult<Storage<'a>> {
    match access.ta.buffer_object().kind() {
        ObjectKind::SharedArrayBuffer(sab) => Ok(Storage::Shared(sab)),
        ObjectKind::ArrayBuffer(ab) => {
            if ab.is_detached() {
                return Err(VmError::type_error("ArrayBuffer is detached"));
            }
            Ok(Storage::Plain(ab))
        }
        _ => Err(VmError::internal("typed array without buffer")),
    }
}

fn plain_load(ab: &crate::array_buffer::ArrayBufferData, offset: usize, width: usize) -> u64 {
    let mut raw = [0u8; 8];
    ab.read_bytes(offset, &mut raw[..width]);
    u64::from_le_bytes(raw)
}

fn plain_store(ab: &crate::array_buffer::ArrayBufferData, offset: usize, width: usize, lane: u64) {
    ab.write_bytes(offset, &lane.to_le_bytes()[..width]);
}

fn atomics_load(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let access = integer_access(cx, args, "load")?;
    let lane = match storage(&access)? {
        Storage::Shared(sab) => sab.atomic_load(access.byte_offset, access.width)?,
        Storage::Plain(ab) => plain_load(ab, access.byte_offset, access.width),
    };
    Ok(lane_to_value(access.kind, lane))
}

fn atomics_store(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let value = args.get(2).cloned().unwrap_or(Value::Undefined);
    let access = integer_access(cx, args, "store")?;
    let lane = value_to_lane(cx, access.kind, &value)?;
    let access = integer_access(cx, args, "store")?;
    match storage(&access)? {
        Storage::Shared(sab) => sab.atomic_store(access.byte_offset, access.width, lane)?,
        Storage::Plain(ab) => plain_store(ab, access.byte_offset, access.width, lane),
    }
    Ok(lane_to_value(access.kind, lane))
}

fn rmw(
    cx: &mut Context,
    _this: &Value,
    args: &[Value],
    op: impl Fn(u64, u64) -> u64,
) -> VmResult<Value> {
    let value = args.get(2).cloned().unwrap_or(Value::Undefined);
    let access = integer_access(cx, args, "rmw")?;
    let lane = value_to_lane(cx, access.kind, &value)?;
    let access = integer_access(cx, args, "rmw")?;
    let mask = width_mask(access.width);
    let old = match storage(&access)? {
        Storage::Shared(sab) => {
            sab.atomic_rmw(access.byte_offset, access.width, |old| op(old, lane) & mask)?
        }
        Storage::Plain(ab) => {
            let old = plain_load(ab, access.byte_offset, access.width);
            plain_store(ab, access.byte_offset, access.width, op(old, lane) & mask);
            old
        }
    };
    Ok(lane_to_value(access.kind, old))
}

fn width_mask(width: usize) -> u64 {
    match width {
        1 => 0xFF,
        2 => 0xFFFF,
        4 => 0xFFFF_FFFF,
        _ => u64::MAX,
    }
}

fn atomics_compare_exchange(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let expected_value = args.get(2).cloned().unwrap_or(Value::Undefined);
    let replacement_value = args.get(3).cloned().unwrap_or(Value::Undefined);
    let access = integer_access(cx, args, "compareExchange")?;
    let expected = value_to_lane(cx, access.kind, &expected_value)?;
    let replacement = value_to_lane(cx, access.kind, &replacement_value)?;
    let access = integer_access(cx, args, "compareExchange")?;
    let old = match storage(&access)? {
        Storage::Shared(sab) => sab.atomic_compare_exchange(
            access.byte_offset,
            access.width,
            expected,
            replacement,
        )?,
        Storage::Plain(ab) => {
            let old = plain_load(ab, access.byte_offset, access.width);
            if old == expected {
                plain_store(ab, access.byte_offset, access.width, replacement);
            }
            old
        }
    };
    Ok(lane_to_value(access.kind, old))
}

fn atomics_is_lock_free(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let n = convert::to_number(cx, args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::Boolean(matches!(n as i64, 1 | 2 | 4 | 8)))
}

fn atomics_wait(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let expected_value = args.get(2).cloned().unwrap_or(Value::Undefined);
    let timeout = match args.get(3) {
        None | Some(Value::Undefined) => None,
        Some(v) => {
            let ms = convert::to_number(cx, v)?;
            if ms.is_nan() || ms.is_infinite() {
                None
            } else {
                Some(Duration::from_millis(ms.max(0.0) as u64))
            }
        }
    };
    let access = integer_access(cx, args, "wait")?;
    if !matches!(access.kind, TypedArrayKind::Int32 | TypedArrayKind::BigInt64) {
        return Err(VmError::type_error(
            "Atomics.wait requires an Int32Array or BigInt64Array",
        ));
    }
    let expected = value_to_lane(cx, access.kind, &expected_value)?;
    let access = integer_access(cx, args, "wait")?;
    let Storage::Shared(sab) = storage(&access)? else {
        return Err(VmError::type_error(
            "Atomics.wait requires a SharedArrayBuffer view",
        ));
    };
    let status = sab.wait(access.byte_offset, access.width, expected, timeout)?;
    Ok(Value::string(status))
}

fn atomics_notify(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let count = match args.get(2) {
        None | Some(Value::Undefined) => u32::MAX,
        Some(v) => {
            let n = convert::to_number(cx, v)?;
            if n <= 0.0 { 0 } else { n.min(u32::MAX as f64) as u32 }
        }
    };
    let access = integer_access(cx, args, "notify")?;
    let woken = match storage(&access)? {
        Storage::Shared(sab) => sab.notify(access.byte_offset, count),
        Storage::Plain(_) => 0,
    };
    Ok(Value::number(woken as f64))
}
