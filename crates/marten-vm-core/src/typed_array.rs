//! TypedArray integer-indexed exotic behavior
//!
//! Views over `ArrayBuffer`/`SharedArrayBuffer`. Indexed elements are never
//! stored in the property store; they are synthesized from the backing
//! buffer with the fixed shape `{writable, enumerable, configurable}`.
//! Numeric conversion runs *before* the detach/out-of-bounds check — a
//! `valueOf` can detach the buffer mid-write, and the write must then be
//! silently dropped. Length-tracking views on resizable buffers recompute
//! their length on every access.

use half::f16;
use marten_vm_gc::GcRef;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyDescriptor};
use crate::value::Value;

/// Element type of a typed array view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArrayKind {
    /// `Int8Array`
    Int8,
    /// `Uint8Array`
    Uint8,
    /// `Uint8ClampedArray`
    Uint8Clamped,
    /// `Int16Array`
    Int16,
    /// `Uint16Array`
    Uint16,
    /// `Int32Array`
    Int32,
    /// `Uint32Array`
    Uint32,
    /// `Float16Array`
    Float16,
    /// `Float32Array`
    Float32,
    /// `Float64Array`
    Float64,
    /// `BigInt64Array`
    BigInt64,
    /// `BigUint64Array`
    BigUint64,
}

impl TypedArrayKind {
    /// Bytes per element.
    pub fn element_size(&self) -> usize {
        match self {
            TypedArrayKind::Int8 | TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => 1,
            TypedArrayKind::Int16 | TypedArrayKind::Uint16 | TypedArrayKind::Float16 => 2,
            TypedArrayKind::Int32 | TypedArrayKind::Uint32 | TypedArrayKind::Float32 => 4,
            TypedArrayKind::Float64 | TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => 8,
        }
    }

    /// Constructor name.
    pub fn name(&self) -> &'static str {
        match self {
            TypedArrayKind::Int8 => "Int8Array",
            TypedArrayKind::Uint8 => "Uint8Array",
            TypedArrayKind::Uint8Clamped => "Uint8ClampedArray",
            TypedArrayKind::Int16 => "Int16Array",
            TypedArrayKind::Uint16 => "Uint16Array",
            TypedArrayKind::Int32 => "Int32Array",
            TypedArrayKind::Uint32 => "Uint32Array",
            TypedArrayKind::Float16 => "Float16Array",
            TypedArrayKind::Float32 => "Float32Array",
            TypedArrayKind::Float64 => "Float64Array",
            TypedArrayKind::BigInt64 => "BigInt64Array",
            TypedArrayKind::BigUint64 => "BigUint64Array",
        }
    }

    /// Whether elements are BigInts.
    pub fn is_bigint(&self) -> bool {
        matches!(self, TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64)
    }

    /// All kinds, in installation order.
    pub fn all() -> [TypedArrayKind; 12] {
        [
            TypedArrayKind::Int8,
            TypedArrayKind::Uint8,
            TypedArrayKind::Uint8Clamped,
            TypedArrayKind::Int16,
            TypedArrayKind::Uint16,
            TypedArrayKind::Int32,
            TypedArrayKind::Uint32,
            TypedArrayKind::Float16,
            TypedArrayKind::Float32,
            TypedArrayKind::Float64,
            TypedArrayKind::BigInt64,
            TypedArrayKind::BigUint64,
        ]
    }
}

/// Internal slots of a typed array view.
#[derive(Debug)]
pub struct TypedArrayData {
    /// The `ArrayBuffer` or `SharedArrayBuffer` object backing the view.
    buffer: GcRef<JsObject>,
    kind: TypedArrayKind,
    byte_offset: usize,
    /// `None` for length-tracking views on resizable buffers.
    length: Option<usize>,
}

impl TypedArrayData {
    /// Create a view; bounds and alignment must already be validated.
    pub fn new(
        buffer: GcRef<JsObject>,
        kind: TypedArrayKind,
        byte_offset: usize,
        length: Option<usize>,
    ) -> Self {
        Self {
            buffer,
            kind,
            byte_offset,
            length,
        }
    }

    /// The element type.
    pub fn kind(&self) -> TypedArrayKind {
        self.kind
    }

    /// The backing buffer object.
    pub fn buffer_object(&self) -> &GcRef<JsObject> {
        &self.buffer
    }

    /// Byte offset into the buffer.
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// Whether this is a length-tracking view.
    pub fn is_length_tracking(&self) -> bool {
        self.length.is_none()
    }

    fn buffer_byte_length(&self) -> Option<usize> {
        match self.buffer.kind() {
            ObjectKind::ArrayBuffer(ab) => {
                if ab.is_detached() {
                    None
                } else {
                    Some(ab.byte_length())
                }
            }
            ObjectKind::SharedArrayBuffer(sab) => Some(sab.byte_length()),
            _ => None,
        }
    }

    fn read_raw(&self, byte_index: usize, dest: &mut [u8]) -> bool {
        match self.buffer.kind() {
            ObjectKind::ArrayBuffer(ab) => ab.read_bytes(byte_index, dest),
            ObjectKind::SharedArrayBuffer(sab) => sab.read_bytes(byte_index, dest),
            _ => false,
        }
    }

    fn write_raw(&self, byte_index: usize, src: &[u8]) -> bool {
        match self.buffer.kind() {
            ObjectKind::ArrayBuffer(ab) => ab.write_bytes(byte_index, src),
            ObjectKind::SharedArrayBuffer(sab) => sab.write_bytes(byte_index, src),
            _ => false,
        }
    }
}

/// Current element count, recomputed on every access for length-tracking
/// views. A detached buffer or an out-of-bounds fixed view answers 0.
pub fn view_length(ta: &TypedArrayData) -> usize {
    let Some(buffer_len) = ta.buffer_byte_length() else {
        return 0;
    };
    let elem = ta.kind.element_size();
    match ta.length {
        Some(len) => {
            if ta.byte_offset + len * elem <= buffer_len {
                len
            } else {
                0
            }
        }
        None => buffer_len.saturating_sub(ta.byte_offset) / elem,
    }
}

/// Current byte length of the view.
pub fn view_byte_length(ta: &TypedArrayData) -> usize {
    view_length(ta) * ta.kind.element_size()
}

/// Whether index `i` is within the current bounds.
pub fn in_bounds(ta: &TypedArrayData, i: usize) -> bool {
    i < view_length(ta)
}

/// `[[Get]]` for a canonical numeric index: element bytes reinterpreted via
/// the element type; out-of-bounds reads are `undefined` and never consult
/// the prototype chain.
pub fn get_index(ta: &TypedArrayData, i: usize) -> Value {
    if !in_bounds(ta, i) {
        return Value::Undefined;
    }
    let elem = ta.kind.element_size();
    let byte_index = ta.byte_offset + i * elem;
    let mut raw = [0u8; 8];
    if !ta.read_raw(byte_index, &mut raw[..elem]) {
        return Value::Undefined;
    }
    match ta.kind {
        TypedArrayKind::Int8 => Value::number(raw[0] as i8 as f64),
        TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => Value::number(raw[0] as f64),
        TypedArrayKind::Int16 => Value::number(i16::from_le_bytes([raw[0], raw[1]]) as f64),
        TypedArrayKind::Uint16 => Value::number(u16::from_le_bytes([raw[0], raw[1]]) as f64),
        TypedArrayKind::Int32 => {
            Value::number(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64)
        }
        TypedArrayKind::Uint32 => {
            Value::number(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64)
        }
        TypedArrayKind::Float16 => {
            Value::number(f16::from_le_bytes([raw[0], raw[1]]).to_f64())
        }
        TypedArrayKind::Float32 => {
            Value::number(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64)
        }
        TypedArrayKind::Float64 => Value::number(f64::from_le_bytes(raw)),
        TypedArrayKind::BigInt64 => Value::bigint(BigInt::from(i64::from_le_bytes(raw))),
        TypedArrayKind::BigUint64 => Value::bigint(BigInt::from(u64::from_le_bytes(raw))),
    }
}

/// `[[Set]]` for a canonical numeric index. Conversion happens before the
/// detach/bounds check; an out-of-bounds or detached write is silently
/// ignored.
pub fn set_index(cx: &mut Context, ta: &TypedArrayData, i: usize, value: Value) -> VmResult<()> {
    let raw = element_bytes(cx, ta.kind, &value)?;
    write_element(ta, i, raw);
    Ok(())
}

/// `[[DefineOwnProperty]]` for a canonical numeric index: only data
/// descriptors compatible with the fixed `{writable, enumerable,
/// configurable}` shape are accepted.
pub fn define_index(
    cx: &mut Context,
    ta: &TypedArrayData,
    i: usize,
    desc: PropertyDescriptor,
) -> VmResult<bool> {
    if desc.is_accessor()
        || desc.writable == Some(false)
        || desc.enumerable == Some(false)
        || desc.configurable == Some(false)
    {
        return Ok(false);
    }
    if let Some(value) = desc.value {
        let raw = element_bytes(cx, ta.kind, &value)?;
        if !in_bounds(ta, i) {
            return Ok(false);
        }
        write_element(ta, i, raw);
        return Ok(true);
    }
    Ok(in_bounds(ta, i))
}

/// Synthesize the own-property view of element `i`.
pub fn element_property(ta: &TypedArrayData, i: usize) -> Option<Property> {
    if !in_bounds(ta, i) {
        return None;
    }
    Some(Property::Data {
        value: get_index(ta, i),
        writable: true,
        enumerable: true,
        configurable: true,
    })
}

fn write_element(ta: &TypedArrayData, i: usize, raw: [u8; 8]) {
    // Detach/bounds are re-checked *after* conversion.
    if !in_bounds(ta, i) {
        return;
    }
    let elem = ta.kind.element_size();
    let byte_index = ta.byte_offset + i * elem;
    ta.write_raw(byte_index, &raw[..elem]);
}

/// Convert `value` to the element's raw little-endian bytes.
pub fn element_bytes(cx: &mut Context, kind: TypedArrayKind, value: &Value) -> VmResult<[u8; 8]> {
    let mut raw = [0u8; 8];
    if kind.is_bigint() {
        let b = convert::to_bigint(cx, value)?;
        match kind {
            TypedArrayKind::BigInt64 => {
                raw = (wrap_to_u64(&b) as i64).to_le_bytes();
            }
            TypedArrayKind::BigUint64 => {
                raw = wrap_to_u64(&b).to_le_bytes();
            }
            _ => unreachable!(),
        }
        return Ok(raw);
    }
    let n = convert::to_number(cx, value)?;
    match kind {
        TypedArrayKind::Int8 => raw[..1].copy_from_slice(&(convert::to_int32(n) as i8).to_le_bytes()),
        TypedArrayKind::Uint8 => {
            raw[..1].copy_from_slice(&(convert::to_uint32(n) as u8).to_le_bytes())
        }
        TypedArrayKind::Uint8Clamped => raw[0] = clamp_u8(n),
        TypedArrayKind::Int16 => {
            raw[..2].copy_from_slice(&(convert::to_int32(n) as i16).to_le_bytes())
        }
        TypedArrayKind::Uint16 => {
            raw[..2].copy_from_slice(&(convert::to_uint32(n) as u16).to_le_bytes())
        }
        TypedArrayKind::Int32 => raw[..4].copy_from_slice(&convert::to_int32(n).to_le_bytes()),
        TypedArrayKind::Uint32 => raw[..4].copy_from_slice(&convert::to_uint32(n).to_le_bytes()),
        TypedArrayKind::Float16 => raw[..2].copy_from_slice(&f16::from_f64(n).to_le_bytes()),
        TypedArrayKind::Float32 => raw[..4].copy_from_slice(&(n as f32).to_le_bytes()),
        TypedArrayKind::Float64 => raw.copy_from_slice(&n.to_le_bytes()),
        TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => unreachable!(),
    }
    Ok(raw)
}

/// ToUint8Clamp: clamp to [0, 255] with round-half-to-even.
fn clamp_u8(n: f64) -> u8 {
    if n.is_nan() {
        return 0;
    }
    if n <= 0.0 {
        return 0;
    }
    if n >= 255.0 {
        return 255;
    }
    let floor = n.floor();
    let frac = n - floor;
    let rounded = if frac < 0.5 {
        floor
    } else if frac > 0.5 {
        floor + 1.0
    } else if (floor as u64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    };
    rounded as u8
}

/// BigInt modulo 2^64 with sign handling.
fn wrap_to_u64(b: &BigInt) -> u64 {
    let modulus = BigInt::from(1u128 << 64);
    let mut m = b % &modulus;
    if m.sign() == num_bigint::Sign::Minus {
        m += &modulus;
    }
    m.to_u64().unwrap_or(0)
}

/// Allocate a typed array over a fresh zeroed buffer.
pub fn with_length(cx: &mut Context, kind: TypedArrayKind, length: usize) -> GcRef<JsObject> {
    let buffer = JsObject::new(
        ObjectKind::ArrayBuffer(crate::array_buffer::ArrayBufferData::new(
            length * kind.element_size(),
        )),
        Some(cx.intrinsics().array_buffer_prototype.clone()),
    );
    let proto = cx.intrinsics().typed_array_prototypes[kind_slot(kind)].clone();
    JsObject::new(
        ObjectKind::TypedArray(TypedArrayData::new(buffer, kind, 0, Some(length))),
        Some(proto),
    )
}

/// Allocate a view over an existing buffer object, validating alignment and
/// bounds. `length = None` makes the view length-tracking.
pub fn with_buffer(
    cx: &mut Context,
    kind: TypedArrayKind,
    buffer: GcRef<JsObject>,
    byte_offset: usize,
    length: Option<usize>,
) -> VmResult<GcRef<JsObject>> {
    let elem = kind.element_size();
    if byte_offset % elem != 0 {
        return Err(VmError::range_error(format!(
            "start offset of {} should be a multiple of {elem}",
            kind.name()
        )));
    }
    let buffer_len = match buffer.kind() {
        ObjectKind::ArrayBuffer(ab) => {
            if ab.is_detached() {
                return Err(VmError::type_error("Cannot construct view on detached ArrayBuffer"));
            }
            ab.byte_length()
        }
        ObjectKind::SharedArrayBuffer(sab) => sab.byte_length(),
        _ => return Err(VmError::type_error("First argument must be an ArrayBuffer")),
    };
    if let Some(len) = length {
        if byte_offset + len * elem > buffer_len {
            return Err(VmError::range_error("Invalid typed array length"));
        }
    } else if byte_offset > buffer_len {
        return Err(VmError::range_error("Start offset is outside the bounds of the buffer"));
    }
    let proto = cx.intrinsics().typed_array_prototypes[kind_slot(kind)].clone();
    Ok(JsObject::new(
        ObjectKind::TypedArray(TypedArrayData::new(buffer, kind, byte_offset, length)),
        Some(proto),
    ))
}

/// Stable slot index for per-kind intrinsic tables.
pub fn kind_slot(kind: TypedArrayKind) -> usize {
    TypedArrayKind::all()
        .iter()
        .position(|k| *k == kind)
        .expect("kind is in the table")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_u8() {
        assert_eq!(clamp_u8(f64::NAN), 0);
        assert_eq!(clamp_u8(-5.0), 0);
        assert_eq!(clamp_u8(300.0), 255);
        assert_eq!(clamp_u8(2.5), 2); // ties to even
        assert_eq!(clamp_u8(3.5), 4);
        assert_eq!(clamp_u8(42.2), 42);
    }

    #[test]
    fn test_wrap_to_u64() {
        assert_eq!(wrap_to_u64(&BigInt::from(-1)), u64::MAX);
        assert_eq!(wrap_to_u64(&BigInt::from(5)), 5);
        let big = BigInt::from(1u128 << 64) + 7;
        assert_eq!(wrap_to_u64(&big), 7);
    }

    #[test]
    fn test_kind_slots_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for kind in TypedArrayKind::all() {
            assert!(seen.insert(kind_slot(kind)));
        }
    }
}
