//! DataView internal slots
//!
//! Arbitrary-width, explicit-endianness access to a buffer. Unlike typed
//! arrays there is no integer-indexed exotic behavior; all access goes
//! through `get*`/`set*` methods.

use half::f16;
use marten_vm_gc::GcRef;
use num_bigint::BigInt;

use crate::error::{VmError, VmResult};
use crate::object::{JsObject, ObjectKind};
use crate::typed_array::TypedArrayKind;
use crate::value::Value;

/// Internal slots of a `DataView`.
#[derive(Debug)]
pub struct DataViewData {
    buffer: GcRef<JsObject>,
    byte_offset: usize,
    /// `None` for length-tracking views on resizable buffers.
    byte_length: Option<usize>,
}

impl DataViewData {
    /// Create a view; bounds must already be validated.
    pub fn new(buffer: GcRef<JsObject>, byte_offset: usize, byte_length: Option<usize>) -> Self {
        Self {
            buffer,
            byte_offset,
            byte_length,
        }
    }

    /// The backing buffer object.
    pub fn buffer_object(&self) -> &GcRef<JsObject> {
        &self.buffer
    }

    /// Byte offset into the buffer.
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// Current byte length; length-tracking views recompute from the buffer.
    pub fn byte_length(&self) -> usize {
        let buffer_len = match self.buffer.kind() {
            ObjectKind::ArrayBuffer(ab) => {
                if ab.is_detached() {
                    return 0;
                }
                ab.byte_length()
            }
            ObjectKind::SharedArrayBuffer(sab) => sab.byte_length(),
            _ => return 0,
        };
        match self.byte_length {
            Some(len) => {
                if self.byte_offset + len <= buffer_len {
                    len
                } else {
                    0
                }
            }
            None => buffer_len.saturating_sub(self.byte_offset),
        }
    }

    fn check(&self, offset: usize, width: usize) -> VmResult<usize> {
        if let ObjectKind::ArrayBuffer(ab) = self.buffer.kind() {
            if ab.is_detached() {
                return Err(VmError::type_error(
                    "Cannot perform DataView operation on a detached ArrayBuffer",
                ));
            }
        }
        if offset + width > self.byte_length() {
            return Err(VmError::range_error("Offset is outside the bounds of the DataView"));
        }
        Ok(self.byte_offset + offset)
    }

    fn read(&self, byte_index: usize, dest: &mut [u8]) -> bool {
        match self.buffer.kind() {
            ObjectKind::ArrayBuffer(ab) => ab.read_bytes(byte_index, dest),
            ObjectKind::SharedArrayBuffer(sab) => sab.read_bytes(byte_index, dest),
            _ => false,
        }
    }

    fn write(&self, byte_index: usize, src: &[u8]) -> bool {
        match self.buffer.kind() {
            ObjectKind::ArrayBuffer(ab) => ab.write_bytes(byte_index, src),
            ObjectKind::SharedArrayBuffer(sab) => sab.write_bytes(byte_index, src),
            _ => false,
        }
    }

    /// `getInt8`/`getUint16`/... — read one element of `kind` at `offset`.
    pub fn get_value(
        &self,
        kind: TypedArrayKind,
        offset: usize,
        little_endian: bool,
    ) -> VmResult<Value> {
        let width = kind.element_size();
        let base = self.check(offset, width)?;
        let mut raw = [0u8; 8];
        if !self.read(base, &mut raw[..width]) {
            return Err(VmError::range_error("Offset is outside the bounds of the DataView"));
        }
        if !little_endian {
            raw[..width].reverse();
        }
        Ok(match kind {
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
            TypedArrayKind::Float16 => Value::number(f16::from_le_bytes([raw[0], raw[1]]).to_f64()),
            TypedArrayKind::Float32 => {
                Value::number(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64)
            }
            TypedArrayKind::Float64 => Value::number(f64::from_le_bytes(raw)),
            TypedArrayKind::BigInt64 => Value::bigint(BigInt::from(i64::from_le_bytes(raw))),
            TypedArrayKind::BigUint64 => Value::bigint(BigInt::from(u64::from_le_bytes(raw))),
        })
    }

    /// `setInt8`/`setUint16`/... — write raw little-endian element bytes,
    /// swapping for big-endian writes.
    pub fn set_raw(
        &self,
        kind: TypedArrayKind,
        offset: usize,
        mut raw: [u8; 8],
        little_endian: bool,
    ) -> VmResult<()> {
        let width = kind.element_size();
        let base = self.check(offset, width)?;
        if !little_endian {
            raw[..width].reverse();
        }
        if !self.write(base, &raw[..width]) {
            return Err(VmError::range_error("Offset is outside the bounds of the DataView"));
        }
        Ok(())
    }
}
