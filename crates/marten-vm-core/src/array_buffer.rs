//! ArrayBuffer internal slots
//!
//! The byte store behind `ArrayBuffer` objects. Detaching takes the data
//! out; every view then reads as undefined and ignores writes. Resizable
//! buffers (ES2024) zero-fill newly exposed bytes.

use std::cell::RefCell;

use crate::error::{VmError, VmResult};

/// Internal slots of an `ArrayBuffer`.
#[derive(Debug)]
pub struct ArrayBufferData {
    /// Byte data; `None` once detached.
    data: RefCell<Option<Vec<u8>>>,
    /// `maxByteLength` for resizable buffers.
    max_byte_length: Option<usize>,
}

impl ArrayBufferData {
    /// A fixed-length buffer of zeroed bytes.
    pub fn new(byte_length: usize) -> Self {
        Self {
            data: RefCell::new(Some(vec![0; byte_length])),
            max_byte_length: None,
        }
    }

    /// A resizable buffer (ES2024).
    pub fn new_resizable(byte_length: usize, max_byte_length: usize) -> Self {
        Self {
            data: RefCell::new(Some(vec![0; byte_length])),
            max_byte_length: Some(max_byte_length),
        }
    }

    /// Whether the buffer has been detached.
    pub fn is_detached(&self) -> bool {
        self.data.borrow().is_none()
    }

    /// Set the detached bit, dropping the data.
    pub fn detach(&self) {
        *self.data.borrow_mut() = None;
    }

    /// Current byte length (0 when detached).
    pub fn byte_length(&self) -> usize {
        self.data.borrow().as_ref().map_or(0, |d| d.len())
    }

    /// `maxByteLength` for resizable buffers.
    pub fn max_byte_length(&self) -> Option<usize> {
        self.max_byte_length
    }

    /// Whether this buffer is resizable.
    pub fn is_resizable(&self) -> bool {
        self.max_byte_length.is_some()
    }

    /// `ArrayBuffer.prototype.resize` — newly exposed bytes are zero.
    pub fn resize(&self, new_length: usize) -> VmResult<()> {
        let max = self
            .max_byte_length
            .ok_or_else(|| VmError::type_error("ArrayBuffer is not resizable"))?;
        if new_length > max {
            return Err(VmError::range_error(
                "ArrayBuffer resize exceeds maxByteLength",
            ));
        }
        let mut guard = self.data.borrow_mut();
        let data = guard
            .as_mut()
            .ok_or_else(|| VmError::type_error("ArrayBuffer is detached"))?;
        data.resize(new_length, 0);
        Ok(())
    }

    /// `transfer` — move the bytes out, detaching this buffer.
    pub fn transfer(&self, new_length: Option<usize>) -> VmResult<ArrayBufferData> {
        let mut guard = self.data.borrow_mut();
        let mut data = guard
            .take()
            .ok_or_else(|| VmError::type_error("ArrayBuffer is detached"))?;
        if let Some(len) = new_length {
            data.resize(len, 0);
        }
        Ok(ArrayBufferData {
            data: RefCell::new(Some(data)),
            max_byte_length: if new_length.is_some() {
                None
            } else {
                self.max_byte_length
            },
        })
    }

    /// Copy out `[start, end)`, clamped.
    pub fn slice(&self, start: usize, end: usize) -> VmResult<ArrayBufferData> {
        let guard = self.data.borrow();
        let data = guard
            .as_ref()
            .ok_or_else(|| VmError::type_error("ArrayBuffer is detached"))?;
        let len = data.len();
        let start = start.min(len);
        let end = end.min(len).max(start);
        Ok(ArrayBufferData {
            data: RefCell::new(Some(data[start..end].to_vec())),
            max_byte_length: None,
        })
    }

    /// Read `dest.len()` bytes at `offset`. False on detach or OOB.
    pub fn read_bytes(&self, offset: usize, dest: &mut [u8]) -> bool {
        let guard = self.data.borrow();
        match guard.as_ref() {
            Some(data) if offset + dest.len() <= data.len() => {
                dest.copy_from_slice(&data[offset..offset + dest.len()]);
                true
            }
            _ => false,
        }
    }

    /// Write `src` at `offset`. False on detach or OOB.
    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> bool {
        let mut guard = self.data.borrow_mut();
        match guard.as_mut() {
            Some(data) if offset + src.len() <= data.len() => {
                data[offset..offset + src.len()].copy_from_slice(src);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detach() {
        let buf = ArrayBufferData::new(8);
        assert_eq!(buf.byte_length(), 8);
        buf.detach();
        assert!(buf.is_detached());
        assert_eq!(buf.byte_length(), 0);
        assert!(!buf.write_bytes(0, &[1]));
    }

    #[test]
    fn test_resize_zero_fills() {
        let buf = ArrayBufferData::new_resizable(2, 8);
        assert!(buf.write_bytes(0, &[7, 7]));
        buf.resize(4).unwrap();
        let mut out = [9u8; 4];
        assert!(buf.read_bytes(0, &mut out));
        assert_eq!(out, [7, 7, 0, 0]);
        assert!(buf.resize(16).is_err());
    }

    #[test]
    fn test_transfer_detaches_source() {
        let buf = ArrayBufferData::new(4);
        buf.write_bytes(0, &[1, 2, 3, 4]);
        let moved = buf.transfer(None).unwrap();
        assert!(buf.is_detached());
        let mut out = [0u8; 4];
        assert!(moved.read_bytes(0, &mut out));
        assert_eq!(out, [1, 2, 3, 4]);
        assert!(buf.transfer(None).is_err());
    }

    #[test]
    fn test_transfer_to_fixed_length() {
        let buf = ArrayBufferData::new_resizable(4, 8);
        buf.write_bytes(0, &[1, 2, 3, 4]);
        let moved = buf.transfer(Some(2)).unwrap();
        assert_eq!(moved.byte_length(), 2);
        assert!(!moved.is_resizable());
    }
}
