//! SharedArrayBuffer internal slots
//!
//! The backing store may be reached from several threads at once, so it is a
//! word-aligned atomic region allocated at `maxByteLength` up front; `grow`
//! only advances the visible length (bytes are pre-zeroed). `Atomics`
//! accesses go through width-specific atomic ops; `wait`/`notify` use a
//! futex-like rendezvous keyed by byte offset.

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{VmError, VmResult};

struct WaitQueue {
    lock: Mutex<()>,
    condvar: Condvar,
    generation: AtomicUsize,
}

/// Shared storage: a fixed atomic allocation plus the visible length.
pub struct SharedBytes {
    /// Word storage; byte views are carved out of it. 8-byte alignment makes
    /// every in-bounds aligned access of width 1/2/4/8 legal.
    words: Box<[AtomicU64]>,
    byte_length: AtomicUsize,
    max_byte_length: usize,
    waiters: Mutex<FxHashMap<usize, Arc<WaitQueue>>>,
}

impl SharedBytes {
    fn byte_ptr(&self) -> *const AtomicU8 {
        self.words.as_ptr() as *const AtomicU8
    }

    fn check(&self, offset: usize, width: usize) -> VmResult<()> {
        if offset % width != 0 {
            return Err(VmError::range_error("unaligned atomic access"));
        }
        if offset + width > self.byte_length.load(Ordering::SeqCst) {
            return Err(VmError::range_error("atomic access out of bounds"));
        }
        Ok(())
    }
}

/// Internal slots of a `SharedArrayBuffer`. Cloning shares the storage.
#[derive(Clone)]
pub struct SharedBufferData {
    bytes: Arc<SharedBytes>,
    growable: bool,
}

impl SharedBufferData {
    /// A fixed-length shared buffer.
    pub fn new(byte_length: usize) -> Self {
        Self::with_max(byte_length, byte_length, false)
    }

    /// A growable shared buffer (`{maxByteLength}` option).
    pub fn new_growable(byte_length: usize, max_byte_length: usize) -> Self {
        Self::with_max(byte_length, max_byte_length, true)
    }

    fn with_max(byte_length: usize, max_byte_length: usize, growable: bool) -> Self {
        let words = (max_byte_length + 7) / 8;
        let storage: Vec<AtomicU64> = (0..words).map(|_| AtomicU64::new(0)).collect();
        Self {
            bytes: Arc::new(SharedBytes {
                words: storage.into_boxed_slice(),
                byte_length: AtomicUsize::new(byte_length),
                max_byte_length,
                waiters: Mutex::new(FxHashMap::default()),
            }),
            growable,
        }
    }

    /// Current byte length.
    pub fn byte_length(&self) -> usize {
        self.bytes.byte_length.load(Ordering::SeqCst)
    }

    /// `maxByteLength`.
    pub fn max_byte_length(&self) -> usize {
        self.bytes.max_byte_length
    }

    /// Whether `grow` is available.
    pub fn is_growable(&self) -> bool {
        self.growable
    }

    /// Identity of the shared storage (the rendezvous key space).
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.bytes) as usize
    }

    /// `SharedArrayBuffer.prototype.grow` — length only ever increases.
    pub fn grow(&self, new_length: usize) -> VmResult<()> {
        if !self.growable {
            return Err(VmError::type_error("SharedArrayBuffer is not growable"));
        }
        if new_length > self.bytes.max_byte_length {
            return Err(VmError::range_error("grow exceeds maxByteLength"));
        }
        let current = self.bytes.byte_length.load(Ordering::SeqCst);
        if new_length < current {
            return Err(VmError::range_error("SharedArrayBuffer cannot shrink"));
        }
        self.bytes.byte_length.store(new_length, Ordering::SeqCst);
        Ok(())
    }

    /// Plain (non-atomic-width) byte read.
    pub fn read_bytes(&self, offset: usize, dest: &mut [u8]) -> bool {
        if offset + dest.len() > self.byte_length() {
            return false;
        }
        for (i, out) in dest.iter_mut().enumerate() {
            // SAFETY: in-bounds byte view of the word storage.
            let byte = unsafe { &*self.bytes.byte_ptr().add(offset + i) };
            *out = byte.load(Ordering::Relaxed);
        }
        true
    }

    /// Plain byte write.
    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> bool {
        if offset + src.len() > self.byte_length() {
            return false;
        }
        for (i, b) in src.iter().enumerate() {
            // SAFETY: in-bounds byte view of the word storage.
            let byte = unsafe { &*self.bytes.byte_ptr().add(offset + i) };
            byte.store(*b, Ordering::Relaxed);
        }
        true
    }

    /// Sequentially consistent load of an aligned lane.
    pub fn atomic_load(&self, offset: usize, width: usize) -> VmResult<u64> {
        self.bytes.check(offset, width)?;
        let ptr = self.bytes.byte_ptr();
        // SAFETY: offset is aligned and in bounds; the storage is 8-aligned,
        // so the cast target is a valid atomic of the requested width.
        unsafe {
            Ok(match width {
                1 => (*ptr.add(offset)).load(Ordering::SeqCst) as u64,
                2 => (*(ptr.add(offset) as *const AtomicU16)).load(Ordering::SeqCst) as u64,
                4 => (*(ptr.add(offset) as *const AtomicU32)).load(Ordering::SeqCst) as u64,
                8 => (*(ptr.add(offset) as *const AtomicU64)).load(Ordering::SeqCst),
                _ => return Err(VmError::internal("bad atomic width")),
            })
        }
    }

    /// Sequentially consistent store of an aligned lane.
    pub fn atomic_store(&self, offset: usize, width: usize, value: u64) -> VmResult<()> {
        self.bytes.check(offset, width)?;
        let ptr = self.bytes.byte_ptr();
        // SAFETY: as in `atomic_load`.
        unsafe {
            match width {
                1 => (*ptr.add(offset)).store(value as u8, Ordering::SeqCst),
                2 => (*(ptr.add(offset) as *const AtomicU16)).store(value as u16, Ordering::SeqCst),
                4 => (*(ptr.add(offset) as *const AtomicU32)).store(value as u32, Ordering::SeqCst),
                8 => (*(ptr.add(offset) as *const AtomicU64)).store(value, Ordering::SeqCst),
                _ => return Err(VmError::internal("bad atomic width")),
            }
        }
        Ok(())
    }

    /// Read-modify-write. `op` receives the old lane value and produces the
    /// new one; the old value is returned.
    pub fn atomic_rmw(
        &self,
        offset: usize,
        width: usize,
        op: impl Fn(u64) -> u64,
    ) -> VmResult<u64> {
        self.bytes.check(offset, width)?;
        let ptr = self.bytes.byte_ptr();
        // SAFETY: as in `atomic_load`; CAS loops keep the op atomic.
        unsafe {
            Ok(match width {
                1 => {
                    let a = &*ptr.add(offset);
                    loop {
                        let old = a.load(Ordering::SeqCst);
                        let new = op(old as u64) as u8;
                        if a.compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst).is_ok()
                        {
                            break old as u64;
                        }
                    }
                }
                2 => {
                    let a = &*(ptr.add(offset) as *const AtomicU16);
                    loop {
                        let old = a.load(Ordering::SeqCst);
                        let new = op(old as u64) as u16;
                        if a.compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst).is_ok()
                        {
                            break old as u64;
                        }
                    }
                }
                4 => {
                    let a = &*(ptr.add(offset) as *const AtomicU32);
                    loop {
                        let old = a.load(Ordering::SeqCst);
                        let new = op(old as u64) as u32;
                        if a.compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst).is_ok()
                        {
                            break old as u64;
                        }
                    }
                }
                8 => {
                    let a = &*(ptr.add(offset) as *const AtomicU64);
                    loop {
                        let old = a.load(Ordering::SeqCst);
                        let new = op(old);
                        if a.compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst).is_ok()
                        {
                            break old;
                        }
                    }
                }
                _ => return Err(VmError::internal("bad atomic width")),
            })
        }
    }

    /// `Atomics.compareExchange`.
    pub fn atomic_compare_exchange(
        &self,
        offset: usize,
        width: usize,
        expected: u64,
        replacement: u64,
    ) -> VmResult<u64> {
        self.atomic_rmw(offset, width, |old| {
            if old == expected { replacement } else { old }
        })
    }

    /// `Atomics.wait` — block until notified or timed out, provided the lane
    /// still holds `expected`.
    pub fn wait(
        &self,
        offset: usize,
        width: usize,
        expected: u64,
        timeout: Option<Duration>,
    ) -> VmResult<&'static str> {
        let current = self.atomic_load(offset, width)?;
        if current != expected {
            return Ok("not-equal");
        }
        let queue = {
            let mut waiters = self.bytes.waiters.lock();
            waiters
                .entry(offset)
                .or_insert_with(|| {
                    Arc::new(WaitQueue {
                        lock: Mutex::new(()),
                        condvar: Condvar::new(),
                        generation: AtomicUsize::new(0),
                    })
                })
                .clone()
        };

        let generation = queue.generation.load(Ordering::SeqCst);
        let mut guard = queue.lock.lock();
        // Re-check under the queue lock so a racing notify is not lost.
        if queue.generation.load(Ordering::SeqCst) != generation {
            return Ok("ok");
        }
        match timeout {
            Some(t) => {
                let result = queue.condvar.wait_for(&mut guard, t);
                if result.timed_out() && queue.generation.load(Ordering::SeqCst) == generation {
                    Ok("timed-out")
                } else {
                    Ok("ok")
                }
            }
            None => {
                queue.condvar.wait(&mut guard);
                Ok("ok")
            }
        }
    }

    /// `Atomics.notify` — wake up to `count` waiters at `offset`.
    pub fn notify(&self, offset: usize, count: u32) -> usize {
        let queue = { self.bytes.waiters.lock().get(&offset).cloned() };
        match queue {
            Some(queue) => {
                let _guard = queue.lock.lock();
                queue.generation.fetch_add(1, Ordering::SeqCst);
                if count == u32::MAX {
                    queue.condvar.notify_all()
                } else {
                    let mut woken = 0;
                    for _ in 0..count {
                        if queue.condvar.notify_one() {
                            woken += 1;
                        }
                    }
                    woken
                }
            }
            None => 0,
        }
    }
}

impl std::fmt::Debug for SharedBufferData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBufferData")
            .field("byte_length", &self.byte_length())
            .field("max_byte_length", &self.max_byte_length())
            .field("growable", &self.growable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_only() {
        let buf = SharedBufferData::new_growable(4, 16);
        assert_eq!(buf.byte_length(), 4);
        buf.grow(8).unwrap();
        assert_eq!(buf.byte_length(), 8);
        assert!(buf.grow(4).is_err());
        assert!(buf.grow(32).is_err());

        let fixed = SharedBufferData::new(4);
        assert!(fixed.grow(8).is_err());
    }

    #[test]
    fn test_atomic_lanes() {
        let buf = SharedBufferData::new(16);
        buf.atomic_store(0, 4, 0xDEAD_BEEF).unwrap();
        assert_eq!(buf.atomic_load(0, 4).unwrap(), 0xDEAD_BEEF);

        buf.atomic_store(8, 8, u64::MAX).unwrap();
        assert_eq!(buf.atomic_load(8, 8).unwrap(), u64::MAX);

        assert!(buf.atomic_load(1, 4).is_err()); // unaligned
        assert!(buf.atomic_load(16, 1).is_err()); // out of bounds
    }

    #[test]
    fn test_rmw_returns_old() {
        let buf = SharedBufferData::new(8);
        buf.atomic_store(0, 4, 10).unwrap();
        let old = buf.atomic_rmw(0, 4, |v| v + 5).unwrap();
        assert_eq!(old, 10);
        assert_eq!(buf.atomic_load(0, 4).unwrap(), 15);
    }

    #[test]
    fn test_compare_exchange() {
        let buf = SharedBufferData::new(8);
        buf.atomic_store(0, 4, 1).unwrap();
        assert_eq!(buf.atomic_compare_exchange(0, 4, 1, 2).unwrap(), 1);
        assert_eq!(buf.atomic_load(0, 4).unwrap(), 2);
        assert_eq!(buf.atomic_compare_exchange(0, 4, 1, 3).unwrap(), 2);
        assert_eq!(buf.atomic_load(0, 4).unwrap(), 2);
    }

    #[test]
    fn test_shared_across_clones() {
        let a = SharedBufferData::new(8);
        let b = a.clone();
        a.write_bytes(0, &[42]);
        let mut out = [0u8];
        b.read_bytes(0, &mut out);
        assert_eq!(out[0], 42);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_wait_not_equal_and_notify() {
        let buf = SharedBufferData::new(8);
        buf.atomic_store(0, 4, 7).unwrap();
        assert_eq!(buf.wait(0, 4, 1, None).unwrap(), "not-equal");
        assert_eq!(buf.notify(0, u32::MAX), 0);
    }

    #[test]
    fn test_wait_timeout() {
        let buf = SharedBufferData::new(8);
        let status = buf
            .wait(0, 4, 0, Some(Duration::from_millis(10)))
            .unwrap();
        assert_eq!(status, "timed-out");
    }

    #[test]
    fn test_cross_thread_notify() {
        let buf = SharedBufferData::new(8);
        let other = buf.clone();
        let waiter = std::thread::spawn(move || {
            other.wait(4, 4, 0, Some(Duration::from_secs(5))).unwrap()
        });
        // Give the waiter time to park, then wake it.
        std::thread::sleep(Duration::from_millis(50));
        buf.notify(4, 1);
        assert_eq!(waiter.join().unwrap(), "ok");
    }
}
