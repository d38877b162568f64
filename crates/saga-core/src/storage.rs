use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use memmap2::Mmap;

use crate::bail;
use crate::dtype::DType;
use crate::error::{Error, Result};

// Storage — Raw element memory shared by every tensor aliasing it
//
// MEMORY MODEL:
//
//   Storage is a cheap handle around Arc<StorageInner>. Every tensor, slice
//   and open view holds a clone, so the memory lives exactly as long as its
//   longest holder.
//
// DOUBLE BUFFERING:
//
//   A storage holds one or two physical buffers of identical byte size and
//   an active index. A view picks its buffer at open time as
//
//     physical = (index + select) mod num_buffers
//
//   A producer fills the active buffer and calls flip(). Views opened after
//   the flip address the other buffer, and the data written before the flip
//   stays readable with select = -1. There is no scheduling beyond that one
//   index bump.
//
// MAPPED BUFFERS:
//
//   A storage loaded from a tensor file wraps the read-only memory map
//   directly. The first write into such a buffer promotes it to an owned
//   copy, the file is never written through the map.

/// One physical buffer.
enum Buffer {
    Owned(Vec<u8>),
    Mapped { map: Mmap, start: usize, len: usize },
}

impl Buffer {
    fn bytes(&self) -> &[u8] {
        match self {
            Buffer::Owned(v) => v.as_slice(),
            Buffer::Mapped { map, start, len } => &map[*start..*start + *len],
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        if let Buffer::Mapped { .. } = self {
            let owned = self.bytes().to_vec();
            *self = Buffer::Owned(owned);
        }
        match self {
            Buffer::Owned(v) => v.as_mut_slice(),
            Buffer::Mapped { .. } => unreachable!("mapped buffer promoted above"),
        }
    }
}

struct StorageInner {
    dtype: DType,
    /// Bytes per physical buffer.
    size: usize,
    buffers: Vec<RwLock<Buffer>>,
    index: AtomicUsize,
}

/// Shared, typed, optionally double-buffered element memory.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Storage(dtype={}, size={}, buffers={}, index={})",
            self.inner.dtype,
            self.inner.size,
            self.num_buffers(),
            self.index()
        )
    }
}

impl Storage {
    /// Allocate `num_buffers` zeroed buffers of `size` bytes each.
    pub fn new(dtype: DType, size: usize, num_buffers: usize) -> Result<Self> {
        if num_buffers != 1 && num_buffers != 2 {
            return Err(Error::InvalidBufferCount(num_buffers));
        }
        let buffers = (0..num_buffers)
            .map(|_| RwLock::new(Buffer::Owned(vec![0u8; size])))
            .collect();
        Ok(Self::from_buffers(dtype, size, buffers))
    }

    /// Single buffer storage taking ownership of `bytes`.
    pub fn from_bytes(dtype: DType, bytes: Vec<u8>) -> Self {
        let size = bytes.len();
        Self::from_buffers(dtype, size, vec![RwLock::new(Buffer::Owned(bytes))])
    }

    /// Single buffer storage backed by `len` bytes of a read-only map,
    /// starting at byte `start`. The map is owned by the storage.
    pub fn from_mmap(dtype: DType, map: Mmap, start: usize, len: usize) -> Result<Self> {
        let end = start.checked_add(len);
        if end.map_or(true, |end| end > map.len()) {
            bail!(
                "mapped region {start}+{len} exceeds map of {} bytes",
                map.len()
            );
        }
        let buffer = Buffer::Mapped { map, start, len };
        Ok(Self::from_buffers(dtype, len, vec![RwLock::new(buffer)]))
    }

    fn from_buffers(dtype: DType, size: usize, buffers: Vec<RwLock<Buffer>>) -> Self {
        Storage {
            inner: Arc::new(StorageInner {
                dtype,
                size,
                buffers,
                index: AtomicUsize::new(0),
            }),
        }
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    /// Byte size of each physical buffer.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Number of elements each physical buffer holds.
    pub fn elem_capacity(&self) -> usize {
        self.inner.size / self.inner.dtype.size_in_bytes()
    }

    pub fn num_buffers(&self) -> usize {
        self.inner.buffers.len()
    }

    /// Current active-buffer counter (monotonic, not reduced mod buffers).
    pub fn index(&self) -> usize {
        self.inner.index.load(Ordering::Acquire)
    }

    /// Advance the active buffer.
    pub fn flip(&self) {
        self.inner.index.fetch_add(1, Ordering::AcqRel);
    }

    /// Physical buffer addressed by a relative `select` right now.
    pub fn physical(&self, select: isize) -> usize {
        let n = self.num_buffers() as isize;
        (self.index() as isize + select).rem_euclid(n) as usize
    }

    /// Whether two handles share the same memory.
    pub fn ptr_eq(&self, other: &Storage) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the given physical buffer is still backed by a file map.
    pub fn is_mapped(&self, buffer: usize) -> bool {
        matches!(*self.read_buffer(buffer), Buffer::Mapped { .. })
    }

    /// Number of live handles (tensors, slices and views) sharing this storage.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn read_buffer(&self, buffer: usize) -> RwLockReadGuard<'_, Buffer> {
        self.inner.buffers[buffer]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_buffer(&self, buffer: usize) -> RwLockWriteGuard<'_, Buffer> {
        self.inner.buffers[buffer]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Read element `elem` of physical buffer `buffer`.
    ///
    /// # Panics
    /// If the element lies outside the buffer.
    pub fn get(&self, buffer: usize, elem: usize) -> f64 {
        let es = self.inner.dtype.size_in_bytes();
        let guard = self.read_buffer(buffer);
        self.inner.dtype.read_f64(&guard.bytes()[elem * es..elem * es + es])
    }

    /// Write element `elem` of physical buffer `buffer`.
    ///
    /// # Panics
    /// If the element lies outside the buffer.
    pub fn set(&self, buffer: usize, elem: usize, value: f64) {
        let es = self.inner.dtype.size_in_bytes();
        let mut guard = self.write_buffer(buffer);
        self.inner
            .dtype
            .write_f64(&mut guard.bytes_mut()[elem * es..elem * es + es], value);
    }

    /// Raw blit of `data` into physical buffer `buffer` at byte `offset`.
    ///
    /// # Panics
    /// If the region does not fit in the buffer.
    pub fn write_bytes(&self, buffer: usize, offset: usize, data: &[u8]) {
        let mut guard = self.write_buffer(buffer);
        guard.bytes_mut()[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Run `f` over the raw bytes of physical buffer `buffer`.
    pub fn with_bytes<R>(&self, buffer: usize, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.read_buffer(buffer);
        f(guard.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_storage_is_zeroed() {
        let s = Storage::new(DType::F32, 16, 1).unwrap();
        assert_eq!(s.elem_capacity(), 4);
        for i in 0..4 {
            assert_eq!(s.get(0, i), 0.0);
        }
    }

    #[test]
    fn test_buffer_count_must_be_one_or_two() {
        assert!(Storage::new(DType::F32, 4, 0).is_err());
        assert!(Storage::new(DType::F32, 4, 3).is_err());
        assert_eq!(Storage::new(DType::F32, 4, 2).unwrap().num_buffers(), 2);
    }

    #[test]
    fn test_flip_alternates_physical_buffer() {
        let s = Storage::new(DType::I32, 8, 2).unwrap();
        assert_eq!(s.physical(0), 0);
        s.flip();
        assert_eq!(s.physical(0), 1);
        assert_eq!(s.physical(-1), 0);
        s.flip();
        assert_eq!(s.physical(0), 0);
    }

    #[test]
    fn test_single_buffer_flip_is_harmless() {
        let s = Storage::new(DType::U8, 4, 1).unwrap();
        s.set(0, 2, 9.0);
        s.flip();
        assert_eq!(s.physical(0), 0);
        assert_eq!(s.get(0, 2), 9.0);
    }

    #[test]
    fn test_clones_share_memory() {
        let a = Storage::new(DType::F32, 8, 1).unwrap();
        let b = a.clone();
        b.set(0, 1, 2.5);
        assert_eq!(a.get(0, 1), 2.5);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.holders(), 2);
        drop(b);
        assert_eq!(a.holders(), 1);
    }

    #[test]
    fn test_write_bytes() {
        let s = Storage::new(DType::F32, 8, 1).unwrap();
        s.write_bytes(0, 4, &3.0f32.to_le_bytes());
        assert_eq!(s.get(0, 1), 3.0);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_panics() {
        let s = Storage::new(DType::F32, 8, 1).unwrap();
        s.get(0, 2);
    }
}
