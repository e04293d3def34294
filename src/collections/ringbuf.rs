//! Pool-backed ring buffer - fixed-capacity circular byte queue
//!
//! Design: One pool block of `N` bytes, a read cursor and a write cursor.
//! One slot always stays empty so that `read == write` means empty and
//! `(write + 1) % N == read` means full; usable capacity is `N - 1`.
//!
//! There is no internal locking. A producer in interrupt context and a
//! consumer in thread context must share the buffer under a critical section
//! the caller provides.

use core::fmt;

use crate::allocator::{Heap, MemPtr, PoolId};
use crate::errors::{Error, Result};

pub struct RingBuffer {
    heap: Heap,
    block: MemPtr,
    size: usize,
    read: usize,
    write: usize,
}

impl RingBuffer {
    /// Allocate a buffer of `capacity` slots (`capacity - 1` usable bytes)
    pub fn new(heap: &Heap, capacity: usize, pool: PoolId) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid("ring buffer capacity must be non-zero"));
        }

        let block = heap
            .allocate(capacity, pool)
            .ok_or_else(|| Error::out_of_memory(capacity, pool))?;

        Ok(Self {
            heap: heap.clone(),
            block,
            size: capacity,
            read: 0,
            write: 0,
        })
    }

    /// Slot count `N` (one more than the usable bytes)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        (self.write + 1) % self.size == self.read
    }

    /// Bytes waiting to be read
    #[inline]
    pub fn available_bytes(&self) -> usize {
        if self.write >= self.read {
            self.write - self.read
        } else {
            self.size - self.read + self.write
        }
    }

    /// Bytes that can be written before the buffer is full
    #[inline]
    pub fn free_bytes(&self) -> usize {
        self.size - 1 - self.available_bytes()
    }

    /// Longest readable run starting at the read cursor without wrapping
    pub fn contiguous_read_len(&self) -> usize {
        if self.write >= self.read {
            self.write - self.read
        } else {
            self.size - self.read
        }
    }

    /// Longest writable run starting at the write cursor without wrapping
    pub fn contiguous_write_len(&self) -> usize {
        if self.read > self.write {
            self.read - self.write - 1
        } else if self.read == 0 {
            self.size - self.write - 1
        } else {
            self.size - self.write
        }
    }

    /// Pool address of the slot under the read cursor
    pub fn read_ptr(&self) -> Option<MemPtr> {
        self.block.offset(self.read)
    }

    /// Pool address of the slot under the write cursor
    ///
    /// An external producer (DMA) may fill up to [`contiguous_write_len`]
    /// bytes here and then publish them with [`commit_write`].
    ///
    /// [`contiguous_write_len`]: Self::contiguous_write_len
    /// [`commit_write`]: Self::commit_write
    pub fn write_ptr(&self) -> Option<MemPtr> {
        self.block.offset(self.write)
    }

    /// Reset both cursors; contents are left in place
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Advance the write cursor over `count` externally written bytes
    ///
    /// Clamped to [`free_bytes`](Self::free_bytes). Returns the bytes committed.
    pub fn commit_write(&mut self, count: usize) -> usize {
        let count = count.min(self.free_bytes());
        self.write = (self.write + count) % self.size;
        count
    }

    /// Drop up to `count` unread bytes; returns the bytes dropped
    pub fn discard(&mut self, count: usize) -> usize {
        let count = count.min(self.available_bytes());
        self.read = (self.read + count) % self.size;
        count
    }

    /// Copy as much of `data` as fits; returns the bytes written
    pub fn write(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.free_bytes());
        if count == 0 {
            return 0;
        }

        let (size, start) = (self.size, self.write);
        let first = count.min(size - start);
        let copied = self.heap.with(|alloc| {
            let Some(buf) = alloc.bytes_mut(self.block) else {
                return false;
            };
            buf[start..start + first].copy_from_slice(&data[..first]);
            buf[..count - first].copy_from_slice(&data[first..count]);
            true
        });

        if !copied {
            return 0;
        }
        self.write = (start + count) % size;
        count
    }

    /// Fill `out` from the buffer; returns the bytes read
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.available_bytes());
        if count == 0 {
            return 0;
        }

        let (size, start) = (self.size, self.read);
        let first = count.min(size - start);
        let copied = self.heap.with(|alloc| {
            let Some(buf) = alloc.bytes(self.block) else {
                return false;
            };
            out[..first].copy_from_slice(&buf[start..start + first]);
            out[first..count].copy_from_slice(&buf[..count - first]);
            true
        });

        if !copied {
            return 0;
        }
        self.read = (start + count) % size;
        count
    }

    /// Append one byte; silently dropped when full
    pub fn write_byte(&mut self, byte: u8) {
        self.write(&[byte]);
    }

    /// Next byte, or `None` when empty
    pub fn try_read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        (self.read(&mut byte) == 1).then_some(byte[0])
    }

    /// Next byte, `0` when empty
    ///
    /// A stored zero and an empty buffer look the same here; use
    /// [`try_read_byte`](Self::try_read_byte) to tell them apart.
    pub fn read_byte(&mut self) -> u8 {
        self.try_read_byte().unwrap_or(0)
    }

    /// Pool address of the first unread occurrence of `byte`
    ///
    /// Scans exactly `available_bytes()` slots from the read cursor. The
    /// address stays meaningful only until a later write wraps over that
    /// slot; read it back with `PoolAllocator::load_byte`.
    pub fn search_byte(&self, byte: u8) -> Option<MemPtr> {
        let available = self.available_bytes();
        let position = self.heap.with(|alloc| {
            let buf = alloc.bytes(self.block)?;
            (0..available)
                .map(|step| (self.read + step) % self.size)
                .find(|&slot| buf[slot] == byte)
        })?;

        self.block.offset(position)
    }
}

impl Drop for RingBuffer {
    fn drop(&mut self) {
        self.heap.free(self.block);
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.size)
            .field("read", &self.read)
            .field("write", &self.write)
            .field("available", &self.available_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocatorConfig;

    fn heap() -> Heap {
        Heap::from_config(&AllocatorConfig::default()).expect("heap")
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let heap = heap();
        assert!(matches!(
            RingBuffer::new(&heap, 0, heap.default_pool()),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_holds_one_less_than_capacity() {
        let heap = heap();
        let mut ring = RingBuffer::new(&heap, 8, heap.default_pool()).unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.free_bytes(), 7);

        assert_eq!(ring.write(&[0xAA; 10]), 7);
        assert!(ring.is_full());
        assert_eq!(ring.free_bytes(), 0);

        ring.write_byte(1);
        assert_eq!(ring.available_bytes(), 7);
    }

    #[test]
    fn test_wrapping_read_write() {
        let heap = heap();
        let mut ring = RingBuffer::new(&heap, 8, heap.default_pool()).unwrap();

        ring.write(&[1, 2, 3, 4, 5]);
        let mut out = [0u8; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);

        // Write cursor wraps past the end of the block
        assert_eq!(ring.write(&[6, 7, 8, 9, 10, 11]), 6);
        assert_eq!(ring.available_bytes(), 7);

        let mut out = [0u8; 8];
        assert_eq!(ring.read(&mut out), 7);
        assert_eq!(&out[..7], &[5, 6, 7, 8, 9, 10, 11]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_read_byte_on_empty() {
        let heap = heap();
        let mut ring = RingBuffer::new(&heap, 4, heap.default_pool()).unwrap();
        assert_eq!(ring.read_byte(), 0);
        assert_eq!(ring.try_read_byte(), None);

        ring.write_byte(0);
        assert_eq!(ring.try_read_byte(), Some(0));
    }

    #[test]
    fn test_contiguous_lengths() {
        let heap = heap();
        let mut ring = RingBuffer::new(&heap, 8, heap.default_pool()).unwrap();
        assert_eq!(ring.contiguous_write_len(), 7);
        assert_eq!(ring.contiguous_read_len(), 0);

        ring.write(&[0; 6]);
        ring.discard(5);
        // read = 5, write = 6
        assert_eq!(ring.contiguous_read_len(), 1);
        assert_eq!(ring.contiguous_write_len(), 2);

        ring.write(&[0; 4]);
        // write wrapped to 2
        assert_eq!(ring.contiguous_read_len(), 3);
        assert_eq!(ring.contiguous_write_len(), 2);
    }

    #[test]
    fn test_commit_and_discard_clamp() {
        let heap = heap();
        let mut ring = RingBuffer::new(&heap, 5, heap.default_pool()).unwrap();
        assert_eq!(ring.commit_write(100), 4);
        assert!(ring.is_full());
        assert_eq!(ring.discard(100), 4);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_search_only_unread_bytes() {
        let heap = heap();
        let mut ring = RingBuffer::new(&heap, 8, heap.default_pool()).unwrap();
        ring.write(&[7, 8, 9]);
        assert_eq!(ring.read_byte(), 7);

        // Consumed byte is still in the block but not searchable
        assert_eq!(ring.search_byte(7), None);

        let found = ring.search_byte(9).unwrap();
        assert_eq!(heap.load_byte(found), Some(9));
        assert_eq!(found, ring.read_ptr().unwrap().offset(1).unwrap());
    }

    #[test]
    fn test_search_wraps_past_block_end() {
        let heap = heap();
        let mut ring = RingBuffer::new(&heap, 8, heap.default_pool()).unwrap();
        ring.write(&[0; 6]);
        assert_eq!(ring.read(&mut [0u8; 6]), 6);

        // Slots 6, 7, 0, 1, 2
        ring.write(&[1, 2, 3, 4, 5]);
        let read_ptr = ring.read_ptr().unwrap();

        let found = ring.search_byte(4).unwrap();
        assert!(found < read_ptr);
        assert_eq!(read_ptr.addr() - found.addr(), 5);
        assert_eq!(heap.load_byte(found), Some(4));

        let first = ring.search_byte(1).unwrap();
        assert_eq!(first, read_ptr);
        assert_eq!(ring.search_byte(5), found.offset(1));

        // Stale zeros left before the write cursor are not searched
        assert!(ring.search_byte(0).is_none());
    }

    #[test]
    fn test_clear_and_drop() {
        let heap = heap();
        let mut ring = RingBuffer::new(&heap, 16, heap.default_pool()).unwrap();
        ring.write(b"hello");
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.free_bytes(), 15);

        drop(ring);
        assert!(heap.is_clean_all());
    }
}
