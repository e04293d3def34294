//! Block metadata - header layout and payload addressing
//!
//! Design: Headers live in a per-pool table keyed by byte offset instead of
//! inside the arena bytes. Every block still reserves header space, so pool
//! accounting matches an intrusive layout.

use core::fmt;
use core::num::NonZeroUsize;

/// Bytes reserved in front of every payload (size, free flag, two links)
pub const BLOCK_HEADER_SIZE: usize = 16;

/// Payload sizes are rounded up to this boundary
pub const BLOCK_ALIGN: usize = 4;

/// Header of one block inside a pool
///
/// `size` covers header and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub size: usize,
    pub free: bool,
}

impl BlockHeader {
    #[inline]
    pub const fn free(size: usize) -> Self {
        Self { size, free: true }
    }

    #[inline]
    pub const fn used(size: usize) -> Self {
        Self { size, free: false }
    }

    /// Usable bytes after the header
    #[inline]
    pub const fn payload_len(&self) -> usize {
        self.size.saturating_sub(BLOCK_HEADER_SIZE)
    }
}

/// Absolute address of a payload (or of a byte inside one) in pool memory
///
/// A `MemPtr` is a plain address, not a borrow: it stays `Copy` after the
/// block it names is freed. Every accessor on the allocator re-validates it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemPtr(NonZeroUsize);

impl MemPtr {
    #[inline]
    pub(crate) fn new(addr: usize) -> Option<Self> {
        NonZeroUsize::new(addr).map(Self)
    }

    /// Raw address
    #[inline]
    pub fn addr(self) -> usize {
        self.0.get()
    }

    /// Address `count` bytes further on
    #[inline]
    pub fn offset(self, count: usize) -> Option<Self> {
        self.addr().checked_add(count).and_then(Self::new)
    }
}

impl fmt::Debug for MemPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemPtr({:#x})", self.addr())
    }
}

impl fmt::Display for MemPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.addr())
    }
}

/// Round `size` up to the block alignment, `None` on overflow
#[inline]
pub const fn align_size(size: usize) -> Option<usize> {
    match size.checked_add(BLOCK_ALIGN - 1) {
        Some(padded) => Some(padded & !(BLOCK_ALIGN - 1)),
        None => None,
    }
}
