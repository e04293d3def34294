//! Pool management - one fixed arena with a first-fit block chain
//!
//! Design: The block chain is a `BTreeMap` keyed by byte offset, so address
//! order is implicit and neighbours are range lookups. Blocks always tile
//! the arena exactly; eager coalescing keeps free neighbours merged.

use std::collections::BTreeMap;

use super::block::{align_size, BlockHeader, MemPtr, BLOCK_ALIGN, BLOCK_HEADER_SIZE};

/// Outcome of handing a payload pointer back to a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Block released; carries the credited byte count
    Released(usize),
    /// Block was already free (double free)
    AlreadyFree,
    /// Address does not name a block payload in this pool
    NotABlock,
}

/// Fixed-size arena managed as an independent heap
pub struct Pool {
    name: String,
    memory: Box<[u8]>,
    blocks: BTreeMap<usize, BlockHeader>,
    available: usize,
}

impl Pool {
    /// Create pool of `size` bytes (rounded up to the block alignment)
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        let capacity = align_size(size).unwrap_or(size & !(BLOCK_ALIGN - 1));
        let mut pool = Self {
            name: name.into(),
            memory: vec![0u8; capacity].into_boxed_slice(),
            blocks: BTreeMap::new(),
            available: 0,
        };
        pool.reset();
        pool
    }

    /// Re-establish the pool as one free block spanning the whole arena
    pub fn reset(&mut self) {
        self.blocks.clear();
        self.blocks.insert(0, BlockHeader::free(self.capacity()));
        self.available = self.capacity();
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.available
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.available == self.capacity()
    }

    #[inline]
    fn base(&self) -> usize {
        self.memory.as_ptr() as usize
    }

    /// Address range membership
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        let base = self.base();
        addr >= base && addr < base + self.capacity()
    }

    /// First-fit allocation of `size` payload bytes
    ///
    /// A free block qualifies only if it strictly exceeds the requested block
    /// plus one more header, so the split always leaves a remainder block.
    pub fn allocate(&mut self, size: usize) -> Option<MemPtr> {
        let block_size = align_size(size)?.checked_add(BLOCK_HEADER_SIZE)?;
        let required = block_size.checked_add(BLOCK_HEADER_SIZE)?;

        let (offset, found) = self
            .blocks
            .iter()
            .find(|(_, header)| header.free && header.size > required)
            .map(|(&offset, &header)| (offset, header))?;

        self.blocks.insert(offset, BlockHeader::used(block_size));
        self.blocks
            .insert(offset + block_size, BlockHeader::free(found.size - block_size));
        self.available -= block_size;
        tracing::debug!(
            pool = %self.name,
            offset,
            block_size,
            remainder = found.size - block_size,
            "block split"
        );

        MemPtr::new(self.base() + offset + BLOCK_HEADER_SIZE)
    }

    /// Return a block to the pool and coalesce with free neighbours
    pub fn release(&mut self, ptr: MemPtr) -> Release {
        let Some(offset) = self.header_offset(ptr) else {
            return Release::NotABlock;
        };
        let Some(header) = self.blocks.get_mut(&offset) else {
            return Release::NotABlock;
        };
        if header.free {
            return Release::AlreadyFree;
        }

        header.free = true;
        let size = header.size;
        self.available += size;
        self.coalesce(offset);

        Release::Released(size)
    }

    /// Merge forward first, then backward, so a free predecessor absorbs the
    /// already-enlarged block in one step.
    fn coalesce(&mut self, offset: usize) {
        let Some(mut size) = self.blocks.get(&offset).map(|header| header.size) else {
            return;
        };

        if let Some(next) = self.blocks.get(&(offset + size)).copied() {
            if next.free {
                self.blocks.remove(&(offset + size));
                size += next.size;
                self.blocks.insert(offset, BlockHeader::free(size));
                tracing::debug!(pool = %self.name, offset, size, "merged with next block");
            }
        }

        let prev = self
            .blocks
            .range(..offset)
            .next_back()
            .map(|(&prev_offset, &header)| (prev_offset, header));

        if let Some((prev_offset, prev)) = prev {
            if prev.free {
                self.blocks.remove(&offset);
                self.blocks
                    .insert(prev_offset, BlockHeader::free(prev.size + size));
                tracing::debug!(
                    pool = %self.name,
                    offset = prev_offset,
                    size = prev.size + size,
                    "merged into previous block"
                );
            }
        }
    }

    /// Offset of the header that precedes `ptr`'s payload
    fn header_offset(&self, ptr: MemPtr) -> Option<usize> {
        if !self.contains(ptr.addr()) {
            return None;
        }
        (ptr.addr() - self.base()).checked_sub(BLOCK_HEADER_SIZE)
    }

    /// Payload range of a live block
    fn live_payload(&self, ptr: MemPtr) -> Option<core::ops::Range<usize>> {
        let offset = self.header_offset(ptr)?;
        let header = self.blocks.get(&offset).filter(|header| !header.free)?;
        Some(offset + BLOCK_HEADER_SIZE..offset + header.size)
    }

    /// Payload bytes of a live block
    pub fn bytes(&self, ptr: MemPtr) -> Option<&[u8]> {
        let range = self.live_payload(ptr)?;
        self.memory.get(range)
    }

    /// Mutable payload bytes of a live block
    pub fn bytes_mut(&mut self, ptr: MemPtr) -> Option<&mut [u8]> {
        let range = self.live_payload(ptr)?;
        self.memory.get_mut(range)
    }

    /// Raw byte at any address inside the arena
    pub fn load_byte(&self, addr: MemPtr) -> Option<u8> {
        if !self.contains(addr.addr()) {
            return None;
        }
        self.memory.get(addr.addr() - self.base()).copied()
    }

    /// Blocks in address order as `(offset, header)`
    pub fn blocks(&self) -> impl Iterator<Item = (usize, BlockHeader)> + '_ {
        self.blocks.iter().map(|(&offset, &header)| (offset, header))
    }

    /// Largest free block size (header included)
    pub fn largest_free(&self) -> usize {
        self.blocks
            .values()
            .filter(|header| header.free)
            .map(|header| header.size)
            .max()
            .unwrap_or(0)
    }
}

impl core::fmt::Debug for Pool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("available", &self.available)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}
