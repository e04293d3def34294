//! Pool allocator - fixed arenas with first-fit allocation and coalescing
//!
//! Design: Three-layer architecture:
//! 1. Block table (header bookkeeping, offset keyed)
//! 2. Pool (one arena, first-fit split, eager coalescing on free)
//! 3. PoolAllocator (pool registry, routing by id on alloc, by address on free)
//!
//! Pools are fixed at construction from an [`AllocatorConfig`]; nothing here
//! is global. [`Heap`] shares one allocator between the pool-backed
//! collections on a single thread.

mod block;
mod heap;
mod pool;


pub use block::{BlockHeader, MemPtr, BLOCK_ALIGN, BLOCK_HEADER_SIZE};
pub use heap::Heap;
pub use pool::{Pool, Release};

use core::fmt;

use crate::config::AllocatorConfig;
use crate::errors::{Error, Result};
use crate::logging;

/// Opaque pool identifier (index into the configured pool list)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u8);

impl PoolId {
    #[inline]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-pool statistics for monitoring and debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub id: PoolId,
    pub name: String,
    pub capacity: usize,
    pub available: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
    pub largest_free: usize,
}

/// Registry of every configured pool
pub struct PoolAllocator {
    pools: Vec<Pool>,
    default_pool: PoolId,
}

impl PoolAllocator {
    /// Build every configured pool as one large free block
    pub fn new(config: &AllocatorConfig) -> Result<Self> {
        config.validate()?;

        let default_pool = config
            .pool_id(&config.default_pool)
            .ok_or_else(|| Error::config(format!("unknown default pool '{}'", config.default_pool)))?;

        let pools: Vec<Pool> = config
            .pools
            .iter()
            .map(|pool| Pool::new(pool.name.as_str(), pool.size_bytes))
            .collect();

        for (index, pool) in pools.iter().enumerate() {
            logging::log_pool_init(index, pool.name(), pool.capacity());
        }

        Ok(Self { pools, default_pool })
    }

    /// Re-establish every pool as a single free block
    ///
    /// Refused while any allocation is outstanding: re-initialising would
    /// silently invalidate live handles.
    pub fn init(&mut self) -> Result<()> {
        if !self.is_clean_all() {
            return Err(Error::busy("allocator has live allocations"));
        }

        for pool in &mut self.pools {
            pool.reset();
        }
        tracing::debug!(pools = self.pools.len(), "allocator re-initialised");
        Ok(())
    }

    /// Allocate `size` bytes from `pool`
    ///
    /// Returns `None` for a zero size, an unknown pool, or when no free block
    /// fits. Exhaustion is an ordinary, recoverable outcome.
    pub fn allocate(&mut self, size: usize, pool: PoolId) -> Option<MemPtr> {
        if size == 0 {
            return None;
        }

        let target = self.pools.get_mut(pool.index())?;
        let ptr = target.allocate(size);

        match ptr {
            Some(ptr) => logging::log_allocation(size, pool, ptr),
            None => logging::log_exhausted(size, pool, target.available()),
        }
        ptr
    }

    /// Allocate from the configured default pool
    #[inline]
    pub fn allocate_default(&mut self, size: usize) -> Option<MemPtr> {
        self.allocate(size, self.default_pool)
    }

    /// Release a block; the owning pool is found by address
    ///
    /// Foreign pointers and double frees are tolerated as no-ops.
    pub fn free(&mut self, ptr: MemPtr) {
        let Some((index, pool)) = self
            .pools
            .iter_mut()
            .enumerate()
            .find(|(_, pool)| pool.contains(ptr.addr()))
        else {
            logging::log_foreign_free(ptr);
            return;
        };

        match pool.release(ptr) {
            Release::Released(size) => logging::log_deallocation(size, PoolId(index as u8), ptr),
            Release::AlreadyFree => logging::log_double_free(ptr),
            Release::NotABlock => logging::log_foreign_free(ptr),
        }
    }

    /// True iff `pool` has no live allocations (false for unknown ids)
    pub fn is_clean(&self, pool: PoolId) -> bool {
        self.pools
            .get(pool.index())
            .map_or(false, Pool::is_clean)
    }

    /// True iff no pool has live allocations
    pub fn is_clean_all(&self) -> bool {
        self.pools.iter().all(Pool::is_clean)
    }

    /// Payload of a live block
    pub fn bytes(&self, ptr: MemPtr) -> Option<&[u8]> {
        self.pool_containing(ptr)?.bytes(ptr)
    }

    /// Mutable payload of a live block
    pub fn bytes_mut(&mut self, ptr: MemPtr) -> Option<&mut [u8]> {
        self.pools
            .iter_mut()
            .find(|pool| pool.contains(ptr.addr()))?
            .bytes_mut(ptr)
    }

    /// Read one byte at any pool address
    pub fn load_byte(&self, addr: MemPtr) -> Option<u8> {
        self.pool_containing(addr)?.load_byte(addr)
    }

    /// Pool that owns `ptr`, by address membership
    pub fn pool_of(&self, ptr: MemPtr) -> Option<PoolId> {
        self.pools
            .iter()
            .position(|pool| pool.contains(ptr.addr()))
            .map(|index| PoolId(index as u8))
    }

    fn pool_containing(&self, ptr: MemPtr) -> Option<&Pool> {
        self.pools.iter().find(|pool| pool.contains(ptr.addr()))
    }

    /// Direct access to a pool (read-only)
    pub fn pool(&self, id: PoolId) -> Option<&Pool> {
        self.pools.get(id.index())
    }

    #[inline]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    #[inline]
    pub fn default_pool(&self) -> PoolId {
        self.default_pool
    }

    /// Statistics for one pool
    pub fn pool_stats(&self, id: PoolId) -> Option<PoolStats> {
        let pool = self.pools.get(id.index())?;
        let (used_blocks, free_blocks) = pool
            .blocks()
            .fold((0, 0), |(used, free), (_, header)| {
                if header.free {
                    (used, free + 1)
                } else {
                    (used + 1, free)
                }
            });

        Some(PoolStats {
            id,
            name: pool.name().to_string(),
            capacity: pool.capacity(),
            available: pool.available(),
            used_blocks,
            free_blocks,
            largest_free: pool.largest_free(),
        })
    }

    /// Statistics for every pool, in id order
    pub fn stats(&self) -> Vec<PoolStats> {
        (0..self.pools.len())
            .filter_map(|index| self.pool_stats(PoolId(index as u8)))
            .collect()
    }
}

impl fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("pools", &self.pools)
            .field("default_pool", &self.default_pool)
            .finish()
    }
}
