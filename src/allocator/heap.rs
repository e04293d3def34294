//! Shared heap handle - one allocator, many pool-backed structures
//!
//! Design: `Rc<RefCell<_>>` keeps the single-accessor model explicit: the
//! handle is `!Send`, so structures built on it stay on one thread. Callers
//! that touch a structure from interrupt context supply their own critical
//! section.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use super::{MemPtr, PoolAllocator, PoolId, PoolStats};
use crate::config::AllocatorConfig;
use crate::errors::Result;

/// Clonable handle to one [`PoolAllocator`]
#[derive(Clone)]
pub struct Heap {
    inner: Rc<RefCell<PoolAllocator>>,
}

impl Heap {
    pub fn new(allocator: PoolAllocator) -> Self {
        Self {
            inner: Rc::new(RefCell::new(allocator)),
        }
    }

    /// Build allocator and handle from configuration
    pub fn from_config(config: &AllocatorConfig) -> Result<Self> {
        PoolAllocator::new(config).map(Self::new)
    }

    /// Run `f` with exclusive access to the allocator
    ///
    /// Panics if called re-entrantly from inside another `with` closure.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut PoolAllocator) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }

    #[inline]
    pub fn allocate(&self, size: usize, pool: PoolId) -> Option<MemPtr> {
        self.with(|alloc| alloc.allocate(size, pool))
    }

    #[inline]
    pub fn free(&self, ptr: MemPtr) {
        self.with(|alloc| alloc.free(ptr))
    }

    pub fn init(&self) -> Result<()> {
        self.with(PoolAllocator::init)
    }

    pub fn is_clean(&self, pool: PoolId) -> bool {
        self.inner.borrow().is_clean(pool)
    }

    pub fn is_clean_all(&self) -> bool {
        self.inner.borrow().is_clean_all()
    }

    pub fn default_pool(&self) -> PoolId {
        self.inner.borrow().default_pool()
    }

    pub fn load_byte(&self, addr: MemPtr) -> Option<u8> {
        self.inner.borrow().load_byte(addr)
    }

    pub fn stats(&self) -> Vec<PoolStats> {
        self.inner.borrow().stats()
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(alloc) => f.debug_tuple("Heap").field(&*alloc).finish(),
            Err(_) => f.write_str("Heap(<borrowed>)"),
        }
    }
}
