//! Firmware support library: fixed-arena pool allocator plus the hash map,
//! bitmap and ring buffer built on it, and a small command console.

// Core modules
pub mod allocator;
pub mod collections;
pub mod config;
pub mod console;
pub mod errors;
pub mod logging;

// Re-export commonly used items
pub use allocator::{Heap, MemPtr, PoolAllocator, PoolId, PoolStats};
pub use collections::{Bitmap, PoolMap, RingBuffer, StrHash};
pub use config::{AllocatorConfig, PoolConfig};
pub use console::{CommandContext, CommandDesc, CommandTable};
pub use errors::{Error, Result};
