//! Pool-backed collections
//!
//! Each structure owns its blocks through a [`Heap`](crate::allocator::Heap)
//! handle and returns them on drop.

pub mod bitmap;
pub mod hash;
pub mod map;
pub mod ringbuf;

pub use bitmap::Bitmap;
pub use hash::{bkdr_hash, djb2_hash, fnv1a_hash, StrHash};
pub use map::{PoolMap, BUCKET_BYTES, NODE_BYTES};
pub use ringbuf::RingBuffer;
