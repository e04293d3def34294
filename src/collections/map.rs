//! Pool-backed hash map - fixed bucket count, string keys
//!
//! Design: Separate chaining with an inline first entry per bucket.
//! - Bucket array reserved as one pool block at construction
//! - Overflow entries each own one pool block for their lifetime
//! - Last write wins for duplicate keys
//! - No resizing: the bucket count is fixed for the map's life
//!
//! Pool blocks account for table and node space only. Keys and values live
//! in ordinary heap memory, so a key's length is never charged to the pool.

use core::fmt;
use core::mem;

use super::hash::StrHash;
use crate::allocator::{Heap, MemPtr, PoolId};
use crate::errors::{Error, Result};

/// Pool bytes reserved per bucket (inline key, value, chain head, count)
pub const BUCKET_BYTES: usize = 16;

/// Pool bytes reserved per overflow node (link, key, value)
pub const NODE_BYTES: usize = 12;

#[derive(Debug)]
struct Entry<V> {
    key: Box<str>,
    value: V,
}

impl<V> Entry<V> {
    fn new(key: &str, value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    #[inline]
    fn matches(&self, key: &str) -> bool {
        self.key.as_bytes() == key.as_bytes()
    }
}

#[derive(Debug)]
struct ChainNode<V> {
    entry: Entry<V>,
    block: MemPtr,
}

/// One slot of the table
///
/// `head: None` inside `Chained` is an inline slot vacated by `remove` while
/// overflow nodes remain.
#[derive(Debug)]
enum Bucket<V> {
    Empty,
    Single(Entry<V>),
    Chained {
        head: Option<Entry<V>>,
        chain: Vec<ChainNode<V>>,
    },
}

impl<V> Bucket<V> {
    fn len(&self) -> usize {
        match self {
            Bucket::Empty => 0,
            Bucket::Single(_) => 1,
            Bucket::Chained { head, chain } => usize::from(head.is_some()) + chain.len(),
        }
    }

    /// Inline entry first, then the chain in append order
    fn entries(&self) -> impl Iterator<Item = &Entry<V>> {
        let (head, chain): (Option<&Entry<V>>, &[ChainNode<V>]) = match self {
            Bucket::Empty => (None, &[]),
            Bucket::Single(entry) => (Some(entry), &[]),
            Bucket::Chained { head, chain } => (head.as_ref(), chain.as_slice()),
        };
        head.into_iter().chain(chain.iter().map(|node| &node.entry))
    }

    fn find(&self, key: &str) -> Option<&Entry<V>> {
        self.entries().find(|entry| entry.matches(key))
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut Entry<V>> {
        match self {
            Bucket::Empty => None,
            Bucket::Single(entry) => Some(entry).filter(|entry| entry.matches(key)),
            Bucket::Chained { head, chain } => head
                .as_mut()
                .filter(|entry| entry.matches(key))
                .or_else(|| {
                    chain
                        .iter_mut()
                        .map(|node| &mut node.entry)
                        .find(|entry| entry.matches(key))
                }),
        }
    }

    /// Store in the inline slot if it is vacant; hands the entry back otherwise
    fn try_store_inline(&mut self, entry: Entry<V>) -> Option<Entry<V>> {
        match self {
            Bucket::Empty => {
                *self = Bucket::Single(entry);
                None
            }
            Bucket::Chained { head, .. } if head.is_none() => {
                *head = Some(entry);
                None
            }
            _ => Some(entry),
        }
    }

    fn append(&mut self, node: ChainNode<V>) {
        match mem::replace(self, Bucket::Empty) {
            Bucket::Empty => {
                *self = Bucket::Chained {
                    head: None,
                    chain: vec![node],
                }
            }
            Bucket::Single(entry) => {
                *self = Bucket::Chained {
                    head: Some(entry),
                    chain: vec![node],
                }
            }
            Bucket::Chained { head, mut chain } => {
                chain.push(node);
                *self = Bucket::Chained { head, chain };
            }
        }
    }

    /// Remove `key`; `Some(block)` names an overflow block to release
    fn remove(&mut self, key: &str) -> Option<Option<MemPtr>> {
        let released = match self {
            Bucket::Empty => return None,
            Bucket::Single(entry) => {
                if !entry.matches(key) {
                    return None;
                }
                *self = Bucket::Empty;
                return Some(None);
            }
            Bucket::Chained { head, chain } => {
                if head.as_ref().map_or(false, |entry| entry.matches(key)) {
                    *head = None;
                    None
                } else {
                    let position = chain.iter().position(|node| node.entry.matches(key))?;
                    Some(chain.remove(position).block)
                }
            }
        };

        self.normalize();
        Some(released)
    }

    /// Collapse a chain-less `Chained` back to `Single`/`Empty`
    fn normalize(&mut self) {
        if let Bucket::Chained { head, chain } = self {
            if chain.is_empty() {
                *self = match head.take() {
                    Some(entry) => Bucket::Single(entry),
                    None => Bucket::Empty,
                };
            }
        }
    }

    /// Reset to `Empty`, yielding every overflow block
    fn drain_blocks(&mut self) -> Vec<MemPtr> {
        match mem::replace(self, Bucket::Empty) {
            Bucket::Chained { chain, .. } => chain.into_iter().map(|node| node.block).collect(),
            _ => Vec::new(),
        }
    }
}

/// Fixed-bucket associative table whose memory comes from one pool
pub struct PoolMap<V> {
    heap: Heap,
    pool: PoolId,
    hash: StrHash,
    table: MemPtr,
    buckets: Vec<Bucket<V>>,
    len: usize,
}

impl<V> PoolMap<V> {
    /// Smallest accepted bucket count
    pub const MIN_BUCKETS: usize = 2;

    /// Create a map with `bucket_count` buckets in `pool`
    ///
    /// A prime bucket count spreads keys best.
    pub fn new(heap: &Heap, bucket_count: usize, hash: StrHash, pool: PoolId) -> Result<Self> {
        if bucket_count < Self::MIN_BUCKETS {
            return Err(Error::invalid(format!(
                "bucket count {} below minimum {}",
                bucket_count,
                Self::MIN_BUCKETS
            )));
        }

        let table_bytes = bucket_count
            .checked_mul(BUCKET_BYTES)
            .ok_or_else(|| Error::invalid("bucket table size overflows"))?;
        let table = heap
            .allocate(table_bytes, pool)
            .ok_or_else(|| Error::out_of_memory(table_bytes, pool))?;

        Ok(Self {
            heap: heap.clone(),
            pool,
            hash,
            table,
            buckets: (0..bucket_count).map(|_| Bucket::Empty).collect(),
            len: 0,
        })
    }

    /// Create a map in the allocator's default pool
    pub fn with_default_pool(heap: &Heap, bucket_count: usize, hash: StrHash) -> Result<Self> {
        Self::new(heap, bucket_count, hash, heap.default_pool())
    }

    /// Number of buckets (the table's modulus)
    ///
    /// This is the map's historical "length": it reports table capacity, not
    /// stored entries. Use [`len`](Self::len) for the entry count.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Live entries across all buckets
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    fn bucket_index(&self, key: &str) -> usize {
        (self.hash)(key.as_bytes()) as usize % self.buckets.len()
    }

    /// Insert or overwrite `key`
    ///
    /// Fails with `OutOfMemory` when an overflow node cannot be allocated;
    /// the map is unchanged in that case.
    pub fn insert(&mut self, key: &str, value: V) -> Result<()> {
        validate_key(key)?;
        let index = self.bucket_index(key);
        let bucket = &mut self.buckets[index];

        if let Some(entry) = bucket.find_mut(key) {
            entry.value = value;
            return Ok(());
        }

        if let Some(entry) = bucket.try_store_inline(Entry::new(key, value)) {
            let block = self
                .heap
                .allocate(NODE_BYTES, self.pool)
                .ok_or_else(|| Error::out_of_memory(NODE_BYTES, self.pool))?;
            bucket.append(ChainNode { entry, block });
        }

        self.len += 1;
        Ok(())
    }

    /// Look up the value stored for `key`
    pub fn search(&self, key: &str) -> Result<&V> {
        validate_key(key)?;
        self.buckets[self.bucket_index(key)]
            .find(key)
            .map(|entry| &entry.value)
            .ok_or_else(|| Error::not_found(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.search(key).is_ok()
    }

    /// Remove `key`, returning its overflow node (if any) to the pool
    pub fn remove(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        let index = self.bucket_index(key);

        match self.buckets[index].remove(key) {
            None => Err(Error::not_found(key)),
            Some(released) => {
                if let Some(block) = released {
                    self.heap.free(block);
                }
                self.len -= 1;
                Ok(())
            }
        }
    }

    /// Drop every entry and release every overflow node
    ///
    /// All buckets return to the empty state, counts included.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            for block in bucket.drain_blocks() {
                self.heap.free(block);
            }
        }
        self.len = 0;
    }

    /// Live entries of the bucket `key` hashes to
    pub fn bucket_len(&self, key: &str) -> usize {
        self.buckets[self.bucket_index(key)].len()
    }

    /// Entries in bucket order; inline entry before chain within a bucket
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.buckets
            .iter()
            .flat_map(Bucket::entries)
            .map(|entry| (&*entry.key, &entry.value))
    }

    /// Visit every live entry in [`iter`](Self::iter) order
    pub fn for_each(&self, mut visitor: impl FnMut(&str, &V)) {
        for (key, value) in self.iter() {
            visitor(key, value);
        }
    }
}

/// Keys are null-terminated byte strings: an interior NUL would truncate one
fn validate_key(key: &str) -> Result<()> {
    if key.as_bytes().contains(&0) {
        return Err(Error::invalid("key contains a NUL byte"));
    }
    Ok(())
}

impl<V> Drop for PoolMap<V> {
    fn drop(&mut self) {
        self.clear();
        self.heap.free(self.table);
    }
}

impl<V: fmt::Debug> fmt::Debug for PoolMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::BLOCK_HEADER_SIZE;
    use crate::collections::hash::bkdr_hash;
    use crate::config::AllocatorConfig;

    fn heap() -> Heap {
        Heap::from_config(&AllocatorConfig::default()).expect("heap")
    }

    /// Every key lands in bucket 0
    fn constant_hash(_: &[u8]) -> u32 {
        0
    }

    #[test]
    fn test_rejects_small_bucket_count() {
        let heap = heap();
        let map = PoolMap::<usize>::with_default_pool(&heap, 1, bkdr_hash);
        assert!(matches!(map, Err(Error::InvalidArgument { .. })));
        assert!(heap.is_clean_all());
    }

    #[test]
    fn test_table_allocation_failure() {
        let heap = heap();
        let map = PoolMap::<usize>::with_default_pool(&heap, 10_000, bkdr_hash);
        assert!(matches!(map, Err(Error::OutOfMemory { .. })));
    }

    #[test]
    fn test_bucket_count_vs_len() {
        let heap = heap();
        let mut map = PoolMap::with_default_pool(&heap, 31, bkdr_hash).unwrap();
        assert_eq!(map.bucket_count(), 31);
        assert_eq!(map.len(), 0);

        map.insert("a", 1).unwrap();
        map.insert("b", 2).unwrap();
        assert_eq!(map.bucket_count(), 31);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_collisions_allocate_nodes() {
        let heap = heap();
        let pool = heap.default_pool();
        let mut map = PoolMap::new(&heap, 7, constant_hash, pool).unwrap();

        map.insert("first", 1).unwrap();
        let after_inline = heap.stats()[pool.index()].used_blocks;

        map.insert("second", 2).unwrap();
        map.insert("third", 3).unwrap();
        assert_eq!(heap.stats()[pool.index()].used_blocks, after_inline + 2);
        assert_eq!(map.bucket_len("first"), 3);

        assert_eq!(*map.search("second").unwrap(), 2);
        assert_eq!(*map.search("third").unwrap(), 3);
    }

    #[test]
    fn test_chain_node_debits_one_node_block() {
        let heap = heap();
        let pool = heap.default_pool();
        let mut map = PoolMap::new(&heap, 2, constant_hash, pool).unwrap();
        map.insert("inline", 0).unwrap();

        let before = heap.stats()[pool.index()].available;
        map.insert("a key far longer than any node block", 1).unwrap();
        let after = heap.stats()[pool.index()].available;
        assert_eq!(before - after, NODE_BYTES + BLOCK_HEADER_SIZE);
        assert_eq!(NODE_BYTES, 12);

        map.remove("a key far longer than any node block").unwrap();
        assert_eq!(heap.stats()[pool.index()].available, before);
    }

    #[test]
    fn test_remove_inline_head_keeps_chain() {
        let heap = heap();
        let mut map = PoolMap::new(&heap, 3, constant_hash, heap.default_pool()).unwrap();

        map.insert("head", 1).unwrap();
        map.insert("tail", 2).unwrap();
        map.remove("head").unwrap();

        assert!(matches!(map.search("head"), Err(Error::NotFound { .. })));
        assert_eq!(*map.search("tail").unwrap(), 2);
        assert_eq!(map.bucket_len("tail"), 1);

        // Vacated inline slot is reused without a new node
        let used = heap.stats()[0].used_blocks;
        map.insert("again", 3).unwrap();
        assert_eq!(heap.stats()[0].used_blocks, used);
    }

    #[test]
    fn test_for_each_order() {
        let heap = heap();
        let mut map = PoolMap::new(&heap, 5, constant_hash, heap.default_pool()).unwrap();
        for (i, key) in ["x", "y", "z"].iter().enumerate() {
            map.insert(key, i).unwrap();
        }

        let mut seen = Vec::new();
        map.for_each(|key, value| seen.push((key.to_string(), *value)));
        assert_eq!(
            seen,
            vec![("x".to_string(), 0), ("y".to_string(), 1), ("z".to_string(), 2)]
        );
    }

    #[test]
    fn test_clear_resets_bucket_counts() {
        let heap = heap();
        let pool = heap.default_pool();
        let mut map = PoolMap::new(&heap, 3, constant_hash, pool).unwrap();
        let table_only = heap.stats()[pool.index()].used_blocks;

        for key in ["a", "b", "c", "d"] {
            map.insert(key, 0u8).unwrap();
        }
        map.clear();

        assert!(map.is_empty());
        assert_eq!(map.bucket_len("a"), 0);
        assert_eq!(heap.stats()[pool.index()].used_blocks, table_only);

        // First insert after clear goes inline again
        map.insert("e", 1).unwrap();
        assert_eq!(heap.stats()[pool.index()].used_blocks, table_only);
    }

    #[test]
    fn test_nul_key_rejected() {
        let heap = heap();
        let mut map = PoolMap::with_default_pool(&heap, 3, bkdr_hash).unwrap();
        assert!(matches!(map.insert("a\0b", 1), Err(Error::InvalidArgument { .. })));
        assert!(matches!(map.search("a\0b"), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_drop_releases_everything() {
        let heap = heap();
        {
            let mut map = PoolMap::new(&heap, 3, constant_hash, PoolId::new(1)).unwrap();
            for key in ["a", "b", "c"] {
                map.insert(key, ()).unwrap();
            }
            assert!(!heap.is_clean(PoolId::new(1)));
        }
        assert!(heap.is_clean_all());
    }

    #[test]
    fn test_node_exhaustion_leaves_map_unchanged() {
        let heap = Heap::from_config(&AllocatorConfig::single(128)).unwrap();
        let mut map = PoolMap::with_default_pool(&heap, 2, constant_hash).unwrap();

        map.insert("a", 1).unwrap();
        let mut inserted = 1;
        let err = loop {
            match map.insert(&format!("k{}", inserted), inserted) {
                Ok(()) => inserted += 1,
                Err(err) => break err,
            }
        };

        assert!(matches!(err, Error::OutOfMemory { .. }));
        assert_eq!(map.len(), inserted);
        assert!(map.search(&format!("k{}", inserted)).is_err());
    }
}
