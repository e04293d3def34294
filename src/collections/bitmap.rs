//! Pool-backed bitmap - fixed set of small non-negative integers
//!
//! Design: One pool block of little-endian 32-bit words, allocated once.
//! Bit `v % 32` of word `v / 32` holds value `v`. Operations touch the words
//! in place and never allocate.

use core::fmt;

use crate::allocator::{Heap, MemPtr, PoolId};
use crate::errors::{Error, Result};

const BITS_PER_WORD: u32 = u32::BITS;
const WORD_BYTES: usize = core::mem::size_of::<u32>();

pub struct Bitmap {
    heap: Heap,
    block: MemPtr,
    words: usize,
}

impl Bitmap {
    /// Raw "full" sentinel, for callers that store indices as `u32`
    pub const FULL: u32 = u32::MAX;

    /// Create a bitmap for values below `max_value`
    ///
    /// Capacity is truncated to whole words: `max_value / 32` words. Values
    /// from that boundary up to `max_value - 1` are not representable.
    pub fn new(heap: &Heap, max_value: u32, pool: PoolId) -> Result<Self> {
        let words = (max_value / BITS_PER_WORD) as usize;
        if words == 0 {
            return Err(Error::invalid(format!(
                "max value {} holds no whole {}-bit word",
                max_value, BITS_PER_WORD
            )));
        }

        let bytes = words * WORD_BYTES;
        let block = heap
            .allocate(bytes, pool)
            .ok_or_else(|| Error::out_of_memory(bytes, pool))?;

        let bitmap = Self {
            heap: heap.clone(),
            block,
            words,
        };
        bitmap.clear();
        Ok(bitmap)
    }

    /// Representable values (`words * 32`)
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.words as u32 * BITS_PER_WORD
    }

    #[inline]
    pub fn word_count(&self) -> usize {
        self.words
    }

    fn read_words<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let len = self.words * WORD_BYTES;
        self.heap
            .with(|alloc| alloc.bytes(self.block).and_then(|bytes| bytes.get(..len)).map(f))
    }

    fn write_words<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let len = self.words * WORD_BYTES;
        self.heap.with(|alloc| {
            alloc
                .bytes_mut(self.block)
                .and_then(|bytes| bytes.get_mut(..len))
                .map(f)
        })
    }

    /// Word index and mask for `value`, if it is representable
    fn locate(&self, value: u32) -> Option<(usize, u32)> {
        let word = (value / BITS_PER_WORD) as usize;
        (word < self.words).then(|| (word, 1u32 << (value % BITS_PER_WORD)))
    }

    fn update(&self, value: u32, f: impl FnOnce(u32, u32) -> u32) {
        let Some((word, mask)) = self.locate(value) else {
            return;
        };
        self.write_words(|bytes| {
            let slot = &mut bytes[word * WORD_BYTES..(word + 1) * WORD_BYTES];
            let next = f(load_word(slot), mask);
            slot.copy_from_slice(&next.to_le_bytes());
        });
    }

    /// Zero every word
    pub fn clear(&self) {
        self.write_words(|bytes| bytes.fill(0));
    }

    /// Add `value`; out-of-range values are ignored
    pub fn save(&self, value: u32) {
        self.update(value, |word, mask| word | mask);
    }

    /// Remove `value`; out-of-range values are ignored
    pub fn drop_value(&self, value: u32) {
        self.update(value, |word, mask| word & !mask);
    }

    /// Whether `value` is present (false when out of range)
    pub fn check(&self, value: u32) -> bool {
        let Some((word, mask)) = self.locate(value) else {
            return false;
        };
        self.read_words(|bytes| {
            load_word(&bytes[word * WORD_BYTES..(word + 1) * WORD_BYTES]) & mask == mask
        })
        .unwrap_or(false)
    }

    /// Lowest value not present, `None` when every bit is set
    pub fn find_first_free(&self) -> Option<u32> {
        self.read_words(|bytes| {
            bytes
                .chunks_exact(WORD_BYTES)
                .enumerate()
                .find_map(|(index, chunk)| {
                    let word = load_word(chunk);
                    (word != u32::MAX)
                        .then(|| index as u32 * BITS_PER_WORD + lowest_zero_bit(word))
                })
        })
        .flatten()
    }

    /// Number of values present
    pub fn count_set(&self) -> u32 {
        self.read_words(|bytes| {
            bytes
                .chunks_exact(WORD_BYTES)
                .map(|chunk| load_word(chunk).count_ones())
                .sum()
        })
        .unwrap_or(0)
    }
}

#[inline]
fn load_word(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; WORD_BYTES];
    raw.copy_from_slice(bytes);
    u32::from_le_bytes(raw)
}

/// Low `width` bits set
#[inline]
const fn fill_bits(width: u32) -> u32 {
    if width >= BITS_PER_WORD {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// Position of the lowest zero bit by binary halving
///
/// While the lower half of the remaining width is all ones, the zero must be
/// above it: skip that half and shift it out.
fn lowest_zero_bit(mut value: u32) -> u32 {
    let mut width = BITS_PER_WORD;
    let mut position = 0;

    while width != 0 && value != 0 {
        width /= 2;
        let mask = fill_bits(width);
        if value & mask == mask {
            position += width;
            value >>= width;
        }
    }

    position
}

impl Drop for Bitmap {
    fn drop(&mut self) {
        self.heap.free(self.block);
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("capacity", &self.capacity())
            .field("set", &self.count_set())
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
    fn test_lowest_zero_bit() {
        assert_eq!(lowest_zero_bit(0), 0);
        assert_eq!(lowest_zero_bit(0b0111), 3);
        assert_eq!(lowest_zero_bit(0b1011), 2);
        assert_eq!(lowest_zero_bit(0x0000_FFFF), 16);
        assert_eq!(lowest_zero_bit(0x7FFF_FFFF), 31);
        assert_eq!(lowest_zero_bit(0xFFFF_FFFE), 0);

        for bit in 0..32 {
            let value = fill_bits(bit);
            assert_eq!(lowest_zero_bit(value), bit, "value {:#x}", value);
        }
    }

    #[test]
    fn test_capacity_truncates() {
        let heap = heap();
        let bitmap = Bitmap::new(&heap, 100, heap.default_pool()).unwrap();
        assert_eq!(bitmap.capacity(), 96);
        assert_eq!(bitmap.word_count(), 3);

        // 96..100 are silently unsupported
        bitmap.save(97);
        assert!(!bitmap.check(97));
        bitmap.save(95);
        assert!(bitmap.check(95));
    }

    #[test]
    fn test_rejects_sub_word_max() {
        let heap = heap();
        assert!(matches!(
            Bitmap::new(&heap, 31, heap.default_pool()),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(heap.is_clean_all());
    }

    #[test]
    fn test_find_first_free_skips_full_words() {
        let heap = heap();
        let bitmap = Bitmap::new(&heap, 64, heap.default_pool()).unwrap();
        for value in 0..35 {
            bitmap.save(value);
        }
        assert_eq!(bitmap.find_first_free(), Some(35));

        bitmap.drop_value(7);
        assert_eq!(bitmap.find_first_free(), Some(7));
        assert_eq!(bitmap.count_set(), 34);
    }

    #[test]
    fn test_out_of_range_drop_and_check() {
        let heap = heap();
        let bitmap = Bitmap::new(&heap, 32, heap.default_pool()).unwrap();
        bitmap.drop_value(1000);
        assert!(!bitmap.check(1000));
        assert!(!bitmap.check(u32::MAX));
    }

    #[test]
    fn test_drop_frees_block() {
        let heap = heap();
        let bitmap = Bitmap::new(&heap, 256, heap.default_pool()).unwrap();
        assert!(!heap.is_clean_all());
        drop(bitmap);
        assert!(heap.is_clean_all());
    }
}
