//! String hashes for [`PoolMap`](super::PoolMap) bucket selection

/// Deterministic hash over a key's bytes
pub type StrHash = fn(&[u8]) -> u32;

/// BKDR hash (seed 131), masked to 31 bits
pub fn bkdr_hash(key: &[u8]) -> u32 {
    const SEED: u32 = 131;

    key.iter()
        .fold(0u32, |hash, &byte| hash.wrapping_mul(SEED).wrapping_add(byte as u32))
        & 0x7FFF_FFFF
}

/// Bernstein's djb2 (`hash * 33 + c`)
pub fn djb2_hash(key: &[u8]) -> u32 {
    key.iter().fold(5381u32, |hash, &byte| {
        (hash << 5).wrapping_add(hash).wrapping_add(byte as u32)
    })
}

/// 32-bit FNV-1a
pub fn fnv1a_hash(key: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811C_9DC5;
    const PRIME: u32 = 0x0100_0193;

    key.iter().fold(OFFSET_BASIS, |hash, &byte| {
        (hash ^ byte as u32).wrapping_mul(PRIME)
    })
}
