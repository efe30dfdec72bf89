//! Hashing primitives shared by signature generation and banding.
//!
//! Everything here is built on xxh3, which is fast and stable across
//! platforms and releases, so signatures computed from the same seed are
//! reproducible.

/// Hash with seed for MinHash-style algorithms.
#[inline]
pub fn hash_with_seed(data: &[u8], seed: u64) -> u64 {
    xxhash_rust::xxh3::xxh3_64_with_seed(data, seed)
}

/// Hash a single token (shingle) to the 64-bit universe fed to permutations.
#[inline]
pub fn hash_token(token: &str) -> u64 {
    hash_with_seed(token.as_bytes(), 0)
}

/// Apply one `(a, b)` multiply-shift permutation to a token hash.
///
/// Computes `(a * x + b) mod 2^64` and keeps the high 32 bits, which form a
/// universal family over 64-bit keys.
#[inline]
pub fn permute_hash(hash: u64, a: u64, b: u64) -> u32 {
    (a.wrapping_mul(hash).wrapping_add(b) >> 32) as u32
}

/// Hash the rows of one signature band to a bucket key.
#[inline]
pub fn hash_band(rows: &[u32]) -> u64 {
    let mut bytes = Vec::with_capacity(rows.len() * 4);
    for row in rows {
        bytes.extend_from_slice(&row.to_le_bytes());
    }
    hash_with_seed(&bytes, 0)
}
