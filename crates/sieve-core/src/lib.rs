//! # sieve-core
//!
//! Shared infrastructure for the sieve deduplication crates.
//!
//! Provides:
//! - Error types (`SieveError`, `Result`)
//! - Hashing primitives (xxh3 token, band and seeded hashing)

pub mod error;
pub mod hashing;

pub use error::{Result, SieveError};
pub use hashing::{hash_band, hash_token, hash_with_seed, permute_hash};
