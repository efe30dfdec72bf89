//! # sieve-dedup
//!
//! Near-duplicate detection for text records with MinHash LSH.
//!
//! Records are shingled, summarized as MinHash signatures, and bucketed by
//! banded sub-hashes so that candidate retrieval avoids all-pairs
//! comparison. A clustering pass turns per-record query results into
//! disjoint duplicate groups with a union-find.
//!
//! ## Quick Start
//!
//! ```
//! use sieve_dedup::{DeduplicationIndex, LshConfig, MinHashLSH};
//!
//! # fn main() -> sieve_dedup::Result<()> {
//! let records = ["the cat sat", "the cat sat.", "a dog ran"];
//! let config = LshConfig::new(32, 8).with_seed(42);
//! let lsh = MinHashLSH::with_config(&records, &config)?;
//!
//! let dedup = DeduplicationIndex::new(&lsh, Some(0.6))?;
//! assert_eq!(dedup.grouped_indices().len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`shingle`]: fixed tokenization schemes for raw records
//! - [`minhash`]: permutation sets, signatures and comparable handles
//! - [`lsh`]: the banded index and similarity queries
//! - [`cluster`]: union-find
//! - [`dedup`]: grouping all records into duplicate clusters
//! - [`config`]: index parameters and thresholds
//! - [`io`]: JSON Lines input and output

pub mod cluster;
pub mod config;
pub mod dedup;
pub mod io;
pub mod lsh;
pub mod minhash;
pub mod shingle;

pub use config::{LshConfig, DEFAULT_NUM_BANDS, DEFAULT_NUM_PERM, DEFAULT_THRESHOLD};
pub use dedup::{DedupStats, DeduplicationIndex};
pub use io::{read_jsonl, write_groups_jsonl, write_jsonl, Document, IoError};
pub use lsh::MinHashLSH;
pub use minhash::{MinHash, MinHashSignature, PermutationSet};
pub use shingle::Shingling;
pub use sieve_core::{Result, SieveError};
