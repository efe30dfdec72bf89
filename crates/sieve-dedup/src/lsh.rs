//! Locality-Sensitive Hashing (LSH) index over MinHash signatures.
//!
//! Each signature is divided into `num_bands` bands of `rows_per_band`
//! consecutive slots. Each band is hashed to a bucket key, and records
//! sharing a key in any band become candidates. Candidates are then
//! filtered on estimated Jaccard similarity, so retrieval never compares a
//! query against the whole corpus.

use crate::config::{resolve_threshold, LshConfig};
use crate::minhash::{MinHash, MinHashSignature, PermutationSet};
use crate::shingle::Shingling;
use rayon::prelude::*;
use sieve_core::{hash_band, hash_token, Result, SieveError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Banded bucket tables: `band -> band hash -> record ids`.
#[derive(Debug)]
struct BandedIndex {
    rows_per_band: usize,
    buckets: Vec<HashMap<u64, Vec<usize>>>,
}

impl BandedIndex {
    fn new(num_bands: usize, rows_per_band: usize) -> Self {
        Self {
            rows_per_band,
            buckets: (0..num_bands).map(|_| HashMap::new()).collect(),
        }
    }

    fn num_bands(&self) -> usize {
        self.buckets.len()
    }

    /// Bucket key of every band of `values`, in band order.
    fn band_keys(&self, values: &[u32]) -> Vec<u64> {
        values
            .chunks_exact(self.rows_per_band)
            .take(self.num_bands())
            .map(hash_band)
            .collect()
    }

    fn insert(&mut self, id: usize, keys: &[u64]) {
        for (table, &key) in self.buckets.iter_mut().zip(keys) {
            table.entry(key).or_default().push(id);
        }
    }

    /// Union of every bucket the keys land in.
    fn collect(&self, keys: &[u64]) -> HashSet<usize> {
        let mut out = HashSet::new();
        for (table, key) in self.buckets.iter().zip(keys) {
            if let Some(ids) = table.get(key) {
                out.extend(ids.iter().copied());
            }
        }
        out
    }

    fn num_buckets(&self) -> usize {
        self.buckets.iter().map(HashMap::len).sum()
    }

    fn num_collision_buckets(&self) -> usize {
        self.buckets
            .iter()
            .flat_map(HashMap::values)
            .filter(|ids| ids.len() > 1)
            .count()
    }
}

/// MinHash LSH index built once over a batch of records.
///
/// Owns one [`MinHash`] per record (indexed by record id), the permutation
/// set they share, and the banded bucket tables. Immutable after
/// construction.
#[derive(Debug)]
pub struct MinHashLSH {
    permutations: Arc<PermutationSet>,
    minhashes: Vec<MinHash>,
    bands: BandedIndex,
    shingling: Shingling,
    empty_records: usize,
}

impl MinHashLSH {
    /// Build an index over raw records with a fresh random seed and the
    /// default [`Shingling`].
    ///
    /// # Arguments
    /// * `records` - The records to index; record ids are their positions.
    /// * `num_perm` - Number of MinHash permutations.
    /// * `num_bands` - Number of bands; must divide `num_perm`.
    pub fn new<S>(records: &[S], num_perm: usize, num_bands: usize) -> Result<Self>
    where
        S: AsRef<str> + Sync,
    {
        Self::with_config(records, &LshConfig::new(num_perm, num_bands))
    }

    /// Build an index over raw records, shingled with `config.shingling`.
    pub fn with_config<S>(records: &[S], config: &LshConfig) -> Result<Self>
    where
        S: AsRef<str> + Sync,
    {
        config.validate()?;
        let shingling = config.shingling;
        let token_sets: Vec<HashSet<u64>> = records
            .par_iter()
            .map(|record| shingling.token_hashes(record.as_ref()))
            .collect();
        Self::build(token_sets, config)
    }

    /// Build an index over externally tokenized records.
    ///
    /// `config.shingling` is recorded but not applied; each inner sequence is
    /// taken as the record's token set as-is.
    pub fn from_token_sets<T, S>(token_sets: &[T], config: &LshConfig) -> Result<Self>
    where
        T: AsRef<[S]> + Sync,
        S: AsRef<str>,
    {
        config.validate()?;
        let token_sets: Vec<HashSet<u64>> = token_sets
            .par_iter()
            .map(|tokens| {
                tokens
                    .as_ref()
                    .iter()
                    .map(|t| hash_token(t.as_ref()))
                    .collect()
            })
            .collect();
        Self::build(token_sets, config)
    }

    fn build(token_sets: Vec<HashSet<u64>>, config: &LshConfig) -> Result<Self> {
        let permutations = Arc::new(match config.seed {
            Some(seed) => PermutationSet::new(config.num_perm, seed),
            None => PermutationSet::from_entropy(config.num_perm),
        });
        let mut bands = BandedIndex::new(config.num_bands, config.rows_per_band());
        debug!(
            records = token_sets.len(),
            num_perm = config.num_perm,
            num_bands = config.num_bands,
            rows_per_band = config.rows_per_band(),
            seed = permutations.seed(),
            "building MinHash LSH index"
        );

        // Signatures and band keys are independent per record.
        let signed: Vec<(MinHashSignature, Vec<u64>)> = token_sets
            .par_iter()
            .map(|tokens| {
                let signature = permutations.signature(tokens);
                let keys = bands.band_keys(&signature.values);
                (signature, keys)
            })
            .collect();

        // Single writer: buckets list ids in ascending order.
        let mut minhashes = Vec::with_capacity(signed.len());
        for (id, (signature, keys)) in signed.into_iter().enumerate() {
            bands.insert(id, &keys);
            minhashes.push(MinHash::new(id, signature, Arc::clone(&permutations)));
        }

        let empty_records = token_sets.iter().filter(|t| t.is_empty()).count();
        if empty_records > 0 {
            warn!(
                empty_records,
                "records without shingles share one degenerate signature and will group together"
            );
        }

        info!(
            records = minhashes.len(),
            buckets = bands.num_buckets(),
            collision_buckets = bands.num_collision_buckets(),
            "built MinHash LSH index"
        );

        Ok(Self {
            permutations,
            minhashes,
            bands,
            shingling: config.shingling,
            empty_records,
        })
    }

    /// All handles, indexed by record id.
    #[must_use]
    pub fn get_minhash_index(&self) -> &[MinHash] {
        &self.minhashes
    }

    /// Handle of one record.
    #[must_use]
    pub fn minhash(&self, id: usize) -> Option<&MinHash> {
        self.minhashes.get(id)
    }

    /// Query the index for records similar to `minhash`.
    ///
    /// # Arguments
    /// * `minhash` - Handle to query for; must share this index's permutations.
    /// * `threshold` - Inclusive minimum estimated similarity; `None` uses
    ///   [`DEFAULT_THRESHOLD`](crate::config::DEFAULT_THRESHOLD).
    ///
    /// Returns matching record ids in ascending order, never including the
    /// query's own record.
    pub fn query(&self, minhash: &MinHash, threshold: Option<f64>) -> Result<Vec<usize>> {
        let threshold = resolve_threshold(threshold)?;
        self.check_compatible(minhash)?;

        let mut matches: Vec<usize> = self
            .candidate_set(minhash)
            .into_iter()
            .filter(|&id| self.minhashes[id].agreement(minhash) >= threshold)
            .collect();
        matches.sort_unstable();
        Ok(matches)
    }

    /// Records sharing at least one band bucket with `minhash`, ascending,
    /// before any similarity filtering.
    pub fn candidates(&self, minhash: &MinHash) -> Result<Vec<usize>> {
        self.check_compatible(minhash)?;
        let mut ids: Vec<usize> = self.candidate_set(minhash).into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn candidate_set(&self, minhash: &MinHash) -> HashSet<usize> {
        let keys = self.bands.band_keys(minhash.signature());
        let mut ids = self.bands.collect(&keys);
        if self.owns(minhash) {
            ids.remove(&minhash.id());
        }
        ids
    }

    fn owns(&self, minhash: &MinHash) -> bool {
        Arc::ptr_eq(minhash.permutations(), &self.permutations)
    }

    fn check_compatible(&self, minhash: &MinHash) -> Result<()> {
        if self.owns(minhash) || minhash.fingerprint() == self.permutations.fingerprint() {
            Ok(())
        } else {
            Err(SieveError::IncompatibleSignature {
                expected: self.permutations.fingerprint(),
                found: minhash.fingerprint(),
            })
        }
    }

    /// Number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.minhashes.len()
    }

    /// True if no records were indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.minhashes.is_empty()
    }

    /// Number of permutations.
    #[must_use]
    pub fn num_perm(&self) -> usize {
        self.permutations.num_perm()
    }

    /// Number of bands.
    #[must_use]
    pub fn num_bands(&self) -> usize {
        self.bands.num_bands()
    }

    /// Rows (signature slots) per band.
    #[must_use]
    pub fn rows_per_band(&self) -> usize {
        self.bands.rows_per_band
    }

    /// Seed of the permutation set, for rebuilding an identical index.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.permutations.seed()
    }

    /// Fingerprint of the permutation set.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.permutations.fingerprint()
    }

    /// Shingling scheme the index was built with.
    #[must_use]
    pub fn shingling(&self) -> Shingling {
        self.shingling
    }

    /// Records that produced no shingles.
    #[must_use]
    pub fn empty_records(&self) -> usize {
        self.empty_records
    }

    /// Total non-empty buckets across all bands.
    #[must_use]
    pub fn num_buckets(&self) -> usize {
        self.bands.num_buckets()
    }

    /// Buckets holding more than one record.
    #[must_use]
    pub fn num_collision_buckets(&self) -> usize {
        self.bands.num_collision_buckets()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(num_perm: usize, num_bands: usize, seed: u64) -> LshConfig {
        LshConfig::new(num_perm, num_bands).with_seed(seed)
    }

    #[test]
    fn test_indivisible_bands_fail_construction() {
        let err = MinHashLSH::new(&["a b c"], 16, 5).unwrap_err();
        assert!(matches!(err, SieveError::Configuration(_)));
    }

    #[test]
    fn test_zero_counts_fail_construction() {
        assert!(MinHashLSH::new(&["a"], 0, 1).is_err());
        assert!(MinHashLSH::new(&["a"], 8, 0).is_err());
    }

    #[test]
    fn test_band_layout() {
        let lsh = MinHashLSH::with_config(&["one", "two"], &seeded(32, 8, 1)).unwrap();
        assert_eq!(lsh.num_perm(), 32);
        assert_eq!(lsh.num_bands(), 8);
        assert_eq!(lsh.rows_per_band(), 4);
        assert_eq!(lsh.len(), 2);
        assert!(lsh
            .get_minhash_index()
            .iter()
            .all(|m| m.num_perm() == 32));
    }

    #[test]
    fn test_identical_records_are_candidates_in_every_band() {
        let text = "The quick brown fox jumps over the lazy dog";
        let lsh = MinHashLSH::with_config(&[text, text], &seeded(128, 32, 3)).unwrap();

        // One bucket per band, each holding both records.
        assert_eq!(lsh.num_buckets(), 32);
        assert_eq!(lsh.num_collision_buckets(), 32);

        let first = lsh.minhash(0).unwrap();
        assert_eq!(lsh.candidates(first).unwrap(), vec![1]);
        assert_eq!(lsh.query(first, Some(1.0)).unwrap(), vec![1]);
    }

    #[test]
    fn test_query_excludes_self() {
        let lsh = MinHashLSH::with_config(&["lonely record"], &seeded(16, 4, 5)).unwrap();
        let only = lsh.minhash(0).unwrap();
        assert!(lsh.query(only, Some(0.0)).unwrap().is_empty());
        assert!(lsh.candidates(only).unwrap().is_empty());
    }

    #[test]
    fn test_query_results_sorted_and_deduplicated() {
        let text = "same same same";
        let records = vec![text; 6];
        let lsh = MinHashLSH::with_config(&records, &seeded(64, 16, 11)).unwrap();

        let hits = lsh.query(lsh.minhash(3).unwrap(), None).unwrap();
        assert_eq!(hits, vec![0, 1, 2, 4, 5]);
    }

    #[test]
    fn test_query_threshold_filters_candidates() {
        let records = [
            "the quick brown fox jumps over the lazy dog",
            "the quick brown fox jumps over the lazy cat",
            "an entirely unrelated sentence about tax law",
        ];
        let lsh = MinHashLSH::with_config(&records, &seeded(128, 64, 21)).unwrap();
        let q = lsh.minhash(0).unwrap();

        let loose = lsh.query(q, Some(0.0)).unwrap();
        let strict = lsh.query(q, Some(1.0)).unwrap();
        assert!(strict.is_empty());
        assert!(loose.contains(&1));
        let candidates = lsh.candidates(q).unwrap();
        assert!(loose.iter().all(|id| candidates.contains(id)));
    }

    #[test]
    fn test_query_rejects_bad_threshold() {
        let lsh = MinHashLSH::with_config(&["abc"], &seeded(8, 2, 1)).unwrap();
        let q = lsh.minhash(0).unwrap();
        assert!(matches!(
            lsh.query(q, Some(1.5)),
            Err(SieveError::Configuration(_))
        ));
    }

    #[test]
    fn test_query_with_foreign_handle_fails() {
        let a = MinHashLSH::with_config(&["shared text"], &seeded(32, 8, 1)).unwrap();
        let b = MinHashLSH::with_config(&["shared text"], &seeded(32, 8, 2)).unwrap();

        let err = a.query(b.minhash(0).unwrap(), None).unwrap_err();
        assert!(matches!(err, SieveError::IncompatibleSignature { .. }));
        assert!(a.candidates(b.minhash(0).unwrap()).is_err());
    }

    #[test]
    fn test_query_with_same_seed_handle_keeps_matching_record() {
        let a = MinHashLSH::with_config(&["shared text"], &seeded(32, 8, 9)).unwrap();
        let b = MinHashLSH::with_config(&["shared text"], &seeded(32, 8, 9)).unwrap();

        // Same permutations, different owner: record 0 of `a` is a real match.
        assert_eq!(a.query(b.minhash(0).unwrap(), Some(1.0)).unwrap(), vec![0]);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let records = ["alpha beta", "gamma delta"];
        let a = MinHashLSH::with_config(&records, &seeded(64, 16, 1234)).unwrap();
        let b = MinHashLSH::with_config(&records, &seeded(64, 16, a.seed())).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        for (x, y) in a.get_minhash_index().iter().zip(b.get_minhash_index()) {
            assert_eq!(x.signature(), y.signature());
        }
    }

    #[test]
    fn test_random_seeds_differ() {
        let a = MinHashLSH::new(&["x"], 16, 4).unwrap();
        let b = MinHashLSH::new(&["x"], 16, 4).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_empty_records_collide() {
        let lsh = MinHashLSH::with_config(&["", "content", ""], &seeded(16, 4, 8)).unwrap();
        assert_eq!(lsh.empty_records(), 2);
        let empty = lsh.minhash(0).unwrap();
        assert!(empty.is_empty_signature());
        assert_eq!(lsh.query(empty, Some(1.0)).unwrap(), vec![2]);
    }

    #[test]
    fn test_from_token_sets() {
        let sets = vec![
            vec!["a", "b", "c", "d"],
            vec!["a", "b", "c", "d"],
            vec!["w", "x", "y", "z"],
        ];
        let lsh = MinHashLSH::from_token_sets(&sets, &seeded(64, 16, 4)).unwrap();
        let hits = lsh.query(lsh.minhash(0).unwrap(), Some(0.9)).unwrap();
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn test_empty_corpus() {
        let records: Vec<String> = Vec::new();
        let lsh = MinHashLSH::with_config(&records, &seeded(16, 4, 0)).unwrap();
        assert!(lsh.is_empty());
        assert_eq!(lsh.num_buckets(), 0);
    }
}
