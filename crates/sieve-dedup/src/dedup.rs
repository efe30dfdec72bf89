//! Duplicate clustering over a built [`MinHashLSH`].
//!
//! Every record is queried against the index, and each hit is merged into
//! the record's cluster with a union-find. The resulting "is duplicate of"
//! relation is the transitive closure of the pairwise query results: two
//! records below the threshold can share a group when an intermediate
//! record is above it with both. That is the intended grouping.

use crate::cluster::UnionFind;
use crate::config::resolve_threshold;
use crate::lsh::MinHashLSH;
use rayon::prelude::*;
use serde::Serialize;
use sieve_core::Result;
use tracing::info;

/// Summary of a deduplication pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupStats {
    /// Number of records.
    pub total: usize,
    /// Number of groups (records kept after deduplication).
    pub unique: usize,
    /// Records that duplicate an earlier record of their group.
    pub duplicates: usize,
    /// `duplicates / total`, 0 for an empty corpus.
    pub duplicate_ratio: f64,
    /// Size of the largest group.
    pub largest_group: usize,
}

/// Partition of all record ids into duplicate groups.
#[derive(Debug)]
pub struct DeduplicationIndex<'a> {
    lsh: &'a MinHashLSH,
    threshold: f64,
    groups: Vec<Vec<usize>>,
    group_of: Vec<usize>,
}

impl<'a> DeduplicationIndex<'a> {
    /// Cluster every record of `lsh` at `threshold`.
    ///
    /// `None` uses [`DEFAULT_THRESHOLD`](crate::config::DEFAULT_THRESHOLD).
    pub fn new(lsh: &'a MinHashLSH, threshold: Option<f64>) -> Result<Self> {
        let threshold = resolve_threshold(threshold)?;
        let minhashes = lsh.get_minhash_index();

        // Queries are read-only; unions stay single-threaded.
        let hits: Vec<Vec<usize>> = minhashes
            .par_iter()
            .map(|minhash| lsh.query(minhash, Some(threshold)))
            .collect::<Result<_>>()?;

        let mut uf = UnionFind::new(minhashes.len());
        let mut edges = 0usize;
        for (id, matches) in hits.iter().enumerate() {
            for &other in matches {
                uf.union(id, other);
            }
            edges += matches.len();
        }

        let groups = uf.groups();
        let mut group_of = vec![0; minhashes.len()];
        for (g, members) in groups.iter().enumerate() {
            for &id in members {
                group_of[id] = g;
            }
        }

        info!(
            records = minhashes.len(),
            groups = groups.len(),
            edges,
            threshold,
            "clustered duplicates"
        );

        Ok(Self {
            lsh,
            threshold,
            groups,
            group_of,
        })
    }

    /// The index this partition was computed from.
    #[must_use]
    pub fn lsh(&self) -> &MinHashLSH {
        self.lsh
    }

    /// Threshold the partition was computed at.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// All groups: members ascending, groups ordered by smallest member.
    /// Records without duplicates appear as singletons.
    #[must_use]
    pub fn grouped_indices(&self) -> &[Vec<usize>] {
        &self.groups
    }

    /// Number of groups.
    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Groups with more than one member.
    pub fn duplicate_groups(&self) -> impl Iterator<Item = &[usize]> {
        self.groups
            .iter()
            .filter(|g| g.len() > 1)
            .map(Vec::as_slice)
    }

    /// Position in [`grouped_indices`](Self::grouped_indices) of the group
    /// holding `id`.
    #[must_use]
    pub fn group_of(&self, id: usize) -> Option<usize> {
        self.group_of.get(id).copied()
    }

    /// The smallest id of every group, ascending: what a deduplicated
    /// output keeps.
    #[must_use]
    pub fn keep_indices(&self) -> Vec<usize> {
        self.groups.iter().map(|g| g[0]).collect()
    }

    /// Totals for reporting.
    #[must_use]
    pub fn stats(&self) -> DedupStats {
        let total = self.group_of.len();
        let unique = self.groups.len();
        let duplicates = total - unique;
        DedupStats {
            total,
            unique,
            duplicates,
            duplicate_ratio: if total > 0 {
                duplicates as f64 / total as f64
            } else {
                0.0
            },
            largest_group: self.groups.iter().map(Vec::len).max().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LshConfig;
    use sieve_core::SieveError;

    fn build(records: &[&str], num_perm: usize, num_bands: usize, seed: u64) -> MinHashLSH {
        MinHashLSH::with_config(records, &LshConfig::new(num_perm, num_bands).with_seed(seed))
            .unwrap()
    }

    #[test]
    fn test_near_duplicates_grouped() {
        let lsh = build(&["the cat sat", "the cat sat.", "a dog ran"], 32, 8, 42);
        let dedup = DeduplicationIndex::new(&lsh, Some(0.6)).unwrap();
        assert_eq!(dedup.grouped_indices(), &[vec![0, 1], vec![2]]);
        assert_eq!(dedup.keep_indices(), vec![0, 2]);
        assert_eq!(dedup.group_of(1), Some(0));
        assert_eq!(dedup.group_of(2), Some(1));
        assert_eq!(dedup.group_of(3), None);
    }

    #[test]
    fn test_identical_records_one_group() {
        let text = "exactly the same words";
        let lsh = build(&[text, text, text], 64, 16, 1);
        for threshold in [0.0, 0.5, 1.0] {
            let dedup = DeduplicationIndex::new(&lsh, Some(threshold)).unwrap();
            assert_eq!(dedup.grouped_indices(), &[vec![0, 1, 2]]);
        }
    }

    #[test]
    fn test_default_threshold() {
        let lsh = build(&["abc"], 8, 4, 0);
        let dedup = DeduplicationIndex::new(&lsh, None).unwrap();
        assert!((dedup.threshold() - crate::config::DEFAULT_THRESHOLD).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bad_threshold() {
        let lsh = build(&["abc"], 8, 4, 0);
        assert!(matches!(
            DeduplicationIndex::new(&lsh, Some(2.0)),
            Err(SieveError::Configuration(_))
        ));
    }

    #[test]
    fn test_stats() {
        let lsh = build(&["same", "same", "same", "other words here"], 64, 16, 5);
        let dedup = DeduplicationIndex::new(&lsh, Some(0.9)).unwrap();
        let stats = dedup.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.unique, 2);
        assert_eq!(stats.duplicates, 2);
        assert_eq!(stats.largest_group, 3);
        assert!((stats.duplicate_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(dedup.duplicate_groups().count(), 1);
    }

    #[test]
    fn test_empty_corpus() {
        let lsh = build(&[], 8, 2, 0);
        let dedup = DeduplicationIndex::new(&lsh, None).unwrap();
        assert!(dedup.grouped_indices().is_empty());
        assert_eq!(dedup.stats().duplicate_ratio, 0.0);
        assert_eq!(dedup.stats().largest_group, 0);
    }

    #[test]
    fn test_grouped_indices_idempotent() {
        let lsh = build(&["a b c d", "a b c e", "x y z", "a b c d"], 64, 32, 77);
        let dedup = DeduplicationIndex::new(&lsh, Some(0.5)).unwrap();
        let first = dedup.grouped_indices().to_vec();
        assert_eq!(first, dedup.grouped_indices());
        assert_eq!(dedup.lsh().len(), 4);
    }
}
