//! MinHash signature generation for document similarity.
//!
//! MinHash is a locality-sensitive hashing technique that approximates
//! the Jaccard similarity between sets. A [`PermutationSet`] holds the
//! `num_perm` coefficient pairs of a multiply-shift universal hash family;
//! every signature in one index is drawn from the same set, and a
//! [`MinHash`] handle carries a reference to that set so comparisons
//! across sets are caught instead of silently computed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sieve_core::{hash_with_seed, permute_hash, Result, SieveError};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Signature value of an empty token set, in every position.
pub const EMPTY_SLOT: u32 = u32::MAX;

/// MinHash signature - a compact representation of a document's shingle set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinHashSignature {
    /// The minimum permuted hash for each permutation.
    pub values: Vec<u32>,
}

impl MinHashSignature {
    /// Create a new signature with the given values.
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self { values }
    }

    /// Get the number of permutations in this signature.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the signature has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every slot holds the empty-set sentinel.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.values.iter().all(|&v| v == EMPTY_SLOT)
    }

    /// Fraction of positions where the two signatures agree.
    fn agreement(&self, other: &Self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let matches = self
            .values
            .iter()
            .zip(&other.values)
            .filter(|(a, b)| a == b)
            .count();
        matches as f64 / self.values.len() as f64
    }
}

/// The seeded `(a, b)` coefficient pairs shared by every signature of one index.
pub struct PermutationSet {
    seed: u64,
    coefficients: Vec<(u64, u64)>,
    fingerprint: u64,
}

impl PermutationSet {
    /// Derive `num_perm` permutations from `seed`.
    #[must_use]
    pub fn new(num_perm: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        // Odd multipliers keep each permutation a bijection on the 64-bit
        // universe before the shift.
        let coefficients: Vec<(u64, u64)> = (0..num_perm)
            .map(|_| (rng.gen::<u64>() | 1, rng.gen()))
            .collect();

        let mut bytes = Vec::with_capacity(8 + coefficients.len() * 16);
        bytes.extend_from_slice(&(num_perm as u64).to_le_bytes());
        for (a, b) in &coefficients {
            bytes.extend_from_slice(&a.to_le_bytes());
            bytes.extend_from_slice(&b.to_le_bytes());
        }
        let fingerprint = hash_with_seed(&bytes, seed);

        Self {
            seed,
            coefficients,
            fingerprint,
        }
    }

    /// Derive permutations from a freshly drawn seed.
    #[must_use]
    pub fn from_entropy(num_perm: usize) -> Self {
        Self::new(num_perm, rand::thread_rng().gen())
    }

    /// Seed the coefficients were drawn from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of permutations.
    #[must_use]
    pub fn num_perm(&self) -> usize {
        self.coefficients.len()
    }

    /// Compatibility tag: equal only for identical coefficient sets.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Generate a MinHash signature from a set of token hashes.
    ///
    /// Each token hash is permuted by every `(a, b)` pair, and the minimum
    /// value is kept per permutation. An empty set yields [`EMPTY_SLOT`]
    /// everywhere.
    #[must_use]
    pub fn signature(&self, tokens: &HashSet<u64>) -> MinHashSignature {
        let mut min_hashes = vec![EMPTY_SLOT; self.coefficients.len()];

        for &token in tokens {
            for (slot, &(a, b)) in min_hashes.iter_mut().zip(&self.coefficients) {
                *slot = (*slot).min(permute_hash(token, a, b));
            }
        }

        MinHashSignature::new(min_hashes)
    }
}

impl fmt::Debug for PermutationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermutationSet")
            .field("seed", &self.seed)
            .field("num_perm", &self.num_perm())
            .field("fingerprint", &format_args!("{:#018x}", self.fingerprint))
            .finish()
    }
}

/// Read-only handle to one record's signature inside a built index.
///
/// Handles are only created by [`MinHashLSH`](crate::lsh::MinHashLSH) and
/// keep a reference to the permutation set that produced them.
#[derive(Clone)]
pub struct MinHash {
    id: usize,
    signature: MinHashSignature,
    permutations: Arc<PermutationSet>,
}

impl MinHash {
    pub(crate) fn new(
        id: usize,
        signature: MinHashSignature,
        permutations: Arc<PermutationSet>,
    ) -> Self {
        Self {
            id,
            signature,
            permutations,
        }
    }

    /// Record id this signature was built from.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// The raw signature values.
    #[must_use]
    pub fn signature(&self) -> &[u32] {
        &self.signature.values
    }

    /// Signature length.
    #[must_use]
    pub fn num_perm(&self) -> usize {
        self.signature.len()
    }

    /// Fingerprint of the owning permutation set.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.permutations.fingerprint()
    }

    /// True if the record had no shingles.
    #[must_use]
    pub fn is_empty_signature(&self) -> bool {
        self.signature.is_degenerate()
    }

    /// Whether the two handles were drawn from the same permutation set.
    #[must_use]
    pub fn is_compatible(&self, other: &MinHash) -> bool {
        Arc::ptr_eq(&self.permutations, &other.permutations)
            || self.fingerprint() == other.fingerprint()
    }

    pub(crate) fn permutations(&self) -> &Arc<PermutationSet> {
        &self.permutations
    }

    /// Estimate Jaccard similarity as the fraction of agreeing slots.
    ///
    /// Fails with [`SieveError::IncompatibleSignature`] if `other` comes from
    /// a different permutation set.
    pub fn jaccard_similarity(&self, other: &MinHash) -> Result<f64> {
        if !self.is_compatible(other) {
            return Err(SieveError::IncompatibleSignature {
                expected: self.fingerprint(),
                found: other.fingerprint(),
            });
        }
        Ok(self.signature.agreement(&other.signature))
    }

    /// Similarity without the compatibility check, for callers that already did it.
    pub(crate) fn agreement(&self, other: &MinHash) -> f64 {
        self.signature.agreement(&other.signature)
    }
}

impl fmt::Debug for MinHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinHash")
            .field("id", &self.id)
            .field("num_perm", &self.num_perm())
            .field("fingerprint", &format_args!("{:#018x}", self.fingerprint()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shingle::Shingling;

    fn handle(id: usize, text: &str, perms: &Arc<PermutationSet>) -> MinHash {
        let tokens = Shingling::default().token_hashes(text);
        MinHash::new(id, perms.signature(&tokens), Arc::clone(perms))
    }

    #[test]
    fn test_identical_documents() {
        let perms = Arc::new(PermutationSet::new(128, 42));
        let text = "The quick brown fox jumps over the lazy dog";

        let a = handle(0, text, &perms);
        let b = handle(1, text, &perms);

        let similarity = a.jaccard_similarity(&b).unwrap();
        assert!(
            (similarity - 1.0).abs() < f64::EPSILON,
            "Identical documents should have similarity 1.0, got {similarity}"
        );
    }

    #[test]
    fn test_different_documents() {
        let perms = Arc::new(PermutationSet::new(128, 42));
        let a = handle(0, "The quick brown fox jumps over the lazy dog", &perms);
        let b = handle(1, "Completely different text about machine learning", &perms);

        let similarity = a.jaccard_similarity(&b).unwrap();
        assert!(
            similarity < 0.3,
            "Different documents should have low similarity, got {similarity}"
        );
    }

    #[test]
    fn test_empty_document() {
        let perms = PermutationSet::new(64, 1);
        let sig = perms.signature(&HashSet::new());

        assert_eq!(sig.len(), 64);
        assert!(sig.is_degenerate());
        assert!(sig.values.iter().all(|&v| v == EMPTY_SLOT));
    }

    #[test]
    fn test_signature_length() {
        for num_perm in [16, 64, 128, 256] {
            let perms = PermutationSet::new(num_perm, 9);
            let tokens = Shingling::default().token_hashes("Some test document");
            assert_eq!(perms.signature(&tokens).len(), num_perm);
        }
    }

    #[test]
    fn test_reproducibility() {
        let p1 = PermutationSet::new(128, 12345);
        let p2 = PermutationSet::new(128, 12345);
        let tokens = Shingling::default().token_hashes("Reproducibility test document");

        assert_eq!(p1.signature(&tokens), p2.signature(&tokens));
        assert_eq!(p1.fingerprint(), p2.fingerprint());
        assert_eq!(p1.seed(), 12345);
    }

    #[test]
    fn test_fingerprint_depends_on_seed_and_length() {
        let base = PermutationSet::new(64, 1).fingerprint();
        assert_ne!(base, PermutationSet::new(64, 2).fingerprint());
        assert_ne!(base, PermutationSet::new(32, 1).fingerprint());
    }

    #[test]
    fn test_incompatible_sets_are_rejected() {
        let p1 = Arc::new(PermutationSet::new(64, 1));
        let p2 = Arc::new(PermutationSet::new(64, 2));
        let a = handle(0, "shared text", &p1);
        let b = handle(0, "shared text", &p2);

        assert!(!a.is_compatible(&b));
        let err = a.jaccard_similarity(&b).unwrap_err();
        match err {
            SieveError::IncompatibleSignature { expected, found } => {
                assert_eq!(expected, p1.fingerprint());
                assert_eq!(found, p2.fingerprint());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_seed_sets_are_compatible() {
        let p1 = Arc::new(PermutationSet::new(64, 5));
        let p2 = Arc::new(PermutationSet::new(64, 5));
        let a = handle(0, "shared text", &p1);
        let b = handle(3, "shared text", &p2);

        assert!(a.is_compatible(&b));
        assert!((a.jaccard_similarity(&b).unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_symmetry_and_range() {
        let perms = Arc::new(PermutationSet::new(128, 77));
        let a = handle(0, "the cat sat on the mat", &perms);
        let b = handle(1, "the cat sat on a hat", &perms);

        let ab = a.jaccard_similarity(&b).unwrap();
        let ba = b.jaccard_similarity(&a).unwrap();
        assert_eq!(ab, ba);
        assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn test_jaccard_approximation() {
        let perms = Arc::new(PermutationSet::new(256, 2024));
        let scheme = Shingling::Whitespace;
        let text1 = "w1 w2 w3 w4 w5 w6 w7 w8 w9 w10 w11 w12";
        let text2 = "w1 w2 w3 w4 w5 w6 w7 w8 x9 x10 x11 x12";

        let t1 = scheme.token_hashes(text1);
        let t2 = scheme.token_hashes(text2);
        let exact = t1.intersection(&t2).count() as f64 / t1.union(&t2).count() as f64;

        let a = MinHash::new(0, perms.signature(&t1), Arc::clone(&perms));
        let b = MinHash::new(1, perms.signature(&t2), Arc::clone(&perms));
        let estimate = a.jaccard_similarity(&b).unwrap();

        let diff = (exact - estimate).abs();
        assert!(
            diff < 0.2,
            "MinHash should approximate Jaccard. Exact: {exact}, MinHash: {estimate}"
        );
    }

    #[test]
    fn test_debug_does_not_dump_signature() {
        let perms = Arc::new(PermutationSet::new(8, 3));
        let h = handle(4, "abc", &perms);
        let dbg = format!("{h:?}");
        assert!(dbg.contains("id: 4"));
        assert!(dbg.contains("num_perm: 8"));
    }
}
