//! Index configuration.
//!
//! The band/row split is the precision/recall knob of candidate generation:
//! with `b` bands of `r` rows, two records of true Jaccard similarity `s`
//! share at least one bucket with probability `1 - (1 - s^r)^b`.

use crate::shingle::Shingling;
use serde::{Deserialize, Serialize};
use sieve_core::{Result, SieveError};

/// Default number of MinHash permutations.
pub const DEFAULT_NUM_PERM: usize = 128;

/// Default number of LSH bands (4 rows per band at the default permutation count).
pub const DEFAULT_NUM_BANDS: usize = 32;

/// Similarity threshold used when a query or deduplication pass is given none.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Configuration for building a [`MinHashLSH`](crate::lsh::MinHashLSH).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LshConfig {
    /// Number of MinHash permutations (signature length).
    pub num_perm: usize,
    /// Number of bands the signature is split into. Must divide `num_perm`.
    pub num_bands: usize,
    /// How raw records are split into shingles.
    #[serde(default)]
    pub shingling: Shingling,
    /// Seed for the permutation coefficients. `None` draws one from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_PERM, DEFAULT_NUM_BANDS)
    }
}

impl LshConfig {
    /// Create a config with the given permutation and band counts.
    #[must_use]
    pub fn new(num_perm: usize, num_bands: usize) -> Self {
        Self {
            num_perm,
            num_bands,
            shingling: Shingling::default(),
            seed: None,
        }
    }

    /// Pick the band count whose S-curve midpoint is closest to `threshold`.
    ///
    /// Only divisors of `num_perm` are considered. The midpoint for `b`
    /// bands of `r` rows is approximately `(1/b)^(1/r)`.
    pub fn for_threshold(num_perm: usize, threshold: f64) -> Result<Self> {
        if num_perm == 0 {
            return Err(SieveError::config("num_perm must be positive"));
        }
        let threshold = validate_threshold(threshold)?;

        let mut best = 1;
        let mut best_diff = f64::MAX;
        for b in (1..=num_perm).filter(|b| num_perm % b == 0) {
            let r = num_perm / b;
            let midpoint = (1.0 / b as f64).powf(1.0 / r as f64);
            let diff = (midpoint - threshold).abs();
            if diff < best_diff {
                best = b;
                best_diff = diff;
            }
        }

        Ok(Self::new(num_perm, best))
    }

    /// Set the band count.
    #[must_use]
    pub fn with_bands(mut self, num_bands: usize) -> Self {
        self.num_bands = num_bands;
        self
    }

    /// Fix the permutation seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the shingling scheme.
    #[must_use]
    pub fn with_shingling(mut self, shingling: Shingling) -> Self {
        self.shingling = shingling;
        self
    }

    /// Rows per band. Only meaningful for a validated config.
    #[must_use]
    pub fn rows_per_band(&self) -> usize {
        if self.num_bands == 0 {
            0
        } else {
            self.num_perm / self.num_bands
        }
    }

    /// Probability that two records of Jaccard similarity `s` become candidates.
    #[must_use]
    pub fn candidate_probability(&self, s: f64) -> f64 {
        let r = self.rows_per_band() as i32;
        let b = self.num_bands as i32;
        1.0 - (1.0 - s.powi(r)).powi(b)
    }

    /// Check the permutation/band counts and the shingling scheme.
    pub fn validate(&self) -> Result<()> {
        if self.num_perm == 0 {
            return Err(SieveError::config("num_perm must be positive"));
        }
        if self.num_bands == 0 {
            return Err(SieveError::config("num_bands must be positive"));
        }
        if self.num_perm % self.num_bands != 0 {
            return Err(SieveError::config(format!(
                "num_perm ({}) is not divisible by num_bands ({})",
                self.num_perm, self.num_bands
            )));
        }
        self.shingling.validate()
    }
}

/// Check that a similarity threshold lies in `[0, 1]`.
pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(SieveError::config(format!(
            "threshold must be between 0.0 and 1.0, got {threshold}"
        )))
    }
}

/// Resolve an optional threshold to a validated value.
pub fn resolve_threshold(threshold: Option<f64>) -> Result<f64> {
    validate_threshold(threshold.unwrap_or(DEFAULT_THRESHOLD))
}
