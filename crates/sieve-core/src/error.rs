//! Error types for sieve.

use thiserror::Error;

/// Result type alias for sieve operations.
pub type Result<T> = std::result::Result<T, SieveError>;

/// Errors that can occur while building or querying an index.
#[derive(Error, Debug)]
pub enum SieveError {
    /// Invalid permutation/band counts or similarity threshold.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Two signatures were drawn from different permutation sets.
    #[error(
        "Incompatible signature: expected permutation set {expected:#018x}, found {found:#018x}"
    )]
    IncompatibleSignature {
        /// Fingerprint of the permutation set doing the comparison.
        expected: u64,
        /// Fingerprint carried by the foreign signature.
        found: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SieveError {
    /// Shorthand for a [`SieveError::Configuration`] with a formatted message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
