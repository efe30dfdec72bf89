//! Shingling: turning raw record text into a token set.
//!
//! The LSH index only ever sees token hashes. One [`Shingling`] scheme is
//! fixed per build so that every record is split the same way. No case
//! folding or punctuation stripping is applied; callers that want
//! normalization should do it before handing records over.

use serde::{Deserialize, Serialize};
use sieve_core::{hash_token, Result, SieveError};
use std::collections::HashSet;

/// Default character n-gram width.
pub const DEFAULT_CHAR_NGRAM: usize = 3;

/// How a record's text is split into shingles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "size", rename_all = "snake_case")]
pub enum Shingling {
    /// Every window of `n` consecutive characters (Unicode scalar values).
    /// A non-empty text shorter than `n` characters is a single shingle.
    CharNgram(usize),
    /// Every window of `n` whitespace-separated words, joined by one space.
    /// Fewer than `n` words yields a single shingle of all the words.
    WordNgram(usize),
    /// Each whitespace-separated word is a shingle.
    Whitespace,
}

impl Default for Shingling {
    fn default() -> Self {
        Self::CharNgram(DEFAULT_CHAR_NGRAM)
    }
}

impl Shingling {
    /// Reject zero-width n-grams.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::CharNgram(0) | Self::WordNgram(0) => Err(SieveError::config(format!(
                "shingle size must be positive, got {self:?}"
            ))),
            _ => Ok(()),
        }
    }

    /// Collect the distinct shingles of `text` as owned strings.
    #[must_use]
    pub fn shingles(&self, text: &str) -> HashSet<String> {
        let mut out = HashSet::new();
        self.for_each(text, |s| {
            out.insert(s.to_string());
        });
        out
    }

    /// Hash the distinct shingles of `text`.
    #[must_use]
    pub fn token_hashes(&self, text: &str) -> HashSet<u64> {
        let mut out = HashSet::new();
        self.for_each(text, |s| {
            out.insert(hash_token(s));
        });
        out
    }

    fn for_each(&self, text: &str, mut f: impl FnMut(&str)) {
        match *self {
            Self::CharNgram(n) => {
                // Byte offsets of every char boundary, including the end.
                let bounds: Vec<usize> = text
                    .char_indices()
                    .map(|(i, _)| i)
                    .chain(std::iter::once(text.len()))
                    .collect();
                let chars = bounds.len() - 1;
                if chars == 0 || n == 0 {
                    return;
                }
                if chars < n {
                    f(text);
                    return;
                }
                for start in 0..=chars - n {
                    f(&text[bounds[start]..bounds[start + n]]);
                }
            }
            Self::WordNgram(n) => {
                let words: Vec<&str> = text.split_whitespace().collect();
                if words.is_empty() || n == 0 {
                    return;
                }
                if words.len() < n {
                    f(&words.join(" "));
                    return;
                }
                for window in words.windows(n) {
                    f(&window.join(" "));
                }
            }
            Self::Whitespace => text.split_whitespace().for_each(f),
        }
    }
}
