//! JSON Lines input and output for record batches.
//!
//! Records are read in file order, so a record's position in the returned
//! vector is its id in the index.

use crate::dedup::DeduplicationIndex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// One input record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier from the input's `id` field, or the 0-based line number.
    pub id: u64,
    /// Record text.
    pub text: String,
}

impl Document {
    /// Create a new document.
    #[must_use]
    pub fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// A document annotated with its duplicate group.
#[derive(Debug, Serialize)]
struct GroupedRecord<'a> {
    id: u64,
    text: &'a str,
    group: usize,
    group_size: usize,
}

/// Errors that can occur during I/O operations.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Field '{field}' not found or not a string at line {line}")]
    MissingField { field: String, line: usize },

    #[error("Grouping covers {expected} records but {found} documents were given")]
    LengthMismatch { expected: usize, found: usize },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, IoError>;

/// Read documents from a JSONL file.
///
/// Each non-blank line must be a JSON object with a string `text_field`.
/// The document id is taken from an unsigned `id` field if present,
/// otherwise the 0-based line number is used. Mixing explicit and implicit
/// ids can produce duplicate `Document::id` values; the index itself always
/// identifies records by their position in the returned vector.
pub fn read_jsonl<P: AsRef<Path>>(path: P, text_field: &str) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(path)?);
    let mut documents = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let json: serde_json::Value = serde_json::from_str(&line).map_err(|e| IoError::Parse {
            line: line_num + 1,
            message: e.to_string(),
        })?;

        let text = json
            .get(text_field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| IoError::MissingField {
                field: text_field.to_string(),
                line: line_num + 1,
            })?;

        let id = json
            .get("id")
            .and_then(|v| v.as_u64())
            .unwrap_or(line_num as u64);

        documents.push(Document::new(id, text));
    }

    Ok(documents)
}

/// Write documents as `{"id", "text"}` lines.
pub fn write_jsonl<P: AsRef<Path>>(path: P, docs: &[Document]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for doc in docs {
        writeln!(writer, "{}", serde_json::to_string(doc)?)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every document in input order, annotated with its group position
/// and group size.
pub fn write_groups_jsonl<P: AsRef<Path>>(
    path: P,
    docs: &[Document],
    dedup: &DeduplicationIndex<'_>,
) -> Result<()> {
    let expected = dedup.stats().total;
    if docs.len() != expected {
        return Err(IoError::LengthMismatch {
            expected,
            found: docs.len(),
        });
    }

    let groups = dedup.grouped_indices();
    let mut writer = BufWriter::new(File::create(path)?);
    for (idx, doc) in docs.iter().enumerate() {
        let group = dedup.group_of(idx).unwrap_or_default();
        let record = GroupedRecord {
            id: doc.id,
            text: &doc.text,
            group,
            group_size: groups[group].len(),
        };
        writeln!(writer, "{}", serde_json::to_string(&record)?)?;
    }
    writer.flush()?;
    Ok(())
}
