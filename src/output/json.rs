//! JSON Lines output: one object per group.
//!
//! # Output Schema
//!
//! ```json
//! {"files":["/d/a","/d/b"],"filters":["3","5eb63bbbe01eeed093cb22bb8f5acdc3"]}
//! ```
//!
//! `files` is in group order (source first); `filters` holds the key each
//! stage produced, first stage first.

use std::io::Write;

use serde::Serialize;

use crate::duplicates::DuplicateGroup;

/// A single group in JSON form.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JsonGroup {
    /// Absolute paths, source first
    pub files: Vec<String>,
    /// Filter outputs, first stage first
    pub filters: Vec<String>,
}

impl JsonGroup {
    /// Convert a group.
    #[must_use]
    pub fn from_group(group: &DuplicateGroup) -> Self {
        Self {
            files: group
                .paths()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            filters: group.label_strings(),
        }
    }

    /// Write this group as one JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_line<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        serde_json::to_writer(&mut *writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON output: {0}")]
    Io(#[from] std::io::Error),
}
