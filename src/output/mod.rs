//! Output formatters for duplicate groups.
//!
//! This module provides the formats selectable with `--output`:
//! - `pretty`: source line, indented duplicates, blank line between groups
//! - `basic`: one path per line
//! - `json`: one JSON object per group per line
//!
//! # Example
//!
//! ```
//! use dupechain::duplicates::DuplicateGroup;
//! use dupechain::output::{GroupPrinter, OutputFormat};
//! use dupechain::scanner::{Candidate, Key};
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let group = DuplicateGroup::new(
//!     vec![
//!         Candidate::new(PathBuf::from("/a"), 1, SystemTime::UNIX_EPOCH),
//!         Candidate::new(PathBuf::from("/b"), 1, SystemTime::UNIX_EPOCH),
//!     ],
//!     vec![Key::new("1")],
//! );
//!
//! let printer = GroupPrinter::new(OutputFormat::Basic, false);
//! let mut out = Vec::new();
//! printer.write_group(&mut out, &group).unwrap();
//! assert_eq!(out, b"/a\n/b\n");
//! ```

pub mod json;
pub mod text;

use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::duplicates::DuplicateGroup;
pub use json::{JsonGroup, JsonOutputError};

/// Listing format for the print action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Source line plus indented duplicates
    #[default]
    Pretty,
    /// One path per line
    Basic,
    /// One JSON object per group
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Basic => write!(f, "basic"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Writes groups in one format.
#[derive(Debug, Clone, Copy)]
pub struct GroupPrinter {
    format: OutputFormat,
    color: bool,
}

impl GroupPrinter {
    /// Create a printer. `color` only affects the pretty format.
    #[must_use]
    pub fn new(format: OutputFormat, color: bool) -> Self {
        Self { format, color }
    }

    /// The format in use.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write one group.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_group<W: Write>(
        &self,
        out: &mut W,
        group: &DuplicateGroup,
    ) -> Result<(), JsonOutputError> {
        match self.format {
            OutputFormat::Pretty => text::write_pretty(out, group, self.color)?,
            OutputFormat::Basic => text::write_basic(out, group)?,
            OutputFormat::Json => JsonGroup::from_group(group).write_line(out)?,
        }
        Ok(())
    }
}
