//! Remove action: delete every duplicate, keep the source.
//!
//! # Safety
//!
//! Only [`DuplicateGroup::duplicates`] are touched; the source is never removed,
//! so at least one copy of each group survives. A duplicate that vanished since
//! the scan is reported and skipped.
//!
//! # Example
//!
//! ```no_run
//! use dupechain::actions::delete::remove_duplicate;
//! use std::path::Path;
//!
//! match remove_duplicate(Path::new("/path/to/duplicate.txt")) {
//!     Ok(outcome) => println!("{:?}", outcome),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::Path;

use super::{ActionError, ActionReport, FileOutcome};
use crate::duplicates::DuplicateGroup;

/// Delete one file.
///
/// # Errors
///
/// Returns [`ActionError::Io`] for any failure other than the file being gone.
pub fn remove_duplicate(path: &Path) -> Result<FileOutcome, ActionError> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::info!("Removing {}", path.display());
            Ok(FileOutcome::Done)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("{} not found", path.display());
            Ok(FileOutcome::Missing)
        }
        Err(e) => {
            log::error!("Remove failed for {}: {}", path.display(), e);
            Err(ActionError::io(path, e))
        }
    }
}

/// Delete every duplicate of `group`.
///
/// # Errors
///
/// Stops at the first failure other than a missing file.
pub fn remove_group(group: &DuplicateGroup, report: &mut ActionReport) -> Result<(), ActionError> {
    for file in group.duplicates() {
        match remove_duplicate(&file.path)? {
            FileOutcome::Done => report.files_removed += 1,
            FileOutcome::Missing => report.files_missing += 1,
        }
    }
    Ok(())
}
