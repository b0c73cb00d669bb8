//! Link action: replace every duplicate with a hard link to the source.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{ActionError, ActionReport, FileOutcome};
use crate::duplicates::DuplicateGroup;

/// Replace `duplicate` with a hard link to `source`.
///
/// The link is created under a temporary name next to the duplicate and then
/// renamed over it, so the duplicate path is never left empty. A duplicate or
/// source that no longer exists is reported and nothing is touched.
///
/// # Errors
///
/// Returns [`ActionError::Io`] if the link or the rename fails.
pub fn link_duplicate(source: &Path, duplicate: &Path) -> Result<FileOutcome, ActionError> {
    match fs::symlink_metadata(duplicate) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("{} not found", duplicate.display());
            return Ok(FileOutcome::Missing);
        }
        Err(e) => return Err(ActionError::io(duplicate, e)),
    }

    let staged = match stage_link(source, duplicate) {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound && !source.exists() => {
            log::warn!(
                "{} not found, keeping {}",
                source.display(),
                duplicate.display()
            );
            return Ok(FileOutcome::Missing);
        }
        Err(e) => {
            log::error!(
                "Linking {} -> {} failed: {}",
                source.display(),
                duplicate.display(),
                e
            );
            return Err(ActionError::io(duplicate, e));
        }
    };

    let renamed = fs::rename(&staged, duplicate);
    // Renaming onto another link of the same file leaves `staged` behind.
    let _ = fs::remove_file(&staged);
    renamed.map_err(|e| ActionError::io(duplicate, e))?;

    log::info!("Linking {} -> {}", source.display(), duplicate.display());
    Ok(FileOutcome::Done)
}

/// Hard link `source` to a free temporary name beside `duplicate`.
fn stage_link(source: &Path, duplicate: &Path) -> io::Result<PathBuf> {
    let dir = duplicate.parent().unwrap_or_else(|| Path::new("."));
    let name = duplicate
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for attempt in 0..1000u32 {
        let staged = dir.join(format!(".{name}.dupechain-{}-{attempt}", std::process::id()));
        match fs::hard_link(source, &staged) {
            Ok(()) => return Ok(staged),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "no free temporary name",
    ))
}

/// Link every duplicate of `group` to its source.
///
/// # Errors
///
/// Stops at the first failure other than a missing duplicate.
pub fn link_group(group: &DuplicateGroup, report: &mut ActionReport) -> Result<(), ActionError> {
    let Some(source) = group.source() else {
        return Ok(());
    };
    for file in group.duplicates() {
        match link_duplicate(&source.path, &file.path)? {
            FileOutcome::Done => report.files_linked += 1,
            FileOutcome::Missing => report.files_missing += 1,
        }
    }
    Ok(())
}
