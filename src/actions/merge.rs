//! Merge action: copy every group member into a consolidated directory.
//!
//! # Overview
//!
//! Each group is copied to `<dest>/<label1>/<label2>/...`, one directory level
//! per filter stage, so groups found by different chains never collide. When a
//! file with the same name already exists there, the [`OverwriteStrategy`]
//! decides what happens:
//!
//! - `COUNT` appends `_0001`, `_0002`, ... before the extension until the name is free
//! - `IGNORE` skips the file
//! - `ERROR` aborts the run
//! - `CONDITION:<LARGER|SMALLER|NEWER|OLDER>` overwrites only when the incoming
//!   file is larger, smaller, newer or older than the existing one
//!
//! # Example
//!
//! ```
//! use dupechain::actions::merge::{Condition, MergeAction, OverwriteStrategy};
//!
//! let merge = MergeAction::parse("/backup:condition:newer").unwrap();
//! assert_eq!(merge.strategy(), OverwriteStrategy::Condition(Condition::Newer));
//!
//! let merge = MergeAction::parse("/backup").unwrap();
//! assert_eq!(merge.strategy(), OverwriteStrategy::Count);
//! ```

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{ActionError, ActionReport};
use crate::duplicates::DuplicateGroup;
use crate::scanner::Key;

/// Comparison used by [`OverwriteStrategy::Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Incoming file has more bytes.
    Larger,
    /// Incoming file has fewer bytes.
    Smaller,
    /// Incoming file was modified later.
    Newer,
    /// Incoming file was modified earlier.
    Older,
}

impl Condition {
    fn from_keyword(word: &str) -> Option<Self> {
        match word.trim().to_ascii_uppercase().as_str() {
            "LARGER" => Some(Self::Larger),
            "SMALLER" => Some(Self::Smaller),
            "NEWER" => Some(Self::Newer),
            "OLDER" => Some(Self::Older),
            _ => None,
        }
    }

    /// Whether `incoming` should replace `existing`.
    fn holds(self, incoming: &fs::Metadata, existing: &fs::Metadata) -> bool {
        let mtime = |m: &fs::Metadata| m.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        match self {
            Self::Larger => incoming.len() > existing.len(),
            Self::Smaller => incoming.len() < existing.len(),
            Self::Newer => mtime(incoming) > mtime(existing),
            Self::Older => mtime(incoming) < mtime(existing),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Self::Larger => "LARGER",
            Self::Smaller => "SMALLER",
            Self::Newer => "NEWER",
            Self::Older => "OLDER",
        };
        f.write_str(word)
    }
}

/// What to do when the destination name is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteStrategy {
    /// Keep both: add a numeric suffix to the incoming copy.
    #[default]
    Count,
    /// Skip the incoming file.
    Ignore,
    /// Abort the run.
    Error,
    /// Overwrite only if the condition holds.
    Condition(Condition),
}

impl fmt::Display for OverwriteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count => f.write_str("COUNT"),
            Self::Ignore => f.write_str("IGNORE"),
            Self::Error => f.write_str("ERROR"),
            Self::Condition(c) => write!(f, "CONDITION:{c}"),
        }
    }
}

/// Errors in a `dest[:STRATEGY[:CONDITION]]` specification.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeSpecError {
    /// Nothing before the strategy.
    #[error("merge destination is empty")]
    EmptyDestination,

    /// `CONDITION` given without a comparison.
    #[error("CONDITION needs one of LARGER, SMALLER, NEWER, OLDER")]
    MissingCondition,

    /// A comparison after a strategy other than `CONDITION`.
    #[error("'{0}' does not take a comparison; use CONDITION:<LARGER|SMALLER|NEWER|OLDER>")]
    ConditionWithoutStrategy(String),

    /// A word in strategy position that is not a strategy.
    #[error("unknown merge strategy '{0}' (expected COUNT, IGNORE, ERROR or CONDITION)")]
    UnknownStrategy(String),
}

/// A configured merge: destination root plus conflict strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeAction {
    dest: PathBuf,
    strategy: OverwriteStrategy,
}

/// Result of merging one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Copied to this path.
    Copied(PathBuf),
    /// Not copied: name taken, or the source vanished.
    Skipped,
}

impl MergeAction {
    /// Create a merge into `dest`.
    #[must_use]
    pub fn new(dest: impl Into<PathBuf>, strategy: OverwriteStrategy) -> Self {
        Self {
            dest: dest.into(),
            strategy,
        }
    }

    /// Parse `dest[:STRATEGY[:CONDITION]]`.
    ///
    /// Keywords are case-insensitive and read from the right, so the
    /// destination itself may contain `:`. `dest:LARGER` is shorthand for
    /// `dest:CONDITION:LARGER`.
    ///
    /// # Errors
    ///
    /// Returns [`MergeSpecError`] for an empty destination, a bare
    /// `CONDITION`, a comparison after `COUNT`, `IGNORE` or `ERROR`, or an
    /// unknown strategy word.
    pub fn parse(spec: &str) -> Result<Self, MergeSpecError> {
        let mut dest = spec;
        let mut strategy = OverwriteStrategy::Count;

        if let Some((head, tail)) = spec.rsplit_once(':') {
            if let Some(condition) = Condition::from_keyword(tail) {
                strategy = OverwriteStrategy::Condition(condition);
                dest = match head.rsplit_once(':') {
                    Some((rest, word)) if word.trim().eq_ignore_ascii_case("condition") => rest,
                    Some((_, word)) => {
                        let upper = word.trim().to_ascii_uppercase();
                        if matches!(upper.as_str(), "COUNT" | "IGNORE" | "ERROR") {
                            return Err(MergeSpecError::ConditionWithoutStrategy(
                                word.trim().to_string(),
                            ));
                        }
                        if !upper.is_empty() && upper.chars().all(|c| c.is_ascii_alphabetic()) {
                            return Err(MergeSpecError::UnknownStrategy(word.to_string()));
                        }
                        head
                    }
                    None => head,
                };
            } else {
                match tail.trim().to_ascii_uppercase().as_str() {
                    "COUNT" => {
                        strategy = OverwriteStrategy::Count;
                        dest = head;
                    }
                    "IGNORE" => {
                        strategy = OverwriteStrategy::Ignore;
                        dest = head;
                    }
                    "ERROR" => {
                        strategy = OverwriteStrategy::Error;
                        dest = head;
                    }
                    "CONDITION" => return Err(MergeSpecError::MissingCondition),
                    word if !word.is_empty()
                        && word.chars().all(|c| c.is_ascii_alphabetic()) =>
                    {
                        return Err(MergeSpecError::UnknownStrategy(tail.to_string()));
                    }
                    // Not a keyword: part of the path (e.g. a drive letter).
                    _ => {}
                }
            }
        }

        if dest.trim().is_empty() {
            return Err(MergeSpecError::EmptyDestination);
        }
        Ok(Self::new(dest, strategy))
    }

    /// Destination root.
    #[must_use]
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Conflict strategy.
    #[must_use]
    pub fn strategy(&self) -> OverwriteStrategy {
        self.strategy
    }

    /// Directory a group with these labels is merged into.
    #[must_use]
    pub fn group_dir(&self, labels: &[Key]) -> PathBuf {
        labels.iter().fold(self.dest.clone(), |dir, label| {
            dir.join(sanitize_label(label.as_str()))
        })
    }

    /// Copy every member of `group` (source included), printing each
    /// destination path to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Conflict`] under the `ERROR` strategy when a
    /// name is taken, or [`ActionError::Io`] when a copy fails.
    pub fn merge_group<W: Write>(
        &self,
        group: &DuplicateGroup,
        out: &mut W,
        report: &mut ActionReport,
    ) -> Result<(), ActionError> {
        let dir = self.group_dir(&group.labels);
        fs::create_dir_all(&dir).map_err(|e| ActionError::io(&dir, e))?;

        for file in &group.files {
            match self.merge_file(&file.path, &dir)? {
                MergeOutcome::Copied(dest) => {
                    writeln!(out, "{}", dest.display()).map_err(ActionError::Output)?;
                    report.files_copied += 1;
                }
                MergeOutcome::Skipped => report.files_skipped += 1,
            }
        }
        Ok(())
    }

    /// Copy one file into `dir` according to the strategy.
    ///
    /// # Errors
    ///
    /// See [`MergeAction::merge_group`].
    pub fn merge_file(&self, source: &Path, dir: &Path) -> Result<MergeOutcome, ActionError> {
        let Some(name) = source.file_name() else {
            log::warn!("{} has no file name, skipping", source.display());
            return Ok(MergeOutcome::Skipped);
        };
        let target = dir.join(name);

        let target = match fs::symlink_metadata(&target) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => target,
            Err(e) => return Err(ActionError::io(&target, e)),
            Ok(existing) => match self.strategy {
                OverwriteStrategy::Count => {
                    let free = next_free_name(dir, source)?;
                    log::info!(
                        "{} exists, copying {} as {}",
                        target.display(),
                        source.display(),
                        free.display()
                    );
                    free
                }
                OverwriteStrategy::Ignore => {
                    log::info!("{} exists, ignoring {}", target.display(), source.display());
                    return Ok(MergeOutcome::Skipped);
                }
                OverwriteStrategy::Error => {
                    log::error!("{} already exists", target.display());
                    return Err(ActionError::Conflict { path: target });
                }
                OverwriteStrategy::Condition(condition) => {
                    let incoming = match fs::metadata(source) {
                        Ok(m) => m,
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            log::warn!("{} not found", source.display());
                            return Ok(MergeOutcome::Skipped);
                        }
                        Err(e) => return Err(ActionError::io(source, e)),
                    };
                    if !condition.holds(&incoming, &existing) {
                        log::info!(
                            "{} is not {} than {}, skipping",
                            source.display(),
                            condition.to_string().to_lowercase(),
                            target.display()
                        );
                        return Ok(MergeOutcome::Skipped);
                    }
                    log::info!("{} overwriting {}", source.display(), target.display());
                    target
                }
            },
        };

        match fs::copy(source, &target) {
            Ok(_) => Ok(MergeOutcome::Copied(target)),
            Err(e) if e.kind() == io::ErrorKind::NotFound && !source.exists() => {
                log::warn!("{} not found", source.display());
                Ok(MergeOutcome::Skipped)
            }
            Err(e) => Err(ActionError::io(&target, e)),
        }
    }
}

/// Turn a filter output into a single safe path component.
///
/// Path separators become `_`; `.`, `..` and empty labels become `_`.
#[must_use]
pub fn sanitize_label(label: &str) -> String {
    let flat: String = label
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match flat.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => flat,
    }
}

/// First `<stem>_NNNN<.ext>` in `dir` that does not exist yet.
fn next_free_name(dir: &Path, source: &Path) -> Result<PathBuf, ActionError> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut count: u64 = 1;
    loop {
        let candidate = dir.join(format!("{stem}_{count:04}{extension}"));
        match fs::symlink_metadata(&candidate) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(candidate),
            Err(e) => return Err(ActionError::io(&candidate, e)),
            Ok(_) => count += 1,
        }
    }
}
