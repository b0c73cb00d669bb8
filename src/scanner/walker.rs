//! Directory walker producing the candidate stream.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing one or more root
//! directories and yielding [`Candidate`] files for duplicate detection.
//! It uses [`walkdir`] with entries sorted by file name, so the traversal order
//! (and therefore group order and source selection) is deterministic.
//!
//! # Features
//!
//! - Recursive or top-level-only traversal, optional maximum depth
//! - Hidden entry filtering (names starting with `.`)
//! - Gitignore-style include/exclude globs for file names via the `ignore` crate
//! - Include/exclude substrings for directory paths
//! - Symlink skipping or following (with loop detection)
//! - Each physical file yielded once, even across overlapping roots
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dupechain::scanner::{Walker, WalkerConfig};
//! use std::path::PathBuf;
//!
//! let config = WalkerConfig {
//!     include: vec!["*.jpg".to_string()],
//!     ..Default::default()
//! };
//!
//! let walker = Walker::with_roots(vec![PathBuf::from("/photos"), PathBuf::from("/backup")], config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use walkdir::{DirEntry, WalkDir};

use super::hardlink::{HardlinkTracker, Sighting};
use super::{Candidate, ScanError, WalkerConfig};

/// Directory walker for ordered file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root paths to walk, deduplicated, in the order given
    roots: Vec<PathBuf>,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for a single root.
    ///
    /// ```no_run
    /// use dupechain::scanner::{Walker, WalkerConfig};
    /// use std::path::Path;
    ///
    /// let walker = Walker::new(Path::new("."), WalkerConfig::default());
    /// ```
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self::with_roots(vec![path.to_path_buf()], config)
    }

    /// Create a walker over several roots. Repeated roots are walked once.
    #[must_use]
    pub fn with_roots(roots: impl IntoIterator<Item = PathBuf>, config: WalkerConfig) -> Self {
        let mut unique: Vec<PathBuf> = Vec::new();
        for root in roots {
            let root = std::path::absolute(&root).unwrap_or(root);
            if !unique.contains(&root) {
                unique.push(root);
            }
        }
        Self {
            roots: unique,
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The deduplicated absolute roots this walker will traverse.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk every root in order, yielding candidate files.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. Directories, symlinks (unless followed), hidden entries
    /// (unless requested) and empty files (unless requested) are skipped.
    ///
    /// ```no_run
    /// use dupechain::scanner::{Walker, WalkerConfig};
    /// use std::path::Path;
    ///
    /// let walker = Walker::new(Path::new("."), WalkerConfig::default());
    /// let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
    /// println!("Found {} files", files.len());
    /// ```
    #[must_use]
    pub fn walk(&self) -> WalkIter<'_> {
        WalkIter {
            walker: self,
            next_root: 0,
            current: None,
            tracker: HardlinkTracker::new(),
        }
    }

    fn max_depth(&self) -> usize {
        if self.config.recursive {
            self.config.max_depth.unwrap_or(usize::MAX).max(1)
        } else {
            1
        }
    }

    /// Start walking one root, or report why it cannot be walked.
    fn open_root<'a>(&'a self, root: &'a Path) -> Result<RootWalk<'a>, ScanError> {
        let metadata = std::fs::metadata(root).map_err(|e| ScanError::from_io(root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let follow_hidden = self.config.follow_hidden;
        let entries = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .max_depth(self.max_depth())
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                if !follow_hidden && is_hidden(entry) {
                    log::trace!("Skipping hidden entry: {}", entry.path().display());
                    return false;
                }
                true
            });

        log::debug!("Walking root {}", root.display());
        Ok(RootWalk {
            root,
            include: build_matcher(root, &self.config.include),
            exclude: build_matcher(root, &self.config.exclude),
            entries: Box::new(entries),
        })
    }

    /// Check a directory path against the include/exclude substrings.
    fn passes_dir_filter(&self, dir: &Path) -> bool {
        let dir = dir.to_string_lossy();
        self.config
            .dir_include
            .iter()
            .all(|s| dir.contains(s.as_str()))
            && !self
                .config
                .dir_exclude
                .iter()
                .any(|s| dir.contains(s.as_str()))
    }

    /// Turn one walkdir entry into a candidate, or `None` if it is filtered out.
    fn process_entry(
        &self,
        walk: &RootWalk<'_>,
        entry: &DirEntry,
        tracker: &mut HardlinkTracker,
    ) -> Option<Result<Candidate, ScanError>> {
        let path = entry.path();
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            log::trace!("Skipping symlink: {}", path.display());
            return None;
        }
        if !file_type.is_file() {
            return None;
        }

        if let Some(parent) = path.parent() {
            if !self.passes_dir_filter(parent) {
                log::trace!("Directory filtered: {}", parent.display());
                return None;
            }
        }
        if !walk.passes_name_filter(path) {
            log::trace!("Name filtered: {}", path.display());
            return None;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => return Some(Err(ScanError::from_io(path, e.into()))),
        };

        if metadata.len() == 0 && !self.config.empty_files {
            log::trace!("Skipping empty file: {}", path.display());
            return None;
        }

        match tracker.observe(path, &metadata) {
            Sighting::New => {}
            Sighting::SamePath => {
                log::debug!("Already yielded: {}", path.display());
                return None;
            }
            Sighting::Hardlink if !self.config.keep_hardlinks => {
                log::debug!("Skipping hardlink: {}", path.display());
                return None;
            }
            Sighting::Hardlink => {}
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Some(Ok(Candidate::new(
            path.to_path_buf(),
            metadata.len(),
            modified,
        )))
    }
}

/// Iterator returned by [`Walker::walk`].
pub struct WalkIter<'a> {
    walker: &'a Walker,
    next_root: usize,
    current: Option<RootWalk<'a>>,
    tracker: HardlinkTracker,
}

struct RootWalk<'a> {
    root: &'a Path,
    include: Option<Gitignore>,
    exclude: Option<Gitignore>,
    entries: Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + 'a>,
}

impl RootWalk<'_> {
    /// Check a file path (relative to its root) against the include/exclude globs.
    fn passes_name_filter(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(self.root).unwrap_or(path);

        if let Some(include) = &self.include {
            if !include.matched(relative, false).is_ignore() {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.matched(relative, false).is_ignore() {
                return false;
            }
        }
        true
    }
}

impl Iterator for WalkIter<'_> {
    type Item = Result<Candidate, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.walker.is_shutdown_requested() {
                log::debug!("Walk interrupted");
                return None;
            }

            let Some(walk) = self.current.as_mut() else {
                let root = self.walker.roots.get(self.next_root)?;
                self.next_root += 1;
                match self.walker.open_root(root) {
                    Ok(walk) => self.current = Some(walk),
                    Err(e) => {
                        log::warn!("Cannot walk {}: {}", root.display(), e);
                        return Some(Err(e));
                    }
                }
                continue;
            };

            match walk.entries.next() {
                None => self.current = None,
                Some(Ok(entry)) => {
                    if let Some(result) =
                        self.walker.process_entry(walk, &entry, &mut self.tracker)
                    {
                        return Some(result);
                    }
                }
                Some(Err(e)) => {
                    let path = e
                        .path()
                        .map_or_else(|| walk.root.to_path_buf(), Path::to_path_buf);
                    if e.loop_ancestor().is_some() {
                        log::warn!("Symlink loop at {}", path.display());
                    } else {
                        log::warn!("Error walking {}: {}", path.display(), e);
                    }
                    return Some(Err(ScanError::from_io(&path, e.into())));
                }
            }
        }
    }
}

/// Build a gitignore-style matcher; `None` when no valid pattern was given.
fn build_matcher(root: &Path, patterns: &[String]) -> Option<Gitignore> {
    if patterns.is_empty() {
        return None;
    }

    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        if let Err(e) = builder.add_line(None, pattern) {
            log::warn!("Invalid glob pattern '{}': {}", pattern, e);
        }
    }

    match builder.build() {
        Ok(matcher) if !matcher.is_empty() => Some(matcher),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Failed to build glob patterns: {}", e);
            None
        }
    }
}

/// Hidden entries below the root. A hidden root itself is walked.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}
