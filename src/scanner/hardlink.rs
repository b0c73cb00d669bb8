//! Seen-file tracking so each physical file is yielded once per run.
//!
//! # Overview
//!
//! Overlapping roots (`/data` and `/data/photos`) would otherwise yield the
//! same path twice, and a file grouped with itself is catastrophic for the
//! link and remove actions. Hardlinks are multiple directory entries pointing
//! to the same inode; they share storage, so they are not duplicates either.
//!
//! # Platform Support
//!
//! - **Unix**: (device_id, inode) pairs from file metadata
//! - **Other**: canonical path only; hardlinks are treated as separate files
//!
//! # Example
//!
//! ```no_run
//! use dupechain::scanner::hardlink::{HardlinkTracker, Sighting};
//! use std::path::Path;
//!
//! let mut tracker = HardlinkTracker::new();
//! let path = Path::new("/some/file.txt");
//! let metadata = std::fs::metadata(path).unwrap();
//!
//! match tracker.observe(path, &metadata) {
//!     Sighting::New => println!("Processing {}", path.display()),
//!     Sighting::SamePath => println!("Already seen {}", path.display()),
//!     Sighting::Hardlink => println!("Hardlink {}", path.display()),
//! }
//! ```

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// Result of observing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// First time this file is seen.
    New,
    /// The same path was already yielded (overlapping roots).
    SamePath,
    /// Another path to the same inode was already yielded.
    Hardlink,
}

/// Tracks seen canonical paths and inodes.
///
/// Not thread-safe; the walker owns one per run.
#[derive(Debug, Default)]
pub struct HardlinkTracker {
    paths: HashSet<PathBuf>,
    inodes: HashSet<InodeKey>,
}

impl HardlinkTracker {
    /// Create a new tracker.
    ///
    /// ```
    /// use dupechain::scanner::hardlink::HardlinkTracker;
    ///
    /// let tracker = HardlinkTracker::new();
    /// assert_eq!(tracker.seen_count(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file and report whether it was seen before.
    ///
    /// The path is canonicalized when possible so `a/../b` and `b` collide.
    pub fn observe(&mut self, path: &Path, metadata: &Metadata) -> Sighting {
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.paths.insert(canonical) {
            return Sighting::SamePath;
        }

        if let Some(key) = InodeKey::from_metadata(metadata) {
            if !self.inodes.insert(key) {
                return Sighting::Hardlink;
            }
        }
        Sighting::New
    }

    /// Number of unique paths tracked.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.paths.len()
    }

    /// Whether hardlink detection is available on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct InodeKey {
    dev: u64,
    ino: u64,
}

impl InodeKey {
    #[cfg(unix)]
    fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    // Windows needs a file handle for the file index; canonical paths still dedupe.
    #[cfg(not(unix))]
    fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}
