//! Scanner module for directory traversal and file signatures.
//!
//! This module provides functionality for:
//! - Ordered directory walking using walkdir
//! - Signature functions (size, partial MD5, MD5, SHA-256, BLAKE3, exact bytes)
//! - Hardlink detection so each physical file is yielded once
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and candidate discovery
//! - [`signature`]: Path to comparison key functions
//! - [`hardlink`]: Seen-file tracking across roots
//!
//! # Example
//!
//! ```no_run
//! use dupechain::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     follow_hidden: false,
//!     max_depth: Some(3),
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hardlink;
pub mod signature;
pub mod walker;

use std::path::PathBuf;
use std::time::SystemTime;

pub use signature::{Key, Signature, Verdict, CHUNK_SIZE, PARTIAL_CHUNKS};
pub use walker::Walker;

/// A file under consideration for duplication.
///
/// Created by the walker, consumed exactly once by the filter chain and
/// moved into whichever group it ends up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes at traversal time
    pub size: u64,
    /// Last modification time at traversal time
    pub modified: SystemTime,
}

impl Candidate {
    /// Create a new Candidate.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `size` - File size in bytes
    /// * `modified` - Last modification time
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
        }
    }

    /// Build a candidate from the file's current metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if the file cannot be stat'ed.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ScanError> {
        let path = path.into();
        let metadata = std::fs::metadata(&path).map_err(|e| ScanError::from_io(&path, e))?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(Self::new(path, metadata.len(), modified))
    }
}

/// Configuration for directory walking.
///
/// Controls recursion, hidden entries, symlinks and name filters.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Descend into subdirectories. When false only the root's files are yielded.
    pub recursive: bool,

    /// Maximum directory depth below the root (1 = root's files only).
    pub max_depth: Option<usize>,

    /// Include hidden files and directories (names starting with `.`).
    pub follow_hidden: bool,

    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Yield zero-byte files. They are skipped by default.
    pub empty_files: bool,

    /// Glob patterns a file name must match (any of them). Empty = all files.
    pub include: Vec<String>,

    /// Glob patterns that reject a file name.
    pub exclude: Vec<String>,

    /// Substrings that must all appear in a directory path for its files to be yielded.
    pub dir_include: Vec<String>,

    /// Substrings that reject a directory path (any of them).
    pub dir_exclude: Vec<String>,

    /// Yield every hardlink to a file instead of only the first one seen.
    pub keep_hardlinks: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: None,
            follow_hidden: false,
            follow_symlinks: false,
            empty_files: false,
            include: Vec::new(),
            exclude: Vec::new(),
            dir_include: Vec::new(),
            dir_exclude: Vec::new(),
            keep_hardlinks: false,
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub(crate) fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Errors that can occur while computing a signature.
#[derive(thiserror::Error, Debug)]
pub enum SignatureError {
    /// The file vanished between traversal and hashing.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl SignatureError {
    pub(crate) fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
