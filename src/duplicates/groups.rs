//! Duplicate groups and first-seen-order bucketing.
//!
//! # Overview
//!
//! A [`DuplicateGroup`] is the unit the filter chain emits: an ordered list of
//! candidates plus the key each filter stage produced for it. The first member
//! is the group's source; the others are its duplicates.
//!
//! [`bucket_by_key`] groups keyed items while keeping the order in which each
//! key was first observed, which is what makes output order deterministic.
//!
//! # Example
//!
//! ```
//! use dupechain::duplicates::{bucket_by_key, DuplicateGroup};
//! use dupechain::scanner::{Candidate, Key};
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let files = vec![
//!     Candidate::new(PathBuf::from("/a"), 3, SystemTime::now()),
//!     Candidate::new(PathBuf::from("/c"), 5, SystemTime::now()),
//!     Candidate::new(PathBuf::from("/b"), 3, SystemTime::now()),
//! ];
//!
//! let buckets = bucket_by_key(files.into_iter().map(|f| (Key::new(f.size.to_string()), f)));
//! assert_eq!(buckets.len(), 2);
//! assert_eq!(buckets[0].0.as_str(), "3");
//! assert_eq!(buckets[0].1.len(), 2);
//!
//! let (key, members) = buckets.into_iter().next().unwrap();
//! let group = DuplicateGroup::new(members, vec![key]);
//! assert_eq!(group.source().unwrap().path, PathBuf::from("/a"));
//! ```

use std::collections::HashMap;
use std::path::Path;

use crate::scanner::{Candidate, Key};

/// A group of files that shared a key at every stage they passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Members in traversal order. Never empty.
    pub files: Vec<Candidate>,
    /// The key produced by each stage, first stage first.
    pub labels: Vec<Key>,
}

impl DuplicateGroup {
    /// Create a new group.
    ///
    /// # Arguments
    ///
    /// * `files` - Members in traversal order
    /// * `labels` - Key produced by each stage the group passed through
    #[must_use]
    pub fn new(files: Vec<Candidate>, labels: Vec<Key>) -> Self {
        debug_assert!(!files.is_empty(), "a duplicate group is never empty");
        Self { files, labels }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether this group holds at least one duplicate.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.files.len() > 1
    }

    /// The first-seen member; actions keep it and treat the rest as copies.
    #[must_use]
    pub fn source(&self) -> Option<&Candidate> {
        self.files.first()
    }

    /// Every member except the source.
    #[must_use]
    pub fn duplicates(&self) -> &[Candidate] {
        self.files.get(1..).unwrap_or(&[])
    }

    /// Member paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }

    /// Labels as plain strings.
    #[must_use]
    pub fn label_strings(&self) -> Vec<String> {
        self.labels.iter().map(|k| k.as_str().to_string()).collect()
    }

    /// Labels joined for logging: `3 -> 5eb63bbbe01eeed093cb22bb8f5acdc3`.
    #[must_use]
    pub fn label_trail(&self) -> String {
        self.label_strings().join(" -> ")
    }

    /// Bytes held by the duplicates (all copies minus the source).
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.duplicates().iter().map(|f| f.size).sum()
    }
}

/// Bucket keyed items by key, keeping the order each key was first seen.
///
/// Members keep their relative order inside each bucket.
#[must_use]
pub fn bucket_by_key<I>(items: I) -> Vec<(Key, Vec<Candidate>)>
where
    I: IntoIterator<Item = (Key, Candidate)>,
{
    let mut index: HashMap<Key, usize> = HashMap::new();
    let mut buckets: Vec<(Key, Vec<Candidate>)> = Vec::new();

    for (key, candidate) in items {
        match index.get(&key) {
            Some(&slot) => buckets[slot].1.push(candidate),
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push((key, vec![candidate]));
            }
        }
    }

    buckets
}
