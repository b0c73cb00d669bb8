//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - The filter chain engine and its lazy group stream ([`finder`])
//! - Duplicate groups and first-seen-order bucketing ([`groups`])

pub mod finder;
pub mod groups;

pub use finder::{
    ChainStats, DuplicateFinder, DuplicateStream, FilterChain, FinderConfig, FinderError,
    Partitioning, DEFAULT_CHAIN,
};
pub use groups::{bucket_by_key, DuplicateGroup};
