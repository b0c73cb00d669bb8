//! Filter chain engine producing the duplicate group stream.
//!
//! # Overview
//!
//! The engine runs an ordered [`FilterChain`] of [`Signature`]s over a
//! candidate stream:
//!
//! 1. **Bootstrap**: the first signature is computed for every candidate and
//!    candidates are bucketed by key in first-seen order. Buckets of one are
//!    already unique; larger buckets move on.
//! 2. **Refinement**: each later signature narrows every surviving group.
//!    In [`Partitioning::Reference`] mode (the default) every member is compared
//!    against the group's first member; members that differ leave the group and
//!    are emitted on their own right after it. In [`Partitioning::Equivalence`]
//!    mode the group is split into one sub-group per key.
//! 3. A group is emitted once the chain is exhausted or it has one member left.
//!
//! Output is the lazy [`DuplicateStream`] iterator: each group is refined only
//! when the consumer asks for it. Signature evaluation inside one group may run
//! on a bounded rayon pool; results are consumed in member order, so output is
//! identical to a sequential run.
//!
//! # Example
//!
//! ```no_run
//! use dupechain::context::RunContext;
//! use dupechain::duplicates::{DuplicateFinder, FinderConfig};
//! use dupechain::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! let finder = DuplicateFinder::new(FinderConfig::default());
//! let ctx = RunContext::new();
//!
//! let mut stream = finder.scan(&walker, &ctx);
//! for group in stream.by_ref().filter(|g| g.has_duplicates()) {
//!     println!("{} copies of {}", group.len(), group.files[0].path.display());
//! }
//! let stats = stream.finish().unwrap();
//! println!("{}", stats.summary());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::groups::{bucket_by_key, DuplicateGroup};
use crate::context::RunContext;
use crate::progress::{PHASE_BOOTSTRAP, PHASE_GROUPS, PHASE_WALKING};
use crate::scanner::signature::files_equal;
use crate::scanner::{Candidate, Key, Signature, SignatureError, Verdict, Walker};

/// The chain used when none is configured.
pub const DEFAULT_CHAIN: [Signature; 4] = [
    Signature::Size,
    Signature::PartialMd5,
    Signature::Md5,
    Signature::Bytes,
];

/// How a refinement stage splits a group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Partitioning {
    /// Compare every member against the first member only.
    #[default]
    Reference,
    /// Split the group into one sub-group per key.
    Equivalence,
}

impl fmt::Display for Partitioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Equivalence => write!(f, "equivalence"),
        }
    }
}

impl FromStr for Partitioning {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" => Ok(Self::Reference),
            "equivalence" => Ok(Self::Equivalence),
            other => Err(format!(
                "unknown partitioning '{other}' (expected 'reference' or 'equivalence')"
            )),
        }
    }
}

/// Ordered, non-empty sequence of signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    stages: Vec<Signature>,
}

impl FilterChain {
    /// Create a chain.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::EmptyChain`] if `stages` is empty.
    pub fn new(stages: Vec<Signature>) -> Result<Self, FinderError> {
        if stages.is_empty() {
            return Err(FinderError::EmptyChain);
        }
        Ok(Self { stages })
    }

    /// The signatures, first stage first.
    #[must_use]
    pub fn stages(&self) -> &[Signature] {
        &self.stages
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage identifiers, as used in output and config.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Whether the last stage is an exhaustive comparison.
    #[must_use]
    pub fn ends_exact(&self) -> bool {
        self.stages.last().is_some_and(|s| s.is_exact())
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self {
            stages: DEFAULT_CHAIN.to_vec(),
        }
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(" -> "))
    }
}

/// Configuration for the filter chain engine.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    /// Signatures to apply, cheapest first.
    pub chain: FilterChain,
    /// How refinement stages split groups.
    pub partitioning: Partitioning,
    /// Number of I/O threads for signature evaluation inside a group.
    /// Default is 4 to prevent disk thrashing; 1 evaluates sequentially.
    pub io_threads: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            chain: FilterChain::default(),
            partitioning: Partitioning::Reference,
            io_threads: 4,
        }
    }
}

impl FinderConfig {
    /// Set the filter chain.
    #[must_use]
    pub fn with_chain(mut self, chain: FilterChain) -> Self {
        self.chain = chain;
        self
    }

    /// Set the partitioning mode.
    #[must_use]
    pub fn with_partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    /// Set the I/O thread count (minimum 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }
}

/// Statistics collected while the stream runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainStats {
    /// Candidates fed into the first stage.
    pub candidates: usize,
    /// Candidates dropped for no signal or a read failure.
    pub dropped: usize,
    /// Groups emitted, singletons included.
    pub groups_emitted: usize,
    /// Emitted groups with two or more members.
    pub duplicate_groups: usize,
    /// Members of those groups other than the source.
    pub duplicate_files: usize,
    /// Bytes held by those members.
    pub wasted_space: u64,
    /// Signature evaluations per stage.
    pub evaluations: Vec<usize>,
}

impl ChainStats {
    fn new(stages: usize) -> Self {
        Self {
            evaluations: vec![0; stages],
            ..Self::default()
        }
    }

    /// One-line summary for the end-of-run log.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} candidates, {} dropped, {} groups ({} with duplicates, {} duplicate files, {} bytes reclaimable)",
            self.candidates,
            self.dropped,
            self.groups_emitted,
            self.duplicate_groups,
            self.duplicate_files,
            self.wasted_space
        )
    }
}

/// Errors that can occur during duplicate finding.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The run was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// A filter chain needs at least one signature.
    #[error("Filter chain is empty")]
    EmptyChain,
}

/// Runs a filter chain over candidates.
#[derive(Debug, Clone, Default)]
pub struct DuplicateFinder {
    config: FinderConfig,
}

impl DuplicateFinder {
    /// Create a new finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self { config }
    }

    /// Create a finder with the default chain.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Walk the tree and start the group stream.
    ///
    /// Walk errors (unreadable directories, vanished files) are logged and
    /// skipped.
    pub fn scan(&self, walker: &Walker, ctx: &RunContext) -> DuplicateStream {
        let progress = ctx.progress();
        if let Some(p) = progress {
            p.on_phase_start(PHASE_WALKING, 0);
        }

        let mut candidates = Vec::new();
        for entry in walker.walk() {
            if ctx.is_shutdown_requested() {
                break;
            }
            match entry {
                Ok(candidate) => {
                    if let Some(p) = progress {
                        p.on_progress(candidates.len() + 1, &candidate.path.to_string_lossy());
                    }
                    candidates.push(candidate);
                }
                Err(e) => log::warn!("Skipping: {}", e),
            }
        }

        if let Some(p) = progress {
            p.on_phase_end(PHASE_WALKING);
        }
        log::debug!("Walk produced {} candidates", candidates.len());

        self.find(candidates, ctx)
    }

    /// Start the group stream over an explicit candidate list.
    ///
    /// The first stage consumes every candidate before this returns; later
    /// stages run lazily as the stream is pulled.
    pub fn find<I>(&self, candidates: I, ctx: &RunContext) -> DuplicateStream
    where
        I: IntoIterator<Item = Candidate>,
    {
        let pool = if self.config.io_threads > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.io_threads)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!("Failed to create thread pool, evaluating sequentially: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut stream = DuplicateStream {
            stages: self.config.chain.stages().to_vec(),
            partitioning: self.config.partitioning,
            pool,
            ctx: ctx.clone(),
            pending: VecDeque::new(),
            stats: ChainStats::new(self.config.chain.len()),
            interrupted: false,
        };
        stream.bootstrap(candidates.into_iter().collect());
        stream
    }
}

/// Work left in the stream, front first.
enum Pending {
    Refine {
        files: Vec<Candidate>,
        labels: Vec<Key>,
        stage: usize,
    },
    Emit(DuplicateGroup),
}

/// Lazy, single-pass stream of groups.
///
/// Every candidate that is not dropped ends up in exactly one emitted group.
/// Groups come out in the order their first-stage key was first seen.
pub struct DuplicateStream {
    stages: Vec<Signature>,
    partitioning: Partitioning,
    pool: Option<rayon::ThreadPool>,
    ctx: RunContext,
    pending: VecDeque<Pending>,
    stats: ChainStats,
    interrupted: bool,
}

impl DuplicateStream {
    /// Statistics so far.
    #[must_use]
    pub fn stats(&self) -> &ChainStats {
        &self.stats
    }

    /// Whether the stream stopped because shutdown was requested.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Close the stream and return its statistics.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Interrupted`] if the stream was cut short.
    pub fn finish(self) -> Result<ChainStats, FinderError> {
        if let Some(p) = self.ctx.progress() {
            p.on_phase_end(PHASE_GROUPS);
        }
        if self.interrupted {
            return Err(FinderError::Interrupted);
        }
        Ok(self.stats)
    }

    /// Evaluate `f` for every member, on the pool when there is one.
    fn evaluate<T, F>(&self, members: &[Candidate], f: F) -> Vec<T>
    where
        F: Fn(&Candidate) -> T + Sync + Send,
        T: Send,
    {
        match &self.pool {
            Some(pool) if members.len() > 1 => pool.install(|| members.par_iter().map(&f).collect()),
            _ => members.iter().map(&f).collect(),
        }
    }

    fn drop_no_signal(&mut self, candidate: &Candidate, signature: Signature) {
        log::warn!(
            "Dropping {}: no signal from '{}' filter",
            candidate.path.display(),
            signature
        );
        self.stats.dropped += 1;
    }

    fn drop_unreadable(&mut self, candidate: &Candidate, error: &SignatureError) {
        log::warn!("Dropping {}: {}", candidate.path.display(), error);
        self.stats.dropped += 1;
    }

    fn mark_interrupted(&mut self) {
        if !self.interrupted {
            log::warn!("Shutdown requested, stopping group stream");
        }
        self.interrupted = true;
        self.pending.clear();
    }

    /// Decide what happens to a group after `next_stage - 1` stages.
    fn settle(&self, files: Vec<Candidate>, labels: Vec<Key>, next_stage: usize) -> Option<Pending> {
        if files.is_empty() {
            None
        } else if files.len() == 1 || next_stage >= self.stages.len() {
            Some(Pending::Emit(DuplicateGroup::new(files, labels)))
        } else {
            Some(Pending::Refine {
                files,
                labels,
                stage: next_stage,
            })
        }
    }

    /// Stage 0: key every candidate and bucket in first-seen order.
    fn bootstrap(&mut self, candidates: Vec<Candidate>) {
        let signature = self.stages[0];
        self.stats.candidates = candidates.len();

        if let Some(p) = self.ctx.progress() {
            p.on_phase_start(PHASE_BOOTSTRAP, candidates.len());
        }

        let done = AtomicUsize::new(0);
        let keys = {
            let ctx = &self.ctx;
            self.evaluate(&candidates, |candidate| {
                if ctx.is_shutdown_requested() {
                    return None;
                }
                let key = signature.probe(&candidate.path);
                if let Some(p) = ctx.progress() {
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    p.on_progress(n, &candidate.path.to_string_lossy());
                }
                Some(key)
            })
        };
        self.stats.evaluations[0] += candidates.len();

        if let Some(p) = self.ctx.progress() {
            p.on_phase_end(PHASE_BOOTSTRAP);
        }
        if self.ctx.is_shutdown_requested() {
            self.mark_interrupted();
            return;
        }

        let mut keyed = Vec::with_capacity(candidates.len());
        for (candidate, key) in candidates.into_iter().zip(keys) {
            match key {
                Some(Ok(key)) if key.has_signal() => keyed.push((key, candidate)),
                Some(Ok(_)) => self.drop_no_signal(&candidate, signature),
                Some(Err(e)) => self.drop_unreadable(&candidate, &e),
                None => {}
            }
        }

        for (key, members) in bucket_by_key(keyed) {
            log::trace!("Stage 0 ({}): key {} has {} member(s)", signature, key, members.len());
            let classes = if signature.is_exact() && members.len() > 1 {
                self.split_exact(members)
            } else {
                vec![members]
            };
            for class in classes {
                if let Some(item) = self.settle(class, vec![key.clone()], 1) {
                    self.pending.push_back(item);
                }
            }
        }

        if let Some(p) = self.ctx.progress() {
            p.on_phase_start(PHASE_GROUPS, 0);
        }
    }

    /// Split files with equal fingerprints into byte-identical classes.
    fn split_exact(&mut self, mut files: Vec<Candidate>) -> Vec<Vec<Candidate>> {
        let mut classes = Vec::new();
        while !files.is_empty() {
            let reference = files.remove(0);
            let rest = std::mem::take(&mut files);
            let verdicts = self.evaluate(&rest, |c| files_equal(&reference.path, &c.path));

            let mut class = vec![reference];
            for (candidate, verdict) in rest.into_iter().zip(verdicts) {
                match verdict {
                    Ok(true) => class.push(candidate),
                    Ok(false) => files.push(candidate),
                    Err(e) => self.drop_unreadable(&candidate, &e),
                }
            }
            classes.push(class);
        }
        classes
    }

    /// Refine one group against its first member with a signal.
    fn refine_reference(
        &mut self,
        files: Vec<Candidate>,
        labels: Vec<Key>,
        stage: usize,
    ) -> Vec<Pending> {
        let signature = self.stages[stage];
        let mut members = files.into_iter();

        let mut reference = None;
        for candidate in members.by_ref() {
            self.stats.evaluations[stage] += 1;
            match signature.probe(&candidate.path) {
                Ok(key) if key.has_signal() => {
                    reference = Some((candidate, key));
                    break;
                }
                Ok(_) => self.drop_no_signal(&candidate, signature),
                Err(e) => self.drop_unreadable(&candidate, &e),
            }
        }
        let Some((reference, reference_key)) = reference else {
            return Vec::new();
        };

        let rest: Vec<Candidate> = members.collect();
        self.stats.evaluations[stage] += rest.len();
        let verdicts = self.evaluate(&rest, |c| {
            signature.matches(&reference.path, &reference_key, &c.path)
        });

        let mut kept = vec![reference];
        let mut rejected = Vec::new();
        for (candidate, verdict) in rest.into_iter().zip(verdicts) {
            match verdict {
                Ok(Verdict::Same) => kept.push(candidate),
                Ok(Verdict::Different(key)) => {
                    log::trace!(
                        "Stage {} ({}): {} differs from reference",
                        stage,
                        signature,
                        candidate.path.display()
                    );
                    let mut own_labels = labels.clone();
                    own_labels.push(key);
                    rejected.push(Pending::Emit(DuplicateGroup::new(vec![candidate], own_labels)));
                }
                Ok(Verdict::NoSignal) => self.drop_no_signal(&candidate, signature),
                Err(e) => self.drop_unreadable(&candidate, &e),
            }
        }

        let mut kept_labels = labels;
        kept_labels.push(reference_key);

        let mut out: Vec<Pending> = self.settle(kept, kept_labels, stage + 1).into_iter().collect();
        out.extend(rejected);
        out
    }

    /// Split one group into a sub-group per key.
    fn refine_equivalence(
        &mut self,
        files: Vec<Candidate>,
        labels: Vec<Key>,
        stage: usize,
    ) -> Vec<Pending> {
        let signature = self.stages[stage];
        let keys = self.evaluate(&files, |c| signature.probe(&c.path));
        self.stats.evaluations[stage] += files.len();

        let mut keyed = Vec::with_capacity(files.len());
        for (candidate, key) in files.into_iter().zip(keys) {
            match key {
                Ok(key) if key.has_signal() => keyed.push((key, candidate)),
                Ok(_) => self.drop_no_signal(&candidate, signature),
                Err(e) => self.drop_unreadable(&candidate, &e),
            }
        }

        let mut out = Vec::new();
        for (key, members) in bucket_by_key(keyed) {
            let classes = if signature.is_exact() && members.len() > 1 {
                self.split_exact(members)
            } else {
                vec![members]
            };
            for class in classes {
                let mut class_labels = labels.clone();
                class_labels.push(key.clone());
                out.extend(self.settle(class, class_labels, stage + 1));
            }
        }
        out
    }
}

impl Iterator for DuplicateStream {
    type Item = DuplicateGroup;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.ctx.is_shutdown_requested() {
                self.mark_interrupted();
                return None;
            }

            match self.pending.pop_front()? {
                Pending::Emit(group) => {
                    self.stats.groups_emitted += 1;
                    if group.has_duplicates() {
                        self.stats.duplicate_groups += 1;
                        self.stats.duplicate_files += group.duplicates().len();
                        self.stats.wasted_space += group.wasted_space();
                    }
                    if let Some(p) = self.ctx.progress() {
                        p.on_progress(self.stats.groups_emitted, "");
                    }
                    log::debug!("Group [{}]: {} file(s)", group.label_trail(), group.len());
                    return Some(group);
                }
                Pending::Refine {
                    files,
                    labels,
                    stage,
                } => {
                    if let Some(p) = self.ctx.progress() {
                        p.on_message(&format!(
                            "Comparing {} file(s) by {}",
                            files.len(),
                            self.stages[stage]
                        ));
                    }
                    let children = match self.partitioning {
                        Partitioning::Reference => self.refine_reference(files, labels, stage),
                        Partitioning::Equivalence => self.refine_equivalence(files, labels, stage),
                    };
                    for child in children.into_iter().rev() {
                        self.pending.push_front(child);
                    }
                }
            }
        }
    }
}
