//! Per-run context shared by the filter chain and the action executor.
//!
//! A [`RunContext`] is created once at run start, handed by reference to the
//! engine and the executor, and finished at run end. It carries the shutdown
//! flag and the optional progress reporter, so nothing inside the pipeline
//! reaches for process-global state.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::progress::ProgressCallback;

/// Shutdown flag and progress reporter for one run.
#[derive(Clone, Default)]
pub struct RunContext {
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl RunContext {
    /// Create an empty context: never interrupted, no progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown flag observed between candidates and groups.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress reporter.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The shutdown flag, if any.
    #[must_use]
    pub fn shutdown_flag(&self) -> Option<Arc<AtomicBool>> {
        self.shutdown_flag.clone()
    }

    /// Whether the run should stop.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// The progress reporter, if any.
    #[must_use]
    pub fn progress(&self) -> Option<&dyn ProgressCallback> {
        self.progress.as_deref()
    }

    /// End the run: close any open progress phase and log the summary line.
    pub fn finish(&self, phase: &str, summary: &str) {
        if let Some(progress) = self.progress() {
            progress.on_phase_end(phase);
        }
        log::info!("{}", summary);
    }
}
