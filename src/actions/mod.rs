//! Actions applied to confirmed duplicate groups.
//!
//! Exactly one [`ActionPolicy`] is active per run:
//! - `Print`: list the group (`pretty`, `basic` or `json`)
//! - `Link`: replace every duplicate with a hard link to the source
//! - `Remove`: delete every duplicate
//! - `Merge`: copy every member into `<dest>/<label1>/<label2>/...`
//! - `Exec`: run a command template once per member
//!
//! The [`ActionExecutor`] applies the policy to each group whose size reaches
//! the threshold, asking a [`Confirmer`](confirm::Confirmer) first where the
//! run requires it, and keeps an [`ActionReport`].
//!
//! ```
//! use dupechain::actions::{ActionExecutor, ActionPolicy};
//! use dupechain::output::OutputFormat;
//!
//! let executor = ActionExecutor::new(ActionPolicy::Print(OutputFormat::Basic), Vec::new())
//!     .with_threshold(2);
//! assert_eq!(executor.threshold(), 2);
//! ```

pub mod confirm;
pub mod delete;
pub mod exec;
pub mod link;
pub mod merge;
pub mod template;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::duplicates::DuplicateGroup;
use crate::output::{GroupPrinter, JsonOutputError, OutputFormat};
use confirm::{AssumeYes, Confirmer};

pub use merge::{Condition, MergeAction, MergeSpecError, OverwriteStrategy};
pub use template::{shell_escape, CommandTemplate, TemplateError};

/// Smallest group acted on when no threshold is configured.
pub const DEFAULT_THRESHOLD: usize = 2;

/// Errors raised while acting on a group.
#[derive(thiserror::Error, Debug)]
pub enum ActionError {
    /// The user answered no to a confirmation prompt.
    #[error("Aborted: confirmation declined")]
    Declined,

    /// A merge destination already exists under the `ERROR` strategy.
    #[error("Destination already exists: {path}")]
    Conflict {
        /// The occupied destination
        path: PathBuf,
    },

    /// A command exited unsuccessfully.
    #[error("Command failed ({}): {command}", exit_label(.code))]
    CommandFailed {
        /// The expanded command line
        command: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
    },

    /// A template referenced a filter label the group does not have.
    #[error("Template label {label} is out of range: the group has {available} filter label(s)")]
    UnknownLabel {
        /// The offending placeholder, e.g. `f3`
        label: String,
        /// Labels the group carries
        available: usize,
    },

    /// The shell could not be started.
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        /// The expanded command line
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A filesystem operation on a group member failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Writing to the output stream failed.
    #[error("Failed to write output: {0}")]
    Output(#[source] io::Error),

    /// Formatting a group failed.
    #[error(transparent)]
    Format(#[from] JsonOutputError),

    /// The confirmation prompt could not be shown or read.
    #[error("Confirmation prompt failed: {0}")]
    Prompt(String),
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "killed by signal".to_string(), |c| format!("exit code {c}"))
}

impl ActionError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error is a deliberate stop (declined prompt, merge
    /// conflict, failed command) rather than an unexpected failure.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Self::Declined
                | Self::Conflict { .. }
                | Self::CommandFailed { .. }
                | Self::UnknownLabel { .. }
        )
    }
}

/// Result of acting on one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// The operation was carried out.
    Done,
    /// The file was gone by the time it was reached.
    Missing,
}

/// What the run does with each group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPolicy {
    /// List the group.
    Print(OutputFormat),
    /// Hard link duplicates to the source.
    Link,
    /// Delete duplicates.
    Remove,
    /// Copy members into a consolidated tree.
    Merge(MergeAction),
    /// Run a command per member.
    Exec(CommandTemplate),
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self::Print(OutputFormat::default())
    }
}

impl ActionPolicy {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Print(_) => "print",
            Self::Link => "link",
            Self::Remove => "remove",
            Self::Merge(_) => "merge",
            Self::Exec(_) => "exec",
        }
    }

    /// Whether the policy deletes or replaces existing files.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Link | Self::Remove)
    }

    /// Whether the policy touches the filesystem or runs commands.
    #[must_use]
    pub fn has_side_effects(&self) -> bool {
        !matches!(self, Self::Print(_))
    }
}

/// When the executor asks before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmMode {
    /// Never ask.
    #[default]
    Never,
    /// Ask for link and remove.
    Destructive,
    /// Ask for every action with side effects.
    Always,
}

impl ConfirmMode {
    /// Whether `policy` is prompted for under this mode.
    #[must_use]
    pub fn applies_to(self, policy: &ActionPolicy) -> bool {
        match self {
            Self::Never => false,
            Self::Destructive => policy.is_destructive(),
            Self::Always => policy.has_side_effects(),
        }
    }
}

/// Counters kept while acting on groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReport {
    /// Groups at or above the threshold that were acted on
    pub groups_acted: usize,
    /// Groups below the threshold
    pub groups_skipped: usize,
    /// Duplicates replaced by hard links
    pub files_linked: usize,
    /// Duplicates deleted
    pub files_removed: usize,
    /// Files copied by merge
    pub files_copied: usize,
    /// Files merge left alone
    pub files_skipped: usize,
    /// Files that had vanished before they were reached
    pub files_missing: usize,
    /// Commands run by exec
    pub commands_run: usize,
}

impl ActionReport {
    /// One-line summary for the end-of-run log.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} group(s) acted on, {} below threshold; linked {}, removed {}, copied {}, skipped {}, missing {}, commands {}",
            self.groups_acted,
            self.groups_skipped,
            self.files_linked,
            self.files_removed,
            self.files_copied,
            self.files_skipped,
            self.files_missing,
            self.commands_run,
        )
    }
}

/// Applies an [`ActionPolicy`] to groups, writing listings and command
/// output to `W`.
pub struct ActionExecutor<W: Write> {
    policy: ActionPolicy,
    threshold: usize,
    confirmer: Box<dyn Confirmer>,
    confirm_mode: ConfirmMode,
    color: bool,
    out: W,
    report: ActionReport,
}

impl<W: Write> ActionExecutor<W> {
    /// Create an executor that never prompts, with the default threshold.
    pub fn new(policy: ActionPolicy, out: W) -> Self {
        Self {
            policy,
            threshold: DEFAULT_THRESHOLD,
            confirmer: Box::new(AssumeYes),
            confirm_mode: ConfirmMode::Never,
            color: false,
            out,
            report: ActionReport::default(),
        }
    }

    /// Set the minimum group size. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    /// Ask `confirmer` before acting, for the policies `mode` covers.
    #[must_use]
    pub fn with_confirmer(mut self, confirmer: Box<dyn Confirmer>, mode: ConfirmMode) -> Self {
        self.confirmer = confirmer;
        self.confirm_mode = mode;
        self
    }

    /// Color the source line of pretty listings.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// The active policy.
    pub fn policy(&self) -> &ActionPolicy {
        &self.policy
    }

    /// The effective threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Counters so far.
    pub fn report(&self) -> &ActionReport {
        &self.report
    }

    /// Consume the executor, returning the writer and the report.
    pub fn into_parts(self) -> (W, ActionReport) {
        (self.out, self.report)
    }

    /// Act on one group.
    ///
    /// # Errors
    ///
    /// Returns the first [`ActionError`] hit; files already handled stay as
    /// they are.
    pub fn execute(&mut self, group: &DuplicateGroup) -> Result<(), ActionError> {
        if group.len() < self.threshold {
            self.report.groups_skipped += 1;
            log::trace!("Group of {} below threshold {}", group.len(), self.threshold);
            return Ok(());
        }

        log::info!("Group of {} [{}]", group.len(), group.label_trail());

        if self.confirm_mode.applies_to(&self.policy) && !self.ask(group)? {
            return Err(ActionError::Declined);
        }

        match &self.policy {
            ActionPolicy::Print(format) => {
                GroupPrinter::new(*format, self.color).write_group(&mut self.out, group)?;
            }
            ActionPolicy::Link => link::link_group(group, &mut self.report)?,
            ActionPolicy::Remove => delete::remove_group(group, &mut self.report)?,
            ActionPolicy::Merge(action) => {
                action.merge_group(group, &mut self.out, &mut self.report)?;
            }
            ActionPolicy::Exec(template) => {
                exec::exec_group(template, group, &mut self.out, &mut self.report)?;
            }
        }
        self.report.groups_acted += 1;
        Ok(())
    }

    /// Act on every group in order, then flush the writer.
    ///
    /// # Errors
    ///
    /// Stops at the first failing group.
    pub fn run<I>(&mut self, groups: I) -> Result<(), ActionError>
    where
        I: IntoIterator<Item = DuplicateGroup>,
    {
        for group in groups {
            self.execute(&group)?;
        }
        self.out.flush().map_err(ActionError::Output)
    }

    fn ask(&mut self, group: &DuplicateGroup) -> Result<bool, ActionError> {
        let (question, files): (String, Vec<PathBuf>) = match &self.policy {
            ActionPolicy::Link => (
                format!(
                    "Replace {} file(s) with hard links to {}?",
                    group.duplicates().len(),
                    source_display(group)
                ),
                group.duplicates().iter().map(|c| c.path.clone()).collect(),
            ),
            ActionPolicy::Remove => (
                format!(
                    "Remove {} duplicate(s) of {}?",
                    group.duplicates().len(),
                    source_display(group)
                ),
                group.duplicates().iter().map(|c| c.path.clone()).collect(),
            ),
            ActionPolicy::Merge(action) => (
                format!(
                    "Copy {} file(s) into {}?",
                    group.len(),
                    action.group_dir(&group.labels).display()
                ),
                group.paths().map(Path::to_path_buf).collect(),
            ),
            ActionPolicy::Exec(template) => (
                format!("Run '{}' for {} file(s)?", template, group.len()),
                group.paths().map(Path::to_path_buf).collect(),
            ),
            ActionPolicy::Print(_) => return Ok(true),
        };
        self.confirmer.confirm(&question, &files)
    }
}

fn source_display(group: &DuplicateGroup) -> String {
    group
        .source()
        .map(|c| c.path.display().to_string())
        .unwrap_or_default()
}
