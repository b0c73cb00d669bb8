//! dupechain - progressive duplicate file finder
//!
//! Candidate files from one or more directory trees pass through a chain of
//! filters, cheapest first (size, partial MD5, full hash, byte comparison).
//! Each stage splits the groups of still-possibly-equal files; the resulting
//! groups are printed, hard linked, removed, merged into one tree, or handed
//! to a command.
//!
//! ```no_run
//! use dupechain::context::RunContext;
//! use dupechain::duplicates::DuplicateFinder;
//! use dupechain::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! let ctx = RunContext::new();
//! for group in DuplicateFinder::with_defaults().scan(&walker, &ctx) {
//!     if group.has_duplicates() {
//!         println!("{:?}", group.paths().collect::<Vec<_>>());
//!     }
//! }
//! ```

pub mod actions;
pub mod cli;
pub mod config;
pub mod context;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::confirm::{AssumeYes, Confirmer, TerminalPrompt};
use crate::actions::{ActionExecutor, ConfirmMode};
use crate::cli::Cli;
use crate::config::RunSettings;
use crate::context::RunContext;
use crate::duplicates::DuplicateFinder;
use crate::error::ExitCode;
use crate::progress::{Progress, PHASE_GROUPS};
use crate::scanner::{Signature, Walker};

/// Run the binary with parsed arguments.
///
/// # Errors
///
/// Configuration problems come back as [`config::ConfigError`], action
/// failures as [`actions::ActionError`] and Ctrl+C as
/// [`duplicates::FinderError::Interrupted`]; [`ExitCode::for_error`] maps
/// them to exit codes.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    if cli.list_filters {
        list_filters(&mut io::stdout().lock())?;
        return Ok(ExitCode::Success);
    }

    let settings = RunSettings::from_cli(&cli)?;
    let handler = signal::install_handler()?;

    let prompts = settings.confirm_mode.applies_to(&settings.policy);
    let show_progress = settings.progress && !prompts && io::stderr().is_terminal();
    let progress = Arc::new(Progress::new(!show_progress));

    let ctx = RunContext::new()
        .with_shutdown_flag(handler.get_flag())
        .with_progress(Arc::clone(&progress) as Arc<dyn progress::ProgressCallback>);

    let walker = Walker::with_roots(settings.roots.iter().cloned(), settings.walker.clone())
        .with_shutdown_flag(handler.get_flag());
    let finder = DuplicateFinder::new(settings.finder.clone());
    log::info!(
        "Searching {} director{} with {} ({} mode), action {}",
        walker.roots().len(),
        if walker.roots().len() == 1 { "y" } else { "ies" },
        finder.config().chain,
        finder.config().partitioning,
        settings.policy.name()
    );

    let confirmer: Box<dyn Confirmer> = match settings.confirm_mode {
        ConfirmMode::Never => Box::new(AssumeYes),
        ConfirmMode::Destructive | ConfirmMode::Always => Box::new(TerminalPrompt),
    };
    let stdout = io::stdout();
    let color = settings.color && stdout.is_terminal();

    let mut stream = finder.scan(&walker, &ctx);
    let mut executor = ActionExecutor::new(settings.policy.clone(), stdout.lock())
        .with_threshold(settings.threshold)
        .with_confirmer(confirmer, settings.confirm_mode)
        .with_color(color);

    let acted = executor.run(&mut stream);
    let (_, report) = executor.into_parts();
    let finished = stream.finish();

    progress.clear();

    acted.context("Action failed")?;
    let stats = finished?;
    ctx.finish(PHASE_GROUPS, &stats.summary());
    log::info!("{}", report.summary());

    Ok(ExitCode::Success)
}

fn list_filters<W: Write>(out: &mut W) -> io::Result<()> {
    for signature in Signature::ALL {
        writeln!(out, "{:<12} {}", signature.name(), signature.description())?;
    }
    Ok(())
}
