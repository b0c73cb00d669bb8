//! Command-line interface definitions for dupechain.
//!
//! Every option that also exists in the config file is an `Option` (or a flag
//! that only ever turns a setting on) so that an absent flag leaves the
//! lower configuration layers in charge.
//!
//! # Example
//!
//! ```bash
//! # List duplicate groups under two trees
//! dupechain ~/Photos /mnt/backup/Photos
//!
//! # Cheaper chain, JSON output
//! dupechain --filter size --filter md5 --output json ~/Downloads
//!
//! # Replace duplicates with hard links, no prompts
//! dupechain --link --yes ~/Music
//!
//! # Consolidate into one tree, keeping the larger file on name clashes
//! dupechain --merge /srv/merged:CONDITION:LARGER ~/a ~/b
//!
//! # Run a command per file
//! dupechain --exec 'echo {f1} {}' ~/Documents
//! ```

use clap::{ArgAction, Args, Parser};
use std::path::PathBuf;

use crate::duplicates::Partitioning;
use crate::output::OutputFormat;

/// Progressive duplicate file finder.
///
/// Files are narrowed down through a chain of filters (size, partial hash,
/// full hash, byte comparison), then each group of duplicates is printed,
/// linked, removed, merged or passed to a command.
#[derive(Debug, Parser)]
#[command(name = "dupechain")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file (default: config.toml in the platform config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print errors as JSON objects on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// List the available filters and exit
    #[arg(long)]
    pub list_filters: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Ask before every merge and exec as well
    #[arg(short, long, conflicts_with = "yes")]
    pub interactive: bool,

    /// Directories to search
    #[arg(value_name = "DIRECTORIES", required_unless_present = "list_filters")]
    pub directories: Vec<PathBuf>,

    #[command(flatten)]
    pub scan: ScanArgs,

    #[command(flatten)]
    pub action: ActionArgs,
}

/// Traversal and filter-chain options.
#[derive(Debug, Default, Args)]
pub struct ScanArgs {
    /// Only look at the top level of each directory
    #[arg(long)]
    pub no_recursive: bool,

    /// Descend at most N levels below each directory
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Include hidden files and directories (starting with .)
    #[arg(long)]
    pub follow_hidden: bool,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Consider empty files
    #[arg(long)]
    pub empty_files: bool,

    /// Treat hard links to one file as separate candidates
    #[arg(long)]
    pub keep_hardlinks: bool,

    /// Only consider files whose name matches GLOB (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub include: Vec<String>,

    /// Skip files whose name matches GLOB (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Only consider directories whose path contains TEXT (repeatable)
    #[arg(long, value_name = "TEXT")]
    pub dir_include: Vec<String>,

    /// Skip directories whose path contains TEXT (repeatable)
    #[arg(long, value_name = "TEXT")]
    pub dir_exclude: Vec<String>,

    /// Filter stage, applied in the order given (repeatable)
    ///
    /// See --list-filters. Default: size, partial-md5, md5, bytes
    #[arg(short, long = "filter", value_name = "NAME")]
    pub filters: Vec<String>,

    /// How later stages split a group
    #[arg(long, value_enum, value_name = "MODE")]
    pub partition: Option<Partitioning>,

    /// Smallest group to act on (default: 2)
    #[arg(short, long, value_name = "N")]
    pub threshold: Option<usize>,

    /// Threads used to evaluate filters inside one group (default: 4)
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Listing format when no action is given
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Hide the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

/// What to do with each group. At most one action may be given.
#[derive(Debug, Default, Args)]
#[group(multiple = false)]
pub struct ActionArgs {
    /// Replace duplicates with hard links to the first file
    #[arg(long)]
    pub link: bool,

    /// Delete duplicates, keeping the first file
    #[arg(long)]
    pub remove: bool,

    /// Copy every file into DEST/<filter outputs>/
    ///
    /// Name clashes follow STRATEGY: COUNT (default), IGNORE, ERROR, or
    /// CONDITION:LARGER|SMALLER|NEWER|OLDER.
    #[arg(long, value_name = "DEST[:STRATEGY[:CONDITION]]")]
    pub merge: Option<String>,

    /// Run TEMPLATE once per file
    ///
    /// Placeholders: {} {.} {/} {//} {/.} {..} {f1}..{fN}; {{ and }} are
    /// literal braces.
    #[arg(long, value_name = "TEMPLATE")]
    pub exec: Option<String>,
}
