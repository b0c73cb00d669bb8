//! Layered configuration.
//!
//! Settings are merged with `figment`, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config PATH`, or `config.toml` in the platform config
//!    directory when it exists)
//! 3. `DUPECHAIN_*` environment variables (`__` separates nested keys)
//! 4. command-line flags
//!
//! The merged [`Config`] is then validated into [`RunSettings`], which is
//! everything a run needs. All validation happens here, before any candidate
//! file is touched.
//!
//! ```toml
//! filters = ["size", "md5", "bytes"]
//! threshold = 2
//! partition = "equivalence"
//! exclude = ["*.tmp"]
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use ignore::gitignore::GitignoreBuilder;
use serde::{Deserialize, Serialize};

use crate::actions::confirm::can_prompt;
use crate::actions::{
    ActionPolicy, CommandTemplate, ConfirmMode, MergeAction, MergeSpecError, TemplateError,
    DEFAULT_THRESHOLD,
};
use crate::cli::{Cli, ScanArgs};
use crate::duplicates::{FilterChain, FinderConfig, Partitioning, DEFAULT_CHAIN};
use crate::output::OutputFormat;
use crate::scanner::{Signature, WalkerConfig};

/// Prefix of the environment layer.
pub const ENV_PREFIX: &str = "DUPECHAIN_";

/// Errors found while assembling the run configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// No directory to search.
    #[error("No directories given")]
    NoDirectories,

    /// A root does not exist.
    #[error("Directory not found: {0}")]
    RootNotFound(PathBuf),

    /// A root is a file.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The filter list is empty.
    #[error("At least one filter is required")]
    EmptyChain,

    /// A filter name is not known.
    #[error("Unknown filter '{name}'{}", suggestion_hint(.suggestion))]
    UnknownFilter {
        /// The name as given
        name: String,
        /// Closest known filter, if any is close
        suggestion: Option<&'static str>,
    },

    /// An include/exclude glob does not parse.
    #[error("Invalid glob '{pattern}': {message}")]
    InvalidGlob {
        /// The pattern as given
        pattern: String,
        /// Parser message
        message: String,
    },

    /// The `--merge` argument is malformed.
    #[error("Invalid merge specification: {0}")]
    Merge(#[from] MergeSpecError),

    /// The `--exec` template is malformed.
    #[error("Invalid command template: {0}")]
    Template(#[from] TemplateError),

    /// The `--exec` template names a filter output the chain never produces.
    #[error("Command template uses {{f{label}}} but the chain has {stages} filter(s)")]
    LabelOutOfRange {
        /// Highest `{fN}` in the template
        label: usize,
        /// Number of filters in the chain
        stages: usize,
    },

    /// Confirmation is required but nobody can answer.
    #[error("--{action} needs confirmation but stdin is not a terminal; pass --yes to proceed")]
    NoConfirmationChannel {
        /// The action flag
        action: &'static str,
    },

    /// An explicit `--config` file is missing.
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    /// The merged layers do not deserialize.
    #[error("Invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

fn suggestion_hint(suggestion: &Option<&'static str>) -> String {
    suggestion.map_or_else(String::new, |s| format!(" (did you mean '{s}'?)"))
}

/// Settings that can come from the config file or the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filter chain, first stage first
    pub filters: Vec<String>,
    /// Smallest group acted on
    pub threshold: usize,
    /// Threads used inside one group
    pub io_threads: usize,
    /// Refinement mode
    pub partition: Partitioning,
    /// Listing format
    pub output: OutputFormat,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Include hidden entries
    pub follow_hidden: bool,
    /// Follow symbolic links
    pub follow_symlinks: bool,
    /// Include empty files
    pub empty_files: bool,
    /// Yield every hard link of a file
    pub keep_hardlinks: bool,
    /// Depth limit below each root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// File name globs to keep
    pub include: Vec<String>,
    /// File name globs to skip
    pub exclude: Vec<String>,
    /// Directory path substrings that must all be present
    pub dir_include: Vec<String>,
    /// Directory path substrings that reject a directory
    pub dir_exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let walker = WalkerConfig::default();
        Self {
            filters: DEFAULT_CHAIN.iter().map(|s| s.name().to_string()).collect(),
            threshold: DEFAULT_THRESHOLD,
            io_threads: FinderConfig::default().io_threads,
            partition: Partitioning::default(),
            output: OutputFormat::default(),
            recursive: walker.recursive,
            follow_hidden: walker.follow_hidden,
            follow_symlinks: walker.follow_symlinks,
            empty_files: walker.empty_files,
            keep_hardlinks: walker.keep_hardlinks,
            max_depth: walker.max_depth,
            include: Vec::new(),
            exclude: Vec::new(),
            dir_include: Vec::new(),
            dir_exclude: Vec::new(),
        }
    }
}

impl Config {
    /// Platform config file, e.g. `~/.config/dupechain/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupechain").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults, file and environment layers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] if `explicit` does not exist.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound(path.to_path_buf()));
                }
                log::debug!("Loading config from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.is_file()) {
                    log::debug!("Loading config from {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load defaults, file and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or a value has the wrong type.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(explicit)?
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Lay command-line flags over the loaded layers. Lists given on the
    /// command line replace the configured ones.
    pub fn apply_cli(&mut self, args: &ScanArgs) {
        if !args.filters.is_empty() {
            self.filters.clone_from(&args.filters);
        }
        if let Some(threshold) = args.threshold {
            self.threshold = threshold;
        }
        if let Some(threads) = args.io_threads {
            self.io_threads = threads;
        }
        if let Some(partition) = args.partition {
            self.partition = partition;
        }
        if let Some(output) = args.output {
            self.output = output;
        }
        if args.max_depth.is_some() {
            self.max_depth = args.max_depth;
        }
        if args.no_recursive {
            self.recursive = false;
        }
        self.follow_hidden |= args.follow_hidden;
        self.follow_symlinks |= args.follow_symlinks;
        self.empty_files |= args.empty_files;
        self.keep_hardlinks |= args.keep_hardlinks;

        for (target, given) in [
            (&mut self.include, &args.include),
            (&mut self.exclude, &args.exclude),
            (&mut self.dir_include, &args.dir_include),
            (&mut self.dir_exclude, &args.dir_exclude),
        ] {
            if !given.is_empty() {
                target.clone_from(given);
            }
        }
    }

    /// Resolve the filter names into a chain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFilter`] with the closest known name, or
    /// [`ConfigError::EmptyChain`].
    pub fn chain(&self) -> Result<FilterChain, ConfigError> {
        let stages = self
            .filters
            .iter()
            .map(|name| {
                Signature::from_name(name).ok_or_else(|| ConfigError::UnknownFilter {
                    name: name.clone(),
                    suggestion: suggest_filter(name),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        FilterChain::new(stages).map_err(|_| ConfigError::EmptyChain)
    }

    /// Walker options, after checking the globs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidGlob`] for a pattern that does not parse.
    pub fn walker_config(&self) -> Result<WalkerConfig, ConfigError> {
        let mut builder = GitignoreBuilder::new("/");
        for pattern in self.include.iter().chain(&self.exclude) {
            builder
                .add_line(None, pattern)
                .map_err(|e| ConfigError::InvalidGlob {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
        }

        Ok(WalkerConfig {
            recursive: self.recursive,
            max_depth: self.max_depth,
            follow_hidden: self.follow_hidden,
            follow_symlinks: self.follow_symlinks,
            empty_files: self.empty_files,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            dir_include: self.dir_include.clone(),
            dir_exclude: self.dir_exclude.clone(),
            keep_hardlinks: self.keep_hardlinks,
        })
    }
}

/// Closest filter name, if it is close enough to be a likely typo.
#[must_use]
pub fn suggest_filter(name: &str) -> Option<&'static str> {
    let lowered = name.to_ascii_lowercase();
    Signature::ALL
        .iter()
        .map(|s| (s.name(), strsim::jaro_winkler(&lowered, s.name())))
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(name, _)| name)
}

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Directories to walk, as given
    pub roots: Vec<PathBuf>,
    /// Traversal options
    pub walker: WalkerConfig,
    /// Engine options
    pub finder: FinderConfig,
    /// The one action of this run
    pub policy: ActionPolicy,
    /// Smallest group acted on, at least 1
    pub threshold: usize,
    /// When to prompt
    pub confirm_mode: ConfirmMode,
    /// Color allowed by flags and environment
    pub color: bool,
    /// Progress allowed by flags
    pub progress: bool,
}

impl RunSettings {
    /// Load every layer and validate it against `cli`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Config::load(cli.config.as_deref())?;
        config.apply_cli(&cli.scan);
        Self::resolve(cli, &config, can_prompt())
    }

    /// Validate a merged config. `terminal` says whether prompts can be shown.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn resolve(cli: &Cli, config: &Config, terminal: bool) -> Result<Self, ConfigError> {
        let chain = config.chain()?;
        let walker = config.walker_config()?;
        let policy = action_policy(cli, config.output)?;
        if let ActionPolicy::Exec(template) = &policy {
            if let Some(label) = template.max_label().filter(|&n| n > chain.len()) {
                return Err(ConfigError::LabelOutOfRange {
                    label,
                    stages: chain.len(),
                });
            }
        }

        let confirm_mode = if cli.yes {
            ConfirmMode::Never
        } else if cli.interactive {
            ConfirmMode::Always
        } else {
            ConfirmMode::Destructive
        };
        if confirm_mode.applies_to(&policy) && !terminal {
            return Err(ConfigError::NoConfirmationChannel {
                action: policy.name(),
            });
        }

        if cli.directories.is_empty() {
            return Err(ConfigError::NoDirectories);
        }
        for root in &cli.directories {
            match std::fs::metadata(root) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => return Err(ConfigError::NotADirectory(root.clone())),
                Err(_) => return Err(ConfigError::RootNotFound(root.clone())),
            }
        }

        Ok(Self {
            roots: cli.directories.clone(),
            walker,
            finder: FinderConfig::default()
                .with_chain(chain)
                .with_partitioning(config.partition)
                .with_io_threads(config.io_threads),
            policy,
            threshold: config.threshold.max(1),
            confirm_mode,
            color: !cli.no_color,
            progress: !cli.quiet && !cli.scan.no_progress,
        })
    }
}

fn action_policy(cli: &Cli, output: OutputFormat) -> Result<ActionPolicy, ConfigError> {
    let action = &cli.action;
    if action.link {
        Ok(ActionPolicy::Link)
    } else if action.remove {
        Ok(ActionPolicy::Remove)
    } else if let Some(spec) = &action.merge {
        Ok(ActionPolicy::Merge(MergeAction::parse(spec)?))
    } else if let Some(template) = &action.exec {
        Ok(ActionPolicy::Exec(CommandTemplate::parse(template)?))
    } else {
        Ok(ActionPolicy::Print(output))
    }
}
