//! Yes/no confirmation before an action touches the filesystem.
//!
//! The executor asks a [`Confirmer`] once per group. On a terminal that is a
//! [`TerminalPrompt`] backed by `dialoguer`; `--yes` swaps in [`AssumeYes`].

use std::io::IsTerminal;
use std::path::PathBuf;

use dialoguer::Confirm;

use super::ActionError;

/// Asks whether a group may be acted on.
pub trait Confirmer {
    /// Show `question` and the affected `files`, return the answer.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Prompt`] if the terminal cannot be read.
    fn confirm(&mut self, question: &str, files: &[PathBuf]) -> Result<bool, ActionError>;
}

/// Answers yes without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&mut self, _question: &str, _files: &[PathBuf]) -> Result<bool, ActionError> {
        Ok(true)
    }
}

/// Replays a fixed answer; useful for scripted runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirmer for FixedAnswer {
    fn confirm(&mut self, _question: &str, _files: &[PathBuf]) -> Result<bool, ActionError> {
        Ok(self.0)
    }
}

/// Interactive prompt on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl Confirmer for TerminalPrompt {
    fn confirm(&mut self, question: &str, files: &[PathBuf]) -> Result<bool, ActionError> {
        eprintln!("{question}");
        for file in files {
            eprintln!("    {}", file.display());
        }
        Confirm::new()
            .with_prompt("Proceed?")
            .default(false)
            .interact()
            .map_err(|e| ActionError::Prompt(e.to_string()))
    }
}

/// Whether prompts can be shown: both stdin and stderr are terminals.
#[must_use]
pub fn can_prompt() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}
