//! Exec action: run a command template once per group member.
//!
//! Commands run through the platform shell (`sh -c` on Unix, `powershell
//! -Command` on Windows). Their stdout is captured and written through
//! verbatim; stderr goes straight to the terminal. A non-zero exit aborts the
//! run.

use std::io::Write;
use std::process::{Command, Stdio};

use super::template::CommandTemplate;
use super::{ActionError, ActionReport};
use crate::duplicates::DuplicateGroup;

/// Build the shell invocation for `command`.
#[must_use]
pub fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("powershell");
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Run one command, copying its stdout to `out`.
///
/// # Errors
///
/// Returns [`ActionError::Spawn`] if the shell cannot start,
/// [`ActionError::CommandFailed`] on a non-zero exit, and
/// [`ActionError::Output`] if `out` cannot be written.
pub fn run_command<W: Write>(command: &str, out: &mut W) -> Result<(), ActionError> {
    log::debug!("Running: {}", command);
    let output = shell_command(command)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|source| ActionError::Spawn {
            command: command.to_string(),
            source,
        })?;

    out.write_all(&output.stdout).map_err(ActionError::Output)?;

    if !output.status.success() {
        log::error!("Command failed ({}): {}", output.status, command);
        return Err(ActionError::CommandFailed {
            command: command.to_string(),
            code: output.status.code(),
        });
    }
    Ok(())
}

/// Expand and run `template` for every member of `group`, source first.
///
/// # Errors
///
/// Stops at the first unresolvable label or failing command.
pub fn exec_group<W: Write>(
    template: &CommandTemplate,
    group: &DuplicateGroup,
    out: &mut W,
    report: &mut ActionReport,
) -> Result<(), ActionError> {
    for file in &group.files {
        let command = template.expand(&file.path, &group.labels)?;
        run_command(&command, out)?;
        report.commands_run += 1;
    }
    Ok(())
}
