//! Human-readable group listings.
//!
//! `pretty` prints the source on its own line, each duplicate indented by four
//! spaces, and a blank line after the group. `basic` prints one path per line.

use std::io::{self, Write};

use yansi::Paint;

use crate::duplicates::DuplicateGroup;

/// Write a group in the pretty layout.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_pretty<W: Write>(out: &mut W, group: &DuplicateGroup, color: bool) -> io::Result<()> {
    let mut paths = group.paths();
    if let Some(source) = paths.next() {
        let source = source.display().to_string();
        if color {
            writeln!(out, "{}", source.green().bold())?;
        } else {
            writeln!(out, "{source}")?;
        }
    }
    for duplicate in paths {
        writeln!(out, "    {}", duplicate.display())?;
    }
    writeln!(out)
}

/// Write a group one path per line.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_basic<W: Write>(out: &mut W, group: &DuplicateGroup) -> io::Result<()> {
    for path in group.paths() {
        writeln!(out, "{}", path.display())?;
    }
    Ok(())
}
