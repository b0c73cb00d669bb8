//! Command templates for the exec action.
//!
//! # Syntax
//!
//! | Placeholder | Expands to                               |
//! |-------------|------------------------------------------|
//! | `{}`        | full path                                |
//! | `{.}`       | path without extension                   |
//! | `{/}`       | basename                                 |
//! | `{//}`      | parent directory                         |
//! | `{/.}`      | basename without extension               |
//! | `{..}`      | extension only, with the dot             |
//! | `{fN}`      | output of filter stage N (1-based)       |
//! | `{{` `}}`   | literal `{` and `}`                      |
//!
//! Templates are parsed once at configuration time. Every substituted value
//! goes through [`shell_escape`] before it is inserted, so file names can never
//! inject shell syntax.
//!
//! # Example
//!
//! ```
//! use dupechain::actions::template::CommandTemplate;
//! use dupechain::scanner::Key;
//! use std::path::Path;
//!
//! let template: CommandTemplate = "echo {/} {f1}".parse().unwrap();
//! let command = template
//!     .expand(Path::new("/photos/it's.jpg"), &[Key::new("1024")])
//!     .unwrap();
//! # #[cfg(unix)]
//! assert_eq!(command, r"echo 'it'\''s.jpg' '1024'");
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::ActionError;
use crate::scanner::Key;

/// Errors found while parsing a template.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template is empty or only whitespace.
    #[error("command template is empty")]
    Empty,

    /// A `{` without a closing `}`.
    #[error("unterminated '{{' at byte {0}")]
    Unterminated(usize),

    /// A `}` that closes nothing; write `}}` for a literal brace.
    #[error("unmatched '}}' at byte {0} (use '}}}}' for a literal brace)")]
    UnmatchedClose(usize),

    /// Unknown text inside braces.
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Path,
    NoExtension,
    Basename,
    Dirname,
    BasenameNoExtension,
    Extension,
    Label(usize),
}

/// A parsed command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    raw: String,
    tokens: Vec<Token>,
}

impl CommandTemplate {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for an empty template, an unterminated or
    /// unmatched brace, or an unknown placeholder.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if raw.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|&(_, n)| n == '{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().is_some_and(|&(_, n)| n == '}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedClose(pos)),
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(TemplateError::Unterminated(pos));
                    }
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Self::placeholder(&name)?);
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            tokens,
        })
    }

    fn placeholder(name: &str) -> Result<Token, TemplateError> {
        let token = match name {
            "" => Token::Path,
            "." => Token::NoExtension,
            "/" => Token::Basename,
            "//" => Token::Dirname,
            "/." => Token::BasenameNoExtension,
            ".." => Token::Extension,
            _ => match name.strip_prefix('f').map(str::parse::<usize>) {
                Some(Ok(n)) if n >= 1 => Token::Label(n),
                _ => return Err(TemplateError::UnknownPlaceholder(name.to_string())),
            },
        };
        Ok(token)
    }

    /// The template as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Highest `{fN}` referenced, if any.
    #[must_use]
    pub fn max_label(&self) -> Option<usize> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Label(n) => Some(*n),
                _ => None,
            })
            .max()
    }

    /// Expand the template for one file, shell-escaping every substitution.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UnknownLabel`] if `{fN}` names a stage the
    /// group did not pass through.
    pub fn expand(&self, path: &Path, labels: &[Key]) -> Result<String, ActionError> {
        self.expand_with(path, labels, shell_escape)
    }

    /// Expand with a custom escaping function.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UnknownLabel`] for an out-of-range label.
    pub fn expand_with(
        &self,
        path: &Path,
        labels: &[Key],
        escape: impl Fn(&str) -> String,
    ) -> Result<String, ActionError> {
        let mut out = String::with_capacity(self.raw.len() + 64);
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Label(n) => {
                    let label = labels.get(n - 1).ok_or_else(|| ActionError::UnknownLabel {
                        label: format!("f{n}"),
                        available: labels.len(),
                    })?;
                    out.push_str(&escape(label.as_str().trim()));
                }
                field => out.push_str(&escape(&path_field(field, path))),
            }
        }
        Ok(out)
    }
}

fn path_field(token: &Token, path: &Path) -> String {
    let lossy = |p: &Path| p.to_string_lossy().into_owned();
    match token {
        Token::Path => lossy(path),
        Token::NoExtension => lossy(&path.with_extension("")),
        Token::Basename => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Token::Dirname => path.parent().map(lossy).unwrap_or_default(),
        Token::BasenameNoExtension => path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Token::Extension => path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
        Token::Literal(_) | Token::Label(_) => String::new(),
    }
}

impl FromStr for CommandTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Quote a value for the platform shell.
///
/// POSIX shells get single quotes with `'` written as `'\''`; PowerShell gets
/// single quotes with `'` doubled.
#[must_use]
pub fn shell_escape(value: &str) -> String {
    if cfg!(windows) {
        escape_powershell(value)
    } else {
        escape_posix(value)
    }
}

/// Single-quote for `sh`.
#[must_use]
pub fn escape_posix(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Single-quote for PowerShell.
#[must_use]
pub fn escape_powershell(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
