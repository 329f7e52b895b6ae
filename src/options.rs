//! Global command-line tokens shared by every instance.
//!
//! The external tool's global options live in a plain text file, one or more
//! options per line. Lines starting with `#` are comments; everything else is
//! split with shell quoting rules.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::state::{StateError, write_text};

/// Written when the global options file does not exist yet.
pub const DEFAULT_OPTIONS_TEMPLATE: &str = "\
# Global download tool options, passed to every instance before its own.
# One or more options per line; lines starting with '#' are ignored.
# Quoting follows shell rules.
# --cookies cookies.txt
# -o \"filename={date:%Y-%m-%d}_{user}_{title}_{id}_{num:>02}.{extension}\"
";

/// Supplies the global tokens prepended to every instance's arguments.
pub trait ArgsSupplier: Send + Sync {
    /// Returns the tokens in order. Called once per start.
    fn global_tokens(&self) -> Vec<String>;
}

impl<F> ArgsSupplier for F
where
    F: Fn() -> Vec<String> + Send + Sync,
{
    fn global_tokens(&self) -> Vec<String> {
        self()
    }
}

/// Errors raised while parsing option lines.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// A line has unbalanced quotes or a dangling escape.
    #[error("line {line_number}: cannot split '{line}' (unbalanced quoting)")]
    Unbalanced {
        /// One-based line number.
        line_number: usize,
        /// The offending line.
        line: String,
    },

    /// The options file could not be read.
    #[error("failed to read options file '{path}': {source}")]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The default template could not be written.
    #[error(transparent)]
    Write(#[from] StateError),
}

/// Splits option text into tokens, skipping blank and `#` lines.
///
/// # Errors
///
/// Returns [`OptionsError::Unbalanced`] for the first line that cannot be
/// split.
pub fn parse_option_lines(text: &str) -> Result<Vec<String>, OptionsError> {
    let mut tokens = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let split = shlex::split(line).ok_or_else(|| OptionsError::Unbalanced {
            line_number: index + 1,
            line: line.to_string(),
        })?;
        tokens.extend(split);
    }
    Ok(tokens)
}

/// Splits a single free-form option string (per-instance extra options).
///
/// Unbalanced input falls back to whitespace splitting and is logged.
#[must_use]
pub fn split_extra_options(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    shlex::split(trimmed).unwrap_or_else(|| {
        warn!(options = trimmed, "unbalanced quoting in extra options; splitting on whitespace");
        trimmed.split_whitespace().map(ToOwned::to_owned).collect()
    })
}

/// File-backed [`ArgsSupplier`] re-read on every start so edits apply to
/// the next run.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    path: PathBuf,
}

impl GlobalOptions {
    /// Uses `path` without touching the filesystem.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses `path`, writing [`DEFAULT_OPTIONS_TEMPLATE`] there first if the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Write`] when the template cannot be written.
    pub fn open_or_create(path: impl Into<PathBuf>) -> Result<Self, OptionsError> {
        let path = path.into();
        if !path.exists() {
            write_text(&path, DEFAULT_OPTIONS_TEMPLATE)?;
            debug!(path = %path.display(), "wrote default global options");
        }
        Ok(Self { path })
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and splits the file.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Read`] or [`OptionsError::Unbalanced`].
    pub fn load(&self) -> Result<Vec<String>, OptionsError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(OptionsError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        parse_option_lines(&text)
    }
}

impl ArgsSupplier for GlobalOptions {
    fn global_tokens(&self) -> Vec<String> {
        self.load().unwrap_or_else(|error| {
            warn!(%error, "ignoring global options");
            Vec::new()
        })
    }
}

/// Fixed token list.
#[derive(Debug, Clone, Default)]
pub struct StaticArgs(pub Vec<String>);

impl ArgsSupplier for StaticArgs {
    fn global_tokens(&self) -> Vec<String> {
        self.0.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_option_lines_skips_comments_and_quotes() {
        let text = "# comment\n\n--cookies cookies.txt\n  -o \"filename={id} {num}.{extension}\"\n";
        assert_eq!(
            parse_option_lines(text).unwrap(),
            vec![
                "--cookies".to_string(),
                "cookies.txt".to_string(),
                "-o".to_string(),
                "filename={id} {num}.{extension}".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_option_lines_reports_unbalanced_line() {
        let err = parse_option_lines("--ok\n--bad \"open").unwrap_err();
        assert!(matches!(err, OptionsError::Unbalanced { line_number: 2, .. }));
    }

    #[test]
    fn test_default_template_parses_to_nothing() {
        assert!(parse_option_lines(DEFAULT_OPTIONS_TEMPLATE).unwrap().is_empty());
    }

    #[test]
    fn test_split_extra_options_falls_back_on_bad_quoting() {
        assert_eq!(
            split_extra_options("--range '1-5' -v"),
            vec!["--range".to_string(), "1-5".to_string(), "-v".to_string()]
        );
        assert_eq!(
            split_extra_options("--bad 'x y"),
            vec!["--bad".to_string(), "'x".to_string(), "y".to_string()]
        );
        assert!(split_extra_options("   ").is_empty());
    }

    #[test]
    fn test_global_options_created_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global_options.txt");

        let options = GlobalOptions::open_or_create(&path).unwrap();
        assert!(path.exists());
        assert!(options.global_tokens().is_empty());

        std::fs::write(&path, "--no-part\n").unwrap();
        assert_eq!(options.global_tokens(), vec!["--no-part".to_string()]);
    }

    #[test]
    fn test_closure_is_a_supplier() {
        let supplier = || vec!["--verbose".to_string()];
        let boxed: Box<dyn ArgsSupplier> = Box::new(supplier);
        assert_eq!(boxed.global_tokens(), vec!["--verbose".to_string()]);
    }
}
