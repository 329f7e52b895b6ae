//! On-disk state: data directory layout and JSON state files.
//!
//! Everything here sits off the hot path. Files are read at startup and
//! written at start, edit and shutdown boundaries. Writes go through a temp
//! file plus rename so a crash never leaves a half-written JSON document.

mod app_state;
mod paths;

pub use app_state::AppState;
pub use paths::{APP_DIR_NAME, StatePaths};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised while reading or writing state files.
#[derive(Debug, Error)]
pub enum StateError {
    /// Filesystem access failed.
    #[error("state file I/O failed for '{path}': {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file held malformed JSON or could not be serialized.
    #[error("state file '{path}' is not valid JSON: {source}")]
    Json {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Reads and deserializes `path`; `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns [`StateError::Io`] for read failures and [`StateError::Json`] for
/// malformed content.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(StateError::io(path, error)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StateError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Serializes `value` as pretty JSON and atomically replaces `path`.
///
/// # Errors
///
/// Returns [`StateError`] when serialization or any filesystem step fails.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StateError> {
    let mut body = serde_json::to_string_pretty(value).map_err(|source| StateError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    body.push('\n');
    write_text(path, &body)
}

/// Atomically replaces `path` with `contents`, creating parent directories.
///
/// # Errors
///
/// Returns [`StateError::Io`] when a filesystem step fails.
pub fn write_text(path: &Path, contents: &str) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|error| StateError::io(parent, error))?;
        }
    }

    let mut tmp_name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path).map_err(|error| StateError::io(&tmp_path, error))?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|error| StateError::io(&tmp_path, error))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|error| StateError::io(path, error))
}
