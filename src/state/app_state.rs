//! Application-level state persisted between sessions.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{StateError, read_json, write_json};

/// Snapshot written at shutdown and read at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    /// Instances that existed when the state was saved.
    #[serde(default)]
    pub instance_count: usize,
    /// Last window geometry reported by the presentation layer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    /// Save time in the history timestamp format.
    #[serde(default)]
    pub timestamp: String,
}

impl AppState {
    /// Builds a state stamped with the current local time.
    #[must_use]
    pub fn now(instance_count: usize, geometry: Option<String>) -> Self {
        Self {
            instance_count,
            geometry,
            timestamp: chrono::Local::now()
                .format(crate::history::TIMESTAMP_FORMAT)
                .to_string(),
        }
    }

    /// Loads the state file, falling back to defaults when it is missing or
    /// unreadable.
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        match read_json(path) {
            Ok(Some(state)) => state,
            Ok(None) => Self::default(),
            Err(error) => {
                warn!(%error, "ignoring unreadable app state");
                Self::default()
            }
        }
    }

    /// Writes the state file.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the write fails.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        write_json(path, self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("app_state.json");
        let state = AppState::now(5, Some("1280x900+10+10".to_string()));

        state.save(&path).unwrap();
        assert_eq!(AppState::load_or_default(&path), state);
    }

    #[test]
    fn test_app_state_corrupt_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_state.json");
        std::fs::write(&path, "[]").unwrap();
        assert_eq!(AppState::load_or_default(&path), AppState::default());
    }

    #[test]
    fn test_app_state_tolerates_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app_state.json");
        std::fs::write(&path, r#"{"instance_count": 4}"#).unwrap();
        assert_eq!(AppState::load_or_default(&path).instance_count, 4);
    }
}
