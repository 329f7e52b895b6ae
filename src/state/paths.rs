//! Locations of every persisted launcher file.

use std::path::{Path, PathBuf};

/// Directory name used under the platform data and config roots.
pub const APP_DIR_NAME: &str = "dl-launcher";

/// Resolves per-instance and global state file paths under one data dir.
///
/// Instance arguments are zero-based; file names use the one-based number
/// shown to operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    data_dir: PathBuf,
}

impl StatePaths {
    /// Uses `data_dir` as the root for every state file.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolves the default data dir: `$XDG_DATA_HOME/dl-launcher`, falling
    /// back to `$HOME/.local/share/dl-launcher`, then `./.dl-launcher`.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|value| !value.is_empty()) {
            return PathBuf::from(xdg).join(APP_DIR_NAME);
        }
        if let Some(home) = std::env::var_os("HOME").filter(|value| !value.is_empty()) {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join(APP_DIR_NAME);
        }
        PathBuf::from(".").join(format!(".{APP_DIR_NAME}"))
    }

    /// Root data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `settings_instance_<n>.json`
    #[must_use]
    pub fn settings_file(&self, instance: usize) -> PathBuf {
        self.data_dir
            .join(format!("settings_instance_{}.json", instance + 1))
    }

    /// `links_instance_<n>.txt`
    #[must_use]
    pub fn links_file(&self, instance: usize) -> PathBuf {
        self.data_dir
            .join(format!("links_instance_{}.txt", instance + 1))
    }

    /// `archive_instance_<n>.txt`, the default download archive.
    #[must_use]
    pub fn default_archive_file(&self, instance: usize) -> PathBuf {
        self.data_dir
            .join(format!("archive_instance_{}.txt", instance + 1))
    }

    /// Affinity table.
    #[must_use]
    pub fn affinity_file(&self) -> PathBuf {
        self.data_dir.join("url_mappings.json")
    }

    /// Application-level state.
    #[must_use]
    pub fn app_state_file(&self) -> PathBuf {
        self.data_dir.join("state").join("app_state.json")
    }

    /// Global option lines for the download tool.
    #[must_use]
    pub fn global_options_file(&self) -> PathBuf {
        self.data_dir.join("global_options.txt")
    }

    /// History database file.
    #[must_use]
    pub fn history_db(&self) -> PathBuf {
        self.data_dir.join("database").join("download_history.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_files_use_one_based_numbers() {
        let paths = StatePaths::new("/data");
        assert_eq!(
            paths.settings_file(0),
            PathBuf::from("/data/settings_instance_1.json")
        );
        assert_eq!(paths.links_file(2), PathBuf::from("/data/links_instance_3.txt"));
        assert_eq!(
            paths.default_archive_file(1),
            PathBuf::from("/data/archive_instance_2.txt")
        );
    }

    #[test]
    fn test_global_files_layout() {
        let paths = StatePaths::new("/data");
        assert_eq!(paths.affinity_file(), PathBuf::from("/data/url_mappings.json"));
        assert_eq!(
            paths.app_state_file(),
            PathBuf::from("/data/state/app_state.json")
        );
        assert_eq!(
            paths.history_db(),
            PathBuf::from("/data/database/download_history.db")
        );
    }
}
