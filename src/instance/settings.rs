//! Per-instance settings and the content filter expression.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::history::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::state::{StateError, StatePaths, read_json, write_json};

/// Settings persisted as `settings_instance_<n>.json`.
///
/// Missing keys fall back to [`InstanceSettings::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceSettings {
    /// Download directory passed with `-d`; omitted when empty.
    pub output_dir: String,
    /// Archive file passed with `--download-archive`; omitted when empty.
    pub archive_file: String,
    /// Free-form extra options, shell-split at start.
    #[serde(alias = "additional_opts")]
    pub extra_opts: String,
    /// Start again after the process exits on its own.
    pub auto_restart: bool,
    /// Allow image extensions.
    pub images: bool,
    /// Allow video extensions.
    pub videos: bool,
    /// Allow every other extension.
    pub other: bool,
    /// Extra filter expression, parenthesized and and-ed with the rest.
    pub custom_filter: String,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            output_dir: String::new(),
            archive_file: String::new(),
            extra_opts: String::new(),
            auto_restart: false,
            images: true,
            videos: true,
            other: true,
            custom_filter: String::new(),
        }
    }
}

impl InstanceSettings {
    /// Defaults for a new instance: `~/Downloads` and the instance's own
    /// archive file.
    #[must_use]
    pub fn for_instance(index: usize, paths: &StatePaths) -> Self {
        Self {
            output_dir: default_output_dir().display().to_string(),
            archive_file: paths.default_archive_file(index).display().to_string(),
            ..Self::default()
        }
    }

    /// Loads `path`, using `fallback` when the file is missing or unreadable.
    #[must_use]
    pub fn load_or(path: &Path, fallback: Self) -> Self {
        match read_json(path) {
            Ok(Some(settings)) => settings,
            Ok(None) => fallback,
            Err(error) => {
                warn!(%error, "using default instance settings");
                fallback
            }
        }
    }

    /// Writes the settings file.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the write fails.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        write_json(path, self)
    }

    /// Builds the `--filter` expression, or `None` when nothing restricts
    /// the download.
    ///
    /// # Examples
    ///
    /// ```
    /// use launcher_core::instance::InstanceSettings;
    ///
    /// let settings = InstanceSettings {
    ///     images: true,
    ///     videos: false,
    ///     other: false,
    ///     custom_filter: "width >= 1000".to_string(),
    ///     ..InstanceSettings::default()
    /// };
    /// assert_eq!(
    ///     settings.filter_expression().as_deref(),
    ///     Some("extension in ('jpg', 'jpeg', 'png', 'gif', 'webp') and (width >= 1000)"),
    /// );
    /// ```
    #[must_use]
    pub fn filter_expression(&self) -> Option<String> {
        let mut type_filters = Vec::new();
        if self.images {
            type_filters.push(format!("extension in ({})", quoted_list(&IMAGE_EXTENSIONS)));
        }
        if self.videos {
            type_filters.push(format!("extension in ({})", quoted_list(&VIDEO_EXTENSIONS)));
        }
        if self.other {
            let known: Vec<&str> = IMAGE_EXTENSIONS
                .iter()
                .chain(VIDEO_EXTENSIONS.iter())
                .copied()
                .collect();
            type_filters.push(format!("extension not in ({})", quoted_list(&known)));
        }

        let mut parts = Vec::new();
        match type_filters.len() {
            0 => {}
            1 => parts.append(&mut type_filters),
            _ => parts.push(format!("({})", type_filters.join(" or "))),
        }

        let custom = self.custom_filter.trim();
        if !custom.is_empty() {
            parts.push(format!("({custom})"));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" and "))
        }
    }

    /// Rewrites an archive path that points at another instance's default
    /// archive to this instance's default. Returns the new path when changed.
    pub fn enforce_unique_archive(&mut self, index: usize, paths: &StatePaths) -> Option<PathBuf> {
        let archive = self.archive_file.trim();
        if archive.is_empty() {
            return None;
        }
        let file_name = Path::new(archive).file_name()?.to_string_lossy().into_owned();
        let own_name = format!("archive_instance_{}.txt", index + 1);
        if !file_name.starts_with("archive_instance_") || file_name == own_name {
            return None;
        }

        let replacement = paths.default_archive_file(index);
        info!(
            instance = index + 1,
            from = archive,
            to = %replacement.display(),
            "archive belongs to another instance; using this instance's archive"
        );
        self.archive_file = replacement.display().to_string();
        Some(replacement)
    }
}

fn quoted_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|value| format!("'{value}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn default_output_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map_or_else(|| PathBuf::from("downloads"), |home| PathBuf::from(home).join("Downloads"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn flags(images: bool, videos: bool, other: bool) -> InstanceSettings {
        InstanceSettings {
            images,
            videos,
            other,
            ..InstanceSettings::default()
        }
    }

    #[test]
    fn test_filter_expression_single_type_has_no_parens() {
        assert_eq!(
            flags(false, true, false).filter_expression().as_deref(),
            Some("extension in ('mp4', 'webm', 'avi', 'mov', 'mkv')")
        );
    }

    #[test]
    fn test_filter_expression_multiple_types_are_or_joined() {
        let expr = flags(true, false, true).filter_expression().unwrap();
        assert!(expr.starts_with("(extension in ('jpg'"));
        assert!(expr.contains(" or extension not in ('jpg', 'jpeg', 'png', 'gif', 'webp', 'mp4'"));
        assert!(expr.ends_with("'mkv'))"));
    }

    #[test]
    fn test_filter_expression_none_when_unrestricted_and_empty() {
        assert_eq!(flags(false, false, false).filter_expression(), None);
        let custom_only = InstanceSettings {
            custom_filter: " date > 2020 ".to_string(),
            ..flags(false, false, false)
        };
        assert_eq!(custom_only.filter_expression().as_deref(), Some("(date > 2020)"));
    }

    #[test]
    fn test_enforce_unique_archive_rewrites_foreign_default() {
        let paths = StatePaths::new("/data");
        let mut settings = InstanceSettings {
            archive_file: "/data/archive_instance_1.txt".to_string(),
            ..InstanceSettings::default()
        };

        let replaced = settings.enforce_unique_archive(1, &paths);
        assert_eq!(replaced, Some(PathBuf::from("/data/archive_instance_2.txt")));
        assert_eq!(settings.archive_file, "/data/archive_instance_2.txt");

        assert_eq!(settings.enforce_unique_archive(1, &paths), None);
    }

    #[test]
    fn test_enforce_unique_archive_keeps_custom_paths() {
        let paths = StatePaths::new("/data");
        let mut settings = InstanceSettings {
            archive_file: "/mine/shared.txt".to_string(),
            ..InstanceSettings::default()
        };
        assert_eq!(settings.enforce_unique_archive(0, &paths), None);
        assert_eq!(settings.archive_file, "/mine/shared.txt");
    }

    #[test]
    fn test_settings_accept_legacy_key_and_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings_instance_1.json");
        std::fs::write(&path, r#"{"additional_opts": "--range 1-3", "videos": false}"#).unwrap();

        let settings = InstanceSettings::load_or(&path, InstanceSettings::default());
        assert_eq!(settings.extra_opts, "--range 1-3");
        assert!(!settings.videos);
        assert!(settings.images);
    }

    #[test]
    fn test_settings_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings_instance_2.json");
        let settings = InstanceSettings {
            auto_restart: true,
            output_dir: "/dl".to_string(),
            ..InstanceSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(InstanceSettings::load_or(&path, InstanceSettings::default()), settings);
    }
}
