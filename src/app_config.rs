//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use launcher_core::LauncherConfig;
use launcher_core::state::{APP_DIR_NAME, StatePaths};
use serde::Deserialize;

/// TOML-backed file configuration for launcher defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Download tool executable.
    pub binary: Option<String>,
    /// Data directory for settings, links and history.
    pub data_dir: Option<PathBuf>,
    /// Minimum instance count.
    pub instances: Option<usize>,
    /// Orchestrator tick in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Graceful stop window in milliseconds.
    pub stop_timeout_ms: Option<u64>,
    /// Exit sampling interval while stopping, in milliseconds.
    pub stop_poll_ms: Option<u64>,
    /// Delay between staggered starts in milliseconds.
    pub start_stagger_ms: Option<u64>,
    /// Delay between staggered stops in milliseconds.
    pub stop_stagger_ms: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(binary) = &self.binary
            && binary.trim().is_empty()
        {
            bail!("Invalid config value for `binary`: must not be empty");
        }

        if let Some(instances) = self.instances
            && !(1..=64).contains(&instances)
        {
            bail!("Invalid config value for `instances`: {instances}. Expected range: 1..=64");
        }

        validate_millis("poll_interval_ms", self.poll_interval_ms, 10, 10_000)?;
        validate_millis("stop_timeout_ms", self.stop_timeout_ms, 0, 60_000)?;
        validate_millis("stop_poll_ms", self.stop_poll_ms, 1, 10_000)?;
        validate_millis("start_stagger_ms", self.start_stagger_ms, 0, 60_000)?;
        validate_millis("stop_stagger_ms", self.stop_stagger_ms, 0, 60_000)?;
        Ok(())
    }

    /// Library runtime config with file values layered over the defaults.
    #[must_use]
    pub fn launcher_config(&self) -> LauncherConfig {
        let mut config = LauncherConfig::default();
        if let Some(binary) = &self.binary {
            config.binary.clone_from(binary);
        }
        if let Some(instances) = self.instances {
            config.min_instances = instances;
        }
        let millis = |value: Option<u64>, fallback: Duration| {
            value.map_or(fallback, Duration::from_millis)
        };
        config.poll_interval = millis(self.poll_interval_ms, config.poll_interval);
        config.stop_timeout = millis(self.stop_timeout_ms, config.stop_timeout);
        config.stop_poll = millis(self.stop_poll_ms, config.stop_poll);
        config.start_stagger = millis(self.start_stagger_ms, config.start_stagger);
        config.stop_stagger = millis(self.stop_stagger_ms, config.stop_stagger);
        config
    }
}

fn validate_millis(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Tracing filter used when neither `RUST_LOG` nor a CLI flag decides.
    #[must_use]
    pub fn default_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Debug => "trace",
            Self::Quiet => "error",
        }
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/dl-launcher/config.toml`
/// 2. `$HOME/.config/dl-launcher/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(APP_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return read_file_config(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Data directory: CLI flag, then config file, then the platform default.
#[must_use]
pub fn resolve_state_paths(cli_data_dir: Option<&Path>, config: &FileConfig) -> StatePaths {
    let data_dir = cli_data_dir
        .map(Path::to_path_buf)
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(StatePaths::default_data_dir);
    StatePaths::new(data_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let config = parse_config_str(
            "binary = \"/usr/local/bin/gallery-dl\"\ninstances = 5\nverbosity = \"quiet\"\n",
        )
        .unwrap();
        assert_eq!(config.binary.as_deref(), Some("/usr/local/bin/gallery-dl"));
        assert_eq!(config.instances, Some(5));
        assert_eq!(config.verbosity, Some(VerbositySetting::Quiet));
        assert_eq!(config.poll_interval_ms, None);
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let err = parse_config_str("concurrency = 4\n").unwrap_err();
        assert!(format!("{err:#}").contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range() {
        let err = parse_config_str("instances = 0\n").unwrap_err();
        assert!(err.to_string().contains("instances"));

        let err = parse_config_str("poll_interval_ms = 1\n").unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_launcher_config_overlays_defaults() {
        let config = FileConfig {
            stop_timeout_ms: Some(2500),
            instances: Some(4),
            ..FileConfig::default()
        }
        .launcher_config();
        assert_eq!(config.stop_timeout, Duration::from_millis(2500));
        assert_eq!(config.min_instances, 4);
        assert_eq!(config.binary, "gallery-dl");
        assert_eq!(config.start_stagger, Duration::from_secs(1));
    }

    #[test]
    fn test_state_paths_prefer_cli_flag() {
        let config = FileConfig {
            data_dir: Some(PathBuf::from("/from/config")),
            ..FileConfig::default()
        };
        let paths = resolve_state_paths(Some(Path::new("/from/cli")), &config);
        assert_eq!(paths.data_dir(), Path::new("/from/cli"));
        let paths = resolve_state_paths(None, &config);
        assert_eq!(paths.data_dir(), Path::new("/from/config"));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_file_config(Some(&missing)).is_err());
    }
}
