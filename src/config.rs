//! Runtime configuration for the launcher core.

use std::time::Duration;

/// Default external download tool.
pub const DEFAULT_BINARY: &str = "gallery-dl";

/// Default minimum number of instances.
pub const DEFAULT_MIN_INSTANCES: usize = 3;

/// Default orchestrator polling interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default graceful stop window in milliseconds.
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 1000;

/// Default sampling interval while waiting for a stop, in milliseconds.
pub const DEFAULT_STOP_POLL_MS: u64 = 100;

/// Default delay between consecutive starts in a start-all, in milliseconds.
pub const DEFAULT_START_STAGGER_MS: u64 = 1000;

/// Default delay between consecutive stops in a stop-all, in milliseconds.
pub const DEFAULT_STOP_STAGGER_MS: u64 = 500;

/// How long output may keep flowing after exit before the run is torn down.
pub const DEFAULT_DRAIN_GRACE_MS: u64 = 500;

/// Lines taken from one instance per orchestrator tick.
pub const DEFAULT_MAX_LINES_PER_TICK: usize = 500;

/// Timing and process knobs shared by the pool and its supervisors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Program executed for every instance.
    pub binary: String,
    /// The pool never starts with fewer instances than this.
    pub min_instances: usize,
    pub poll_interval: Duration,
    pub stop_timeout: Duration,
    pub stop_poll: Duration,
    pub start_stagger: Duration,
    pub stop_stagger: Duration,
    pub drain_grace: Duration,
    pub max_lines_per_tick: usize,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            min_instances: DEFAULT_MIN_INSTANCES,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stop_timeout: Duration::from_millis(DEFAULT_STOP_TIMEOUT_MS),
            stop_poll: Duration::from_millis(DEFAULT_STOP_POLL_MS),
            start_stagger: Duration::from_millis(DEFAULT_START_STAGGER_MS),
            stop_stagger: Duration::from_millis(DEFAULT_STOP_STAGGER_MS),
            drain_grace: Duration::from_millis(DEFAULT_DRAIN_GRACE_MS),
            max_lines_per_tick: DEFAULT_MAX_LINES_PER_TICK,
        }
    }
}

impl LauncherConfig {
    /// Default timings with a different binary.
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }
}
