//! Start failures for instance process runs.

use thiserror::Error;

/// Reasons a start request is rejected.
#[derive(Debug, Error)]
pub enum StartError {
    /// A process run is still live for this instance.
    #[error("instance {instance} is already running")]
    AlreadyRunning {
        /// One-based instance number.
        instance: usize,
    },

    /// The pending URL list is empty.
    #[error("instance {instance} has no pending URLs")]
    NoUrls {
        /// One-based instance number.
        instance: usize,
    },

    /// The external binary could not be launched.
    #[error("failed to launch '{binary}': {source}")]
    SpawnFailed {
        /// Program that was executed.
        binary: String,
        /// OS error (not found, permission denied, ...).
        #[source]
        source: std::io::Error,
    },
}

impl StartError {
    /// True when the error came from the operating system rather than the
    /// instance state.
    #[must_use]
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::SpawnFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_failed_message_names_binary() {
        let err = StartError::SpawnFailed {
            binary: "gallery-dl".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("gallery-dl"));
        assert!(err.is_spawn_failure());
    }

    #[test]
    fn test_already_running_uses_display_number() {
        let err = StartError::AlreadyRunning { instance: 2 };
        assert_eq!(err.to_string(), "instance 2 is already running");
        assert!(!err.is_spawn_failure());
    }
}
