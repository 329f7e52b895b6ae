//! Caller-facing notification stream.
//!
//! The core reports per-line output and lifecycle transitions as
//! [`Notification`]s. A presentation layer subscribes to the receiving half;
//! every notification is also emitted as a tracing event.

use std::fmt;

use chrono::{DateTime, Local};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

impl NotificationLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One `(timestamp, instance, text, level)` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub timestamp: DateTime<Local>,
    /// Zero-based instance index; `None` for pool-wide messages.
    pub instance: Option<usize>,
    pub text: String,
    pub level: NotificationLevel,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.timestamp.format("%H:%M:%S"))?;
        if let Some(instance) = self.instance {
            write!(f, "[Inst {}] ", instance + 1)?;
        }
        write!(f, "{}", self.text)
    }
}

/// Sending half of the notification stream.
///
/// Cheap to clone. Sends never fail the caller: once the receiver is gone
/// notifications only reach the log.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<UnboundedSender<Notification>>,
}

impl Notifier {
    /// Creates a connected notifier and its receiver.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier that only logs.
    #[must_use]
    pub fn log_only() -> Self {
        Self::default()
    }

    pub fn info(&self, instance: Option<usize>, text: impl Into<String>) {
        self.emit(instance, text.into(), NotificationLevel::Info);
    }

    pub fn success(&self, instance: Option<usize>, text: impl Into<String>) {
        self.emit(instance, text.into(), NotificationLevel::Success);
    }

    pub fn error(&self, instance: Option<usize>, text: impl Into<String>) {
        self.emit(instance, text.into(), NotificationLevel::Error);
    }

    fn emit(&self, instance: Option<usize>, text: String, level: NotificationLevel) {
        match level {
            NotificationLevel::Info => debug!(instance = ?instance, "{text}"),
            NotificationLevel::Success => info!(instance = ?instance, "{text}"),
            NotificationLevel::Error => warn!(instance = ?instance, "{text}"),
        }

        if let Some(tx) = &self.tx {
            let notification = Notification {
                timestamp: Local::now(),
                instance,
                text,
                level,
            };
            // A dropped receiver means nobody is listening.
            let _ = tx.send(notification);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_delivers_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.info(Some(0), "first");
        notifier.error(None, "second");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.text, "first");
        assert_eq!(first.level, NotificationLevel::Info);
        assert_eq!(first.instance, Some(0));
        let second = rx.try_recv().unwrap();
        assert_eq!(second.level, NotificationLevel::Error);
    }

    #[test]
    fn test_notifier_survives_dropped_receiver() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.success(Some(1), "done");
        Notifier::log_only().info(None, "nobody listens");
    }

    #[test]
    fn test_notification_display_uses_one_based_instance() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.info(Some(2), "Started");
        let rendered = rx.try_recv().unwrap().to_string();
        assert!(rendered.ends_with("[Inst 3] Started"));
    }
}
