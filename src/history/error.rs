//! Error types for history store operations.

use std::fmt;

use thiserror::Error;

/// Structured classification for history database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure (unique/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Filesystem or transport IO failure.
    Io,
    /// Unclassified database failure.
    Other,
}

impl HistoryDbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for HistoryDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::Io => "io",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> HistoryDbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return HistoryDbErrorKind::BusyOrLocked;
    }

    if database_error.is_check_violation()
        || database_error.is_unique_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return HistoryDbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked") || message.contains("database is busy") {
        return HistoryDbErrorKind::BusyOrLocked;
    }

    HistoryDbErrorKind::Other
}

/// Errors that can occur during history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Database operation failed.
    #[error("history database error ({kind}): {message}")]
    Database {
        /// Typed classification of the failure.
        kind: HistoryDbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// Writing the CSV export failed.
    #[error("history export failed: {0}")]
    Export(#[from] csv::Error),

    /// Flushing the export destination failed.
    #[error("history export I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for HistoryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: HistoryDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl HistoryError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<HistoryDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::Export(_) | Self::Io(_) => None,
        }
    }
}
