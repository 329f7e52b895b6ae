//! Durable download history backed by `SQLite`.
//!
//! The history is append-only: each completion observed by a supervisor
//! becomes one [`HistoryRecord`]. Records are never mutated and only removed
//! by an explicit [`HistoryStore::clear`].
//!
//! # Overview
//!
//! - [`HistoryStore`] - append, query, aggregate and clear operations
//! - [`CompletionSink`] - the seam supervisors record completions through
//! - [`export_csv`] - CSV rendering of a record set
//!
//! # Example
//!
//! ```ignore
//! use launcher_core::history::{HistoryStore, RecordStatus};
//! use launcher_core::Database;
//!
//! let store = HistoryStore::new(Database::new_in_memory().await?);
//! store.record(0, "https://a.com/1", "jpg", &RecordStatus::Success).await;
//! let latest = store.query(1).await?;
//! ```

mod error;
mod export;
mod record;
mod sink;

pub use error::{HistoryDbErrorKind, HistoryError};
pub use export::{CSV_HEADER, export_csv, to_csv_bytes};
pub use record::{
    AggregateStats, DEFAULT_QUERY_LIMIT, FileBucket, HistoryQuery, HistoryRecord,
    IMAGE_EXTENSIONS, RecordStatus, TIMESTAMP_FORMAT, UNKNOWN_FILE_TYPE, VIDEO_EXTENSIONS,
    normalize_file_type,
};
pub use sink::CompletionSink;

use std::path::Path;

use tracing::{debug, instrument, warn};

use crate::db::{Database, DbError};

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Handle to the download history table.
///
/// Clones share the underlying pool, so a single store can be injected into
/// every supervisor.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    db: Database,
}

impl HistoryStore {
    /// Creates a store over an already-migrated database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens (creating if needed) the history database file.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] when the file cannot be opened or migrated.
    pub async fn open(path: &Path) -> std::result::Result<Self, DbError> {
        Ok(Self::new(Database::new(path).await?))
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Appends one record stamped with the current local time.
    ///
    /// Storage failures are logged and swallowed; losing a history row must
    /// never interrupt a running download.
    #[instrument(skip(self, status), fields(status = %status))]
    pub async fn record(&self, instance: usize, url: &str, file_type: &str, status: &RecordStatus) {
        match self.try_record(instance, url, file_type, status).await {
            Ok(id) => debug!(id, "history record appended"),
            Err(error) => warn!(%error, "failed to append history record"),
        }
    }

    /// Appends one record and returns its row id.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] when the insert fails.
    pub async fn try_record(
        &self,
        instance: usize,
        url: &str,
        file_type: &str,
        status: &RecordStatus,
    ) -> Result<i64> {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let instance_id = i64::try_from(instance).unwrap_or(i64::MAX);

        let result = sqlx::query(
            r"INSERT INTO downloads (timestamp, instance_id, url, file_type, status)
              VALUES (?, ?, ?, ?, ?)",
        )
        .bind(timestamp)
        .bind(instance_id)
        .bind(url)
        .bind(normalize_file_type(file_type))
        .bind(status.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Returns up to `limit` records, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] when the query fails.
    #[instrument(skip(self))]
    pub async fn query(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.query_filtered(&HistoryQuery {
            limit,
            ..HistoryQuery::default()
        })
        .await
    }

    /// Returns records matching the optional status, file type and instance
    /// filters, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] when the query fails.
    #[instrument(skip(self, query))]
    pub async fn query_filtered(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>> {
        let limit = if query.limit == 0 {
            DEFAULT_QUERY_LIMIT
        } else {
            query.limit
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let status = query.status.as_ref().map(RecordStatus::as_str);
        let file_type = query.file_type.as_deref().map(normalize_file_type);
        let instance = query
            .instance
            .map(|index| i64::try_from(index).unwrap_or(i64::MAX));

        let records = sqlx::query_as::<_, HistoryRecord>(
            r"SELECT id, timestamp, instance_id, url, file_type, status
              FROM downloads
              WHERE (?1 IS NULL OR status = ?1)
                AND (?2 IS NULL OR file_type = ?2)
                AND (?3 IS NULL OR instance_id = ?3)
              ORDER BY timestamp DESC, id DESC
              LIMIT ?4",
        )
        .bind(status)
        .bind(file_type)
        .bind(instance)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(records)
    }

    /// Returns every record, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] when the query fails.
    #[instrument(skip(self))]
    pub async fn all(&self) -> Result<Vec<HistoryRecord>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            r"SELECT id, timestamp, instance_id, url, file_type, status
              FROM downloads
              ORDER BY timestamp DESC, id DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(records)
    }

    /// Computes aggregate statistics over the whole history in one pass.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] when the aggregate query fails.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<AggregateStats> {
        let sql = format!(
            r"SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'Success' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN file_type IN ({images}) THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN file_type IN ({videos}) THEN 1 ELSE 0 END), 0)
              FROM downloads",
            images = sql_in_list(&IMAGE_EXTENSIONS),
            videos = sql_in_list(&VIDEO_EXTENSIONS),
        );

        let (total, success, images, videos): (i64, i64, i64, i64) =
            sqlx::query_as(&sql).fetch_one(self.db.pool()).await?;

        Ok(AggregateStats {
            total: to_count(total),
            success: to_count(success),
            images: to_count(images),
            videos: to_count(videos),
        })
    }

    /// Deletes every record and returns how many were removed.
    ///
    /// Callers are responsible for confirming with the operator first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Database`] when the delete fails.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM downloads")
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

fn sql_in_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|value| format!("'{value}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
