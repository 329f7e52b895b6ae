//! Seam through which supervisors report completed downloads.

use async_trait::async_trait;

use super::{HistoryStore, RecordStatus};

/// Receives one call per completed download.
///
/// Implementations must not fail the caller; errors are handled internally.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    /// Records a completion for the zero-based `instance`.
    async fn record_completion(
        &self,
        instance: usize,
        url: &str,
        file_type: &str,
        status: &RecordStatus,
    );
}

#[async_trait]
impl CompletionSink for HistoryStore {
    async fn record_completion(
        &self,
        instance: usize,
        url: &str,
        file_type: &str,
        status: &RecordStatus,
    ) {
        HistoryStore::record(self, instance, url, file_type, status).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_history_store_as_dyn_sink_records() {
        let store = HistoryStore::new(Database::new_in_memory().await.unwrap());
        let sink: Arc<dyn CompletionSink> = Arc::new(store.clone());

        sink.record_completion(1, "https://a.com/v", "mp4", &RecordStatus::Success)
            .await;

        let records = store.query(1).await.unwrap();
        assert_eq!(records[0].file_type, "mp4");
        assert_eq!(records[0].instance_label(), "Instance 2");
    }
}
