//! Integration tests for the history store.
//!
//! These tests verify HistoryStore operations against a real SQLite file.

use std::path::PathBuf;

use launcher_core::history::{CSV_HEADER, export_csv};
use launcher_core::{Database, HistoryQuery, HistoryStore, RecordStatus};
use tempfile::TempDir;

fn db_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("database").join("download_history.db")
}

/// Helper to create a history store backed by a file database.
async fn setup_store() -> (HistoryStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = HistoryStore::open(&db_path(&temp_dir))
        .await
        .expect("Failed to open history store");
    (store, temp_dir)
}

#[tokio::test]
async fn test_file_database_uses_wal() {
    let (store, _temp_dir) = setup_store().await;
    assert!(store.database().is_wal_enabled().await.unwrap());
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let (store, temp_dir) = setup_store().await;
    store
        .record(0, "https://a.com/1", "png", &RecordStatus::Success)
        .await;
    store
        .record(1, "https://b.com/2", "mp4", &RecordStatus::Success)
        .await;
    store.database().clone().close().await;

    let reopened = HistoryStore::new(Database::new(&db_path(&temp_dir)).await.unwrap());
    let records = reopened.all().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].url, "https://b.com/2");
    assert_eq!(records[0].instance_label(), "Instance 2");
}

#[tokio::test]
async fn test_stats_buckets_by_file_type() {
    let (store, _temp_dir) = setup_store().await;
    for (url, file_type) in [
        ("https://a.com/1", "jpg"),
        ("https://a.com/2", "WEBP"),
        ("https://a.com/3", "mkv"),
        ("https://a.com/4", "zip"),
        ("https://a.com/5", ""),
    ] {
        store.record(0, url, file_type, &RecordStatus::Success).await;
    }
    store
        .record(
            0,
            "https://a.com/6",
            "txt",
            &RecordStatus::Other("Skipped".to_string()),
        )
        .await;

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 6);
    assert_eq!(stats.success, 5);
    assert_eq!(stats.images, 2);
    assert_eq!(stats.videos, 1);
    assert_eq!(stats.other(), 3);
}

#[tokio::test]
async fn test_empty_history_stats_are_zero() {
    let (store, _temp_dir) = setup_store().await;
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 0);
    assert!(stats.success_rate().abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_filtered_query_by_file_type_is_case_insensitive() {
    let (store, _temp_dir) = setup_store().await;
    store
        .record(0, "https://a.com/1", "PNG", &RecordStatus::Success)
        .await;
    store
        .record(0, "https://a.com/2", "gif", &RecordStatus::Success)
        .await;

    let records = store
        .query_filtered(&HistoryQuery {
            file_type: Some("png".to_string()),
            ..HistoryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, "https://a.com/1");
}

#[tokio::test]
async fn test_export_then_clear() {
    let (store, temp_dir) = setup_store().await;
    store
        .record(2, "https://a.com/1", "", &RecordStatus::Success)
        .await;

    let export_path = temp_dir.path().join("history.csv");
    let file = std::fs::File::create(&export_path).unwrap();
    export_csv(&store.all().await.unwrap(), file).unwrap();

    let mut reader = csv::Reader::from_path(&export_path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, CSV_HEADER.map(String::from).to_vec());
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][1], "Instance 3");
    assert_eq!(&rows[0][3], "Unknown");
    assert_eq!(&rows[0][4], "Success");

    assert_eq!(store.clear().await.unwrap(), 1);
    assert!(store.all().await.unwrap().is_empty());
}
