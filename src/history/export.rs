//! CSV export of history records.

use std::io::Write;

use super::{HistoryRecord, Result, UNKNOWN_FILE_TYPE};

/// Header row written before any record.
pub const CSV_HEADER: [&str; 5] = ["Timestamp", "Instance", "URL", "File Type", "Status"];

/// Writes `records` as CSV to `writer`, header first.
///
/// Instances are written with their one-based label and an `unknown` file
/// type is rendered as `Unknown`.
///
/// # Errors
///
/// Returns [`super::HistoryError::Export`] when a row cannot be written and
/// [`super::HistoryError::Io`] when the final flush fails.
pub fn export_csv<W: Write>(records: &[HistoryRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;

    for record in records {
        let file_type = if record.file_type.is_empty() || record.file_type == UNKNOWN_FILE_TYPE {
            "Unknown"
        } else {
            record.file_type.as_str()
        };
        csv_writer.write_record([
            record.timestamp.as_str(),
            record.instance_label().as_str(),
            record.url.as_str(),
            file_type,
            record.status_str.as_str(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Renders `records` into an in-memory CSV byte buffer.
///
/// # Errors
///
/// Returns [`super::HistoryError::Export`] when serialization fails.
pub fn to_csv_bytes(records: &[HistoryRecord]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    export_csv(records, &mut buffer)?;
    Ok(buffer)
}
