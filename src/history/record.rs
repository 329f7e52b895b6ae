//! History record types, query filters and aggregate statistics.

use std::fmt;

use sqlx::FromRow;

/// Extensions counted in the image bucket.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Extensions counted in the video bucket.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "webm", "avi", "mov", "mkv"];

/// Stored file type when the extension could not be determined.
pub const UNKNOWN_FILE_TYPE: &str = "unknown";

/// Timestamp layout used for history rows and exports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default number of rows returned by history listings.
pub const DEFAULT_QUERY_LIMIT: usize = 1000;

/// Terminal status of a recorded download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecordStatus {
    /// The download finished.
    #[default]
    Success,
    /// Any other terminal status, stored verbatim (e.g. `Error (code 1)`).
    Other(String),
}

impl RecordStatus {
    /// Returns the storage representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "Success",
            Self::Other(status) => status,
        }
    }

    /// Returns true for [`RecordStatus::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for RecordStatus {
    fn from(value: &str) -> Self {
        if value == "Success" {
            Self::Success
        } else {
            Self::Other(value.to_string())
        }
    }
}

/// Coarse content bucket derived from a file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileBucket {
    Image,
    Video,
    Other,
}

impl FileBucket {
    /// Classifies a lower-cased extension.
    #[must_use]
    pub fn classify(file_type: &str) -> Self {
        if IMAGE_EXTENSIONS.contains(&file_type) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&file_type) {
            Self::Video
        } else {
            Self::Other
        }
    }
}

/// Normalizes a file type for storage: lower-cased, `unknown` when empty.
#[must_use]
pub fn normalize_file_type(file_type: &str) -> String {
    let trimmed = file_type.trim();
    if trimmed.is_empty() {
        UNKNOWN_FILE_TYPE.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// One persisted download fact.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRecord {
    /// Row id.
    pub id: i64,
    /// Local timestamp in [`TIMESTAMP_FORMAT`].
    pub timestamp: String,
    /// Zero-based instance index.
    pub instance_id: i64,
    /// Source URL (or destination path when the source was unknown).
    pub url: String,
    /// Lower-cased extension or `unknown`.
    pub file_type: String,
    /// Stored status text.
    #[sqlx(rename = "status")]
    pub status_str: String,
}

impl HistoryRecord {
    /// Parses the stored status.
    #[must_use]
    pub fn status(&self) -> RecordStatus {
        RecordStatus::from(self.status_str.as_str())
    }

    /// Returns the zero-based instance index.
    #[must_use]
    pub fn instance_index(&self) -> usize {
        usize::try_from(self.instance_id).unwrap_or(usize::MAX)
    }

    /// One-based instance label as shown to operators (`Instance 3`).
    #[must_use]
    pub fn instance_label(&self) -> String {
        format!("Instance {}", self.instance_id.saturating_add(1))
    }
}

/// Filters for history listings.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    /// Only rows with this status.
    pub status: Option<RecordStatus>,
    /// Only rows with this (lower-cased) file type.
    pub file_type: Option<String>,
    /// Only rows recorded by this instance.
    pub instance: Option<usize>,
    /// Max rows to return (0 uses the default).
    pub limit: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            status: None,
            file_type: None,
            instance: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

/// Statistics derived from the full history set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    /// Total rows.
    pub total: u64,
    /// Rows with status `Success`.
    pub success: u64,
    /// Rows whose file type is in [`IMAGE_EXTENSIONS`].
    pub images: u64,
    /// Rows whose file type is in [`VIDEO_EXTENSIONS`].
    pub videos: u64,
}

impl AggregateStats {
    /// Success percentage in `0.0..=100.0`; `0.0` for an empty history.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64 * 100.0
        }
    }

    /// Rows in neither the image nor the video bucket.
    #[must_use]
    pub fn other(&self) -> u64 {
        self.total.saturating_sub(self.images + self.videos)
    }
}

impl fmt::Display for AggregateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total {} | success {} ({:.1}%) | images {} | videos {} | other {}",
            self.total,
            self.success,
            self.success_rate(),
            self.images,
            self.videos,
            self.other()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_status_round_trips_storage_text() {
        assert_eq!(RecordStatus::from("Success"), RecordStatus::Success);
        assert_eq!(
            RecordStatus::from("Error (code 1)"),
            RecordStatus::Other("Error (code 1)".to_string())
        );
        assert_eq!(RecordStatus::default().as_str(), "Success");
    }

    #[test]
    fn test_file_bucket_classify() {
        assert_eq!(FileBucket::classify("jpeg"), FileBucket::Image);
        assert_eq!(FileBucket::classify("mkv"), FileBucket::Video);
        assert_eq!(FileBucket::classify("zip"), FileBucket::Other);
        assert_eq!(FileBucket::classify(UNKNOWN_FILE_TYPE), FileBucket::Other);
    }

    #[test]
    fn test_normalize_file_type_defaults_to_unknown() {
        assert_eq!(normalize_file_type(""), "unknown");
        assert_eq!(normalize_file_type("  "), "unknown");
        assert_eq!(normalize_file_type("JPG"), "jpg");
    }

    #[test]
    fn test_success_rate_empty_is_zero() {
        assert!(AggregateStats::default().success_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_success_rate_and_other_bucket() {
        let stats = AggregateStats {
            total: 4,
            success: 3,
            images: 2,
            videos: 1,
        };
        assert!((stats.success_rate() - 75.0).abs() < 1e-9);
        assert_eq!(stats.other(), 1);
        assert!(stats.to_string().contains("75.0%"));
    }
}
