//! Classification of download tool output lines.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::trace;

/// Progress-section marker preceding percentages and rates.
const PROGRESS_MARKER: &str = "[download]";

/// Marker the tool uses for lines that must never reach the log.
const SKIP_SENTINEL: &str = "#!";

#[allow(clippy::expect_used)]
static PERCENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[download\].*?(\d+(?:\.\d+)?)%").expect("percent regex is valid")
});

#[allow(clippy::expect_used)]
static SPEED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[download\].*?(\d+(?:\.\d+)?)([KMG])iB/s").expect("speed regex is valid")
});

#[allow(clippy::expect_used)]
static DESTINATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\[\w+\]\s+)?Destination:?\s+(.+?)\s*$")
        .expect("destination regex is valid")
});

/// One structured fact extracted from an output line.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// Transfer progress in percent.
    Progress {
        /// `0.0..=100.0` as printed by the tool.
        percent: f64,
        /// Rate printed on the same line, if any.
        bytes_per_second: Option<f64>,
    },
    /// Current transfer rate.
    Speed {
        /// Rate converted from the printed binary unit.
        bytes_per_second: f64,
    },
    /// A file finished downloading.
    Completed {
        /// Path the tool wrote, possibly empty.
        destination_path: String,
        /// Lower-cased extension of the path's last component, empty if none.
        file_type: String,
        /// Source URL, empty when the output form does not carry it.
        source_url: String,
    },
    /// Any other content line, forwarded to the log unchanged.
    Unrecognized {
        /// The line as received.
        raw_line: String,
    },
}

impl DownloadEvent {
    /// True for [`DownloadEvent::Completed`].
    #[must_use]
    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Classifies one output line.
///
/// Returns `None` for blank lines and for operator noise (lines starting
/// with `#` or containing `#!`). Malformed JSON and unmatched numeric forms
/// fall through to [`DownloadEvent::Unrecognized`].
///
/// # Examples
///
/// ```
/// use launcher_core::parser::{DownloadEvent, parse_line};
///
/// assert_eq!(
///     parse_line("[download]  45.2% of 10.0MiB"),
///     Some(DownloadEvent::Progress { percent: 45.2, bytes_per_second: None }),
/// );
/// assert_eq!(parse_line("# skipped /x/y.jpg"), None);
/// ```
#[must_use]
pub fn parse_line(line: &str) -> Option<DownloadEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') || line.contains(SKIP_SENTINEL) {
        return None;
    }

    let event = parse_json_status(line)
        .or_else(|| parse_destination(line))
        .or_else(|| parse_progress(line))
        .or_else(|| parse_speed(line))
        .unwrap_or_else(|| DownloadEvent::Unrecognized {
            raw_line: line.to_string(),
        });
    trace!(?event, "classified output line");
    Some(event)
}

fn parse_json_status(line: &str) -> Option<DownloadEvent> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    let object = value.as_object()?;
    if object.get("status").and_then(Value::as_str) != Some("finished") {
        return None;
    }

    let text_field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    };
    let destination_path = text_field("filename")
        .or_else(|| text_field("file"))
        .unwrap_or_default()
        .to_string();
    let source_url = text_field("url").unwrap_or_default().to_string();

    Some(DownloadEvent::Completed {
        file_type: extension_of(&destination_path),
        destination_path,
        source_url,
    })
}

fn parse_destination(line: &str) -> Option<DownloadEvent> {
    let captures = DESTINATION_PATTERN.captures(line)?;
    let destination_path = captures.get(1)?.as_str().to_string();
    Some(DownloadEvent::Completed {
        file_type: extension_of(&destination_path),
        destination_path,
        source_url: String::new(),
    })
}

fn parse_progress(line: &str) -> Option<DownloadEvent> {
    if !line.contains(PROGRESS_MARKER) {
        return None;
    }
    let captures = PERCENT_PATTERN.captures(line)?;
    let percent = captures.get(1)?.as_str().parse::<f64>().ok()?;
    Some(DownloadEvent::Progress {
        percent,
        bytes_per_second: rate_of(line),
    })
}

fn parse_speed(line: &str) -> Option<DownloadEvent> {
    if !line.contains(PROGRESS_MARKER) {
        return None;
    }
    rate_of(line).map(|bytes_per_second| DownloadEvent::Speed { bytes_per_second })
}

/// Rate in bytes per second from a `<n>[KMG]iB/s` token.
fn rate_of(line: &str) -> Option<f64> {
    let captures = SPEED_PATTERN.captures(line)?;
    let value = captures.get(1)?.as_str().parse::<f64>().ok()?;
    let multiplier = match captures.get(2)?.as_str() {
        "K" => 1024.0,
        "M" => 1024.0 * 1024.0,
        "G" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some(value * multiplier)
}

/// Lower-cased suffix after the last `.` of the final path component.
fn extension_of(path: &str) -> String {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => {
            extension.to_lowercase()
        }
        _ => String::new(),
    }
}
