//! Output parsing for the external download tool.
//!
//! The tool writes line-oriented progress text (optionally JSON status
//! objects). [`parse_line`] turns each line into at most one
//! [`DownloadEvent`]; it keeps no state between calls.
//!
//! # Example
//!
//! ```
//! use launcher_core::parser::{DownloadEvent, parse_line};
//!
//! let line = r#"{"status":"finished","filename":"/x/y/photo.jpg","url":"https://a.com/1"}"#;
//! assert!(matches!(parse_line(line), Some(DownloadEvent::Completed { .. })));
//! ```

mod event;

pub use event::{DownloadEvent, parse_line};
