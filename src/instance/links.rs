//! Ordered pending URL list of one instance.

use std::path::Path;

use tracing::warn;

use crate::state::{StateError, write_text};

/// Pending URLs in insertion order; the same exact string appears at most
/// once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingLinks {
    urls: Vec<String>,
}

impl PendingLinks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one URL per line, ignoring blanks and exact repeats.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut links = Self::new();
        for line in text.lines() {
            links.add(line);
        }
        links
    }

    /// One URL per line.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.urls.join("\n")
    }

    /// Appends `url` (trimmed). Returns false for blanks and exact duplicates.
    pub fn add(&mut self, url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() || self.contains(url) {
            return false;
        }
        self.urls.push(url.to_string());
        true
    }

    /// Removes `url` (trimmed). Returns false when it was not pending.
    pub fn remove(&mut self, url: &str) -> bool {
        let url = url.trim();
        let before = self.urls.len();
        self.urls.retain(|pending| pending != url);
        self.urls.len() != before
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|pending| pending == url)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn clear(&mut self) {
        self.urls.clear();
    }

    /// Loads `path`; a missing or unreadable file yields an empty list.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_text(&text),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Self::new(),
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unreadable links file");
                Self::new()
            }
        }
    }

    /// Writes the list to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the write fails.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        write_text(path, &self.to_text())
    }
}
