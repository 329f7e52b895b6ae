//! Persistent base-identity to instance mapping.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::state::{read_json, write_json};

/// Sticky placement table, persisted as a JSON object
/// `{ "<base identity>": <zero-based instance index> }`.
///
/// Each identity maps to at most one instance.
#[derive(Debug, Clone, Default)]
pub struct AffinityTable {
    entries: BTreeMap<String, usize>,
    path: Option<PathBuf>,
}

impl AffinityTable {
    /// Creates an empty table that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the table from `path`, starting empty when the file is missing
    /// or unreadable. Later [`AffinityTable::save`] calls write back to `path`.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let entries = match read_json::<BTreeMap<String, usize>>(path) {
            Ok(Some(entries)) => entries,
            Ok(None) => BTreeMap::new(),
            Err(error) => {
                warn!(%error, "ignoring unreadable affinity table");
                BTreeMap::new()
            }
        };
        debug!(entries = entries.len(), path = %path.display(), "affinity table loaded");
        Self {
            entries,
            path: Some(path.to_path_buf()),
        }
    }

    /// Returns the instance recorded for `identity`.
    #[must_use]
    pub fn get(&self, identity: &str) -> Option<usize> {
        self.entries.get(identity).copied()
    }

    /// Records (or replaces) the instance for `identity`.
    pub fn insert(&mut self, identity: impl Into<String>, instance: usize) {
        self.entries.insert(identity.into(), instance);
    }

    /// Number of recorded identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Writes the table to its backing file, if any.
    ///
    /// Failures are logged and swallowed.
    pub fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(error) = write_json(path, &self.entries) {
            warn!(%error, "failed to persist affinity table");
        }
    }
}
