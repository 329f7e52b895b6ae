//! Download instances: settings, pending links and process supervision.
//!
//! Each instance is an independently controllable slot with its own output
//! directory, archive file, content filter and pending URL list. The
//! [`InstanceSupervisor`] owns at most one [`ProcessRun`] at a time.

mod command;
mod links;
mod settings;
mod supervisor;

pub use command::{build_command, display_command};
pub use links::PendingLinks;
pub use settings::InstanceSettings;
pub use supervisor::{
    InstanceCounters, InstanceSnapshot, InstanceStatus, InstanceSupervisor, ProcessRun,
    format_rate,
};

use std::fmt;
use std::sync::Arc;

use crate::config::LauncherConfig;
use crate::history::CompletionSink;
use crate::notify::Notifier;
use crate::options::ArgsSupplier;
use crate::state::StatePaths;

/// Collaborators shared by every supervisor in a pool.
#[derive(Clone)]
pub struct InstanceContext {
    pub config: Arc<LauncherConfig>,
    /// Global tokens prepended to every argument vector.
    pub args: Arc<dyn ArgsSupplier>,
    /// Receives one call per completed download.
    pub sink: Arc<dyn CompletionSink>,
    pub notifier: Notifier,
    /// Where settings and links are persisted; `None` keeps everything in
    /// memory.
    pub paths: Option<StatePaths>,
}

impl fmt::Debug for InstanceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceContext")
            .field("config", &self.config)
            .field("notifier", &self.notifier)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}
