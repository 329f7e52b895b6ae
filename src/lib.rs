//! Download Launcher Core Library
//!
//! This library supervises a pool of external download tool processes. Each
//! instance has its own pending URL list, output directory, archive file and
//! content filter; URLs are routed to instances with sticky per-account
//! affinity, and every completed download is recorded in a SQLite history.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`history`] - Durable download history, statistics and CSV export
//! - [`routing`] - URL normalization, affinity table and duplicate checks
//! - [`parser`] - Classification of download tool output lines
//! - [`process`] - Child process handle and output pump
//! - [`instance`] - Per-instance settings, links and lifecycle supervision
//! - [`pool`] - The instance set, staggered start/stop and shutdown
//! - [`notify`] - Caller-facing notification channel
//! - [`options`] - Global download tool options
//! - [`state`] - Data directory layout and JSON state files

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod db;
pub mod history;
pub mod instance;
pub mod notify;
pub mod options;
pub mod parser;
pub mod pool;
pub mod process;
pub mod routing;
pub mod state;

// Re-export commonly used types
pub use config::LauncherConfig;
pub use db::{Database, DatabaseOptions, DbError};
pub use history::{
    AggregateStats, CompletionSink, HistoryError, HistoryQuery, HistoryRecord, HistoryStore,
    RecordStatus,
};
pub use instance::{
    InstanceContext, InstanceSettings, InstanceSnapshot, InstanceStatus, InstanceSupervisor,
    PendingLinks,
};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use options::{ArgsSupplier, GlobalOptions, OptionsError, StaticArgs};
pub use parser::{DownloadEvent, parse_line};
pub use pool::{BulkOutcome, InstancePool, Placement, PoolError};
pub use process::{ProcessHandle, RunOutcome, StartError};
pub use routing::{
    AffinityTable, DuplicateMatches, MatchKind, PoolView, RouteError, UrlRouter, normalize,
};
pub use state::{AppState, StatePaths, StateError};
