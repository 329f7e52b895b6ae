//! The instance set and its orchestration.
//!
//! [`InstancePool`] owns every [`InstanceSupervisor`] and the [`UrlRouter`].
//! It is driven from a single task: callers invoke [`InstancePool::tick`] on
//! a fixed interval to fire staggered actions and poll every supervisor.
//!
//! # Example
//!
//! ```ignore
//! let mut pool = InstancePool::open(ctx, 3);
//! pool.submit_url("https://site.com/user/alice")?;
//! pool.start_all();
//! let mut interval = tokio::time::interval(pool.config().poll_interval);
//! while pool.is_active() {
//!     interval.tick().await;
//!     pool.tick().await;
//! }
//! pool.shutdown().await;
//! ```

mod schedule;

pub use schedule::{PoolAction, Schedule};

use std::collections::BTreeMap;

use thiserror::Error;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::LauncherConfig;
use crate::instance::{InstanceContext, InstanceSnapshot, InstanceSupervisor};
use crate::process::StartError;
use crate::routing::{
    AffinityTable, DuplicateMatches, MatchKind, PoolView, RouteError, UrlRouter, check_bulk,
    check_duplicate, filter_by_domain,
};
use crate::state::AppState;

/// Errors from pool-level operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The instance number does not exist.
    #[error("instance {instance} does not exist (pool has {count})")]
    NoSuchInstance {
        /// One-based number that was requested.
        instance: usize,
        /// Current instance count.
        count: usize,
    },

    /// Automatic placement failed.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Starting an instance failed.
    #[error(transparent)]
    Start(#[from] StartError),
}

/// Where a submitted URL went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Zero-based instance index.
    pub index: usize,
    /// False when that instance already had the exact string pending.
    pub added: bool,
}

/// Per-URL result of [`InstancePool::submit_bulk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Placed on an instance.
    Placed {
        url: String,
        index: usize,
    },
    /// Skipped because an exact duplicate is already pending.
    Skipped {
        url: String,
        matches: DuplicateMatches,
    },
    /// No instance could take it.
    Failed {
        url: String,
        error: RouteError,
    },
}

impl PoolView for [InstanceSupervisor] {
    fn instance_count(&self) -> usize {
        self.len()
    }

    fn is_running(&self, index: usize) -> bool {
        self.get(index).is_some_and(InstanceSupervisor::is_running)
    }

    fn pending_urls(&self, index: usize) -> &[String] {
        self.get(index)
            .map(|supervisor| supervisor.links().as_slice())
            .unwrap_or_default()
    }
}

/// Owner of the instance set.
///
/// The pool only grows; instance indices are stable for its lifetime.
#[derive(Debug)]
pub struct InstancePool {
    ctx: InstanceContext,
    supervisors: Vec<InstanceSupervisor>,
    router: UrlRouter,
    schedule: Schedule,
}

impl InstancePool {
    /// Creates an empty pool with an in-memory affinity table.
    #[must_use]
    pub fn new(ctx: InstanceContext) -> Self {
        Self {
            ctx,
            supervisors: Vec::new(),
            router: UrlRouter::default(),
            schedule: Schedule::default(),
        }
    }

    /// Restores a pool from the data directory: the affinity table and
    /// `max(min_instances, saved instance count)` instances with their
    /// settings and links. Without state paths the pool starts fresh.
    #[instrument(skip(ctx))]
    pub fn open(ctx: InstanceContext, min_instances: usize) -> Self {
        let (router, saved_count) = match &ctx.paths {
            Some(paths) => (
                UrlRouter::new(AffinityTable::load(&paths.affinity_file())),
                AppState::load_or_default(&paths.app_state_file()).instance_count,
            ),
            None => (UrlRouter::default(), 0),
        };
        let count = min_instances.max(saved_count);

        let mut pool = Self {
            ctx,
            supervisors: Vec::with_capacity(count),
            router,
            schedule: Schedule::default(),
        };
        for index in 0..count {
            pool.supervisors
                .push(InstanceSupervisor::restore(index, pool.ctx.clone()));
        }
        info!(instances = count, "instance pool ready");
        pool
    }

    #[must_use]
    pub fn config(&self) -> &LauncherConfig {
        &self.ctx.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&InstanceSupervisor> {
        self.supervisors.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut InstanceSupervisor> {
        self.supervisors.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstanceSupervisor> {
        self.supervisors.iter()
    }

    #[must_use]
    pub fn router(&self) -> &UrlRouter {
        &self.router
    }

    /// Looks up a supervisor by zero-based index.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoSuchInstance`] for an unknown index.
    pub fn supervisor_mut(&mut self, index: usize) -> Result<&mut InstanceSupervisor, PoolError> {
        let count = self.supervisors.len();
        self.supervisors
            .get_mut(index)
            .ok_or(PoolError::NoSuchInstance {
                instance: index + 1,
                count,
            })
    }

    /// Appends a new instance, persists the new count and returns its index.
    pub fn add_instance(&mut self) -> usize {
        let index = self.supervisors.len();
        self.supervisors
            .push(InstanceSupervisor::restore(index, self.ctx.clone()));
        self.save_app_state();
        self.ctx
            .notifier
            .info(Some(index), format!("Added instance {}", index + 1));
        index
    }

    /// Grows the pool to at least `count` instances.
    pub fn ensure_instances(&mut self, count: usize) {
        while self.supervisors.len() < count {
            self.add_instance();
        }
    }

    /// True while instance `index` has a live process.
    #[must_use]
    pub fn is_busy(&self, index: usize) -> bool {
        self.supervisors.as_slice().is_running(index)
    }

    /// True when any instance has a live run or an action is scheduled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.schedule.is_empty() || self.supervisors.iter().any(InstanceSupervisor::has_live_run)
    }

    /// Adds `url` to instance `index`, bypassing placement. Any instance may
    /// be targeted, including a running one.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoSuchInstance`] for an unknown index.
    pub fn add_url(&mut self, index: usize, url: &str) -> Result<bool, PoolError> {
        Ok(self.supervisor_mut(index)?.add_url(url))
    }

    /// Removes `url` from instance `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoSuchInstance`] for an unknown index.
    pub fn remove_url(&mut self, index: usize, url: &str) -> Result<bool, PoolError> {
        Ok(self.supervisor_mut(index)?.remove_url(url))
    }

    /// Places `url` with the router and appends it there.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Route`] when no instance can take the URL.
    pub fn submit_url(&mut self, url: &str) -> Result<Placement, PoolError> {
        let index = self.router.place_url(url, self.supervisors.as_slice())?;
        let added = self.supervisors[index].add_url(url);
        Ok(Placement { index, added })
    }

    /// Places every URL independently, skipping those already pending
    /// somewhere as an exact duplicate.
    pub fn submit_bulk(&mut self, urls: &[String]) -> Vec<BulkOutcome> {
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls.iter().map(|url| url.trim()).filter(|url| !url.is_empty()) {
            let matches = check_duplicate(url, self.supervisors.as_slice());
            if matches.values().any(|kind| *kind == MatchKind::Exact) {
                outcomes.push(BulkOutcome::Skipped {
                    url: url.to_string(),
                    matches,
                });
                continue;
            }
            let outcome = match self.submit_url(url) {
                Ok(placement) => BulkOutcome::Placed {
                    url: url.to_string(),
                    index: placement.index,
                },
                Err(PoolError::Route(error)) => BulkOutcome::Failed {
                    url: url.to_string(),
                    error,
                },
                Err(error) => {
                    warn!(%error, url, "unexpected bulk placement failure");
                    continue;
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Duplicate report for one URL across the pool.
    #[must_use]
    pub fn search(&self, url: &str) -> DuplicateMatches {
        check_duplicate(url, self.supervisors.as_slice())
    }

    /// Duplicate report for each URL, checked independently.
    #[must_use]
    pub fn check_bulk(&self, urls: &[String]) -> Vec<(String, DuplicateMatches)> {
        check_bulk(urls, self.supervisors.as_slice())
    }

    /// Pending URLs per instance whose host contains `domain`.
    #[must_use]
    pub fn filter_by_domain(&self, domain: &str) -> BTreeMap<usize, Vec<String>> {
        filter_by_domain(domain, self.supervisors.as_slice())
    }

    /// Starts instance `index` now.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoSuchInstance`] or the supervisor's
    /// [`StartError`].
    pub fn start(&mut self, index: usize) -> Result<(), PoolError> {
        self.supervisor_mut(index)?.start()?;
        Ok(())
    }

    /// Stops instance `index` now.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoSuchInstance`] for an unknown index.
    pub async fn stop(&mut self, index: usize) -> Result<(), PoolError> {
        self.supervisor_mut(index)?.stop().await;
        Ok(())
    }

    /// Schedules a start for every idle instance with pending URLs, one
    /// start-stagger apart. Returns how many were scheduled.
    pub fn start_all(&mut self) -> usize {
        let indices: Vec<usize> = (0..self.supervisors.len()).collect();
        self.start_selected(&indices)
    }

    /// Schedules staggered starts for the given zero-based indices, skipping
    /// unknown, busy and empty instances.
    pub fn start_selected(&mut self, indices: &[usize]) -> usize {
        let stagger = self.ctx.config.start_stagger;
        let mut scheduled = 0_u32;
        for &index in indices {
            let Some(supervisor) = self.supervisors.get(index) else {
                warn!(instance = index + 1, "skipping unknown instance");
                continue;
            };
            if supervisor.has_live_run() || supervisor.links().is_empty() {
                debug!(instance = index + 1, "nothing to start");
                continue;
            }
            self.schedule
                .push(PoolAction::Start(index), stagger * scheduled);
            scheduled += 1;
        }
        scheduled as usize
    }

    /// Cancels pending starts and schedules a stop for every running
    /// instance, one stop-stagger apart. Returns how many were scheduled.
    pub fn stop_all(&mut self) -> usize {
        let stagger = self.ctx.config.stop_stagger;
        self.schedule.cancel_starts();
        let mut scheduled = 0_u32;
        for index in 0..self.supervisors.len() {
            if !self.supervisors[index].is_running() {
                continue;
            }
            self.schedule
                .push(PoolAction::Stop(index), stagger * scheduled);
            scheduled += 1;
        }
        scheduled as usize
    }

    /// One orchestrator step: fire due actions, then poll every instance.
    pub async fn tick(&mut self) {
        for action in self.schedule.take_due() {
            match action {
                PoolAction::Start(index) => {
                    if let Some(supervisor) = self.supervisors.get_mut(index) {
                        if let Err(error) = supervisor.start() {
                            debug!(%error, "scheduled start did not run");
                        }
                    }
                }
                PoolAction::Stop(index) => {
                    if let Some(supervisor) = self.supervisors.get_mut(index) {
                        supervisor.stop().await;
                    }
                }
            }
        }

        for supervisor in &mut self.supervisors {
            supervisor.poll().await;
        }
    }

    /// Status snapshots in index order.
    #[must_use]
    pub fn status(&self) -> Vec<InstanceSnapshot> {
        self.supervisors
            .iter()
            .map(InstanceSupervisor::snapshot)
            .collect()
    }

    /// Stops every running instance, waits (bounded) for their runs to be
    /// torn down, then persists links, settings, affinity and app state.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) {
        self.schedule.clear();
        for supervisor in &mut self.supervisors {
            supervisor.stop().await;
        }

        let grace = self.ctx.config.drain_grace + self.ctx.config.stop_timeout;
        let deadline = Instant::now() + grace;
        let poll_every = self.ctx.config.poll_interval.max(Duration::from_millis(1));
        while self.supervisors.iter().any(InstanceSupervisor::has_live_run)
            && Instant::now() < deadline
        {
            for supervisor in &mut self.supervisors {
                supervisor.poll().await;
            }
            tokio::time::sleep(poll_every).await;
        }

        self.save_state();
        info!(instances = self.supervisors.len(), "instance pool shut down");
    }

    /// Persists every instance's links and settings plus the affinity
    /// table and app state. Failures are logged.
    pub fn save_state(&self) {
        for supervisor in &self.supervisors {
            supervisor.save_links();
            supervisor.save_settings();
        }
        self.router.affinity().save();
        self.save_app_state();
    }

    fn save_app_state(&self) {
        let Some(paths) = &self.ctx.paths else {
            return;
        };
        let state = AppState::now(self.supervisors.len(), None);
        if let Err(error) = state.save(&paths.app_state_file()) {
            warn!(%error, "failed to save app state");
        }
    }
}

impl PoolView for InstancePool {
    fn instance_count(&self) -> usize {
        self.supervisors.len()
    }

    fn is_running(&self, index: usize) -> bool {
        self.supervisors.as_slice().is_running(index)
    }

    fn pending_urls(&self, index: usize) -> &[String] {
        self.supervisors.as_slice().pending_urls(index)
    }
}
