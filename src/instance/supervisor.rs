//! Lifecycle of one instance: start, stop, output handling and auto-restart.

use std::fmt;

use chrono::{DateTime, Local};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::history::RecordStatus;
use crate::parser::{DownloadEvent, parse_line};
use crate::process::{ProcessHandle, RunOutcome, StartError};

use super::command::{build_command, display_command};
use super::{InstanceContext, InstanceSettings, PendingLinks};

/// Operator-facing state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceStatus {
    /// Never started in this session.
    #[default]
    Ready,
    /// A process run is live.
    Running,
    /// The last run exited with code 0.
    Completed,
    /// The last run exited with a non-zero code.
    Error {
        /// Exit code.
        code: i32,
    },
    /// The last run was stopped or killed by a signal.
    Terminated,
    /// The last start attempt could not launch the binary.
    StartFailed,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Error { code } => write!(f, "Error (code {code})"),
            Self::Terminated => write!(f, "Terminated"),
            Self::StartFailed => write!(f, "Failed to start"),
        }
    }
}

/// Per-instance counters kept across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InstanceCounters {
    /// Completed downloads observed since the instance was created.
    pub items_processed: u64,
    /// Last reported transfer rate; reset to 0 when a run ends.
    pub current_rate: f64,
    /// Last reported progress percentage of the current run.
    pub last_progress: Option<f64>,
    /// Successful starts, including restarts.
    pub runs_started: u64,
    /// Automatic restarts issued.
    pub restarts: u64,
}

/// One live execution attempt.
#[derive(Debug)]
pub struct ProcessRun {
    handle: ProcessHandle,
    started_at: DateTime<Local>,
    lines_seen: u64,
    stop_requested: bool,
    exited_at: Option<Instant>,
}

impl ProcessRun {
    fn new(handle: ProcessHandle) -> Self {
        Self {
            handle,
            started_at: Local::now(),
            lines_seen: 0,
            stop_requested: false,
            exited_at: None,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Output lines taken from the pump so far.
    #[must_use]
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    /// Exit code once the process has exited.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.handle.outcome().and_then(|outcome| outcome.code)
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.handle.pid()
    }
}

/// Point-in-time view of an instance for status listings.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSnapshot {
    /// Zero-based index.
    pub index: usize,
    pub status: InstanceStatus,
    pub running: bool,
    pub pending: usize,
    pub counters: InstanceCounters,
    pub pid: Option<u32>,
    pub auto_restart: bool,
}

impl fmt::Display for InstanceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Instance {}: {} | {} pending | {} items | {}",
            self.index + 1,
            self.status,
            self.pending,
            self.counters.items_processed,
            format_rate(self.counters.current_rate)
        )?;
        if let Some(progress) = self.counters.last_progress {
            write!(f, " | {progress:.1}%")?;
        }
        if self.counters.restarts > 0 {
            write!(f, " | {} restarts", self.counters.restarts)?;
        }
        if self.auto_restart {
            write!(f, " | auto-restart")?;
        }
        Ok(())
    }
}

/// Formats bytes per second with a binary unit.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_rate(bytes_per_second: f64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KiB/s", "MiB/s", "GiB/s"];
    let mut value = bytes_per_second.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Composes process handle, output pump and parser for one instance.
///
/// All state transitions happen on the caller's task: the orchestrator calls
/// [`InstanceSupervisor::poll`] on a fixed interval to drain output, observe
/// exit and apply the auto-restart policy.
#[derive(Debug)]
pub struct InstanceSupervisor {
    index: usize,
    ctx: InstanceContext,
    settings: InstanceSettings,
    links: PendingLinks,
    status: InstanceStatus,
    counters: InstanceCounters,
    run: Option<ProcessRun>,
}

impl InstanceSupervisor {
    /// Creates a supervisor with explicit settings and pending links.
    #[must_use]
    pub fn new(
        index: usize,
        ctx: InstanceContext,
        settings: InstanceSettings,
        links: PendingLinks,
    ) -> Self {
        Self {
            index,
            ctx,
            settings,
            links,
            status: InstanceStatus::Ready,
            counters: InstanceCounters::default(),
            run: None,
        }
    }

    /// Creates a supervisor from its persisted settings and links, using
    /// defaults for anything missing.
    #[must_use]
    pub fn restore(index: usize, ctx: InstanceContext) -> Self {
        let (settings, links) = match &ctx.paths {
            Some(paths) => (
                InstanceSettings::load_or(
                    &paths.settings_file(index),
                    InstanceSettings::for_instance(index, paths),
                ),
                PendingLinks::load(&paths.links_file(index)),
            ),
            None => (InstanceSettings::default(), PendingLinks::new()),
        };
        Self::new(index, ctx, settings, links)
    }

    /// Zero-based index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// One-based number shown to operators.
    #[must_use]
    pub fn number(&self) -> usize {
        self.index + 1
    }

    #[must_use]
    pub fn settings(&self) -> &InstanceSettings {
        &self.settings
    }

    /// Applies `edit` to the settings and persists them. Changes take effect
    /// on the next start.
    pub fn update_settings(&mut self, edit: impl FnOnce(&mut InstanceSettings)) {
        edit(&mut self.settings);
        self.save_settings();
    }

    #[must_use]
    pub fn links(&self) -> &PendingLinks {
        &self.links
    }

    /// Appends a pending URL and persists the list. Returns false for
    /// blanks and exact duplicates.
    pub fn add_url(&mut self, url: &str) -> bool {
        let added = self.links.add(url);
        if added {
            self.save_links();
        }
        added
    }

    /// Removes a pending URL and persists the list.
    pub fn remove_url(&mut self, url: &str) -> bool {
        let removed = self.links.remove(url);
        if removed {
            self.save_links();
        }
        removed
    }

    #[must_use]
    pub fn status(&self) -> InstanceStatus {
        self.status
    }

    #[must_use]
    pub fn counters(&self) -> InstanceCounters {
        self.counters
    }

    /// The live run, if any.
    #[must_use]
    pub fn run(&self) -> Option<&ProcessRun> {
        self.run.as_ref()
    }

    /// True while a run exists whose exit has not been observed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| !run.handle.has_exited())
    }

    /// True while a run exists, including the drain window after exit.
    #[must_use]
    pub fn has_live_run(&self) -> bool {
        self.run.is_some()
    }

    #[must_use]
    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            index: self.index,
            status: self.status,
            running: self.is_running(),
            pending: self.links.len(),
            counters: self.counters,
            pid: self.run.as_ref().and_then(ProcessRun::pid),
            auto_restart: self.settings.auto_restart,
        }
    }

    /// Persists the pending links; failures are logged.
    pub fn save_links(&self) {
        let Some(paths) = &self.ctx.paths else {
            return;
        };
        if let Err(error) = self.links.save(&paths.links_file(self.index)) {
            warn!(instance = self.number(), %error, "failed to save links");
        }
    }

    /// Persists the settings; failures are logged.
    pub fn save_settings(&self) {
        let Some(paths) = &self.ctx.paths else {
            return;
        };
        if let Err(error) = self.settings.save(&paths.settings_file(self.index)) {
            warn!(instance = self.number(), %error, "failed to save settings");
        }
    }

    /// Spawns a run over the full pending list.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::AlreadyRunning`] while a run is live,
    /// [`StartError::NoUrls`] for an empty list and
    /// [`StartError::SpawnFailed`] when the binary cannot be launched.
    #[instrument(skip(self), fields(instance = self.number()))]
    pub fn start(&mut self) -> Result<(), StartError> {
        let instance = Some(self.index);
        if self.run.is_some() {
            return Err(StartError::AlreadyRunning {
                instance: self.number(),
            });
        }
        if self.links.is_empty() {
            return Err(StartError::NoUrls {
                instance: self.number(),
            });
        }

        if let Some(paths) = &self.ctx.paths {
            if let Some(archive) = self.settings.enforce_unique_archive(self.index, paths) {
                self.ctx.notifier.info(
                    instance,
                    format!("Using unique archive file {}", archive.display()),
                );
            }
        }
        self.save_links();
        self.save_settings();

        let global_tokens = self.ctx.args.global_tokens();
        let argv = build_command(
            &self.ctx.config.binary,
            &global_tokens,
            &self.settings,
            self.links.as_slice(),
        );
        self.ctx
            .notifier
            .info(instance, format!("Starting {}", display_command(&argv)));

        let handle = match ProcessHandle::spawn(&argv) {
            Ok(handle) => handle,
            Err(error) => {
                self.status = InstanceStatus::StartFailed;
                self.ctx
                    .notifier
                    .error(instance, format!("Failed to start: {error}"));
                return Err(error);
            }
        };

        if let Some(pid) = handle.pid() {
            self.ctx
                .notifier
                .info(instance, format!("Process started with PID {pid}"));
        }
        self.run = Some(ProcessRun::new(handle));
        self.status = InstanceStatus::Running;
        self.counters.runs_started += 1;
        self.counters.current_rate = 0.0;
        self.counters.last_progress = None;
        Ok(())
    }

    /// Stops the live run. No-op when nothing is running.
    ///
    /// Sends a graceful terminate, samples for exit until the stop timeout,
    /// then force-kills. The auto-restart flag is switched off for the
    /// duration and restored afterwards; the run itself is marked as
    /// stopped so its exit never triggers a restart.
    #[instrument(skip(self), fields(instance = self.number()))]
    pub async fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        let instance = Some(self.index);
        let stop_timeout = self.ctx.config.stop_timeout;
        let stop_poll = self.ctx.config.stop_poll.max(Duration::from_millis(1));

        self.ctx.notifier.info(instance, "Stopping process");
        let saved_auto_restart = self.settings.auto_restart;
        self.settings.auto_restart = false;

        if let Some(run) = self.run.as_mut() {
            run.stop_requested = true;
            run.handle.terminate();

            let deadline = Instant::now() + stop_timeout;
            while !run.handle.has_exited() && Instant::now() < deadline {
                tokio::time::sleep(stop_poll).await;
            }

            if !run.handle.has_exited() {
                self.ctx
                    .notifier
                    .info(instance, "Process not responding, force killing");
                run.handle.force_kill().await;
                if tokio::time::timeout(stop_timeout, run.handle.wait())
                    .await
                    .is_err()
                {
                    warn!("process still alive after force kill");
                }
            }
        }

        self.settings.auto_restart = saved_auto_restart;
    }

    /// Drains pending output, then tears the run down once its exit has
    /// been observed and the output closed.
    ///
    /// The drain grace only applies while the queue is empty: a child that
    /// exited but left a grandchild holding the pipe is torn down after the
    /// grace, a backlog of queued lines never is.
    pub async fn poll(&mut self) {
        let max_lines = self.ctx.config.max_lines_per_tick.max(1);
        let (lines, exited_at, output_closed) = {
            let Some(run) = self.run.as_mut() else {
                return;
            };
            let lines = run.handle.output().drain(max_lines);
            run.lines_seen += lines.len() as u64;
            if run.exited_at.is_none() && run.handle.has_exited() {
                run.exited_at = Some(Instant::now());
            }
            (lines, run.exited_at, run.handle.output().is_closed())
        };

        for line in &lines {
            self.handle_line(line).await;
        }

        let backlog_empty = lines.len() < max_lines;
        if let Some(exited_at) = exited_at {
            let grace_over = exited_at.elapsed() >= self.ctx.config.drain_grace;
            if output_closed || (backlog_empty && grace_over) {
                self.finish_run();
            }
        }
    }

    async fn handle_line(&mut self, line: &str) {
        let Some(event) = parse_line(line) else {
            return;
        };
        let instance = Some(self.index);

        match event {
            DownloadEvent::Progress {
                percent,
                bytes_per_second,
            } => {
                self.counters.last_progress = Some(percent);
                if let Some(rate) = bytes_per_second {
                    self.counters.current_rate = rate;
                }
                self.ctx.notifier.info(instance, line);
            }
            DownloadEvent::Speed { bytes_per_second } => {
                self.counters.current_rate = bytes_per_second;
                self.ctx.notifier.info(instance, line);
            }
            DownloadEvent::Completed {
                destination_path,
                file_type,
                source_url,
            } => {
                self.counters.items_processed += 1;
                let url = if source_url.is_empty() {
                    destination_path.as_str()
                } else {
                    source_url.as_str()
                };
                debug!(instance = self.number(), url, "download completed");
                self.ctx
                    .sink
                    .record_completion(self.index, url, &file_type, &RecordStatus::Success)
                    .await;
                self.ctx.notifier.success(instance, line);
            }
            DownloadEvent::Unrecognized { raw_line } => {
                self.ctx.notifier.info(instance, raw_line);
            }
        }
    }

    fn finish_run(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        let instance = Some(self.index);
        let outcome = run.handle.outcome().unwrap_or(RunOutcome { code: None });

        self.counters.current_rate = 0.0;
        self.status = match (run.stop_requested, outcome.code) {
            (true, _) | (false, None) => InstanceStatus::Terminated,
            (false, Some(0)) => InstanceStatus::Completed,
            (false, Some(code)) => InstanceStatus::Error { code },
        };

        match self.status {
            InstanceStatus::Completed => self.ctx.notifier.success(instance, "Download finished"),
            InstanceStatus::Error { code } => self
                .ctx
                .notifier
                .error(instance, format!("Process exited with error (code {code})")),
            _ => self.ctx.notifier.info(instance, "Process stopped"),
        }
        info!(
            instance = self.number(),
            status = %self.status,
            lines = run.lines_seen,
            "process run finished"
        );

        if self.settings.auto_restart && !run.stop_requested {
            self.counters.restarts += 1;
            self.ctx.notifier.info(instance, "Auto-restarting");
            if let Err(error) = self.start() {
                self.ctx
                    .notifier
                    .error(instance, format!("Auto-restart failed: {error}"));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::LauncherConfig;
    use crate::db::Database;
    use crate::history::{CompletionSink, HistoryStore};
    use crate::notify::Notifier;
    use crate::options::StaticArgs;

    async fn context(binary: &str) -> (InstanceContext, HistoryStore) {
        let store = HistoryStore::new(Database::new_in_memory().await.unwrap());
        let sink: Arc<dyn CompletionSink> = Arc::new(store.clone());
        let ctx = InstanceContext {
            config: Arc::new(LauncherConfig::with_binary(binary)),
            args: Arc::new(StaticArgs::default()),
            sink,
            notifier: Notifier::log_only(),
            paths: None,
        };
        (ctx, store)
    }

    #[test]
    fn test_status_display() {
        assert_eq!(InstanceStatus::Error { code: 2 }.to_string(), "Error (code 2)");
        assert_eq!(InstanceStatus::default().to_string(), "Ready");
    }

    #[test]
    fn test_format_rate_units() {
        assert_eq!(format_rate(0.0), "0.0 B/s");
        assert_eq!(format_rate(1536.0), "1.5 KiB/s");
        assert_eq!(format_rate(3.0 * 1024.0 * 1024.0), "3.0 MiB/s");
    }

    #[tokio::test]
    async fn test_stop_on_idle_instance_is_noop() {
        let (ctx, _) = context("tool").await;
        let mut supervisor =
            InstanceSupervisor::new(0, ctx, InstanceSettings::default(), PendingLinks::new());
        supervisor.stop().await;
        assert!(!supervisor.is_running());
        assert_eq!(supervisor.status(), InstanceStatus::Ready);
    }

    #[tokio::test]
    async fn test_start_without_urls_is_rejected() {
        let (ctx, _) = context("tool").await;
        let mut supervisor =
            InstanceSupervisor::new(1, ctx, InstanceSettings::default(), PendingLinks::new());
        let err = supervisor.start().unwrap_err();
        assert!(matches!(err, StartError::NoUrls { instance: 2 }));
    }

    #[tokio::test]
    async fn test_progress_line_updates_rate_and_percent() {
        let (ctx, _) = context("tool").await;
        let mut supervisor =
            InstanceSupervisor::new(0, ctx, InstanceSettings::default(), PendingLinks::new());

        supervisor
            .handle_line("[download]  45.2% of 10.00MiB at  3.10MiB/s ETA 00:03")
            .await;
        assert_eq!(supervisor.counters().last_progress, Some(45.2));
        assert_eq!(supervisor.counters().current_rate, 3.1 * 1024.0 * 1024.0);

        supervisor.handle_line("[download]  50.0% of 10.00MiB").await;
        assert_eq!(supervisor.counters().last_progress, Some(50.0));
        assert_eq!(supervisor.counters().current_rate, 3.1 * 1024.0 * 1024.0);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported_not_retried() {
        let (ctx, _) = context("/nonexistent/download-tool").await;
        let mut links = PendingLinks::new();
        links.add("https://a.com/1");
        let settings = InstanceSettings {
            auto_restart: true,
            ..InstanceSettings::default()
        };
        let mut supervisor = InstanceSupervisor::new(0, ctx, settings, links);

        assert!(supervisor.start().unwrap_err().is_spawn_failure());
        assert!(!supervisor.has_live_run());
        assert_eq!(supervisor.status(), InstanceStatus::StartFailed);
        supervisor.poll().await;
        assert_eq!(supervisor.counters().runs_started, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_completions_are_recorded_and_counted() {
        let (ctx, store) = context("sh").await;
        let script = concat!(
            "printf '%s\\n' ",
            r#"'{"status":"finished","filename":"/x/a.png","url":"https://a.com/1"}' "#,
            "'[download]  2.0KiB/s' '# skipped'"
        );
        let ctx = InstanceContext {
            args: Arc::new(StaticArgs(vec![
                "-c".to_string(),
                script.to_string(),
                "sh".to_string(),
            ])),
            ..ctx
        };
        let settings = InstanceSettings {
            images: false,
            videos: false,
            other: false,
            ..InstanceSettings::default()
        };
        let mut links = PendingLinks::new();
        links.add("https://a.com/1");
        let mut supervisor = InstanceSupervisor::new(0, ctx, settings, links);

        supervisor.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while supervisor.has_live_run() && Instant::now() < deadline {
            supervisor.poll().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(supervisor.status(), InstanceStatus::Completed);
        assert_eq!(supervisor.counters().items_processed, 1);
        assert!(supervisor.counters().current_rate.abs() < f64::EPSILON);
        let records = store.query(5).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://a.com/1");
        assert_eq!(records[0].file_type, "png");
    }
}
