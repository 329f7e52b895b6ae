//! Ownership of one external process: spawn, signal, wait, kill.

#[cfg(unix)]
use std::os::fd::OwnedFd;
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, instrument, warn};

use super::error::StartError;
#[cfg(not(unix))]
use super::pump::spawn_blocking_reader;
#[cfg(unix)]
use super::pump::spawn_reader;
use super::pump::OutputPump;

/// Exit information for a finished process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code; `None` when terminated by a signal or the wait failed.
    pub code: Option<i32>,
}

impl RunOutcome {
    /// True for exit code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A spawned child process with its output pump.
///
/// A background task owns the child and publishes its exit; this handle
/// only observes and signals. Dropping the handle kills a still-running
/// child.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    exit: watch::Receiver<Option<RunOutcome>>,
    kill: Option<oneshot::Sender<()>>,
    output: OutputPump,
}

impl ProcessHandle {
    /// Spawns `argv[0]` with the remaining elements as arguments.
    ///
    /// stdout and stderr share one pipe, so the [`OutputPump`] sees lines in
    /// the order the process wrote them.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::SpawnFailed`] when `argv` is empty or the OS
    /// refuses to launch the program.
    #[instrument(skip(argv), fields(binary = ?argv.first()))]
    pub fn spawn(argv: &[String]) -> Result<Self, StartError> {
        let Some((binary, args)) = argv.split_first() else {
            return Err(StartError::SpawnFailed {
                binary: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let spawn_error = |source| StartError::SpawnFailed {
            binary: binary.clone(),
            source,
        };
        let (pipe_reader, pipe_writer) = std::io::pipe().map_err(spawn_error)?;
        let stderr_writer = pipe_writer.try_clone().map_err(spawn_error)?;

        let mut command = Command::new(binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(pipe_writer))
            .stderr(Stdio::from(stderr_writer))
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = command.spawn().map_err(spawn_error)?;
        // The command still owns the write ends; end-of-file needs them closed.
        drop(command);
        let pid = child.id();

        let (tx, output) = OutputPump::channel();
        #[cfg(unix)]
        {
            let receiver =
                tokio::net::unix::pipe::Receiver::from_owned_fd(OwnedFd::from(pipe_reader))
                    .map_err(spawn_error)?;
            spawn_reader(receiver, tx, "output");
        }
        #[cfg(not(unix))]
        spawn_blocking_reader(pipe_reader, tx, "output");

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };
            let status = match exited {
                Some(status) => status,
                None => {
                    if let Err(error) = child.start_kill() {
                        debug!(%error, "kill request after exit");
                    }
                    child.wait().await
                }
            };
            let outcome = match status {
                Ok(status) => RunOutcome {
                    code: status.code(),
                },
                Err(error) => {
                    warn!(%error, "waiting for child failed");
                    RunOutcome { code: None }
                }
            };
            debug!(code = ?outcome.code, "child exited");
            // Receiver gone means nobody is interested in the outcome.
            let _ = exit_tx.send(Some(outcome));
        });

        info!(pid = ?pid, "process spawned");
        Ok(Self {
            pid,
            exit: exit_rx,
            kill: Some(kill_tx),
            output,
        })
    }

    /// OS process id, if the child was assigned one.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// True once the exit status has been observed.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    /// Exit information, once available.
    #[must_use]
    pub fn outcome(&self) -> Option<RunOutcome> {
        *self.exit.borrow()
    }

    /// Waits until the process has exited.
    pub async fn wait(&mut self) -> RunOutcome {
        match self.exit.wait_for(Option::is_some).await {
            Ok(outcome) => {
                let outcome = *outcome;
                outcome.unwrap_or(RunOutcome { code: None })
            }
            Err(_) => RunOutcome { code: None },
        }
    }

    /// Mutable access to the output pump.
    pub fn output(&mut self) -> &mut OutputPump {
        &mut self.output
    }

    /// Asks the process to exit.
    ///
    /// Unix delivers `SIGTERM`. Other platforms have no graceful signal for
    /// console children and terminate directly.
    #[instrument(skip(self), fields(pid = ?self.pid))]
    pub fn terminate(&mut self) {
        if self.has_exited() {
            return;
        }
        #[cfg(unix)]
        {
            if let Some(pid) = self.pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) {
                // SAFETY: `kill` has no memory-safety preconditions; the pid
                // belongs to a child whose exit has not been reaped yet.
                let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
                if rc != 0 {
                    warn!(error = %std::io::Error::last_os_error(), "SIGTERM failed");
                }
                return;
            }
        }
        self.request_kill();
    }

    /// Kills the process without giving it a chance to clean up.
    ///
    /// On Windows the whole process tree is killed so helper processes do
    /// not keep the output pipes open.
    #[instrument(skip(self), fields(pid = ?self.pid))]
    pub async fn force_kill(&mut self) {
        if self.has_exited() {
            return;
        }
        #[cfg(windows)]
        {
            if let Some(pid) = self.pid {
                let result = Command::new("taskkill")
                    .args(["/F", "/T", "/PID", &pid.to_string()])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                if let Err(error) = result {
                    warn!(%error, "taskkill failed");
                }
            }
        }
        self.request_kill();
    }

    fn request_kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            // The waiter already finished if the receiver is gone.
            let _ = kill.send(());
        }
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    async fn collect(handle: &mut ProcessHandle) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = handle.output().next_line().await {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_spawn_collects_both_streams_and_exit_code() {
        let mut handle = ProcessHandle::spawn(&sh("echo out; echo err 1>&2; exit 3")).unwrap();
        assert_eq!(handle.wait().await, RunOutcome { code: Some(3) });
        assert_eq!(collect(&mut handle).await, vec!["out".to_string(), "err".to_string()]);
    }

    #[tokio::test]
    async fn test_interleaved_streams_keep_write_order() {
        let script = concat!(
            "i=0; while [ $i -lt 1000 ]; do ",
            "echo out$i; echo err$i 1>&2; i=$((i+1)); done"
        );
        let mut handle = ProcessHandle::spawn(&sh(script)).unwrap();
        assert!(handle.wait().await.success());

        let expected: Vec<String> = (0..1000)
            .flat_map(|i| [format!("out{i}"), format!("err{i}")])
            .collect();
        assert_eq!(collect(&mut handle).await, expected);
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let err = ProcessHandle::spawn(&["/nonexistent/tool".to_string()]).unwrap_err();
        assert!(matches!(err, StartError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_spawn_empty_argv_fails() {
        assert!(ProcessHandle::spawn(&[]).is_err());
    }

    #[tokio::test]
    async fn test_terminate_and_force_kill() {
        let mut polite =
            ProcessHandle::spawn(&sh("trap 'exit 0' TERM; while true; do sleep 0.1; done"))
                .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        polite.terminate();
        let outcome = tokio::time::timeout(Duration::from_secs(5), polite.wait())
            .await
            .unwrap();
        assert!(outcome.success());

        let mut stubborn =
            ProcessHandle::spawn(&sh("trap '' TERM; while true; do sleep 0.1; done")).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        stubborn.force_kill().await;
        let outcome = tokio::time::timeout(Duration::from_secs(5), stubborn.wait())
            .await
            .unwrap();
        assert!(!outcome.success());
        assert!(stubborn.has_exited());
    }
}
