//! CLI command handlers.

mod history;
mod instances;
mod run;
mod settings;
mod urls;

use std::sync::Arc;

use anyhow::{Context, Result};
use launcher_core::{
    CompletionSink, GlobalOptions, HistoryStore, InstanceContext, InstancePool, LauncherConfig,
    Notifier, StatePaths,
};

use crate::cli::Command;

pub use history::run_history_command;
pub use instances::{run_add_instance_command, run_instances_command};
pub use run::run_run_command;
pub use settings::run_settings_command;
pub use urls::{
    run_add_command, run_check_command, run_filter_domain_command, run_remove_command,
};

/// Everything a command needs to operate on the persisted pool.
pub struct Session {
    pub paths: StatePaths,
    pub config: LauncherConfig,
}

impl Session {
    /// Opens the history database at its default location.
    pub async fn open_history(&self) -> Result<HistoryStore> {
        let path = self.paths.history_db();
        HistoryStore::open(&path)
            .await
            .with_context(|| format!("Failed to open history database '{}'", path.display()))
    }

    /// Restores the instance pool with `notifier` as its notification sink.
    pub async fn open_pool(&self, notifier: Notifier) -> Result<InstancePool> {
        let history = self.open_history().await?;
        let options_path = self.paths.global_options_file();
        let options = GlobalOptions::open_or_create(&options_path).with_context(|| {
            format!(
                "Failed to prepare global options file '{}'",
                options_path.display()
            )
        })?;

        let sink: Arc<dyn CompletionSink> = Arc::new(history);
        let ctx = InstanceContext {
            config: Arc::new(self.config.clone()),
            args: Arc::new(options),
            sink,
            notifier,
            paths: Some(self.paths.clone()),
        };
        Ok(InstancePool::open(ctx, self.config.min_instances))
    }
}

/// Runs the selected subcommand.
pub async fn dispatch(command: &Command, session: &Session) -> Result<()> {
    match command {
        Command::Instances => run_instances_command(session).await,
        Command::AddInstance => run_add_instance_command(session).await,
        Command::Add(args) => run_add_command(session, args).await,
        Command::Remove(args) => run_remove_command(session, args).await,
        Command::Check { urls } => run_check_command(session, urls).await,
        Command::FilterDomain { domain } => run_filter_domain_command(session, domain).await,
        Command::Run(args) => run_run_command(session, args).await,
        Command::History { command } => run_history_command(session, command).await,
        Command::Settings(args) => run_settings_command(session, args).await,
    }
}

/// Converts a 1-based instance number from the command line to an index.
fn instance_index(number: u32) -> Result<usize> {
    let number = usize::try_from(number).context("Instance number out of range")?;
    number
        .checked_sub(1)
        .context("Instance numbers start at 1")
}
