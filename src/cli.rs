//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Supervise a pool of download tool instances.
///
/// URLs are routed to instances with sticky per-account affinity; every
/// instance runs its own copy of the download tool over its pending list.
#[derive(Parser, Debug)]
#[command(name = "dl-launcher")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/dl-launcher/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Data directory for settings, links and history
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List instances with their pending counts and settings
    #[command(visible_alias = "status")]
    Instances,

    /// Grow the pool by one instance
    AddInstance,

    /// Add URLs, routed automatically or to one instance
    Add(AddArgs),

    /// Remove a pending URL from an instance
    Remove(RemoveArgs),

    /// Report where URLs are already pending
    Check {
        /// URLs to check
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// List pending URLs whose host contains DOMAIN
    FilterDomain {
        /// Host fragment, e.g. "example.com"
        domain: String,
    },

    /// Start instances and supervise them until they finish (Ctrl-C stops)
    Run(RunArgs),

    /// Query, summarize, export or clear download history
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Show or change one instance's settings
    Settings(SettingsArgs),
}

#[derive(ClapArgs, Debug)]
pub struct AddArgs {
    /// URLs to add
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Add to this instance (1-based) instead of routing
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub instance: Option<u32>,

    /// Add exact duplicates anyway
    #[arg(long)]
    pub force: bool,
}

#[derive(ClapArgs, Debug)]
pub struct RemoveArgs {
    /// URL to remove
    pub url: String,

    /// Instance (1-based)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub instance: u32,
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    /// Instances to start (1-based, repeatable); default is every instance
    #[arg(short, long = "instance", value_parser = clap::value_parser!(u32).range(1..))]
    pub instances: Vec<u32>,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Show recent rows, newest first
    List {
        /// Maximum rows to show
        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        /// Only rows with this status
        #[arg(long)]
        status: Option<String>,

        /// Only rows with this file type
        #[arg(long)]
        file_type: Option<String>,

        /// Only rows from this instance (1-based)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        instance: Option<u32>,
    },

    /// Show aggregate statistics
    Stats,

    /// Write every row to a CSV file
    Export {
        /// Destination file
        file: PathBuf,
    },

    /// Delete every row
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ClapArgs, Debug)]
pub struct SettingsArgs {
    /// Instance (1-based)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub instance: u32,

    /// Output directory
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Download archive file
    #[arg(long)]
    pub archive: Option<String>,

    /// Extra tool options, shell-quoted
    #[arg(long, allow_hyphen_values = true)]
    pub extra_opts: Option<String>,

    /// Custom filter expression appended to the content filter
    #[arg(long)]
    pub custom_filter: Option<String>,

    /// Download images
    #[arg(long)]
    pub images: Option<bool>,

    /// Download videos
    #[arg(long)]
    pub videos: Option<bool>,

    /// Download other file types
    #[arg(long)]
    pub other: Option<bool>,

    /// Restart the instance after a clean exit
    #[arg(long)]
    pub auto_restart: Option<bool>,
}

impl SettingsArgs {
    /// True when at least one setting is being changed.
    pub fn has_changes(&self) -> bool {
        self.output_dir.is_some()
            || self.archive.is_some()
            || self.extra_opts.is_some()
            || self.custom_filter.is_some()
            || self.images.is_some()
            || self.videos.is_some()
            || self.other.is_some()
            || self.auto_restart.is_some()
    }
}
