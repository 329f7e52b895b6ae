//! CLI entry point for the download launcher.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app_config;
mod cli;
mod commands;

use app_config::FileConfig;
use cli::Args;
use commands::Session;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let file_config = app_config::load_file_config(args.config.as_deref())?;
    init_tracing(default_level(&args, &file_config));
    debug!(?args, "CLI arguments parsed");

    let paths = app_config::resolve_state_paths(args.data_dir.as_deref(), &file_config);
    debug!(data_dir = %paths.data_dir().display(), "using data directory");

    let session = Session {
        paths,
        config: file_config.launcher_config(),
    };
    commands::dispatch(&args.command, &session).await
}

/// Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
fn default_level(args: &Args, file_config: &FileConfig) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => file_config
            .verbosity
            .map_or("info", app_config::VerbositySetting::default_level),
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}
