//! Settings command handler: show or edit one instance's settings.

use anyhow::{Context, Result};
use launcher_core::{InstanceSettings, Notifier};

use super::{Session, instance_index};
use crate::cli::SettingsArgs;

pub async fn run_settings_command(session: &Session, args: &SettingsArgs) -> Result<()> {
    let mut pool = session.open_pool(Notifier::log_only()).await?;
    let index = instance_index(args.instance)?;
    let count = pool.len();
    let supervisor = pool
        .get_mut(index)
        .with_context(|| format!("Instance {} does not exist (pool has {count})", index + 1))?;

    if args.has_changes() {
        supervisor.update_settings(|settings| apply_changes(settings, args));
        println!("Updated instance {}; changes apply on the next start.", index + 1);
    }

    let settings = supervisor.settings();
    println!("Instance {}", index + 1);
    println!("  output_dir:    {}", settings.output_dir);
    println!("  archive_file:  {}", settings.archive_file);
    println!("  extra_opts:    {}", settings.extra_opts);
    println!("  images:        {}", settings.images);
    println!("  videos:        {}", settings.videos);
    println!("  other:         {}", settings.other);
    println!("  custom_filter: {}", settings.custom_filter);
    println!("  auto_restart:  {}", settings.auto_restart);
    println!(
        "  --filter:      {}",
        settings.filter_expression().as_deref().unwrap_or("-")
    );
    Ok(())
}

fn apply_changes(settings: &mut InstanceSettings, args: &SettingsArgs) {
    if let Some(output_dir) = &args.output_dir {
        settings.output_dir.clone_from(output_dir);
    }
    if let Some(archive) = &args.archive {
        settings.archive_file.clone_from(archive);
    }
    if let Some(extra_opts) = &args.extra_opts {
        settings.extra_opts.clone_from(extra_opts);
    }
    if let Some(custom_filter) = &args.custom_filter {
        settings.custom_filter.clone_from(custom_filter);
    }
    if let Some(images) = args.images {
        settings.images = images;
    }
    if let Some(videos) = args.videos {
        settings.videos = videos;
    }
    if let Some(other) = args.other {
        settings.other = other;
    }
    if let Some(auto_restart) = args.auto_restart {
        settings.auto_restart = auto_restart;
    }
}
