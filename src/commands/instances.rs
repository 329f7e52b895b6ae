//! Instance listing and pool growth.

use anyhow::Result;
use launcher_core::{InstancePool, InstanceSupervisor, Notifier};

use super::Session;

pub async fn run_instances_command(session: &Session) -> Result<()> {
    let pool = session.open_pool(Notifier::log_only()).await?;
    print_instances(&pool);
    Ok(())
}

pub async fn run_add_instance_command(session: &Session) -> Result<()> {
    let mut pool = session.open_pool(Notifier::log_only()).await?;
    let index = pool.add_instance();
    pool.save_state();
    println!("Added instance {} (pool now has {}).", index + 1, pool.len());
    Ok(())
}

fn print_instances(pool: &InstancePool) {
    for supervisor in pool.iter() {
        println!("{}", supervisor.snapshot());
        print_settings(supervisor);
    }
}

fn print_settings(supervisor: &InstanceSupervisor) {
    let settings = supervisor.settings();
    println!("    output:  {}", display_or_dash(&settings.output_dir));
    println!("    archive: {}", display_or_dash(&settings.archive_file));
    println!(
        "    filter:  {}",
        settings.filter_expression().as_deref().unwrap_or("-")
    );
    if !settings.extra_opts.trim().is_empty() {
        println!("    extra:   {}", settings.extra_opts.trim());
    }
}

fn display_or_dash(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() { "-" } else { value }
}
