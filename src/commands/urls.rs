//! Pending-list commands: add, remove, duplicate check and domain filter.

use anyhow::{Context, Result};
use launcher_core::{DuplicateMatches, InstancePool, MatchKind, Notifier};
use tracing::debug;

use super::{Session, instance_index};
use crate::cli::{AddArgs, RemoveArgs};

pub async fn run_add_command(session: &Session, args: &AddArgs) -> Result<()> {
    let mut pool = session.open_pool(Notifier::log_only()).await?;
    let target = args.instance.map(instance_index).transpose()?;

    let mut added = 0_usize;
    for url in args.urls.iter().map(|url| url.trim()).filter(|url| !url.is_empty()) {
        let matches = pool.search(url);
        print_matches(url, &matches);
        if !args.force && matches.values().any(|kind| *kind == MatchKind::Exact) {
            println!("Skipped {url}: already pending (use --force to add anyway)");
            continue;
        }

        let (index, was_added) = match target {
            Some(index) => (index, pool.add_url(index, url)?),
            None => {
                let placement = pool
                    .submit_url(url)
                    .with_context(|| format!("Could not place {url}"))?;
                (placement.index, placement.added)
            }
        };
        if was_added {
            added += 1;
            println!("Added {url} to instance {}", index + 1);
        } else {
            println!("Instance {} already has {url}", index + 1);
        }
    }

    pool.save_state();
    debug!(added, "add command finished");
    Ok(())
}

pub async fn run_remove_command(session: &Session, args: &RemoveArgs) -> Result<()> {
    let mut pool = session.open_pool(Notifier::log_only()).await?;
    let index = instance_index(args.instance)?;
    if pool.remove_url(index, args.url.trim())? {
        println!("Removed {} from instance {}", args.url.trim(), index + 1);
    } else {
        println!("Instance {} does not have {}", index + 1, args.url.trim());
    }
    Ok(())
}

pub async fn run_check_command(session: &Session, urls: &[String]) -> Result<()> {
    let pool = session.open_pool(Notifier::log_only()).await?;
    for (url, matches) in pool.check_bulk(urls) {
        if matches.is_empty() {
            println!("{url}: not pending");
        } else {
            print_matches(&url, &matches);
        }
    }
    Ok(())
}

pub async fn run_filter_domain_command(session: &Session, domain: &str) -> Result<()> {
    let pool = session.open_pool(Notifier::log_only()).await?;
    print_domain_filter(&pool, domain);
    Ok(())
}

fn print_domain_filter(pool: &InstancePool, domain: &str) {
    let filtered = pool.filter_by_domain(domain);
    if filtered.is_empty() {
        println!("No pending URLs match '{}'.", domain.trim());
        return;
    }
    for (index, urls) in filtered {
        println!("Instance {} ({} URLs):", index + 1, urls.len());
        for url in urls {
            println!("    {url}");
        }
    }
}

fn print_matches(url: &str, matches: &DuplicateMatches) {
    for (index, kind) in matches {
        println!("{url}: {kind} in instance {}", index + 1);
    }
}
