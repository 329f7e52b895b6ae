//! Run command: start instances and drive the orchestrator loop.

use anyhow::Result;
use launcher_core::{Notification, NotificationLevel, Notifier};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use super::{Session, instance_index};
use crate::cli::RunArgs;

pub async fn run_run_command(session: &Session, args: &RunArgs) -> Result<()> {
    let (notifier, mut notifications) = Notifier::channel();
    let mut pool = session.open_pool(notifier).await?;

    let scheduled = if args.instances.is_empty() {
        pool.start_all()
    } else {
        let indices = args
            .instances
            .iter()
            .map(|number| instance_index(*number))
            .collect::<Result<Vec<_>>>()?;
        pool.start_selected(&indices)
    };
    if scheduled == 0 {
        println!("Nothing to start: no idle instance has pending URLs.");
        return Ok(());
    }
    info!(scheduled, "starting instances");

    let mut interval = tokio::time::interval(pool.config().poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                pool.tick().await;
                print_pending(&mut notifications);
                if !pool.is_active() {
                    break;
                }
            }
            signal = &mut ctrl_c, if !stopping => {
                if let Err(error) = signal {
                    warn!(%error, "failed to listen for Ctrl-C");
                }
                stopping = true;
                let stops = pool.stop_all();
                println!("Stopping {stops} running instance(s)...");
            }
        }
    }

    pool.shutdown().await;
    print_pending(&mut notifications);

    for snapshot in pool.status() {
        println!("{snapshot}");
    }
    Ok(())
}

fn print_pending(notifications: &mut UnboundedReceiver<Notification>) {
    while let Ok(notification) = notifications.try_recv() {
        match notification.level {
            NotificationLevel::Error => eprintln!("{notification}"),
            NotificationLevel::Info | NotificationLevel::Success => println!("{notification}"),
        }
    }
}
