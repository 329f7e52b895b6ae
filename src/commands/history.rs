//! History command handler: list, stats, export and clear.

use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result, bail};
use launcher_core::history::export_csv;
use launcher_core::{HistoryQuery, HistoryRecord, RecordStatus};

use super::{Session, instance_index};
use crate::cli::HistoryCommand;

pub async fn run_history_command(session: &Session, command: &HistoryCommand) -> Result<()> {
    let store = session.open_history().await?;

    match command {
        HistoryCommand::List {
            limit,
            status,
            file_type,
            instance,
        } => {
            let query = HistoryQuery {
                status: status.as_deref().map(RecordStatus::from),
                file_type: file_type.clone(),
                instance: instance.map(instance_index).transpose()?,
                limit: *limit,
            };
            let records = store.query_filtered(&query).await?;
            if records.is_empty() {
                println!("No history rows matched the current filters.");
            }
            for record in &records {
                println!("{}", render_history_row(record));
            }
        }
        HistoryCommand::Stats => {
            let stats = store.stats().await?;
            println!("Total downloads: {}", stats.total);
            println!(
                "Successful:      {} ({:.1}%)",
                stats.success,
                stats.success_rate()
            );
            println!("Images:          {}", stats.images);
            println!("Videos:          {}", stats.videos);
            println!("Other:           {}", stats.other());
        }
        HistoryCommand::Export { file } => {
            let records = store.all().await?;
            let handle = File::create(file)
                .with_context(|| format!("Failed to create '{}'", file.display()))?;
            export_csv(&records, BufWriter::new(handle))
                .with_context(|| format!("Failed to export history to '{}'", file.display()))?;
            println!("Exported {} rows to {}", records.len(), file.display());
        }
        HistoryCommand::Clear { yes } => {
            if !*yes {
                bail!("Refusing to clear history without --yes");
            }
            let removed = store.clear().await?;
            println!("Removed {removed} history rows.");
        }
    }

    Ok(())
}

fn render_history_row(record: &HistoryRecord) -> String {
    format!(
        "{}  {:<12}  {:<8}  {:<10}  {}",
        record.timestamp,
        record.instance_label(),
        record.file_type,
        record.status_str,
        record.url
    )
}
