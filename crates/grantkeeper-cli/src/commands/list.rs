use crate::OutputFormat;
use crate::commands::open_archive;
use anyhow::Result;
use grantkeeper_core::archive::{ArchiveIndex, IndexEntry, ListFilter};
use grantkeeper_core::store::RecordStore;
use grantkeeper_core::RecordStatus;
use std::path::Path;

/// Build a filter from CLI values
pub fn build_filter(status: Option<&str>, category: Option<&str>) -> Result<ListFilter> {
    let mut filter = ListFilter::new();
    if let Some(status) = status {
        filter = filter.with_status(status.parse::<RecordStatus>()?);
    }
    if let Some(category) = category {
        filter = filter.with_category(category);
    }
    Ok(filter)
}

pub fn list_entries<S: RecordStore>(index: &ArchiveIndex<S>, filter: ListFilter) -> Vec<IndexEntry> {
    index.list(filter).iter().cloned().collect()
}

pub fn execute(
    archive: Option<&Path>,
    status: Option<&str>,
    category: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let filter = build_filter(status, category)?;
    let index = open_archive(archive)?;
    let entries = list_entries(&index, filter);
    tracing::debug!("Listing {} of {} records", entries.len(), index.len());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Table => output_table(&entries),
        OutputFormat::Pretty => output_pretty(&entries),
    }
    Ok(())
}

fn output_pretty(entries: &[IndexEntry]) {
    use console::style;

    if entries.is_empty() {
        println!("No records match.");
        return;
    }

    for entry in entries {
        let status = match entry.status {
            RecordStatus::Active => style(entry.status.as_str()).green(),
            RecordStatus::Upcoming => style(entry.status.as_str()).cyan(),
            RecordStatus::Expired => style(entry.status.as_str()).dim(),
            RecordStatus::Cancelled => style(entry.status.as_str()).red(),
        };
        println!(
            "{:<10} {} - {}",
            status,
            style(&entry.id).bold(),
            entry.title.as_deref().unwrap_or("(untitled)")
        );

        let mut details = Vec::new();
        if let Some(amount) = &entry.amount {
            details.push(amount.clone());
        }
        if let Some(deadline) = entry.deadline {
            details.push(format!("due {}", deadline));
        }
        if let Some(category) = &entry.category {
            details.push(category.clone());
        }
        if !details.is_empty() {
            println!("{:<10} {}", "", style(details.join(" | ")).dim());
        }
    }
    println!("\n{} records", entries.len());
}

fn output_table(entries: &[IndexEntry]) {
    println!("Id,Status,Deadline,Amount,Category,Title");
    for entry in entries {
        println!(
            "{},{},{},\"{}\",{},\"{}\"",
            entry.id,
            entry.status,
            entry.deadline.map(|d| d.to_string()).unwrap_or_default(),
            entry.amount.as_deref().unwrap_or(""),
            entry.category.as_deref().unwrap_or(""),
            entry.title.as_deref().unwrap_or("").replace('"', "'")
        );
    }
}
