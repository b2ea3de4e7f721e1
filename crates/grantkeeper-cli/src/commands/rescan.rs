use crate::OutputFormat;
use crate::commands::open_archive;
use anyhow::Result;
use chrono::{DateTime, Utc};
use grantkeeper_core::archive::RescanReport;
use std::path::Path;

pub fn execute(archive: Option<&Path>, as_of: Option<DateTime<Utc>>, format: OutputFormat) -> Result<()> {
    let now = as_of.unwrap_or_else(Utc::now);
    tracing::info!("Rescanning archive as of {}", now.to_rfc3339());

    let mut index = open_archive(archive)?;
    let report = index.rescan(now)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            println!("Id,From,To");
            for t in &report.transitions {
                println!("{},{},{}", t.id, t.from, t.to);
            }
        }
        OutputFormat::Pretty => output_pretty(&report),
    }
    Ok(())
}

fn output_pretty(report: &RescanReport) {
    use console::style;

    println!(
        "Scanned {} records, {} status changes",
        style(report.scanned).bold(),
        style(report.transitions.len()).bold()
    );
    for t in &report.transitions {
        println!("  {}: {} -> {}", style(&t.id).bold(), t.from, t.to);
    }
}
