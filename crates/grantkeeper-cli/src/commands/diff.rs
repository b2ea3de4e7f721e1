use crate::OutputFormat;
use crate::commands::read_raw_file;
use anyhow::{Result, bail};
use grantkeeper_core::{ChangeEntry, Record, Severity, detect_changes};
use std::path::Path;

fn read_single(path: &Path) -> Result<Record> {
    let mut inputs = read_raw_file(path)?;
    if inputs.len() != 1 {
        bail!("{} must contain exactly one record", path.display());
    }
    let input = inputs.remove(0);
    Ok(Record::from_fields(&input.fields)?)
}

/// Compare two raw record files
pub fn diff_files(old: &Path, new: &Path) -> Result<Vec<ChangeEntry>> {
    let old = read_single(old)?;
    let new = read_single(new)?;
    Ok(detect_changes(&old, &new)?)
}

pub fn execute(old: &Path, new: &Path, format: OutputFormat) -> Result<()> {
    tracing::debug!("Comparing {} with {}", old.display(), new.display());
    let changes = diff_files(old, new)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&changes)?),
        OutputFormat::Table => {
            println!("Field,Severity,Old,New");
            for change in &changes {
                println!(
                    "{},{},\"{}\",\"{}\"",
                    change.field,
                    change.severity.as_str(),
                    change.old_value.as_deref().unwrap_or(""),
                    change.new_value.as_deref().unwrap_or("")
                );
            }
        }
        OutputFormat::Pretty => {
            use console::style;

            if changes.is_empty() {
                println!("No changes in tracked fields.");
                return Ok(());
            }
            for change in &changes {
                let severity = match change.severity {
                    Severity::High => style("HIGH  ").red().bold(),
                    Severity::Medium => style("MEDIUM").yellow().bold(),
                    Severity::Low => style("LOW   ").dim(),
                };
                println!(
                    "{} {}: {} -> {}",
                    severity,
                    style(change.field).bold(),
                    change.old_value.as_deref().unwrap_or("(none)"),
                    change.new_value.as_deref().unwrap_or("(none)")
                );
            }
        }
    }
    Ok(())
}
