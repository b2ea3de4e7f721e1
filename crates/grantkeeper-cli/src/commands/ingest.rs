use crate::OutputFormat;
use crate::commands::{RawInput, open_archive, read_inputs};
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use grantkeeper_core::archive::{ArchiveIndex, UpsertOptions};
use grantkeeper_core::changes::ChangeLog;
use grantkeeper_core::store::RecordStore;
use grantkeeper_core::validate::{NoExisting, ValidationIssue};
use grantkeeper_core::{ChangeEntry, Record, RecordStatus, Validator};
use std::path::Path;

/// A record that made it into the archive
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedRecord {
    pub id: String,
    pub created: bool,
    pub status: RecordStatus,
    pub score: f64,
    pub warnings: Vec<ValidationIssue>,
    pub changes: Vec<ChangeEntry>,
}

/// A record that was turned away, and why
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    pub source: String,
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IngestReport {
    pub ingested: Vec<IngestedRecord>,
    pub rejected: Vec<RejectedRecord>,
}

/// Options controlling an ingest run
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions<'a> {
    pub overwrite: bool,
    pub change_log: Option<&'a Path>,
    pub now: DateTime<Utc>,
}

/// Map, certify and archive each input
///
/// Each record is handled on its own: one rejection does not stop the rest.
pub fn ingest_inputs<S: RecordStore>(
    inputs: &[RawInput],
    index: &mut ArchiveIndex<S>,
    validator: &Validator,
    options: IngestOptions<'_>,
) -> Result<IngestReport> {
    let log = options.change_log.map(ChangeLog::new);
    let mut report = IngestReport::default();

    for input in inputs {
        let mut record = match Record::from_fields(&input.fields) {
            Ok(record) => record,
            Err(e) => {
                report.rejected.push(RejectedRecord {
                    source: input.source.clone(),
                    id: input.fields.get("id").cloned(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let id = record.id().to_string();

        // An explicit overwrite confirms the id reuse, so only the pure rules apply
        let result = if options.overwrite {
            validator.certify(&mut record, &NoExisting)
        } else {
            validator.certify(&mut record, &*index)
        };
        if !result.valid {
            let reason = result
                .errors
                .iter()
                .map(|issue| format!("{}: {}", issue.field, issue.message))
                .collect::<Vec<_>>()
                .join("; ");
            report.rejected.push(RejectedRecord {
                source: input.source.clone(),
                id: Some(id),
                reason,
            });
            continue;
        }

        let upsert = UpsertOptions {
            overwrite: options.overwrite,
            now: options.now,
        };
        match index.upsert_with(record, upsert) {
            Ok(outcome) => {
                let mut warnings = result.warnings;
                // The record is already archived; a log failure must not hide that
                if let Some(log) = &log
                    && let Err(e) = log.append(&id, options.now, &outcome.changes)
                {
                    tracing::warn!("Failed to log changes for {}: {}", id, e);
                    warnings.push(ValidationIssue::new(
                        "changeLog",
                        format!("Changes were not written to {}: {}", log.path().display(), e),
                    ));
                }
                report.ingested.push(IngestedRecord {
                    id,
                    created: outcome.created,
                    status: outcome.entry.status,
                    score: result.score,
                    warnings,
                    changes: outcome.changes,
                });
            }
            Err(e) if e.is_recoverable() => {
                report.rejected.push(RejectedRecord {
                    source: input.source.clone(),
                    id: Some(id),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        "Ingest complete: {} archived, {} rejected",
        report.ingested.len(),
        report.rejected.len()
    );
    Ok(report)
}

pub fn execute(
    patterns: &[String],
    archive: Option<&Path>,
    validator: &Validator,
    overwrite: bool,
    change_log: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let inputs = read_inputs(patterns)?;
    let mut index = open_archive(archive)?;

    let report = ingest_inputs(
        &inputs,
        &mut index,
        validator,
        IngestOptions {
            overwrite,
            change_log,
            now: Utc::now(),
        },
    )?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => output_table(&report),
        OutputFormat::Pretty => output_pretty(&report),
    }

    if !report.rejected.is_empty() {
        bail!(
            "{} of {} records rejected",
            report.rejected.len(),
            inputs.len()
        );
    }
    Ok(())
}

fn output_pretty(report: &IngestReport) {
    use console::style;

    println!("\n{}", style("Ingest Report").bold().cyan());
    println!("{}", style("=============").cyan());

    for record in &report.ingested {
        let action = if record.created { "added" } else { "updated" };
        println!(
            "\n{} {} ({}, {}, score {:.2})",
            style("✓").green(),
            style(&record.id).bold(),
            action,
            record.status,
            record.score
        );
        for warning in &record.warnings {
            println!("  {} {}: {}", style("warning").yellow(), warning.field, warning.message);
        }
        for change in &record.changes {
            println!(
                "  [{}] {}: {} -> {}",
                change.severity.as_str(),
                change.field,
                change.old_value.as_deref().unwrap_or("(none)"),
                change.new_value.as_deref().unwrap_or("(none)")
            );
        }
    }

    for rejected in &report.rejected {
        println!(
            "\n{} {} ({})",
            style("✗").red(),
            style(rejected.id.as_deref().unwrap_or("<no id>")).bold(),
            rejected.source
        );
        println!("  {}", rejected.reason);
    }

    println!(
        "\n{} archived, {} rejected\n",
        style(report.ingested.len()).bold(),
        style(report.rejected.len()).bold()
    );
}

fn output_table(report: &IngestReport) {
    println!("Id,Result,Status,Score,Changes,Detail");
    for record in &report.ingested {
        println!(
            "{},{},{},{:.3},{},",
            record.id,
            if record.created { "added" } else { "updated" },
            record.status,
            record.score,
            record.changes.len()
        );
    }
    for rejected in &report.rejected {
        println!(
            "{},rejected,,,,\"{}\"",
            rejected.id.as_deref().unwrap_or(""),
            rejected.reason.replace('"', "'")
        );
    }
}
