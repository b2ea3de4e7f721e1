use crate::OutputFormat;
use crate::commands::{RawInput, read_inputs};
use anyhow::{Result, bail};
use grantkeeper_core::validate::ExistingRecords;
use grantkeeper_core::{Record, ValidationResult, Validator};

/// Validation outcome for one raw input
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordValidation {
    pub source: String,
    pub id: Option<String>,
    /// Present when the raw fields mapped into a record
    pub result: Option<ValidationResult>,
    /// Why the raw fields could not be mapped into a record
    pub mapping_error: Option<String>,
}

impl RecordValidation {
    pub fn is_valid(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.valid)
    }
}

/// Map and validate every input without touching the archive
pub fn validate_inputs(
    inputs: &[RawInput],
    validator: &Validator,
    existing: &dyn ExistingRecords,
) -> Vec<RecordValidation> {
    inputs
        .iter()
        .map(|input| match Record::from_fields(&input.fields) {
            Ok(record) => RecordValidation {
                source: input.source.clone(),
                id: Some(record.id().to_string()),
                result: Some(validator.validate_with(&record, existing)),
                mapping_error: None,
            },
            Err(e) => RecordValidation {
                source: input.source.clone(),
                id: input.fields.get("id").cloned(),
                result: None,
                mapping_error: Some(e.to_string()),
            },
        })
        .collect()
}

pub fn execute(
    patterns: &[String],
    validator: &Validator,
    existing: &dyn ExistingRecords,
    format: OutputFormat,
) -> Result<()> {
    tracing::info!("Validating {} input pattern(s)", patterns.len());

    let inputs = read_inputs(patterns)?;
    let validations = validate_inputs(&inputs, validator, existing);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&validations)?),
        OutputFormat::Table => output_table(&validations),
        OutputFormat::Pretty => output_pretty(&validations),
    }

    let failed = validations.iter().filter(|v| !v.is_valid()).count();
    if failed > 0 {
        bail!("{} of {} records failed validation", failed, validations.len());
    }
    Ok(())
}

fn output_pretty(validations: &[RecordValidation]) {
    use console::style;

    println!("\n{}", style("Validation Report").bold().cyan());
    println!("{}", style("=================").cyan());

    for validation in validations {
        let id = validation.id.as_deref().unwrap_or("<no id>");
        println!();
        match (&validation.result, &validation.mapping_error) {
            (Some(result), _) => {
                let verdict = if result.valid {
                    style("VALID").green().bold()
                } else {
                    style("INVALID").red().bold()
                };
                println!("{} {} (score {:.2})", verdict, style(id).bold(), result.score);
                println!("  Source: {}", validation.source);
                for issue in &result.errors {
                    println!("  {} {}: {}", style("error").red(), issue.field, issue.message);
                }
                for issue in &result.warnings {
                    println!("  {} {}: {}", style("warning").yellow(), issue.field, issue.message);
                }
            }
            (None, error) => {
                println!("{} {}", style("UNMAPPABLE").red().bold(), style(id).bold());
                println!("  Source: {}", validation.source);
                if let Some(error) = error {
                    println!("  {}", error);
                }
            }
        }
    }

    let valid = validations.iter().filter(|v| v.is_valid()).count();
    println!(
        "\n{} of {} records valid\n",
        style(valid).bold(),
        validations.len()
    );
}

fn output_table(validations: &[RecordValidation]) {
    println!("Id,Valid,Score,Errors,Warnings,Source");
    for validation in validations {
        let id = validation.id.as_deref().unwrap_or("");
        match &validation.result {
            Some(result) => println!(
                "{},{},{:.3},{},{},{}",
                id,
                result.valid,
                result.score,
                result.errors.len(),
                result.warnings.len(),
                validation.source
            ),
            None => println!("{},false,,,,{}", id, validation.source),
        }
    }
}
