mod rules;

pub use rules::{AmountRule, DeadlineRule, DuplicateIdRule, TitleRule, UrlRule};

use crate::archive::IndexEntry;
use crate::record::Record;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tunable thresholds and score weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationConfig {
    /// Shortest acceptable title, in characters
    pub min_title_len: usize,
    /// Titles longer than this draw a warning
    pub max_title_len: usize,
    /// Score multiplier applied per error
    pub error_weight: f64,
    /// Score multiplier applied per warning
    pub warning_weight: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_title_len: 5,
            max_title_len: 300,
            error_weight: 0.5,
            warning_weight: 0.85,
        }
    }
}

impl ValidationConfig {
    /// Check that weights lie strictly between 0 and 1 and lengths are ordered
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("errorWeight", self.error_weight),
            ("warningWeight", self.warning_weight),
        ] {
            if !(weight > 0.0 && weight < 1.0) {
                return Err(Error::Config(format!(
                    "{} must be between 0 and 1 (exclusive), got {}",
                    name, weight
                )));
            }
        }
        if self.min_title_len > self.max_title_len {
            return Err(Error::Config(format!(
                "minTitleLen ({}) exceeds maxTitleLen ({})",
                self.min_title_len, self.max_title_len
            )));
        }
        Ok(())
    }
}

/// A single problem found on a record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// What a rule reports, if anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Error(ValidationIssue),
    Warning(ValidationIssue),
}

/// Result of validating one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub score: f64,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Turn a failed result into a `Validation` error listing every problem
    pub fn into_result(self) -> Result<Self> {
        if self.valid {
            return Ok(self);
        }
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|issue| format!("{}: {}", issue.field, issue.message))
            .collect();
        Err(Error::Validation(messages.join("; ")))
    }

    pub fn has_error_on(&self, field: &str) -> bool {
        self.errors.iter().any(|issue| issue.field == field)
    }
}

/// Read access to already-archived records, used by the duplicate id rule
pub trait ExistingRecords {
    fn existing(&self, id: &str) -> Option<IndexEntry>;
}

/// Lookup that never finds anything
pub struct NoExisting;

impl ExistingRecords for NoExisting {
    fn existing(&self, _id: &str) -> Option<IndexEntry> {
        None
    }
}

/// Inputs available to every rule
pub struct RuleContext<'a> {
    pub config: &'a ValidationConfig,
    pub existing: &'a dyn ExistingRecords,
}

pub trait Rule {
    /// Check one aspect of the record, reporting at most one finding
    fn check(&self, record: &Record, ctx: &RuleContext<'_>) -> Option<Finding>;
}

/// Runs every rule against a record and scores the outcome
pub struct Validator {
    config: ValidationConfig,
    rules: Vec<Box<dyn Rule + Send + Sync>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            rules: vec![
                Box::new(TitleRule),
                Box::new(DeadlineRule),
                Box::new(AmountRule),
                Box::new(UrlRule),
                Box::new(DuplicateIdRule),
            ],
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a record on its own; the duplicate id rule finds nothing to compare
    pub fn validate(&self, record: &Record) -> ValidationResult {
        self.validate_with(record, &NoExisting)
    }

    /// Validate a record, checking its id against already-archived records
    pub fn validate_with(&self, record: &Record, existing: &dyn ExistingRecords) -> ValidationResult {
        tracing::debug!("Validating record {}", record.id());

        let ctx = RuleContext {
            config: &self.config,
            existing,
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut score = 1.0;

        // Every rule runs; no short-circuit on the first error
        for rule in &self.rules {
            match rule.check(record, &ctx) {
                Some(Finding::Error(issue)) => {
                    score *= self.config.error_weight;
                    errors.push(issue);
                }
                Some(Finding::Warning(issue)) => {
                    score *= self.config.warning_weight;
                    warnings.push(issue);
                }
                None => {}
            }
        }

        tracing::debug!(
            "Record {} validated: {} errors, {} warnings, score {:.3}",
            record.id(),
            errors.len(),
            warnings.len(),
            score
        );

        ValidationResult {
            valid: errors.is_empty(),
            score,
            errors,
            warnings,
        }
    }

    /// Validate and fold the score back into the record
    ///
    /// A record certified this way can be written to the archive until its
    /// content is next edited.
    pub fn certify(&self, record: &mut Record, existing: &dyn ExistingRecords) -> ValidationResult {
        let result = self.validate_with(record, existing);
        record.stamp(result.valid, result.score);
        result
    }
}

/// Validate a record with the default configuration
pub fn validate(record: &Record) -> ValidationResult {
    Validator::default().validate(record)
}
