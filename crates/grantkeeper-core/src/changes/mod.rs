mod log;

pub use log::{ChangeLog, ChangeLogEntry};

use crate::record::Record;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields compared between two versions of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedField {
    Deadline,
    Amount,
    Status,
    Title,
    Url,
}

impl TrackedField {
    pub const ALL: [TrackedField; 5] = [
        TrackedField::Deadline,
        TrackedField::Amount,
        TrackedField::Status,
        TrackedField::Title,
        TrackedField::Url,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedField::Deadline => "deadline",
            TrackedField::Amount => "amount",
            TrackedField::Status => "status",
            TrackedField::Title => "title",
            TrackedField::Url => "url",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            TrackedField::Deadline => Severity::High,
            TrackedField::Amount => Severity::Medium,
            _ => Severity::Low,
        }
    }

    fn value_of(&self, record: &Record) -> Option<String> {
        match self {
            TrackedField::Deadline => record.deadline.map(|d| d.format("%Y-%m-%d").to_string()),
            TrackedField::Amount => record.amount.clone(),
            TrackedField::Status => Some(record.status().as_str().to_string()),
            TrackedField::Title => record.title.clone(),
            TrackedField::Url => record.url.clone(),
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// One field-level difference between two versions of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub field: TrackedField,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub severity: Severity,
}

/// Compare the tracked fields of two versions of the same record
///
/// Results are ordered by severity (highest first), then by field name.
/// Fails with `MismatchedId` when the records do not share an id.
pub fn detect_changes(old: &Record, new: &Record) -> Result<Vec<ChangeEntry>> {
    if old.id() != new.id() {
        return Err(Error::MismatchedId {
            old: old.id().to_string(),
            new: new.id().to_string(),
        });
    }

    let mut changes: Vec<ChangeEntry> = TrackedField::ALL
        .iter()
        .filter_map(|field| {
            let old_value = field.value_of(old);
            let new_value = field.value_of(new);
            (old_value != new_value).then(|| ChangeEntry {
                field: *field,
                old_value,
                new_value,
                severity: field.severity(),
            })
        })
        .collect();

    changes.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.field.as_str().cmp(b.field.as_str()))
    });

    tracing::debug!("Detected {} changes for record {}", changes.len(), new.id());
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn record(id: &str) -> Record {
        let mut record = Record::new(id, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()).unwrap();
        record.title = Some("Community Grant".to_string());
        record.amount = Some("$1,500".to_string());
        record.deadline = NaiveDate::from_ymd_opt(2099, 1, 1);
        record.url = Some("https://example.org/s1".to_string());
        record
    }

    #[test]
    fn test_identical_records_have_no_changes() {
        let r = record("s1");
        assert!(detect_changes(&r, &r).unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_ids_fail() {
        let err = detect_changes(&record("s1"), &record("s2")).unwrap_err();
        assert!(matches!(err, Error::MismatchedId { .. }));
    }

    #[test]
    fn test_amount_change_is_medium() {
        let old = record("s1");
        let mut new = old.clone();
        new.amount = Some("$2,000".to_string());

        let changes = detect_changes(&old, &new).unwrap();
        assert_eq!(
            changes,
            vec![ChangeEntry {
                field: TrackedField::Amount,
                old_value: Some("$1,500".to_string()),
                new_value: Some("$2,000".to_string()),
                severity: Severity::Medium,
            }]
        );
    }

    #[test]
    fn test_ordering_by_severity_then_name() {
        let old = record("s1");
        let mut new = old.clone();
        new.url = Some("https://example.org/other".to_string());
        new.title = Some("Community Grant 2025".to_string());
        new.amount = None;
        new.deadline = NaiveDate::from_ymd_opt(2099, 2, 1);

        let fields: Vec<&str> = detect_changes(&old, &new)
            .unwrap()
            .iter()
            .map(|c| c.field.as_str())
            .collect();
        assert_eq!(fields, vec!["deadline", "amount", "title", "url"]);
    }

    #[test]
    fn test_untracked_fields_ignored() {
        let old = record("s1");
        let mut new = old.clone();
        new.description = Some("Now with a description".to_string());
        new.tags.insert("stem".to_string());
        assert!(detect_changes(&old, &new).unwrap().is_empty());
    }

    #[test]
    fn test_status_change_detected() {
        let old = record("s1");
        let mut new = old.clone();
        new.cancel();
        let changes = detect_changes(&old, &new).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, TrackedField::Status);
        assert_eq!(changes[0].severity, Severity::Low);
        assert_eq!(changes[0].new_value.as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_change_entry_json_shape() {
        let entry = ChangeEntry {
            field: TrackedField::Amount,
            old_value: Some("$1,500".to_string()),
            new_value: Some("$2,000".to_string()),
            severity: Severity::Medium,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["field"], "amount");
        assert_eq!(json["oldValue"], "$1,500");
        assert_eq!(json["severity"], "medium");
    }
}
