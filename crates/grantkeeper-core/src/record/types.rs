use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::{Error, Result};

/// Lifecycle status of a record
///
/// Derived from the record's dates; callers cannot set it directly.
/// `Cancelled` is only reachable through [`Record::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Upcoming,
    Active,
    Expired,
    Cancelled,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Upcoming => "upcoming",
            RecordStatus::Active => "active",
            RecordStatus::Expired => "expired",
            RecordStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "upcoming" => Ok(RecordStatus::Upcoming),
            "active" => Ok(RecordStatus::Active),
            "expired" => Ok(RecordStatus::Expired),
            "cancelled" | "canceled" => Ok(RecordStatus::Cancelled),
            other => Err(Error::Validation(format!("Unknown status: {}", other))),
        }
    }
}

/// Outcome of the last validation pass, folded back into the record
///
/// Only stamps issued in this process are sealed. A stamp read back from
/// storage keeps its score but never certifies the record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct ValidationStamp {
    pub valid: bool,
    pub score: f64,
    pub digest: u64,
    #[serde(skip)]
    pub sealed: bool,
}

/// A scholarship or funding opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredRecord")]
pub struct Record {
    /// Stable identifier, the join key for change detection and archival
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_opens: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    collection_date: DateTime<Utc>,
    last_verified: DateTime<Utc>,
    status: RecordStatus,
    #[serde(default)]
    cancelled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validation: Option<ValidationStamp>,
}

impl Record {
    /// Create a bare record collected at `collection_date`
    pub fn new(id: impl Into<String>, collection_date: DateTime<Utc>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::Validation("Record id must not be empty".to_string()));
        }

        Ok(Self {
            id,
            title: None,
            amount: None,
            amount_min: None,
            amount_max: None,
            currency: None,
            deadline: None,
            application_opens: None,
            url: None,
            category: None,
            provider: None,
            description: None,
            tags: BTreeSet::new(),
            collection_date,
            last_verified: collection_date,
            status: RecordStatus::Upcoming,
            cancelled: false,
            validation: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn collection_date(&self) -> DateTime<Utc> {
        self.collection_date
    }

    pub fn last_verified(&self) -> DateTime<Utc> {
        self.last_verified
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Quality score from the most recent validation, if any
    pub fn quality_score(&self) -> Option<f64> {
        self.validation.map(|stamp| stamp.score)
    }

    /// Record a re-verification of the source page
    pub fn mark_verified(&mut self, at: DateTime<Utc>) -> Result<()> {
        if at < self.collection_date {
            return Err(Error::Validation(format!(
                "lastVerified {} is before collectionDate {}",
                at.to_rfc3339(),
                self.collection_date.to_rfc3339()
            )));
        }
        self.last_verified = at;
        Ok(())
    }

    /// Mark the record as cancelled. No automatic transition leaves this state.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.status = RecordStatus::Cancelled;
    }

    /// Apply the automatic lifecycle transitions as of `now`
    ///
    /// Transitions only move forward: `upcoming -> active -> expired`.
    /// Returns true if the status changed.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        let next = match self.status {
            _ if self.cancelled => RecordStatus::Cancelled,
            RecordStatus::Cancelled | RecordStatus::Expired => self.status,
            current => {
                if self.deadline.is_some_and(|d| d < today) {
                    RecordStatus::Expired
                } else if current == RecordStatus::Active || self.opens_by(today) {
                    RecordStatus::Active
                } else {
                    RecordStatus::Upcoming
                }
            }
        };

        let changed = next != self.status;
        self.status = next;
        changed
    }

    /// Derive status for a newly submitted version of a record
    ///
    /// `previous` is the status of the stored version, if one exists.
    /// Cancellation carries over and `active` is never demoted to `upcoming`;
    /// otherwise the status follows this version's own dates.
    pub(crate) fn derive_status(&mut self, previous: Option<RecordStatus>, now: DateTime<Utc>) {
        if previous == Some(RecordStatus::Cancelled) {
            self.cancelled = true;
        }
        if self.cancelled {
            self.status = RecordStatus::Cancelled;
            return;
        }

        let today = now.date_naive();
        self.status = if self.deadline.is_some_and(|d| d < today) {
            RecordStatus::Expired
        } else if self.opens_by(today) || previous == Some(RecordStatus::Active) {
            RecordStatus::Active
        } else {
            RecordStatus::Upcoming
        };
    }

    fn opens_by(&self, today: NaiveDate) -> bool {
        self.application_opens.is_none_or(|opens| today >= opens)
    }

    /// True when the record passed validation and has not been edited since
    pub fn is_certified(&self) -> bool {
        self.validation
            .is_some_and(|stamp| stamp.sealed && stamp.valid && stamp.digest == self.content_digest())
    }

    pub(crate) fn stamp(&mut self, valid: bool, score: f64) {
        self.validation = Some(ValidationStamp {
            valid,
            score,
            digest: self.content_digest(),
            sealed: true,
        });
    }

    /// Hash of the caller-editable content
    ///
    /// Excludes derived state (status, score) and the verification timestamp.
    pub(crate) fn content_digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        self.title.hash(&mut hasher);
        self.amount.hash(&mut hasher);
        self.amount_min.map(f64::to_bits).hash(&mut hasher);
        self.amount_max.map(f64::to_bits).hash(&mut hasher);
        self.currency.hash(&mut hasher);
        self.deadline.hash(&mut hasher);
        self.application_opens.hash(&mut hasher);
        self.url.hash(&mut hasher);
        self.category.hash(&mut hasher);
        self.provider.hash(&mut hasher);
        self.description.hash(&mut hasher);
        self.tags.hash(&mut hasher);
        self.collection_date.hash(&mut hasher);
        hasher.finish()
    }
}

/// On-disk shape of a [`Record`]
///
/// Loading goes through this so derived state is checked against the
/// record's own fields instead of being taken on trust.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    id: String,
    title: Option<String>,
    amount: Option<String>,
    amount_min: Option<f64>,
    amount_max: Option<f64>,
    currency: Option<String>,
    deadline: Option<NaiveDate>,
    application_opens: Option<NaiveDate>,
    url: Option<String>,
    category: Option<String>,
    provider: Option<String>,
    description: Option<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
    collection_date: DateTime<Utc>,
    last_verified: Option<DateTime<Utc>>,
    status: RecordStatus,
    #[serde(default)]
    cancelled: bool,
    validation: Option<ValidationStamp>,
}

impl TryFrom<StoredRecord> for Record {
    type Error = Error;

    fn try_from(stored: StoredRecord) -> Result<Self> {
        let mut record = Record::new(stored.id, stored.collection_date)?;
        record.title = stored.title;
        record.amount = stored.amount;
        record.amount_min = stored.amount_min;
        record.amount_max = stored.amount_max;
        record.currency = stored.currency;
        record.deadline = stored.deadline;
        record.application_opens = stored.application_opens;
        record.url = stored.url;
        record.category = stored.category;
        record.provider = stored.provider;
        record.description = stored.description;
        record.tags = stored.tags;
        if let Some(at) = stored.last_verified {
            record.mark_verified(at)?;
        }

        // Cancellation is sticky in either direction it was recorded
        record.cancelled = stored.cancelled || stored.status == RecordStatus::Cancelled;
        record.status = match stored.status {
            _ if record.cancelled => RecordStatus::Cancelled,
            RecordStatus::Upcoming if record.application_opens.is_none() => RecordStatus::Active,
            status => status,
        };

        record.validation = stored.validation.map(|stamp| ValidationStamp {
            sealed: false,
            ..stamp
        });
        Ok(record)
    }
}
