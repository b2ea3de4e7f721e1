mod listing;
mod shared;

pub use listing::{ListFilter, Listing};
pub use shared::SharedArchive;

use crate::changes::{ChangeEntry, detect_changes};
use crate::record::{Record, RecordStatus};
use crate::store::RecordStore;
use crate::validate::ExistingRecords;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category bucket for records without one
pub const UNCATEGORIZED: &str = "uncategorized";

/// Denormalized projection of a stored record, kept for fast listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub id: String,
    pub title: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub amount: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub status: RecordStatus,
    pub storage_location: String,
}

impl IndexEntry {
    pub fn project(record: &Record, storage_location: String) -> Self {
        Self {
            id: record.id().to_string(),
            title: record.title.clone(),
            deadline: record.deadline,
            amount: record.amount.clone(),
            url: record.url.clone(),
            category: record.category.clone(),
            status: record.status(),
            storage_location,
        }
    }
}

/// Aggregate counts over the archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
    pub upcoming: usize,
    pub cancelled: usize,
    pub by_category: BTreeMap<String, usize>,
}

impl ArchiveStats {
    fn compute<'a>(entries: impl Iterator<Item = &'a IndexEntry>) -> Self {
        let mut stats = ArchiveStats::default();
        for entry in entries {
            stats.total += 1;
            match entry.status {
                RecordStatus::Active => stats.active += 1,
                RecordStatus::Expired => stats.expired += 1,
                RecordStatus::Upcoming => stats.upcoming += 1,
                RecordStatus::Cancelled => stats.cancelled += 1,
            }
            let category = entry
                .category
                .clone()
                .unwrap_or_else(|| UNCATEGORIZED.to_string());
            *stats.by_category.entry(category).or_insert(0) += 1;
        }
        stats
    }
}

/// Options for a single write
#[derive(Debug, Clone, Copy)]
pub struct UpsertOptions {
    /// Replace a stored record even when its title or URL differs
    pub overwrite: bool,
    /// Reference time for status derivation
    pub now: DateTime<Utc>,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            now: Utc::now(),
        }
    }
}

/// What a successful upsert did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertOutcome {
    pub entry: IndexEntry,
    pub created: bool,
    /// Differences from the previously stored version, if there was one
    pub changes: Vec<ChangeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub id: String,
    pub from: RecordStatus,
    pub to: RecordStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescanReport {
    pub scanned: usize,
    pub transitions: Vec<StatusTransition>,
}

/// Index of archived records over a persistence backend
///
/// The index exclusively owns the id to storage location mapping. Every
/// mutation writes the store first and only then touches the in-memory
/// projection, so a failed write leaves the index unchanged.
pub struct ArchiveIndex<S: RecordStore> {
    store: S,
    entries: BTreeMap<String, IndexEntry>,
    stats: ArchiveStats,
}

impl<S: RecordStore> ArchiveIndex<S> {
    /// Open an index over `store`, rebuilding projections from its contents
    pub fn open(store: S) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for key in store.list_keys()? {
            let record = store
                .get(&key)?
                .ok_or_else(|| Error::Storage(format!("Listed key '{}' has no document", key)))?;
            if record.id() != key {
                return Err(Error::Storage(format!(
                    "Document stored under '{}' holds record '{}'",
                    key,
                    record.id()
                )));
            }
            let location = store.location(&key);
            entries.insert(key, IndexEntry::project(&record, location));
        }

        let stats = ArchiveStats::compute(entries.values());
        tracing::info!("Opened archive index with {} records", stats.total);

        Ok(Self {
            store,
            entries,
            stats,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn stats(&self) -> &ArchiveStats {
        &self.stats
    }

    /// Store a certified record, deriving its status as of now
    pub fn upsert(&mut self, record: Record) -> Result<UpsertOutcome> {
        self.upsert_with(record, UpsertOptions::default())
    }

    pub fn upsert_at(&mut self, record: Record, now: DateTime<Utc>) -> Result<UpsertOutcome> {
        self.upsert_with(
            record,
            UpsertOptions {
                now,
                ..UpsertOptions::default()
            },
        )
    }

    /// Store a certified record
    ///
    /// Fails with `Validation` if the record has not passed validation since
    /// its last edit, and with `DuplicateConflict` if a stored record with
    /// the same id has a different title or URL and `overwrite` is off.
    pub fn upsert_with(&mut self, mut record: Record, options: UpsertOptions) -> Result<UpsertOutcome> {
        let id = record.id().to_string();
        tracing::debug!("Upserting record {}", id);

        if !record.is_certified() {
            tracing::warn!("Rejected write of unvalidated record {}", id);
            return Err(Error::Validation(format!(
                "Record '{}' has not passed validation",
                id
            )));
        }

        if let Some(existing) = self.entries.get(&id)
            && !options.overwrite
        {
            let mut differing = Vec::new();
            if existing.title != record.title {
                differing.push("title");
            }
            if existing.url != record.url {
                differing.push("url");
            }
            if !differing.is_empty() {
                tracing::warn!("Rejected conflicting write for record {}", id);
                return Err(Error::DuplicateConflict {
                    id,
                    reason: format!("stored record has a different {}", differing.join(" and ")),
                });
            }
        }

        let previous = if self.entries.contains_key(&id) {
            self.store.get(&id)?
        } else {
            None
        };

        record.derive_status(previous.as_ref().map(Record::status), options.now);

        let changes = match &previous {
            Some(old) => detect_changes(old, &record)?,
            None => Vec::new(),
        };

        let location = self.store.put(&id, &record)?;
        let entry = IndexEntry::project(&record, location);
        let created = self.entries.insert(id.clone(), entry.clone()).is_none();
        self.recompute_stats();

        tracing::info!(
            "{} record {} ({}, {} changes)",
            if created { "Archived" } else { "Updated" },
            id,
            entry.status,
            changes.len()
        );

        Ok(UpsertOutcome {
            entry,
            created,
            changes,
        })
    }

    /// Load the full stored record
    pub fn get(&self, id: &str) -> Result<Record> {
        if !self.entries.contains_key(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        self.store
            .get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Projection for `id`, if archived
    pub fn entry(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// Lazy view over the projections matching `filter`
    pub fn list(&self, filter: ListFilter) -> Listing<'_> {
        Listing::new(&self.entries, filter)
    }

    /// Delete a record from the store and the index
    pub fn remove(&mut self, id: &str) -> Result<IndexEntry> {
        if !self.entries.contains_key(id) {
            return Err(Error::NotFound(id.to_string()));
        }

        if !self.store.delete(id)? {
            tracing::warn!("Record {} was indexed but missing from the store", id);
        }

        let entry = self
            .entries
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        self.recompute_stats();

        tracing::info!("Removed record {}", id);
        Ok(entry)
    }

    /// Apply the explicit cancellation signal to a stored record
    pub fn cancel(&mut self, id: &str) -> Result<UpsertOutcome> {
        let mut record = self.get(id)?;
        let before = record.clone();
        record.cancel();

        let changes = detect_changes(&before, &record)?;
        let location = self.store.put(id, &record)?;
        let entry = IndexEntry::project(&record, location);
        self.entries.insert(id.to_string(), entry.clone());
        self.recompute_stats();

        tracing::info!("Cancelled record {}", id);
        Ok(UpsertOutcome {
            entry,
            created: false,
            changes,
        })
    }

    /// Re-derive every record's status as of `now`, persisting the ones that moved
    pub fn rescan(&mut self, now: DateTime<Utc>) -> Result<RescanReport> {
        tracing::debug!("Rescanning {} records", self.entries.len());

        let ids: Vec<String> = self.entries.keys().cloned().collect();
        let mut report = RescanReport {
            scanned: ids.len(),
            transitions: Vec::new(),
        };

        // Transitions persisted before a failure stay applied, so the
        // counts are rebuilt before the error is returned
        let applied = self.apply_transitions(ids, now, &mut report.transitions);
        self.recompute_stats();
        if let Err(e) = applied {
            tracing::warn!(
                "Rescan stopped after {} transitions: {}",
                report.transitions.len(),
                e
            );
            return Err(e);
        }

        tracing::info!(
            "Rescan complete: {} records, {} transitions",
            report.scanned,
            report.transitions.len()
        );
        Ok(report)
    }

    fn apply_transitions(
        &mut self,
        ids: Vec<String>,
        now: DateTime<Utc>,
        transitions: &mut Vec<StatusTransition>,
    ) -> Result<()> {
        for id in ids {
            let mut record = self.get(&id)?;
            let from = record.status();
            if !record.refresh_status(now) {
                continue;
            }

            let location = self.store.put(&id, &record)?;
            self.entries
                .insert(id.clone(), IndexEntry::project(&record, location));
            transitions.push(StatusTransition {
                id,
                from,
                to: record.status(),
            });
        }
        Ok(())
    }

    fn recompute_stats(&mut self) {
        self.stats = ArchiveStats::compute(self.entries.values());
    }
}

impl<S: RecordStore> ExistingRecords for ArchiveIndex<S> {
    fn existing(&self, id: &str) -> Option<IndexEntry> {
        self.entries.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{Severity, TrackedField};
    use crate::record::RawFields;
    use crate::store::{JsonDirStore, MemoryStore};
    use crate::validate::{NoExisting, Validator};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn raw(pairs: &[(&str, &str)]) -> Record {
        let fields: RawFields = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Record::from_fields(&fields).unwrap()
    }

    fn community_grant() -> Record {
        raw(&[
            ("id", "s1"),
            ("title", "Community Grant"),
            ("amount", "$1,500"),
            ("deadline", "2099-01-01"),
            ("url", "https://example.org/s1"),
            ("collectionDate", "2024-01-01"),
            ("category", "community"),
        ])
    }

    fn certified(mut record: Record) -> Record {
        let result = Validator::default().certify(&mut record, &NoExisting);
        assert!(result.valid, "fixture should validate: {:?}", result.errors);
        record
    }

    fn index() -> ArchiveIndex<MemoryStore> {
        ArchiveIndex::open(MemoryStore::new()).unwrap()
    }

    #[test]
    fn test_upsert_then_get() {
        let mut index = index();
        let outcome = index.upsert_at(certified(community_grant()), now()).unwrap();
        assert!(outcome.created);
        assert!(outcome.changes.is_empty());
        assert_eq!(outcome.entry.status, RecordStatus::Active);
        assert_eq!(outcome.entry.storage_location, "memory://s1");

        let stored = index.get("s1").unwrap();
        let original = community_grant();
        assert_eq!(stored.title, original.title);
        assert_eq!(stored.amount, original.amount);
        assert_eq!(stored.deadline, original.deadline);
        assert_eq!(stored.url, original.url);
        assert_eq!(stored.quality_score(), Some(1.0));
    }

    #[test]
    fn test_upsert_rejects_unvalidated_record() {
        let mut index = index();
        let err = index.upsert_at(community_grant(), now()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(index.is_empty());
    }

    #[test]
    fn test_upsert_rejects_record_edited_after_validation() {
        let mut index = index();
        let mut record = certified(community_grant());
        record.title = None;
        assert!(matches!(
            index.upsert_at(record, now()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_update_reports_amount_change() {
        let mut index = index();
        index.upsert_at(certified(community_grant()), now()).unwrap();

        let mut raised = community_grant();
        raised.amount = Some("$2,000".to_string());
        let outcome = index.upsert_at(certified(raised), now()).unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].field, TrackedField::Amount);
        assert_eq!(outcome.changes[0].old_value.as_deref(), Some("$1,500"));
        assert_eq!(outcome.changes[0].new_value.as_deref(), Some("$2,000"));
        assert_eq!(outcome.changes[0].severity, Severity::Medium);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_conflicting_title_requires_overwrite() {
        let mut index = index();
        index.upsert_at(certified(community_grant()), now()).unwrap();

        let mut other = community_grant();
        other.title = Some("Completely Different Award".to_string());
        let other = certified(other);

        let err = index.upsert_at(other.clone(), now()).unwrap_err();
        assert!(matches!(err, Error::DuplicateConflict { .. }));
        assert_eq!(
            index.get("s1").unwrap().title.as_deref(),
            Some("Community Grant")
        );

        let outcome = index
            .upsert_with(
                other,
                UpsertOptions {
                    overwrite: true,
                    now: now(),
                },
            )
            .unwrap();
        assert_eq!(outcome.changes[0].field, TrackedField::Title);
    }

    #[test]
    fn test_remove_then_get_is_not_found() {
        let mut index = index();
        index.upsert_at(certified(community_grant()), now()).unwrap();

        index.remove("s1").unwrap();
        assert!(matches!(index.get("s1"), Err(Error::NotFound(_))));
        assert!(matches!(index.remove("s1"), Err(Error::NotFound(_))));
        assert_eq!(index.stats().total, 0);
    }

    #[test]
    fn test_stats_and_listing() {
        let mut index = index();
        index.upsert_at(certified(community_grant()), now()).unwrap();
        index
            .upsert_at(
                certified(raw(&[
                    ("id", "s2"),
                    ("title", "Past Fellowship"),
                    ("deadline", "2024-03-01"),
                    ("collectionDate", "2024-01-01"),
                    ("category", "research"),
                ])),
                now(),
            )
            .unwrap();
        index
            .upsert_at(
                certified(raw(&[
                    ("id", "s3"),
                    ("title", "Future Bursary"),
                    ("applicationOpens", "2024-09-01"),
                    ("collectionDate", "2024-01-01"),
                ])),
                now(),
            )
            .unwrap();

        let stats = index.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.upcoming, 1);
        assert_eq!(stats.by_category.get(UNCATEGORIZED), Some(&1));
        assert_eq!(stats.by_category.get("research"), Some(&1));

        let expired: Vec<&str> = index
            .list(ListFilter::new().with_status(RecordStatus::Expired))
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(expired, vec!["s2"]);

        let community = index.list(ListFilter::new().with_category("Community"));
        assert_eq!(community.iter().count(), 1);
        // Restartable
        assert_eq!(community.iter().count(), 1);

        assert_eq!(index.list(ListFilter::new()).iter().count(), 3);
    }

    #[test]
    fn test_rescan_expires_records() {
        let mut index = index();
        index
            .upsert_at(
                certified(raw(&[
                    ("id", "s1"),
                    ("title", "Spring Scholarship"),
                    ("deadline", "2024-07-01"),
                    ("applicationOpens", "2024-06-15"),
                    ("collectionDate", "2024-01-01"),
                ])),
                now(),
            )
            .unwrap();
        assert_eq!(index.entry("s1").unwrap().status, RecordStatus::Upcoming);

        let june = Utc.with_ymd_and_hms(2024, 6, 20, 0, 0, 0).unwrap();
        let report = index.rescan(june).unwrap();
        assert_eq!(report.transitions.len(), 1);
        assert_eq!(report.transitions[0].to, RecordStatus::Active);

        let august = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        let report = index.rescan(august).unwrap();
        assert_eq!(report.transitions[0].from, RecordStatus::Active);
        assert_eq!(report.transitions[0].to, RecordStatus::Expired);
        assert_eq!(index.stats().expired, 1);

        // Idempotent once settled
        assert!(index.rescan(august).unwrap().transitions.is_empty());
    }

    #[test]
    fn test_cancel_is_explicit_and_sticky() {
        let mut index = index();
        index.upsert_at(certified(community_grant()), now()).unwrap();

        let outcome = index.cancel("s1").unwrap();
        assert_eq!(outcome.entry.status, RecordStatus::Cancelled);
        assert_eq!(outcome.changes[0].field, TrackedField::Status);

        // A resubmitted version stays cancelled
        let outcome = index.upsert_at(certified(community_grant()), now()).unwrap();
        assert_eq!(outcome.entry.status, RecordStatus::Cancelled);

        let later = Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap();
        assert!(index.rescan(later).unwrap().transitions.is_empty());
        assert!(matches!(index.cancel("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_duplicate_rule_reads_index() {
        let mut index = index();
        index.upsert_at(certified(community_grant()), now()).unwrap();

        let mut other = community_grant();
        other.url = Some("https://example.org/elsewhere".to_string());
        let result = Validator::default().certify(&mut other, &index);
        assert!(result.has_error_on("id"));
        assert!(matches!(
            index.upsert_at(other, now()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_reopen_json_archive() {
        let dir = TempDir::new().unwrap();
        {
            let mut index = ArchiveIndex::open(JsonDirStore::open(dir.path()).unwrap()).unwrap();
            index.upsert_at(certified(community_grant()), now()).unwrap();
        }

        let index = ArchiveIndex::open(JsonDirStore::open(dir.path()).unwrap()).unwrap();
        assert_eq!(index.len(), 1);
        let entry = index.entry("s1").unwrap();
        assert!(entry.storage_location.ends_with("s1.json"));
        assert_eq!(entry.status, RecordStatus::Active);
        assert_eq!(index.stats().by_category.get("community"), Some(&1));
    }

    /// Store whose writes always fail
    struct FailingStore(MemoryStore);

    impl RecordStore for FailingStore {
        fn get(&self, id: &str) -> Result<Option<Record>> {
            self.0.get(id)
        }

        fn put(&mut self, _id: &str, _record: &Record) -> Result<String> {
            Err(Error::Storage("disk full".to_string()))
        }

        fn delete(&mut self, _id: &str) -> Result<bool> {
            Err(Error::Storage("disk full".to_string()))
        }

        fn list_keys(&self) -> Result<Vec<String>> {
            self.0.list_keys()
        }

        fn location(&self, id: &str) -> String {
            self.0.location(id)
        }
    }

    /// Store that accepts a fixed number of writes, then fails
    struct LimitedStore {
        inner: MemoryStore,
        writes_left: usize,
    }

    impl RecordStore for LimitedStore {
        fn get(&self, id: &str) -> Result<Option<Record>> {
            self.inner.get(id)
        }

        fn put(&mut self, id: &str, record: &Record) -> Result<String> {
            if self.writes_left == 0 {
                return Err(Error::Storage("disk full".to_string()));
            }
            self.writes_left -= 1;
            self.inner.put(id, record)
        }

        fn delete(&mut self, id: &str) -> Result<bool> {
            self.inner.delete(id)
        }

        fn list_keys(&self) -> Result<Vec<String>> {
            self.inner.list_keys()
        }

        fn location(&self, id: &str) -> String {
            self.inner.location(id)
        }
    }

    #[test]
    fn test_partial_rescan_keeps_stats_in_sync() {
        let mut seeded = MemoryStore::new();
        for id in ["s1", "s2"] {
            let mut record = certified(raw(&[
                ("id", id),
                ("title", "Summer Scholarship"),
                ("deadline", "2024-07-01"),
                ("collectionDate", "2024-01-01"),
            ]));
            record.derive_status(None, now());
            seeded.put(id, &record).unwrap();
        }

        let store = LimitedStore {
            inner: seeded,
            writes_left: 1,
        };
        let mut index = ArchiveIndex::open(store).unwrap();
        assert_eq!(index.stats().active, 2);

        let later = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(index.rescan(later).is_err());

        let expired = index
            .list(ListFilter::new().with_status(RecordStatus::Expired))
            .iter()
            .count();
        assert_eq!(expired, 1);
        assert_eq!(index.stats().expired, 1);
        assert_eq!(index.stats().active, 1);
        assert_eq!(index.stats().total, 2);
    }

    #[test]
    fn test_inverted_amount_range_never_reaches_store() {
        let mut index = index();
        let mut record = Record::new("s1", now()).unwrap();
        record.title = Some("Community Grant".to_string());
        record.amount_min = Some(5000.0);
        record.amount_max = Some(1000.0);
        record.currency = Some("USD".to_string());

        let result = Validator::default().certify(&mut record, &index);
        assert!(result.has_error_on("amount"));
        assert!(matches!(index.upsert_at(record, now()), Err(Error::Validation(_))));
        assert!(index.is_empty());
    }

    #[test]
    fn test_failed_write_leaves_index_unchanged() {
        let mut seeded = MemoryStore::new();
        let mut record = certified(community_grant());
        record.derive_status(None, now());
        seeded.put("s1", &record).unwrap();

        let mut index = ArchiveIndex::open(FailingStore(seeded)).unwrap();
        let before = index.entry("s1").cloned();

        let mut raised = community_grant();
        raised.amount = Some("$2,000".to_string());
        assert!(index.upsert_at(certified(raised), now()).is_err());
        assert_eq!(index.entry("s1").cloned(), before);

        assert!(index.remove("s1").is_err());
        assert!(index.contains("s1"));
        assert_eq!(index.stats().total, 1);
    }
}
