use super::{ArchiveIndex, IndexEntry, ListFilter, UpsertOptions, UpsertOutcome};
use crate::record::Record;
use crate::store::RecordStore;
use crate::validate::{ExistingRecords, NoExisting, ValidationResult, Validator};
use crate::{Error, Result};
use std::sync::{Arc, RwLock};

/// Thread-safe handle to an archive index
///
/// Writers are serialized through a single lock while readers proceed
/// concurrently. Each write either fully applies or leaves the index as it
/// was.
pub struct SharedArchive<S: RecordStore> {
    inner: Arc<RwLock<ArchiveIndex<S>>>,
}

impl<S: RecordStore> Clone for SharedArchive<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RecordStore> SharedArchive<S> {
    pub fn new(index: ArchiveIndex<S>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    /// Run `f` with shared read access
    pub fn read<T>(&self, f: impl FnOnce(&ArchiveIndex<S>) -> T) -> Result<T> {
        let guard = self.inner.read().map_err(|_| Error::LockPoisoned)?;
        Ok(f(&guard))
    }

    /// Run `f` with exclusive write access
    pub fn write<T>(&self, f: impl FnOnce(&mut ArchiveIndex<S>) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.write().map_err(|_| Error::LockPoisoned)?;
        f(&mut guard)
    }

    pub fn get(&self, id: &str) -> Result<Record> {
        self.read(|index| index.get(id))?
    }

    /// Snapshot of the entries matching `filter`
    pub fn list(&self, filter: ListFilter) -> Result<Vec<IndexEntry>> {
        self.read(|index| index.list(filter).iter().cloned().collect())
    }

    pub fn upsert(&self, record: Record, options: UpsertOptions) -> Result<UpsertOutcome> {
        self.write(|index| index.upsert_with(record, options))
    }

    pub fn remove(&self, id: &str) -> Result<IndexEntry> {
        self.write(|index| index.remove(id))
    }

    /// Validate against the archive and store in one critical section
    ///
    /// No other writer can slip a colliding id in between the duplicate
    /// check and the write. Returns the validation result alongside the
    /// outcome so callers can report warnings.
    pub fn certify_and_upsert(
        &self,
        validator: &Validator,
        mut record: Record,
        options: UpsertOptions,
    ) -> Result<(ValidationResult, UpsertOutcome)> {
        self.write(|index| {
            let result = if options.overwrite {
                validator.certify(&mut record, &NoExisting)
            } else {
                validator.certify(&mut record, &*index)
            };
            let result = result.into_result()?;
            let outcome = index.upsert_with(record, options)?;
            Ok((result, outcome))
        })
    }
}

impl<S: RecordStore> ExistingRecords for SharedArchive<S> {
    fn existing(&self, id: &str) -> Option<IndexEntry> {
        match self.read(|index| index.existing(id)) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Duplicate check for {} skipped: {}", id, e);
                None
            }
        }
    }
}
