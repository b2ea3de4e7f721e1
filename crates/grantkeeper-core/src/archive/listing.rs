use super::IndexEntry;
use crate::record::RecordStatus;
use std::collections::BTreeMap;

/// Filter criteria for archive listings
///
/// All conditions are combined with AND logic. An empty filter matches
/// every entry.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<RecordStatus>,
    /// Category to match (case-insensitive)
    pub category: Option<String>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into().to_lowercase());
        self
    }

    pub fn matches(&self, entry: &IndexEntry) -> bool {
        if let Some(status) = self.status
            && entry.status != status
        {
            return false;
        }

        match &self.category {
            None => true,
            Some(filter) => entry
                .category
                .as_deref()
                .is_some_and(|c| c.to_lowercase() == *filter),
        }
    }
}

/// Lazy view over archive projections
///
/// Nothing is copied up front; each call to [`Listing::iter`] walks the
/// index again and re-applies the filter.
pub struct Listing<'a> {
    entries: &'a BTreeMap<String, IndexEntry>,
    filter: ListFilter,
}

impl<'a> Listing<'a> {
    pub(crate) fn new(entries: &'a BTreeMap<String, IndexEntry>, filter: ListFilter) -> Self {
        Self { entries, filter }
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    /// Iterate matching entries in id order
    pub fn iter(&self) -> impl Iterator<Item = &'a IndexEntry> + '_ {
        self.entries
            .values()
            .filter(move |entry| self.filter.matches(entry))
    }
}
