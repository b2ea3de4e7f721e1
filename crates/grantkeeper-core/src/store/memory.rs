use super::RecordStore;
use crate::Result;
use crate::record::Record;
use std::collections::BTreeMap;

/// In-process store, mostly useful for tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<String, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Record>> {
        Ok(self.records.get(id).cloned())
    }

    fn put(&mut self, id: &str, record: &Record) -> Result<String> {
        self.records.insert(id.to_string(), record.clone());
        Ok(self.location(id))
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        Ok(self.records.remove(id).is_some())
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.records.keys().cloned().collect())
    }

    fn location(&self, id: &str) -> String {
        format!("memory://{}", id)
    }
}
