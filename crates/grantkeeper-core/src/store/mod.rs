mod json_dir;
mod memory;

pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

use crate::Result;
use crate::record::Record;

/// Key-value persistence for archived records
///
/// Implementations must make `put` all-or-nothing: a failed write leaves
/// any previously stored document readable.
pub trait RecordStore {
    fn get(&self, id: &str) -> Result<Option<Record>>;

    /// Store a record and return where it now lives
    fn put(&mut self, id: &str, record: &Record) -> Result<String>;

    /// Delete a record, returning whether it existed
    fn delete(&mut self, id: &str) -> Result<bool>;

    fn list_keys(&self) -> Result<Vec<String>>;

    /// Storage location a record with this id is (or would be) kept at
    fn location(&self, id: &str) -> String;
}
