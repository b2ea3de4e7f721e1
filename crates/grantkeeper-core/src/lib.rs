//! Validation, change detection and archival indexing for scholarship records.
//!
//! Raw field values extracted by a browser-automation driver are mapped into a
//! [`Record`], checked by the [`Validator`], and written to an
//! [`ArchiveIndex`] which reports field-level changes against the previously
//! stored version.

pub mod archive;
pub mod changes;
pub mod error;
pub mod record;
pub mod store;
pub mod validate;

pub use archive::{ArchiveIndex, ArchiveStats, IndexEntry, ListFilter, SharedArchive, UpsertOptions};
pub use changes::{ChangeEntry, Severity, TrackedField, detect_changes};
pub use error::{Error, Result};
pub use record::{RawFields, Record, RecordStatus};
pub use validate::{ValidationConfig, ValidationResult, Validator, validate};
