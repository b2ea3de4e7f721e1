use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Duplicate record id '{id}': {reason}")]
    DuplicateConflict { id: String, reason: String },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Cannot compare records with different ids ('{old}' vs '{new}')")]
    MismatchedId { old: String, new: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Archive lock poisoned")]
    LockPoisoned,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether a caller can reasonably fix the input and retry.
    ///
    /// A mismatched id during change detection is a caller bug and should
    /// not be caught-and-continued.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::MismatchedId { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
