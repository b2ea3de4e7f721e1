use super::ChangeEntry;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One line of the change log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    pub id: String,
    pub detected_at: DateTime<Utc>,
    pub changes: Vec<ChangeEntry>,
}

/// Append-only JSON-lines log of detected changes
pub struct ChangeLog {
    path: PathBuf,
}

impl ChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the changes for a record; empty change sets are not written
    pub fn append(&self, id: &str, detected_at: DateTime<Utc>, changes: &[ChangeEntry]) -> Result<bool> {
        if changes.is_empty() {
            return Ok(false);
        }

        let entry = ChangeLogEntry {
            id: id.to_string(),
            detected_at,
            changes: changes.to_vec(),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::debug!(
            "Logged {} changes for {} to {}",
            changes.len(),
            id,
            self.path.display()
        );
        Ok(true)
    }

    /// Read every entry in file order; a missing log reads as empty
    pub fn read_all(&self) -> Result<Vec<ChangeLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}
