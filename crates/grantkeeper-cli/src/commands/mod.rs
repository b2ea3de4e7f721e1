pub mod cancel;
pub mod completion;
pub mod diff;
pub mod ingest;
pub mod list;
pub mod remove;
pub mod rescan;
pub mod show;
pub mod stats;
pub mod validate;

use anyhow::{Context, Result, anyhow, bail};
use grantkeeper_core::record::{RawFields, fields_from_json};
use grantkeeper_core::store::JsonDirStore;
use grantkeeper_core::{ArchiveIndex, ValidationConfig, Validator};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Raw fields read from an input file, tagged with where they came from
#[derive(Debug, Clone)]
pub struct RawInput {
    pub source: String,
    pub fields: RawFields,
}

/// Default archive directory under the user's data dir
pub fn default_archive_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("grantkeeper").join("archive"))
}

pub fn resolve_archive_dir(archive: Option<&Path>) -> Result<PathBuf> {
    match archive {
        Some(path) => Ok(path.to_path_buf()),
        None => default_archive_dir(),
    }
}

pub fn open_archive(archive: Option<&Path>) -> Result<ArchiveIndex<JsonDirStore>> {
    let dir = resolve_archive_dir(archive)?;
    tracing::debug!("Opening archive at: {}", dir.display());
    let store = JsonDirStore::open(&dir)
        .with_context(|| format!("Failed to open archive at {}", dir.display()))?;
    Ok(ArchiveIndex::open(store)?)
}

/// Load a validator, reading a JSON config file when one is given
pub fn load_validator(config: Option<&Path>) -> Result<Validator> {
    let config = match config {
        Some(path) => {
            tracing::debug!("Loading validation config from: {}", path.display());
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: ValidationConfig = serde_json::from_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?;
            config.validate()?;
            config
        }
        None => ValidationConfig::default(),
    };
    Ok(Validator::new(config))
}

/// Expand file arguments, treating ones with glob characters as patterns
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            let mut matched = false;
            for entry in glob::glob(pattern).with_context(|| format!("Invalid pattern {}", pattern))? {
                paths.push(entry?);
                matched = true;
            }
            if !matched {
                bail!("No files match {}", pattern);
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }
    Ok(paths)
}

/// Read raw records from a JSON file holding one object or an array of objects
pub fn read_raw_file(path: &Path) -> Result<Vec<RawInput>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))?;

    let objects = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        _ => bail!("{} must contain a JSON object or an array of objects", path.display()),
    };

    let multiple = objects.len() > 1;
    objects
        .iter()
        .enumerate()
        .map(|(idx, object)| {
            let source = if multiple {
                format!("{}[{}]", path.display(), idx)
            } else {
                path.display().to_string()
            };
            let fields = fields_from_json(object).with_context(|| source.clone())?;
            Ok(RawInput { source, fields })
        })
        .collect()
}

pub fn read_inputs(patterns: &[String]) -> Result<Vec<RawInput>> {
    let mut inputs = Vec::new();
    for path in expand_inputs(patterns)? {
        inputs.extend(read_raw_file(&path)?);
    }
    tracing::debug!("Read {} raw records", inputs.len());
    Ok(inputs)
}
