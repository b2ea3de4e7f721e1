use super::RecordStore;
use crate::record::Record;
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use url::form_urlencoded;

const EXTENSION: &str = ".json";

/// One pretty-printed JSON document per record in a directory
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        if !dir.is_dir() {
            return Err(Error::Storage(format!(
                "Archive path is not a directory: {}",
                dir.display()
            )));
        }
        tracing::debug!("Opened JSON archive at: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document holding `id`
    pub fn path_for(&self, id: &str) -> PathBuf {
        let encoded: String = form_urlencoded::byte_serialize(id.as_bytes()).collect();
        self.dir.join(format!("{}{}", encoded, EXTENSION))
    }

    fn key_from_file_name(name: &str) -> Option<String> {
        let stem = name.strip_suffix(EXTENSION)?;
        form_urlencoded::parse(stem.as_bytes())
            .next()
            .map(|(key, _)| key.into_owned())
    }
}

impl RecordStore for JsonDirStore {
    fn get(&self, id: &str) -> Result<Option<Record>> {
        let path = self.path_for(id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: Record = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(record))
    }

    fn put(&mut self, id: &str, record: &Record) -> Result<String> {
        let path = self.path_for(id);
        let json = serde_json::to_string_pretty(record)?;

        // Write beside the target and rename so readers never see a partial document
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::Storage(format!("Invalid record path for id '{}'", id)))?;
        let tmp = self.dir.join(format!(".{}.tmp", file_name));
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!("Wrote record {} to {}", id, path.display());
        Ok(path.display().to_string())
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(Self::key_from_file_name) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn location(&self, id: &str) -> String {
        self.path_for(id).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(id: &str) -> Record {
        let mut record = Record::new(id, Utc::now()).unwrap();
        record.title = Some("Community Grant".to_string());
        record
    }

    #[test]
    fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonDirStore::open(dir.path().join("archive")).unwrap();

        let location = store.put("s1", &record("s1")).unwrap();
        assert!(location.ends_with("s1.json"));

        let loaded = store.get("s1").unwrap().unwrap();
        assert_eq!(loaded.id(), "s1");
        assert_eq!(loaded.title.as_deref(), Some("Community Grant"));

        assert!(store.delete("s1").unwrap());
        assert!(!store.delete("s1").unwrap());
        assert!(store.get("s1").unwrap().is_none());
    }

    #[test]
    fn test_ids_with_path_characters() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonDirStore::open(dir.path()).unwrap();

        let id = "fastweb/scholarship 42?x=1&y=2";
        store.put(id, &record(id)).unwrap();

        assert_eq!(store.list_keys().unwrap(), vec![id.to_string()]);
        assert_eq!(store.get(id).unwrap().unwrap().id(), id);
    }

    #[test]
    fn test_list_keys_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        store.put("b", &record("b")).unwrap();
        store.put("a", &record("a")).unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        assert_eq!(store.list_keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_open_rejects_file_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("archive");
        fs::write(&file, "not a directory").unwrap();
        assert!(JsonDirStore::open(&file).is_err());
    }
}
