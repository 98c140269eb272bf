//! JSON array file used as the audit log

use crate::common::errors::{Result, VerdictError};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A file holding one JSON array of audit entries.
///
/// Every append reads the whole array, pushes the new entry and rewrites the
/// file. Callers must serialize appends; [`super::AuditSink`] does so with a
/// single consumer.
#[derive(Debug, Clone)]
pub struct JsonArrayStore {
    path: PathBuf,
}

impl JsonArrayStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and return the new number of entries
    pub fn append(&self, entry: Value) -> Result<usize> {
        self.ensure_directory()?;

        let mut entries = self.load();
        entries.push(entry);
        self.write_all(&entries)?;

        debug!("Audit entry saved to {} ({} total)", self.path.display(), entries.len());
        Ok(entries.len())
    }

    /// Read the current entries. Missing, unreadable, corrupt or non-array
    /// content all read as an empty collection.
    pub fn load(&self) -> Vec<Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Error reading audit log {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        if content.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                warn!("Audit log {} does not hold a JSON array, starting over", self.path.display());
                Vec::new()
            }
            Err(e) => {
                warn!("Error decoding audit log {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn ensure_directory(&self) -> Result<()> {
        let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(());
        };
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                VerdictError::AuditSink(format!("cannot create directory {}: {}", dir.display(), e))
            })?;
            info!("Directory created: {}", dir.display());
        }
        Ok(())
    }

    /// Rewrite the whole collection through a sibling temp file and a rename,
    /// so readers never observe a half-written array.
    fn write_all(&self, entries: &[Value]) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(entries)?;

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            VerdictError::AuditSink(format!("cannot write {}: {}", self.path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonArrayStore::new(dir.path().join("nested/save/headers.json"));

        assert_eq!(store.append(json!({"Method": "INVITE"})).unwrap(), 1);
        assert_eq!(store.append(json!({"Method": "BYE"})).unwrap(), 2);

        let entries = store.load();
        assert_eq!(entries[0]["Method"], "INVITE");
        assert_eq!(entries[1]["Method"], "BYE");
    }

    #[test]
    fn test_corrupt_content_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headers.json");
        fs::write(&path, "[{\"Method\": \"INV").unwrap();

        let store = JsonArrayStore::new(&path);
        assert!(store.load().is_empty());
        assert_eq!(store.append(json!({"Method": "INVITE"})).unwrap(), 1);
    }

    #[test]
    fn test_non_array_content_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headers.json");
        fs::write(&path, "{\"Method\": \"INVITE\"}").unwrap();

        let store = JsonArrayStore::new(&path);
        assert_eq!(store.append(json!(1)).unwrap(), 1);
    }

    #[test]
    fn test_whitespace_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headers.json");
        fs::write(&path, "  \n").unwrap();
        assert!(JsonArrayStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_unwritable_location_is_audit_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let store = JsonArrayStore::new(blocker.join("headers.json"));
        assert!(matches!(store.append(json!({})), Err(VerdictError::AuditSink(_))));
    }
}
