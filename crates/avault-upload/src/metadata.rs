//! Persistence of "last upload time" and "current avatar URL".
//!
//! The pipeline calls `record_upload_metadata` exactly once per successful
//! upload and never on failure. Stores are best-effort: a failed write is
//! logged here, not reported back to the pipeline.

use anyhow::{Context, Result};
use avault_core::UploadMetadata;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Synchronous by contract: the pipeline invokes it from the blocking pool.
pub trait MetadataStore: Send + Sync {
    fn record_upload_metadata(&self, metadata: &UploadMetadata);
}

/// On-disk shape of the profile record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileRecord {
    /// Unix timestamp (ms) of the last successful avatar upload
    last_upload_millis: u64,
    /// Retrieval URL of the current avatar
    avatar_url: String,
}

impl From<&UploadMetadata> for ProfileRecord {
    fn from(m: &UploadMetadata) -> Self {
        Self {
            last_upload_millis: m.timestamp_millis,
            avatar_url: m.url.clone(),
        }
    }
}

impl From<ProfileRecord> for UploadMetadata {
    fn from(r: ProfileRecord) -> Self {
        Self {
            timestamp_millis: r.last_upload_millis,
            url: r.avatar_url,
        }
    }
}

/// Single-record JSON file, replaced atomically (write temp, then rename).
pub struct JsonMetadataStore {
    path: PathBuf,
    current: Mutex<Option<UploadMetadata>>,
}

impl JsonMetadataStore {
    /// Load or create a store at the given path.
    /// If the file doesn't exist, starts with no record.
    pub fn open(path: &Path) -> Result<Self> {
        let current = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading metadata: {}", path.display()))?;
            let record: ProfileRecord = serde_json::from_str(&content)
                .with_context(|| format!("parsing metadata: {}", path.display()))?;
            Some(record.into())
        } else {
            None
        };

        Ok(Self {
            path: path.to_path_buf(),
            current: Mutex::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The most recently recorded upload, if any.
    pub fn last(&self) -> Option<UploadMetadata> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<UploadMetadata>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, metadata: &UploadMetadata) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating metadata dir: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&ProfileRecord::from(metadata))
            .context("serializing metadata")?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &json)
            .with_context(|| format!("writing metadata temp: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming metadata: {}", self.path.display()))?;
        Ok(())
    }
}

impl MetadataStore for JsonMetadataStore {
    fn record_upload_metadata(&self, metadata: &UploadMetadata) {
        let mut current = self.lock();
        match self.persist(metadata) {
            Ok(()) => {
                debug!(path = %self.path.display(), url = %metadata.url, "metadata recorded");
                *current = Some(metadata.clone());
            }
            Err(e) => warn!(path = %self.path.display(), "failed to record upload metadata: {e:#}"),
        }
    }
}

/// Keeps every record in memory; handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: Mutex<Vec<UploadMetadata>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in call order
    pub fn records(&self) -> Vec<UploadMetadata> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<UploadMetadata> {
        self.records().pop()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn record_upload_metadata(&self, metadata: &UploadMetadata) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(metadata.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(ts: u64) -> UploadMetadata {
        UploadMetadata {
            timestamp_millis: ts,
            url: format!("http://files.example.com/files/{ts}"),
        }
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonMetadataStore::open(&tmp.path().join("profile.json")).unwrap();
        assert!(store.last().is_none());
    }

    #[test]
    fn test_record_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/profile.json");

        let store = JsonMetadataStore::open(&path).unwrap();
        store.record_upload_metadata(&sample(1));
        store.record_upload_metadata(&sample(2));
        assert_eq!(store.last(), Some(sample(2)));

        let reopened = JsonMetadataStore::open(&path).unwrap();
        assert_eq!(reopened.last(), Some(sample(2)));
        assert!(!path.with_extension("tmp").exists(), "temp file renamed away");
    }

    #[test]
    fn test_file_shape() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("profile.json");
        JsonMetadataStore::open(&path)
            .unwrap()
            .record_upload_metadata(&sample(5));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["last_upload_millis"], 5);
        assert_eq!(raw["avatar_url"], "http://files.example.com/files/5");
    }

    #[test]
    fn test_open_rejects_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("profile.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(JsonMetadataStore::open(&path).is_err());
    }

    #[test]
    fn test_memory_store_keeps_order() {
        let store = MemoryMetadataStore::new();
        store.record_upload_metadata(&sample(1));
        store.record_upload_metadata(&sample(2));
        assert_eq!(store.records(), vec![sample(1), sample(2)]);
        assert_eq!(store.last(), Some(sample(2)));
    }
}
