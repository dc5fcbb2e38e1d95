use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::UploadError;

/// Identifier the remote file host assigns to an uploaded blob.
///
/// Hosts hand back either numeric ids or opaque strings; both render the same
/// way in a retrieval URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for FileId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Record handed to the persistence collaborator after a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Unix timestamp (milliseconds) at which the upload completed
    pub timestamp_millis: u64,
    /// Retrieval URL of the uploaded avatar
    pub url: String,
}

/// Terminal result of one pipeline invocation
#[derive(Debug)]
pub enum UploadOutcome {
    Success { id: FileId, url: String },
    Failure { error: UploadError },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            UploadOutcome::Success { url, .. } => Some(url),
            UploadOutcome::Failure { .. } => None,
        }
    }
}

/// Compose the retrieval URL for an uploaded file: `{base}/files/{id}`,
/// with `base` used exactly as given.
pub fn file_url(base: &str, id: &FileId) -> String {
    format!("{base}/files/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url() {
        let id = FileId::from(42u64);
        assert_eq!(
            file_url("http://files.example.com", &id),
            "http://files.example.com/files/42"
        );
        // Composed verbatim; normalizing the base is the config loader's job
        assert_eq!(file_url("http://h/", &id), "http://h//files/42");
    }

    #[test]
    fn test_file_id_forms() {
        assert_eq!(FileId::from(7u64).as_str(), "7");
        assert_eq!(FileId::from("abc").to_string(), "abc");
        assert_eq!(FileId::new(String::from("x")), FileId::from("x"));
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = UploadOutcome::Success {
            id: FileId::from(1u64),
            url: "http://h/files/1".into(),
        };
        assert!(ok.is_success());
        assert_eq!(ok.url(), Some("http://h/files/1"));

        let failed = UploadOutcome::Failure {
            error: UploadError::Cancelled,
        };
        assert!(!failed.is_success());
        assert_eq!(failed.url(), None);
    }
}
