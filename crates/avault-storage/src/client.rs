//! Upload client: the thin seam between the pipeline and the remote file host

use std::future::Future;

use avault_core::{FileId, TransportError};
use bytes::Bytes;
use opendal::{ErrorKind, Operator};
use tracing::debug;

/// Directory under the bucket root holding uploaded blobs; mirrors the
/// `/files/{id}` retrieval path.
pub const FILES_PREFIX: &str = "files";

/// Transmit a finished byte buffer and obtain the host's identifier for it.
///
/// One call is one network attempt; retry policy lives above this trait.
pub trait UploadClient: Send + Sync {
    fn upload(&self, payload: Bytes) -> impl Future<Output = Result<FileId, TransportError>> + Send;
}

/// Uploads to any OpenDAL backend, naming each blob with a fresh UUID.
#[derive(Debug, Clone)]
pub struct OpendalUploadClient {
    op: Operator,
}

impl OpendalUploadClient {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Storage path for an uploaded blob
    pub fn object_path(id: &FileId) -> String {
        format!("{FILES_PREFIX}/{id}")
    }
}

impl UploadClient for OpendalUploadClient {
    async fn upload(&self, payload: Bytes) -> Result<FileId, TransportError> {
        let id = FileId::new(uuid::Uuid::new_v4().simple().to_string());
        let path = Self::object_path(&id);
        let len = payload.len();

        self.op
            .write(&path, payload)
            .await
            .map_err(classify_error)?;

        debug!(path = %path, bytes = len, "blob written");
        Ok(id)
    }
}

/// Temporary OpenDAL errors and rate limiting are worth retrying; everything
/// else (permission, config, not found) is final.
pub fn classify_error(e: opendal::Error) -> TransportError {
    let transient = e.is_temporary() || e.kind() == ErrorKind::RateLimited;
    let message = e.to_string();
    if transient {
        TransportError::transient(message)
    } else {
        TransportError::fatal(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_operator() -> Operator {
        Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish()
    }

    #[tokio::test]
    async fn test_upload_writes_under_files_prefix() {
        let op = memory_operator();
        let client = OpendalUploadClient::new(op.clone());

        let id = client.upload(Bytes::from_static(b"sealed")).await.unwrap();
        let stored = op
            .read(&OpendalUploadClient::object_path(&id))
            .await
            .unwrap();
        assert_eq!(stored.to_bytes(), Bytes::from_static(b"sealed"));
    }

    #[tokio::test]
    async fn test_upload_ids_are_unique() {
        let client = OpendalUploadClient::new(memory_operator());
        let a = client.upload(Bytes::from_static(b"a")).await.unwrap();
        let b = client.upload(Bytes::from_static(b"b")).await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_classify_temporary() {
        let e = opendal::Error::new(ErrorKind::Unexpected, "connection reset").set_temporary();
        assert!(classify_error(e).transient);

        let e = opendal::Error::new(ErrorKind::RateLimited, "slow down");
        assert!(classify_error(e).transient);
    }

    #[test]
    fn test_classify_permanent() {
        let e = opendal::Error::new(ErrorKind::PermissionDenied, "403");
        let t = classify_error(e);
        assert!(!t.transient);
        assert!(t.message.contains("403"));
    }
}
