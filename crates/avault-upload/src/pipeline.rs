//! AvatarUploadPipeline: validate → seal → upload with retry → record metadata

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};

use avault_core::config::AvaultConfig;
use avault_core::{file_url, FileId, UploadError, UploadMetadata, UploadOutcome, UploadResult};
use avault_crypto::{seal_avatar, IntegrityDigest, ProfileKey};
use avault_storage::UploadClient;
use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::key_provider::KeyProvider;
use crate::metadata::MetadataStore;
use crate::retry::{RetryPolicy, RetryingUploader};

/// Everything known about an upload that went through
#[derive(Debug, Clone)]
pub struct UploadSuccess {
    pub id: FileId,
    pub url: String,
    /// BLAKE3 of exactly the bytes handed to the upload client
    pub digest: IntegrityDigest,
    pub ciphertext_len: u64,
    pub attempts: u32,
    pub timestamp_millis: u64,
}

impl UploadSuccess {
    pub fn metadata(&self) -> UploadMetadata {
        UploadMetadata {
            timestamp_millis: self.timestamp_millis,
            url: self.url.clone(),
        }
    }
}

/// Collapse a pipeline result into the terminal outcome type.
pub fn into_outcome(result: UploadResult<UploadSuccess>) -> UploadOutcome {
    match result {
        Ok(success) => UploadOutcome::Success {
            id: success.id,
            url: success.url,
        },
        Err(error) => UploadOutcome::Failure { error },
    }
}

pub struct AvatarUploadPipeline<C, M> {
    uploader: Arc<RetryingUploader<C>>,
    metadata: Arc<M>,
    base_url: Arc<str>,
}

impl<C, M> Clone for AvatarUploadPipeline<C, M> {
    fn clone(&self) -> Self {
        Self {
            uploader: Arc::clone(&self.uploader),
            metadata: Arc::clone(&self.metadata),
            base_url: Arc::clone(&self.base_url),
        }
    }
}

impl<C, M> AvatarUploadPipeline<C, M>
where
    C: UploadClient + 'static,
    M: MetadataStore + 'static,
{
    pub fn new(
        client: Arc<C>,
        metadata: Arc<M>,
        base_url: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            uploader: Arc::new(RetryingUploader::new(client, policy)),
            metadata,
            base_url: Arc::from(base_url),
        }
    }

    pub fn from_config(client: Arc<C>, metadata: Arc<M>, config: &AvaultConfig) -> Self {
        Self::new(
            client,
            metadata,
            config.server.base_url.clone(),
            RetryPolicy::from_config(&config.upload),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start an upload on a background task and return its handle.
    ///
    /// Never blocks the caller. Dropping the handle does not stop the task;
    /// use [`UploadHandle::cancel`] for that.
    pub fn upload(&self, plaintext: impl Into<Bytes>, key: &[u8]) -> UploadHandle {
        let key = ProfileKey::from_slice(key);
        self.spawn(plaintext.into(), move || key)
    }

    /// Like [`Self::upload`], asking `provider` for the key on the
    /// background task.
    pub fn upload_with_provider(
        &self,
        plaintext: impl Into<Bytes>,
        provider: Arc<dyn KeyProvider>,
    ) -> UploadHandle {
        self.spawn(plaintext.into(), move || provider.encryption_key())
    }

    /// Run the pipeline on the current task.
    pub async fn run(
        &self,
        plaintext: &[u8],
        key: &[u8],
        cancel: &CancellationToken,
    ) -> UploadResult<UploadSuccess> {
        self.execute(plaintext, ProfileKey::from_slice(key), cancel)
            .await
    }

    fn spawn<K>(&self, plaintext: Bytes, key: K) -> UploadHandle
    where
        K: FnOnce() -> UploadResult<ProfileKey> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let pipeline = self.clone();

        let join = tokio::spawn(async move {
            let result = pipeline.execute(&plaintext, key(), &token).await;
            if let Err(e) = &result {
                warn!(error = %e, "avatar upload failed");
            }
            result
        });

        UploadHandle { join, cancel }
    }

    async fn execute(
        &self,
        plaintext: &[u8],
        key: UploadResult<ProfileKey>,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadSuccess> {
        if plaintext.is_empty() {
            return Err(UploadError::Validation("avatar image is empty".into()));
        }
        let sealed = {
            let key = key?;
            seal_avatar(plaintext, &key)?
        };
        let ciphertext_len = sealed.len();

        let receipt = self.uploader.upload(sealed.ciphertext, cancel).await?;

        let url = file_url(&self.base_url, &receipt.id);
        let timestamp_millis = now_millis();
        self.record(UploadMetadata {
            timestamp_millis,
            url: url.clone(),
        })
        .await;

        info!(
            id = %receipt.id,
            url = %url,
            attempts = receipt.attempts,
            bytes = ciphertext_len,
            digest = %sealed.digest,
            "avatar uploaded"
        );

        Ok(UploadSuccess {
            id: receipt.id,
            url,
            digest: sealed.digest,
            ciphertext_len,
            attempts: receipt.attempts,
            timestamp_millis,
        })
    }

    /// Stores may touch the filesystem, so they run on the blocking pool.
    async fn record(&self, metadata: UploadMetadata) {
        let store = Arc::clone(&self.metadata);
        let recorded =
            tokio::task::spawn_blocking(move || store.record_upload_metadata(&metadata)).await;
        if let Err(e) = recorded {
            warn!(error = %e, "metadata store task failed");
        }
    }
}

/// Future for one in-flight upload; resolves exactly once.
pub struct UploadHandle {
    join: JoinHandle<UploadResult<UploadSuccess>>,
    cancel: CancellationToken,
}

impl UploadHandle {
    /// Stop scheduling further attempts. An attempt already sent to the
    /// upload client is not aborted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn outcome(self) -> UploadOutcome {
        into_outcome(self.await)
    }
}

impl Future for UploadHandle {
    type Output = UploadResult<UploadSuccess>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.join).poll(cx).map(|joined| {
            joined.unwrap_or_else(|e| Err(UploadError::Worker(e.to_string())))
        })
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_outcome() {
        let ok = into_outcome(Ok(UploadSuccess {
            id: FileId::from(3u64),
            url: "http://h/files/3".into(),
            digest: IntegrityDigest::of(b""),
            ciphertext_len: 40,
            attempts: 1,
            timestamp_millis: 0,
        }));
        assert_eq!(ok.url(), Some("http://h/files/3"));

        let failed = into_outcome(Err(UploadError::Cancelled));
        assert!(!failed.is_success());
    }

    #[test]
    fn test_now_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_millis() > 1_577_836_800_000);
    }
}
