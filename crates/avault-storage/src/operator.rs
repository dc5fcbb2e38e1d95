//! Builds the OpenDAL operator that fronts the avatar file host

use anyhow::{bail, Context, Result};
use avault_core::config::StorageConfig;
use opendal::Operator;

/// S3 credentials for the file host
#[derive(Clone)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[redacted]")
            .finish()
    }
}

impl StorageCredentials {
    /// Read credentials from `AWS_*` variables, falling back to `AVAULT_*`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let pick = |aws: &str, avault: &str| {
            lookup(aws)
                .or_else(|| lookup(avault))
                .with_context(|| format!("S3 credentials not set: export {aws} or {avault}"))
        };
        Ok(Self {
            access_key_id: pick("AWS_ACCESS_KEY_ID", "AVAULT_ACCESS_KEY_ID")?,
            secret_access_key: pick("AWS_SECRET_ACCESS_KEY", "AVAULT_SECRET_ACCESS_KEY")?,
        })
    }
}

/// Refuse a plaintext endpoint when `enforce_tls` is set; warn otherwise.
pub fn check_endpoint(storage: &StorageConfig) -> Result<()> {
    if !storage.endpoint.starts_with("http://") {
        return Ok(());
    }
    if storage.enforce_tls {
        bail!(
            "file host endpoint uses plaintext HTTP ({}) but storage.enforce_tls is set",
            storage.endpoint
        );
    }
    tracing::warn!(
        endpoint = %storage.endpoint,
        "file host endpoint uses plaintext HTTP; avatars are sealed but credentials are not"
    );
    Ok(())
}

/// S3 operator for the avatar bucket, with request logging.
///
/// No RetryLayer: every attempt must reach the pipeline's attempt counter.
pub fn build_operator(storage: &StorageConfig, creds: &StorageCredentials) -> Result<Operator> {
    check_endpoint(storage)?;

    let builder = opendal::services::S3::default()
        .endpoint(&storage.endpoint)
        .region(&storage.region)
        .bucket(&storage.bucket)
        .access_key_id(&creds.access_key_id)
        .secret_access_key(&creds.secret_access_key);

    let op = Operator::new(builder)
        .with_context(|| format!("creating S3 operator for bucket {}", storage.bucket))?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();

    Ok(op)
}
