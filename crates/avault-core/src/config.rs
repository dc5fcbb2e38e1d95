use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hard ceiling on network calls per upload, first try included
pub const MAX_UPLOAD_ATTEMPTS: u32 = 4;

/// Top-level configuration (loaded from avault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvaultConfig {
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub server: ServerConfig,
    pub metadata: MetadataConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// S3-compatible endpoint of the file host
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket holding uploaded avatars
    pub bucket: String,
    /// Enforce HTTPS for S3 connections (warn/error on HTTP endpoints)
    pub enforce_tls: bool,
}

/// Retry budget for the remote upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Total attempts per upload, first try included (1..=4, default: 4)
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each later one
    pub initial_backoff_ms: u64,
    /// Upper bound on any single backoff delay
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Public base URL; avatars are retrievable at `{base_url}/files/{id}`
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// JSON file recording the last upload time and current avatar URL
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "avatars".into(),
            enforce_tls: false,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8333/avatars".into(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/avault/profile.json"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl AvaultConfig {
    /// Parse a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: AvaultConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Strip trailing `/` from `server.base_url`, so `{base_url}/files/{id}`
    /// has a single separator.
    pub fn normalize(&mut self) {
        let trimmed = self.server.base_url.trim_end_matches('/').len();
        self.server.base_url.truncate(trimmed);
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.upload.max_attempts == 0 {
            bail!("upload.max_attempts must be at least 1");
        }
        if self.upload.max_attempts > MAX_UPLOAD_ATTEMPTS {
            bail!(
                "upload.max_attempts ({}) exceeds the limit of {MAX_UPLOAD_ATTEMPTS}",
                self.upload.max_attempts
            );
        }
        if self.upload.initial_backoff_ms > self.upload.max_backoff_ms {
            bail!(
                "upload.initial_backoff_ms ({}) exceeds upload.max_backoff_ms ({})",
                self.upload.initial_backoff_ms,
                self.upload.max_backoff_ms
            );
        }
        if self.server.base_url.trim().is_empty() {
            bail!("server.base_url must not be empty");
        }
        Ok(())
    }
}
