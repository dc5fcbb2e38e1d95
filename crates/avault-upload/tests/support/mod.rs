//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use avault_core::{FileId, TransportError};
use avault_storage::UploadClient;
use avault_upload::{AvatarUploadPipeline, MemoryMetadataStore, RetryPolicy};
use bytes::Bytes;

pub const BASE_URL: &str = "http://files.example.com";

/// Upload client that replays a script of responses and keeps every payload
/// it was handed. Once the script runs out it fails transiently.
#[derive(Default)]
pub struct MockUploadClient {
    script: Mutex<VecDeque<Result<FileId, TransportError>>>,
    payloads: Mutex<Vec<Bytes>>,
    attempts: AtomicU32,
}

impl MockUploadClient {
    pub fn scripted(script: Vec<Result<FileId, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Bytes> {
        self.payloads.lock().unwrap().clone()
    }
}

impl UploadClient for MockUploadClient {
    async fn upload(&self, payload: Bytes) -> Result<FileId, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::transient("service unavailable")))
    }
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    }
}

pub fn pipeline(
    client: Arc<MockUploadClient>,
    store: Arc<MemoryMetadataStore>,
) -> AvatarUploadPipeline<MockUploadClient, MemoryMetadataStore> {
    AvatarUploadPipeline::new(client, store, BASE_URL, fast_policy())
}

pub fn test_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    for (i, b) in key.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(37) ^ 0x5C;
    }
    key
}
