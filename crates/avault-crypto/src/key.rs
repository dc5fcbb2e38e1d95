//! Per-user profile key, as handed over by the key provider

use avault_core::{UploadError, UploadResult};
use base64::Engine;
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// A 256-bit symmetric profile key. Zeroized on drop.
#[derive(Clone)]
pub struct ProfileKey {
    bytes: [u8; KEY_SIZE],
}

impl ProfileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Copy key material out of a slice, rejecting anything that is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> UploadResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            UploadError::Validation(format!(
                "profile key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Decode a standard-alphabet base64 profile key.
    pub fn from_base64(encoded: &str) -> UploadResult<Self> {
        let mut decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| UploadError::Validation(format!("profile key is not valid base64: {e}")))?;
        let key = Self::from_slice(&decoded);
        decoded.zeroize();
        key
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for ProfileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for ProfileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
