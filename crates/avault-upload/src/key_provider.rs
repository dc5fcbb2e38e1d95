//! Where the pipeline gets the user's profile key from

use avault_core::{UploadError, UploadResult};
use avault_crypto::ProfileKey;
use secrecy::{ExposeSecret, SecretString};

/// Source of the per-user 32-byte encryption key
pub trait KeyProvider: Send + Sync {
    fn encryption_key(&self) -> UploadResult<ProfileKey>;
}

/// A key already held in memory
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    key: ProfileKey,
}

impl StaticKeyProvider {
    pub fn new(key: ProfileKey) -> Self {
        Self { key }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn encryption_key(&self) -> UploadResult<ProfileKey> {
        Ok(self.key.clone())
    }
}

/// A base64-encoded profile key, decoded each time it is requested
#[derive(Debug)]
pub struct EncodedProfileKey {
    encoded: SecretString,
}

impl EncodedProfileKey {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self {
            encoded: SecretString::from(encoded.into()),
        }
    }

    /// Read the encoded key from an environment variable.
    pub fn from_env(var: &str) -> UploadResult<Self> {
        let value = std::env::var(var)
            .map_err(|_| UploadError::Validation(format!("{var} is not set")))?;
        Ok(Self::new(value))
    }
}

impl KeyProvider for EncodedProfileKey {
    fn encryption_key(&self) -> UploadResult<ProfileKey> {
        ProfileKey::from_base64(self.encoded.expose_secret())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_provider() {
        let provider = StaticKeyProvider::new(ProfileKey::from_bytes([3u8; 32]));
        assert_eq!(provider.encryption_key().unwrap().as_bytes(), &[3u8; 32]);
    }

    #[test]
    fn test_encoded_provider() {
        // 32 bytes of 0x00
        let provider = EncodedProfileKey::new("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=");
        assert_eq!(provider.encryption_key().unwrap().as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn test_encoded_provider_bad_length() {
        let provider = EncodedProfileKey::new("AAAA");
        assert!(matches!(
            provider.encryption_key(),
            Err(UploadError::Validation(_))
        ));
    }

    #[test]
    fn test_encoded_provider_debug_hides_secret() {
        let provider = EncodedProfileKey::new("c2VjcmV0");
        assert!(!format!("{provider:?}").contains("c2VjcmV0"));
    }
}
