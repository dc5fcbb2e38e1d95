//! BLAKE3 integrity digest over sealed ciphertext

use std::fmt;

use avault_core::{UploadError, UploadResult};

/// Digest of every ciphertext byte in emission order, displayed as 64 hex chars.
///
/// Used to check that the host stored exactly what was sent; it says nothing
/// about the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityDigest(blake3::Hash);

impl IntegrityDigest {
    pub(crate) fn from_hash(hash: blake3::Hash) -> Self {
        Self(hash)
    }

    /// Re-hash a complete ciphertext buffer.
    pub fn of(ciphertext: &[u8]) -> Self {
        Self(blake3::hash(ciphertext))
    }

    /// True if `ciphertext` hashes to this digest.
    pub fn verify(&self, ciphertext: &[u8]) -> bool {
        // blake3::Hash equality is constant-time
        Self::of(ciphertext) == *self
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    pub fn from_hex(hex: &str) -> UploadResult<Self> {
        blake3::Hash::from_hex(hex)
            .map(Self)
            .map_err(|e| UploadError::Validation(format!("invalid digest hex '{hex}': {e}")))
    }
}

impl fmt::Display for IntegrityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let d = IntegrityDigest::of(b"sealed bytes");
        let hex = d.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(IntegrityDigest::from_hex(&hex).unwrap(), d);
        assert_eq!(d.to_string(), hex);
    }

    #[test]
    fn verify_detects_change() {
        let d = IntegrityDigest::of(b"abc");
        assert!(d.verify(b"abc"));
        assert!(!d.verify(b"abd"));
        assert!(!d.verify(b"ab"));
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(IntegrityDigest::from_hex("zz").is_err());
    }
}
