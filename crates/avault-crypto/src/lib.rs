//! avault-crypto: client-side sealing of avatar images
//!
//! Pipeline: plaintext → segmented XChaCha20-Poly1305 → BLAKE3 over emitted ciphertext → upload
//!
//! Sealed avatar format (binary):
//! ```text
//! [24 bytes: random stream IV]
//! [segment 0: 64 KiB ciphertext][16 bytes: Poly1305 tag]
//! ...
//! [final segment: plaintext_len % 64 KiB bytes ciphertext][16 bytes: Poly1305 tag]
//! segment nonce = IV with the last 8 bytes XORed by segment_index (BE)
//! segment AAD   = segment_index (8 bytes, BE) || final_flag (1 byte)
//! ```
//!
//! The final segment is always present, possibly empty, so the total length is
//! a pure function of the plaintext length (see [`ciphertext_len`]) and the
//! final flag in the AAD makes truncation at a segment boundary detectable.

pub mod digest;
pub mod key;
pub mod length;
pub mod open;
pub mod stream;

pub use digest::IntegrityDigest;
pub use key::ProfileKey;
pub use length::{ciphertext_len, segment_count};
pub use open::open_avatar;
pub use stream::{seal_avatar, SealedAvatar, StreamingCipherDigester};

/// Size of a profile key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the XChaCha20-Poly1305 nonce, which is also the stream IV header
pub const NONCE_SIZE: usize = 24;

/// Size of the sealed avatar header (the stream IV)
pub const HEADER_SIZE: usize = NONCE_SIZE;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Plaintext bytes per sealed segment
pub const SEGMENT_SIZE: usize = 64 * 1024;

/// Per-segment nonce: the stream IV with its trailing 8 bytes XORed by the index.
pub(crate) fn segment_nonce(iv: &[u8; NONCE_SIZE], index: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = *iv;
    for (n, i) in nonce[NONCE_SIZE - 8..].iter_mut().zip(index.to_be_bytes()) {
        *n ^= i;
    }
    nonce
}

/// Build AAD: segment_index (8 bytes BE) || final_flag (1 byte)
pub(crate) fn segment_aad(index: u64, is_final: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_be_bytes());
    aad[8] = u8::from(is_final);
    aad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_nonce_first_is_iv() {
        let iv = [0x5Au8; NONCE_SIZE];
        assert_eq!(segment_nonce(&iv, 0), iv);
    }

    #[test]
    fn test_segment_nonces_differ() {
        let iv = [0u8; NONCE_SIZE];
        let n1 = segment_nonce(&iv, 1);
        let n2 = segment_nonce(&iv, 2);
        assert_ne!(n1, n2);
        assert_eq!(n1[..16], iv[..16], "only the trailing counter bytes change");
        assert_eq!(n1[NONCE_SIZE - 1], 1);
    }

    #[test]
    fn test_segment_aad_final_flag() {
        assert_eq!(segment_aad(3, false)[8], 0);
        assert_eq!(segment_aad(3, true)[8], 1);
        assert_eq!(segment_aad(3, true)[..8], 3u64.to_be_bytes());
    }
}
