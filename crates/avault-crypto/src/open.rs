//! Decrypt a sealed avatar fetched back from the file host

use avault_core::{UploadError, UploadResult};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};

use crate::key::ProfileKey;
use crate::{segment_aad, segment_nonce, HEADER_SIZE, NONCE_SIZE, SEGMENT_SIZE, TAG_SIZE};

/// Decrypt a sealed avatar produced by [`crate::seal_avatar`].
///
/// Framing problems (too short, missing final segment) are `Validation`
/// errors; a segment that fails authentication is a `Key` error.
pub fn open_avatar(sealed: &[u8], key: &ProfileKey) -> UploadResult<Vec<u8>> {
    if sealed.len() < HEADER_SIZE + TAG_SIZE {
        return Err(UploadError::Validation(format!(
            "sealed avatar too short: {} bytes (minimum {})",
            sealed.len(),
            HEADER_SIZE + TAG_SIZE
        )));
    }

    let (header, mut rest) = sealed.split_at(HEADER_SIZE);
    let mut iv = [0u8; NONCE_SIZE];
    iv.copy_from_slice(header);

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let full = SEGMENT_SIZE + TAG_SIZE;
    let mut plaintext = Vec::with_capacity(rest.len());
    let mut index = 0u64;

    loop {
        // A full-size segment is never final, and the final one always follows it
        let (segment, is_final) = if rest.len() < full {
            (rest, true)
        } else if rest.len() >= full + TAG_SIZE {
            (&rest[..full], false)
        } else {
            return Err(UploadError::Validation(format!(
                "sealed avatar truncated after segment {index}"
            )));
        };

        if segment.len() < TAG_SIZE {
            return Err(UploadError::Validation(format!(
                "segment {index} shorter than its tag ({} bytes)",
                segment.len()
            )));
        }

        let nonce = segment_nonce(&iv, index);
        let aad = segment_aad(index, is_final);
        let opened = cipher
            .decrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: segment,
                    aad: &aad,
                },
            )
            .map_err(|_| {
                UploadError::Key(format!(
                    "segment {index} failed authentication: wrong key or corrupted data"
                ))
            })?;

        plaintext.extend_from_slice(&opened);
        rest = &rest[segment.len()..];
        index += 1;

        if is_final {
            break;
        }
    }

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::seal_avatar;

    fn test_key() -> ProfileKey {
        ProfileKey::from_bytes([42u8; 32])
    }

    #[test]
    fn test_open_multi_segment() {
        let key = test_key();
        let plaintext: Vec<u8> = (0..(2 * SEGMENT_SIZE + 500)).map(|i| i as u8).collect();
        let sealed = seal_avatar(&plaintext, &key).unwrap();
        assert_eq!(open_avatar(&sealed.ciphertext, &key).unwrap(), plaintext);
    }

    #[test]
    fn test_open_empty_final_segment() {
        let key = test_key();
        let plaintext = vec![3u8; SEGMENT_SIZE];
        let sealed = seal_avatar(&plaintext, &key).unwrap();
        assert_eq!(open_avatar(&sealed.ciphertext, &key).unwrap(), plaintext);
    }

    #[test]
    fn test_open_wrong_key() {
        let sealed = seal_avatar(b"secret avatar", &test_key()).unwrap();
        let other = ProfileKey::from_bytes([7u8; 32]);
        assert!(matches!(
            open_avatar(&sealed.ciphertext, &other),
            Err(UploadError::Key(_))
        ));
    }

    #[test]
    fn test_open_tampered() {
        let key = test_key();
        let sealed = seal_avatar(b"secret avatar", &key).unwrap();
        let mut bytes = sealed.ciphertext.to_vec();
        bytes[HEADER_SIZE + 2] ^= 0xFF;
        assert!(open_avatar(&bytes, &key).is_err());
    }

    #[test]
    fn test_open_rejects_dropped_final_segment() {
        let key = test_key();
        let plaintext = vec![1u8; SEGMENT_SIZE + 10];
        let sealed = seal_avatar(&plaintext, &key).unwrap();
        // Keep header + first full segment only
        let cut = &sealed.ciphertext[..HEADER_SIZE + SEGMENT_SIZE + TAG_SIZE];
        assert!(matches!(
            open_avatar(cut, &key),
            Err(UploadError::Validation(_))
        ));
    }

    #[test]
    fn test_open_rejects_truncated_final_segment() {
        let key = test_key();
        let sealed = seal_avatar(&[5u8; 64], &key).unwrap();
        let cut = &sealed.ciphertext[..sealed.ciphertext.len() - 1];
        assert!(open_avatar(cut, &key).is_err());
    }

    #[test]
    fn test_open_too_short() {
        assert!(matches!(
            open_avatar(&[0u8; 10], &test_key()),
            Err(UploadError::Validation(_))
        ));
    }
}
