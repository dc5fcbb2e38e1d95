//! Sealed length arithmetic. The upload declares its content length before any
//! byte is encrypted, so this must agree exactly with what the stream emits.

use crate::{HEADER_SIZE, SEGMENT_SIZE, TAG_SIZE};

/// Number of sealed segments for a plaintext of `plaintext_len` bytes.
///
/// Always at least one: the final segment carries `plaintext_len % SEGMENT_SIZE`
/// bytes and may be empty.
pub fn segment_count(plaintext_len: u64) -> u64 {
    plaintext_len / SEGMENT_SIZE as u64 + 1
}

/// Total sealed length for a plaintext of `plaintext_len` bytes:
/// header + plaintext + one tag per segment. Saturates instead of wrapping.
pub fn ciphertext_len(plaintext_len: u64) -> u64 {
    let tags = segment_count(plaintext_len).saturating_mul(TAG_SIZE as u64);
    (HEADER_SIZE as u64)
        .saturating_add(plaintext_len)
        .saturating_add(tags)
}
