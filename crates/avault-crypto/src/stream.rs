//! Streaming seal: encrypt segment by segment while hashing every emitted byte.
//!
//! The digester emits the IV header first, then one sealed segment per
//! `produce()` call. Each chunk is folded into the BLAKE3 digest before it is
//! handed out, so the digest covers exactly the bytes a caller could send.

use avault_core::{UploadError, UploadResult};
use bytes::Bytes;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use tracing::debug;

use crate::digest::IntegrityDigest;
use crate::key::ProfileKey;
use crate::length::ciphertext_len;
use crate::{segment_aad, segment_nonce, NONCE_SIZE, SEGMENT_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// IV header not yet emitted
    Header,
    /// Emitting sealed segments
    Segments,
    /// Final segment emitted; `produce()` returns end-of-stream
    Drained,
    /// `finish()` has been called
    Finished,
}

pub struct StreamingCipherDigester<'a> {
    cipher: XChaCha20Poly1305,
    iv: [u8; NONCE_SIZE],
    plaintext: &'a [u8],
    consumed: usize,
    segment: u64,
    phase: Phase,
    hasher: blake3::Hasher,
    produced: u64,
    expected: u64,
}

impl<'a> StreamingCipherDigester<'a> {
    /// Start a new stream with a fresh random IV and an empty digest.
    ///
    /// Fails with `UploadError::Key` if `key` is not 32 bytes.
    pub fn open(plaintext: &'a [u8], key: &[u8]) -> UploadResult<Self> {
        let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| {
            UploadError::Key(format!(
                "cipher initialization failed: key is {} bytes, expected 32",
                key.len()
            ))
        })?;

        let mut iv = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        Ok(Self {
            cipher,
            iv,
            plaintext,
            consumed: 0,
            segment: 0,
            phase: Phase::Header,
            hasher: blake3::Hasher::new(),
            produced: 0,
            expected: ciphertext_len(plaintext.len() as u64),
        })
    }

    /// Content length this stream will emit, known before the first byte.
    pub fn expected_len(&self) -> u64 {
        self.expected
    }

    /// Bytes emitted so far.
    pub fn produced_len(&self) -> u64 {
        self.produced
    }

    /// Next ciphertext chunk, or `None` at end of stream.
    ///
    /// A call either returns a whole chunk (already folded into the digest)
    /// or an error with the stream position unchanged.
    pub fn produce(&mut self) -> UploadResult<Option<Bytes>> {
        let chunk = match self.phase {
            Phase::Finished => {
                return Err(UploadError::State(
                    "produce() called after finish()".into(),
                ))
            }
            Phase::Drained => return Ok(None),
            Phase::Header => {
                self.check_room(NONCE_SIZE)?;
                self.phase = Phase::Segments;
                self.iv.to_vec()
            }
            Phase::Segments => {
                let (sealed, taken, is_final) = self.seal_next_segment()?;
                self.check_room(sealed.len())?;
                self.consumed += taken;
                self.segment += 1;
                if is_final {
                    self.phase = Phase::Drained;
                }
                sealed
            }
        };

        self.hasher.update(&chunk);
        self.produced += chunk.len() as u64;
        Ok(Some(Bytes::from(chunk)))
    }

    /// Close the stream, returning the total length emitted and the digest.
    ///
    /// Valid exactly once, after `produce()` has returned `None`.
    pub fn finish(&mut self) -> UploadResult<(u64, IntegrityDigest)> {
        match self.phase {
            Phase::Finished => Err(UploadError::State("finish() called twice".into())),
            Phase::Header | Phase::Segments => Err(UploadError::State(
                "finish() called before end of stream".into(),
            )),
            Phase::Drained => {
                self.phase = Phase::Finished;
                if self.produced != self.expected {
                    return Err(UploadError::InternalEncoding(format!(
                        "stream emitted {} bytes, declared {}",
                        self.produced, self.expected
                    )));
                }
                let digest = IntegrityDigest::from_hash(self.hasher.finalize());
                Ok((self.produced, digest))
            }
        }
    }

    /// Seal the next segment without advancing the stream.
    ///
    /// Returns (sealed bytes, plaintext bytes consumed, is_final).
    fn seal_next_segment(&self) -> UploadResult<(Vec<u8>, usize, bool)> {
        let remaining = &self.plaintext[self.consumed..];
        let is_final = remaining.len() < SEGMENT_SIZE;
        let take = if is_final { remaining.len() } else { SEGMENT_SIZE };

        let nonce = segment_nonce(&self.iv, self.segment);
        let aad = segment_aad(self.segment, is_final);

        let sealed = self
            .cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &remaining[..take],
                    aad: &aad,
                },
            )
            .map_err(|e| {
                UploadError::InternalEncoding(format!(
                    "segment {} encryption failed: {e}",
                    self.segment
                ))
            })?;

        Ok((sealed, take, is_final))
    }

    /// Refuse a chunk that would push the stream past its declared length.
    fn check_room(&self, len: usize) -> UploadResult<()> {
        let after = self.produced + len as u64;
        if after > self.expected {
            return Err(UploadError::InternalEncoding(format!(
                "stream would emit {after} bytes, declared {}",
                self.expected
            )));
        }
        Ok(())
    }
}

/// A fully materialized sealed avatar, ready for upload.
#[derive(Debug, Clone)]
pub struct SealedAvatar {
    pub ciphertext: Bytes,
    pub digest: IntegrityDigest,
}

impl SealedAvatar {
    pub fn len(&self) -> u64 {
        self.ciphertext.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}

/// Drive a [`StreamingCipherDigester`] to completion into a buffer sized from
/// [`ciphertext_len`] up front.
pub fn seal_avatar(plaintext: &[u8], key: &ProfileKey) -> UploadResult<SealedAvatar> {
    let mut stream = StreamingCipherDigester::open(plaintext, key.as_bytes())?;
    let expected = stream.expected_len();
    let mut buf = Vec::with_capacity(expected as usize);

    while let Some(chunk) = stream.produce()? {
        buf.extend_from_slice(&chunk);
    }
    let (len, digest) = stream.finish()?;

    if buf.len() as u64 != len {
        return Err(UploadError::InternalEncoding(format!(
            "buffered {} bytes, stream reported {len}",
            buf.len()
        )));
    }

    debug!(
        plaintext_len = plaintext.len(),
        ciphertext_len = len,
        digest = %digest,
        "avatar sealed"
    );

    Ok(SealedAvatar {
        ciphertext: Bytes::from(buf),
        digest,
    })
}
