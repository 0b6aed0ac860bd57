//! Per-chunk AES-256-GCM seal/open
//!
//! Sealed chunk format (binary):
//! ```text
//! [N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The nonce is not stored per chunk. Callers derive it from the file's base
//! nonce with [`chunk_nonce`].

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use cryptsec_core::{CryptsecError, CryptsecResult};
use rand::RngCore;

use crate::kdf::SymmetricKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// AES-256-GCM keyed once per file and reused for every chunk.
pub struct ChunkCipher {
    cipher: Aes256Gcm,
}

impl ChunkCipher {
    pub fn new(key: &SymmetricKey) -> CryptsecResult<Self> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptsecError::CipherSetup(format!("AES-256-GCM: {e}")))?;
        Ok(Self { cipher })
    }

    /// Seal `plaintext`; returns ciphertext with the tag appended.
    pub fn seal(
        &self,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        plaintext: &[u8],
    ) -> CryptsecResult<Vec<u8>> {
        self.cipher
            .encrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| CryptsecError::Seal(e.to_string()))
    }

    /// Open a sealed chunk. Fails closed: no plaintext escapes on any error.
    ///
    /// `chunk` only labels the error.
    pub fn open(
        &self,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        sealed: &[u8],
        chunk: u64,
    ) -> CryptsecResult<Vec<u8>> {
        if sealed.len() < TAG_SIZE {
            return Err(CryptsecError::Authentication { chunk });
        }
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload { msg: sealed, aad },
            )
            .map_err(|_| CryptsecError::Authentication { chunk })
    }
}

/// Seal a single chunk with no associated data.
pub fn seal_chunk(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> CryptsecResult<Vec<u8>> {
    ChunkCipher::new(key)?.seal(nonce, &[], plaintext)
}

/// Open a single chunk sealed by [`seal_chunk`].
pub fn open_chunk(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_SIZE],
    sealed: &[u8],
) -> CryptsecResult<Vec<u8>> {
    ChunkCipher::new(key)?.open(nonce, &[], sealed, 0)
}

/// Fresh random base nonce for one file.
pub fn generate_base_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Nonce for chunk `index`: base XOR index (8 bytes BE, right-aligned).
///
/// Distinct indices always give distinct nonces for the same base.
pub fn chunk_nonce(base: &[u8; NONCE_SIZE], index: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = *base;
    let counter = index.to_be_bytes();
    let offset = NONCE_SIZE - counter.len();
    for (dst, src) in nonce[offset..].iter_mut().zip(counter) {
        *dst ^= src;
    }
    nonce
}
