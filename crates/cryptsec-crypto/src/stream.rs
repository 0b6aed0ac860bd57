//! Ordered chunk streams over one base nonce.
//!
//! Chunk `i` is sealed under `chunk_nonce(base, i)` with a one-byte AAD that
//! marks the final chunk. Both sides advance their counter exactly once per
//! chunk, so chunks can only be processed in file order.

use cryptsec_core::{CryptsecError, CryptsecResult};

use crate::chunk::{chunk_nonce, ChunkCipher};
use crate::kdf::SymmetricKey;
use crate::NONCE_SIZE;

const AAD_MORE: [u8; 1] = [0x00];
const AAD_FINAL: [u8; 1] = [0x01];

fn aad(is_final: bool) -> &'static [u8] {
    if is_final {
        &AAD_FINAL
    } else {
        &AAD_MORE
    }
}

/// Seals consecutive chunks of one file.
pub struct StreamSealer {
    cipher: ChunkCipher,
    base_nonce: [u8; NONCE_SIZE],
    next_index: u64,
    finished: bool,
}

impl StreamSealer {
    pub fn new(key: &SymmetricKey, base_nonce: [u8; NONCE_SIZE]) -> CryptsecResult<Self> {
        Ok(Self {
            cipher: ChunkCipher::new(key)?,
            base_nonce,
            next_index: 0,
            finished: false,
        })
    }

    pub fn base_nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.base_nonce
    }

    /// Number of chunks sealed so far.
    pub fn chunks(&self) -> u64 {
        self.next_index
    }

    pub fn seal_next(&mut self, plaintext: &[u8], is_final: bool) -> CryptsecResult<Vec<u8>> {
        if self.finished {
            return Err(CryptsecError::Seal(
                "stream already sealed its final chunk".into(),
            ));
        }
        let nonce = chunk_nonce(&self.base_nonce, self.next_index);
        let sealed = self.cipher.seal(&nonce, aad(is_final), plaintext)?;
        self.next_index += 1;
        self.finished = is_final;
        Ok(sealed)
    }
}

/// Opens consecutive chunks of one file.
pub struct StreamOpener {
    cipher: ChunkCipher,
    base_nonce: [u8; NONCE_SIZE],
    next_index: u64,
    finished: bool,
}

impl StreamOpener {
    pub fn new(key: &SymmetricKey, base_nonce: [u8; NONCE_SIZE]) -> CryptsecResult<Self> {
        Ok(Self {
            cipher: ChunkCipher::new(key)?,
            base_nonce,
            next_index: 0,
            finished: false,
        })
    }

    pub fn chunks(&self) -> u64 {
        self.next_index
    }

    /// True once a chunk carrying the final flag has been opened.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn open_next(&mut self, sealed: &[u8], is_final: bool) -> CryptsecResult<Vec<u8>> {
        let index = self.next_index;
        if self.finished {
            return Err(CryptsecError::Authentication { chunk: index });
        }
        let nonce = chunk_nonce(&self.base_nonce, index);
        let plaintext = self.cipher.open(&nonce, aad(is_final), sealed, index)?;
        self.next_index += 1;
        self.finished = is_final;
        Ok(plaintext)
    }
}
