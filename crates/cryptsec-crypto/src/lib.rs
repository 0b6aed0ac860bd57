//! cryptsec-crypto: key derivation and chunked authenticated encryption
//!
//! Pipeline: passphrase → Argon2id → 256-bit key → AES-256-GCM per chunk
//!
//! On-disk framing (produced by `cryptsec-fs`):
//! ```text
//! [12 bytes: base nonce][chunk 0 sealed][chunk 1 sealed]...
//! sealed chunk = AES-256-GCM(plaintext ≤ 4096 bytes) || 16-byte tag
//! nonce_i      = base_nonce XOR (i as u64 big-endian, right-aligned)
//! AAD_i        = 0x01 if chunk i is the last chunk, else 0x00
//! ```
//!
//! The base nonce is random per file; each chunk is sealed under a distinct
//! derived nonce so no (key, nonce) pair ever covers two plaintexts. The
//! final-chunk flag makes truncation at a chunk boundary detectable.

pub mod chunk;
pub mod kdf;
pub mod stream;

pub use chunk::{chunk_nonce, generate_base_nonce, open_chunk, seal_chunk, ChunkCipher};
pub use kdf::{derive_key, derive_key_from_passphrase, derive_key_with, KdfParams, SymmetricKey};
pub use stream::{StreamOpener, StreamSealer};

/// Size of the derived symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Plaintext bytes per chunk; only the last chunk of a file may be shorter
pub const CHUNK_SIZE: usize = 4096;

/// Bytes per sealed chunk record on disk
pub const SEALED_CHUNK_SIZE: usize = CHUNK_SIZE + TAG_SIZE;
