//! cryptsec-fs: files at rest, one chunk stream at a time
//!
//! # Overview
//! - `transform`: encrypt/decrypt a single file into a staged output that is
//!   renamed into place only after the whole stream succeeds
//! - `erase`: multi-pass overwrite then delete of the plaintext source
//! - `walk`: one-shot enumeration of regular files under a root
//! - `pool`: bounded worker pool that drives a transform over every file
//!
//! Secure erase is best-effort. Overwriting in place does not reach old
//! blocks on wear-levelled flash, copy-on-write filesystems, or snapshots.

pub mod erase;
pub mod pool;
pub mod transform;
pub mod walk;

pub use erase::{secure_erase, FillPattern};
pub use pool::{
    effective_workers, process_directory, process_directory_with, process_path, run_pool,
    PoolOptions, ProgressFn,
};
pub use transform::{
    decrypt_file, encrypt_file, encrypted_path, is_encrypted_path, plaintext_path, transform_file,
};
pub use walk::collect_files;
