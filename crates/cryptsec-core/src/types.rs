use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CryptsecError;

/// Direction of a transform run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Encrypt,
    Decrypt,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Encrypt => f.write_str("encrypt"),
            Mode::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// What a single-file transform did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Plaintext sealed into `<name>.cryptsec`; `bytes` counts plaintext.
    Encrypted { bytes: u64, chunks: u64 },
    /// Ciphertext opened back into `<name>`; `bytes` counts plaintext.
    Decrypted { bytes: u64, chunks: u64 },
    /// No cipher operation was performed.
    Skipped { reason: String },
}

impl TransformOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// A per-file failure collected by the directory pool.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: CryptsecError,
}

/// Summary of a directory run.
#[derive(Debug, Default)]
pub struct DirectoryReport {
    /// Regular files discovered during enumeration
    pub total: usize,
    /// Files handed to a transform (less than `total` only when cancelled)
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failures: Vec<FileFailure>,
}

impl DirectoryReport {
    pub fn record(&mut self, path: PathBuf, result: Result<TransformOutcome, CryptsecError>) {
        self.processed += 1;
        match result {
            Ok(outcome) if outcome.is_skipped() => self.skipped += 1,
            Ok(_) => self.succeeded += 1,
            Err(error) => self.failures.push(FileFailure { path, error }),
        }
    }

    pub fn merge(&mut self, other: DirectoryReport) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.processed == self.total
    }
}
