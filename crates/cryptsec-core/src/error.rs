use std::path::PathBuf;

use thiserror::Error;

pub type CryptsecResult<T> = Result<T, CryptsecError>;

#[derive(Debug, Error)]
pub enum CryptsecError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cipher setup failed: {0}")]
    CipherSetup(String),

    /// Sealing one chunk failed; scoped to the file being written.
    #[error("sealing chunk failed: {0}")]
    Seal(String),

    /// Tag mismatch while opening a chunk: wrong key or tampered data.
    #[error("authentication failed at chunk {chunk}: wrong key or corrupted data")]
    Authentication { chunk: u64 },

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("secure erase of {} failed: {source}", .path.display())]
    Erase {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("{} is already encrypted", .0.display())]
    AlreadyEncrypted(PathBuf),

    #[error("{} is not encrypted", .0.display())]
    NotEncrypted(PathBuf),

    #[error("{} is too short to hold a nonce ({len} bytes)", .path.display())]
    MissingNonce { path: PathBuf, len: usize },

    #[error("output {} already exists", .0.display())]
    OutputExists(PathBuf),

    #[error("{} has no usable file name", .0.display())]
    InvalidPath(PathBuf),
}

impl CryptsecError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn erase(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Erase {
            path: path.into(),
            source,
        }
    }

    /// Errors that make every remaining file in a run pointless to attempt.
    ///
    /// Everything else is scoped to a single file and only gets reported.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            Self::Kdf(_) | Self::CipherSetup(_) | Self::Config(_)
        )
    }

    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}
