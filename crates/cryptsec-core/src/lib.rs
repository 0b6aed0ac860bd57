pub mod config;
pub mod error;
pub mod types;

pub use error::{CryptsecError, CryptsecResult, FormatError};
pub use types::{DirectoryReport, FileFailure, Mode, TransformOutcome};

/// Suffix appended to the file name of every encrypted artifact.
pub const ENCRYPTED_SUFFIX: &str = ".cryptsec";
