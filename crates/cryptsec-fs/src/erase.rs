//! Multi-pass overwrite, then delete
//!
//! Pass `p` fills the file with zeros (`p % 3 == 0`), 0xFF bytes
//! (`p % 3 == 1`) or fresh random bytes (`p % 3 == 2`), in 4096-byte
//! windows, without changing the file length. Each pass is flushed to disk
//! before the next one starts.
//!
//! This only reduces recoverability on storage that rewrites blocks in
//! place. Flash translation layers, copy-on-write filesystems, and snapshots
//! can all keep the old contents.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use cryptsec_core::{CryptsecError, CryptsecResult};
use rand::RngCore;
use tracing::debug;

/// Overwrite window in bytes
pub const ERASE_WINDOW: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPattern {
    Zeros,
    Ones,
    Random,
}

impl FillPattern {
    pub fn for_pass(pass: u32) -> Self {
        match pass % 3 {
            0 => FillPattern::Zeros,
            1 => FillPattern::Ones,
            _ => FillPattern::Random,
        }
    }
}

/// Overwrite `path` `passes` times, then remove it. `passes == 0` is a plain delete.
///
/// A failed pass leaves the file in place, partially overwritten.
pub fn secure_erase(path: &Path, passes: u32) -> CryptsecResult<()> {
    if passes > 0 {
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| CryptsecError::erase(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| CryptsecError::erase(path, e))?
            .len();

        for pass in 0..passes {
            let pattern = FillPattern::for_pass(pass);
            overwrite_pass(&mut file, len, pattern).map_err(|e| CryptsecError::erase(path, e))?;
            debug!(path = %path.display(), pass, ?pattern, len, "overwrite pass complete");
        }
    }

    std::fs::remove_file(path).map_err(|e| CryptsecError::erase(path, e))
}

/// Overwrite the first `len` bytes of `file` with `pattern` and sync.
pub fn overwrite_pass(file: &mut File, len: u64, pattern: FillPattern) -> std::io::Result<()> {
    let mut window = [0u8; ERASE_WINDOW];
    if pattern == FillPattern::Ones {
        window.fill(0xFF);
    }

    file.seek(SeekFrom::Start(0))?;
    let mut written = 0u64;
    while written < len {
        let n = (len - written).min(ERASE_WINDOW as u64) as usize;
        if pattern == FillPattern::Random {
            rand::thread_rng().fill_bytes(&mut window[..n]);
        }
        file.write_all(&window[..n])?;
        written += n as u64;
    }
    file.sync_all()
}
