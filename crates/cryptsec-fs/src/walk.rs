//! One-shot enumeration of regular files under a root.
//!
//! Symlinks, sockets, and other special files are neither followed nor
//! returned. Exclude patterns are matched against entry names; an excluded
//! directory is not descended into.

use std::path::{Path, PathBuf};

use cryptsec_core::{CryptsecError, CryptsecResult};

/// Collect every regular file under `root` (recursively), sorted.
pub fn collect_files(root: &Path, exclude_patterns: &[String]) -> CryptsecResult<Vec<PathBuf>> {
    let excludes = exclude_patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p)
                .map_err(|e| CryptsecError::Config(format!("invalid exclude pattern {p:?}: {e}")))
        })
        .collect::<CryptsecResult<Vec<_>>>()?;

    let mut files = Vec::new();
    collect_files_inner(root, &mut files, &excludes)?;
    files.sort();
    Ok(files)
}

fn collect_files_inner(
    dir: &Path,
    out: &mut Vec<PathBuf>,
    excludes: &[glob::Pattern],
) -> CryptsecResult<()> {
    for entry in std::fs::read_dir(dir).map_err(|e| CryptsecError::io(dir, e))? {
        let entry = entry.map_err(|e| CryptsecError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| CryptsecError::io(&path, e))?;

        let name = entry.file_name();
        if let Some(name) = name.to_str() {
            if excludes.iter().any(|p| p.matches(name)) {
                continue;
            }
        }

        if file_type.is_dir() {
            collect_files_inner(&path, out, excludes)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}
