//! Whole-file encrypt/decrypt
//!
//! Encrypted file layout:
//! ```text
//! [12 bytes: base nonce][sealed chunk 0][sealed chunk 1]...
//! ```
//! Every sealed chunk except the last is exactly `SEALED_CHUNK_SIZE` bytes.
//! An empty plaintext still produces one (empty, final) sealed chunk.
//!
//! Output goes to a temp file beside the destination and is renamed into
//! place with no-clobber semantics once the last chunk is written. Any
//! failure before that drops the temp file, so partial output never appears
//! under the destination name.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use cryptsec_core::{
    CryptsecError, CryptsecResult, FormatError, Mode, TransformOutcome, ENCRYPTED_SUFFIX,
};
use cryptsec_crypto::{
    generate_base_nonce, StreamOpener, StreamSealer, SymmetricKey, CHUNK_SIZE, NONCE_SIZE,
    SEALED_CHUNK_SIZE,
};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::erase::secure_erase;

/// True if the file name carries the encrypted suffix.
pub fn is_encrypted_path(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.as_encoded_bytes().ends_with(ENCRYPTED_SUFFIX.as_bytes()))
        .unwrap_or(false)
}

/// `a.txt` → `a.txt.cryptsec`
pub fn encrypted_path(path: &Path) -> CryptsecResult<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| FormatError::InvalidPath(path.to_path_buf()))?;
    let mut encrypted = OsString::from(name);
    encrypted.push(ENCRYPTED_SUFFIX);
    Ok(path.with_file_name(encrypted))
}

/// `a.txt.cryptsec` → `a.txt`; strips the suffix exactly once.
///
/// Works on the raw name bytes, so any name `encrypted_path` produced maps
/// back, UTF-8 or not.
pub fn plaintext_path(path: &Path) -> CryptsecResult<PathBuf> {
    let stripped = path
        .file_name()
        .map(OsStr::as_encoded_bytes)
        .and_then(|n| n.strip_suffix(ENCRYPTED_SUFFIX.as_bytes()))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| FormatError::NotEncrypted(path.to_path_buf()))?;
    // SAFETY: `stripped` came from `as_encoded_bytes` and ends immediately
    // before the ASCII suffix, a valid UTF-8 substring of the same name.
    let name = unsafe { OsStr::from_encoded_bytes_unchecked(stripped) };
    Ok(path.with_file_name(name))
}

/// Dispatch on `mode`.
pub fn transform_file(
    path: &Path,
    key: &SymmetricKey,
    mode: Mode,
    passes: u32,
) -> CryptsecResult<TransformOutcome> {
    match mode {
        Mode::Encrypt => encrypt_file(path, key, passes),
        Mode::Decrypt => decrypt_file(path, key, passes),
    }
}

/// Encrypt `path` into `path.cryptsec`, then securely erase `path`.
///
/// A path that already carries the suffix is skipped untouched.
pub fn encrypt_file(
    path: &Path,
    key: &SymmetricKey,
    passes: u32,
) -> CryptsecResult<TransformOutcome> {
    if is_encrypted_path(path) {
        info!(path = %path.display(), "skipping already encrypted file");
        return Ok(TransformOutcome::Skipped {
            reason: FormatError::AlreadyEncrypted(path.to_path_buf()).to_string(),
        });
    }

    let output = encrypted_path(path)?;
    ensure_absent(&output)?;

    let mut input = File::open(path).map_err(|e| CryptsecError::io(path, e))?;
    let mut staged = stage_beside(&output, &input, path)?;

    let mut sealer = StreamSealer::new(key, generate_base_nonce())?;
    let mut bytes = 0u64;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        writer
            .write_all(sealer.base_nonce())
            .map_err(|e| CryptsecError::io(&output, e))?;

        let mut current = Zeroizing::new(vec![0u8; CHUNK_SIZE]);
        let mut next = Zeroizing::new(vec![0u8; CHUNK_SIZE]);
        let mut len =
            read_full(&mut input, &mut current).map_err(|e| CryptsecError::io(path, e))?;
        loop {
            // Look one chunk ahead so the last chunk can be flagged as final.
            let next_len = if len == CHUNK_SIZE {
                read_full(&mut input, &mut next).map_err(|e| CryptsecError::io(path, e))?
            } else {
                0
            };
            let is_final = next_len == 0;

            let sealed = sealer.seal_next(&current[..len], is_final)?;
            writer
                .write_all(&sealed)
                .map_err(|e| CryptsecError::io(&output, e))?;
            bytes += len as u64;

            if is_final {
                break;
            }
            std::mem::swap(&mut current, &mut next);
            len = next_len;
        }
        writer.flush().map_err(|e| CryptsecError::io(&output, e))?;
    }
    drop(input);

    commit(staged, &output)?;
    let chunks = sealer.chunks();
    debug!(path = %output.display(), chunks, bytes, "wrote encrypted file");

    secure_erase(path, passes)?;
    info!(path = %path.display(), chunks, bytes, passes, "encrypted");
    Ok(TransformOutcome::Encrypted { bytes, chunks })
}

/// Decrypt `path.cryptsec` into `path`, then remove the encrypted file.
///
/// Overwrite passes are never applied to ciphertext, so `passes` only shows
/// up in logs.
pub fn decrypt_file(
    path: &Path,
    key: &SymmetricKey,
    passes: u32,
) -> CryptsecResult<TransformOutcome> {
    if !is_encrypted_path(path) {
        return Err(FormatError::NotEncrypted(path.to_path_buf()).into());
    }
    let output = plaintext_path(path)?;
    ensure_absent(&output)?;

    let mut input = File::open(path).map_err(|e| CryptsecError::io(path, e))?;

    let mut base_nonce = [0u8; NONCE_SIZE];
    let got = read_full(&mut input, &mut base_nonce).map_err(|e| CryptsecError::io(path, e))?;
    if got < NONCE_SIZE {
        return Err(FormatError::MissingNonce {
            path: path.to_path_buf(),
            len: got,
        }
        .into());
    }

    let mut staged = stage_beside(&output, &input, path)?;
    let mut opener = StreamOpener::new(key, base_nonce)?;
    let mut bytes = 0u64;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());

        let mut current = vec![0u8; SEALED_CHUNK_SIZE];
        let mut next = vec![0u8; SEALED_CHUNK_SIZE];
        let mut len =
            read_full(&mut input, &mut current).map_err(|e| CryptsecError::io(path, e))?;
        if len == 0 {
            // Nonce with no chunk records: the final chunk is missing.
            return Err(CryptsecError::Authentication { chunk: 0 });
        }
        loop {
            let next_len = if len == SEALED_CHUNK_SIZE {
                read_full(&mut input, &mut next).map_err(|e| CryptsecError::io(path, e))?
            } else {
                0
            };
            let is_final = next_len == 0;

            let plaintext = Zeroizing::new(opener.open_next(&current[..len], is_final)?);
            writer
                .write_all(&plaintext)
                .map_err(|e| CryptsecError::io(&output, e))?;
            bytes += plaintext.len() as u64;

            if is_final {
                break;
            }
            std::mem::swap(&mut current, &mut next);
            len = next_len;
        }
        writer.flush().map_err(|e| CryptsecError::io(&output, e))?;
    }
    drop(input);

    commit(staged, &output)?;
    std::fs::remove_file(path).map_err(|e| CryptsecError::io(path, e))?;

    let chunks = opener.chunks();
    if passes > 0 {
        debug!(path = %path.display(), passes, "overwrite passes not applied to ciphertext");
    }
    info!(path = %output.display(), chunks, bytes, "decrypted");
    Ok(TransformOutcome::Decrypted { bytes, chunks })
}

fn ensure_absent(output: &Path) -> CryptsecResult<()> {
    match std::fs::symlink_metadata(output) {
        Ok(_) => Err(FormatError::OutputExists(output.to_path_buf()).into()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CryptsecError::io(output, e)),
    }
}

/// Temp file in the destination's directory, carrying the source's permissions.
fn stage_beside(
    output: &Path,
    source: &File,
    source_path: &Path,
) -> CryptsecResult<NamedTempFile> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".cryptsec-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| CryptsecError::io(dir, e))?;

    let permissions = source
        .metadata()
        .map_err(|e| CryptsecError::io(source_path, e))?
        .permissions();
    staged
        .as_file()
        .set_permissions(permissions)
        .map_err(|e| CryptsecError::io(staged.path(), e))?;
    Ok(staged)
}

fn commit(staged: NamedTempFile, output: &Path) -> CryptsecResult<()> {
    staged
        .as_file()
        .sync_all()
        .map_err(|e| CryptsecError::io(staged.path(), e))?;
    staged.persist_noclobber(output).map_err(|e| {
        if e.error.kind() == ErrorKind::AlreadyExists {
            CryptsecError::from(FormatError::OutputExists(output.to_path_buf()))
        } else {
            CryptsecError::io(output, e.error)
        }
    })?;
    Ok(())
}

/// Read until `buf` is full or EOF; returns bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptsec_crypto::TAG_SIZE;
    use tempfile::TempDir;

    fn zero_key() -> SymmetricKey {
        SymmetricKey::from_bytes([0u8; 32])
    }

    #[test]
    fn test_suffix_helpers() {
        let p = Path::new("/data/a.txt");
        assert!(!is_encrypted_path(p));
        let enc = encrypted_path(p).unwrap();
        assert_eq!(enc, PathBuf::from("/data/a.txt.cryptsec"));
        assert!(is_encrypted_path(&enc));
        assert_eq!(plaintext_path(&enc).unwrap(), p);
    }

    #[test]
    fn test_plaintext_path_strips_once() {
        let p = Path::new("x.cryptsec.cryptsec");
        assert_eq!(plaintext_path(p).unwrap(), PathBuf::from("x.cryptsec"));
    }

    #[test]
    fn test_plaintext_path_rejects_bare_suffix() {
        let err = plaintext_path(Path::new("dir/.cryptsec")).unwrap_err();
        assert!(matches!(err, CryptsecError::Format(FormatError::NotEncrypted(_))));
    }

    #[test]
    fn test_suffix_only_in_directory_name_is_not_encrypted() {
        assert!(!is_encrypted_path(Path::new("backup.cryptsec/a.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_round_trips() {
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join(OsStr::from_bytes(b"caf\xE9.txt"));
        std::fs::write(&src, b"hello").unwrap();

        encrypt_file(&src, &zero_key(), 1).unwrap();
        assert!(!src.exists());
        let enc = encrypted_path(&src).unwrap();
        assert_eq!(plaintext_path(&enc).unwrap(), src);

        let outcome = decrypt_file(&enc, &zero_key(), 0).unwrap();
        assert_eq!(outcome, TransformOutcome::Decrypted { bytes: 5, chunks: 1 });
        assert_eq!(std::fs::read(&src).unwrap(), b"hello");
        assert!(!enc.exists());
    }

    #[test]
    fn test_read_full_handles_short_reads() {
        struct Trickle<'a>(&'a [u8]);
        impl Read for Trickle<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }
        let mut buf = [0u8; 4];
        let n = read_full(&mut Trickle(b"abcdef"), &mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_chunk_boundary_file_sizes() {
        let tmp = TempDir::new().unwrap();
        for size in [0usize, 1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 3 * CHUNK_SIZE] {
            let src = tmp.path().join(format!("f{size}"));
            let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            std::fs::write(&src, &data).unwrap();

            let outcome = encrypt_file(&src, &zero_key(), 0).unwrap();
            let expected_chunks = (size / CHUNK_SIZE + usize::from(size % CHUNK_SIZE != 0)).max(1);
            assert_eq!(
                outcome,
                TransformOutcome::Encrypted {
                    bytes: size as u64,
                    chunks: expected_chunks as u64
                }
            );

            let enc = encrypted_path(&src).unwrap();
            let enc_len = std::fs::metadata(&enc).unwrap().len() as usize;
            assert_eq!(enc_len, NONCE_SIZE + size + expected_chunks * TAG_SIZE);

            decrypt_file(&enc, &zero_key(), 0).unwrap();
            assert_eq!(std::fs::read(&src).unwrap(), data, "size {size}");
        }
    }

    #[test]
    fn test_no_temp_files_left_after_failure() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        std::fs::write(&src, b"hello world").unwrap();
        encrypt_file(&src, &zero_key(), 0).unwrap();

        let wrong = SymmetricKey::from_bytes([1u8; 32]);
        let enc = encrypted_path(&src).unwrap();
        assert!(decrypt_file(&enc, &wrong, 0).is_err());

        let names: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from("a.txt.cryptsec")]);
    }

    #[test]
    fn test_nonce_only_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let enc = tmp.path().join("empty.cryptsec");
        std::fs::write(&enc, [0u8; NONCE_SIZE]).unwrap();

        let err = decrypt_file(&enc, &zero_key(), 0).unwrap_err();
        assert!(err.is_authentication_failure());
        assert!(!tmp.path().join("empty").exists());
    }

    #[test]
    fn test_short_nonce_is_format_error() {
        let tmp = TempDir::new().unwrap();
        let enc = tmp.path().join("short.cryptsec");
        std::fs::write(&enc, [0u8; 5]).unwrap();

        let err = decrypt_file(&enc, &zero_key(), 0).unwrap_err();
        assert!(matches!(
            err,
            CryptsecError::Format(FormatError::MissingNonce { len: 5, .. })
        ));
    }
}
