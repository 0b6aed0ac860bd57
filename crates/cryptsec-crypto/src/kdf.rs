//! Key derivation: Argon2id passphrase → symmetric key

use argon2::{Algorithm, Argon2, Params, Version};
use cryptsec_core::{CryptsecError, CryptsecResult};
use secrecy::{ExposeSecret, SecretString};
use zeroize::{Zeroize, Zeroizing};

use crate::KEY_SIZE;

/// Fixed salt shared by every run.
///
/// Identical passphrases always derive identical keys. This keeps a
/// passphrase usable across machines without storing a header, at the cost
/// of allowing key correlation between targets.
pub const KDF_SALT: &[u8] = b"random_salt";

/// A 256-bit symmetric key derived once per run.
///
/// Zeroized on drop, including on early-return and unwind paths.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub mem_cost_kib: u32,
    /// Time cost / iterations
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
}

impl KdfParams {
    /// The compile-time policy every real run uses: 16 passes over 64 MiB, 4 lanes.
    pub const POLICY: KdfParams = KdfParams {
        mem_cost_kib: 64 * 1024,
        time_cost: 16,
        parallelism: 4,
    };
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::POLICY
    }
}

/// Derive the run key from raw secret bytes using the policy parameters.
///
/// The caller still owns `secret` and is responsible for zeroing it.
pub fn derive_key(secret: &[u8]) -> CryptsecResult<SymmetricKey> {
    derive_key_with(secret, KDF_SALT, &KdfParams::POLICY)
}

/// Derive the run key from a passphrase held in a `SecretString`.
pub fn derive_key_from_passphrase(passphrase: &SecretString) -> CryptsecResult<SymmetricKey> {
    derive_key(passphrase.expose_secret().as_bytes())
}

/// Derive a key with explicit salt and cost parameters.
pub fn derive_key_with(
    secret: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> CryptsecResult<SymmetricKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptsecError::Kdf(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(secret, salt, &mut key[..])
        .map_err(|e| CryptsecError::Kdf(format!("Argon2id failed: {e}")))?;

    tracing::debug!(
        mem_cost_kib = params.mem_cost_kib,
        time_cost = params.time_cost,
        parallelism = params.parallelism,
        "derived symmetric key"
    );
    Ok(SymmetricKey::from_bytes(*key))
}
