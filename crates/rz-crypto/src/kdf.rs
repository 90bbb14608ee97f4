//! Key derivation: PBKDF2-HMAC-SHA256 password → master key + auth proof
//!
//! One KDF invocation produces a 64-byte block: the lower half becomes the
//! encryption master key (never leaves the client), the upper half becomes
//! the auth proof the server stores for login verification. The server can
//! therefore check a password without ever holding the encryption key.

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, SALT_SIZE};

/// Recommended iteration floor. Derivation still succeeds below it (tests
/// use fast parameters) but logs a warning.
pub const RECOMMENDED_ITERATIONS: u32 = 600_000;

/// A 256-bit master key derived from a password via PBKDF2.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Login verification hash, safe to transmit and store server-side.
///
/// Comparison is constant-time.
#[derive(Clone)]
pub struct AuthProof {
    bytes: [u8; KEY_SIZE],
}

impl AuthProof {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        STANDARD.encode(self.bytes)
    }

    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let decoded = STANDARD
            .decode(s)
            .map_err(|e| CryptoError::Serialization(format!("auth proof base64: {e}")))?;
        if decoded.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength { expected: KEY_SIZE, got: decoded.len() });
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }
}

impl PartialEq for AuthProof {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for AuthProof {}

impl std::fmt::Debug for AuthProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProof").field("bytes", &"[REDACTED]").finish()
    }
}

/// Hash function selector for the KDF, recorded in envelope metadata so
/// ciphertext stays decryptable after a future algorithm migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KdfHash {
    #[default]
    Sha256,
}

/// PBKDF2 parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Iteration count (default: 600_000)
    pub iterations: u32,
    /// Underlying hash function
    #[serde(default)]
    pub hash: KdfHash,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { iterations: RECOMMENDED_ITERATIONS, hash: KdfHash::Sha256 }
    }
}

/// Generate a random 32-byte KDF salt.
///
/// The salt is stored alongside the encrypted data (it does not need to be
/// secret); every device re-derives the identical key from password + salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive the 256-bit encryption master key from a password and salt.
///
/// Deterministic for identical inputs.
pub fn derive_master_key(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> CryptoResult<MasterKey> {
    let mut block = derive_block(password, salt, params)?;
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&block[..KEY_SIZE]);
    block.zeroize();
    Ok(MasterKey::from_bytes(key))
}

/// Derive the login verification hash from a password and salt.
///
/// Same KDF invocation as [`derive_master_key`], different output bytes:
/// the proof shares no bits with the encryption key.
pub fn derive_auth_proof(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> CryptoResult<AuthProof> {
    let mut block = derive_block(password, salt, params)?;
    let mut proof = [0u8; KEY_SIZE];
    proof.copy_from_slice(&block[KEY_SIZE..]);
    block.zeroize();
    Ok(AuthProof::from_bytes(proof))
}

fn derive_block(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> CryptoResult<[u8; KEY_SIZE * 2]> {
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation("iteration count must be non-zero".into()));
    }
    if params.iterations < RECOMMENDED_ITERATIONS {
        tracing::warn!(
            iterations = params.iterations,
            floor = RECOMMENDED_ITERATIONS,
            "KDF iteration count below recommended floor"
        );
    }

    let mut block = [0u8; KEY_SIZE * 2];
    match params.hash {
        KdfHash::Sha256 => pbkdf2_hmac::<Sha256>(
            password.expose_secret().as_bytes(),
            salt,
            params.iterations,
            &mut block,
        ),
    }
    Ok(block)
}
