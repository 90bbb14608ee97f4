//! Key hierarchy: master key → derived subkeys, file key generation, key wrapping
//!
//! Bulk content is never encrypted directly under the master key. Each
//! attachment gets its own key — exposure of one file key reveals one file,
//! and random-nonce volume on large payloads never accumulates under a
//! single key.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::MasterKey;
use crate::{KEY_SIZE, TAG_SIZE, XNONCE_SIZE};

/// A per-attachment 256-bit encryption key. Zeroized on drop.
#[derive(Clone)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey").field("bytes", &"[REDACTED]").finish()
    }
}

/// Generate a random 256-bit file encryption key.
pub fn generate_file_key() -> FileKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    FileKey::from_bytes(bytes)
}

/// Deterministically derive a file key from the master key and a file id
/// via HKDF-SHA256. Used where the wrapped-key record is unavailable
/// (e.g. re-deriving during recovery); the id acts as the domain string.
pub fn derive_file_key(master: &MasterKey, file_id: &[u8; 32]) -> CryptoResult<FileKey> {
    let mut info = Vec::with_capacity(8 + 32);
    info.extend_from_slice(b"rz-file:");
    info.extend_from_slice(file_id);
    let okm = hkdf_derive(master.as_bytes(), &info)?;
    Ok(FileKey::from_bytes(okm))
}

/// Derive the note/file-name encryption key from the master key.
pub fn derive_name_key(master: &MasterKey) -> CryptoResult<[u8; KEY_SIZE]> {
    hkdf_derive(master.as_bytes(), b"rz-names")
}

/// HKDF-SHA256 key derivation with a domain-specific info string.
fn hkdf_derive(ikm: &[u8; KEY_SIZE], info: &[u8]) -> CryptoResult<[u8; KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}

/// Wrap (encrypt) a file key under the master key.
///
/// Uses XChaCha20-Poly1305 with a random nonce.
/// Output: `[24-byte nonce][ciphertext + 16-byte tag]`
pub fn wrap_key(master: &MasterKey, file_key: &FileKey) -> CryptoResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(master.as_bytes().into());

    let mut nonce_bytes = [0u8; XNONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, file_key.as_bytes().as_ref())
        .map_err(|e| CryptoError::EncryptionFailed(format!("key wrapping: {e}")))?;

    let mut result = Vec::with_capacity(XNONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Unwrap (decrypt) a file key with the master key.
///
/// Input: `[24-byte nonce][ciphertext + 16-byte tag]` (output of `wrap_key`)
pub fn unwrap_key(master: &MasterKey, wrapped: &[u8]) -> CryptoResult<FileKey> {
    if wrapped.len() < XNONCE_SIZE + KEY_SIZE + TAG_SIZE {
        return Err(CryptoError::Malformed(format!(
            "wrapped key too short: {} bytes (expected at least {})",
            wrapped.len(),
            XNONCE_SIZE + KEY_SIZE + TAG_SIZE
        )));
    }

    let (nonce_bytes, ciphertext) = wrapped.split_at(XNONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(master.as_bytes().into());

    let mut plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Integrity("key unwrap tag verification failed".into()))?;

    if plaintext.len() != KEY_SIZE {
        plaintext.zeroize();
        return Err(CryptoError::InvalidKeyLength { expected: KEY_SIZE, got: plaintext.len() });
    }

    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();

    Ok(FileKey::from_bytes(key_bytes))
}
