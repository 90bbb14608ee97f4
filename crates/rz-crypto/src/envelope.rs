//! Authenticated encryption envelopes: ChaCha20-Poly1305, 96-bit nonce
//!
//! The envelope is the unit exchanged with untrusted storage. It is
//! self-describing: ciphertext + nonce, plus optional KDF parameters when
//! the key is password-derived, so any device holding the right password
//! can decrypt with no other context. Decryption fails closed — a tag
//! mismatch never yields partial plaintext.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::KdfParams;
use crate::{ENVELOPE_NONCE_SIZE, KEY_SIZE, SALT_SIZE, TAG_SIZE};

/// KDF parameters embedded in envelopes whose key is password-derived.
/// The salt is public; only the password is secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationRecord {
    #[serde(with = "b64_array")]
    pub salt: [u8; SALT_SIZE],
    #[serde(flatten)]
    pub params: KdfParams,
}

/// A self-contained ciphertext package.
///
/// The ciphertext includes the Poly1305 tag; the server learns nothing
/// about the plaintext beyond its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    #[serde(with = "b64_vec")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64_array")]
    pub nonce: [u8; ENVELOPE_NONCE_SIZE],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf: Option<KeyDerivationRecord>,
}

impl EncryptedEnvelope {
    /// Compact binary form: `[12-byte nonce][ciphertext + 16-byte tag]`.
    /// KDF parameters are not carried — use the serde form when they matter.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(ENVELOPE_NONCE_SIZE + self.ciphertext.len());
        blob.extend_from_slice(&self.nonce);
        blob.extend_from_slice(&self.ciphertext);
        blob
    }

    /// Parse the compact binary form produced by [`to_blob`](Self::to_blob).
    pub fn from_blob(blob: &[u8]) -> CryptoResult<Self> {
        if blob.len() < ENVELOPE_NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Malformed(format!(
                "envelope blob too short: {} bytes (minimum {})",
                blob.len(),
                ENVELOPE_NONCE_SIZE + TAG_SIZE
            )));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(ENVELOPE_NONCE_SIZE);
        let mut nonce = [0u8; ENVELOPE_NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);
        Ok(Self { ciphertext: ciphertext.to_vec(), nonce, kdf: None })
    }
}

/// Encrypt plaintext under a 256-bit key with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_SIZE]) -> CryptoResult<EncryptedEnvelope> {
    encrypt_inner(plaintext, key, None)
}

/// Encrypt and record the KDF parameters the key was derived with, so the
/// envelope is decryptable from the password alone on any device.
pub fn encrypt_with_kdf(
    plaintext: &[u8],
    key: &[u8; KEY_SIZE],
    kdf: KeyDerivationRecord,
) -> CryptoResult<EncryptedEnvelope> {
    encrypt_inner(plaintext, key, Some(kdf))
}

fn encrypt_inner(
    plaintext: &[u8],
    key: &[u8; KEY_SIZE],
    kdf: Option<KeyDerivationRecord>,
) -> CryptoResult<EncryptedEnvelope> {
    let cipher = ChaCha20Poly1305::new(key.into());

    let mut nonce = [0u8; ENVELOPE_NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedEnvelope { ciphertext, nonce, kdf })
}

/// Decrypt an envelope, verifying the authentication tag.
///
/// Fails closed: any tampering with ciphertext or nonce, or a wrong key,
/// yields [`CryptoError::Integrity`] and no plaintext.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &[u8; KEY_SIZE]) -> CryptoResult<Vec<u8>> {
    if envelope.ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::Malformed(format!(
            "ciphertext too short: {} bytes",
            envelope.ciphertext.len()
        )));
    }

    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_ref())
        .map_err(|_| CryptoError::Integrity("envelope tag verification failed".into()))
}

mod b64_vec {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

mod b64_array {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let decoded = STANDARD.decode(&s).map_err(serde::de::Error::custom)?;
        decoded
            .try_into()
            .map_err(|v: Vec<u8>| serde::de::Error::custom(format!("expected {N} bytes, got {}", v.len())))
    }
}
