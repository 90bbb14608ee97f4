//! AES-SIV file-name encryption
//!
//! Note titles and attachment file names are stored server-side as opaque
//! identifiers, but they must stay *stable*: the same name has to map to
//! the same ciphertext so it can be used as a lookup key. AES-SIV gives
//! deterministic authenticated encryption (SIV = Synthetic Initialization
//! Vector), unlike the randomized envelope AEAD.

use aes_siv::{
    aead::{Aead, KeyInit},
    Aes256SivAead, Nonce,
};

use crate::error::{CryptoError, CryptoResult};
use crate::KEY_SIZE;

/// Encrypt a name using AES-256-SIV.
///
/// Deterministic: the same name + key always produces the same ciphertext.
/// The `name_key` should come from [`crate::keys::derive_name_key`].
///
/// Returns the encrypted name as a hex string (safe in URLs and object keys).
pub fn encrypt_name(name_key: &[u8; KEY_SIZE], plaintext_name: &str) -> CryptoResult<String> {
    let cipher = Aes256SivAead::new((&expand_siv_key(name_key)?).into());
    // AES-SIV uses a zero nonce for deterministic encryption
    let nonce = Nonce::default();

    let ciphertext = cipher
        .encrypt(&nonce, plaintext_name.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(format!("name encryption: {e}")))?;

    Ok(hex::encode(&ciphertext))
}

/// Decrypt a name produced by [`encrypt_name`].
pub fn decrypt_name(name_key: &[u8; KEY_SIZE], encrypted_hex: &str) -> CryptoResult<String> {
    let ciphertext = hex::decode(encrypted_hex)
        .map_err(|e| CryptoError::Malformed(format!("name hex decode: {e}")))?;

    let cipher = Aes256SivAead::new((&expand_siv_key(name_key)?).into());
    let nonce = Nonce::default();

    let plaintext = cipher
        .decrypt(&nonce, ciphertext.as_ref())
        .map_err(|_| CryptoError::Integrity("name decryption failed".into()))?;

    String::from_utf8(plaintext)
        .map_err(|e| CryptoError::Malformed(format!("decrypted name is not UTF-8: {e}")))
}

/// AES-256-SIV needs a 64-byte key (two 32-byte sub-keys); expand the
/// 32-byte name key via HKDF.
fn expand_siv_key(name_key: &[u8; KEY_SIZE]) -> CryptoResult<[u8; 64]> {
    let mut double_key = [0u8; 64];
    let hkdf = hkdf::Hkdf::<sha2::Sha256>::new(None, name_key);
    hkdf.expand(b"rz-name-aes-siv", &mut double_key)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand for AES-SIV: {e}")))?;
    Ok(double_key)
}

mod hex {
    pub fn encode(data: &[u8]) -> String {
        let mut s = String::with_capacity(data.len() * 2);
        for byte in data {
            s.push_str(&format!("{byte:02x}"));
        }
        s
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err("odd-length hex string".to_string());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| format!("invalid hex: {e}")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_name_key() -> [u8; KEY_SIZE] {
        [0x55u8; KEY_SIZE]
    }

    #[test]
    fn test_encrypt_decrypt_name_roundtrip() {
        let key = test_name_key();
        let name = "reading-notes.md";

        let encrypted = encrypt_name(&key, name).unwrap();
        let decrypted = decrypt_name(&key, &encrypted).unwrap();

        assert_eq!(decrypted, name);
    }

    #[test]
    fn test_deterministic_encryption() {
        let key = test_name_key();
        let name = "projects/garden.md";

        let enc1 = encrypt_name(&key, name).unwrap();
        let enc2 = encrypt_name(&key, name).unwrap();

        assert_eq!(enc1, enc2, "AES-SIV must be deterministic");
    }

    #[test]
    fn test_different_names_different_ciphertext() {
        let key = test_name_key();

        let enc1 = encrypt_name(&key, "note_a.md").unwrap();
        let enc2 = encrypt_name(&key, "note_b.md").unwrap();

        assert_ne!(enc1, enc2);
    }

    #[test]
    fn test_different_keys_different_ciphertext() {
        let key1 = [0x11u8; KEY_SIZE];
        let key2 = [0x22u8; KEY_SIZE];

        let enc1 = encrypt_name(&key1, "same-name.md").unwrap();
        let enc2 = encrypt_name(&key2, "same-name.md").unwrap();

        assert_ne!(enc1, enc2);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let key1 = [0x11u8; KEY_SIZE];
        let key2 = [0x22u8; KEY_SIZE];

        let encrypted = encrypt_name(&key1, "secret-draft.md").unwrap();
        let result = decrypt_name(&key2, &encrypted);

        assert!(matches!(result, Err(CryptoError::Integrity(_))));
    }

    #[test]
    fn test_unicode_name() {
        let key = test_name_key();
        let name = "zettelkasten/日記-2026-08-06.md";

        let encrypted = encrypt_name(&key, name).unwrap();
        let decrypted = decrypt_name(&key, &encrypted).unwrap();

        assert_eq!(decrypted, name);
    }
}
