//! Per-chunk XChaCha20-Poly1305 encryption/decryption
//!
//! Encrypted chunk format (binary):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! AAD = chunk_index (8 bytes, big-endian) || file_id (32 bytes)
//! ```
//!
//! The AAD binds each chunk to its position and file, so a verified chunk
//! cannot be reordered within a file or spliced in from another one.
//! Chunks carry no cross-chunk state: any single chunk decrypts alone
//! given (key, index, file_id), which is what makes partial and parallel
//! fetches possible.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::FileKey;
use crate::{TAG_SIZE, XNONCE_SIZE};

/// Encrypt a single chunk with XChaCha20-Poly1305.
///
/// - `file_key`: the per-attachment encryption key
/// - `chunk_index`: zero-based index of this chunk within the file
/// - `file_id`: 32-byte attachment identifier
/// - `plaintext`: the chunk data
///
/// Returns: `[24-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt_chunk(
    file_key: &FileKey,
    chunk_index: u64,
    file_id: &[u8; 32],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(file_key.as_bytes().into());

    let mut nonce_bytes = [0u8; XNONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let aad = build_aad(chunk_index, file_id);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: &aad })
        .map_err(|e| CryptoError::EncryptionFailed(format!("chunk encryption: {e}")))?;

    let mut result = Vec::with_capacity(XNONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt a single chunk with XChaCha20-Poly1305.
///
/// `encrypted` is the `[nonce][ciphertext][tag]` blob from [`encrypt_chunk`];
/// `chunk_index` and `file_id` must match the values used at encryption.
pub fn decrypt_chunk(
    file_key: &FileKey,
    chunk_index: u64,
    file_id: &[u8; 32],
    encrypted: &[u8],
) -> CryptoResult<Vec<u8>> {
    if encrypted.len() < XNONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Malformed(format!(
            "encrypted chunk too short: {} bytes (minimum {})",
            encrypted.len(),
            XNONCE_SIZE + TAG_SIZE
        )));
    }

    let (nonce_bytes, ciphertext) = encrypted.split_at(XNONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(file_key.as_bytes().into());

    let aad = build_aad(chunk_index, file_id);

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad: &aad })
        .map_err(|_| {
            CryptoError::Integrity(format!(
                "chunk {chunk_index} tag verification failed (wrong key, corrupted data, or chunk out of place)"
            ))
        })
}

/// Build AAD: chunk_index (8 bytes BE) || file_id (32 bytes)
fn build_aad(chunk_index: u64, file_id: &[u8; 32]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(8 + 32);
    aad.extend_from_slice(&chunk_index.to_be_bytes());
    aad.extend_from_slice(file_id);
    aad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_file_key;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_file_key();
        let file_id = [0xABu8; 32];
        let plaintext = b"attachment chunk payload";

        let encrypted = encrypt_chunk(&key, 0, &file_id, plaintext).unwrap();
        let decrypted = decrypt_chunk(&key, 0, &file_id, &encrypted).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = generate_file_key();
        let file_id = [0u8; 32];

        let encrypted = encrypt_chunk(&key, 0, &file_id, b"").unwrap();
        let decrypted = decrypt_chunk(&key, 0, &file_id, &encrypted).unwrap();

        assert_eq!(decrypted, b"");
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let key1 = generate_file_key();
        let key2 = generate_file_key();
        let file_id = [0u8; 32];

        let encrypted = encrypt_chunk(&key1, 0, &file_id, b"secret data").unwrap();
        let result = decrypt_chunk(&key2, 0, &file_id, &encrypted);

        assert!(matches!(result, Err(CryptoError::Integrity(_))));
    }

    #[test]
    fn test_decrypt_wrong_chunk_index() {
        let key = generate_file_key();
        let file_id = [0u8; 32];

        let encrypted = encrypt_chunk(&key, 0, &file_id, b"secret data").unwrap();
        let result = decrypt_chunk(&key, 1, &file_id, &encrypted);

        assert!(result.is_err(), "wrong chunk_index must fail (AAD mismatch)");
    }

    #[test]
    fn test_decrypt_wrong_file_id() {
        let key = generate_file_key();
        let file_id_a = [0xAAu8; 32];
        let file_id_b = [0xBBu8; 32];

        let encrypted = encrypt_chunk(&key, 0, &file_id_a, b"secret data").unwrap();
        let result = decrypt_chunk(&key, 0, &file_id_b, &encrypted);

        assert!(result.is_err(), "wrong file_id must fail (AAD mismatch)");
    }

    #[test]
    fn test_each_chunk_gets_fresh_nonce() {
        let key = generate_file_key();
        let file_id = [0u8; 32];

        let e1 = encrypt_chunk(&key, 0, &file_id, b"same bytes").unwrap();
        let e2 = encrypt_chunk(&key, 0, &file_id, b"same bytes").unwrap();

        assert_ne!(&e1[..XNONCE_SIZE], &e2[..XNONCE_SIZE]);
    }

    #[test]
    fn test_tampered_ciphertext() {
        let key = generate_file_key();
        let file_id = [0u8; 32];

        let mut encrypted = encrypt_chunk(&key, 0, &file_id, b"secret data").unwrap();
        encrypted[XNONCE_SIZE + 1] ^= 0xFF;

        let result = decrypt_chunk(&key, 0, &file_id, &encrypted);
        assert!(matches!(result, Err(CryptoError::Integrity(_))));
    }
}
