//! X25519 sealed boxes for asymmetric key wrapping
//!
//! Lets a sender encrypt *to* a session's public key without holding any
//! of its symmetric keys (future multi-recipient sharing). ECIES shape:
//! fresh ephemeral X25519 keypair per seal, HKDF-SHA256 over the shared
//! secret bound to both public keys, ChaCha20-Poly1305 payload.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{CryptoError, CryptoResult};
use crate::{ENVELOPE_NONCE_SIZE, KEY_SIZE, TAG_SIZE};

/// Asymmetrically encrypted payload: everything a recipient needs besides
/// their secret key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedBox {
    pub ephemeral_public: [u8; 32],
    pub nonce: [u8; ENVELOPE_NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

/// Generate an X25519 keypair for key-wrapping scenarios.
pub fn generate_keypair() -> (PublicKey, StaticSecret) {
    let secret = StaticSecret::random_from_rng(rand::thread_rng());
    let public = PublicKey::from(&secret);
    (public, secret)
}

/// Seal plaintext to a recipient's public key.
///
/// A fresh ephemeral keypair per call gives sender forward secrecy: the
/// sender retains nothing that can reopen the box.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> CryptoResult<SealedBox> {
    let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);

    let key = derive_box_key(shared.as_bytes(), &ephemeral_public, recipient)?;
    let cipher = ChaCha20Poly1305::new(&key.into());

    let mut nonce = [0u8; ENVELOPE_NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(format!("sealing: {e}")))?;

    Ok(SealedBox { ephemeral_public: ephemeral_public.to_bytes(), nonce, ciphertext })
}

/// Open a sealed box with the recipient's secret key.
pub fn open(secret: &StaticSecret, sealed: &SealedBox) -> CryptoResult<Vec<u8>> {
    if sealed.ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::Malformed(format!(
            "sealed box ciphertext too short: {} bytes",
            sealed.ciphertext.len()
        )));
    }

    let ephemeral_public = PublicKey::from(sealed.ephemeral_public);
    let recipient_public = PublicKey::from(secret);
    let shared = secret.diffie_hellman(&ephemeral_public);

    let key = derive_box_key(shared.as_bytes(), &ephemeral_public, &recipient_public)?;
    let cipher = ChaCha20Poly1305::new(&key.into());

    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_ref())
        .map_err(|_| CryptoError::Integrity("sealed box tag verification failed".into()))
}

/// HKDF the raw shared secret into the payload key, binding both public
/// keys so a box cannot be replayed against a different recipient.
fn derive_box_key(
    shared: &[u8; 32],
    ephemeral: &PublicKey,
    recipient: &PublicKey,
) -> CryptoResult<[u8; KEY_SIZE]> {
    let mut info = Vec::with_capacity(10 + 32 + 32);
    info.extend_from_slice(b"rz-sealed:");
    info.extend_from_slice(ephemeral.as_bytes());
    info.extend_from_slice(recipient.as_bytes());

    let hkdf = Hkdf::<Sha256>::new(None, shared);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(&info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand for sealed box: {e}")))?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let (public, secret) = generate_keypair();

        let sealed = seal(&public, b"wrapped file key bytes").unwrap();
        let opened = open(&secret, &sealed).unwrap();

        assert_eq!(opened, b"wrapped file key bytes");
    }

    #[test]
    fn test_ephemeral_key_fresh_per_seal() {
        let (public, _secret) = generate_keypair();

        let s1 = seal(&public, b"same payload").unwrap();
        let s2 = seal(&public, b"same payload").unwrap();

        assert_ne!(s1.ephemeral_public, s2.ephemeral_public);
        assert_ne!(s1.ciphertext, s2.ciphertext);
    }

    #[test]
    fn test_wrong_recipient_cannot_open() {
        let (public, _secret) = generate_keypair();
        let (_other_public, other_secret) = generate_keypair();

        let sealed = seal(&public, b"not for you").unwrap();
        let result = open(&other_secret, &sealed);

        assert!(matches!(result, Err(CryptoError::Integrity(_))));
    }

    #[test]
    fn test_tampered_box_fails() {
        let (public, secret) = generate_keypair();

        let mut sealed = seal(&public, b"payload").unwrap();
        sealed.ciphertext[0] ^= 0xFF;

        assert!(matches!(open(&secret, &sealed), Err(CryptoError::Integrity(_))));
    }
}
