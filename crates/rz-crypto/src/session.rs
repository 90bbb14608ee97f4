//! Session-scoped key context
//!
//! All key material for an authenticated session lives here, owned by the
//! authentication flow and passed explicitly to every cryptographic call.
//! Nothing in this crate holds keys in module-level state, so a process
//! can run multiple sessions and tests can construct contexts directly.
//!
//! The context is never serialized; dropping it (logout, process exit)
//! zeroizes the keys.

use secrecy::SecretString;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_auth_proof, derive_master_key, AuthProof, KdfParams, MasterKey};
use crate::keys::derive_name_key;
use crate::{KEY_SIZE, SALT_SIZE};

/// In-memory key material for one authenticated session.
pub struct SessionContext {
    master: MasterKey,
    unwrap_secret: Option<StaticSecret>,
}

impl SessionContext {
    /// Unlock a session from a password.
    ///
    /// The auth proof is verified *before* the derived key is handed out
    /// for bulk decryption, so a wrong password always surfaces as
    /// [`CryptoError::Authentication`] — never as a downstream integrity
    /// failure on some envelope.
    pub fn unlock(
        password: &SecretString,
        salt: &[u8; SALT_SIZE],
        params: &KdfParams,
        expected_proof: &AuthProof,
    ) -> CryptoResult<Self> {
        let proof = derive_auth_proof(password, salt, params)?;
        if &proof != expected_proof {
            return Err(CryptoError::Authentication);
        }

        let master = derive_master_key(password, salt, params)?;
        Ok(Self { master, unwrap_secret: None })
    }

    /// Build a context directly from key material (recovery flows, tests).
    pub fn from_master_key(master: MasterKey) -> Self {
        Self { master, unwrap_secret: None }
    }

    /// Attach an X25519 secret for opening sealed boxes addressed to this
    /// session.
    pub fn with_unwrap_secret(mut self, secret: StaticSecret) -> Self {
        self.unwrap_secret = Some(secret);
        self
    }

    pub fn master_key(&self) -> &MasterKey {
        &self.master
    }

    /// The session's key-wrapping public key, if one is attached.
    pub fn unwrap_public(&self) -> Option<PublicKey> {
        self.unwrap_secret.as_ref().map(PublicKey::from)
    }

    pub fn unwrap_secret(&self) -> Option<&StaticSecret> {
        self.unwrap_secret.as_ref()
    }

    /// Convenience: the name-encryption subkey for this session.
    pub fn name_key(&self) -> CryptoResult<[u8; KEY_SIZE]> {
        derive_name_key(&self.master)
    }

    /// End the session. Equivalent to dropping the context; key material
    /// is zeroized either way.
    pub fn logout(self) {}
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("master", &"[REDACTED]")
            .field("unwrap_secret", &self.unwrap_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
