//! Share grants: mint, redeem, revoke
//!
//! The disclosure key is generated client-side, encrypts the payload via
//! the envelope AEAD, and is returned to the caller for embedding in the
//! link fragment. Only `{grant_id, envelope, expiry, quota}` ever reaches
//! the store.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroize;

use rz_core::types::PrincipalId;
use rz_crypto::envelope::{decrypt, encrypt, EncryptedEnvelope};
use rz_crypto::KEY_SIZE;

use crate::error::{ShareError, ShareResult};
use crate::store::GrantStore;

/// The symmetric key for one grant's payload. Lives in the link fragment
/// and in memory on the two endpoints — nowhere else.
#[derive(Clone)]
pub struct DisclosureKey {
    bytes: [u8; KEY_SIZE],
}

impl DisclosureKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// URL-safe encoding for the link fragment (no padding).
    pub fn to_fragment(&self) -> String {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        URL_SAFE_NO_PAD.encode(self.bytes)
    }

    pub fn from_fragment(fragment: &str) -> ShareResult<Self> {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let decoded = URL_SAFE_NO_PAD
            .decode(fragment)
            .map_err(|e| ShareError::Link(format!("fragment base64: {e}")))?;
        let bytes: [u8; KEY_SIZE] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| ShareError::Link(format!("fragment key is {} bytes", v.len())))?;
        Ok(Self { bytes })
    }
}

impl Drop for DisclosureKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DisclosureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisclosureKey").field("bytes", &"[REDACTED]").finish()
    }
}

/// Server-side grant record. Note the absence of any key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareGrant {
    pub grant_id: Uuid,
    pub envelope: EncryptedEnvelope,
    pub created_by: PrincipalId,
    /// Unix seconds, compared against the server clock
    pub expires_at: Option<u64>,
    pub max_uses: Option<u32>,
    pub use_count: u32,
}

/// Limits applied at mint time.
#[derive(Debug, Clone, Default)]
pub struct GrantOptions {
    /// Unix seconds; past this instant redemption fails regardless of quota
    pub expires_at: Option<u64>,
    /// Redemption ceiling; `None` = unlimited
    pub max_uses: Option<u32>,
}

/// Current unix timestamp in seconds (server-trusted clock).
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Mint a grant: encrypt `payload` under a fresh disclosure key, persist
/// the ciphertext record, and hand the key back for the link fragment.
pub async fn create_grant<S: GrantStore + ?Sized>(
    store: &S,
    payload: &[u8],
    opts: GrantOptions,
    creator: &PrincipalId,
) -> ShareResult<(Uuid, DisclosureKey)> {
    let key = DisclosureKey::generate();
    let envelope = encrypt(payload, key.as_bytes())?;
    let grant_id = Uuid::new_v4();

    store
        .insert(ShareGrant {
            grant_id,
            envelope,
            created_by: creator.clone(),
            expires_at: opts.expires_at,
            max_uses: opts.max_uses,
            use_count: 0,
        })
        .await?;

    tracing::debug!(
        grant = %grant_id,
        expires_at = ?opts.expires_at,
        max_uses = ?opts.max_uses,
        "share grant minted"
    );

    Ok((grant_id, key))
}

/// Redeem a grant: the store atomically enforces expiry and quota before
/// releasing ciphertext; decryption happens here, client-side.
pub async fn redeem_grant<S: GrantStore + ?Sized>(
    store: &S,
    grant_id: &Uuid,
    key: &DisclosureKey,
    now: u64,
) -> ShareResult<Vec<u8>> {
    let envelope = store.consume(grant_id, now).await?;
    Ok(decrypt(&envelope, key.as_bytes())?)
}

/// Revoke a grant immediately, independent of expiry or remaining uses.
/// Only the creator may revoke.
pub async fn revoke_grant<S: GrantStore + ?Sized>(
    store: &S,
    grant_id: &Uuid,
    caller: &PrincipalId,
) -> ShareResult<()> {
    store.revoke(grant_id, caller).await?;
    tracing::debug!(grant = %grant_id, "share grant revoked");
    Ok(())
}
