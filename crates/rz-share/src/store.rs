//! Grant storage: the atomic-consume contract + in-memory implementation
//!
//! `consume` is the whole security story for quotas: expiry check,
//! use-count check, and increment happen as one operation. A durable
//! implementation must provide the same single conditional update —
//! read-then-write is exactly the TOCTOU race this contract exists to
//! prevent.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use rz_core::types::PrincipalId;
use rz_crypto::envelope::EncryptedEnvelope;

use crate::error::{ShareError, ShareResult};
use crate::grant::ShareGrant;

/// Server-side grant persistence, opaque to payload content.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn insert(&self, grant: ShareGrant) -> ShareResult<()>;

    /// Atomically validate and spend one use, returning the ciphertext.
    ///
    /// Order of checks: expiry (against `now`, the server clock), then
    /// quota. An expired or exhausted grant is deleted as a side effect.
    async fn consume(&self, grant_id: &Uuid, now: u64) -> ShareResult<EncryptedEnvelope>;

    /// Delete a grant if (and only if) `caller` created it.
    async fn revoke(&self, grant_id: &Uuid, caller: &PrincipalId) -> ShareResult<()>;
}

/// In-memory store; the mutex makes `consume` trivially atomic.
#[derive(Default)]
pub struct MemoryGrantStore {
    grants: Mutex<HashMap<Uuid, ShareGrant>>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ShareGrant>> {
        self.grants.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn insert(&self, grant: ShareGrant) -> ShareResult<()> {
        self.lock().insert(grant.grant_id, grant);
        Ok(())
    }

    async fn consume(&self, grant_id: &Uuid, now: u64) -> ShareResult<EncryptedEnvelope> {
        let mut grants = self.lock();

        let grant = grants.get_mut(grant_id).ok_or(ShareError::NotFound)?;

        if grant.expires_at.is_some_and(|at| now >= at) {
            grants.remove(grant_id);
            return Err(ShareError::Expired);
        }

        if grant.max_uses.is_some_and(|max| grant.use_count >= max) {
            grants.remove(grant_id);
            return Err(ShareError::Exhausted);
        }

        grant.use_count += 1;
        let envelope = grant.envelope.clone();

        // A grant that just spent its last use is gone immediately.
        if grant.max_uses.is_some_and(|max| grant.use_count >= max) {
            grants.remove(grant_id);
        }

        Ok(envelope)
    }

    async fn revoke(&self, grant_id: &Uuid, caller: &PrincipalId) -> ShareResult<()> {
        let mut grants = self.lock();

        let grant = grants.get(grant_id).ok_or(ShareError::NotFound)?;
        if &grant.created_by != caller {
            return Err(ShareError::Forbidden);
        }

        grants.remove(grant_id);
        Ok(())
    }
}
