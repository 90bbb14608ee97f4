//! Blob-store collaborator: trait + OpenDAL and in-memory implementations
//!
//! The pipeline only needs `put_chunk`/`get_chunk` with read-after-write
//! consistency per locator. Locators are deterministic, so a retried
//! upload overwrites the same object instead of duplicating it.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use opendal::Operator;

use rz_core::config::StorageConfig;

use crate::error::{PipelineError, PipelineResult};

/// Opaque ciphertext storage consumed by the pipeline.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_chunk(&self, locator: &str, data: Vec<u8>) -> PipelineResult<()>;
    async fn get_chunk(&self, locator: &str) -> PipelineResult<Vec<u8>>;
}

/// In-memory store for tests and local-only operation.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Overwrite a stored blob (test helper for corruption scenarios).
    pub fn tamper(&self, locator: &str, mutate: impl FnOnce(&mut Vec<u8>)) -> bool {
        match self.lock().get_mut(locator) {
            Some(blob) => {
                mutate(blob);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_chunk(&self, locator: &str, data: Vec<u8>) -> PipelineResult<()> {
        self.lock().insert(locator.to_string(), data);
        Ok(())
    }

    async fn get_chunk(&self, locator: &str) -> PipelineResult<Vec<u8>> {
        self.lock()
            .get(locator)
            .cloned()
            .ok_or_else(|| PipelineError::Store(format!("no blob at locator: {locator}")))
    }
}

/// S3-compatible store backed by an OpenDAL operator.
pub struct OpendalBlobStore {
    op: Operator,
}

impl OpendalBlobStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn from_config(
        cfg: &StorageConfig,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> PipelineResult<Self> {
        Ok(Self::new(build_operator(cfg, access_key_id, secret_access_key)?))
    }
}

#[async_trait]
impl BlobStore for OpendalBlobStore {
    async fn put_chunk(&self, locator: &str, data: Vec<u8>) -> PipelineResult<()> {
        self.op
            .write(locator, data)
            .await
            .map_err(|e| PipelineError::Store(format!("put {locator}: {e}")))?;
        Ok(())
    }

    async fn get_chunk(&self, locator: &str) -> PipelineResult<Vec<u8>> {
        let buf = self
            .op
            .read(locator)
            .await
            .map_err(|e| PipelineError::Store(format!("get {locator}: {e}")))?;
        Ok(buf.to_vec())
    }
}

/// Build an OpenDAL Operator for any S3-compatible endpoint.
///
/// Path-style addressing (the opendal default) is required by MinIO and
/// SeaweedFS. The retry layer gives per-chunk transfers bounded retries
/// with jitter; locators are deterministic so retried puts are idempotent.
pub fn build_operator(
    cfg: &StorageConfig,
    access_key_id: &str,
    secret_access_key: &str,
) -> PipelineResult<Operator> {
    if cfg.endpoint.starts_with("http://") {
        if cfg.enforce_tls {
            return Err(PipelineError::Store(format!(
                "blob store endpoint uses plaintext HTTP ({}), but enforce_tls is enabled",
                cfg.endpoint
            )));
        }
        tracing::warn!(
            endpoint = %cfg.endpoint,
            "blob store endpoint uses plaintext HTTP — set storage.enforce_tls and use HTTPS in production"
        );
    }

    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(access_key_id)
        .secret_access_key(secret_access_key);

    let op = Operator::new(builder)
        .map_err(|e| PipelineError::Store(format!("creating OpenDAL S3 operator: {e}")))?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(opendal::layers::RetryLayer::new().with_max_times(5).with_jitter())
        .finish();

    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryBlobStore::new();
        store.put_chunk("a/0", vec![1, 2, 3]).await.unwrap();

        assert_eq!(store.get_chunk("a/0").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_missing_locator() {
        let store = MemoryBlobStore::new();
        assert!(matches!(store.get_chunk("nope").await, Err(PipelineError::Store(_))));
    }

    #[tokio::test]
    async fn test_memory_store_put_is_idempotent_overwrite() {
        let store = MemoryBlobStore::new();
        store.put_chunk("a/0", vec![1]).await.unwrap();
        store.put_chunk("a/0", vec![2]).await.unwrap();

        assert_eq!(store.get_chunk("a/0").await.unwrap(), vec![2]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_build_operator_valid() {
        let cfg = StorageConfig {
            endpoint: "http://localhost:8333".into(),
            enforce_tls: false,
            ..Default::default()
        };
        assert!(build_operator(&cfg, "key", "secret").is_ok());
    }

    #[test]
    fn test_build_operator_http_enforce_tls() {
        let cfg = StorageConfig {
            endpoint: "http://insecure:8333".into(),
            enforce_tls: true,
            ..Default::default()
        };
        let result = build_operator(&cfg, "key", "secret");
        assert!(result.is_err(), "HTTP + enforce_tls must fail");
    }

    #[test]
    fn test_build_operator_https_enforce_tls() {
        let cfg = StorageConfig {
            endpoint: "https://s3.example.com".into(),
            enforce_tls: true,
            ..Default::default()
        };
        assert!(build_operator(&cfg, "key", "secret").is_ok());
    }
}
