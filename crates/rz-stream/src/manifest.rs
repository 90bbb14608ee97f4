//! Attachment manifest
//!
//! A manifest records the chunk layout of an encrypted attachment:
//! - file_id (opaque to the server, used for chunk lookup)
//! - wrapped file key (encrypted by the master key)
//! - plaintext checksum (verified after full reassembly)
//! - ordered chunk entries with storage locators
//!
//! The manifest travels inside the note's encrypted metadata, so the
//! server only ever sees it as ciphertext.

use serde::{Deserialize, Serialize};

use rz_core::types::FileId;
use rz_crypto::kdf::MasterKey;
use rz_crypto::keys::{unwrap_key, wrap_key, FileKey};
use rz_crypto::CryptoError;

use crate::error::{PipelineError, PipelineResult};

/// A per-attachment key, wrapped under the master key. Never persisted
/// unwrapped; unwrapping happens transiently during download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileKeyRecord {
    /// `[24-byte nonce][ciphertext + tag]`, base64
    pub wrapped_key: String,
}

impl FileKeyRecord {
    pub fn wrap(master: &MasterKey, file_key: &FileKey) -> PipelineResult<Self> {
        let wrapped = wrap_key(master, file_key)?;
        Ok(Self { wrapped_key: base64_encode(&wrapped) })
    }

    pub fn unwrap(&self, master: &MasterKey) -> PipelineResult<FileKey> {
        let wrapped = base64_decode(&self.wrapped_key)?;
        Ok(unwrap_key(master, &wrapped)?)
    }
}

/// A single chunk entry in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEntry {
    /// Chunk index (0-based, contiguous)
    pub index: u64,
    /// Where the encrypted chunk lives in the blob store
    pub locator: String,
    /// Size of the encrypted chunk in bytes (includes nonce + tag overhead)
    pub encrypted_size: u64,
    /// Plaintext size of this chunk
    pub plain_size: u32,
}

/// Chunk layout + key record for one encrypted attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentManifest {
    /// Manifest format version
    pub version: u32,
    /// Attachment identifier (bound into every chunk's AAD)
    pub file_id: FileId,
    /// Original plaintext size in bytes
    pub original_size: u64,
    /// BLAKE3 of the original plaintext (hex) — verified after reassembly
    pub checksum: String,
    /// The file encryption key, wrapped by the master key
    pub key: FileKeyRecord,
    /// Ordered list of chunk entries
    pub chunks: Vec<ChunkEntry>,
}

impl AttachmentManifest {
    pub fn new(
        file_id: FileId,
        original_size: u64,
        checksum: String,
        master_key: &MasterKey,
        file_key: &FileKey,
        chunks: Vec<ChunkEntry>,
    ) -> PipelineResult<Self> {
        Ok(Self {
            version: 1,
            file_id,
            original_size,
            checksum,
            key: FileKeyRecord::wrap(master_key, file_key)?,
            chunks,
        })
    }

    /// Extract the file key by unwrapping with the master key.
    pub fn unwrap_file_key(&self, master_key: &MasterKey) -> PipelineResult<FileKey> {
        self.key.unwrap(master_key)
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> PipelineResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| PipelineError::Manifest(format!("serialization: {e}")))
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> PipelineResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| PipelineError::Manifest(format!("deserialization: {e}")))
    }
}

fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

fn base64_decode(s: &str) -> PipelineResult<Vec<u8>> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD
        .decode(s)
        .map_err(|e| PipelineError::Crypto(CryptoError::Serialization(format!("base64: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rz_crypto::keys::generate_file_key;
    use rz_crypto::KEY_SIZE;

    #[test]
    fn test_manifest_roundtrip() {
        let master = MasterKey::from_bytes([42u8; KEY_SIZE]);
        let file_key = generate_file_key();

        let manifest = AttachmentManifest::new(
            FileId([0x11; 32]),
            1024,
            "ab".repeat(32),
            &master,
            &file_key,
            vec![
                ChunkEntry {
                    index: 0,
                    locator: "attachments/1111/000000".into(),
                    encrypted_size: 552,
                    plain_size: 512,
                },
                ChunkEntry {
                    index: 1,
                    locator: "attachments/1111/000001".into(),
                    encrypted_size: 552,
                    plain_size: 512,
                },
            ],
        )
        .unwrap();

        let bytes = manifest.to_bytes().unwrap();
        let restored = AttachmentManifest::from_bytes(&bytes).unwrap();

        assert_eq!(restored.version, 1);
        assert_eq!(restored.file_id, FileId([0x11; 32]));
        assert_eq!(restored.original_size, 1024);
        assert_eq!(restored.chunks.len(), 2);

        let unwrapped = restored.unwrap_file_key(&master).unwrap();
        assert_eq!(unwrapped.as_bytes(), file_key.as_bytes());
    }

    #[test]
    fn test_manifest_wrong_master_key() {
        let master1 = MasterKey::from_bytes([1u8; KEY_SIZE]);
        let master2 = MasterKey::from_bytes([2u8; KEY_SIZE]);
        let file_key = generate_file_key();

        let manifest = AttachmentManifest::new(
            FileId([0u8; 32]),
            100,
            "00".repeat(32),
            &master1,
            &file_key,
            vec![],
        )
        .unwrap();

        assert!(manifest.unwrap_file_key(&master2).is_err());
    }
}
