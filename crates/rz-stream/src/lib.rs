//! rz-stream: streaming chunked encryption for large attachments
//!
//! Pipeline: plaintext reader → fixed-size chunk → encrypt (per-file key,
//! fresh nonce, AAD=index||file_id) → blob store upload, with encryption
//! and network transfer overlapped through a bounded channel. Downloads
//! run the pipeline in reverse and finish with a whole-file checksum
//! verification against the plaintext digest recorded in the manifest.
//!
//! The blob store is an opaque collaborator behind [`store::BlobStore`];
//! the pipeline assumes nothing about it beyond read-after-write
//! consistency for a given locator.

pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod store;

pub use error::{PipelineError, PipelineResult};
pub use manifest::{AttachmentManifest, ChunkEntry, FileKeyRecord};
pub use pipeline::{
    decrypt_chunk_blob, download, encrypt_to_chunks, upload, ChunkingParams, EncryptedChunk,
    EncryptedChunkStream, ProgressFn,
};
pub use store::{BlobStore, MemoryBlobStore, OpendalBlobStore};

/// Default chunk size: 1 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
