//! Chunk encryption/decryption pipeline
//!
//! Upload: a producer task reads fixed-size chunks, encrypts each with a
//! fresh random nonce, and emits them through a bounded channel while the
//! consumer drives blob-store puts — CPU-bound encryption overlaps
//! I/O-bound upload. A chunk entry is recorded in the manifest only after
//! the store acknowledges the put, so cancelling mid-flight leaves no
//! metadata pointing at missing or partial chunks.
//!
//! Download: chunks are fetched in index order and decrypted
//! independently; after full reassembly the plaintext digest is checked
//! against the manifest checksum. Any single chunk can also be decrypted
//! alone via [`decrypt_chunk_blob`] for partial/resumable fetches.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use rz_core::types::FileId;
use rz_crypto::checksum;
use rz_crypto::chunk::{decrypt_chunk, encrypt_chunk};
use rz_crypto::kdf::MasterKey;
use rz_crypto::keys::{generate_file_key, FileKey};
use rz_crypto::{CryptoError, XNONCE_SIZE};

use crate::error::{PipelineError, PipelineResult};
use crate::manifest::{AttachmentManifest, ChunkEntry};
use crate::store::BlobStore;
use crate::DEFAULT_CHUNK_SIZE;

/// Progress callback type (chunks_done, total_chunks, message).
/// Advisory only; values are monotonically increasing.
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Bounded buffer between the encrypting producer and the uploading
/// consumer. Small on purpose: enough to overlap, not enough to buffer a
/// large attachment in memory.
const PIPELINE_DEPTH: usize = 4;

#[derive(Debug, Clone)]
pub struct ChunkingParams {
    /// Plaintext bytes per chunk (default: 1 MiB)
    pub chunk_size: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

/// One independently decryptable slice of an attachment.
#[derive(Debug, Clone)]
pub struct EncryptedChunk {
    pub index: u64,
    pub nonce: [u8; XNONCE_SIZE],
    /// Ciphertext including the Poly1305 tag (nonce not included)
    pub ciphertext: Vec<u8>,
    /// Deterministic blob-store locator (stable across retries)
    pub locator: String,
    pub plain_size: u32,
}

impl EncryptedChunk {
    /// Storage form: `[24-byte nonce][ciphertext + tag]`
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(XNONCE_SIZE + self.ciphertext.len());
        blob.extend_from_slice(&self.nonce);
        blob.extend_from_slice(&self.ciphertext);
        blob
    }

    pub fn encrypted_size(&self) -> u64 {
        (XNONCE_SIZE + self.ciphertext.len()) as u64
    }
}

/// Deterministic locator for a chunk: retried puts land on the same
/// object, which is what makes per-chunk retry idempotent.
pub fn chunk_locator(file_id: &FileId, index: u64) -> String {
    format!("attachments/{}/{:06}", file_id.to_hex(), index)
}

/// Lazily encrypt a reader into a stream of [`EncryptedChunk`]s.
///
/// The producer runs on its own task and stays at most [`PIPELINE_DEPTH`]
/// chunks ahead of the consumer. Dropping the stream cancels the producer
/// cooperatively at the next chunk boundary.
pub fn encrypt_to_chunks<R>(
    mut reader: R,
    file_key: FileKey,
    file_id: FileId,
    params: &ChunkingParams,
) -> EncryptedChunkStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let chunk_size = params.chunk_size.max(1);
    let (tx, rx) = mpsc::channel::<PipelineResult<EncryptedChunk>>(PIPELINE_DEPTH);
    let (digest_tx, digest_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut hasher = blake3::Hasher::new();
        let mut index = 0u64;

        loop {
            let plain = match read_full_chunk(&mut reader, chunk_size).await {
                Ok(plain) => plain,
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };
            if plain.is_empty() {
                break;
            }

            hasher.update(&plain);

            let chunk = match encrypt_chunk(&file_key, index, file_id.as_bytes(), &plain) {
                Ok(blob) => {
                    let mut nonce = [0u8; XNONCE_SIZE];
                    nonce.copy_from_slice(&blob[..XNONCE_SIZE]);
                    EncryptedChunk {
                        index,
                        nonce,
                        ciphertext: blob[XNONCE_SIZE..].to_vec(),
                        locator: chunk_locator(&file_id, index),
                        plain_size: plain.len() as u32,
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };

            // A closed channel means the consumer cancelled; stop reading.
            if tx.send(Ok(chunk)).await.is_err() {
                debug!(index, "chunk consumer gone, cancelling producer");
                return;
            }
            index += 1;
        }

        let _ = digest_tx.send(hasher.finalize());
    });

    EncryptedChunkStream { rx, digest: digest_rx }
}

/// Stream of encrypted chunks plus the whole-file plaintext digest,
/// available once the stream is exhausted.
pub struct EncryptedChunkStream {
    rx: mpsc::Receiver<PipelineResult<EncryptedChunk>>,
    digest: oneshot::Receiver<checksum::Digest>,
}

impl EncryptedChunkStream {
    /// The plaintext BLAKE3 digest. Only resolves after every chunk has
    /// been consumed; errs if the producer was cancelled or failed.
    pub async fn plaintext_digest(self) -> PipelineResult<checksum::Digest> {
        let Self { rx, digest } = self;
        // Closing the chunk channel first unblocks a producer still
        // waiting on a send, so this cannot deadlock mid-stream.
        drop(rx);
        digest.await.map_err(|_| PipelineError::Cancelled)
    }
}

impl Stream for EncryptedChunkStream {
    type Item = PipelineResult<EncryptedChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Encrypt a reader chunk-by-chunk and upload each chunk as it is
/// produced, returning the manifest once every chunk is stored.
///
/// `declared_size` is used only for progress totals; the manifest records
/// the sizes actually read.
pub async fn upload<R, S>(
    reader: R,
    store: &S,
    master: &MasterKey,
    file_id: FileId,
    declared_size: u64,
    params: &ChunkingParams,
    progress: Option<&ProgressFn>,
) -> PipelineResult<AttachmentManifest>
where
    R: AsyncRead + Unpin + Send + 'static,
    S: BlobStore + ?Sized,
{
    use futures::StreamExt;

    let file_key = generate_file_key();
    let total_chunks = declared_size.div_ceil(params.chunk_size.max(1) as u64);

    let mut stream = encrypt_to_chunks(reader, file_key.clone(), file_id, params);
    let mut entries: Vec<ChunkEntry> = Vec::new();
    let mut original_size = 0u64;

    while let Some(item) = stream.next().await {
        let chunk = item?;
        store.put_chunk(&chunk.locator, chunk.to_blob()).await?;

        // Recorded only after the store ack: cancellation can orphan a
        // blob but never produce a manifest entry without one.
        original_size += u64::from(chunk.plain_size);
        entries.push(ChunkEntry {
            index: chunk.index,
            locator: chunk.locator.clone(),
            encrypted_size: chunk.encrypted_size(),
            plain_size: chunk.plain_size,
        });

        if let Some(cb) = progress {
            let done = entries.len() as u64;
            cb(done, total_chunks, &format!("chunk {done}/{total_chunks}"));
        }
    }

    let digest = stream.plaintext_digest().await?;

    debug!(
        file_id = %file_id.to_hex(),
        chunks = entries.len(),
        bytes = original_size,
        "attachment encrypted and uploaded"
    );

    AttachmentManifest::new(
        file_id,
        original_size,
        checksum::to_hex(&digest),
        master,
        &file_key,
        entries,
    )
}

/// Fetch, decrypt, and reassemble an attachment into `writer`.
///
/// Each chunk is verified independently as it is decrypted; after full
/// reassembly the plaintext digest must match the manifest checksum,
/// which catches the decrypted-but-misassembled class (stale manifest,
/// wrong entry order) that per-chunk tags alone cannot.
pub async fn download<S, W>(
    manifest: &AttachmentManifest,
    store: &S,
    master: &MasterKey,
    mut writer: W,
    progress: Option<&ProgressFn>,
) -> PipelineResult<u64>
where
    S: BlobStore + ?Sized,
    W: AsyncWrite + Unpin,
{
    let file_key = manifest.unwrap_file_key(master)?;
    let total = manifest.chunks.len() as u64;

    let mut hasher = blake3::Hasher::new();
    let mut written = 0u64;

    for (pos, entry) in manifest.chunks.iter().enumerate() {
        if entry.index != pos as u64 {
            return Err(PipelineError::Manifest(format!(
                "non-contiguous chunk indices: entry {pos} has index {}",
                entry.index
            )));
        }

        let blob = store.get_chunk(&entry.locator).await?;
        let plain = decrypt_chunk(&file_key, entry.index, manifest.file_id.as_bytes(), &blob)?;

        hasher.update(&plain);
        writer.write_all(&plain).await?;
        written += plain.len() as u64;

        if let Some(cb) = progress {
            let done = pos as u64 + 1;
            cb(done, total, &format!("chunk {done}/{total}"));
        }
    }

    writer.flush().await?;

    let expected = checksum::from_hex(&manifest.checksum)?;
    if hasher.finalize() != expected {
        return Err(PipelineError::Crypto(CryptoError::Integrity(
            "reassembled attachment does not match manifest checksum".into(),
        )));
    }

    Ok(written)
}

/// Decrypt a single stored chunk blob without touching its neighbors.
///
/// Chunk independence invariant: a lost or corrupt chunk N never blocks
/// decrypting chunk M ≠ N.
pub fn decrypt_chunk_blob(
    file_key: &FileKey,
    index: u64,
    file_id: &FileId,
    blob: &[u8],
) -> PipelineResult<Vec<u8>> {
    Ok(decrypt_chunk(file_key, index, file_id.as_bytes(), blob)?)
}

/// Read until `chunk_size` bytes are buffered or the reader hits EOF.
async fn read_full_chunk<R: AsyncRead + Unpin>(
    reader: &mut R,
    chunk_size: usize,
) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;

    while filled < chunk_size {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    buf.truncate(filled);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn small_params() -> ChunkingParams {
        ChunkingParams { chunk_size: 1024 }
    }

    #[tokio::test]
    async fn test_chunk_stream_counts_and_sizes() {
        let data = vec![7u8; 2500]; // 3 chunks at 1024: 1024 + 1024 + 452
        let key = generate_file_key();
        let file_id = FileId([1u8; 32]);

        let mut stream =
            encrypt_to_chunks(std::io::Cursor::new(data), key, file_id, &small_params());

        let mut chunks = Vec::new();
        while let Some(item) = stream.next().await {
            chunks.push(item.unwrap());
        }

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].plain_size, 1024);
        assert_eq!(chunks[1].plain_size, 1024);
        assert_eq!(chunks[2].plain_size, 452);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[2].index, 2);
        assert_ne!(chunks[0].nonce, chunks[1].nonce, "each chunk gets a fresh nonce");

        let digest = stream.plaintext_digest().await.unwrap();
        assert_eq!(digest, checksum::digest_bytes(&vec![7u8; 2500]));
    }

    #[tokio::test]
    async fn test_empty_reader_produces_no_chunks() {
        let key = generate_file_key();
        let file_id = FileId([2u8; 32]);

        let mut stream =
            encrypt_to_chunks(std::io::Cursor::new(Vec::new()), key, file_id, &small_params());

        assert!(stream.next().await.is_none());
        let digest = stream.plaintext_digest().await.unwrap();
        assert_eq!(digest, checksum::digest_bytes(b""));
    }

    #[tokio::test]
    async fn test_dropped_stream_cancels_producer() {
        let key = generate_file_key();
        let file_id = FileId([3u8; 32]);
        let data = vec![0u8; 64 * 1024];

        let mut stream =
            encrypt_to_chunks(std::io::Cursor::new(data), key, file_id, &small_params());
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.index, 0);

        // Dropping mid-stream must not resolve the digest.
        let result = stream.plaintext_digest().await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[test]
    fn test_locator_is_deterministic() {
        let file_id = FileId([9u8; 32]);
        assert_eq!(chunk_locator(&file_id, 5), chunk_locator(&file_id, 5));
        assert_ne!(chunk_locator(&file_id, 5), chunk_locator(&file_id, 6));
    }
}
