//! BLAKE3 checksums for integrity verification independent of encryption
//!
//! AEAD tags prove each envelope or chunk is unmodified, but not that the
//! *assembly* of verified pieces is the file the writer intended (wrong
//! chunk order, a stale manifest). The whole-file checksum recorded in
//! plaintext metadata catches that class after decryption succeeds.

use std::io::Read;

use crate::error::{CryptoError, CryptoResult};

/// A BLAKE3 digest (32 bytes), displayed as 64 hex chars
pub type Digest = blake3::Hash;

/// Hash a byte slice in memory. Fast for small inputs.
pub fn digest_bytes(data: &[u8]) -> Digest {
    blake3::hash(data)
}

/// Hash a reader incrementally (for payloads too large to hold in memory).
pub fn digest_reader<R: Read>(mut reader: R) -> std::io::Result<Digest> {
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize())
}

/// Format a digest as a lowercase hex string (64 chars)
pub fn to_hex(digest: &Digest) -> String {
    digest.to_hex().to_string()
}

/// Parse a 64-char hex string into a digest
pub fn from_hex(hex: &str) -> CryptoResult<Digest> {
    blake3::Hash::from_hex(hex)
        .map_err(|e| CryptoError::Malformed(format!("invalid BLAKE3 hex '{hex}': {e}")))
}

/// Verify data against an expected digest.
///
/// `blake3::Hash` equality is constant-time.
pub fn verify(data: &[u8], expected: &Digest) -> CryptoResult<()> {
    let actual = digest_bytes(data);
    if &actual == expected {
        Ok(())
    } else {
        Err(CryptoError::Integrity(format!(
            "checksum mismatch: expected {}, got {}",
            to_hex(expected),
            to_hex(&actual)
        )))
    }
}
