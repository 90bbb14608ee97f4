//! rz-crypto: Client-side E2E encryption for Rhizome
//!
//! Everything the untrusted server stores or relays passes through this
//! crate first. Notes and metadata are sealed into authenticated envelopes,
//! attachments get per-file keys, and file names are encrypted
//! deterministically so ciphertext names stay usable as storage keys.
//!
//! Key hierarchy:
//! ```text
//! Master Key (256-bit, PBKDF2-HMAC-SHA256 from password, >= 600k iterations)
//!   ├── Auth Proof (same KDF invocation, upper output bytes — server login only)
//!   ├── File Key (per-attachment, 256-bit random, wrapped by master key)
//!   │   └── Chunk AEAD: XChaCha20-Poly1305 (nonce=random 192-bit, AAD=index||file_id)
//!   ├── Name Encryption Key (HKDF, domain="rz-names", AES-SIV)
//!   └── Derived File Key (HKDF, domain="rz-file"||file_id) for keyless-manifest flows
//! Envelope AEAD: ChaCha20-Poly1305 (256-bit key, 96-bit random nonce)
//! ```
//!
//! All operations are pure functions over their inputs; the only mutable
//! state is the key material inside [`session::SessionContext`], which the
//! authentication flow owns and passes explicitly.

pub mod checksum;
pub mod chunk;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod names;
pub mod sealed;
pub mod session;

pub use chunk::{decrypt_chunk, encrypt_chunk};
pub use envelope::{decrypt, encrypt, EncryptedEnvelope};
pub use error::CryptoError;
pub use kdf::{derive_auth_proof, derive_master_key, generate_salt, AuthProof, KdfParams, MasterKey};
pub use keys::{derive_file_key, derive_name_key, generate_file_key, unwrap_key, wrap_key, FileKey};
pub use names::{decrypt_name, encrypt_name};
pub use sealed::{generate_keypair, open, seal, SealedBox};
pub use session::SessionContext;

/// Size of a symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a ChaCha20-Poly1305 envelope nonce (96-bit)
pub const ENVELOPE_NONCE_SIZE: usize = 12;

/// Size of an XChaCha20-Poly1305 nonce used for chunks and key wraps (192-bit)
pub const XNONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a KDF salt in bytes
pub const SALT_SIZE: usize = 32;
