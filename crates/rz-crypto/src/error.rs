use thiserror::Error;

/// Failure taxonomy for the encryption core.
///
/// `Authentication` and `Integrity` are deliberately separate variants:
/// a wrong password is recoverable by re-prompting, while a failed tag
/// check on data the right key should open is not, and conflating the two
/// misleads the user's recovery action.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("authentication failed: wrong password or credentials")]
    Authentication,

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
