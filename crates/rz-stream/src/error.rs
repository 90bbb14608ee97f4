use thiserror::Error;

use rz_crypto::CryptoError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("blob store error: {0}")]
    Store(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// True when the failure is an integrity violation (tag or checksum),
    /// which callers surface as "cannot decrypt" and never auto-retry.
    pub fn is_integrity(&self) -> bool {
        matches!(self, PipelineError::Crypto(CryptoError::Integrity(_)))
    }
}
