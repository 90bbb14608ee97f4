use thiserror::Error;

use rz_crypto::CryptoError;

pub type ShareResult<T> = Result<T, ShareError>;

/// Grant failures are terminal and user-visible; none of them is retried.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("grant has expired")]
    Expired,

    #[error("grant use limit reached")]
    Exhausted,

    #[error("no such grant")]
    NotFound,

    #[error("only the grant creator may revoke it")]
    Forbidden,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("grant storage error: {0}")]
    Storage(String),

    #[error("malformed share link: {0}")]
    Link(String),
}
