use thiserror::Error;

use crate::proto::ErrorCode;

pub type RelayResult<T> = Result<T, RelayError>;

/// Connection-level failures. The relay cannot interpret payloads, so
/// payload-level errors do not exist here by construction.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Invalid, expired, or unsigned session token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Token is valid but its principal does not own the claimed room.
    #[error("principal does not own room '{room}'")]
    OwnerMismatch { room: String },

    /// Room is at its device ceiling; the client may retry later.
    #[error("room '{room}' is full ({limit} devices)")]
    CapacityExceeded { room: String, limit: usize },

    /// Connection-level transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RelayError {
    /// Wire code sent in the closing `ERROR` control frame.
    pub fn code(&self) -> ErrorCode {
        match self {
            RelayError::Authentication(_) => ErrorCode::AuthFailed,
            RelayError::OwnerMismatch { .. } => ErrorCode::OwnerMismatch,
            RelayError::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
            RelayError::Transport(_) => ErrorCode::Transport,
        }
    }
}
