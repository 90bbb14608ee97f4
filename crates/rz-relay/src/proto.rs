//! Relay wire protocol: JSON control frames, opaque binary payload frames
//!
//! Post-auth traffic is symmetric binary framing with no relay-imposed
//! schema (the CRDT library's own encoding). The JSON control channel is
//! used only for connection lifecycle signaling — never for payload.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};

/// Lifecycle messages sent as WebSocket text frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Auth + join succeeded; snapshot frames follow immediately.
    Connected { room: String },
    /// Terminal failure; the connection closes after this frame.
    Error { code: ErrorCode, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AuthFailed,
    OwnerMismatch,
    CapacityExceeded,
    Transport,
}

impl ControlFrame {
    pub fn to_json(&self) -> RelayResult<String> {
        serde_json::to_string(self)
            .map_err(|e| RelayError::Transport(format!("encoding control frame: {e}")))
    }

    pub fn from_json(data: &str) -> RelayResult<Self> {
        serde_json::from_str(data)
            .map_err(|e| RelayError::Transport(format!("decoding control frame: {e}")))
    }

    /// The closing frame for a failed connection attempt.
    pub fn from_error(err: &RelayError) -> Self {
        ControlFrame::Error { code: err.code(), message: err.to_string() }
    }
}
