//! rz-relay: the zero-knowledge sync relay
//!
//! A connection-oriented server that moves opaque binary update frames
//! between one principal's devices. The relay authenticates each device
//! with a signed session token, assigns it to an isolated room, replays
//! the room's in-memory update log so reconnecting devices catch up, and
//! broadcasts every further frame to the other members — without ever
//! inspecting, decrypting, or rewriting a payload.
//!
//! The room core ([`room`]) is transport-independent and drives all the
//! isolation/backpressure semantics; [`server`] is a thin axum WebSocket
//! shell around it. Tests exercise the core directly.

pub mod backoff;
pub mod error;
pub mod proto;
pub mod room;
pub mod server;
pub mod token;

pub use backoff::ReconnectPolicy;
pub use error::{RelayError, RelayResult};
pub use proto::{ControlFrame, ErrorCode};
pub use room::{DeviceHandle, JoinedDevice, RelayLimits, RelayStats, RoomRegistry};
pub use server::{router, RelayServer};
pub use token::{AuthIssuer, SessionToken, TokenClaims, TokenVerifier};
