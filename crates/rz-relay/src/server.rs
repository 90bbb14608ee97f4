//! axum WebSocket shell around the room registry
//!
//! Connection lifecycle: `Connecting` (transport accepted) →
//! `Authenticating` (token + claimed room verified) → `Joined` (snapshot
//! replay, then bidirectional forwarding) → `Closed`. Any auth mismatch
//! sends a typed `ERROR` control frame and closes — no partial trust.
//!
//! Liveness: the shell pings every connection on an interval; a device
//! silent past the heartbeat window is force-closed so its room slot is
//! freed instead of leaking half-open.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::proto::ControlFrame;
use crate::room::{JoinedDevice, RoomRegistry};
use crate::token::TokenVerifier;

/// Shared state for the relay endpoint.
pub struct RelayServer {
    pub registry: Arc<RoomRegistry>,
    pub verifier: TokenVerifier,
    pub heartbeat_interval: Duration,
    pub heartbeat_window: Duration,
}

impl RelayServer {
    pub fn new(
        registry: Arc<RoomRegistry>,
        verifier: TokenVerifier,
        heartbeat_interval: Duration,
        heartbeat_window: Duration,
    ) -> Self {
        Self { registry, verifier, heartbeat_interval, heartbeat_window }
    }
}

/// Connection parameters carried in the URL: `/sync/{room}?token=...`
#[derive(Debug, Deserialize)]
struct ConnectQuery {
    token: String,
}

/// Build the relay router. Mountable next to other endpoints (the daemon
/// adds metrics/health routes on a separate listener).
pub fn router(server: Arc<RelayServer>) -> Router {
    Router::new().route("/sync/{room}", get(ws_handler)).with_state(server)
}

/// Serve the relay on `addr` until the task is cancelled.
pub async fn serve(server: Arc<RelayServer>, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "relay: listening");
    axum::serve(listener, router(server)).await
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    Query(query): Query<ConnectQuery>,
    State(server): State<Arc<RelayServer>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, room, query.token, server))
}

async fn handle_connection(
    socket: WebSocket,
    room: String,
    token: String,
    server: Arc<RelayServer>,
) {
    let (mut tx, rx) = socket.split();

    // Authenticating: verify the bearer credential against the relay
    // clock, then prove the principal owns the claimed room.
    let claims = match server.verifier.verify(&token, unix_now()) {
        Ok(claims) => claims,
        Err(e) => {
            server.registry.stats().note_auth_failure();
            debug!(room = %room, "rejecting connection: {e}");
            close_with_error(&mut tx, &e).await;
            return;
        }
    };

    let joined = match server.registry.join(&room, &claims.principal) {
        Ok(joined) => joined,
        Err(e) => {
            if matches!(e, RelayError::OwnerMismatch { .. }) {
                server.registry.stats().note_auth_failure();
                warn!(room = %room, principal = %claims.principal, "room ownership mismatch");
            }
            close_with_error(&mut tx, &e).await;
            return;
        }
    };

    let JoinedDevice { handle, snapshot, outbound } = joined;

    // Joined: control ack first, then the catch-up snapshot, then the
    // live forwarding loop.
    let connected = ControlFrame::Connected { room: room.clone() };
    if send_control(&mut tx, &connected).await.is_err() {
        server.registry.leave(&handle);
        return;
    }

    debug!(
        room = %room,
        device = %handle.device_id,
        snapshot_frames = snapshot.len(),
        "replaying snapshot to new device"
    );
    for frame in snapshot {
        if tx.send(Message::Binary(frame)).await.is_err() {
            server.registry.leave(&handle);
            return;
        }
    }

    forward_loop(&server, &handle, tx, rx, outbound).await;

    // Closed: free the room slot (and the room, if this was the last
    // device).
    server.registry.leave(&handle);
    debug!(room = %room, device = %handle.device_id, "connection closed");
}

async fn forward_loop(
    server: &RelayServer,
    handle: &crate::room::DeviceHandle,
    mut tx: SplitSink<WebSocket, Message>,
    mut rx: SplitStream<WebSocket>,
    mut outbound: tokio::sync::mpsc::Receiver<Bytes>,
) {
    let mut heartbeat = tokio::time::interval(server.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            inbound = rx.next() => match inbound {
                Some(Ok(Message::Binary(frame))) => {
                    last_seen = Instant::now();
                    server.registry.publish(handle, frame);
                }
                // The control channel is server → client; inbound text is
                // tolerated as liveness but never interpreted as payload.
                Some(Ok(Message::Text(_)))
                | Some(Ok(Message::Ping(_)))
                | Some(Ok(Message::Pong(_))) => {
                    last_seen = Instant::now();
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(device = %handle.device_id, "socket error: {e}");
                    break;
                }
            },
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if tx.send(Message::Binary(frame)).await.is_err() {
                        break;
                    }
                }
                // The registry dropped our sender: outbound queue overflow.
                None => {
                    let err = RelayError::Transport("outbound queue overflow".into());
                    close_with_error(&mut tx, &err).await;
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > server.heartbeat_window {
                    debug!(device = %handle.device_id, "heartbeat window exceeded, force-closing");
                    break;
                }
                if tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn send_control(
    tx: &mut SplitSink<WebSocket, Message>,
    frame: &ControlFrame,
) -> Result<(), axum::Error> {
    let json = frame
        .to_json()
        .unwrap_or_else(|_| r#"{"type":"error","code":"transport","message":"encoding"}"#.into());
    tx.send(Message::Text(json.into())).await
}

async fn close_with_error(tx: &mut SplitSink<WebSocket, Message>, err: &RelayError) {
    let _ = send_control(tx, &ControlFrame::from_error(err)).await;
    let _ = tx.close().await;
}

/// Server clock in unix seconds. Token expiry is checked against this,
/// never against anything a client sends.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
