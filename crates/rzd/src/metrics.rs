//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  — Prometheus text format
//!   GET /healthz  — Liveness probe (always 200 if process is running)
//!   GET /readyz   — Readiness probe (200 once the relay listener is up)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry as PromRegistry;

use rz_relay::RoomRegistry;

/// Shared metrics state. Gauges are refreshed from the room registry at
/// scrape time rather than on every relay operation.
#[derive(Clone)]
pub struct MetricsState {
    rooms: Arc<RoomRegistry>,
    prom: Arc<PromRegistry>,
    active_rooms: Gauge,
    connected_devices: Gauge,
    frames_forwarded: Gauge,
    auth_failures: Gauge,
    ready: Arc<AtomicBool>,
}

impl MetricsState {
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        let mut prom = PromRegistry::default();

        let active_rooms = Gauge::default();
        prom.register("rz_relay_active_rooms", "Rooms with at least one device", active_rooms.clone());

        let connected_devices = Gauge::default();
        prom.register("rz_relay_connected_devices", "Devices across all rooms", connected_devices.clone());

        let frames_forwarded = Gauge::default();
        prom.register(
            "rz_relay_frames_forwarded",
            "Binary update frames accepted for broadcast since start",
            frames_forwarded.clone(),
        );

        let auth_failures = Gauge::default();
        prom.register(
            "rz_relay_auth_failures",
            "Rejected connection attempts since start",
            auth_failures.clone(),
        );

        Self {
            rooms,
            prom: Arc::new(prom),
            active_rooms,
            connected_devices,
            frames_forwarded,
            auth_failures,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn ready_flag(&self) -> Arc<AtomicBool> {
        self.ready.clone()
    }

    fn refresh(&self) {
        self.active_rooms.set(self.rooms.room_count() as i64);
        self.connected_devices.set(self.rooms.device_count() as i64);
        self.frames_forwarded.set(self.rooms.stats().frames_forwarded() as i64);
        self.auth_failures.set(self.rooms.stats().auth_failures() as i64);
    }
}

/// Serve metrics and health endpoints on `addr` (e.g. "127.0.0.1:9600")
pub async fn serve(addr: String, state: MetricsState) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("metrics bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "metrics: listening on /metrics, /healthz, /readyz");

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    state.refresh();

    let mut body = String::new();
    match encode(&mut body, &state.prom) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness probe: returns 200 if the process is running.
async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe: returns 200 once the relay listener is bound.
async fn readyz_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    if state.ready.load(Ordering::Acquire) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "relay not listening")
    }
}
