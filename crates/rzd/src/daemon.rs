//! Daemon lifecycle: token verifier setup, metrics endpoint, relay server

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use rz_core::config::RhizomeConfig;
use rz_relay::{AuthIssuer, RelayLimits, RelayServer, RoomRegistry, TokenVerifier};

pub async fn run(config: RhizomeConfig) -> Result<()> {
    info!("daemon starting");

    // ── Token trust anchor ───────────────────────────────────────────────
    // Production deployments configure the auth service's public key; a
    // missing key gets an ephemeral dev issuer whose tokens die with the
    // process.
    let verifier = match config.relay.token_public_key.as_deref() {
        Some(hex) => {
            let verifier = TokenVerifier::from_hex(hex)
                .map_err(|e| anyhow::anyhow!("relay.token_public_key: {e}"))?;
            info!("token verifier loaded from config");
            verifier
        }
        None => {
            let issuer = AuthIssuer::generate();
            let hex: String =
                issuer.verifying_key().to_bytes().iter().map(|b| format!("{b:02x}")).collect();
            warn!(
                public_key = %hex,
                "relay.token_public_key not set — using an ephemeral dev issuer; \
                 externally minted tokens will NOT verify"
            );
            TokenVerifier::new(issuer.verifying_key())
        }
    };

    let registry = Arc::new(RoomRegistry::new(RelayLimits::from(&config.relay)));

    // ── Prometheus metrics + health endpoint ─────────────────────────────
    let ready = if let Some(addr) = config.daemon.metrics_addr.clone() {
        let state = crate::metrics::MetricsState::new(registry.clone());
        let ready = state.ready_flag();
        tokio::spawn(async move {
            if let Err(e) = crate::metrics::serve(addr, state).await {
                tracing::error!("metrics server failed: {e}");
            }
        });
        Some(ready)
    } else {
        None
    };

    // ── Relay server ─────────────────────────────────────────────────────
    let server = Arc::new(RelayServer::new(
        registry,
        verifier,
        Duration::from_secs(config.relay.heartbeat_interval_secs),
        Duration::from_secs(config.relay.heartbeat_window_secs),
    ));

    let listener = tokio::net::TcpListener::bind(&config.relay.listen)
        .await
        .map_err(|e| anyhow::anyhow!("relay bind {}: {e}", config.relay.listen))?;
    if let Some(ready) = ready {
        ready.store(true, std::sync::atomic::Ordering::Release);
    }
    info!(
        addr = %config.relay.listen,
        room_capacity = config.relay.room_capacity,
        heartbeat_window_secs = config.relay.heartbeat_window_secs,
        "relay: listening"
    );

    axum::serve(listener, rz_relay::router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("relay server: {e}"))?;

    info!("daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("ctrl-c handler failed: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
