use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level daemon configuration (loaded from rhizome.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RhizomeConfig {
    pub daemon: DaemonConfig,
    pub relay: RelayConfig,
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Prometheus metrics endpoint (default: 127.0.0.1:9600)
    pub metrics_addr: Option<String>,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// TCP listen address for the sync relay
    pub listen: String,
    /// Hex-encoded Ed25519 public key of the external auth service.
    /// The relay verifies session tokens against it; it never mints them.
    pub token_public_key: Option<String>,
    /// Maximum devices per room; joins beyond this are rejected
    pub room_capacity: usize,
    /// Seconds between heartbeat pings to each connection
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence after which a connection is considered dead
    pub heartbeat_window_secs: u64,
    /// Per-connection outbound queue depth; overflow disconnects the consumer
    pub outbound_queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// S3-compatible blob store endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket holding encrypted chunks
    pub bucket: String,
    /// Enforce HTTPS for blob store connections
    pub enforce_tls: bool,
    /// Path to a custom CA certificate for TLS verification
    pub ca_cert_path: Option<PathBuf>,
}

/// Client-side encryption parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iteration count (default: 600_000)
    pub kdf_iterations: u32,
    /// Attachment chunk size in bytes (default: 1 MiB)
    pub chunk_size: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            metrics_addr: Some("127.0.0.1:9600".into()),
            log_level: "info".into(),
            log_format: "json".into(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9500".into(),
            token_public_key: None,
            room_capacity: 16,
            heartbeat_interval_secs: 20,
            heartbeat_window_secs: 60,
            outbound_queue_depth: 256,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "rhizome".into(),
            enforce_tls: false,
            ca_cert_path: None,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self { kdf_iterations: 600_000, chunk_size: 1024 * 1024 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[daemon]
metrics_addr = "0.0.0.0:9600"
log_level = "debug"
log_format = "text"

[relay]
listen = "0.0.0.0:9500"
room_capacity = 8
heartbeat_interval_secs = 10
heartbeat_window_secs = 30

[storage]
endpoint = "https://s3.example.com"
bucket = "kb-blobs"
enforce_tls = true

[crypto]
kdf_iterations = 800000
chunk_size = 524288
"#;
        let config: RhizomeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(config.relay.room_capacity, 8);
        assert_eq!(config.relay.heartbeat_window_secs, 30);
        assert_eq!(config.storage.bucket, "kb-blobs");
        assert!(config.storage.enforce_tls);
        assert_eq!(config.crypto.kdf_iterations, 800_000);
        assert_eq!(config.crypto.chunk_size, 512 * 1024);
    }

    #[test]
    fn test_defaults_apply_for_missing_sections() {
        let config: RhizomeConfig = toml::from_str("[daemon]\nlog_level = \"warn\"\n").unwrap();
        assert_eq!(config.daemon.log_level, "warn");
        assert_eq!(config.relay.room_capacity, 16);
        assert_eq!(config.crypto.kdf_iterations, 600_000);
        assert_eq!(config.storage.region, "us-east-1");
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config: RhizomeConfig = toml::from_str("").unwrap();
        assert_eq!(config.relay.listen, "127.0.0.1:9500");
        assert_eq!(config.relay.outbound_queue_depth, 256);
    }
}
