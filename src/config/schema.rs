//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML config files;
//! every field has a default so a minimal (or absent) config still yields a
//! runnable server.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::frame::{FrameLimits, DEFAULT_MAX_KEY_BYTES, DEFAULT_MAX_VALUE_BYTES};

/// Root configuration for the ingestion server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, TLS, timeouts).
    pub listener: ListenerConfig,

    /// Wire-format length bounds.
    pub limits: LimitsConfig,

    /// Static enrichment attached to every event before hand-off.
    pub common: CommonFields,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address. The default matches the standard beats port.
    pub bind_address: String,

    /// Optional TLS configuration; absent means plaintext TCP.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Seconds a connection may sit idle between frames before the server
    /// closes it. Zero disables the timeout: idle shippers are expected to
    /// hold their connections open.
    pub idle_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5044".to_string(),
            tls: None,
            max_connections: 1024,
            idle_timeout_secs: 0,
        }
    }
}

impl ListenerConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to the certificate chain file (PEM).
    pub cert_path: String,

    /// Path to the private key file (PEM).
    pub key_path: String,
}

/// Wire-format length bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum declared key length in a raw sub-frame.
    pub max_key_bytes: u32,

    /// Maximum declared value or JSON document length.
    pub max_value_bytes: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_key_bytes: DEFAULT_MAX_KEY_BYTES,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
        }
    }
}

impl LimitsConfig {
    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_key_bytes: self.max_key_bytes,
            max_value_bytes: self.max_value_bytes,
        }
    }
}

/// Static enrichment applied to every event in the forward loop, mirroring
/// the add_field / tags / type options shippers expect from this input.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CommonFields {
    /// Fields added when the shipper did not set them.
    pub add_field: BTreeMap<String, serde_json::Value>,

    /// Tags appended to each event's `tags` list.
    pub tags: Vec<String>,

    /// Event type, set only when the shipper left it unset.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter; `RUST_LOG` overrides it.
    pub log_filter: String,

    /// Enable the Prometheus metrics exporter.
    pub metrics_enabled: bool,

    /// Address the metrics exporter listens on.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "beats_server=info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9598".to_string(),
        }
    }
}
