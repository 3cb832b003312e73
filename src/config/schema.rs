//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterMember;

/// Root configuration for a cluster agent node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Identity of this node.
    pub node: NodeConfig,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// How this node connects to its peers.
    pub peer: PeerConfig,

    /// WebSocket relay policy.
    pub websocket: WebSocketConfig,

    /// Static membership directory.
    pub members: Vec<ClusterMember>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Identity of the local node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name; requests targeting it are served locally.
    pub name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9001").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9001".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Outbound connections to peers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Skip peer certificate verification. Peers are trusted via the
    /// signature header instead.
    pub insecure_skip_verify: bool,

    /// PEM CA bundle; when set, peer certificates must chain to it.
    pub ca_cert_path: Option<String>,

    /// TCP connect timeout in seconds. Unset means the OS default.
    pub connect_timeout_secs: Option<u64>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            insecure_skip_verify: true,
            ca_cert_path: None,
            connect_timeout_secs: None,
        }
    }
}

/// WebSocket relay policy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Inbound headers copied onto the peer handshake in addition to the
    /// signature and target-node headers.
    pub passthrough_headers: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
