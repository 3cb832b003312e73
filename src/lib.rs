//! Peer-forwarding proxy for a clustered agent.
//!
//! Every node accepts API traffic; a request whose `X-Agent-Target` names
//! another member is relayed to that member over TLS, plain HTTP or
//! WebSocket, and its response streamed back.

pub mod cluster;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;

pub use cluster::{ClusterMember, MemberDirectory};
pub use config::schema::AgentConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{ForwardError, Forwarder};
