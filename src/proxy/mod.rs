//! Peer-forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request + ClusterMember
//!     → redirect.rs (Forwarder: upgrade? → pick one relay)
//!     → target.rs (scheme/authority/path/query for the peer)
//!     → http.rs (https relay, streamed)      ─┐
//!     → websocket.rs (wss relay, duplex)      ─┴→ peer
//!     ← response / frames back to the caller
//! ```
//!
//! # Design Decisions
//! - Target computation is pure; the inbound request is never rewritten in place
//! - Exactly one relay engine per forward
//! - Peer trust comes from the signature header; TLS verification is off
//!   unless a CA bundle is pinned (tls.rs)
//! - No retries and no timeouts at this layer

pub mod error;
pub mod headers;
pub mod http;
pub mod redirect;
pub mod target;
pub mod tls;
pub mod tracker;
pub mod websocket;

pub use error::ForwardError;
pub use headers::{SIGNATURE_HEADER, TARGET_NODE_HEADER};
pub use redirect::Forwarder;
pub use target::{merge_query, ForwardKind, ForwardingTarget};
pub use tracker::{RelayState, RelayTracker};
