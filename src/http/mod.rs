//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → middleware/forward.rs (X-Agent-Target names another member?)
//!         yes → proxy::Forwarder (HTTP or WebSocket relay)
//!         no  → local handlers
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
