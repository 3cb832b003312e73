//! Network layer subsystem.
//!
//! Listener-side TLS. Peer-side TLS lives in `proxy::tls`.

pub mod tls;
