//! Forwarding error types.

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures while forwarding a request to a peer.
///
/// Every variant is local to one request; none is retried.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The member descriptor did not produce a valid URI.
    #[error("invalid forwarding target '{authority}': {reason}")]
    InvalidTarget { authority: String, reason: String },

    /// The outbound request could not be assembled.
    #[error("failed to build outbound request: {0}")]
    Request(#[from] axum::http::Error),

    /// DNS, TCP or TLS failure talking to the peer.
    #[error("peer unreachable: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The peer refused or broke the WebSocket handshake.
    #[error("websocket handshake with peer failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    /// Peer trust material could not be loaded.
    #[error("peer TLS configuration error: {0}")]
    PeerTrust(String),
}

impl ForwardError {
    /// Status returned to the original caller.
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Handshake(tungstenite::Error::Http(response)) => response.status(),
            ForwardError::PeerTrust(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            // Relay the peer's own rejection so the client sees why the upgrade failed.
            ForwardError::Handshake(tungstenite::Error::Http(response)) => {
                let (parts, body) = response.into_parts();
                let mut out = Response::new(Body::from(body.unwrap_or_default()));
                *out.status_mut() = parts.status;
                if let Some(content_type) = parts.headers.get(axum::http::header::CONTENT_TYPE) {
                    out.headers_mut()
                        .insert(axum::http::header::CONTENT_TYPE, content_type.clone());
                }
                out
            }
            ForwardError::PeerTrust(_) => (status, "Peer TLS misconfigured").into_response(),
            ForwardError::Handshake(_) => (status, "Peer websocket handshake failed").into_response(),
            _ => (status, "Upstream request failed").into_response(),
        }
    }
}
