//! Request redirector.
//!
//! Entry point of the proxy: picks exactly one relay engine per request and
//! turns relay failures into responses for the original caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{FromRequestParts, WebSocketUpgrade},
    http::{request::Parts, HeaderName, Request},
    response::{IntoResponse, Response},
};

use crate::cluster::ClusterMember;
use crate::config::{PeerConfig, WebSocketConfig};
use crate::observability::metrics;
use crate::proxy::error::ForwardError;
use crate::proxy::headers::is_websocket_upgrade;
use crate::proxy::http::{self as http_relay, PeerClient};
use crate::proxy::target::ForwardKind;
use crate::proxy::tls::PeerTls;
use crate::proxy::tracker::RelayTracker;
use crate::proxy::websocket::{self as ws_relay, WebSocketContext};

/// Forwards requests to cluster members.
///
/// Cheap to clone; clones share the HTTP connection pool and relay tracker.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: PeerClient,
    websocket: WebSocketContext,
}

impl Forwarder {
    pub fn new(peer: &PeerConfig, websocket: &WebSocketConfig) -> Result<Self, ForwardError> {
        let tls = PeerTls::from_config(peer)?;
        let connect_timeout = peer.connect_timeout_secs.map(Duration::from_secs);

        let passthrough: Vec<HeaderName> = websocket
            .passthrough_headers
            .iter()
            .filter_map(|name| match HeaderName::from_bytes(name.as_bytes()) {
                Ok(name) => Some(name),
                Err(_) => {
                    tracing::warn!(header = %name, "Ignoring invalid websocket passthrough header");
                    None
                }
            })
            .collect();

        Ok(Self {
            client: http_relay::build_client(&tls, connect_timeout),
            websocket: WebSocketContext {
                tls: tls.client_config(),
                passthrough: Arc::from(passthrough),
                tracker: RelayTracker::new(),
            },
        })
    }

    /// Live WebSocket relays.
    pub fn relays(&self) -> &RelayTracker {
        &self.websocket.tracker
    }

    /// Forward `request` to `member`, choosing the relay from the upgrade headers.
    pub async fn forward(&self, request: Request<Body>, member: &ClusterMember) -> Response {
        if !is_websocket_upgrade(request.headers()) {
            return self.forward_http(request, member).await;
        }

        let (mut parts, _body) = request.into_parts();
        match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => self.forward_websocket(upgrade, &parts, member).await,
            Err(rejection) => {
                tracing::debug!(error = %rejection, "Rejecting malformed websocket upgrade");
                rejection.into_response()
            }
        }
    }

    /// Relay a plain HTTP request over `https` to `member`.
    pub async fn forward_http(&self, request: Request<Body>, member: &ClusterMember) -> Response {
        let started = Instant::now();
        let response = match http_relay::relay(&self.client, request, member).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(target_node = %member.node_name, peer = %member.authority(), error = %e, "HTTP forward failed");
                e.into_response()
            }
        };

        metrics::record_forward(ForwardKind::Http, response.status().as_u16(), started);
        response
    }

    /// Relay a WebSocket upgrade over `wss` to `member`.
    pub async fn forward_websocket(
        &self,
        upgrade: WebSocketUpgrade,
        inbound: &Parts,
        member: &ClusterMember,
    ) -> Response {
        let started = Instant::now();
        let response = match ws_relay::relay(upgrade, inbound, member, &self.websocket).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(target_node = %member.node_name, peer = %member.authority(), error = %e, "Websocket forward failed");
                e.into_response()
            }
        };

        metrics::record_forward(ForwardKind::WebSocket, response.status().as_u16(), started);
        response
    }
}
