//! WebSocket relay engine.
//!
//! # Responsibilities
//! - Complete the handshake with the peer before upgrading the client
//! - Carry the signature and target-node headers on the peer handshake
//! - Forward frames in both directions until either leg ends
//!
//! # Data Flow
//! ```text
//! Client ←──── frames ────→ relay ←──── frames ────→ Peer (wss)
//! ```
//!
//! # Design Decisions
//! - A peer rejection is returned to the client instead of the 101
//! - Frames are forwarded one message at a time, never merged or split
//! - First leg to finish ends the relay; both legs are then closed
//! - Each leg answers pings itself, so pings are forwarded but pongs are not;
//!   a ping gets exactly one pong

use std::sync::Arc;

use axum::{
    extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    http::{header, request::Parts, HeaderName},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{
        self,
        client::IntoClientRequest,
        protocol::{frame::coding::CloseCode, CloseFrame as PeerCloseFrame},
        Message as PeerMessage,
    },
    Connector, MaybeTlsStream, WebSocketStream,
};

use crate::cluster::ClusterMember;
use crate::proxy::error::ForwardError;
use crate::proxy::headers::websocket_handshake_headers;
use crate::proxy::target::{ForwardKind, ForwardingTarget};
use crate::proxy::tracker::{RelayGuard, RelayId, RelayState, RelayTracker};

type PeerSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Everything the WebSocket relay needs besides the request itself.
#[derive(Debug, Clone)]
pub struct WebSocketContext {
    pub tls: Arc<rustls::ClientConfig>,
    pub passthrough: Arc<[HeaderName]>,
    pub tracker: RelayTracker,
}

/// A leg failed while relaying.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("client leg: {0}")]
    Client(#[from] axum::Error),

    #[error("peer leg: {0}")]
    Peer(#[from] tungstenite::Error),
}

/// Which side ended the relay cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClosedBy {
    Client,
    Peer,
}

/// Dial `member`, then upgrade the client and relay frames.
pub async fn relay(
    upgrade: WebSocketUpgrade,
    inbound: &Parts,
    member: &ClusterMember,
    ctx: &WebSocketContext,
) -> Result<Response, ForwardError> {
    let mut guard = ctx.tracker.track();
    let relay_id = guard.id();

    let target = ForwardingTarget::resolve(&inbound.uri, member, ForwardKind::WebSocket);
    let uri = target.uri_for(inbound.uri.query())?;

    let mut handshake = uri.clone().into_client_request()?;
    let extra = websocket_handshake_headers(&inbound.headers, &member.node_name, &ctx.passthrough)?;
    let headers = handshake.headers_mut();
    for name in extra.keys() {
        headers.remove(name);
    }
    for (name, value) in extra.iter() {
        headers.append(name.clone(), value.clone());
    }

    guard.transition(RelayState::Handshaking);
    tracing::debug!(relay_id = %relay_id, uri = %uri, target_node = %member.node_name, "Dialling peer websocket");

    let connector = Connector::Rustls(Arc::clone(&ctx.tls));
    let (peer, response) = match connect_async_tls_with_config(handshake, None, true, Some(connector)).await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::warn!(relay_id = %relay_id, target_node = %member.node_name, error = %e, "Peer websocket handshake failed");
            guard.transition(RelayState::Closed);
            return Err(e.into());
        }
    };

    // Echo the subprotocol the peer picked so the client sees the same one.
    let upgrade = match response
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
    {
        Some(protocol) => upgrade.protocols([protocol.to_string()]),
        None => upgrade,
    };

    let target_node = member.node_name.clone();
    Ok(upgrade
        .on_failed_upgrade(move |e| {
            tracing::warn!(relay_id = %relay_id, error = %e, "Client websocket upgrade failed");
        })
        .on_upgrade(move |client| run(client, peer, guard, target_node)))
}

async fn run(client: WebSocket, peer: PeerSocket, mut guard: RelayGuard, target_node: String) {
    guard.transition(RelayState::Relaying);
    let relay_id = guard.id();
    tracing::info!(relay_id = %relay_id, target_node = %target_node, "Websocket relay established");

    match pump(client, peer, relay_id).await {
        Ok(ClosedBy::Client) => {
            tracing::info!(relay_id = %relay_id, target_node = %target_node, "Client closed websocket relay");
        }
        Ok(ClosedBy::Peer) => {
            tracing::info!(relay_id = %relay_id, target_node = %target_node, "Peer closed websocket relay");
        }
        Err(e) => {
            tracing::warn!(relay_id = %relay_id, target_node = %target_node, error = %e, "Websocket relay aborted");
        }
    }

    guard.transition(RelayState::Closed);
}

async fn pump(client: WebSocket, peer: PeerSocket, relay_id: RelayId) -> Result<ClosedBy, RelayError> {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut peer_tx, mut peer_rx) = peer.split();

    let client_to_peer = async {
        while let Some(frame) = client_rx.next().await {
            let frame = frame?;
            let closing = matches!(frame, Message::Close(_));
            let Some(frame) = to_peer(frame) else {
                continue;
            };
            tracing::trace!(relay_id = %relay_id, "client → peer frame");
            peer_tx.send(frame).await?;
            if closing {
                break;
            }
        }
        Ok::<_, RelayError>(ClosedBy::Client)
    };

    let peer_to_client = async {
        while let Some(frame) = peer_rx.next().await {
            let frame = frame?;
            let closing = matches!(frame, PeerMessage::Close(_));
            let Some(frame) = to_client(frame) else {
                continue;
            };
            tracing::trace!(relay_id = %relay_id, "peer → client frame");
            client_tx.send(frame).await?;
            if closing {
                break;
            }
        }
        Ok::<_, RelayError>(ClosedBy::Peer)
    };

    let outcome = tokio::select! {
        result = client_to_peer => result,
        result = peer_to_client => result,
    };

    // Whichever leg is still open gets closed.
    let _ = client_tx.close().await;
    let _ = peer_tx.close().await;

    outcome
}

fn to_peer(frame: Message) -> Option<PeerMessage> {
    Some(match frame {
        Message::Text(text) => PeerMessage::Text(text.as_str().into()),
        Message::Binary(data) => PeerMessage::Binary(data),
        Message::Ping(data) => PeerMessage::Ping(data),
        Message::Pong(_) => return None,
        Message::Close(frame) => PeerMessage::Close(frame.map(|f| PeerCloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().into(),
        })),
    })
}

fn to_client(frame: PeerMessage) -> Option<Message> {
    Some(match frame {
        PeerMessage::Text(text) => Message::Text(text.as_str().into()),
        PeerMessage::Binary(data) => Message::Binary(data),
        PeerMessage::Ping(data) => Message::Ping(data),
        PeerMessage::Pong(_) => return None,
        PeerMessage::Close(frame) => Message::Close(frame.map(|f| CloseFrame {
            code: f.code.into(),
            reason: f.reason.as_str().into(),
        })),
        PeerMessage::Frame(_) => return None,
    })
}
