//! Shared fixtures: a TLS peer node and a relay node in front of it.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use futures_util::stream;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use cluster_relay::cluster::{ClusterMember, MemberDirectory};
use cluster_relay::config::AgentConfig;
use cluster_relay::http::HttpServer;
use cluster_relay::lifecycle::Shutdown;
use cluster_relay::proxy::tls::ensure_crypto_provider;
use cluster_relay::proxy::RelayTracker;

pub const SIGNATURE: &str = "sig-token";

/// Pause between chunks of the slow `/stream` response.
pub const CHUNK_DELAY: Duration = Duration::from_millis(1500);

/// Mock peer node speaking HTTPS/WSS with a self-signed certificate.
pub struct Peer {
    pub addr: SocketAddr,
    handshakes: Arc<Mutex<Vec<HeaderMap>>>,
    stream_dropped: Arc<Notify>,
    handle: Handle,
}

impl Peer {
    pub fn member(&self, node_name: &str) -> ClusterMember {
        ClusterMember::new(node_name, "127.0.0.1", self.addr.port())
    }

    /// Headers of every WebSocket handshake the peer accepted so far.
    #[allow(dead_code)]
    pub fn handshakes(&self) -> Vec<HeaderMap> {
        self.handshakes.lock().unwrap().clone()
    }

    /// Resolves once an `/stream-endless` body has been dropped by the peer.
    #[allow(dead_code)]
    pub async fn stream_dropped(&self) {
        self.stream_dropped.notified().await;
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

#[derive(Clone)]
struct PeerState {
    handshakes: Arc<Mutex<Vec<HeaderMap>>>,
    stream_dropped: Arc<Notify>,
}

pub async fn start_peer() -> Peer {
    ensure_crypto_provider();

    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
        .unwrap();
    let tls = RustlsConfig::from_pem(cert.cert.pem().into_bytes(), cert.key_pair.serialize_pem().into_bytes())
        .await
        .unwrap();

    let handshakes = Arc::new(Mutex::new(Vec::new()));
    let stream_dropped = Arc::new(Notify::new());
    let app = Router::new()
        .route("/ws", get(ws_echo))
        .route("/ws-close", get(ws_close))
        .route("/ws-abort", get(ws_abort))
        .route("/stream", get(slow_stream))
        .route("/stream-endless", get(endless_stream))
        .route("/ws-reject", get(|| async { (StatusCode::FORBIDDEN, "forbidden") }))
        .route("/status/{code}", any(status))
        .route("/{*path}", any(echo))
        .with_state(PeerState {
            handshakes: Arc::clone(&handshakes),
            stream_dropped: Arc::clone(&stream_dropped),
        });

    let handle = Handle::new();
    let server = axum_server::bind_rustls("127.0.0.1:0".parse().unwrap(), tls).handle(handle.clone());
    tokio::spawn(async move {
        let _ = server.serve(app.into_make_service()).await;
    });
    let addr = handle.listening().await.unwrap();

    Peer {
        addr,
        handshakes,
        stream_dropped,
        handle,
    }
}

/// Echo what arrived: request line in the body, agent headers as `x-echo-*`.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let mut response = format!("{method} {uri}\n{}", String::from_utf8_lossy(&body)).into_response();
    for (from, to) in [
        ("x-agent-target", "x-echo-target"),
        ("x-agent-signature", "x-echo-signature"),
        ("host", "x-echo-host"),
        ("x-forwarded-for", "x-echo-forwarded-for"),
    ] {
        if let Some(value) = headers.get(from) {
            response.headers_mut().insert(to, value.clone());
        }
    }
    response
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {code}")).into_response()
}

/// Three chunks, `CHUNK_DELAY` apart.
async fn slow_stream() -> Body {
    let chunks = stream::unfold(0u32, |i| async move {
        if i == 3 {
            return None;
        }
        if i > 0 {
            tokio::time::sleep(CHUNK_DELAY).await;
        }
        Some((Ok::<_, Infallible>(Bytes::from(format!("chunk{i}\n"))), i + 1))
    });
    Body::from_stream(chunks)
}

/// Signals `stream_dropped` when the body it travels with is dropped.
struct DropSignal(Arc<Notify>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

/// A chunk every 100ms until the reader goes away.
async fn endless_stream(State(state): State<PeerState>) -> Body {
    let signal = DropSignal(state.stream_dropped);
    let chunks = stream::unfold((0u64, signal), |(i, signal)| async move {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Some((Ok::<_, Infallible>(Bytes::from(format!("tick{i}\n"))), (i + 1, signal)))
    });
    Body::from_stream(chunks)
}

async fn ws_echo(State(state): State<PeerState>, headers: HeaderMap, upgrade: WebSocketUpgrade) -> Response {
    state.handshakes.lock().unwrap().push(headers);
    upgrade.protocols(["relay.v1"]).on_upgrade(echo_frames)
}

async fn echo_frames(mut socket: WebSocket) {
    while let Some(Ok(frame)) = socket.recv().await {
        match frame {
            Message::Text(_) | Message::Binary(_) => {
                if socket.send(frame).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn ws_close(upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(|mut socket| async move {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: 4001,
                reason: "session ended".into(),
            })))
            .await;
        while let Some(Ok(_)) = socket.recv().await {}
    })
}

/// Drops the connection without a close frame.
async fn ws_abort(upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(|socket| async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(socket);
    })
}

/// Relay node under test, listening on plain HTTP.
pub struct Node {
    pub addr: SocketAddr,
    pub relays: RelayTracker,
    shutdown: Shutdown,
}

impl Node {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    #[allow(dead_code)]
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_node(name: &str, members: Vec<ClusterMember>) -> Node {
    start_node_with(name, members, |_| {}).await
}

pub async fn start_node_with(
    name: &str,
    members: Vec<ClusterMember>,
    configure: impl FnOnce(&mut AgentConfig),
) -> Node {
    let mut config = AgentConfig::default();
    config.node.name = name.to_string();
    config.observability.metrics_enabled = false;
    configure(&mut config);

    let directory = Arc::new(MemberDirectory::new(members));
    let server = HttpServer::new(config, directory).unwrap();
    let relays = server.forwarder().relays().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    Node {
        addr,
        relays,
        shutdown,
    }
}

/// A member whose port has nothing listening.
pub fn unreachable_member(node_name: &str) -> ClusterMember {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);
    ClusterMember::new(node_name, "127.0.0.1", port)
}
