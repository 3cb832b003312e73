//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the local handlers
//! - Wire up middleware (request ID, tracing, forwarding)
//! - Serve plain HTTP or TLS on the given listener
//! - Stop on the shutdown signal

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::cluster::MemberDirectory;
use crate::config::AgentConfig;
use crate::http::middleware::forward_to_member;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::net::tls::load_tls_config;
use crate::proxy::{ForwardError, Forwarder};

/// How long in-flight requests get once shutdown starts (TLS listener).
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub node_name: Arc<str>,
    pub directory: Arc<MemberDirectory>,
    pub forwarder: Forwarder,
}

/// HTTP server for a cluster node.
pub struct HttpServer {
    router: Router,
    config: AgentConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server. Fails only if peer TLS cannot be set up.
    pub fn new(config: AgentConfig, directory: Arc<MemberDirectory>) -> Result<Self, ForwardError> {
        let forwarder = Forwarder::new(&config.peer, &config.websocket)?;

        let state = AppState {
            node_name: Arc::from(config.node.name.as_str()),
            directory,
            forwarder,
        };

        let router = Self::build_router(state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/ping", get(ping))
            .route("/{*path}", any(no_local_handler))
            .route("/", any(no_local_handler))
            .with_state(state.clone())
            .layer(middleware::from_fn_with_state(state, forward_to_member))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// The router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The forwarder shared by every request of this server.
    pub fn forwarder(&self) -> &Forwarder {
        &self.state.forwarder
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        match &self.config.listener.tls {
            None => {
                tracing::info!(address = %addr, node = %self.state.node_name, "HTTP server starting");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await?;
            }
            Some(tls) => {
                let rustls =
                    load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
                let handle = axum_server::Handle::new();
                let signal = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    signal.graceful_shutdown(Some(SHUTDOWN_GRACE));
                });

                tracing::info!(address = %addr, node = %self.state.node_name, "HTTPS server starting");
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Liveness probe; answers with the local node name.
async fn ping(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.node_name.to_string())
}

async fn no_local_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "No local handler for this path")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterMember;
    use crate::proxy::TARGET_NODE_HEADER;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let mut config = AgentConfig::default();
        config.node.name = "node-a".into();
        let directory = Arc::new(MemberDirectory::new(vec![ClusterMember::new(
            "node-b", "127.0.0.1", 1,
        )]));
        HttpServer::new(config, directory).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn serves_locally_without_target_header() {
        let response = server()
            .router()
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_text(response).await, "node-a");
    }

    #[tokio::test]
    async fn serves_locally_when_targeting_self() {
        let response = server()
            .router()
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header(TARGET_NODE_HEADER, "node-a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "node-a");
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let response = server()
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .header(TARGET_NODE_HEADER, "node-z")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Unknown target node");
    }

    #[tokio::test]
    async fn unreachable_member_is_bad_gateway() {
        // node-b points at port 1, where nothing listens.
        let response = server()
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/status?x=1")
                    .header(TARGET_NODE_HEADER, "node-b")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
