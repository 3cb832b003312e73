//! Forwarding middleware.
//!
//! Requests whose `X-Agent-Target` header names another cluster member are
//! handed to the [`Forwarder`](crate::proxy::Forwarder); everything else
//! reaches the local handlers.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::proxy::TARGET_NODE_HEADER;

pub async fn forward_to_member(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let target = request
        .headers()
        .get(TARGET_NODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    let Some(target) = target else {
        return next.run(request).await;
    };
    if target == *state.node_name {
        return next.run(request).await;
    }

    let Some(member) = state.directory.get(&target) else {
        tracing::warn!(request_id = %request.request_id(), target_node = %target, "Unknown target node");
        return (StatusCode::NOT_FOUND, "Unknown target node").into_response();
    };

    tracing::debug!(
        request_id = %request.request_id(),
        method = %request.method(),
        path = %request.uri().path(),
        target_node = %member.node_name,
        "Forwarding request to member"
    );

    state.forwarder.forward(request, &member).await
}
