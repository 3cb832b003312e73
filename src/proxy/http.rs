//! HTTP relay engine.
//!
//! # Responsibilities
//! - Rewrite an inbound request into its peer-bound form
//! - Send it over the shared HTTPS client
//! - Stream the peer response back unchanged
//!
//! # Design Decisions
//! - Bodies are never buffered: the inbound body becomes the outbound body
//!   and the peer body becomes the response body
//! - Dropping the handler future (client went away) drops the outbound
//!   request and its connection
//! - Outbound requests are always HTTP/1.1 over TLS
//! - Only WebSocket upgrades are relayed as upgrades. Any other
//!   `Connection: Upgrade` request (e.g. `Upgrade: tcp` for hijacked
//!   attach/exec streams) loses its upgrade headers and reaches the peer as
//!   a plain request; a 101 is never relayed

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, request::Parts, HeaderValue, Request, Version},
    response::Response,
};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::cluster::ClusterMember;
use crate::proxy::error::ForwardError;
use crate::proxy::headers::{append_forwarded_for, set_target_node, strip_hop_by_hop};
use crate::proxy::target::{ForwardKind, ForwardingTarget};
use crate::proxy::tls::PeerTls;

/// Pooled HTTPS client used for every HTTP forward.
pub type PeerClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build the shared peer client. `connect_timeout` bounds TCP connect only.
pub fn build_client(tls: &PeerTls, connect_timeout: Option<Duration>) -> PeerClient {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);
    http.set_connect_timeout(connect_timeout);

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config((*tls.client_config()).clone())
        .https_only()
        .enable_http1()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(https)
}

/// Peer-bound copy of `parts` carrying `body`.
///
/// Scheme, authority and `Host` point at `member`; the path is kept, the
/// query merged, hop-by-hop headers dropped and the target-node header set.
pub fn outbound_request(
    parts: &Parts,
    body: Body,
    member: &ClusterMember,
    client_ip: Option<IpAddr>,
) -> Result<Request<Body>, ForwardError> {
    let target = ForwardingTarget::resolve(&parts.uri, member, ForwardKind::Http);
    let uri = target.uri_for(parts.uri.query())?;

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    let host = HeaderValue::from_str(target.authority()).map_err(|e| ForwardError::InvalidTarget {
        authority: target.authority().to_string(),
        reason: e.to_string(),
    })?;
    headers.insert(header::HOST, host);
    set_target_node(&mut headers, &member.node_name)?;
    if let Some(ip) = client_ip {
        append_forwarded_for(&mut headers, ip);
    }

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .version(Version::HTTP_11)
        .body(body)?;
    *request.headers_mut() = headers;

    Ok(request)
}

/// Forward `request` to `member` and return the peer's response.
pub async fn relay(
    client: &PeerClient,
    request: Request<Body>,
    member: &ClusterMember,
) -> Result<Response, ForwardError> {
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let (parts, body) = request.into_parts();
    let outbound = outbound_request(&parts, body, member, client_ip)?;

    tracing::debug!(
        method = %outbound.method(),
        uri = %outbound.uri(),
        target_node = %member.node_name,
        "Relaying HTTP request to peer"
    );

    let response: Response<Incoming> = client.request(outbound).await?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}
