//! Header propagation rules for forwarded traffic.
//!
//! # Responsibilities
//! - Name the signature and target-node headers
//! - Set the target-node header on outbound requests and handshakes
//! - Strip hop-by-hop headers, append X-Forwarded-For (HTTP relay)
//! - Build the narrow header set of a WebSocket handshake
//!
//! # Design Decisions
//! - The signature value is opaque: copied byte-for-byte, never parsed
//! - WebSocket handshakes only carry the two agent headers plus an explicit
//!   passthrough list; the WebSocket client adds its own upgrade headers

use std::net::IpAddr;

use axum::http::{
    header::{self, HeaderName},
    HeaderMap, HeaderValue,
};

use crate::proxy::error::ForwardError;

/// Opaque credential presented by the caller, forwarded unchanged.
pub const SIGNATURE_HEADER: HeaderName = HeaderName::from_static("x-agent-signature");

/// Node that should ultimately handle the request.
pub const TARGET_NODE_HEADER: HeaderName = HeaderName::from_static("x-agent-target");

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers meaningful only for a single transport hop (RFC 9110 §7.6.1).
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Overwrite the target-node header with `node_name`.
pub fn set_target_node(headers: &mut HeaderMap, node_name: &str) -> Result<(), ForwardError> {
    let value = HeaderValue::from_str(node_name).map_err(|e| ForwardError::InvalidTarget {
        authority: node_name.to_string(),
        reason: format!("node name is not a valid header value: {e}"),
    })?;
    headers.insert(TARGET_NODE_HEADER, value);
    Ok(())
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Append `client` to X-Forwarded-For, keeping earlier hops.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{prior}, {client}"),
        _ => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// True when the request asks for a WebSocket upgrade.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    connection_upgrade && upgrade_websocket
}

/// Headers added to the outbound WebSocket handshake.
///
/// The signature is copied only when the inbound request carries it; the
/// target-node header is always set. `passthrough` names extra inbound
/// headers to copy with all their values.
pub fn websocket_handshake_headers(
    inbound: &HeaderMap,
    node_name: &str,
    passthrough: &[HeaderName],
) -> Result<HeaderMap, ForwardError> {
    let mut out = HeaderMap::new();

    for name in passthrough {
        for value in inbound.get_all(name) {
            out.append(name.clone(), value.clone());
        }
    }

    if let Some(signature) = inbound.get(SIGNATURE_HEADER) {
        out.insert(SIGNATURE_HEADER, signature.clone());
    }
    set_target_node(&mut out, node_name)?;

    Ok(out)
}
