//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Member descriptors complete and unique
//! - Peer trust configured one way or the other
//! - Websocket passthrough list names real, non-reserved headers
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: &AgentConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::AgentConfig;
use crate::proxy::headers::{SIGNATURE_HEADER, TARGET_NODE_HEADER};

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("node.name must not be empty")]
    EmptyNodeName,

    #[error("node name '{0}' is not usable as a header value")]
    InvalidNodeName(String),

    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("member '{0}' is listed more than once")]
    DuplicateMember(String),

    #[error("member '{0}' has no address")]
    MissingMemberAddress(String),

    #[error("member '{0}' has port 0")]
    InvalidMemberPort(String),

    #[error("peer trust requires insecure_skip_verify or ca_cert_path")]
    NoPeerTrust,

    #[error("websocket passthrough header '{0}' is not a valid header name")]
    InvalidPassthroughHeader(String),

    #[error("websocket passthrough header '{0}' is managed by the relay")]
    ReservedPassthroughHeader(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check everything serde cannot.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.node.name.trim().is_empty() {
        errors.push(ValidationError::EmptyNodeName);
    } else if HeaderValue::from_str(&config.node.name).is_err() {
        errors.push(ValidationError::InvalidNodeName(config.node.name.clone()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for member in &config.members {
        if member.node_name.trim().is_empty() {
            errors.push(ValidationError::EmptyNodeName);
        } else if HeaderValue::from_str(&member.node_name).is_err() {
            errors.push(ValidationError::InvalidNodeName(member.node_name.clone()));
        }
        if !seen.insert(member.node_name.as_str()) {
            errors.push(ValidationError::DuplicateMember(member.node_name.clone()));
        }
        if member.address.trim().is_empty() {
            errors.push(ValidationError::MissingMemberAddress(member.node_name.clone()));
        }
        if member.port == 0 {
            errors.push(ValidationError::InvalidMemberPort(member.node_name.clone()));
        }
    }

    if !config.peer.insecure_skip_verify && config.peer.ca_cert_path.is_none() {
        errors.push(ValidationError::NoPeerTrust);
    }

    for name in &config.websocket.passthrough_headers {
        match HeaderName::from_bytes(name.as_bytes()) {
            Ok(header) if header == SIGNATURE_HEADER || header == TARGET_NODE_HEADER => {
                errors.push(ValidationError::ReservedPassthroughHeader(name.clone()));
            }
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::InvalidPassthroughHeader(name.clone())),
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
