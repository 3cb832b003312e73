//! Forwarding target computation.
//!
//! # Responsibilities
//! - Derive scheme/authority/path for a forward from the inbound URI and a member
//! - Merge the target's own query with the inbound query
//!
//! # Design Decisions
//! - Pure: the inbound request is only read, a new URI is produced
//! - One target per forward, tagged with the relay kind that will use it

use axum::http::Uri;

use crate::cluster::ClusterMember;
use crate::proxy::error::ForwardError;

/// Which relay engine carries a forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForwardKind {
    Http,
    WebSocket,
}

impl ForwardKind {
    /// Outbound URI scheme for this kind.
    pub fn scheme(self) -> &'static str {
        match self {
            ForwardKind::Http => "https",
            ForwardKind::WebSocket => "wss",
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ForwardKind::Http => "http",
            ForwardKind::WebSocket => "websocket",
        }
    }
}

impl std::fmt::Display for ForwardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination of a single forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingTarget {
    kind: ForwardKind,
    authority: String,
    path: String,
    query: Option<String>,
}

impl ForwardingTarget {
    /// Point the inbound path at `member`. The target carries no query of its
    /// own; the inbound query is merged in by [`ForwardingTarget::uri_for`].
    pub fn resolve(inbound: &Uri, member: &ClusterMember, kind: ForwardKind) -> Self {
        let path = match inbound.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        Self {
            kind,
            authority: member.authority(),
            path,
            query: None,
        }
    }

    /// Attach a target-level query placed before the inbound one.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Build the outbound URI, merging `inbound_query` after the target query.
    pub fn uri_for(&self, inbound_query: Option<&str>) -> Result<Uri, ForwardError> {
        let path_and_query = match merge_query(self.query.as_deref(), inbound_query) {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        };

        Uri::builder()
            .scheme(self.kind.scheme())
            .authority(self.authority.as_str())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| ForwardError::InvalidTarget {
                authority: self.authority.clone(),
                reason: e.to_string(),
            })
    }
}

/// Join two raw query strings.
///
/// An empty or missing side yields the other side unchanged; two non-empty
/// queries are joined as `target&inbound`.
pub fn merge_query(target: Option<&str>, inbound: Option<&str>) -> Option<String> {
    let target = target.filter(|q| !q.is_empty());
    let inbound = inbound.filter(|q| !q.is_empty());

    match (target, inbound) {
        (Some(t), Some(i)) => Some(format!("{t}&{i}")),
        (Some(q), None) | (None, Some(q)) => Some(q.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> ClusterMember {
        ClusterMember::new("node-b", "10.0.0.5", 9001)
    }

    #[test]
    fn http_target_uses_https() {
        let inbound: Uri = "/api/status?x=1".parse().unwrap();
        let target = ForwardingTarget::resolve(&inbound, &member(), ForwardKind::Http);

        let uri = target.uri_for(inbound.query()).unwrap();
        assert_eq!(uri.to_string(), "https://10.0.0.5:9001/api/status?x=1");
        assert_eq!(uri.scheme_str(), Some("https"));
        assert_eq!(uri.authority().unwrap().as_str(), "10.0.0.5:9001");
    }

    #[test]
    fn websocket_target_uses_wss() {
        let inbound: Uri = "/api/exec".parse().unwrap();
        let target = ForwardingTarget::resolve(&inbound, &member(), ForwardKind::WebSocket);

        let uri = target.uri_for(inbound.query()).unwrap();
        assert_eq!(uri.to_string(), "wss://10.0.0.5:9001/api/exec");
    }

    #[test]
    fn absolute_inbound_host_is_replaced() {
        let inbound: Uri = "http://node-a:9001/volumes/v1?all=true".parse().unwrap();
        let target = ForwardingTarget::resolve(&inbound, &member(), ForwardKind::Http);

        let uri = target.uri_for(inbound.query()).unwrap();
        assert_eq!(uri.to_string(), "https://10.0.0.5:9001/volumes/v1?all=true");
    }

    #[test]
    fn empty_path_becomes_root() {
        let inbound: Uri = "http://node-a:9001".parse().unwrap();
        let target = ForwardingTarget::resolve(&inbound, &member(), ForwardKind::Http);
        assert_eq!(target.path(), "/");
    }

    #[test]
    fn merge_degenerates_to_non_empty_side() {
        assert_eq!(merge_query(Some("a=1"), None).as_deref(), Some("a=1"));
        assert_eq!(merge_query(Some("a=1"), Some("")).as_deref(), Some("a=1"));
        assert_eq!(merge_query(None, Some("x=1")).as_deref(), Some("x=1"));
        assert_eq!(merge_query(Some(""), Some("x=1")).as_deref(), Some("x=1"));
        assert_eq!(merge_query(Some(""), None), None);
    }

    #[test]
    fn merge_joins_target_first_with_single_ampersand() {
        let merged = merge_query(Some("a=1"), Some("x=1&y=2")).unwrap();
        assert_eq!(merged, "a=1&x=1&y=2");
        assert_eq!(merged.matches("&&").count(), 0);
    }

    #[test]
    fn target_query_precedes_inbound_query() {
        let inbound: Uri = "/api/status?x=1".parse().unwrap();
        let target =
            ForwardingTarget::resolve(&inbound, &member(), ForwardKind::Http).with_query("a=1");

        let uri = target.uri_for(inbound.query()).unwrap();
        assert_eq!(uri.query(), Some("a=1&x=1"));
    }

    #[test]
    fn invalid_authority_is_an_addressing_error() {
        let bad = ClusterMember::new("node-x", "bad host", 9001);
        let inbound: Uri = "/".parse().unwrap();
        let target = ForwardingTarget::resolve(&inbound, &bad, ForwardKind::Http);

        assert!(matches!(
            target.uri_for(None),
            Err(ForwardError::InvalidTarget { .. })
        ));
    }
}
