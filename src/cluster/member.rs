//! Cluster member descriptor.

use std::fmt;
use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};

/// A peer node in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ClusterMember {
    /// Name used by peers to recognise themselves as the intended target.
    pub node_name: String,

    /// Host name or IP address of the peer's API listener.
    pub address: String,

    /// Port of the peer's API listener.
    pub port: u16,
}

impl ClusterMember {
    pub fn new(node_name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            node_name: node_name.into(),
            address: address.into(),
            port,
        }
    }

    /// `address:port`, with IPv6 literals wrapped in brackets.
    pub fn authority(&self) -> String {
        if self.address.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl fmt::Display for ClusterMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.node_name, self.authority())
    }
}
