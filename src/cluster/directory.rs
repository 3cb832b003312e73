//! Static membership directory.
//!
//! # Responsibilities
//! - Resolve a node name to its ClusterMember
//! - Swap the whole member set atomically on config reload
//!
//! # Design Decisions
//! - Readers never block: lookups load an `Arc` snapshot via `arc-swap`
//! - Lookups return owned clones so a reload mid-request cannot change
//!   the member a forward is already using

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::cluster::member::ClusterMember;

/// Lock-free node name → member map.
#[derive(Debug)]
pub struct MemberDirectory {
    members: ArcSwap<HashMap<String, ClusterMember>>,
}

impl MemberDirectory {
    /// Build a directory from a list of members. Later duplicates win.
    pub fn new(members: impl IntoIterator<Item = ClusterMember>) -> Self {
        Self {
            members: ArcSwap::from_pointee(index(members)),
        }
    }

    /// Look up a member by node name.
    pub fn get(&self, node_name: &str) -> Option<ClusterMember> {
        self.members.load().get(node_name).cloned()
    }

    /// Replace the entire member set.
    pub fn replace(&self, members: impl IntoIterator<Item = ClusterMember>) {
        let next = index(members);
        tracing::info!(members = next.len(), "Member directory updated");
        self.members.store(Arc::new(next));
    }

    pub fn len(&self) -> usize {
        self.members.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.load().is_empty()
    }

    /// Sorted node names currently known.
    pub fn node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.members.load().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MemberDirectory {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn index(members: impl IntoIterator<Item = ClusterMember>) -> HashMap<String, ClusterMember> {
    members
        .into_iter()
        .map(|member| (member.node_name.clone(), member))
        .collect()
}
