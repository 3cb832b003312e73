//! Cluster membership subsystem.
//!
//! # Data Flow
//! ```text
//! [[members]] in config
//!     → member.rs (ClusterMember snapshots)
//!     → directory.rs (node name → member lookup)
//!     → forwarding middleware resolves the X-Agent-Target node
//!     → proxy subsystem receives a &ClusterMember
//! ```
//!
//! # Design Decisions
//! - Members are immutable values; the directory swaps whole snapshots
//! - The proxy never owns membership, it only borrows a member per call

pub mod directory;
pub mod member;

pub use directory::MemberDirectory;
pub use member::ClusterMember;
