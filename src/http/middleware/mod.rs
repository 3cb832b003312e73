//! Request middleware.

pub mod forward;

pub use forward::forward_to_member;
