//! WebSocket relay lifecycle tracking.
//!
//! # Responsibilities
//! - Track relay state (Idle → Handshaking → Relaying → Closed)
//! - Generate unique relay IDs for tracing
//! - Count live relays so leaks are observable

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Global counter for relay IDs; only uniqueness matters.
static RELAY_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a WebSocket relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayId(u64);

impl RelayId {
    pub fn new() -> Self {
        Self(RELAY_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RelayId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "relay-{}", self.0)
    }
}

/// WebSocket relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Upgrade request received, nothing dialled yet.
    Idle,
    /// Handshake with the peer in flight.
    Handshaking,
    /// Both legs up, frames flowing.
    Relaying,
    /// Terminal.
    Closed,
}

impl RelayState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: RelayState) -> bool {
        matches!(
            (self, next),
            (RelayState::Idle, RelayState::Handshaking)
                | (RelayState::Handshaking, RelayState::Relaying)
                | (RelayState::Handshaking, RelayState::Closed)
                | (RelayState::Relaying, RelayState::Closed)
        )
    }
}

/// Counts live WebSocket relays.
#[derive(Debug, Clone, Default)]
pub struct RelayTracker {
    active_count: Arc<AtomicU64>,
}

impl RelayTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relay in the Idle state. The count drops when the guard does.
    pub fn track(&self) -> RelayGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::relay_opened();
        RelayGuard {
            active_count: Arc::clone(&self.active_count),
            id: RelayId::new(),
            state: RelayState::Idle,
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until no relay is live.
    pub async fn wait_idle(&self) {
        while self.active_count() > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
    }
}

/// One live relay. Dropping it moves the relay to Closed.
#[derive(Debug)]
pub struct RelayGuard {
    active_count: Arc<AtomicU64>,
    id: RelayId,
    state: RelayState,
}

impl RelayGuard {
    pub fn id(&self) -> RelayId {
        self.id
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Advance the state machine; illegal transitions are ignored and logged.
    pub fn transition(&mut self, next: RelayState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(relay_id = %self.id, from = ?self.state, to = ?next, "Ignoring illegal relay transition");
            return;
        }
        tracing::debug!(relay_id = %self.id, from = ?self.state, to = ?next, "Relay state changed");
        self.state = next;
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        if self.state != RelayState::Closed {
            tracing::debug!(relay_id = %self.id, from = ?self.state, "Relay dropped before close");
            self.state = RelayState::Closed;
        }
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        metrics::relay_closed();
        tracing::trace!(relay_id = %self.id, "Relay released");
    }
}
