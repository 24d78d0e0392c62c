//! Peer Connection State Machine
//!
//! Pure transition function for a single peer's connection lifecycle. The link core
//! owns the peers and feeds transport events through `ConnectionState::transition`,
//! which returns the next state, whether the transport's discovery loop needs a hard
//! reset, and an audit entry.
//!
//! ```text
//! NotConnected -> Connecting -> Connected
//! Connected -> Reconnecting -> Connecting | NotConnected
//! any -> Removed (terminal, peer leaves the registry)
//! ```

use crate::types::{PeerId, Timestamp};
use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Connection State Types
// ----------------------------------------------------------------------------

/// Connection state of one registry peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    NotConnected,
    Connecting,
    Connected,
    /// Session lost while flagged for reconnection
    Reconnecting,
    /// Evicted from the registry; no further transitions
    Removed,
}

impl ConnectionState {
    /// Get current state name for logging/audit
    pub fn state_name(&self) -> &'static str {
        match self {
            ConnectionState::NotConnected => "NotConnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Reconnecting => "Reconnecting",
            ConnectionState::Removed => "Removed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Removed)
    }

    /// Whether a session is live or being negotiated
    pub fn has_session(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}

// ----------------------------------------------------------------------------
// State Transition Events
// ----------------------------------------------------------------------------

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionEvent {
    /// Transport reports the session is being negotiated
    SessionConnecting,
    /// Transport reports the session is up
    SessionConnected,
    /// Transport reports the session is gone
    SessionDropped,
    /// Discovery no longer sees the peer
    PeerLost,
    /// A reconnect invitation could not even be issued
    InviteUnavailable,
    /// The local operator closed the session
    LocalDisconnect,
    /// The remote side sent a `disconnect` message
    RemoteDisconnect,
    /// Discovery announced a peer we hold a session with; that session was ended
    Rediscovered,
}

impl ConnectionEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ConnectionEvent::SessionConnecting => "SessionConnecting",
            ConnectionEvent::SessionConnected => "SessionConnected",
            ConnectionEvent::SessionDropped => "SessionDropped",
            ConnectionEvent::PeerLost => "PeerLost",
            ConnectionEvent::InviteUnavailable => "InviteUnavailable",
            ConnectionEvent::LocalDisconnect => "LocalDisconnect",
            ConnectionEvent::RemoteDisconnect => "RemoteDisconnect",
            ConnectionEvent::Rediscovered => "Rediscovered",
        }
    }
}

// ----------------------------------------------------------------------------
// State Transition Results
// ----------------------------------------------------------------------------

/// Result of a state transition
#[derive(Debug, Clone)]
pub struct StateTransition {
    /// New connection state
    pub new_state: ConnectionState,
    /// A failed reconnection attempt; discovery must be restarted
    pub hard_reset: bool,
    /// Audit trail entry
    pub audit_entry: AuditEntry,
}

/// Audit trail entry for state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: Timestamp,
    pub peer_id: PeerId,
    pub from_state: ConnectionState,
    pub to_state: ConnectionState,
    pub event: String,
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl ConnectionState {
    /// Process an event and compute the next state
    ///
    /// `auto_reconnect_active` decides whether losing the session or the peer leads
    /// to `Reconnecting` or to removal.
    pub fn transition(
        self,
        peer_id: &PeerId,
        event: ConnectionEvent,
        auto_reconnect_active: bool,
        now: Timestamp,
    ) -> Result<StateTransition, StateTransitionError> {
        let lost_target = if auto_reconnect_active {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Removed
        };

        let (new_state, hard_reset) = match (self, event) {
            (ConnectionState::Removed, event) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state: self.state_name().to_string(),
                    event: event.event_name().to_string(),
                    reason: format!("Peer {} was already removed", peer_id),
                });
            }

            (_, ConnectionEvent::SessionConnecting) => (ConnectionState::Connecting, false),
            (_, ConnectionEvent::SessionConnected) => (ConnectionState::Connected, false),

            // A drop while already reconnecting means the reconnect itself failed
            (state, ConnectionEvent::SessionDropped) => {
                (lost_target, state == ConnectionState::Reconnecting)
            }

            (_, ConnectionEvent::PeerLost) => (lost_target, false),

            (ConnectionState::Connected, ConnectionEvent::InviteUnavailable) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state: self.state_name().to_string(),
                    event: event.event_name().to_string(),
                    reason: "Peer already has a live session".to_string(),
                });
            }
            (_, ConnectionEvent::InviteUnavailable) => (ConnectionState::Reconnecting, false),

            (_, ConnectionEvent::LocalDisconnect) | (_, ConnectionEvent::RemoteDisconnect) => {
                (ConnectionState::NotConnected, false)
            }

            (state, ConnectionEvent::Rediscovered) if state.has_session() => {
                let target = if auto_reconnect_active {
                    ConnectionState::Reconnecting
                } else {
                    ConnectionState::NotConnected
                };
                (target, false)
            }
            (_, ConnectionEvent::Rediscovered) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state: self.state_name().to_string(),
                    event: event.event_name().to_string(),
                    reason: "No session to end".to_string(),
                });
            }
        };

        Ok(StateTransition {
            new_state,
            hard_reset,
            audit_entry: AuditEntry {
                timestamp: now,
                peer_id: peer_id.clone(),
                from_state: self,
                to_state: new_state,
                event: event.event_name().to_string(),
            },
        })
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    #[error("Invalid transition from {from_state} on event {event}: {reason}")]
    InvalidTransition {
        from_state: String,
        event: String,
        reason: String,
    },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
