//! Registry peers and their snapshots

use super::LinkRole;
use crate::config::BackoffConfig;
use crate::protocol::{ConnectionState, Cursor, InviteBackoff};
use crate::types::{PeerId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Context key carrying the player's display name
pub const CONTEXT_PLAYER: &str = "player";
/// Context key carrying the player's email
pub const CONTEXT_EMAIL: &str = "email";

// ----------------------------------------------------------------------------
// Peer Attributes
// ----------------------------------------------------------------------------

/// Identity a peer declares in its invitation context or discovery info
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAttributes {
    pub display_name: Option<String>,
    pub player_email: Option<String>,
}

impl PeerAttributes {
    pub fn new(display_name: impl Into<String>, player_email: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            player_email: Some(player_email.into()),
        }
    }

    /// Read `player` and `email` from a context map
    pub fn from_context(context: &BTreeMap<String, String>) -> Self {
        Self {
            display_name: context.get(CONTEXT_PLAYER).cloned(),
            player_email: context.get(CONTEXT_EMAIL).cloned(),
        }
    }

    /// Invitation context: `extra` overlaid with `player`/`email`
    pub fn to_context(&self, extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut context = extra.clone();
        if let Some(name) = &self.display_name {
            context.insert(CONTEXT_PLAYER.to_string(), name.clone());
        }
        if let Some(email) = &self.player_email {
            context.insert(CONTEXT_EMAIL.to_string(), email.clone());
        }
        context
    }

    /// Take every attribute `other` declares
    pub fn merge(&mut self, other: PeerAttributes) {
        if other.display_name.is_some() {
            self.display_name = other.display_name;
        }
        if other.player_email.is_some() {
            self.player_email = other.player_email;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.player_email.is_none()
    }
}

/// Parse an invitation context payload into a string map
///
/// Returns `None` for anything that is not a JSON object. Non-string values are
/// skipped.
pub fn parse_context(bytes: &[u8]) -> Option<BTreeMap<String, String>> {
    let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(bytes) else {
        return None;
    };
    Some(
        object
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                _ => None,
            })
            .collect(),
    )
}

// ----------------------------------------------------------------------------
// Peer
// ----------------------------------------------------------------------------

/// One known remote device, owned by the link core
#[derive(Debug, Clone)]
pub struct Peer {
    pub device_id: PeerId,
    pub attributes: PeerAttributes,
    pub state: ConnectionState,
    /// Reason given with the most recent disconnect
    pub reason: Option<String>,
    /// Consumer asked for reconnection on the current/next session
    pub auto_reconnect_requested: bool,
    /// Reconnection armed by a successful connection
    pub auto_reconnect_active: bool,
    pub backoff: InviteBackoff,
    /// A deferred invitation is already queued
    pub retry_scheduled: bool,
    /// Extra invitation context supplied with the last connect request
    pub invite_context: BTreeMap<String, String>,
    pub last_change: Timestamp,
}

impl Peer {
    pub fn new(device_id: PeerId, backoff: BackoffConfig, now: Timestamp) -> Self {
        Self {
            device_id,
            attributes: PeerAttributes::default(),
            state: ConnectionState::NotConnected,
            reason: None,
            auto_reconnect_requested: false,
            auto_reconnect_active: false,
            backoff: InviteBackoff::new(backoff),
            retry_scheduled: false,
            invite_context: BTreeMap::new(),
            last_change: now,
        }
    }

    /// Plain-data copy for consumers
    pub fn snapshot(&self, role: LinkRole, cursor: Cursor) -> PeerSnapshot {
        PeerSnapshot {
            device_id: self.device_id.clone(),
            attributes: self.attributes.clone(),
            state: self.state,
            reason: self.reason.clone(),
            auto_reconnect_requested: self.auto_reconnect_requested,
            auto_reconnect_active: self.auto_reconnect_active,
            invite_attempts: self.backoff.attempt_count(),
            role,
            cursor,
        }
    }
}

/// Point-in-time copy of a peer, safe to hand out of the collector task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    pub device_id: PeerId,
    pub attributes: PeerAttributes,
    pub state: ConnectionState,
    pub reason: Option<String>,
    pub auto_reconnect_requested: bool,
    pub auto_reconnect_active: bool,
    pub invite_attempts: u32,
    pub role: LinkRole,
    pub cursor: Cursor,
}
