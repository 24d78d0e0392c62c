//! Shared link core
//!
//! Registry and transitions common to both link roles. Role variants call into
//! `LinkCore` for everything that does not depend on whether this side advertises or
//! browses.

use super::peer::{Peer, PeerSnapshot};
use super::LinkRole;
use crate::channel::{AppEvent, Effect, HandlerState, SessionState};
use crate::config::LinkConfig;
use crate::errors::{PeerlogError, Result};
use crate::protocol::{AuditEntry, ConnectionEvent, CursorLookup, StateTransition, WireMessage};
use crate::types::{PeerId, TimeSource, Timestamp};
use hashbrown::HashMap;
use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};

/// Disconnect reason sent to devices that open a session we know nothing about
pub const UNEXPECTED_CONNECTION: &str = "Unexpected connection";

// ----------------------------------------------------------------------------
// Link Output
// ----------------------------------------------------------------------------

/// Effects and app events produced by one link operation, in emission order
#[derive(Debug, Default)]
pub struct LinkOutput {
    pub effects: Vec<Effect>,
    pub app_events: Vec<AppEvent>,
}

impl LinkOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.app_events.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Effect>, Vec<AppEvent>) {
        (self.effects, self.app_events)
    }
}

// ----------------------------------------------------------------------------
// Link Core
// ----------------------------------------------------------------------------

pub struct LinkCore {
    config: LinkConfig,
    peers: HashMap<PeerId, Peer>,
    audit_trail: VecDeque<AuditEntry>,
    handler_state: HandlerState,
    time_source: Box<dyn TimeSource + Send + Sync>,
}

impl core::fmt::Debug for LinkCore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LinkCore")
            .field("role", &self.config.role)
            .field("peers", &self.peers.len())
            .field("handler_state", &self.handler_state)
            .finish()
    }
}

impl LinkCore {
    pub fn new(config: LinkConfig, time_source: Box<dyn TimeSource + Send + Sync>) -> Self {
        Self {
            config,
            peers: HashMap::new(),
            audit_trail: VecDeque::new(),
            handler_state: HandlerState::NotStarted,
            time_source,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn role(&self) -> LinkRole {
        self.config.role
    }

    pub fn handler_state(&self) -> HandlerState {
        self.handler_state
    }

    pub fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    pub fn peer(&self, peer_id: &PeerId) -> Option<&Peer> {
        self.peers.get(peer_id)
    }

    pub(crate) fn peer_mut(&mut self, peer_id: &PeerId) -> Option<&mut Peer> {
        self.peers.get_mut(peer_id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Recorded transitions, oldest first
    pub fn audit_trail(&self) -> impl Iterator<Item = &AuditEntry> + '_ {
        self.audit_trail.iter()
    }

    pub fn snapshot(&self, peer_id: &PeerId, cursors: &dyn CursorLookup) -> Option<PeerSnapshot> {
        self.peers
            .get(peer_id)
            .map(|peer| peer.snapshot(self.role(), cursors.cursor_for(peer_id)))
    }

    /// Snapshots of every registry peer, ordered by device id
    pub fn snapshots(&self, cursors: &dyn CursorLookup) -> Vec<PeerSnapshot> {
        let mut snapshots: Vec<_> = self
            .peers
            .values()
            .map(|peer| peer.snapshot(self.role(), cursors.cursor_for(&peer.device_id)))
            .collect();
        snapshots.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        snapshots
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    /// Get or create a peer in `NotConnected`
    pub(crate) fn upsert_peer(&mut self, peer_id: &PeerId) -> &mut Peer {
        let now = self.now();
        let backoff = self.config.backoff.clone();
        self.peers.entry(peer_id.clone()).or_insert_with(|| {
            debug!("Registered peer {}", peer_id);
            Peer::new(peer_id.clone(), backoff, now)
        })
    }

    pub(crate) fn new_peer(&self, peer_id: &PeerId) -> Peer {
        Peer::new(peer_id.clone(), self.config.backoff.clone(), self.now())
    }

    pub(crate) fn insert_peer(&mut self, peer: Peer) {
        self.peers.insert(peer.device_id.clone(), peer);
    }

    pub(crate) fn remove_peer(&mut self, peer_id: &PeerId) -> Option<Peer> {
        self.peers.remove(peer_id)
    }

    /// End every session and forget every peer
    pub(crate) fn clear_registry(&mut self, out: &mut LinkOutput) {
        for peer_id in self.peers.keys() {
            out.effects.push(Effect::EndSession {
                peer_id: peer_id.clone(),
            });
        }
        if !self.peers.is_empty() {
            info!("Cleared {} peer(s) from the registry", self.peers.len());
        }
        self.peers.clear();
    }

    pub(crate) fn set_handler_state(&mut self, state: HandlerState, out: &mut LinkOutput) {
        if self.handler_state != state {
            self.handler_state = state;
            out.app_events.push(AppEvent::HandlerStateChanged { state });
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Run one state machine step for a registry peer and record it
    pub(crate) fn apply(
        &mut self,
        peer_id: &PeerId,
        event: ConnectionEvent,
    ) -> Option<StateTransition> {
        let now = self.now();
        let peer = self.peers.get_mut(peer_id)?;

        match peer
            .state
            .transition(peer_id, event, peer.auto_reconnect_active, now)
        {
            Ok(transition) => {
                peer.state = transition.new_state;
                peer.last_change = now;
                trace!(
                    "Peer {}: {} -> {} on {}",
                    peer_id,
                    transition.audit_entry.from_state,
                    transition.new_state,
                    transition.audit_entry.event
                );
                self.record_audit(transition.audit_entry.clone());
                Some(transition)
            }
            Err(e) => {
                warn!("Rejected transition for peer {}: {}", peer_id, e);
                None
            }
        }
    }

    fn record_audit(&mut self, entry: AuditEntry) {
        self.audit_trail.push_back(entry);
        while self.audit_trail.len() > self.config.max_audit_entries {
            self.audit_trail.pop_front();
        }
    }

    /// Notify the consumer of a peer's current state; drops it if removed
    pub(crate) fn publish(
        &mut self,
        peer_id: &PeerId,
        reason: Option<String>,
        cursors: &dyn CursorLookup,
        out: &mut LinkOutput,
    ) {
        let Some(peer) = self.peers.get(peer_id) else {
            return;
        };
        let removed = peer.state.is_terminal();
        out.app_events.push(AppEvent::PeerStateChanged {
            peer: peer.snapshot(self.role(), cursors.cursor_for(peer_id)),
            reason,
        });
        if removed {
            self.peers.remove(peer_id);
            debug!("Removed peer {} from the registry", peer_id);
        }
    }

    /// Queue a session message; encoding failures are logged and dropped
    pub(crate) fn send_message(&self, peer_id: &PeerId, message: &WireMessage, out: &mut LinkOutput) {
        match message.encode() {
            Ok(data) => out.effects.push(Effect::SendData {
                peer_id: peer_id.clone(),
                data,
            }),
            Err(e) => warn!(
                "Failed to encode '{}' for {}: {}",
                message.descriptor(),
                peer_id,
                e
            ),
        }
    }

    // ------------------------------------------------------------------------
    // Shared Handlers
    // ------------------------------------------------------------------------

    /// Discovery lost sight of a peer
    pub fn on_peer_lost(
        &mut self,
        peer_id: &PeerId,
        cursors: &dyn CursorLookup,
        out: &mut LinkOutput,
    ) {
        let Some(peer) = self.peers.get(peer_id) else {
            trace!("Lost unknown peer {}", peer_id);
            return;
        };

        if peer.auto_reconnect_active {
            if peer.state == crate::protocol::ConnectionState::Reconnecting {
                return;
            }
            if self.apply(peer_id, ConnectionEvent::PeerLost).is_some() {
                self.publish(peer_id, None, cursors, out);
            }
        } else {
            self.apply(peer_id, ConnectionEvent::PeerLost);
            self.peers.remove(peer_id);
            info!("Peer {} lost", peer_id);
            out.app_events.push(AppEvent::PeerLost {
                peer_id: peer_id.clone(),
            });
        }
    }

    /// Transport reported a session state change
    ///
    /// Returns the applied transition so the role variant can add its own effects.
    pub fn on_session_state(
        &mut self,
        peer_id: &PeerId,
        state: SessionState,
        cursors: &dyn CursorLookup,
        out: &mut LinkOutput,
    ) -> Option<StateTransition> {
        if !self.peers.contains_key(peer_id) {
            if state != SessionState::NotConnected {
                warn!("Session {} from unregistered device {}", state, peer_id);
                self.send_message(peer_id, &WireMessage::disconnect(UNEXPECTED_CONNECTION), out);
                out.effects.push(Effect::EndSession {
                    peer_id: peer_id.clone(),
                });
            }
            return None;
        }

        let event = match state {
            SessionState::Connecting => ConnectionEvent::SessionConnecting,
            SessionState::Connected => ConnectionEvent::SessionConnected,
            SessionState::NotConnected => ConnectionEvent::SessionDropped,
        };

        if state == SessionState::Connected {
            if let Some(peer) = self.peers.get_mut(peer_id) {
                peer.auto_reconnect_active = peer.auto_reconnect_requested;
                peer.backoff.reset();
                peer.retry_scheduled = false;
                peer.reason = None;
            }
        }

        let transition = self.apply(peer_id, event)?;

        if state == SessionState::Connected {
            let cursor = cursors.cursor_for(peer_id);
            info!(
                "Peer {} connected, resuming after '{}' #{}",
                peer_id, cursor.last_record_id, cursor.last_sequence
            );
            self.send_message(peer_id, &WireMessage::ResumeRequest(cursor), out);
        }

        self.publish(peer_id, None, cursors, out);
        Some(transition)
    }

    /// The local operator closes a session
    pub fn local_disconnect(
        &mut self,
        peer_id: &PeerId,
        reason: String,
        reconnect: bool,
        cursors: &dyn CursorLookup,
        out: &mut LinkOutput,
    ) -> Result<()> {
        let peer = self
            .peers
            .get_mut(peer_id)
            .ok_or_else(|| PeerlogError::peer_not_found(peer_id))?;
        peer.auto_reconnect_requested = reconnect;
        peer.auto_reconnect_active = reconnect;
        peer.reason = Some(reason.clone());

        self.apply(peer_id, ConnectionEvent::LocalDisconnect);
        self.send_message(peer_id, &WireMessage::disconnect(reason.clone()), out);
        out.effects.push(Effect::EndSession {
            peer_id: peer_id.clone(),
        });
        self.publish(peer_id, Some(reason), cursors, out);
        Ok(())
    }

    /// The remote side sent a `disconnect` message
    pub fn remote_disconnect(
        &mut self,
        peer_id: &PeerId,
        reason: String,
        cursors: &dyn CursorLookup,
        out: &mut LinkOutput,
    ) {
        let Some(peer) = self.peers.get_mut(peer_id) else {
            debug!("Disconnect from unregistered device {}: {}", peer_id, reason);
            return;
        };
        peer.auto_reconnect_requested = false;
        peer.auto_reconnect_active = false;
        peer.reason = Some(reason.clone());

        out.effects.push(Effect::EndSession {
            peer_id: peer_id.clone(),
        });
        self.apply(peer_id, ConnectionEvent::RemoteDisconnect);
        info!("Peer {} disconnected: {}", peer_id, reason);
        self.publish(peer_id, Some(reason), cursors, out);
    }
}
