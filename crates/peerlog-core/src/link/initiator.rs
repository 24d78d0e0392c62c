//! Initiator role
//!
//! Browses for advertising peers and invites them. Reconnection is driven by
//! discovery: a reconnect-flagged peer is re-invited when it is seen again, within
//! the limits of its invite backoff.

use super::core::{LinkCore, LinkOutput};
use super::peer::PeerAttributes;
use crate::channel::{AppEvent, Command, Effect, HandlerState, SessionState};
use crate::errors::{PeerlogError, Result};
use crate::protocol::{ConnectionEvent, ConnectionState, CursorLookup, InviteDecision};
use crate::types::PeerId;
use std::collections::BTreeMap;
use tracing::{debug, info, trace, warn};

/// Reason attached to peers whose pending invitation was abandoned by a stop
const STOPPED: &str = "Collector stopped";
/// Reason attached to peers whose session was ended because discovery saw them again
const REDISCOVERED: &str = "Rediscovered";

#[derive(Debug)]
pub struct Initiator {
    core: LinkCore,
}

impl Initiator {
    pub fn new(core: LinkCore) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &LinkCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    fn start_browsing(&self, out: &mut LinkOutput) {
        out.effects.push(Effect::StartBrowsing {
            service_id: self.core.config().service_id.clone(),
        });
    }

    pub fn start(&mut self, out: &mut LinkOutput) {
        self.start_browsing(out);
        self.core.set_handler_state(HandlerState::Browsing, out);
    }

    pub fn stop(&mut self, cursors: &dyn CursorLookup, out: &mut LinkOutput) {
        let pending: Vec<PeerId> = self
            .core
            .snapshots(cursors)
            .into_iter()
            .filter(|peer| peer.state == ConnectionState::Connecting)
            .map(|peer| peer.device_id)
            .collect();
        for peer_id in pending {
            self.core.apply(&peer_id, ConnectionEvent::LocalDisconnect);
            self.core
                .publish(&peer_id, Some(STOPPED.to_string()), cursors, out);
        }

        self.core.clear_registry(out);
        out.effects.push(Effect::StopBrowsing);
        self.core.set_handler_state(HandlerState::NotStarted, out);
    }

    /// Discovery sees a peer advertising the service
    pub fn on_peer_found(
        &mut self,
        peer_id: &PeerId,
        discovery_info: Option<&BTreeMap<String, String>>,
        cursors: &dyn CursorLookup,
        out: &mut LinkOutput,
    ) {
        if self.core.config().local_device.as_ref() == Some(peer_id) {
            trace!("Ignoring our own advertisement");
            return;
        }

        // Seen again while a session is up or pending: that session is stale
        if self
            .core
            .peer(peer_id)
            .is_some_and(|peer| peer.state.has_session())
        {
            info!("Peer {} re-advertised, ending stale session", peer_id);
            out.effects.push(Effect::EndSession {
                peer_id: peer_id.clone(),
            });
            if self
                .core
                .apply(peer_id, ConnectionEvent::Rediscovered)
                .is_some()
            {
                self.core
                    .publish(peer_id, Some(REDISCOVERED.to_string()), cursors, out);
            }
        }

        let peer = self.core.upsert_peer(peer_id);
        if let Some(info) = discovery_info {
            peer.attributes.merge(PeerAttributes::from_context(info));
        }

        if peer.auto_reconnect_active {
            debug!("Reconnecting to rediscovered peer {}", peer_id);
            self.invite(peer_id, cursors, out);
        } else if let Some(peer) = self.core.snapshot(peer_id, cursors) {
            out.app_events.push(AppEvent::PeerFound { peer });
        }
    }

    /// Consumer asks to open a session with a discovered peer
    pub fn connect(
        &mut self,
        peer_id: &PeerId,
        attributes: PeerAttributes,
        context: BTreeMap<String, String>,
        reconnect: bool,
        cursors: &dyn CursorLookup,
        out: &mut LinkOutput,
    ) -> Result<()> {
        let peer = self
            .core
            .peer_mut(peer_id)
            .ok_or_else(|| PeerlogError::peer_not_found(peer_id))?;
        peer.attributes.merge(attributes);
        peer.invite_context = context;
        peer.auto_reconnect_requested = reconnect;
        peer.backoff.reset();

        self.invite(peer_id, cursors, out);
        Ok(())
    }

    /// A deferred invitation came due
    pub fn retry_invitation(
        &mut self,
        peer_id: &PeerId,
        cursors: &dyn CursorLookup,
        out: &mut LinkOutput,
    ) {
        let Some(peer) = self.core.peer_mut(peer_id) else {
            trace!("Dropping retry for departed peer {}", peer_id);
            return;
        };
        peer.retry_scheduled = false;

        if peer.auto_reconnect_active || peer.auto_reconnect_requested {
            self.invite(peer_id, cursors, out);
        }
    }

    /// Issue an invitation subject to the peer's backoff
    fn invite(&mut self, peer_id: &PeerId, cursors: &dyn CursorLookup, out: &mut LinkOutput) {
        let now = self.core.now();
        let timeout = self.core.config().invite_timeout;
        let Some(peer) = self.core.peer_mut(peer_id) else {
            warn!("{}", PeerlogError::peer_not_found(peer_id));
            return;
        };

        if peer.state.has_session() {
            debug!("Session with {} already in flight", peer_id);
            return;
        }

        match peer.backoff.check(now) {
            InviteDecision::Proceed => {
                let context = peer.attributes.to_context(&peer.invite_context);
                match serde_json::to_vec(&context) {
                    Ok(context) => {
                        info!(
                            "Inviting {} (attempt {})",
                            peer_id,
                            peer.backoff.attempt_count()
                        );
                        out.effects.push(Effect::InviteSession {
                            peer_id: peer_id.clone(),
                            context,
                            timeout,
                        });
                    }
                    Err(e) => warn!("Failed to encode invitation context for {}: {}", peer_id, e),
                }
            }
            InviteDecision::Defer(delay) => {
                if !peer.retry_scheduled {
                    peer.retry_scheduled = true;
                    debug!("Deferring invitation to {} by {:?}", peer_id, delay);
                    out.effects.push(Effect::ScheduleRetry {
                        delay,
                        command: Command::RetryInvitation {
                            peer_id: peer_id.clone(),
                        },
                    });
                }
            }
            InviteDecision::Exhausted => {
                if peer.state == ConnectionState::Reconnecting {
                    return;
                }
                warn!("Invitation budget for {} exhausted", peer_id);
                if self
                    .core
                    .apply(peer_id, ConnectionEvent::InviteUnavailable)
                    .is_some()
                {
                    self.start_browsing(out);
                    self.core.publish(peer_id, None, cursors, out);
                }
            }
        }
    }

    /// Transport reported a session state change
    pub fn on_session_state(
        &mut self,
        peer_id: &PeerId,
        state: SessionState,
        cursors: &dyn CursorLookup,
        out: &mut LinkOutput,
    ) {
        let Some(transition) = self.core.on_session_state(peer_id, state, cursors, out) else {
            return;
        };

        match state {
            SessionState::Connected => out.effects.push(Effect::StopBrowsing),
            SessionState::NotConnected => self.start_browsing(out),
            SessionState::Connecting => {}
        }

        if transition.hard_reset {
            warn!("Reconnection to {} failed, restarting discovery", peer_id);
            out.effects.push(Effect::RestartDiscovery);
        }
    }
}
