//! Acceptor role
//!
//! Advertises the service and answers inbound invitations. A device holds at most
//! one session: a new invitation from a known device force-ends the old session
//! rather than racing it.

use super::core::{LinkCore, LinkOutput};
use super::peer::{parse_context, PeerAttributes};
use super::AdmissionPolicy;
use crate::channel::{Effect, HandlerState, SessionState};
use crate::protocol::CursorLookup;
use crate::types::PeerId;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Acceptor {
    core: LinkCore,
}

impl Acceptor {
    pub fn new(core: LinkCore) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &LinkCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut LinkCore {
        &mut self.core
    }

    pub fn start(&mut self, out: &mut LinkOutput) {
        out.effects.push(Effect::StartAdvertising {
            service_id: self.core.config().service_id.clone(),
        });
        self.core.set_handler_state(HandlerState::Broadcasting, out);
    }

    pub fn stop(&mut self, out: &mut LinkOutput) {
        out.effects.push(Effect::StopAdvertising);
        self.core.clear_registry(out);
        self.core.set_handler_state(HandlerState::NotStarted, out);
    }

    /// A device asks to open a session
    pub fn on_inbound_invitation(
        &mut self,
        peer_id: &PeerId,
        context: Option<&[u8]>,
        policy: &dyn AdmissionPolicy,
        cursors: &dyn CursorLookup,
        out: &mut LinkOutput,
    ) {
        let context = match context.map(parse_context) {
            Some(Some(context)) => context,
            Some(None) => {
                debug!("Ignoring malformed invitation context from {}", peer_id);
                Default::default()
            }
            None => Default::default(),
        };

        let previous = self.core.remove_peer(peer_id);
        if let Some(previous) = &previous {
            if previous.state.has_session() {
                info!("New invitation from {}, ending its previous session", peer_id);
                out.effects.push(Effect::EndSession {
                    peer_id: peer_id.clone(),
                });
            }
        }

        let mut peer = self.core.new_peer(peer_id);
        peer.attributes = PeerAttributes::from_context(&context);
        peer.auto_reconnect_requested = previous.is_some_and(|p| p.auto_reconnect_requested);

        let snapshot = peer.snapshot(self.core.role(), cursors.cursor_for(peer_id));
        let accept = policy.should_accept(&snapshot, &context);
        out.effects.push(Effect::RespondToInvitation {
            peer_id: peer_id.clone(),
            accept,
        });

        if accept {
            self.core.insert_peer(peer);
        } else {
            warn!("Declined invitation from {}", peer_id);
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
        if transition.hard_reset {
            warn!("Reconnection from {} failed, restarting advertising", peer_id);
            out.effects.push(Effect::RestartDiscovery);
        }
    }
}
