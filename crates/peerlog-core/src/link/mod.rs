//! Peer Link Module
//!
//! Peer registry and connection lifecycle, in two role variants over one shared core:
//! - `core`: registry, transitions and handlers common to both roles
//! - `acceptor`: advertises and answers invitations, with an admission policy
//! - `initiator`: browses, invites, and reconnects on rediscovery
//! - `peer`: registry peers, attributes and snapshots

pub mod acceptor;
pub mod core;
pub mod initiator;
pub mod peer;

pub use self::acceptor::Acceptor;
pub use self::core::{LinkCore, LinkOutput, UNEXPECTED_CONNECTION};
pub use self::initiator::Initiator;
pub use self::peer::{parse_context, Peer, PeerAttributes, PeerSnapshot};

use crate::channel::{Effect, SessionState};
use crate::config::LinkConfig;
use crate::errors::{PeerlogError, Result};
use crate::protocol::{AuditEntry, CursorLookup};
use crate::types::{PeerId, SystemTimeSource, TimeSource};
use ::core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

// ----------------------------------------------------------------------------
// Link Role
// ----------------------------------------------------------------------------

/// Which side of the session handshake the collector plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    /// Advertises and accepts invitations (server)
    Acceptor,
    /// Browses and sends invitations (client)
    Initiator,
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRole::Acceptor => write!(f, "acceptor"),
            LinkRole::Initiator => write!(f, "initiator"),
        }
    }
}

// ----------------------------------------------------------------------------
// Admission Policy
// ----------------------------------------------------------------------------

/// Decides whether an inbound invitation is accepted
pub trait AdmissionPolicy: Send + Sync {
    fn should_accept(&self, peer: &PeerSnapshot, context: &BTreeMap<String, String>) -> bool;
}

impl<F> AdmissionPolicy for F
where
    F: Fn(&PeerSnapshot, &BTreeMap<String, String>) -> bool + Send + Sync,
{
    fn should_accept(&self, peer: &PeerSnapshot, context: &BTreeMap<String, String>) -> bool {
        self(peer, context)
    }
}

/// Accepts every invitation
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AdmissionPolicy for AcceptAll {
    fn should_accept(&self, _peer: &PeerSnapshot, _context: &BTreeMap<String, String>) -> bool {
        true
    }
}

// ----------------------------------------------------------------------------
// Peer Link
// ----------------------------------------------------------------------------

/// The peer link in its configured role
#[derive(Debug)]
pub enum PeerLink {
    Acceptor(Acceptor),
    Initiator(Initiator),
}

impl PeerLink {
    /// Create a link for `config.role` on the wall clock
    pub fn new(config: LinkConfig) -> Self {
        Self::with_time_source(config, Box::new(SystemTimeSource))
    }

    pub fn with_time_source(
        config: LinkConfig,
        time_source: Box<dyn TimeSource + Send + Sync>,
    ) -> Self {
        let role = config.role;
        let core = LinkCore::new(config, time_source);
        match role {
            LinkRole::Acceptor => PeerLink::Acceptor(Acceptor::new(core)),
            LinkRole::Initiator => PeerLink::Initiator(Initiator::new(core)),
        }
    }

    pub fn role(&self) -> LinkRole {
        self.core().role()
    }

    pub fn core(&self) -> &LinkCore {
        match self {
            PeerLink::Acceptor(acceptor) => acceptor.core(),
            PeerLink::Initiator(initiator) => initiator.core(),
        }
    }

    fn core_mut(&mut self) -> &mut LinkCore {
        match self {
            PeerLink::Acceptor(acceptor) => acceptor.core_mut(),
            PeerLink::Initiator(initiator) => initiator.core_mut(),
        }
    }

    pub fn snapshots(&self, cursors: &dyn CursorLookup) -> Vec<PeerSnapshot> {
        self.core().snapshots(cursors)
    }

    pub fn audit_trail(&self) -> Vec<AuditEntry> {
        self.core().audit_trail().cloned().collect()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub fn start(&mut self) -> LinkOutput {
        let mut out = LinkOutput::new();
        match self {
            PeerLink::Acceptor(acceptor) => acceptor.start(&mut out),
            PeerLink::Initiator(initiator) => initiator.start(&mut out),
        }
        out
    }

    /// Stop discovery, end all sessions and empty the registry
    pub fn stop(&mut self, cursors: &dyn CursorLookup) -> LinkOutput {
        let mut out = LinkOutput::new();
        match self {
            PeerLink::Acceptor(acceptor) => acceptor.stop(&mut out),
            PeerLink::Initiator(initiator) => initiator.stop(cursors, &mut out),
        }
        out
    }

    // ------------------------------------------------------------------------
    // Transport Events
    // ------------------------------------------------------------------------

    pub fn on_peer_found(
        &mut self,
        peer_id: &PeerId,
        discovery_info: Option<&BTreeMap<String, String>>,
        cursors: &dyn CursorLookup,
    ) -> LinkOutput {
        let mut out = LinkOutput::new();
        match self {
            PeerLink::Initiator(initiator) => {
                initiator.on_peer_found(peer_id, discovery_info, cursors, &mut out)
            }
            PeerLink::Acceptor(_) => trace!("Acceptor ignores discovery of {}", peer_id),
        }
        out
    }

    pub fn on_peer_lost(&mut self, peer_id: &PeerId, cursors: &dyn CursorLookup) -> LinkOutput {
        let mut out = LinkOutput::new();
        self.core_mut().on_peer_lost(peer_id, cursors, &mut out);
        out
    }

    pub fn on_session_state(
        &mut self,
        peer_id: &PeerId,
        state: SessionState,
        cursors: &dyn CursorLookup,
    ) -> LinkOutput {
        let mut out = LinkOutput::new();
        match self {
            PeerLink::Acceptor(acceptor) => {
                acceptor.on_session_state(peer_id, state, cursors, &mut out)
            }
            PeerLink::Initiator(initiator) => {
                initiator.on_session_state(peer_id, state, cursors, &mut out)
            }
        }
        out
    }

    /// Answer an inbound invitation; the initiator declines them all
    pub fn on_inbound_invitation(
        &mut self,
        peer_id: &PeerId,
        context: Option<&[u8]>,
        policy: &dyn AdmissionPolicy,
        cursors: &dyn CursorLookup,
    ) -> LinkOutput {
        let mut out = LinkOutput::new();
        match self {
            PeerLink::Acceptor(acceptor) => {
                acceptor.on_inbound_invitation(peer_id, context, policy, cursors, &mut out)
            }
            PeerLink::Initiator(_) => {
                trace!("Initiator declines invitation from {}", peer_id);
                out.effects.push(Effect::RespondToInvitation {
                    peer_id: peer_id.clone(),
                    accept: false,
                });
            }
        }
        out
    }

    pub fn on_remote_disconnect(
        &mut self,
        peer_id: &PeerId,
        reason: String,
        cursors: &dyn CursorLookup,
    ) -> LinkOutput {
        let mut out = LinkOutput::new();
        self.core_mut()
            .remote_disconnect(peer_id, reason, cursors, &mut out);
        out
    }

    // ------------------------------------------------------------------------
    // Consumer Commands
    // ------------------------------------------------------------------------

    pub fn connect(
        &mut self,
        peer_id: &PeerId,
        attributes: PeerAttributes,
        context: BTreeMap<String, String>,
        reconnect: bool,
        cursors: &dyn CursorLookup,
    ) -> Result<LinkOutput> {
        let mut out = LinkOutput::new();
        match self {
            PeerLink::Initiator(initiator) => {
                initiator.connect(peer_id, attributes, context, reconnect, cursors, &mut out)?
            }
            PeerLink::Acceptor(_) => {
                return Err(PeerlogError::unsupported_for_role(
                    LinkRole::Acceptor,
                    "connect",
                ))
            }
        }
        Ok(out)
    }

    pub fn retry_invitation(&mut self, peer_id: &PeerId, cursors: &dyn CursorLookup) -> LinkOutput {
        let mut out = LinkOutput::new();
        if let PeerLink::Initiator(initiator) = self {
            initiator.retry_invitation(peer_id, cursors, &mut out);
        }
        out
    }

    pub fn disconnect(
        &mut self,
        peer_id: &PeerId,
        reason: String,
        reconnect: bool,
        cursors: &dyn CursorLookup,
    ) -> Result<LinkOutput> {
        let mut out = LinkOutput::new();
        self.core_mut()
            .local_disconnect(peer_id, reason, reconnect, cursors, &mut out)?;
        Ok(out)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
