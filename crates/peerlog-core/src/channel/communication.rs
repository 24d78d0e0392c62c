//! CSP Channel Communication Protocol Types
//!
//! This module defines the typed communication protocol.
//! All inter-task communication flows through these channel message types.

use crate::filter::{FilterCriteria, ViewChange};
use crate::link::{PeerAttributes, PeerSnapshot};
use crate::store::{ExportedRecord, LogRecord, StoreStats};
use crate::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Command: Consumer → Collector
// ----------------------------------------------------------------------------

/// Commands sent from the consumer (UI, CLI, tests) to the collector task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Start advertising or browsing, depending on the link role
    StartCollecting,
    /// Stop discovery, end all sessions and clear the registry
    StopCollecting,
    /// Invite a discovered peer (initiator role only)
    ConnectToPeer {
        peer_id: PeerId,
        attributes: PeerAttributes,
        /// Extra invitation context merged with the attributes
        context: BTreeMap<String, String>,
        reconnect: bool,
    },
    /// Close the session with a peer, telling it why
    DisconnectPeer {
        peer_id: PeerId,
        reason: String,
        reconnect: bool,
    },
    /// Re-check a deferred invitation
    RetryInvitation { peer_id: PeerId },
    /// Replace the live view filter
    SetFilter { criteria: FilterCriteria },
    /// Drop all records, keeping resume cursors
    ClearLogs,
    /// Ingest records from an export file
    ImportRecords {
        records: Vec<ExportedRecord>,
        /// Reset the store first
        replace: bool,
    },
    /// Request the current store contents in export layout
    ExportRecords,
    /// Request a status report
    RequestSnapshot,
    /// Shutdown the collector gracefully
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Transport → Collector
// ----------------------------------------------------------------------------

/// Events sent from transport tasks to the collector task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Discovery sees a peer advertising the service
    PeerFound {
        peer_id: PeerId,
        discovery_info: Option<BTreeMap<String, String>>,
    },
    /// Discovery no longer sees a peer
    PeerLost { peer_id: PeerId },
    /// A session changed state
    SessionStateChanged { peer_id: PeerId, state: SessionState },
    /// Bytes arrived on a session
    DataReceived { peer_id: PeerId, data: Vec<u8> },
    /// A peer asks to open a session; answered by `Effect::RespondToInvitation`
    InboundInvitation {
        peer_id: PeerId,
        context: Option<Vec<u8>>,
    },
    /// Transport-level fault (advertise/browse/send failure)
    TransportError { error: String },
}

// ----------------------------------------------------------------------------
// Effect: Collector → Transport (External Side Effects Only)
// ----------------------------------------------------------------------------

/// Effects sent from the collector task to transport tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Effect {
    StartAdvertising { service_id: String },
    StopAdvertising,
    StartBrowsing { service_id: String },
    StopBrowsing,
    /// Tear down and restart discovery after a failed reconnection
    RestartDiscovery,
    /// Fire-and-forget send on a peer's session
    SendData { peer_id: PeerId, data: Vec<u8> },
    /// Invite a peer into a session
    InviteSession {
        peer_id: PeerId,
        context: Vec<u8>,
        timeout: Duration,
    },
    /// Force-end any session with the peer
    EndSession { peer_id: PeerId },
    /// Answer an inbound invitation
    RespondToInvitation { peer_id: PeerId, accept: bool },
    /// Re-post a command to the collector after a delay (handled by the runtime)
    ScheduleRetry { delay: Duration, command: Command },
}

// ----------------------------------------------------------------------------
// AppEvent: Collector → Consumer (State Changes Only)
// ----------------------------------------------------------------------------

/// Application events sent from the collector task to the consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// A peer is available to connect to
    PeerFound { peer: PeerSnapshot },
    /// A peer disappeared and was removed
    PeerLost { peer_id: PeerId },
    /// A peer changed connection state
    PeerStateChanged {
        peer: PeerSnapshot,
        reason: Option<String>,
    },
    /// Records newly stored from a peer
    RecordsIngested {
        peer_id: PeerId,
        records: Vec<Arc<LogRecord>>,
    },
    /// Incremental or full changes to the filtered view
    ViewChanged { changes: Vec<ViewChange> },
    /// Discovery activity changed
    HandlerStateChanged { state: HandlerState },
    /// Non-fatal transport or command fault
    TransportFault { error: String },
    /// Store contents in export layout, in response to `ExportRecords`
    ExportReady { records: Vec<ExportedRecord> },
    /// Status report in response to `RequestSnapshot`
    StatusReport {
        peers: Vec<PeerSnapshot>,
        store: StoreStats,
        stored_records: usize,
        visible_records: usize,
        uptime_seconds: u64,
    },
}

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Session state as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    NotConnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::NotConnected => write!(f, "NotConnected"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Coarse discovery status of the collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerState {
    #[default]
    NotStarted,
    /// Acceptor is advertising
    Broadcasting,
    /// Initiator is browsing
    Browsing,
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerState::NotStarted => write!(f, "Not started"),
            HandlerState::Broadcasting => write!(f, "Broadcasting"),
            HandlerState::Browsing => write!(f, "Browsing"),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
