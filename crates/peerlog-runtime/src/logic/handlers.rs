//! Collector Command and Event Handlers
//!
//! Each handler mutates the collector state and returns the effects and app events
//! it produced, in emission order. Handlers never touch channels.

use super::state::CollectorState;
use peerlog_core::{
    store::ExportedRecord, AppEvent, Effect, FilterCriteria, Insertion, LinkOutput,
    PeerAttributes, PeerId, PeerlogResult, SessionState, ViewChange, WireMessage,
};
use std::collections::BTreeMap;
use tracing::{debug, info, trace, warn};

/// Effects and app events produced by one handler
pub type HandlerOutput = (Vec<Effect>, Vec<AppEvent>);

/// Command and event handlers for the collector task
pub struct CollectorHandlers;

impl CollectorHandlers {
    // ------------------------------------------------------------------------
    // Consumer Commands
    // ------------------------------------------------------------------------

    pub fn handle_start(state: &mut CollectorState) -> PeerlogResult<HandlerOutput> {
        info!("Starting collection as {}", state.link.role());
        Ok(state.link.start().into_parts())
    }

    pub fn handle_stop(state: &mut CollectorState) -> PeerlogResult<HandlerOutput> {
        info!("Stopping collection");
        Ok(state.link.stop(&state.store).into_parts())
    }

    pub fn handle_connect(
        state: &mut CollectorState,
        peer_id: PeerId,
        attributes: PeerAttributes,
        context: BTreeMap<String, String>,
        reconnect: bool,
    ) -> PeerlogResult<HandlerOutput> {
        let out = state
            .link
            .connect(&peer_id, attributes, context, reconnect, &state.store)?;
        Ok(out.into_parts())
    }

    pub fn handle_disconnect(
        state: &mut CollectorState,
        peer_id: PeerId,
        reason: String,
        reconnect: bool,
    ) -> PeerlogResult<HandlerOutput> {
        let out = state
            .link
            .disconnect(&peer_id, reason, reconnect, &state.store)?;
        Ok(out.into_parts())
    }

    pub fn handle_retry_invitation(
        state: &mut CollectorState,
        peer_id: PeerId,
    ) -> PeerlogResult<HandlerOutput> {
        Ok(state
            .link
            .retry_invitation(&peer_id, &state.store)
            .into_parts())
    }

    pub fn handle_set_filter(
        state: &mut CollectorState,
        criteria: FilterCriteria,
    ) -> PeerlogResult<HandlerOutput> {
        debug!("Applying filter {:?}", criteria);
        let change = state.view.on_filter_changed(criteria, &state.store);
        Ok(view_changed(vec![change]))
    }

    pub fn handle_clear_logs(state: &mut CollectorState) -> PeerlogResult<HandlerOutput> {
        info!("Clearing {} record(s)", state.store.len());
        state.store.clear();
        let change = state.view.rebuild(&state.store);
        Ok(view_changed(vec![change]))
    }

    pub fn handle_import(
        state: &mut CollectorState,
        records: Vec<ExportedRecord>,
        replace: bool,
    ) -> PeerlogResult<HandlerOutput> {
        let total = records.len();
        if replace {
            state.store.reset();
            let insertions = state.store.import(records);
            info!("Replaced store with {} of {} record(s)", insertions.len(), total);
            let change = state.view.rebuild(&state.store);
            return Ok(view_changed(vec![change]));
        }

        let insertions = state.store.import(records);
        info!("Merged {} of {} imported record(s)", insertions.len(), total);
        let changes = state.view.on_inserted(&insertions);
        Ok(view_changed(changes))
    }

    pub fn handle_export(state: &mut CollectorState) -> PeerlogResult<HandlerOutput> {
        let records = state.store.export();
        debug!("Exporting {} record(s)", records.len());
        Ok((Vec::new(), vec![AppEvent::ExportReady { records }]))
    }

    pub fn handle_snapshot(state: &mut CollectorState) -> PeerlogResult<HandlerOutput> {
        let report = AppEvent::StatusReport {
            peers: state.link.snapshots(&state.store),
            store: state.store.stats().clone(),
            stored_records: state.store.len(),
            visible_records: state.view.len(),
            uptime_seconds: state.uptime_seconds(),
        };
        Ok((Vec::new(), vec![report]))
    }

    // ------------------------------------------------------------------------
    // Transport Events
    // ------------------------------------------------------------------------

    pub fn handle_peer_found(
        state: &mut CollectorState,
        peer_id: PeerId,
        discovery_info: Option<BTreeMap<String, String>>,
    ) -> PeerlogResult<HandlerOutput> {
        Ok(state
            .link
            .on_peer_found(&peer_id, discovery_info.as_ref(), &state.store)
            .into_parts())
    }

    pub fn handle_peer_lost(
        state: &mut CollectorState,
        peer_id: PeerId,
    ) -> PeerlogResult<HandlerOutput> {
        Ok(state.link.on_peer_lost(&peer_id, &state.store).into_parts())
    }

    pub fn handle_session_state(
        state: &mut CollectorState,
        peer_id: PeerId,
        session_state: SessionState,
    ) -> PeerlogResult<HandlerOutput> {
        Ok(state
            .link
            .on_session_state(&peer_id, session_state, &state.store)
            .into_parts())
    }

    pub fn handle_inbound_invitation(
        state: &mut CollectorState,
        peer_id: PeerId,
        context: Option<Vec<u8>>,
    ) -> PeerlogResult<HandlerOutput> {
        let policy = state.admission.clone();
        Ok(state
            .link
            .on_inbound_invitation(&peer_id, context.as_deref(), policy.as_ref(), &state.store)
            .into_parts())
    }

    /// Bytes arrived on a session
    ///
    /// Only registry peers are heard. Undecodable payloads are dropped whole; every
    /// descriptor in a decodable one is handled independently.
    pub fn handle_data_received(
        state: &mut CollectorState,
        peer_id: PeerId,
        data: Vec<u8>,
    ) -> PeerlogResult<HandlerOutput> {
        if state.link.core().peer(&peer_id).is_none() {
            trace!("Dropping {} byte(s) from unregistered device {}", data.len(), peer_id);
            return Ok((Vec::new(), Vec::new()));
        }

        let messages = match WireMessage::decode(&data) {
            Ok(messages) => messages,
            Err(e) => {
                state.stats.undecodable_messages += 1;
                warn!("Dropping undecodable message from {}: {}", peer_id, e);
                return Ok((Vec::new(), Vec::new()));
            }
        };

        let mut out = LinkOutput::new();
        for message in messages {
            match message {
                WireMessage::LogBatch {
                    descriptor,
                    entries,
                } => {
                    state.stats.batches_received += 1;
                    trace!(
                        "Batch '{}' of {} entr(ies) from {}",
                        descriptor,
                        entries.len(),
                        peer_id
                    );
                    let insertions = state.store.ingest(&peer_id, entries);
                    ingested(state, &peer_id, insertions, &mut out);
                }
                WireMessage::Disconnect { reason } => {
                    let disconnect = state
                        .link
                        .on_remote_disconnect(&peer_id, reason, &state.store);
                    out.effects.extend(disconnect.effects);
                    out.app_events.extend(disconnect.app_events);
                }
                WireMessage::ResumeRequest(cursor) => {
                    debug!(
                        "Ignoring resume request from {} after '{}' #{}",
                        peer_id, cursor.last_record_id, cursor.last_sequence
                    );
                }
            }
        }
        Ok(out.into_parts())
    }

    pub fn handle_transport_error(error: String) -> PeerlogResult<HandlerOutput> {
        warn!("Transport fault: {}", error);
        Ok((Vec::new(), vec![AppEvent::TransportFault { error }]))
    }
}

fn view_changed(changes: Vec<ViewChange>) -> HandlerOutput {
    let app_events = if changes.is_empty() {
        Vec::new()
    } else {
        vec![AppEvent::ViewChanged { changes }]
    };
    (Vec::new(), app_events)
}

/// Report stored records and the view changes they caused
fn ingested(
    state: &mut CollectorState,
    peer_id: &PeerId,
    insertions: Vec<Insertion>,
    out: &mut LinkOutput,
) {
    if insertions.is_empty() {
        return;
    }
    let changes = state.view.on_inserted(&insertions);
    out.app_events.push(AppEvent::RecordsIngested {
        peer_id: peer_id.clone(),
        records: insertions
            .into_iter()
            .map(|insertion| insertion.record)
            .collect(),
    });
    out.app_events.extend(view_changed(changes).1);
}
