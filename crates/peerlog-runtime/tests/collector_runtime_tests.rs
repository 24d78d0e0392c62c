//! Integration tests for the collector runtime
//!
//! A scripted in-process transport hands its event sender to the test and taps
//! every effect the collector emits, so each test plays the transport's side of
//! the conversation explicitly.

use peerlog_core::{
    store::ExportedRecord, AppEvent, AppEventReceiver, CollectorConfig, Command, Effect,
    EffectReceiver, Event, EventSender, FilterCriteria, HandlerState, LinkRole, PeerAttributes,
    PeerId, PeerSnapshot, PeerlogResult, SessionState, TransportTask, ViewChange,
};
use peerlog_runtime::CollectorRuntime;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

// ----------------------------------------------------------------------------
// Scripted Transport
// ----------------------------------------------------------------------------

struct ScriptedTransport {
    role: LinkRole,
    event_slot: Arc<Mutex<Option<EventSender>>>,
    effect_tap: mpsc::UnboundedSender<Effect>,
    effect_receiver: Option<EffectReceiver>,
    /// Time spent executing each effect
    pace: Duration,
    /// Effects lost to falling behind the broadcast buffer
    lagged: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl TransportTask for ScriptedTransport {
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> PeerlogResult<()> {
        *self.event_slot.lock().unwrap() = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> PeerlogResult<()> {
        let Some(mut effects) = self.effect_receiver.take() else {
            return Ok(());
        };
        loop {
            match effects.recv().await {
                Ok(effect) => {
                    if !self.pace.is_zero() {
                        tokio::time::sleep(self.pace).await;
                    }
                    if self.effect_tap.send(effect).is_err() {
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.lagged.fetch_add(missed as usize, Ordering::SeqCst);
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    fn role(&self) -> LinkRole {
        self.role
    }
}

/// A running collector plus the transport's side of its channels
struct Harness {
    runtime: CollectorRuntime,
    events: EventSender,
    effects: mpsc::UnboundedReceiver<Effect>,
    app_events: AppEventReceiver,
    lagged: Arc<AtomicUsize>,
}

impl Harness {
    async fn start(role: LinkRole) -> Self {
        Self::start_with(CollectorRuntime::new(CollectorConfig::testing().with_role(role))).await
    }

    async fn start_with(runtime: CollectorRuntime) -> Self {
        Self::start_paced(runtime, Duration::ZERO).await
    }

    /// Start with a transport that takes `pace` to execute each effect
    async fn start_paced(mut runtime: CollectorRuntime, pace: Duration) -> Self {
        let event_slot = Arc::new(Mutex::new(None));
        let (effect_tap, effects) = mpsc::unbounded_channel();
        let lagged = Arc::new(AtomicUsize::new(0));
        runtime
            .add_transport(ScriptedTransport {
                role: runtime.config().link.role,
                event_slot: event_slot.clone(),
                effect_tap,
                effect_receiver: None,
                pace,
                lagged: lagged.clone(),
            })
            .unwrap();
        runtime.start().await.unwrap();

        let events = event_slot.lock().unwrap().take().unwrap();
        let app_events = runtime.take_app_event_receiver().unwrap();
        Self {
            runtime,
            events,
            effects,
            app_events,
            lagged,
        }
    }

    /// Admit `peer_id` through an invitation and report it connected
    async fn admit(&mut self, peer_id: &PeerId) {
        self.event(Event::InboundInvitation {
            peer_id: peer_id.clone(),
            context: None,
        })
        .await;
        self.expect_effect(|e| {
            matches!(e, Effect::RespondToInvitation { peer_id: p, accept: true, .. } if p == peer_id)
        })
        .await;
        self.session(peer_id, SessionState::Connected).await;
    }

    /// Every effect the transport executes until its channel closes
    async fn drain_effects(&mut self) -> Vec<Effect> {
        let mut seen = Vec::new();
        timeout(WAIT, async {
            while let Some(effect) = self.effects.recv().await {
                seen.push(effect);
            }
        })
        .await
        .expect("transport should finish once the collector stops");
        seen
    }

    async fn command(&self, command: Command) {
        self.runtime.send(command).await.unwrap();
    }

    async fn event(&self, event: Event) {
        self.events.send(event).await.unwrap();
    }

    async fn session(&self, peer_id: &PeerId, state: SessionState) {
        self.event(Event::SessionStateChanged {
            peer_id: peer_id.clone(),
            state,
        })
        .await;
    }

    async fn data(&self, peer_id: &PeerId, payload: Value) {
        self.event(Event::DataReceived {
            peer_id: peer_id.clone(),
            data: serde_json::to_vec(&payload).unwrap(),
        })
        .await;
    }

    /// Wait for the first effect matching `pred`, skipping others
    async fn expect_effect<F: Fn(&Effect) -> bool>(&mut self, pred: F) -> Effect {
        timeout(WAIT, async {
            while let Some(effect) = self.effects.recv().await {
                if pred(&effect) {
                    return effect;
                }
            }
            panic!("effect tap closed");
        })
        .await
        .expect("expected effect within timeout")
    }

    /// Wait for the first app event matching `pred`, skipping others
    async fn expect_app_event<F: Fn(&AppEvent) -> bool>(&mut self, pred: F) -> AppEvent {
        timeout(WAIT, async {
            while let Some(event) = self.app_events.recv().await {
                if pred(&event) {
                    return event;
                }
            }
            panic!("app event channel closed");
        })
        .await
        .expect("expected app event within timeout")
    }

    async fn status(&mut self) -> (Vec<PeerSnapshot>, usize, usize) {
        self.command(Command::RequestSnapshot).await;
        match self
            .expect_app_event(|e| matches!(e, AppEvent::StatusReport { .. }))
            .await
        {
            AppEvent::StatusReport {
                peers,
                stored_records,
                visible_records,
                ..
            } => (peers, stored_records, visible_records),
            _ => unreachable!(),
        }
    }
}

fn record(id: &str, timestamp: &str, source: &str, message: &str) -> Value {
    json!({"recordId": id, "timestamp": timestamp, "source": source, "message": message})
}

fn sent_json(effect: &Effect) -> Option<Value> {
    match effect {
        Effect::SendData { data, .. } => serde_json::from_slice(data).ok(),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Acceptor Flow
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_acceptor_collects_a_batch_after_resume_request() {
    let mut harness = Harness::start(LinkRole::Acceptor).await;
    let ipad = PeerId::new("Ada's iPad");

    harness.command(Command::StartCollecting).await;
    harness
        .expect_effect(|e| matches!(e, Effect::StartAdvertising { .. }))
        .await;
    harness
        .expect_app_event(|e| {
            matches!(
                e,
                AppEvent::HandlerStateChanged {
                    state: HandlerState::Broadcasting
                }
            )
        })
        .await;

    harness
        .event(Event::InboundInvitation {
            peer_id: ipad.clone(),
            context: Some(br#"{"player": "Ada", "email": "ada@example.com"}"#.to_vec()),
        })
        .await;
    harness
        .expect_effect(|e| matches!(e, Effect::RespondToInvitation { accept: true, .. }))
        .await;

    harness.session(&ipad, SessionState::Connected).await;
    let resume = harness.expect_effect(|e| sent_json(e).is_some()).await;
    assert_eq!(
        sent_json(&resume),
        Some(json!({"resume-request": {"recordId": "", "sequence": 0}}))
    );

    harness
        .data(
            &ipad,
            json!({"logs": {
                "2": record("r2", "2024-05-01 10:00:02", "game", "second"),
                "1": record("r1", "2024-05-01 10:00:01", "game", "first"),
                "3": record("r3", "2024-05-01 10:00:03", "game", "third"),
            }}),
        )
        .await;

    match harness
        .expect_app_event(|e| matches!(e, AppEvent::RecordsIngested { .. }))
        .await
    {
        AppEvent::RecordsIngested { peer_id, records } => {
            assert_eq!(peer_id, ipad);
            let ids: Vec<_> = records.iter().map(|r| r.record_id.as_str()).collect();
            assert_eq!(ids, vec!["r1", "r2", "r3"]);
        }
        _ => unreachable!(),
    }
    match harness
        .expect_app_event(|e| matches!(e, AppEvent::ViewChanged { .. }))
        .await
    {
        AppEvent::ViewChanged { changes } => {
            let indices: Vec<_> = changes
                .iter()
                .map(|change| match change {
                    ViewChange::Inserted { index, .. } => *index,
                    other => panic!("unexpected change {:?}", other),
                })
                .collect();
            assert_eq!(indices, vec![0, 1, 2]);
        }
        _ => unreachable!(),
    }

    let (peers, stored, visible) = harness.status().await;
    assert_eq!((stored, visible), (3, 3));
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].attributes.display_name.as_deref(), Some("Ada"));
    assert_eq!(peers[0].cursor.last_record_id, "r3");

    harness.runtime.stop().await.unwrap();
}

#[tokio::test]
async fn test_remote_disconnect_ends_session_and_reports_reason() {
    let mut harness = Harness::start(LinkRole::Acceptor).await;
    let ipad = PeerId::new("ipad");

    harness
        .event(Event::InboundInvitation {
            peer_id: ipad.clone(),
            context: None,
        })
        .await;
    harness.session(&ipad, SessionState::Connected).await;
    harness
        .data(&ipad, json!({"disconnect": {"reason": "Game finished"}}))
        .await;

    harness
        .expect_effect(|e| matches!(e, Effect::EndSession { .. }))
        .await;
    harness
        .expect_app_event(|e| {
            matches!(e, AppEvent::PeerStateChanged { reason: Some(reason), .. } if reason == "Game finished")
        })
        .await;
}

#[tokio::test]
async fn test_unregistered_and_garbage_data_is_ignored() {
    let mut harness = Harness::start(LinkRole::Acceptor).await;
    let ipad = PeerId::new("ipad");

    harness
        .data(
            &PeerId::new("stranger"),
            json!({"logs": {"1": record("r1", "2024-05-01 10:00:01", "game", "x")}}),
        )
        .await;

    harness
        .event(Event::InboundInvitation {
            peer_id: ipad.clone(),
            context: None,
        })
        .await;
    harness.session(&ipad, SessionState::Connected).await;
    harness
        .event(Event::DataReceived {
            peer_id: ipad.clone(),
            data: b"\x00not json".to_vec(),
        })
        .await;

    let (_, stored, _) = harness.status().await;
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn test_admission_policy_declines_invitation() {
    let runtime = CollectorRuntime::new(CollectorConfig::testing().with_role(LinkRole::Acceptor))
        .with_admission_policy(|peer: &PeerSnapshot, _: &BTreeMap<String, String>| {
            peer.attributes.player_email.is_some()
        });
    let mut harness = Harness::start_with(runtime).await;

    harness
        .event(Event::InboundInvitation {
            peer_id: PeerId::new("anonymous"),
            context: None,
        })
        .await;
    harness
        .expect_effect(|e| matches!(e, Effect::RespondToInvitation { accept: false, .. }))
        .await;

    let (peers, _, _) = harness.status().await;
    assert!(peers.is_empty());
}

// ----------------------------------------------------------------------------
// Initiator Flow
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_initiator_reconnects_on_rediscovery_with_scheduled_retry() {
    let mut harness = Harness::start(LinkRole::Initiator).await;
    let ipad = PeerId::new("ipad");

    harness.command(Command::StartCollecting).await;
    harness
        .expect_effect(|e| matches!(e, Effect::StartBrowsing { .. }))
        .await;

    harness
        .event(Event::PeerFound {
            peer_id: ipad.clone(),
            discovery_info: None,
        })
        .await;
    harness
        .expect_app_event(|e| matches!(e, AppEvent::PeerFound { .. }))
        .await;

    harness
        .command(Command::ConnectToPeer {
            peer_id: ipad.clone(),
            attributes: PeerAttributes::new("Ada", "ada@example.com"),
            context: BTreeMap::new(),
            reconnect: true,
        })
        .await;
    let invite = harness
        .expect_effect(|e| matches!(e, Effect::InviteSession { .. }))
        .await;
    if let Effect::InviteSession { context, .. } = invite {
        let context: Value = serde_json::from_slice(&context).unwrap();
        assert_eq!(context["player"], "Ada");
    }

    harness.session(&ipad, SessionState::Connecting).await;
    harness.session(&ipad, SessionState::Connected).await;
    harness
        .expect_effect(|e| matches!(e, Effect::StopBrowsing))
        .await;

    harness.session(&ipad, SessionState::NotConnected).await;
    harness
        .expect_app_event(|e| {
            matches!(e, AppEvent::PeerStateChanged { peer, .. }
                if peer.state == peerlog_core::ConnectionState::Reconnecting)
        })
        .await;

    // First rediscovery invites straight away, the second lands inside the backoff
    // window and is retried by the runtime's timer
    for _ in 0..2 {
        harness
            .event(Event::PeerFound {
                peer_id: ipad.clone(),
                discovery_info: None,
            })
            .await;
    }
    harness
        .expect_effect(|e| matches!(e, Effect::InviteSession { .. }))
        .await;
    harness
        .expect_effect(|e| matches!(e, Effect::InviteSession { .. }))
        .await;
}

#[tokio::test]
async fn test_acceptor_cannot_connect_reports_fault() {
    let mut harness = Harness::start(LinkRole::Acceptor).await;

    harness
        .command(Command::ConnectToPeer {
            peer_id: PeerId::new("ipad"),
            attributes: PeerAttributes::default(),
            context: BTreeMap::new(),
            reconnect: false,
        })
        .await;
    harness
        .expect_app_event(|e| matches!(e, AppEvent::TransportFault { .. }))
        .await;

    // The collector keeps running
    let (peers, _, _) = harness.status().await;
    assert!(peers.is_empty());
}

#[tokio::test]
async fn test_transport_error_is_forwarded() {
    let mut harness = Harness::start(LinkRole::Initiator).await;
    harness
        .event(Event::TransportError {
            error: "browse failed".to_string(),
        })
        .await;
    harness
        .expect_app_event(|e| matches!(e, AppEvent::TransportFault { error } if error == "browse failed"))
        .await;
}

// ----------------------------------------------------------------------------
// Store Commands
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_import_filter_export_and_clear() {
    let mut harness = Harness::start(LinkRole::Acceptor).await;
    let exported = |id: &str, source: &str| ExportedRecord {
        record_id: id.to_string(),
        device_id: PeerId::new("ipad"),
        timestamp: format!("2024-05-01 10:00:0{}", &id[1..]),
        source: source.to_string(),
        message: format!("message {}", id),
    };

    harness
        .command(Command::ImportRecords {
            records: vec![exported("r1", "game"), exported("r2", "logger"), exported("r3", "network")],
            replace: false,
        })
        .await;
    harness
        .expect_app_event(|e| matches!(e, AppEvent::ViewChanged { .. }))
        .await;

    harness
        .command(Command::SetFilter {
            criteria: FilterCriteria::hide_internal().with_text("NETWORK"),
        })
        .await;
    harness
        .expect_app_event(|e| {
            matches!(e, AppEvent::ViewChanged { changes }
                if matches!(changes[..], [ViewChange::Reset { len: 1 }]))
        })
        .await;

    harness.command(Command::ExportRecords).await;
    match harness
        .expect_app_event(|e| matches!(e, AppEvent::ExportReady { .. }))
        .await
    {
        AppEvent::ExportReady { records } => {
            let ids: Vec<_> = records.iter().map(|r| r.record_id.as_str()).collect();
            assert_eq!(ids, vec!["r1", "r3"]);
        }
        _ => unreachable!(),
    }

    harness.command(Command::ClearLogs).await;
    let (_, stored, visible) = harness.status().await;
    assert_eq!((stored, visible), (0, 0));
}

// ----------------------------------------------------------------------------
// Shutdown
// ----------------------------------------------------------------------------

fn ended_sessions(effects: &[Effect]) -> Vec<PeerId> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::EndSession { peer_id } => Some(peer_id.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_delivers_teardown_effects_to_transports() {
    for _ in 0..10 {
        let mut harness = Harness::start(LinkRole::Acceptor).await;
        let ipad = PeerId::new("Ada's iPad");

        harness.command(Command::StartCollecting).await;
        harness
            .expect_effect(|e| matches!(e, Effect::StartAdvertising { .. }))
            .await;
        harness.admit(&ipad).await;
        harness.status().await;

        harness.runtime.stop().await.unwrap();

        let effects = harness.drain_effects().await;
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::StopAdvertising)));
        assert_eq!(ended_sessions(&effects), vec![ipad]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_transport_sees_every_session_end_past_the_buffer() {
    let mut config = CollectorConfig::testing().with_role(LinkRole::Acceptor);
    config.channels.effect_buffer_size = 4;
    config.channels.app_event_buffer_size = 256;
    let mut harness =
        Harness::start_paced(CollectorRuntime::new(config), Duration::from_millis(2)).await;

    harness.command(Command::StartCollecting).await;
    harness
        .expect_effect(|e| matches!(e, Effect::StartAdvertising { .. }))
        .await;
    let peers: Vec<PeerId> = (0..12).map(|i| PeerId::new(format!("device-{}", i))).collect();
    for peer in &peers {
        harness.admit(peer).await;
    }
    let (snapshots, _, _) = harness.status().await;
    assert_eq!(snapshots.len(), peers.len());

    harness.runtime.stop().await.unwrap();

    let mut ended = ended_sessions(&harness.drain_effects().await);
    ended.sort();
    let mut expected = peers.clone();
    expected.sort();
    assert_eq!(ended, expected);
    assert_eq!(harness.lagged.load(Ordering::SeqCst), 0);
}
