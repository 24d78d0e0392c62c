//! Task Communication Logging Infrastructure
//!
//! Structured logging of CSP channel traffic between the collector, its transports
//! and the consumer. `TracingLogger` writes through `tracing` under the
//! `peerlog::channel` target; `NoOpLogger` discards everything.

use crate::channel::{AppEvent, Command, Effect, Event};
use serde::{Deserialize, Serialize};
use std::fmt;

// ----------------------------------------------------------------------------
// Log Event Types
// ----------------------------------------------------------------------------

/// Log levels for task communication
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Task identifiers for communication logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskId {
    Collector,
    Transport,
    Consumer,
    /// Timer task re-posting a deferred command
    Scheduler,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Collector => write!(f, "Collector"),
            TaskId::Transport => write!(f, "Transport"),
            TaskId::Consumer => write!(f, "Consumer"),
            TaskId::Scheduler => write!(f, "Scheduler"),
        }
    }
}

/// Communication direction for channel messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Send,
    Receive,
    Drop,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => write!(f, "→"),
            Direction::Receive => write!(f, "←"),
            Direction::Drop => write!(f, "✗"),
        }
    }
}

/// Message type classification for logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MessageType {
    Command(&'static str),
    Event(&'static str),
    Effect(&'static str),
    AppEvent(&'static str),
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Command(cmd) => write!(f, "Command::{}", cmd),
            MessageType::Event(event) => write!(f, "Event::{}", event),
            MessageType::Effect(effect) => write!(f, "Effect::{}", effect),
            MessageType::AppEvent(app_event) => write!(f, "AppEvent::{}", app_event),
        }
    }
}

// ----------------------------------------------------------------------------
// Message Type Extraction
// ----------------------------------------------------------------------------

impl From<&Command> for MessageType {
    fn from(command: &Command) -> Self {
        MessageType::Command(match command {
            Command::StartCollecting => "StartCollecting",
            Command::StopCollecting => "StopCollecting",
            Command::ConnectToPeer { .. } => "ConnectToPeer",
            Command::DisconnectPeer { .. } => "DisconnectPeer",
            Command::RetryInvitation { .. } => "RetryInvitation",
            Command::SetFilter { .. } => "SetFilter",
            Command::ClearLogs => "ClearLogs",
            Command::ImportRecords { .. } => "ImportRecords",
            Command::ExportRecords => "ExportRecords",
            Command::RequestSnapshot => "RequestSnapshot",
            Command::Shutdown => "Shutdown",
        })
    }
}

impl From<&Event> for MessageType {
    fn from(event: &Event) -> Self {
        MessageType::Event(match event {
            Event::PeerFound { .. } => "PeerFound",
            Event::PeerLost { .. } => "PeerLost",
            Event::SessionStateChanged { .. } => "SessionStateChanged",
            Event::DataReceived { .. } => "DataReceived",
            Event::InboundInvitation { .. } => "InboundInvitation",
            Event::TransportError { .. } => "TransportError",
        })
    }
}

impl From<&Effect> for MessageType {
    fn from(effect: &Effect) -> Self {
        MessageType::Effect(match effect {
            Effect::StartAdvertising { .. } => "StartAdvertising",
            Effect::StopAdvertising => "StopAdvertising",
            Effect::StartBrowsing { .. } => "StartBrowsing",
            Effect::StopBrowsing => "StopBrowsing",
            Effect::RestartDiscovery => "RestartDiscovery",
            Effect::SendData { .. } => "SendData",
            Effect::InviteSession { .. } => "InviteSession",
            Effect::EndSession { .. } => "EndSession",
            Effect::RespondToInvitation { .. } => "RespondToInvitation",
            Effect::ScheduleRetry { .. } => "ScheduleRetry",
        })
    }
}

impl From<&AppEvent> for MessageType {
    fn from(app_event: &AppEvent) -> Self {
        MessageType::AppEvent(match app_event {
            AppEvent::PeerFound { .. } => "PeerFound",
            AppEvent::PeerLost { .. } => "PeerLost",
            AppEvent::PeerStateChanged { .. } => "PeerStateChanged",
            AppEvent::RecordsIngested { .. } => "RecordsIngested",
            AppEvent::ViewChanged { .. } => "ViewChanged",
            AppEvent::HandlerStateChanged { .. } => "HandlerStateChanged",
            AppEvent::TransportFault { .. } => "TransportFault",
            AppEvent::ExportReady { .. } => "ExportReady",
            AppEvent::StatusReport { .. } => "StatusReport",
        })
    }
}

// ----------------------------------------------------------------------------
// Message Summary Generation
// ----------------------------------------------------------------------------

pub trait MessageSummary {
    fn summary(&self) -> String;
}

impl MessageSummary for Command {
    fn summary(&self) -> String {
        match self {
            Command::StartCollecting => "starting collection".to_string(),
            Command::StopCollecting => "stopping collection".to_string(),
            Command::ConnectToPeer { peer_id, reconnect, .. } => {
                format!("peer:{} reconnect:{}", peer_id, reconnect)
            }
            Command::DisconnectPeer { peer_id, reason, reconnect } => {
                format!("peer:{} reason:{} reconnect:{}", peer_id, reason, reconnect)
            }
            Command::RetryInvitation { peer_id } => format!("peer:{}", peer_id),
            Command::SetFilter { criteria } => format!(
                "text:{:?} exclude:{:?} device:{:?}",
                criteria.free_text, criteria.exclude_source, criteria.device_id
            ),
            Command::ClearLogs => "clearing logs".to_string(),
            Command::ImportRecords { records, replace } => {
                format!("records:{} replace:{}", records.len(), replace)
            }
            Command::ExportRecords => "exporting records".to_string(),
            Command::RequestSnapshot => "requesting status".to_string(),
            Command::Shutdown => "shutting down".to_string(),
        }
    }
}

impl MessageSummary for Event {
    fn summary(&self) -> String {
        match self {
            Event::PeerFound { peer_id, discovery_info } => format!(
                "peer:{} info_keys:{}",
                peer_id,
                discovery_info.as_ref().map_or(0, |info| info.len())
            ),
            Event::PeerLost { peer_id } => format!("peer:{}", peer_id),
            Event::SessionStateChanged { peer_id, state } => {
                format!("peer:{} state:{}", peer_id, state)
            }
            Event::DataReceived { peer_id, data } => {
                format!("from:{} bytes:{}", peer_id, data.len())
            }
            Event::InboundInvitation { peer_id, context } => format!(
                "peer:{} context_bytes:{}",
                peer_id,
                context.as_ref().map_or(0, |c| c.len())
            ),
            Event::TransportError { error } => format!("error:{}", error),
        }
    }
}

impl MessageSummary for Effect {
    fn summary(&self) -> String {
        match self {
            Effect::StartAdvertising { service_id } | Effect::StartBrowsing { service_id } => {
                format!("service:{}", service_id)
            }
            Effect::StopAdvertising | Effect::StopBrowsing | Effect::RestartDiscovery => {
                String::new()
            }
            Effect::SendData { peer_id, data } => {
                format!("to:{} bytes:{}", peer_id, data.len())
            }
            Effect::InviteSession { peer_id, timeout, .. } => {
                format!("peer:{} timeout:{:?}", peer_id, timeout)
            }
            Effect::EndSession { peer_id } => format!("peer:{}", peer_id),
            Effect::RespondToInvitation { peer_id, accept } => {
                format!("peer:{} accept:{}", peer_id, accept)
            }
            Effect::ScheduleRetry { delay, command } => {
                format!("delay:{:?} cmd:{}", delay, MessageType::from(command))
            }
        }
    }
}

impl MessageSummary for AppEvent {
    fn summary(&self) -> String {
        match self {
            AppEvent::PeerFound { peer } => format!("peer:{}", peer.device_id),
            AppEvent::PeerLost { peer_id } => format!("peer:{}", peer_id),
            AppEvent::PeerStateChanged { peer, reason } => {
                format!("peer:{} state:{} reason:{:?}", peer.device_id, peer.state, reason)
            }
            AppEvent::RecordsIngested { peer_id, records } => {
                format!("from:{} records:{}", peer_id, records.len())
            }
            AppEvent::ViewChanged { changes } => format!("changes:{}", changes.len()),
            AppEvent::HandlerStateChanged { state } => format!("state:{}", state),
            AppEvent::TransportFault { error } => format!("error:{}", error),
            AppEvent::ExportReady { records } => format!("records:{}", records.len()),
            AppEvent::StatusReport {
                peers,
                stored_records,
                visible_records,
                uptime_seconds,
                ..
            } => format!(
                "peers:{} stored:{} visible:{} uptime:{}s",
                peers.len(),
                stored_records,
                visible_records,
                uptime_seconds
            ),
        }
    }
}

// ----------------------------------------------------------------------------
// Logger Implementation
// ----------------------------------------------------------------------------

/// Task communication logger
pub trait TaskLogger {
    fn log_send<T>(&self, from: TaskId, to: TaskId, message: &T)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary;

    fn log_receive<T>(&self, from: TaskId, to: TaskId, message: &T)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary;

    fn log_drop<T>(&self, from: TaskId, to: TaskId, message: &T, reason: &str)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary;

    fn log_task_event(&self, task: TaskId, level: LogLevel, message: &str);
}

/// Logger that forwards channel traffic to `tracing`
#[derive(Debug, Clone)]
pub struct TracingLogger {
    min_level: LogLevel,
}

impl TracingLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn emit(level: LogLevel, line: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "peerlog::channel", "{}", line),
            LogLevel::Debug => tracing::debug!(target: "peerlog::channel", "{}", line),
            LogLevel::Info => tracing::info!(target: "peerlog::channel", "{}", line),
            LogLevel::Warn => tracing::warn!(target: "peerlog::channel", "{}", line),
            LogLevel::Error => tracing::error!(target: "peerlog::channel", "{}", line),
        }
    }
}

impl TaskLogger for TracingLogger {
    fn log_send<T>(&self, from: TaskId, to: TaskId, message: &T)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary,
    {
        if !self.should_log(LogLevel::Debug) {
            return;
        }
        let message_type: MessageType = message.into();
        Self::emit(
            LogLevel::Debug,
            &format!("{} {} {} {} {}", from, Direction::Send, to, message_type, message.summary()),
        );
    }

    fn log_receive<T>(&self, from: TaskId, to: TaskId, message: &T)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary,
    {
        if !self.should_log(LogLevel::Debug) {
            return;
        }
        let message_type: MessageType = message.into();
        Self::emit(
            LogLevel::Debug,
            &format!(
                "{} {} {} {} {}",
                to,
                Direction::Receive,
                from,
                message_type,
                message.summary()
            ),
        );
    }

    fn log_drop<T>(&self, from: TaskId, to: TaskId, message: &T, reason: &str)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary,
    {
        if !self.should_log(LogLevel::Warn) {
            return;
        }
        let message_type: MessageType = message.into();
        Self::emit(
            LogLevel::Warn,
            &format!(
                "{} {} {} {} {} reason:{}",
                from,
                Direction::Drop,
                to,
                message_type,
                message.summary(),
                reason
            ),
        );
    }

    fn log_task_event(&self, task: TaskId, level: LogLevel, message: &str) {
        if self.should_log(level) {
            Self::emit(level, &format!("{} {}", task, message));
        }
    }
}

/// No-op logger for production or when logging is disabled
#[derive(Debug, Clone)]
pub struct NoOpLogger;

impl TaskLogger for NoOpLogger {
    fn log_send<T>(&self, _from: TaskId, _to: TaskId, _message: &T) {}

    fn log_receive<T>(&self, _from: TaskId, _to: TaskId, _message: &T) {}

    fn log_drop<T>(&self, _from: TaskId, _to: TaskId, _message: &T, _reason: &str) {}

    fn log_task_event(&self, _task: TaskId, _level: LogLevel, _message: &str) {}
}
