//! peerlog Core
//!
//! Foundational types for the peerlog collector: the typed channel protocol between
//! the collector task and its transports, the peer link state machine, the resume
//! cursor wire protocol, the deduplicating log store and the filtered view over it.
//!
//! Everything in this crate is synchronous and owned by a single task; the async
//! orchestration lives in `peerlog-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod filter;
pub mod link;
pub mod protocol;
pub mod store;
pub mod task_logging;
pub mod transport_task;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{
    create_app_event_channel, create_command_channel, create_effect_channel,
    create_effect_receiver, create_event_channel, AppEvent, AppEventReceiver, AppEventSender,
    ChannelConfig, ChannelError, Command, CommandReceiver, CommandSender, Effect,
    EffectReceiver, EffectSender, Event, EventReceiver, EventSender, HandlerState,
    NonBlockingSend, SessionState,
};
pub use config::{
    BackoffConfig, CollectorConfig, LinkConfig, MonitoringConfig, StoreConfig,
    INTERNAL_LOG_SOURCE, SERVICE_ID,
};
pub use errors::{PayloadError, PeerlogError, PeerlogResult, Result, TransportError};
pub use filter::{FilterCriteria, FilterView, ViewChange};
pub use link::{
    AcceptAll, AdmissionPolicy, LinkOutput, LinkRole, PeerAttributes, PeerLink, PeerSnapshot,
};
pub use protocol::{ConnectionState, Cursor, CursorLookup, StateTransitionError, WireMessage};
pub use store::{
    ExportedRecord, Insertion, LogRecord, LogStore, RecordFields, RecordKey, StoreStats,
    TimestampOrdering,
};
pub use task_logging::{LogLevel, NoOpLogger, TaskId, TaskLogger, TracingLogger};
pub use transport_task::TransportTask;
pub use types::{PeerId, SystemTimeSource, TimeSource, Timestamp};
