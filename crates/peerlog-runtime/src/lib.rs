//! peerlog Runtime Engine
//!
//! This crate contains the runtime for the peerlog collector:
//! - `CollectorRuntime`: spawns the collector task and the transport tasks and wires
//!   their channels
//! - `CollectorTask`: the single owner of the peer registry, log store and filtered
//!   view, processing commands and events sequentially
//!
//! `peerlog-core` provides the synchronous building blocks; this crate drives them
//! from async channels.

pub mod logic;
mod runtime;

pub use logic::{CollectorHandlers, CollectorState, CollectorStats, CollectorTask, LoggerWrapper};
pub use runtime::*;

// Re-export core types for convenience
pub use peerlog_core::{
    channel::{
        create_app_event_channel, create_command_channel, create_effect_channel,
        create_effect_receiver, create_event_channel, AppEventReceiver, AppEventSender,
        ChannelError, CommandReceiver, CommandSender, EffectReceiver, EffectSender,
        EventReceiver, EventSender, NonBlockingSend,
    },
    AppEvent, Command, Effect, Event, PeerId, PeerlogError, PeerlogResult, SessionState,
    TransportTask,
};
