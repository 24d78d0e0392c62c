//! Peer Protocol Module
//!
//! - `connection_state`: per-peer connection state machine and audit entries
//! - `backoff`: invitation backoff
//! - `resume`: resume cursor
//! - `wire`: session message codec

pub mod backoff;
pub mod connection_state;
pub mod resume;
pub mod wire;

pub use backoff::{InviteBackoff, InviteDecision};
pub use connection_state::{
    AuditEntry, ConnectionEvent, ConnectionState, StateTransition, StateTransitionError,
};
pub use resume::{Cursor, CursorLookup};
pub use wire::WireMessage;
