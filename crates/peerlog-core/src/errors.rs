//! Error types for the peerlog collector
//!
//! This module contains the error types used throughout the core: transport errors,
//! payload errors raised while decoding wire messages and export files, and the
//! `PeerlogError` type that unifies them.

use crate::protocol::StateTransitionError;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Specific transport error types
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Device not recognized: {peer_id}")]
    PeerNotFound { peer_id: String },
    #[error("Send failed to peer {peer_id}: {reason}")]
    SendFailed { peer_id: String, reason: String },
    #[error("Invitation to peer {peer_id} failed: {reason}")]
    InvitationFailed { peer_id: String, reason: String },
    #[error("Discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
    #[error("Operation not supported in {role} role: {operation}")]
    UnsupportedForRole { role: String, operation: String },
    #[error("Invalid transport configuration: {reason}")]
    InvalidConfiguration { reason: String },
    #[error("Transport shutdown: {reason}")]
    Shutdown { reason: String },
}

/// Errors raised while decoding wire payloads and export files
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Payload is not a JSON object")]
    NotAnObject,
    #[error("Payload is not a JSON array")]
    NotAnArray,
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("{message}")]
    Generic { message: String },
}

impl From<String> for PayloadError {
    fn from(message: String) -> Self {
        PayloadError::Generic { message }
    }
}

impl From<&str> for PayloadError {
    fn from(message: &str) -> Self {
        PayloadError::Generic {
            message: message.to_string(),
        }
    }
}

/// Core error type for the peerlog collector
#[derive(Debug, thiserror::Error)]
pub enum PeerlogError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateTransitionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel communication error (internal to the collector task)
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl PeerlogError {
    /// Create an invalid payload error with a message
    pub fn invalid_payload<T: Into<String>>(message: T) -> Self {
        PeerlogError::Payload(PayloadError::Generic {
            message: message.into(),
        })
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        PeerlogError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        PeerlogError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a peer-not-found error
    pub fn peer_not_found<P: ToString>(peer_id: P) -> Self {
        PeerlogError::Transport(TransportError::PeerNotFound {
            peer_id: peer_id.to_string(),
        })
    }

    /// Create an invitation failure error
    pub fn invitation_failed<P: ToString, R: Into<String>>(peer_id: P, reason: R) -> Self {
        PeerlogError::Transport(TransportError::InvitationFailed {
            peer_id: peer_id.to_string(),
            reason: reason.into(),
        })
    }

    /// Create an error for an operation the current link role cannot perform
    pub fn unsupported_for_role<R: ToString, O: Into<String>>(role: R, operation: O) -> Self {
        PeerlogError::Transport(TransportError::UnsupportedForRole {
            role: role.to_string(),
            operation: operation.into(),
        })
    }

    /// Whether the collector task can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PeerlogError::Channel { .. } | PeerlogError::Configuration { .. }
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, PeerlogError>;
pub type PeerlogResult<T> = Result<T>;
