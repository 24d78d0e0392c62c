//! Wire Payload Codec
//!
//! Every message on a session is a single JSON object mapping a descriptor to its
//! payload (or `null`). One object may carry several descriptors; each becomes its
//! own `WireMessage`.
//!
//! ```text
//! {"disconnect": {"reason": "Unexpected connection"}}
//! {"resume-request": {"recordId": "9f1c", "sequence": 41}}
//! {"logs": {"42": {"recordId": "..", "timestamp": "..", "source": "..", "message": ".."}}}
//! ```

use super::resume::Cursor;
use crate::errors::{PayloadError, Result};
use crate::store::RecordFields;
use serde_json::{Map, Value};
use tracing::warn;

pub const DISCONNECT: &str = "disconnect";
pub const RESUME_REQUEST: &str = "resume-request";
/// Descriptor producers use for log batches; any unknown descriptor is read as one
pub const DEFAULT_LOG_DESCRIPTOR: &str = "logs";

/// A decoded session message
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// The remote side is closing the session
    Disconnect { reason: String },
    /// Ask the remote side to replay records after the cursor
    ResumeRequest(Cursor),
    /// A batch of records keyed by sequence label
    LogBatch {
        descriptor: String,
        entries: Vec<(String, RecordFields)>,
    },
}

impl WireMessage {
    pub fn disconnect(reason: impl Into<String>) -> Self {
        WireMessage::Disconnect {
            reason: reason.into(),
        }
    }

    pub fn descriptor(&self) -> &str {
        match self {
            WireMessage::Disconnect { .. } => DISCONNECT,
            WireMessage::ResumeRequest(_) => RESUME_REQUEST,
            WireMessage::LogBatch { descriptor, .. } => descriptor,
        }
    }

    /// Encode as a single-descriptor JSON object
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = match self {
            WireMessage::Disconnect { reason } => {
                let mut object = Map::new();
                object.insert("reason".to_string(), Value::String(reason.clone()));
                Value::Object(object)
            }
            WireMessage::ResumeRequest(cursor) => serde_json::to_value(cursor)?,
            WireMessage::LogBatch { entries, .. } => {
                let mut object = Map::new();
                for (label, fields) in entries {
                    object.insert(label.clone(), serde_json::to_value(fields)?);
                }
                Value::Object(object)
            }
        };

        let mut message = Map::new();
        message.insert(self.descriptor().to_string(), payload);
        Ok(serde_json::to_vec(&Value::Object(message))?)
    }

    /// Decode every descriptor in a received message
    ///
    /// Fails only when the bytes are not a JSON object. A log batch whose payload is
    /// not an object is dropped; individual malformed records are kept as incomplete
    /// `RecordFields` and rejected later by the store.
    pub fn decode(data: &[u8]) -> Result<Vec<WireMessage>> {
        let value: Value = serde_json::from_slice(data)?;
        let Value::Object(message) = value else {
            return Err(PayloadError::NotAnObject.into());
        };

        let mut decoded = Vec::with_capacity(message.len());
        for (descriptor, payload) in message {
            match descriptor.as_str() {
                DISCONNECT => decoded.push(WireMessage::Disconnect {
                    reason: payload
                        .get("reason")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }),
                RESUME_REQUEST => decoded.push(WireMessage::ResumeRequest(Cursor::from_payload(
                    &payload,
                ))),
                _ => match payload {
                    Value::Object(batch) => {
                        let entries = batch
                            .iter()
                            .map(|(label, fields)| (label.clone(), RecordFields::from_value(fields)))
                            .collect();
                        decoded.push(WireMessage::LogBatch {
                            descriptor,
                            entries,
                        });
                    }
                    Value::Null => {}
                    _ => warn!("Ignoring non-object payload for descriptor '{}'", descriptor),
                },
            }
        }
        Ok(decoded)
    }
}
