//! Log record types
//!
//! `RecordFields` is the loosely-typed shape a record arrives in; `LogRecord` is the
//! validated, immutable form the store keeps.

use crate::types::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ----------------------------------------------------------------------------
// Log Record
// ----------------------------------------------------------------------------

/// An immutable log line collected from a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub record_id: String,
    pub device_id: PeerId,
    /// Sequence label of the record within the batch it arrived in
    pub sequence: u64,
    /// Event time as reported by the origin device
    pub timestamp: String,
    pub source: String,
    pub message: String,
}

impl LogRecord {
    /// Uniqueness key used by the dedup index
    pub fn key(&self) -> RecordKey {
        RecordKey {
            device_id: self.device_id.clone(),
            record_id: self.record_id.clone(),
            sequence: self.sequence,
        }
    }
}

/// (device, record id, sequence) uniqueness key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub device_id: PeerId,
    pub record_id: String,
    pub sequence: u64,
}

impl RecordKey {
    pub fn new(device_id: PeerId, record_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            device_id,
            record_id: record_id.into(),
            sequence,
        }
    }
}

// ----------------------------------------------------------------------------
// Record Fields
// ----------------------------------------------------------------------------

/// Record fields as received on the wire, before validation
///
/// Every field is optional here; `into_record` rejects anything incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFields {
    #[serde(alias = "uuid", skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecordFields {
    /// Build a complete field set
    pub fn new(
        record_id: impl Into<String>,
        timestamp: impl Into<String>,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            record_id: Some(record_id.into()),
            timestamp: Some(timestamp.into()),
            source: Some(source.into()),
            message: Some(message.into()),
        }
    }

    /// Extract fields from an arbitrary JSON value
    ///
    /// Strings are taken as-is and numbers/booleans are rendered to text. Anything
    /// else (including a non-object value) leaves the field empty.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| object.get(*name))
                .and_then(scalar_to_string)
        };

        Self {
            record_id: field(&["recordId", "uuid"]),
            timestamp: field(&["timestamp"]),
            source: field(&["source"]),
            message: field(&["message"]),
        }
    }

    /// Validate and freeze into a `LogRecord`
    ///
    /// Returns `None` when any required field is missing.
    pub fn into_record(self, device_id: PeerId, sequence: u64) -> Option<LogRecord> {
        Some(LogRecord {
            record_id: self.record_id?,
            device_id,
            sequence,
            timestamp: self.timestamp?,
            source: self.source?,
            message: self.message?,
        })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a batch sequence label; non-numeric labels count as 0
pub fn parse_sequence_label(label: &str) -> u64 {
    label.trim().parse().unwrap_or(0)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
