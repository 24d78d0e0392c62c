//! Resume Cursor
//!
//! On (re)connection the collector tells a peer the newest record it already holds
//! from that peer. The peer is expected to replay only what follows; the store
//! deduplicates whatever overlaps, so the request needs no acknowledgement.

use crate::types::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Newest record ingested from a peer
///
/// Serializes to the `resume-request` payload shape `{recordId, sequence}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "recordId", alias = "uuid", default)]
    pub last_record_id: String,
    #[serde(rename = "sequence", default)]
    pub last_sequence: u64,
}

impl Cursor {
    pub fn new(last_record_id: impl Into<String>, last_sequence: u64) -> Self {
        Self {
            last_record_id: last_record_id.into(),
            last_sequence,
        }
    }

    /// True for a peer nothing has been ingested from yet
    pub fn is_empty(&self) -> bool {
        self.last_record_id.is_empty() && self.last_sequence == 0
    }

    /// Read a cursor from a `resume-request` payload
    ///
    /// Lenient: `null` or a non-object yields the empty cursor, the sequence may be a
    /// number or a numeric string.
    pub fn from_payload(payload: &Value) -> Self {
        let Some(object) = payload.as_object() else {
            return Self::default();
        };

        let last_record_id = object
            .get("recordId")
            .or_else(|| object.get("uuid"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let last_sequence = match object.get("sequence") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        };

        Self {
            last_record_id,
            last_sequence,
        }
    }
}

/// Read access to per-device cursors
///
/// Implemented by the log store, which owns cursors so they outlive registry removal.
pub trait CursorLookup {
    fn cursor_for(&self, device_id: &PeerId) -> Cursor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_cursor_payload() {
        let value = serde_json::to_value(Cursor::default()).unwrap();
        assert_eq!(value, json!({"recordId": "", "sequence": 0}));
        assert!(Cursor::default().is_empty());
    }

    #[test]
    fn test_from_payload_is_lenient() {
        assert_eq!(
            Cursor::from_payload(&json!({"uuid": "abc", "sequence": "17"})),
            Cursor::new("abc", 17)
        );
        assert_eq!(Cursor::from_payload(&Value::Null), Cursor::default());
        assert_eq!(
            Cursor::from_payload(&json!({"recordId": "x", "sequence": -3})),
            Cursor::new("x", 0)
        );
    }
}
