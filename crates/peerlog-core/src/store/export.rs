//! Export and import of the log store
//!
//! The export layout is a JSON array of `{recordId, deviceId, timestamp, source,
//! message}` objects in store order. Import re-ingests each entry through the normal
//! ingest path using its file position as the sequence, so the dedup and ordering
//! rules apply to replayed data exactly as to live data.

use super::log_store::{Insertion, LogStore};
use super::record::{LogRecord, RecordFields};
use crate::errors::{PayloadError, Result};
use crate::types::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One record in an export file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedRecord {
    #[serde(alias = "uuid")]
    pub record_id: String,
    #[serde(alias = "deviceName")]
    pub device_id: PeerId,
    pub timestamp: String,
    pub source: String,
    pub message: String,
}

impl ExportedRecord {
    fn into_fields(self) -> (PeerId, RecordFields) {
        (
            self.device_id,
            RecordFields::new(self.record_id, self.timestamp, self.source, self.message),
        )
    }
}

impl From<&LogRecord> for ExportedRecord {
    fn from(record: &LogRecord) -> Self {
        Self {
            record_id: record.record_id.clone(),
            device_id: record.device_id.clone(),
            timestamp: record.timestamp.clone(),
            source: record.source.clone(),
            message: record.message.clone(),
        }
    }
}

impl LogStore {
    /// Snapshot the store in export layout
    ///
    /// Records whose source matches `export_exclude_source` are left out.
    pub fn export(&self) -> Vec<ExportedRecord> {
        let excluded = self.config().export_exclude_source.as_deref();
        self.iter()
            .filter(|record| Some(record.source.as_str()) != excluded)
            .map(|record| ExportedRecord::from(record.as_ref()))
            .collect()
    }

    /// Re-ingest exported records in file order
    pub fn import(&mut self, records: Vec<ExportedRecord>) -> Vec<Insertion> {
        let mut insertions = Vec::new();
        for (position, record) in records.into_iter().enumerate() {
            let (device_id, fields) = record.into_fields();
            insertions.extend(self.ingest(&device_id, [(position.to_string(), fields)]));
        }
        debug!("Imported {} record(s)", insertions.len());
        insertions
    }
}

/// Render records as a pretty-printed export document
pub fn to_json(records: &[ExportedRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Parse an export document
///
/// The document must be a JSON array; individual entries that do not match the
/// export layout are dropped.
pub fn from_json(document: &str) -> Result<Vec<ExportedRecord>> {
    let value: Value = serde_json::from_str(document)?;
    let Value::Array(entries) = value else {
        return Err(PayloadError::NotAnArray.into());
    };

    let total = entries.len();
    let records: Vec<ExportedRecord> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();

    if records.len() < total {
        warn!(
            "Dropped {} malformed export entries",
            total - records.len()
        );
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StoreConfig, INTERNAL_LOG_SOURCE};

    fn exported(record_id: &str, device: &str, timestamp: &str, source: &str) -> ExportedRecord {
        ExportedRecord {
            record_id: record_id.to_string(),
            device_id: PeerId::new(device),
            timestamp: timestamp.to_string(),
            source: source.to_string(),
            message: format!("message {}", record_id),
        }
    }

    #[test]
    fn test_export_skips_internal_source() {
        let mut store = LogStore::new(StoreConfig::default());
        store.import(vec![
            exported("a", "phone", "2024-01-01 10:00:00", "app"),
            exported("b", "phone", "2024-01-01 10:00:01", INTERNAL_LOG_SOURCE),
        ]);

        assert_eq!(store.len(), 2);
        let records = store.export();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_id, "a");
    }

    #[test]
    fn test_import_twice_is_idempotent() {
        let mut store = LogStore::default();
        let file = vec![
            exported("a", "phone", "2024-01-01 10:00:00", "app"),
            exported("b", "tablet", "2024-01-01 10:00:01", "app"),
        ];

        store.import(file.clone());
        let second = store.import(file);

        assert!(second.is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_from_json_accepts_legacy_keys_and_drops_bad_entries() {
        let document = r#"[
            {"uuid": "a", "deviceName": "phone", "timestamp": "t1", "source": "app", "message": "m"},
            {"recordId": "b", "deviceId": "phone", "timestamp": "t2", "source": "app"},
            {"recordId": "c", "deviceId": "phone", "timestamp": "t3", "source": "app", "message": "m"}
        ]"#;

        let records = from_json(document).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(records[0].device_id, PeerId::new("phone"));
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(from_json(r#"{"recordId": "a"}"#).is_err());
    }

    #[test]
    fn test_export_document_uses_camel_case() {
        let json = to_json(&[exported("a", "phone", "t", "app")]).unwrap();
        assert!(json.contains("\"recordId\""));
        assert!(json.contains("\"deviceId\""));
    }
}
