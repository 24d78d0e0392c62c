//! Deduplicating, time-ordered, bounded log store
//!
//! Records are kept in a `VecDeque` ordered by their timestamp key, with equal keys in
//! arrival order. A hash index of uniqueness keys rejects re-delivered records; the
//! index and the sequence are always mutated together, so eviction at the retention
//! cap frees both.

use super::ordering::{OrderKey, TimestampOrdering};
use super::record::{parse_sequence_label, LogRecord, RecordFields, RecordKey};
use crate::config::StoreConfig;
use crate::protocol::resume::{Cursor, CursorLookup};
use crate::types::PeerId;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

// ----------------------------------------------------------------------------
// Store Types
// ----------------------------------------------------------------------------

/// A record held in the ordered sequence together with its sort key
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub key: OrderKey,
    pub record: Arc<LogRecord>,
}

/// Result of a successful insert, consumed by the filtered view
#[derive(Debug, Clone)]
pub struct Insertion {
    /// The newly stored record
    pub record: Arc<LogRecord>,
    /// Sort key of the new record
    pub key: OrderKey,
    /// Index of the record in the store once this insert (and any eviction) settled
    pub position: usize,
    /// Record evicted from the head of the store by this insert
    pub evicted: Option<Arc<LogRecord>>,
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub inserted: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub evicted: u64,
}

// ----------------------------------------------------------------------------
// Log Store
// ----------------------------------------------------------------------------

/// Ordered, capped, deduplicated record store with per-device resume cursors
#[derive(Debug)]
pub struct LogStore {
    config: StoreConfig,
    records: VecDeque<StoredRecord>,
    index: HashSet<RecordKey>,
    cursors: HashMap<PeerId, Cursor>,
    stats: StoreStats,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl LogStore {
    /// Create an empty store
    pub fn new(config: StoreConfig) -> Self {
        Self {
            records: VecDeque::with_capacity(config.max_records.min(1024)),
            index: HashSet::new(),
            cursors: HashMap::new(),
            stats: StoreStats::default(),
            config,
        }
    }

    /// Ingest a batch of records received from `device_id`
    ///
    /// Entries are processed in ascending sequence order so the device cursor ends
    /// on the newest record. Malformed entries and already-indexed records are
    /// skipped without affecting the rest of the batch.
    pub fn ingest<I>(&mut self, device_id: &PeerId, batch: I) -> Vec<Insertion>
    where
        I: IntoIterator<Item = (String, RecordFields)>,
    {
        let mut entries: Vec<(u64, RecordFields)> = batch
            .into_iter()
            .map(|(label, fields)| (parse_sequence_label(&label), fields))
            .collect();
        entries.sort_by_key(|(sequence, _)| *sequence);

        let mut insertions = Vec::new();
        for (sequence, fields) in entries {
            let Some(record) = fields.into_record(device_id.clone(), sequence) else {
                self.stats.malformed += 1;
                trace!("Dropping malformed record {} from {}", sequence, device_id);
                continue;
            };
            if let Some(insertion) = self.insert(record) {
                insertions.push(insertion);
            }
        }

        if !insertions.is_empty() {
            debug!(
                "Ingested {} record(s) from {}, store size {}",
                insertions.len(),
                device_id,
                self.records.len()
            );
        }
        insertions
    }

    /// Insert a single validated record
    ///
    /// Returns `None` for duplicates, and for a record that is itself evicted
    /// straight away because it is older than everything in a full store.
    fn insert(&mut self, record: LogRecord) -> Option<Insertion> {
        let record_key = record.key();
        if self.index.contains(&record_key) {
            self.stats.duplicates += 1;
            return None;
        }

        let key = self.config.ordering.key(&record.timestamp);
        let mut position = self.records.partition_point(|stored| stored.key <= key);
        let record = Arc::new(record);

        self.records.insert(
            position,
            StoredRecord {
                key: key.clone(),
                record: Arc::clone(&record),
            },
        );
        self.index.insert(record_key);
        self.stats.inserted += 1;

        self.cursors.insert(
            record.device_id.clone(),
            Cursor::new(record.record_id.clone(), record.sequence),
        );

        let mut evicted = None;
        if self.records.len() > self.config.max_records {
            if let Some(oldest) = self.records.pop_front() {
                self.index.remove(&oldest.record.key());
                self.stats.evicted += 1;

                if position == 0 {
                    return None;
                }
                position -= 1;
                evicted = Some(oldest.record);
            }
        }

        Some(Insertion {
            record,
            key,
            position,
            evicted,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `index` in store order
    pub fn get(&self, index: usize) -> Option<&Arc<LogRecord>> {
        self.records.get(index).map(|stored| &stored.record)
    }

    /// Records in store order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<LogRecord>> + '_ {
        self.records.iter().map(|stored| &stored.record)
    }

    /// Records with their sort keys, in store order
    pub fn entries(&self) -> impl Iterator<Item = &StoredRecord> + '_ {
        self.records.iter()
    }

    /// Whether a uniqueness key is currently indexed
    pub fn contains(&self, key: &RecordKey) -> bool {
        self.index.contains(key)
    }

    /// Number of keys in the dedup index (always equal to `len()`)
    pub fn indexed_keys(&self) -> usize {
        self.index.len()
    }

    /// Current resume cursor for a device (empty if nothing ingested yet)
    pub fn cursor(&self, device_id: &PeerId) -> Cursor {
        self.cursors.get(device_id).cloned().unwrap_or_default()
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn ordering(&self) -> TimestampOrdering {
        self.config.ordering
    }

    // ------------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------------

    /// Drop all records, keeping device cursors
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
        debug!("Log store cleared, {} cursor(s) retained", self.cursors.len());
    }

    /// Drop all records, cursors and statistics
    pub fn reset(&mut self) {
        self.records.clear();
        self.index.clear();
        self.cursors.clear();
        self.stats = StoreStats::default();
    }
}

impl CursorLookup for LogStore {
    fn cursor_for(&self, device_id: &PeerId) -> Cursor {
        self.cursor(device_id)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
