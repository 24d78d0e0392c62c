//! Log Store Module
//!
//! - `record`: wire-level record fields and the immutable `LogRecord`
//! - `ordering`: timestamp comparison modes
//! - `log_store`: the deduplicating, capped, ordered store
//! - `export`: export/import file layout

pub mod export;
pub mod log_store;
pub mod ordering;
pub mod record;

pub use export::{from_json, to_json, ExportedRecord};
pub use log_store::{Insertion, LogStore, StoreStats, StoredRecord};
pub use ordering::{OrderKey, TimestampOrdering};
pub use record::{parse_sequence_label, LogRecord, RecordFields, RecordKey};
