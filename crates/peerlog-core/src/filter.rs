//! Filtered View Engine
//!
//! Keeps the subsequence of the log store that passes the active `FilterCriteria`,
//! in store order. Store inserts are applied incrementally; a filter change rebuilds
//! the view from the store.

use crate::config::INTERNAL_LOG_SOURCE;
use crate::store::{Insertion, LogRecord, LogStore, OrderKey};
use crate::types::PeerId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

// ----------------------------------------------------------------------------
// Filter Criteria
// ----------------------------------------------------------------------------

/// Conjunctive record predicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Case-insensitive substring of message or source; empty matches everything
    pub free_text: String,
    /// Records with exactly this source are hidden
    pub exclude_source: Option<String>,
    /// Only records from this device are shown
    pub device_id: Option<PeerId>,
}

impl FilterCriteria {
    /// Criteria that hide the producers' internal transport chatter
    pub fn hide_internal() -> Self {
        Self {
            exclude_source: Some(INTERNAL_LOG_SOURCE.to_string()),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.free_text = text.into();
        self
    }

    pub fn excluding_source(mut self, source: impl Into<String>) -> Self {
        self.exclude_source = Some(source.into());
        self
    }

    pub fn for_device(mut self, device_id: PeerId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    /// True when no predicate is active
    pub fn is_empty(&self) -> bool {
        self.free_text.is_empty() && self.exclude_source.is_none() && self.device_id.is_none()
    }

    pub fn matches(&self, record: &LogRecord) -> bool {
        if self.exclude_source.as_deref() == Some(record.source.as_str()) {
            return false;
        }

        if let Some(device_id) = &self.device_id {
            if &record.device_id != device_id {
                return false;
            }
        }

        if self.free_text.is_empty() {
            return true;
        }
        let needle = self.free_text.to_lowercase();
        record.message.to_lowercase().contains(&needle)
            || record.source.to_lowercase().contains(&needle)
    }
}

// ----------------------------------------------------------------------------
// View Changes
// ----------------------------------------------------------------------------

/// Change notification for the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ViewChange {
    Inserted {
        index: usize,
        record: Arc<LogRecord>,
    },
    Removed {
        index: usize,
    },
    /// The whole view was replaced; re-read it
    Reset {
        len: usize,
    },
}

// ----------------------------------------------------------------------------
// Filter View
// ----------------------------------------------------------------------------

/// Live filtered projection of a `LogStore`
#[derive(Debug, Default)]
pub struct FilterView {
    criteria: FilterCriteria,
    rows: Vec<(OrderKey, Arc<LogRecord>)>,
}

impl FilterView {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            rows: Vec::new(),
        }
    }

    /// Apply store insertions in the order they happened
    ///
    /// An eviction that removes the view's head is reported before the insert it was
    /// caused by.
    pub fn on_inserted(&mut self, insertions: &[Insertion]) -> Vec<ViewChange> {
        let mut changes = Vec::new();

        for insertion in insertions {
            if let Some(evicted) = &insertion.evicted {
                let at_head = self
                    .rows
                    .first()
                    .is_some_and(|(_, head)| Arc::ptr_eq(head, evicted));
                if at_head {
                    self.rows.remove(0);
                    changes.push(ViewChange::Removed { index: 0 });
                }
            }

            if !self.criteria.matches(&insertion.record) {
                continue;
            }

            let index = self.rows.partition_point(|(key, _)| key <= &insertion.key);
            self.rows
                .insert(index, (insertion.key.clone(), Arc::clone(&insertion.record)));
            changes.push(ViewChange::Inserted {
                index,
                record: Arc::clone(&insertion.record),
            });
        }

        if !changes.is_empty() {
            trace!("View applied {} change(s), {} visible", changes.len(), self.rows.len());
        }
        changes
    }

    /// Replace the criteria and rebuild from the store
    pub fn on_filter_changed(&mut self, criteria: FilterCriteria, store: &LogStore) -> ViewChange {
        self.criteria = criteria;
        self.rebuild(store)
    }

    /// Recompute the view from scratch
    pub fn rebuild(&mut self, store: &LogStore) -> ViewChange {
        self.rows = store
            .entries()
            .filter(|stored| self.criteria.matches(&stored.record))
            .map(|stored| (stored.key.clone(), Arc::clone(&stored.record)))
            .collect();
        ViewChange::Reset {
            len: self.rows.len(),
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<LogRecord>> {
        self.rows.get(index).map(|(_, record)| record)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LogRecord>> + '_ {
        self.rows.iter().map(|(_, record)| record)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
