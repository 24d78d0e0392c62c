//! Property-based tests for the log store and filtered view
//!
//! These tests verify the store's uniqueness, ordering and retention invariants, and
//! that incremental view maintenance agrees with a full rebuild.

use peerlog_core::{
    store::{LogStore, RecordFields, RecordKey},
    FilterCriteria, FilterView, PeerId, StoreConfig, TimestampOrdering,
};
use proptest::prelude::*;
use std::collections::HashSet;

/// One batch entry: sequence label and fields
type Entry = (String, RecordFields);

fn arb_device() -> impl Strategy<Value = PeerId> {
    prop::sample::select(vec!["ipad-1", "ipad-2", "iphone"]).prop_map(PeerId::new)
}

/// Timestamps from a small pool so equal keys are common
fn arb_timestamp() -> impl Strategy<Value = String> {
    (0u8..4, 0u8..60).prop_map(|(minute, second)| format!("2024-05-01 10:{:02}:{:02}", minute, second))
}

fn arb_source() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["game", "network", "logger"]).prop_map(str::to_string)
}

fn arb_entry() -> impl Strategy<Value = Entry> {
    (0u64..20, 0u8..5, arb_timestamp(), arb_source(), "[a-z ]{0,12}").prop_map(
        |(sequence, record, timestamp, source, message)| {
            (
                sequence.to_string(),
                RecordFields::new(format!("rec-{}", record), timestamp, source, message),
            )
        },
    )
}

fn arb_batches() -> impl Strategy<Value = Vec<(PeerId, Vec<Entry>)>> {
    prop::collection::vec(
        (arb_device(), prop::collection::vec(arb_entry(), 0..8)),
        0..12,
    )
}

fn arb_criteria() -> impl Strategy<Value = FilterCriteria> {
    (
        prop::sample::select(vec!["", "a", "net", "GAME"]),
        prop::option::of(arb_source()),
        prop::option::of(arb_device()),
    )
        .prop_map(|(text, exclude_source, device_id)| FilterCriteria {
            free_text: text.to_string(),
            exclude_source,
            device_id,
        })
}

fn store_with(max_records: usize, ordering: TimestampOrdering) -> LogStore {
    LogStore::new(StoreConfig {
        max_records,
        ordering,
        ..StoreConfig::default()
    })
}

fn keys(store: &LogStore) -> Vec<RecordKey> {
    store.iter().map(|record| record.key()).collect()
}

proptest! {
    /// Property: No two stored records share a uniqueness key
    #[test]
    fn stored_keys_are_unique(batches in arb_batches()) {
        let mut store = store_with(1_000, TimestampOrdering::Lexicographic);
        for (device, batch) in batches {
            store.ingest(&device, batch);
        }

        let keys = keys(&store);
        let unique: HashSet<_> = keys.iter().cloned().collect();
        prop_assert_eq!(unique.len(), keys.len());
        prop_assert_eq!(store.indexed_keys(), store.len());
    }

    /// Property: The store is always sorted by timestamp
    #[test]
    fn store_is_sorted(batches in arb_batches()) {
        let mut store = store_with(1_000, TimestampOrdering::Lexicographic);
        for (device, batch) in batches {
            store.ingest(&device, batch);
        }

        let timestamps: Vec<_> = store.iter().map(|record| record.timestamp.clone()).collect();
        prop_assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    /// Property: Re-delivering every batch leaves the store unchanged
    #[test]
    fn redelivery_is_idempotent(batches in arb_batches()) {
        let mut store = store_with(1_000, TimestampOrdering::Lexicographic);
        for (device, batch) in &batches {
            store.ingest(device, batch.clone());
        }
        let before = keys(&store);

        for (device, batch) in &batches {
            let insertions = store.ingest(device, batch.clone());
            prop_assert!(insertions.is_empty());
        }
        prop_assert_eq!(keys(&store), before);
    }

    /// Property: The retention cap holds and the index tracks evictions
    #[test]
    fn cap_is_enforced(batches in arb_batches(), cap in 1usize..10) {
        let mut store = store_with(cap, TimestampOrdering::Lexicographic);
        for (device, batch) in batches {
            store.ingest(&device, batch);
            prop_assert!(store.len() <= cap);
            prop_assert_eq!(store.indexed_keys(), store.len());
        }
    }

    /// Property: Applying insertions incrementally matches a rebuild from the store
    #[test]
    fn incremental_view_matches_rebuild(
        batches in arb_batches(),
        criteria in arb_criteria(),
        cap in 1usize..30,
        chronological in any::<bool>(),
    ) {
        let ordering = if chronological {
            TimestampOrdering::Chronological
        } else {
            TimestampOrdering::Lexicographic
        };
        let mut store = store_with(cap, ordering);
        let mut view = FilterView::new(criteria.clone());

        for (device, batch) in batches {
            let insertions = store.ingest(&device, batch);
            view.on_inserted(&insertions);
        }

        let mut rebuilt = FilterView::new(criteria);
        rebuilt.rebuild(&store);

        let incremental: Vec<_> = view.iter().map(|record| record.key()).collect();
        let expected: Vec<_> = rebuilt.iter().map(|record| record.key()).collect();
        prop_assert_eq!(incremental, expected);
    }
}
