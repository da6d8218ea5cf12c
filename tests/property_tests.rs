//! Property Tests for Partitioning and Aggregation
//!
//! Uses property-based testing (proptest) to check the batching and
//! statistics invariants over generated inputs.

use chrono::{TimeZone, Utc};
use facility_insights::{
    aggregation::{percentile_sorted, Aggregator},
    flatten::FlattenedRecord,
    query::partition_items,
    types::{FieldValue, Metadata},
};
use proptest::prelude::*;
use std::collections::HashSet;

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Typical sensor values, finite and bounded
fn sensor_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        (0.0..5000.0f64),
        (-100i32..100).prop_map(f64::from),
        Just(0.0),
    ]
}

/// Records spread over a handful of series names
fn records(max_len: usize) -> impl Strategy<Value = Vec<FlattenedRecord>> {
    prop::collection::vec((0usize..6, sensor_value(), 0i64..86_400), 0..max_len).prop_map(
        |raw| {
            raw.into_iter()
                .map(|(series, value, offset)| {
                    let mut fields = Metadata::new();
                    fields.insert("name".into(), FieldValue::from(format!("S{series}")));
                    FlattenedRecord {
                        id: format!("id-{series}"),
                        time: Utc.timestamp_opt(1_756_000_000 + offset, 0).unwrap(),
                        value,
                        status: 192,
                        fields,
                    }
                })
                .collect()
        },
    )
}

// =============================================================================
// Partitioning
// =============================================================================

mod partitioning {
    use super::*;

    proptest! {
        /// ceil(N / cap) chunks, each full except possibly the last
        #[test]
        fn chunk_count_and_sizes(n in 0usize..1000, cap in 1usize..200) {
            let items: Vec<usize> = (0..n).collect();
            let chunks = partition_items(&items, cap);

            prop_assert_eq!(chunks.len(), n.div_ceil(cap));
            if let Some((last, full)) = chunks.split_last() {
                prop_assert!(full.iter().all(|c| c.len() == cap));
                prop_assert!(!last.is_empty() && last.len() <= cap);
            }
        }

        /// Concatenating chunks in order restores the input
        #[test]
        fn concatenation_is_identity(n in 0usize..500, cap in 1usize..120) {
            let items: Vec<usize> = (0..n).collect();
            let joined: Vec<usize> = partition_items(&items, cap).into_iter().flatten().collect();
            prop_assert_eq!(joined, items);
        }
    }
}

// =============================================================================
// Aggregation
// =============================================================================

mod aggregation {
    use super::*;

    proptest! {
        /// One row per distinct name, counts summing to the input size
        #[test]
        fn groups_match_distinct_names(input in records(300)) {
            let rows = Aggregator::default().consolidate(&input);
            let names: HashSet<String> = input.iter().map(|r| r.name()).collect();

            prop_assert_eq!(rows.len(), names.len());
            prop_assert_eq!(rows.iter().map(|r| r.value_count).sum::<usize>(), input.len());
            for row in &rows {
                let expected = input.iter().filter(|r| r.name() == row.name).count();
                prop_assert_eq!(row.value_count, expected);
            }
        }

        /// Order statistics stay within [min, max] and are monotone
        #[test]
        fn statistics_are_bounded(input in records(300)) {
            for row in Aggregator::default().consolidate(&input) {
                let eps = 1e-9 * row.value_max.abs().max(1.0);
                prop_assert!(row.value_min <= row.value_median + eps);
                prop_assert!(row.value_median <= row.value_p75 + eps);
                prop_assert!(row.value_p75 <= row.value_p95 + eps);
                prop_assert!(row.value_p95 <= row.value_max + eps);
                prop_assert!(row.value_mean >= row.value_min - eps);
                prop_assert!(row.value_mean <= row.value_max + eps);
                prop_assert!(row.value_mean_top10 >= row.value_mean - eps);
                prop_assert!(row.time_min <= row.time_max);
                prop_assert_eq!(row.value_std.is_nan(), row.value_count < 2);
            }
        }

        /// Groups come out in first-encounter order
        #[test]
        fn first_encounter_order(input in records(200)) {
            let rows = Aggregator::default().consolidate(&input);
            let mut seen = Vec::new();
            for record in &input {
                let name = record.name();
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
            let names: Vec<String> = rows.into_iter().map(|r| r.name).collect();
            prop_assert_eq!(names, seen);
        }

        /// Every percentile of a constant group is the constant
        #[test]
        fn constant_group_percentiles(value in sensor_value(), n in 1usize..50, p in 0.0..=100.0f64) {
            let sorted = vec![value; n];
            prop_assert_eq!(percentile_sorted(&sorted, p), value);
        }
    }
}
