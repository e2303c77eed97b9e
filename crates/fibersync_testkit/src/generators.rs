//! Property-based test generators using proptest.
//!
//! Provides strategies for generating remote data sets that exercise
//! pagination boundaries and key handling.

use crate::fixtures::row;
use fibersync_protocol::{Row, Value};
use proptest::prelude::*;
use serde_json::json;

/// Strategy for generating valid entity names.
pub fn entity_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,23}").expect("Invalid regex")
}

/// Strategy for small batch sizes, so pages end on and off boundaries.
pub fn batch_size_strategy() -> impl Strategy<Value = u32> {
    1u32..=8
}

/// Strategy for scalar column values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::String),
    ]
}

/// Strategy for rows with unique `id` values `0..n`.
pub fn keyed_rows_strategy(max_rows: usize) -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(scalar_strategy(), 0..=max_rows).prop_map(|values| {
        values
            .into_iter()
            .enumerate()
            .map(|(id, name)| row(json!({ "id": id, "name": name })))
            .collect()
    })
}

/// Strategy for rows where some lack the `id` column.
///
/// Returns the rows and the number of keyed ones.
pub fn mixed_rows_strategy(max_rows: usize) -> impl Strategy<Value = (Vec<Row>, usize)> {
    prop::collection::vec(any::<bool>(), 0..=max_rows).prop_map(|keyed| {
        let count = keyed.iter().filter(|k| **k).count();
        let rows = keyed
            .into_iter()
            .enumerate()
            .map(|(i, has_key)| {
                if has_key {
                    row(json!({ "id": i, "label": format!("row-{i}") }))
                } else {
                    row(json!({ "label": format!("orphan-{i}") }))
                }
            })
            .collect();
        (rows, count)
    })
}

/// Strategy for append-only event rows with non-decreasing timestamps.
pub fn event_rows_strategy(max_rows: usize) -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(0u32..3, 0..=max_rows).prop_map(|steps| {
        let mut second = 0u32;
        steps
            .into_iter()
            .enumerate()
            .map(|(id, step)| {
                second += step;
                row(json!({
                    "id": id,
                    "created_at": format!("2024-01-01T00:{:02}:{:02}Z", second / 60, second % 60),
                }))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn keyed_rows_have_unique_ids(rows in keyed_rows_strategy(20)) {
            let ids = crate::fixtures::ids(&rows);
            let mut deduped = ids.clone();
            deduped.dedup();
            prop_assert_eq!(ids, deduped);
        }

        #[test]
        fn mixed_rows_count_matches(pair in mixed_rows_strategy(20)) {
            let (rows, keyed) = pair;
            prop_assert_eq!(rows.iter().filter(|r| r.contains_key("id")).count(), keyed);
        }

        #[test]
        fn event_timestamps_do_not_decrease(rows in event_rows_strategy(30)) {
            let stamps: Vec<&str> = rows
                .iter()
                .filter_map(|r| r.get("created_at").and_then(Value::as_str))
                .collect();
            prop_assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
