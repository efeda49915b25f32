//! Property-based tests for structural cleaning
//!
//! Generated trees mix absent markers, nulls and nested containers at
//! arbitrary depth.

use blaze_api::{Value, ValueMap};
use blaze_core::sanitize::{clean, contains_absent};
use proptest::prelude::*;

fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        2 => Just(Value::Absent),
        1 => Just(Value::Null),
        1 => any::<bool>().prop_map(Value::Boolean),
        2 => any::<i64>().prop_map(Value::Integer),
        2 => "[a-z0-9 ]{0,12}".prop_map(Value::String),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(6, 128, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                .prop_map(|entries: ValueMap| Value::Object(entries)),
        ]
    })
}

/// Same tree with every absent marker removed by hand, nothing else touched.
fn without_absent(value: &Value) -> Option<Value> {
    match value {
        Value::Absent => None,
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(without_absent).collect(),
        )),
        Value::Object(entries) => Some(Value::Object(
            entries
                .iter()
                .filter_map(|(k, v)| without_absent(v).map(|v| (k.clone(), v)))
                .collect(),
        )),
        other => Some(other.clone()),
    }
}

fn count_nulls(value: &Value) -> usize {
    match value {
        Value::Null => 1,
        Value::Array(items) => items.iter().map(count_nulls).sum(),
        Value::Object(entries) => entries.values().map(count_nulls).sum(),
        _ => 0,
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn clean_is_idempotent(value in value_strategy()) {
        let once = clean(value);
        prop_assert_eq!(clean(once.clone()), once);
    }

    #[test]
    fn clean_removes_every_absent_below_the_root(value in value_strategy()) {
        let cleaned = clean(value.clone());
        if value.is_absent() {
            prop_assert!(cleaned.is_absent());
        } else {
            prop_assert!(!contains_absent(&cleaned));
        }
    }

    #[test]
    fn clean_only_removes_absent(value in value_strategy()) {
        let cleaned = clean(value.clone());
        match without_absent(&value) {
            Some(expected) => prop_assert_eq!(cleaned, expected),
            None => prop_assert!(cleaned.is_absent()),
        }
    }

    #[test]
    fn clean_preserves_nulls(value in value_strategy()) {
        let cleaned = clean(value.clone());
        prop_assert_eq!(count_nulls(&cleaned), count_nulls(&value));
    }

    #[test]
    fn clean_keeps_array_order(items in prop::collection::vec(
        prop_oneof![Just(None), any::<i64>().prop_map(Some)],
        0..32,
    )) {
        let input = Value::Array(items.iter().map(|item| Value::from(*item)).collect());
        let expected = Value::Array(items.iter().flatten().map(|i| Value::Integer(*i)).collect());
        prop_assert_eq!(clean(input), expected);
    }
}
