//! Structural cleaning of values before they are written.
//!
//! The realtime store rejects any write that contains an absent value, so
//! every write payload passes through [`clean`] first.

use blaze_api::Value;

/// Remove every `Value::Absent` from a value tree.
///
/// - Arrays: elements are cleaned, absent elements dropped, survivors keep
///   their relative order (no holes).
/// - Objects: keys whose value is absent are dropped. Nested containers are
///   cleaned first and kept even when cleaning left them empty; only a direct
///   absent value removes a key or element.
/// - Everything else, `Null` included, is returned unchanged. A top-level
///   `Absent` stays `Absent`.
///
/// Idempotent: `clean(clean(x)) == clean(x)`.
pub fn clean(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|item| !item.is_absent())
                .map(clean)
                .filter(|item| !item.is_absent())
                .collect(),
        ),
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .filter(|(_, value)| !value.is_absent())
                .map(|(key, value)| (key, clean(value)))
                .filter(|(_, value)| !value.is_absent())
                .collect(),
        ),
        other => other,
    }
}

/// Whether any absent value occurs anywhere in the tree.
pub fn contains_absent(value: &Value) -> bool {
    match value {
        Value::Absent => true,
        Value::Array(items) => items.iter().any(contains_absent),
        Value::Object(entries) => entries.values().any(contains_absent),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_preserved() {
        let input = Value::object([("a", Value::Null), ("b", Value::Absent)]);
        assert_eq!(clean(input), Value::object([("a", Value::Null)]));
    }

    #[test]
    fn test_array_is_compacted_in_order() {
        let input = Value::Array(vec![
            Value::Integer(1),
            Value::Absent,
            Value::Integer(2),
            Value::Absent,
            Value::Integer(3),
        ]);
        assert_eq!(clean(input), Value::from(vec![1, 2, 3]));
    }

    #[test]
    fn test_emptied_object_is_kept() {
        let input = Value::object([("a", Value::object([("b", Value::Absent)]))]);
        assert_eq!(clean(input), Value::object([("a", Value::empty_object())]));
    }

    #[test]
    fn test_emptied_object_inside_array_is_kept() {
        let input = Value::Array(vec![
            Value::object([("gone", Value::Absent)]),
            Value::Absent,
            Value::Array(vec![Value::Absent]),
        ]);
        assert_eq!(
            clean(input),
            Value::Array(vec![Value::empty_object(), Value::Array(vec![])])
        );
    }

    #[test]
    fn test_scalars_pass_through() {
        for scalar in [
            Value::Null,
            Value::Boolean(false),
            Value::Integer(0),
            Value::Float(1.5),
            Value::from(""),
            Value::Absent,
        ] {
            assert_eq!(clean(scalar.clone()), scalar);
        }
    }

    #[test]
    fn test_deep_nesting() {
        let mut value = Value::object([("leaf", Value::Absent), ("keep", Value::from(1))]);
        for depth in 0..200 {
            value = Value::object([
                (format!("level{depth}"), value),
                ("skip".to_string(), Value::Absent),
            ]);
        }

        let cleaned = clean(value);
        assert!(!contains_absent(&cleaned));
        assert_eq!(clean(cleaned.clone()), cleaned);
    }

    #[test]
    fn test_json_input_is_unchanged() {
        let input = Value::from(json!({"a": [1, {"b": null}], "c": {"d": "x"}}));
        assert_eq!(clean(input.clone()), input);
    }

    #[test]
    fn test_contains_absent() {
        assert!(contains_absent(&Value::Absent));
        assert!(contains_absent(&Value::Array(vec![
            Value::from(1),
            Value::object([("x", Value::Absent)]),
        ])));
        assert!(!contains_absent(&Value::object([("x", Value::Null)])));
    }
}
