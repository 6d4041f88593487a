//! Property-based tests for the pure half of the pipeline

use proptest::prelude::*;
use serde_json::{Map, Value};

use itemtrail::shared::diff::{diff, DiffNode};
use itemtrail::shared::redact::{is_truncation_marker, Redactor, REDACTED};
use itemtrail::shared::ring::{EventRing, RingBufferEntry};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-z0-9 ]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(
                prop_oneof![Just("password".to_string()), Just("token".to_string()), "[a-z]{1,8}"],
                inner,
                0..6,
            )
            .prop_map(|map| Value::Object(map.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

fn contains_sensitive_value(value: &Value, redactor: &Redactor) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(key, value)| {
            (redactor.is_sensitive_field(key) && value != &Value::String(REDACTED.to_string()))
                || contains_sensitive_value(value, redactor)
        }),
        Value::Array(items) => items.iter().any(|item| contains_sensitive_value(item, redactor)),
        _ => false,
    }
}

proptest! {
    #[test]
    fn test_diff_of_equal_values_is_empty(value in arb_json()) {
        prop_assert!(diff(&value, &value).is_none());
    }

    #[test]
    fn test_diff_detects_any_difference(a in arb_json(), b in arb_json()) {
        prop_assert_eq!(diff(&a, &b).is_none(), a == b);
    }

    #[test]
    fn test_nested_diff_is_never_empty(a in arb_json(), b in arb_json()) {
        fn check(node: &DiffNode) -> bool {
            match node.children() {
                Some(children) => !children.is_empty() && children.values().all(check),
                None => true,
            }
        }
        if let Some(node) = diff(&a, &b) {
            prop_assert!(check(&node));
        }
    }

    #[test]
    fn test_sanitize_is_idempotent(value in arb_json()) {
        let redactor = Redactor::new(["password", "token"], ["authorization"], 200, 400);
        let once = redactor.sanitize_body(Some(&value));
        let twice = redactor.sanitize_body(once.as_ref());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_sanitized_output_has_no_sensitive_values(value in arb_json()) {
        let redactor = Redactor::new(["password", "token"], ["authorization"], usize::MAX, usize::MAX);
        let sanitized = redactor.sanitize_body(Some(&value)).unwrap();
        prop_assert!(!contains_sensitive_value(&sanitized, &redactor));
    }

    #[test]
    fn test_sanitized_output_is_bounded(value in arb_json()) {
        let redactor = Redactor::new(["password"], ["authorization"], 64, 64);
        let sanitized = redactor.sanitize_body(Some(&value)).unwrap();
        let size = serde_json::to_string(&sanitized).unwrap().len();
        prop_assert!(size <= 64 || is_truncation_marker(&sanitized));
    }

    #[test]
    fn test_ring_never_exceeds_capacity(capacity in 0usize..16, appends in 0usize..64) {
        let ring = EventRing::new(capacity);
        for i in 0..appends {
            ring.append(RingBufferEntry::new("u", "api_write_request", Value::from(i)));
        }
        prop_assert_eq!(ring.len(), appends.min(capacity));

        let recent = ring.recent(usize::MAX);
        prop_assert_eq!(recent.len(), appends.min(capacity));
        if let Some(newest) = recent.first() {
            prop_assert_eq!(&newest.properties, &Value::from(appends - 1));
        }
    }
}
