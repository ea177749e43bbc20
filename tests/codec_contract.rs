//! Purpose: Lock codec contract expectations with corpus coverage.
//! Exports: Integration tests only.
//! Role: Catch drift in canonical spacing, null/blank policy, and fallback order.
//! Invariants: Canonical text stays byte-stable for representative values.
//! Invariants: Every value that validates must round-trip decode(encode(v)) == v.

use std::sync::Arc;

use marlite::api::{Datum, FallbackRegistry, FallbackRule, JsonCodec};
use serde_json::{Value, json};

fn codec(nullable: bool, blank: bool) -> JsonCodec {
    JsonCodec::new(nullable, blank, Arc::new(FallbackRegistry::with_defaults()))
}

#[test]
fn corpus_canonical_forms_are_stable() {
    let cases = [
        (json!(null), "null"),
        (json!(true), "true"),
        (json!(0), "0"),
        (json!("text"), r#""text""#),
        (json!([]), "[]"),
        (json!({}), "{}"),
        (json!([1, 2, 3]), "[1, 2, 3]"),
        (json!({"a": 1, "b": [1, 2, 3]}), r#"{"a": 1, "b": [1, 2, 3]}"#),
        (
            json!({"nested": {"k": "v"}, "arr": [{"x": true}]}),
            r#"{"nested": {"k": "v"}, "arr": [{"x": true}]}"#,
        ),
    ];

    let codec = codec(true, false);
    for (value, expected) in cases {
        assert_eq!(codec.encode_value(&value), expected);
    }
}

#[test]
fn corpus_values_round_trip() {
    let corpus = [
        json!({"a": 1, "b": "ok"}),
        json!([1, 2, 3, {"x": true}]),
        json!({"nested": {"arr": [{"k": "v"}]}}),
        json!({"unicode": "\u{2603}"}),
        json!({"big": 18446744073709551615u64, "neg": -9007199254740993i64}),
    ];

    let codec = codec(true, false);
    for value in corpus {
        let encoded = codec.encode(&Datum::from(value.clone())).expect("encode");
        let decoded = codec.decode(&encoded).expect("decode");
        assert_eq!(decoded, value, "round trip mismatch for {encoded}");
    }
}

#[test]
fn mapping_key_order_is_preserved() {
    let codec = codec(true, false);
    let decoded = codec.decode(r#"{"z": 1, "a": 2, "m": 3}"#).expect("decode");
    assert_eq!(codec.encode_value(&decoded), r#"{"z": 1, "a": 2, "m": 3}"#);
}

#[test]
fn blank_not_null_policy_round_trips_empty_text() {
    // encode(null) -> "" and decode("") -> "" under blank-allowed-not-null.
    let codec = codec(false, true);
    assert_eq!(codec.encode(&Datum::from(Value::Null)).expect("encode"), "");
    assert_eq!(codec.decode("").expect("decode"), json!(""));
}

#[test]
fn nullable_policy_decodes_empty_text_to_null() {
    let codec = codec(true, false);
    assert_eq!(codec.decode("").expect("decode"), Value::Null);
    assert_eq!(
        codec.encode(&Datum::from(Value::Null)).expect("encode"),
        "null"
    );
}

#[test]
fn first_registered_fallback_converter_wins() {
    let registry = FallbackRegistry::new(vec![
        FallbackRule::new(
            "broad-first",
            |_| true,
            |_| Ok(json!("from-first")),
        ),
        FallbackRule::for_type::<u32, _>("typed-second", |_| Ok(json!("from-second"))),
    ]);
    let codec = JsonCodec::new(false, false, Arc::new(registry));
    let encoded = codec.encode(&Datum::foreign(7u32)).expect("encode");
    assert_eq!(encoded, r#""from-first""#);
}

#[test]
fn controlled_registry_rejects_unknown_leaves() {
    let codec = JsonCodec::new(false, false, Arc::new(FallbackRegistry::empty()));
    let err = codec.encode(&Datum::foreign(7u32)).unwrap_err();
    assert_eq!(err.kind(), marlite::api::ErrorKind::UnsupportedType);
}
