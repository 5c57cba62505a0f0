// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;
use serde_json::json;

fn parsed(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

fn headers(pairs: &[(&str, &[&str])]) -> HeaderValues {
    pairs
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

#[test]
fn test_redacts_nested_leaf() {
    let body = br#"{"user": {"name": "ada", "password": "hunter2"}}"#;
    let out = redact_body(body, &["$.user.password"]);
    assert_eq!(
        parsed(&out),
        json!({"user": {"name": "ada", "password": "[CLIENT_REDACTED]"}})
    );
}

#[test]
fn test_non_leaf_replaces_subtree() {
    let body = br#"{"card": {"pan": "4111", "cvv": "123"}, "amount": 10}"#;
    let out = redact_body(body, &["$.card"]);
    assert_eq!(parsed(&out), json!({"card": "[CLIENT_REDACTED]", "amount": 10}));
}

#[test]
fn test_redaction_is_idempotent() {
    let body = br#"{"a": {"b": [{"c": 1}, {"c": 2}]}, "password": "x"}"#;
    let paths = ["$.a.b[*].c", "$..password"];
    let once = redact_body(body, &paths);
    let twice = redact_body(&once, &paths);
    assert_eq!(parsed(&once), parsed(&twice));
}

#[test]
fn test_no_paths_round_trips() {
    let body = br#"{ "b": [1, 2, {"c": null}],   "a": "text" }"#;
    let out = redact_body::<&str>(body, &[]);
    assert_eq!(parsed(&out), parsed(body));
}

#[test]
fn test_array_wildcard() {
    let body = br#"{"a":{"b":[{"c":1},{"c":2}]}}"#;
    let out = redact_body(body, &["$.a.b[*].c"]);
    assert_eq!(
        parsed(&out),
        json!({"a": {"b": [{"c": "[CLIENT_REDACTED]"}, {"c": "[CLIENT_REDACTED]"}]}})
    );
}

#[test]
fn test_invalid_json_becomes_null() {
    assert_eq!(redact_body(b"not json", &["$.a"]), b"null");
    assert_eq!(redact_body::<&str>(b"", &[]), b"null");
}

#[test]
fn test_bad_and_missing_paths_are_ignored() {
    let body = br#"{"a": 1}"#;
    let out = redact_body(body, &["$[unclosed", "$.missing.deep", "$.a"]);
    assert_eq!(parsed(&out), json!({"a": "[CLIENT_REDACTED]"}));
}

#[test]
fn test_header_redaction_is_case_exact() {
    let input = headers(&[
        ("X-Api-Key", &["k1"]),
        ("x-api-key", &["k2"]),
        ("accept", &["*/*"]),
    ]);

    let out = redact_headers(input, &["x-api-key"]);
    assert_eq!(out["x-api-key"], vec![REDACTED]);
    assert_eq!(out["X-Api-Key"], vec!["k1"]);
    assert_eq!(out["accept"], vec!["*/*"]);
}

#[test]
fn test_header_redaction_collapses_values() {
    let input = headers(&[("cookies", &["a=1", "b=2"]), ("authorization", &["Bearer t"])]);
    let out = redact_headers(input, &["cookies", "authorization", "password"]);
    assert_eq!(out["cookies"], vec![REDACTED]);
    assert_eq!(out["authorization"], vec![REDACTED]);
    assert!(!out.contains_key("password"));
}

#[test]
fn test_slice_redacts_leading_items() {
    let body = br#"{"list": [1, 2, 3], "other": "kept"}"#;
    let out = redact_body(body, &["$.list[0:2]"]);
    assert_eq!(
        parsed(&out),
        json!({"list": [REDACTED, REDACTED, 3], "other": "kept"})
    );
}

#[test]
fn test_index_and_key_unions() {
    let body = br#"{"list": [1, 2, 3], "card": {"pan": "4111", "cvv": "123", "brand": "visa"}}"#;
    let out = redact_body(body, &["$.list[0,1]", "$.card['pan','cvv']"]);
    assert_eq!(
        parsed(&out),
        json!({
            "list": [REDACTED, REDACTED, 3],
            "card": {"pan": REDACTED, "cvv": REDACTED, "brand": "visa"}
        })
    );
}

#[test]
fn test_filter_redacts_matching_elements_only() {
    let body = br#"{"a": {"b": [{"c": 1, "d": "x"}, {"c": 2, "d": "y"}]}}"#;
    let out = redact_body(body, &["$.a.b[?(@.c==1)].c"]);
    assert_eq!(
        parsed(&out),
        json!({"a": {"b": [{"c": REDACTED, "d": "x"}, {"c": 2, "d": "y"}]}})
    );
}

#[test]
fn test_filter_on_string_field() {
    let body = br#"{"accounts": [{"kind": "card", "number": "4111"}, {"kind": "iban", "number": "DE89"}]}"#;
    let out = redact_body(body, &["$.accounts[?(@.kind == 'card')].number"]);
    let out = parsed(&out);
    assert_eq!(out["accounts"][0]["number"], json!(REDACTED));
    assert_eq!(out["accounts"][1]["number"], json!("DE89"));
}
