// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;
use crate::core::{CapturedRequest, CapturedResponse};
use crate::redact::REDACTED;
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde_json::json;
use std::time::{Duration, Instant};

fn request(raw_url: &str) -> CapturedRequest {
    let mut headers = HeaderValues::new();
    headers.insert("authorization".to_string(), vec!["Bearer t".to_string()]);
    headers.insert("x-api-key".to_string(), vec!["k".to_string()]);
    headers.insert("content-type".to_string(), vec!["application/json".to_string()]);

    CapturedRequest {
        method: "POST".to_string(),
        host: "localhost:8080".to_string(),
        raw_url: raw_url.to_string(),
        referer: "https://example.com".to_string(),
        proto_major: 1,
        proto_minor: 1,
        headers,
        body: Bytes::from_static(br#"{"name":"ada","password":"p"}"#),
    }
}

fn response() -> CapturedResponse {
    let mut headers = HeaderValues::new();
    headers.insert("x-secret".to_string(), vec!["s1".to_string(), "s2".to_string()]);
    CapturedResponse {
        status_code: 201,
        headers,
        body: Bytes::from_static(br#"{"status":"created","id":7}"#),
    }
}

fn config() -> ClientConfig {
    ClientConfig {
        redact_headers: vec!["X-Secret".to_string(), "X-API-KEY".to_string()],
        redact_request_body: vec!["$.password".to_string()],
        redact_response_body: vec!["$.status".to_string()],
        tags: vec!["prod".to_string()],
        service_version: Some("2.1.0".to_string()),
        ..ClientConfig::default()
    }
}

#[test]
fn test_missing_request_gives_empty_payload() {
    let exchange = CapturedExchange::new(None, SdkType::Native);
    let cfg = ClientConfig {
        debug: true,
        ..ClientConfig::default()
    };
    let payload = build_payload(exchange, &cfg, "proj");

    assert!(payload.is_empty());
    assert_eq!(payload, Payload::default());
}

#[test]
fn test_full_payload() {
    let parent = Uuid::new_v4();
    let exchange = CapturedExchange::new(Some(request("/users/42?tag=a&tag=b&q=hello+world%21")), SdkType::Native)
        .with_response(response())
        .with_route(
            Some("/users/{id}".to_string()),
            BTreeMap::from([("id".to_string(), "42".to_string())]),
        )
        .with_parent(Some(parent));
    let msg_id = exchange.msg_id;

    let payload = build_payload(exchange, &config(), "proj-1");
    assert!(!payload.is_empty());

    assert_eq!(payload.method, "POST");
    assert_eq!(payload.host, "localhost:8080");
    assert_eq!(payload.raw_url, "/users/42?tag=a&tag=b&q=hello+world%21");
    assert_eq!(payload.url_path, "/users/{id}");
    assert_eq!(payload.path_params["id"], "42");
    assert_eq!(payload.project_id, "proj-1");
    assert_eq!(payload.status_code, 201);
    assert_eq!(payload.query_params["tag"], vec!["a", "b"]);
    assert_eq!(payload.query_params["q"], vec!["hello world!"]);
    assert_eq!(payload.msg_id, msg_id);
    assert_eq!(payload.parent_id, Some(parent));
    assert_eq!(payload.service_version.as_deref(), Some("2.1.0"));
    assert_eq!(payload.tags, vec!["prod"]);

    assert_eq!(payload.request_headers["authorization"], vec![REDACTED]);
    assert_eq!(payload.request_headers["x-api-key"], vec![REDACTED]);
    assert_eq!(payload.request_headers["content-type"], vec!["application/json"]);
    assert_eq!(payload.response_headers["x-secret"], vec![REDACTED]);

    let req_body: serde_json::Value = serde_json::from_slice(&payload.request_body).unwrap();
    assert_eq!(req_body, json!({"name": "ada", "password": REDACTED}));
    let resp_body: serde_json::Value = serde_json::from_slice(&payload.response_body).unwrap();
    assert_eq!(resp_body, json!({"status": REDACTED, "id": 7}));
}

#[test]
fn test_url_path_falls_back_to_literal_path() {
    let exchange = CapturedExchange::new(Some(request("/orders/9?expand=true")), SdkType::Native)
        .with_route(Some(String::new()), BTreeMap::new());
    let payload = build_payload(exchange, &ClientConfig::default(), "");
    assert_eq!(payload.url_path, "/orders/9");
    assert!(payload.service_version.is_none());
}

#[test]
fn test_duration_covers_handler_time() {
    let started = Instant::now();
    std::thread::sleep(Duration::from_millis(50));
    let exchange = CapturedExchange::new(Some(request("/")), SdkType::Native).with_started_at(started);

    let payload = build_payload(exchange, &ClientConfig::default(), "");
    assert!(payload.duration >= 50_000_000, "duration {}", payload.duration);
}

#[test]
fn test_wire_format() {
    let exchange = CapturedExchange::new(Some(request("/a?b=c")), SdkType::Outgoing).with_response(response());
    let payload = build_payload(exchange, &ClientConfig::default(), "p");
    let value = serde_json::to_value(&payload).unwrap();
    let object = value.as_object().unwrap();

    for key in [
        "timestamp",
        "request_headers",
        "query_params",
        "path_params",
        "response_headers",
        "method",
        "sdk_type",
        "host",
        "raw_url",
        "referer",
        "project_id",
        "url_path",
        "response_body",
        "request_body",
        "proto_minor",
        "proto_major",
        "status_code",
        "duration",
        "errors",
        "tags",
        "msg_id",
    ] {
        assert!(object.contains_key(key), "missing {key}");
    }
    assert!(!object.contains_key("service_version"));
    assert!(!object.contains_key("parent_id"));
    assert_eq!(object["sdk_type"], "outgoing");

    let encoded = object["response_body"].as_str().unwrap();
    let decoded = STANDARD.decode(encoded).unwrap();
    let body: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
    assert_eq!(body, json!({"status": "created", "id": 7}));

    let back: Payload = serde_json::from_value(value).unwrap();
    assert_eq!(back, payload);
}

#[test]
fn test_empty_bodies_normalize_to_null() {
    let mut req = request("/");
    req.body = Bytes::new();
    let exchange = CapturedExchange::new(Some(req), SdkType::Native);
    let payload = build_payload(exchange, &ClientConfig::default(), "");
    assert_eq!(payload.request_body, b"null");
    assert_eq!(payload.response_body, b"null");
}

#[test]
fn test_parse_query_edge_cases() {
    assert!(parse_query("/no-query").is_empty());
    assert!(parse_query("/empty?").is_empty());

    let params = parse_query("/x?flag&a=1&&a=%ZZ#frag");
    assert_eq!(params["flag"], vec![""]);
    assert_eq!(params["a"], vec!["1", "%ZZ"]);

    assert_eq!(path_of("/p?x#y"), "/p");
    assert_eq!(path_of("/p#y"), "/p");
}

#[test]
fn test_parse_query_form_decoding() {
    let params = parse_query("/s?first+name=J%C3%BCrgen&k%26=v%3D1&list=a&list=b%20c");
    assert_eq!(params["first name"], vec!["Jürgen"]);
    assert_eq!(params["k&"], vec!["v=1"]);
    assert_eq!(params["list"], vec!["a", "b c"]);
}
