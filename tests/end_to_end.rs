// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end tests for the inbound middleware.

use apitoolkit::{BoxError, ClientConfig, REDACTED, SdkType, report_error};
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;

mod common;
use common::{init_test_logging, json_post, memory_client, request_document, response_document};

fn redacting_config() -> ClientConfig {
    ClientConfig {
        redact_headers: vec!["X-Api-Key".to_string(), "Accept-Encoding".to_string()],
        redact_response_body: vec!["$.status".to_string(), "$.data.count".to_string()],
        project_id: Some("project-1".to_string()),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn test_post_slug_exchange_is_captured_and_redacted() {
    init_test_logging();
    let (client, publisher) = memory_client(redacting_config());
    let middleware = client.middleware().with_route("/{slug}/test").unwrap();

    let request = json_post("/slug-value/test?param1=abc&param2=123", &request_document());
    let response = middleware
        .handle(request, |req: Request<Full<Bytes>>| async move {
            let body = req.into_body().collect().await?.to_bytes();
            let received: Value = serde_json::from_slice(&body)?;
            assert_eq!(received, request_document());

            let out = serde_json::to_vec(&response_document())?;
            let response = Response::builder()
                .status(StatusCode::ACCEPTED)
                .header("content-type", "application/json")
                .header("x-api-key", "applicationKey")
                .body(Full::new(Bytes::from(out)))?;
            Ok::<_, BoxError>(response)
        })
        .await;

    // The caller sees the unredacted response.
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), response_document());

    let payloads = publisher.payloads();
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];

    assert_eq!(payload.method, "POST");
    assert_eq!(payload.url_path, "/{slug}/test");
    assert_eq!(payload.raw_url, "/slug-value/test?param1=abc&param2=123");
    assert_eq!(payload.status_code, 202);
    assert_eq!(payload.sdk_type, SdkType::Native);
    assert_eq!(payload.project_id, "project-1");
    assert_eq!(payload.host, "service.local");
    assert!(payload.duration > 0);
    assert!(payload.parent_id.is_none());

    let mut expected_params = BTreeMap::new();
    expected_params.insert("slug".to_string(), "slug-value".to_string());
    assert_eq!(payload.path_params, expected_params);
    assert_eq!(payload.query_params["param1"], vec!["abc"]);
    assert_eq!(payload.query_params["param2"], vec!["123"]);

    assert_eq!(payload.request_headers["x-api-key"], vec![REDACTED]);
    assert_eq!(payload.request_headers["content-type"], vec!["application/json"]);
    assert_eq!(payload.response_headers["x-api-key"], vec![REDACTED]);

    let request_body: Value = serde_json::from_slice(&payload.request_body).unwrap();
    assert_eq!(request_body, request_document());

    let response_body: Value = serde_json::from_slice(&payload.response_body).unwrap();
    assert_eq!(
        response_body,
        json!({
            "status": REDACTED,
            "data": {"message": "hello world", "count": REDACTED}
        })
    );
}

#[tokio::test]
async fn test_duration_covers_handler_time() {
    let (client, publisher) = memory_client(ClientConfig::default());
    let middleware = client.middleware();

    middleware
        .handle(json_post("/slow", &json!({})), |_req| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, BoxError>(Response::new(Full::new(Bytes::new())))
        })
        .await;

    let payloads = publisher.payloads();
    assert_eq!(payloads.len(), 1);
    assert!(payloads[0].duration >= 50_000_000, "duration was {}", payloads[0].duration);
    // Unmatched routes fall back to the raw path.
    assert_eq!(payloads[0].url_path, "/slow");
}

#[tokio::test]
async fn test_errors_reported_by_handler_are_attached_in_order() {
    let (client, publisher) = memory_client(ClientConfig::default());
    let middleware = client.middleware();

    let response = middleware
        .handle(json_post("/report", &json!({})), |req| async move {
            report_error(&req, &std::io::Error::other("first failure"));
            report_error(&req, &std::io::Error::other("second failure"));
            Ok::<_, BoxError>(Response::new(Full::new(Bytes::from_static(b"ok"))))
        })
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let payload = &publisher.payloads()[0];
    assert_eq!(payload.errors.len(), 2);
    assert_eq!(payload.errors[0].message, "first failure");
    assert_eq!(payload.errors[1].message, "second failure");
    assert_eq!(payload.errors[0].root_error_type, "std::io::Error");
}

#[tokio::test]
async fn test_handler_panic_becomes_500_and_is_published() {
    let (client, publisher) = memory_client(ClientConfig::default());
    let middleware = client.middleware();

    let response = middleware
        .handle(json_post("/boom", &json!({})), |_req| async move {
            if true {
                panic!("handler exploded");
            }
            Ok::<_, BoxError>(Response::new(Full::new(Bytes::new())))
        })
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = &publisher.payloads()[0];
    assert_eq!(payload.status_code, 500);
    assert_eq!(payload.errors.len(), 1);
    assert_eq!(payload.errors[0].error_type, "panic");
    assert!(payload.errors[0].message.contains("handler exploded"));
}

#[tokio::test]
async fn test_payload_wire_format() {
    let (client, publisher) = memory_client(redacting_config());
    client
        .middleware()
        .handle(json_post("/wire?x=1", &json!({"a": 1})), |_req| async move {
            Ok::<_, BoxError>(Response::new(Full::new(Bytes::from_static(b"{\"status\":1}"))))
        })
        .await;

    let wire = serde_json::to_value(&publisher.payloads()[0]).unwrap();
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
        assert!(wire.get(key).is_some(), "missing wire field {key}");
    }
    assert!(wire.get("parent_id").is_none());
    assert_eq!(wire["sdk_type"], json!("native"));
    // base64 of {"status":"[CLIENT_REDACTED]"}
    assert_eq!(
        wire["response_body"],
        json!("eyJzdGF0dXMiOiJbQ0xJRU5UX1JFREFDVEVEXSJ9")
    );
}
