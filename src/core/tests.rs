// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;
use crate::reporting::build_error;
use std::io;

#[test]
fn test_sdk_type_tags() {
    let all = [
        (SdkType::Native, "native"),
        (SdkType::Gin, "gin"),
        (SdkType::Echo, "echo"),
        (SdkType::Chi, "chi"),
        (SdkType::Fiber, "fiber"),
        (SdkType::Gorilla, "gorilla"),
        (SdkType::Outgoing, "outgoing"),
    ];
    for (sdk_type, tag) in all {
        assert_eq!(sdk_type.to_string(), tag);
        assert_eq!(serde_json::to_value(sdk_type).unwrap(), serde_json::json!(tag));
    }
    assert_eq!(SdkType::default(), SdkType::Native);
}

#[test]
fn test_sdk_error_display() {
    let err = SdkError::Publish("collector returned 500".to_string());
    assert_eq!(err.to_string(), "publish error: collector returned 500");

    let err: SdkError = ConfigError::NotFound("apitoolkit.api_key".to_string()).into();
    assert!(matches!(err, SdkError::Config(_)));

    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: SdkError = json_err.into();
    assert!(err.to_string().starts_with("serialization error"));
}

#[test]
fn test_capture_headers_keeps_multiple_values() {
    let mut headers = http::HeaderMap::new();
    headers.append("accept", "text/html".parse().unwrap());
    headers.append("accept", "application/json".parse().unwrap());
    headers.insert("x-api-key", "secret".parse().unwrap());

    let captured = capture_headers(&headers);
    assert_eq!(captured["accept"], vec!["text/html", "application/json"]);
    assert_eq!(captured["x-api-key"], vec!["secret"]);
}

#[test]
fn test_proto_version() {
    assert_eq!(proto_version(http::Version::HTTP_10), (1, 0));
    assert_eq!(proto_version(http::Version::HTTP_11), (1, 1));
    assert_eq!(proto_version(http::Version::HTTP_2), (2, 0));
}

#[test]
fn test_exchange_builder() {
    let parent = Uuid::new_v4();
    let exchange = CapturedExchange::new(None, SdkType::Outgoing)
        .with_parent(Some(parent))
        .with_response(CapturedResponse::unavailable());

    assert!(exchange.request.is_none());
    assert_eq!(exchange.parent_id, Some(parent));
    assert_eq!(exchange.response.status_code, 503);
    assert_ne!(exchange.msg_id, parent);
}

#[test]
fn test_error_list_shared_between_clones() {
    let scope = RequestScope::new();
    let handle = scope.error_list().clone();

    handle.push(build_error(&io::Error::other("first")));
    scope.error_list().push(build_error(&io::Error::other("second")));

    assert_eq!(scope.error_list().len(), 2);
    let records = handle.snapshot();
    assert_eq!(records[0].message, "first");
    assert_eq!(records[1].message, "second");

    let drained = scope.error_list().take();
    assert_eq!(drained.len(), 2);
    assert!(handle.is_empty());
}

#[test]
fn test_error_list_concurrent_push() {
    let list = ErrorList::new();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let list = list.clone();
            std::thread::spawn(move || list.push(build_error(&io::Error::other(format!("e{i}")))))
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(list.len(), 8);
}

#[test]
fn test_scoped_context_lookups() {
    let scope = RequestScope::new();
    let id = scope.msg_id();

    assert_eq!(scope.request_scope().map(|s| s.msg_id()), Some(id));
    assert!(None::<&RequestScope>.request_scope().is_none());
    assert_eq!(Some(&scope).request_scope().map(|s| s.msg_id()), Some(id));

    let mut req = http::Request::new(());
    assert!(req.request_scope().is_none());
    req.extensions_mut().insert(scope.clone());
    assert_eq!(req.request_scope().map(|s| s.msg_id()), Some(id));
    assert_eq!(req.extensions().request_scope().map(|s| s.msg_id()), Some(id));
    assert!(scope.client().is_none());
}
