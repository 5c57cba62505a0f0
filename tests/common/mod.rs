// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common test utilities and helpers for APIToolkit SDK tests.

use apitoolkit::config::{ConfigError, ConfigProvider};
use apitoolkit::{ApiToolkit, ClientConfig, MemoryPublisher};
use bytes::Bytes;
use http::Request;
use http_body_util::Full;
use serde_json::{Value, json};
use std::sync::{Arc, Once};

static LOG_INIT: Once = Once::new();

/// Initialize test logging once per test binary.
#[allow(dead_code)]
pub fn init_test_logging() {
    LOG_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Test configuration provider backed by a JSON document.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct TestConfigProvider {
    data: Value,
    name: String,
}

#[allow(dead_code)]
impl TestConfigProvider {
    /// Create a new test config provider from a JSON configuration
    pub fn from_json(name: &str, data: Value) -> Self {
        Self {
            data,
            name: name.to_string(),
        }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        key.split('.').try_fold(&self.data, |v, part| v.get(part))
    }
}

impl ConfigProvider for TestConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.lookup(key).cloned())
    }
}

/// A client that records every payload in memory.
#[allow(dead_code)]
pub fn memory_client(config: ClientConfig) -> (ApiToolkit, MemoryPublisher) {
    let publisher = MemoryPublisher::new();
    (ApiToolkit::new(config, Arc::new(publisher.clone())), publisher)
}

/// Request body sent by the inbound tests.
#[allow(dead_code)]
pub fn request_document() -> Value {
    json!({
        "status": "request",
        "name": "Ada",
        "tags": ["a", "b"],
        "nested": {"ok": true}
    })
}

/// Response body returned by the inbound handlers.
#[allow(dead_code)]
pub fn response_document() -> Value {
    json!({
        "status": "success",
        "data": {"message": "hello world", "count": 2}
    })
}

/// `POST uri` with a JSON body and an API key header.
#[allow(dead_code)]
pub fn json_post(uri: &str, body: &Value) -> Request<Full<Bytes>> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("host", "service.local")
        .header("content-type", "application/json")
        .header("x-api-key", "past-3")
        .body(Full::new(Bytes::from(bytes)))
        .unwrap()
}
