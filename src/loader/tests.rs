// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;
use crate::publish::MemoryPublisher;
use serde_json::{Value, json};
use std::io::Write;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Mock config provider for testing
#[derive(Debug)]
struct MockConfigProvider {
    data: Value,
}

impl MockConfigProvider {
    fn new(data: Value) -> Self {
        Self { data }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        key.split('.').try_fold(&self.data, |v, part| v.get(part))
    }
}

impl ConfigProvider for MockConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.lookup(key).cloned())
    }
}

#[test]
fn test_resolve_defaults_without_providers() {
    let config = ApiToolkitLoader::new().resolve_config().unwrap();
    assert_eq!(config.root_url, crate::config::DEFAULT_ROOT_URL);
    assert!(config.api_key.is_none());
}

#[test]
fn test_later_provider_overrides_earlier() {
    let config = ApiToolkitLoader::new()
        .with_provider(MockConfigProvider::new(json!({
            "apitoolkit": {"project_id": "p1", "tags": ["a"]}
        })))
        .with_provider(MockConfigProvider::new(json!({
            "apitoolkit": {"project_id": "p2"}
        })))
        .resolve_config()
        .unwrap();

    assert_eq!(config.project_id.as_deref(), Some("p2"));
    assert_eq!(config.tags, vec!["a"]);
}

#[test]
fn test_provider_overrides_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"apitoolkit": {{"debug": true, "project_id": "from-file"}}}}"#).unwrap();

    let config = ApiToolkitLoader::new()
        .with_config_file(file.path().to_str().unwrap())
        .with_provider(MockConfigProvider::new(json!({
            "apitoolkit": {"project_id": "from-provider"}
        })))
        .resolve_config()
        .unwrap();

    assert!(config.debug);
    assert_eq!(config.project_id.as_deref(), Some("from-provider"));
}

#[test]
fn test_missing_file_is_an_error() {
    let err = ApiToolkitLoader::new()
        .with_config_file("/definitely/not/here/apitoolkit.toml")
        .resolve_config()
        .unwrap_err();
    assert!(matches!(err, LoaderError::ConfigError(_)));
}

#[test]
fn test_explicit_client_config_wins() {
    let explicit = ClientConfig {
        project_id: Some("explicit".to_string()),
        ..ClientConfig::default()
    };
    let config = ApiToolkitLoader::new()
        .with_provider(MockConfigProvider::new(json!({
            "apitoolkit": {"project_id": "ignored"}
        })))
        .with_client_config(explicit)
        .resolve_config()
        .unwrap();
    assert_eq!(config.project_id.as_deref(), Some("explicit"));
}

#[tokio::test]
async fn test_build_uses_custom_publisher() {
    let publisher = MemoryPublisher::new();
    let client = ApiToolkitLoader::new()
        .without_logging()
        .with_publisher(publisher.clone())
        .build()
        .await
        .unwrap();

    assert_eq!(client.publisher().name(), "memory");
}

#[tokio::test]
async fn test_build_picks_log_publisher_without_key() {
    let client = ApiToolkitLoader::new()
        .with_client_config(ClientConfig::default())
        .build()
        .await
        .unwrap();
    assert_eq!(client.publisher().name(), "log");
}

#[tokio::test]
async fn test_build_picks_http_publisher_with_key() {
    let client = ApiToolkitLoader::new()
        .without_logging()
        .without_client_metadata()
        .with_provider(MockConfigProvider::new(json!({
            "apitoolkit": {"api_key": "k", "root_url": "http://127.0.0.1:9"}
        })))
        .build()
        .await
        .unwrap();
    assert_eq!(client.publisher().name(), "http");
    assert_eq!(client.config().api_key.as_deref(), Some("k"));
    assert!(client.metadata().is_none());
}

#[tokio::test]
async fn test_build_resolves_project_from_metadata() {
    let collector = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/client_metadata"))
        .and(header("authorization", "Bearer k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "project_id": "00000000-0000-0000-0000-000000000001",
            "topic_id": "apitoolkit-go-client"
        })))
        .expect(1)
        .mount(&collector)
        .await;

    let client = ApiToolkitLoader::new()
        .without_logging()
        .with_provider(MockConfigProvider::new(json!({
            "apitoolkit": {"api_key": "k", "root_url": collector.uri()}
        })))
        .build()
        .await
        .unwrap();

    assert_eq!(
        client.config().project_id(),
        Some("00000000-0000-0000-0000-000000000001")
    );
    assert_eq!(client.metadata().map(|m| m.topic_id.as_str()), Some("apitoolkit-go-client"));
}

#[tokio::test]
async fn test_build_fails_when_metadata_is_rejected() {
    let collector = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/client_metadata"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&collector)
        .await;

    let err = ApiToolkitLoader::new()
        .without_logging()
        .with_provider(MockConfigProvider::new(json!({
            "apitoolkit": {"api_key": "bad", "root_url": collector.uri()}
        })))
        .build()
        .await
        .unwrap_err();

    match err {
        LoaderError::SdkError(SdkError::Metadata(message)) => {
            assert!(message.contains("401"), "{message}");
            assert!(message.contains("invalid api key"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
