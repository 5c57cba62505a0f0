// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Publishers deliver finished payloads somewhere.
//!
//! The SDK calls [`Publisher::publish`] exactly once per completed
//! exchange.  Implement the trait to ship payloads to a queue or any other
//! transport; the built-ins cover logging, HTTP and tests.


use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::SdkError;
use crate::logging::log_with_context;
use crate::payload::Payload;

/// Delivery seam for payloads.
#[async_trait]
pub trait Publisher: Debug + Send + Sync {
    /// Deliver one payload.
    async fn publish(&self, payload: &Payload) -> Result<(), SdkError>;

    /// Name used in diagnostics.
    fn name(&self) -> &str;
}

/// Writes each payload as JSON to the log at info level.
#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, payload: &Payload) -> Result<(), SdkError> {
        let json = serde_json::to_string(payload)?;
        log_with_context(
            log::Level::Info,
            &json,
            "publish",
            &[
                ("msg_id", payload.msg_id.to_string()),
                ("status_code", payload.status_code.to_string()),
            ],
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Discards every payload.
#[derive(Debug, Default, Clone)]
pub struct NoopPublisher;

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish(&self, _payload: &Payload) -> Result<(), SdkError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Keeps payloads in memory.  Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryPublisher {
    payloads: Arc<Mutex<Vec<Payload>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads published so far, in order.
    pub fn payloads(&self) -> Vec<Payload> {
        self.payloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, payload: &Payload) -> Result<(), SdkError> {
        self.payloads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(payload.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Collector path, relative to the configured root URL.
pub const DATA_PATH: &str = "/api/data";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs payloads as JSON to the collector.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpPublisher {
    /// Publisher for `{root_url}/api/data`, authenticated with `api_key`.
    pub fn new(root_url: &str, api_key: Option<String>) -> Result<Self, SdkError> {
        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self::with_client(client, root_url, api_key))
    }

    /// Same as [`HttpPublisher::new`] with a caller supplied client.
    pub fn with_client(client: reqwest::Client, root_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", root_url.trim_end_matches('/'), DATA_PATH),
            api_key,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, payload: &Payload) -> Result<(), SdkError> {
        let mut request = self.client.post(&self.endpoint).json(payload);
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SdkError::Publish(format!(
                "collector responded with {status}: {body}"
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
