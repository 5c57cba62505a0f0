// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The SDK client: configuration plus a publisher, shared by the inbound
//! middleware and the outgoing interceptor.

mod metadata;


pub use metadata::{ClientMetadata, METADATA_PATH, fetch_client_metadata};

use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::core::{CapturedExchange, RequestScope, SdkError};
use crate::debug_fmt;
use crate::middleware::Middleware;
use crate::outgoing::{CaptureMiddleware, OutgoingClient};
use crate::payload::{Payload, build_payload};
use crate::publish::{HttpPublisher, LogPublisher, Publisher};

/// Cheaply cloneable handle; clones share configuration and publisher.
#[derive(Debug, Clone)]
pub struct ApiToolkit {
    config: Arc<ClientConfig>,
    publisher: Arc<dyn Publisher>,
    metadata: Option<Arc<ClientMetadata>>,
}

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

impl ApiToolkit {
    pub fn new(config: ClientConfig, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            config: Arc::new(config),
            publisher,
            metadata: None,
        }
    }

    /// Pick a publisher from the configuration: HTTP when an API key is
    /// set, the log otherwise.
    pub fn from_config(config: ClientConfig) -> Result<Self, SdkError> {
        let publisher: Arc<dyn Publisher> = match config.api_key.clone().filter(|k| !k.is_empty()) {
            Some(key) => Arc::new(HttpPublisher::new(&config.root_url, Some(key))?),
            None => Arc::new(LogPublisher),
        };
        Ok(Self::new(config, publisher))
    }

    /// Fetch the project metadata for the configured API key.
    ///
    /// Without a key this is a no-op.  A configured `project_id` is kept;
    /// otherwise the collector's is used.
    pub async fn resolve_metadata(self) -> Result<Self, SdkError> {
        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Ok(self);
        };

        let http = reqwest::Client::builder().timeout(METADATA_TIMEOUT).build()?;
        let metadata = fetch_client_metadata(&http, &self.config.root_url, api_key).await?;
        if self.config.debug {
            debug_fmt!("client", "client metadata resolved for project {}", metadata.project_id);
        }
        Ok(self.with_metadata(metadata))
    }

    /// Attach already known metadata.
    pub fn with_metadata(mut self, metadata: ClientMetadata) -> Self {
        if self.config.project_id().is_none() && !metadata.project_id.is_empty() {
            let mut config = (*self.config).clone();
            config.project_id = Some(metadata.project_id.clone());
            self.config = Arc::new(config);
        }
        self.metadata = Some(Arc::new(metadata));
        self
    }

    pub fn metadata(&self) -> Option<&ClientMetadata> {
        self.metadata.as_deref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn publisher(&self) -> &Arc<dyn Publisher> {
        &self.publisher
    }

    /// Build the payload for `exchange` with this client's settings.
    pub fn build_payload(&self, exchange: CapturedExchange) -> Payload {
        build_payload(exchange, &self.config, self.config.project_id().unwrap_or_default())
    }

    /// Publish `payload`, emitting a span when tracing is enabled.
    ///
    /// Empty payloads are skipped unless `publish_empty_payloads` is set.
    pub async fn publish(&self, payload: &Payload) -> Result<(), SdkError> {
        if payload.is_empty() && !self.config.publish_empty_payloads {
            if self.config.debug {
                debug_fmt!("client", "skipping empty payload");
            }
            return Ok(());
        }

        if self.config.verbose_debug {
            match serde_json::to_string_pretty(payload) {
                Ok(json) => debug_fmt!("client", "publishing payload {}", json),
                Err(e) => debug_fmt!("client", "payload is not serializable: {}", e),
            }
        }

        #[cfg(feature = "opentelemetry")]
        if self.tracing_enabled() {
            crate::opentelemetry::create_span(payload, &self.config, None);
        }

        self.publisher.publish(payload).await
    }

    /// Publish, and report a failure against `scope` instead of returning it.
    pub(crate) async fn publish_reporting(&self, payload: &Payload, scope: Option<&RequestScope>) {
        if let Err(e) = self.publish(payload).await {
            if self.config.debug {
                debug_fmt!("client", "unable to publish payload via {}: {}", self.publisher.name(), e);
            }
            crate::reporting::report_error(&scope, &e);
        }
    }

    #[cfg(feature = "opentelemetry")]
    fn tracing_enabled(&self) -> bool {
        self.config
            .opentelemetry
            .as_ref()
            .is_some_and(|otel| otel.traces_enabled)
    }

    /// Inbound middleware bound to this client.
    pub fn middleware(&self) -> Middleware {
        Middleware::new(self.clone())
    }

    /// Outgoing interceptor over `http`.
    pub fn outgoing(&self, http: reqwest::Client) -> OutgoingClient {
        OutgoingClient::new(self.clone(), http)
    }

    /// Outgoing capture as a `reqwest_middleware` layer.
    pub fn capture_middleware(&self) -> CaptureMiddleware {
        CaptureMiddleware::new(self.clone())
    }
}
