// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outgoing request capture over `reqwest`.
//!
//! Wrap the application's `reqwest::Client` in an [`OutgoingClient`] and
//! pass it the inbound [`RequestScope`]; every call then produces a payload
//! with `sdk_type = outgoing` whose `parent_id` is the inbound `msg_id`.
//!
//! Callers already on `reqwest_middleware` can instead add a
//! [`CaptureMiddleware`] to their `ClientWithMiddleware`; the parent scope
//! then travels as a request extension.
//!
//! The response handed back is rebuilt from the captured bytes, so
//! `Response::url()` no longer reflects the requested URL.

mod layer;


pub use layer::CaptureMiddleware;

use bytes::Bytes;
use http::header::REFERER;
use std::collections::BTreeMap;
use std::error::Error;
use std::future::Future;
use std::time::Instant;

use crate::client::ApiToolkit;
use crate::config::ClientConfig;
use crate::core::{
    CapturedExchange, CapturedRequest, CapturedResponse, RequestScope, SdkError, SdkType, ScopedContext,
    capture_headers, proto_version,
};
use crate::debug_fmt;
use crate::payload::build_payload;
use crate::reporting::{build_error, report_error};

/// Capture settings shared by [`OutgoingClient`] and [`CaptureMiddleware`].
#[derive(Debug, Clone)]
struct Capture {
    client: ApiToolkit,
    redact_headers: Option<Vec<String>>,
    redact_request_body: Option<Vec<String>>,
    redact_response_body: Option<Vec<String>>,
}

impl Capture {
    fn new(client: ApiToolkit) -> Self {
        Self {
            client,
            redact_headers: None,
            redact_request_body: None,
            redact_response_body: None,
        }
    }

    /// Client configuration with the per-interceptor overrides applied.
    fn effective_config(&self) -> ClientConfig {
        let mut config = self.client.config().clone();
        if let Some(headers) = &self.redact_headers {
            config.redact_headers = headers.clone();
        }
        if let Some(paths) = &self.redact_request_body {
            config.redact_request_body = paths.clone();
        }
        if let Some(paths) = &self.redact_response_body {
            config.redact_response_body = paths.clone();
        }
        config
    }

    /// Send `request` through `send`, capture the exchange and publish it.
    ///
    /// A failed send is captured as `503`, reported to `parent` and
    /// returned unchanged.
    async fn run<F, Fut, E>(
        &self,
        parent: Option<&RequestScope>,
        request: reqwest::Request,
        send: F,
    ) -> Result<reqwest::Response, E>
    where
        F: FnOnce(reqwest::Request) -> Fut,
        Fut: Future<Output = Result<reqwest::Response, E>>,
        E: Error + 'static,
    {
        let started_at = Instant::now();
        let captured = capture_request(&request);
        let url_path = request.url().path().to_string();

        let mut errors = Vec::new();
        let (captured_response, result) = match send(request).await {
            Ok(response) => {
                let status = response.status();
                let version = response.version();
                let headers = response.headers().clone();
                let body = match response.bytes().await {
                    Ok(body) => body,
                    Err(e) => {
                        errors.push(build_error(&e));
                        Bytes::new()
                    }
                };

                let mut rebuilt = http::Response::new(body.clone());
                *rebuilt.status_mut() = status;
                *rebuilt.version_mut() = version;
                *rebuilt.headers_mut() = headers;

                let captured_response = CapturedResponse {
                    status_code: status.as_u16(),
                    headers: capture_headers(rebuilt.headers()),
                    body,
                };
                (captured_response, Ok(reqwest::Response::from(rebuilt)))
            }
            Err(e) => {
                debug_fmt!("outgoing", "request to {} failed: {}", captured.host, e);
                errors.push(build_error(&e));
                report_error(&parent, &e);
                (CapturedResponse::unavailable(), Err(e))
            }
        };

        let exchange = CapturedExchange::new(Some(captured), SdkType::Outgoing)
            .with_parent(parent.map(RequestScope::msg_id))
            .with_started_at(started_at)
            .with_response(captured_response)
            .with_route(Some(url_path), BTreeMap::new())
            .with_errors(errors);

        let config = self.effective_config();
        let payload = build_payload(exchange, &config, config.project_id().unwrap_or_default());
        self.client.publish_reporting(&payload, parent).await;

        result
    }
}

/// A `reqwest::Client` that captures every exchange it executes.
#[derive(Debug, Clone)]
pub struct OutgoingClient {
    capture: Capture,
    http: reqwest::Client,
    parent: Option<RequestScope>,
}

impl OutgoingClient {
    pub fn new(client: ApiToolkit, http: reqwest::Client) -> Self {
        Self {
            capture: Capture::new(client),
            http,
            parent: None,
        }
    }

    /// Link captured calls to the inbound exchange found in `ctx`.
    pub fn with_context<C: ScopedContext + ?Sized>(mut self, ctx: &C) -> Self {
        self.parent = ctx.request_scope().cloned();
        self
    }

    /// Header names to redact instead of the client's configured list.
    pub fn with_redact_headers(mut self, headers: Vec<String>) -> Self {
        self.capture.redact_headers = Some(headers);
        self
    }

    /// Request body paths to redact instead of the client's.
    pub fn with_redact_request_body(mut self, paths: Vec<String>) -> Self {
        self.capture.redact_request_body = Some(paths);
        self
    }

    /// Response body paths to redact instead of the client's.
    pub fn with_redact_response_body(mut self, paths: Vec<String>) -> Self {
        self.capture.redact_response_body = Some(paths);
        self
    }

    pub fn parent(&self) -> Option<&RequestScope> {
        self.parent.as_ref()
    }

    /// Start building a request on the wrapped client.
    pub fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }

    /// Build and [`execute`](Self::execute) a request.
    pub async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, SdkError> {
        self.execute(builder.build()?).await
    }

    /// Execute `request`, capture the exchange and publish its payload.
    ///
    /// Transport failures are captured as a `503` exchange, reported to the
    /// parent scope and returned.
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, SdkError> {
        self.capture
            .run(self.parent.as_ref(), request, |request| self.http.execute(request))
            .await
            .map_err(SdkError::Http)
    }
}

fn capture_request(request: &reqwest::Request) -> CapturedRequest {
    let url = request.url();
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    };
    let raw_url = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };
    let (proto_major, proto_minor) = proto_version(request.version());

    CapturedRequest {
        method: request.method().to_string(),
        host,
        raw_url,
        referer: request
            .headers()
            .get(REFERER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        proto_major,
        proto_minor,
        headers: capture_headers(request.headers()),
        // Streaming bodies are not captured.
        body: request
            .body()
            .and_then(|b| b.as_bytes())
            .map(Bytes::copy_from_slice)
            .unwrap_or_default(),
    }
}
