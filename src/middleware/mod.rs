// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound middleware over `http` request/response types.
//!
//! [`Middleware::handle`] wraps a handler: it buffers both bodies, places a
//! [`RequestScope`] in the request extensions, turns handler errors and
//! panics into error records plus a `500`, and publishes one payload per
//! request once the response exists.


use bytes::Bytes;
use futures_util::FutureExt;
use http::header::{HOST, REFERER};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::client::ApiToolkit;
use crate::core::{
    CapturedExchange, CapturedRequest, CapturedResponse, RequestScope, SdkError, SdkType, capture_headers,
    proto_version,
};
use crate::reporting::{build_dyn_error, build_error, build_panic_error};
use crate::router::{RouteError, RouteSet};
use crate::{debug_fmt, warn_fmt};

/// Error type handlers may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Captures every request passed through [`Middleware::handle`].
#[derive(Debug, Clone)]
pub struct Middleware {
    client: ApiToolkit,
    routes: Arc<RouteSet>,
}

impl Middleware {
    pub fn new(client: ApiToolkit) -> Self {
        Self {
            client,
            routes: Arc::new(RouteSet::new()),
        }
    }

    /// Register a route template (`/users/{id}` or `/users/:id`).  Matching
    /// requests report the template as `url_path` along with their path
    /// parameters.
    pub fn with_route(mut self, template: &str) -> Result<Self, RouteError> {
        Arc::make_mut(&mut self.routes).add(template)?;
        Ok(self)
    }

    pub fn client(&self) -> &ApiToolkit {
        &self.client
    }

    /// Run `handler` for `req` and capture the exchange.
    pub async fn handle<B, F, Fut, RB>(&self, req: Request<B>, handler: F) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Display,
        F: FnOnce(Request<Full<Bytes>>) -> Fut,
        Fut: Future<Output = Result<Response<RB>, BoxError>>,
        RB: Body,
        RB::Error: Display,
    {
        let started_at = Instant::now();
        let scope = RequestScope::with_msg_id(Uuid::new_v4()).with_client(self.client.clone());

        let (mut parts, body) = req.into_parts();
        let request_body = collect_body(body, &scope, "request").await;

        let (proto_major, proto_minor) = proto_version(parts.version);
        let captured = CapturedRequest {
            method: parts.method.to_string(),
            host: parts
                .headers
                .get(HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
                .or_else(|| parts.uri.authority().map(|a| a.to_string()))
                .unwrap_or_default(),
            raw_url: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| parts.uri.path().to_string()),
            referer: parts
                .headers
                .get(REFERER)
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            proto_major,
            proto_minor,
            headers: capture_headers(&parts.headers),
            body: request_body.clone(),
        };
        let route = self.routes.match_path(parts.uri.path());

        parts.extensions.insert(scope.clone());
        let request = Request::from_parts(parts, Full::new(request_body));

        let outcome = AssertUnwindSafe(async move { handler(request).await })
            .catch_unwind()
            .await;

        let (response_parts, response_body) = match outcome {
            Ok(Ok(response)) => {
                let (parts, body) = response.into_parts();
                (parts, collect_body(body, &scope, "response").await)
            }
            Ok(Err(err)) => {
                debug_fmt!("middleware", "handler returned an error: {}", err);
                scope.error_list().push(build_dyn_error(err.as_ref()));
                (internal_error(), Bytes::new())
            }
            Err(panic) => {
                warn_fmt!("middleware", "handler panicked, responding with 500");
                scope.error_list().push(build_panic_error(panic.as_ref()));
                (internal_error(), Bytes::new())
            }
        };

        let captured_response = CapturedResponse {
            status_code: response_parts.status.as_u16(),
            headers: capture_headers(&response_parts.headers),
            body: response_body.clone(),
        };

        let (url_path, path_params) = match route {
            Some(matched) => (Some(matched.template), matched.params),
            None => (None, Default::default()),
        };

        let exchange = CapturedExchange::new(Some(captured), SdkType::Native)
            .with_msg_id(scope.msg_id())
            .with_started_at(started_at)
            .with_response(captured_response)
            .with_route(url_path, path_params)
            .with_errors(scope.error_list().take());

        let payload = self.client.build_payload(exchange);
        self.client.publish_reporting(&payload, Some(&scope)).await;

        Response::from_parts(response_parts, Full::new(response_body))
    }
}

/// Buffer a body.  Read failures are recorded against the scope and yield
/// an empty body.
async fn collect_body<B>(body: B, scope: &RequestScope, which: &str) -> Bytes
where
    B: Body,
    B::Error: Display,
{
    match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let err = SdkError::Other(format!("failed to read {which} body: {e}"));
            scope.error_list().push(build_error(&err));
            Bytes::new()
        }
    }
}

fn internal_error() -> http::response::Parts {
    let (mut parts, ()) = Response::new(()).into_parts();
    parts.status = StatusCode::INTERNAL_SERVER_ERROR;
    parts
}
