// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use http::Extensions;
use reqwest_middleware::{Middleware, Next};

use super::Capture;
use crate::client::ApiToolkit;
use crate::core::RequestScope;

/// `reqwest_middleware` layer capturing every exchange of a
/// `ClientWithMiddleware`.
///
/// The inbound exchange to link to is read from the request extensions:
///
/// ```ignore
/// client.get(url).with_extension(scope.clone()).send().await?;
/// ```
#[derive(Debug, Clone)]
pub struct CaptureMiddleware {
    capture: Capture,
}

impl CaptureMiddleware {
    pub fn new(client: ApiToolkit) -> Self {
        Self {
            capture: Capture::new(client),
        }
    }

    pub fn with_redact_headers(mut self, headers: Vec<String>) -> Self {
        self.capture.redact_headers = Some(headers);
        self
    }

    pub fn with_redact_request_body(mut self, paths: Vec<String>) -> Self {
        self.capture.redact_request_body = Some(paths);
        self
    }

    pub fn with_redact_response_body(mut self, paths: Vec<String>) -> Self {
        self.capture.redact_response_body = Some(paths);
        self
    }
}

#[async_trait]
impl Middleware for CaptureMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        let parent = extensions.get::<RequestScope>().cloned();
        self.capture
            .run(parent.as_ref(), req, move |req| next.run(req, extensions))
            .await
    }
}
