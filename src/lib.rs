// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! APIToolkit - HTTP instrumentation for Rust services
//!
//! The SDK captures every request/response exchange that passes through a
//! service, redacts sensitive fields and ships the result to the APIToolkit
//! collector.  Outgoing calls made while handling a request are captured
//! too and linked to the inbound exchange.
//!
//! # Core Principles
//!
//! - **Never break the host**: capture and publish failures are logged and
//!   reported, never surfaced to the caller's response
//! - **Redact before anything leaves**: headers and JSON body paths are
//!   replaced with `[CLIENT_REDACTED]` while building the payload
//! - **Configuration driven**: settings come from files, the environment or
//!   your own [`ConfigProvider`]
//!
//! # Getting started
//!
//! ```rust,no_run
//! use apitoolkit::{ApiToolkitLoader, BoxError};
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::Full;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiToolkitLoader::new()
//!     .with_config_file("apitoolkit.toml")
//!     .with_env_vars()
//!     .build()
//!     .await?;
//!
//! let middleware = client.middleware().with_route("/users/{id}")?;
//!
//! let request = Request::get("/users/42").body(Full::new(Bytes::new()))?;
//! let response = middleware
//!     .handle(request, |req: Request<Full<Bytes>>| async move {
//!         // Errors reported here end up in the payload's `errors`.
//!         let _ = req.extensions();
//!         Ok::<_, BoxError>(Response::new(Full::new(Bytes::from_static(b"{}"))))
//!     })
//!     .await;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! # Reporting errors
//!
//! Handlers find a [`RequestScope`] in the request extensions.  Pass the
//! request (or the scope) to [`report_error`] to attach an error to the
//! exchange, and to [`OutgoingClient::with_context`] to link outgoing calls.

// Module declarations
pub mod config;
pub mod logging;
pub mod core;
pub mod redact;
pub mod reporting;
pub mod payload;
pub mod publish;
pub mod router;
pub mod client;
pub mod middleware;
pub mod outgoing;
pub mod loader;

#[cfg(feature = "opentelemetry")]
pub mod opentelemetry;

// Re-export key types at the crate root for convenience
pub use config::{ClientConfig, Config, ConfigError, ConfigProvider, ConfigProviderExt};
pub use crate::core::{
    CapturedExchange, CapturedRequest, CapturedResponse, ErrorList, HeaderValues, RequestScope,
    ScopedContext, SdkError, SdkType,
};
pub use redact::{REDACTED, redact_body, redact_headers};
pub use reporting::{ErrorRecord, build_error, report_error};
pub use payload::{Payload, build_payload};
pub use publish::{HttpPublisher, LogPublisher, MemoryPublisher, NoopPublisher, Publisher};
pub use router::{RouteError, RouteSet, RouteTemplate};
pub use client::{ApiToolkit, ClientMetadata};
pub use middleware::{BoxError, Middleware};
pub use outgoing::{CaptureMiddleware, OutgoingClient};
pub use loader::{ApiToolkitLoader, LoaderError};

#[cfg(feature = "opentelemetry")]
pub use crate::opentelemetry::{OpenTelemetryConfig, TelemetryGuard, init_opentelemetry};
