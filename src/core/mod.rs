// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core primitives: the captured exchange, the SDK error type and the
//! request scope.
//!
//! Adapters normalize whatever their framework hands them into a
//! [`CapturedExchange`]; everything downstream (redaction, payload
//! building, spans) only ever sees this shape.

mod scope;

#[cfg(test)]
mod tests;

pub use scope::{ErrorList, RequestScope, ScopedContext};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::reporting::ErrorRecord;

/// Multi-valued header map.  Value order is preserved per name.
pub type HeaderValues = BTreeMap<String, Vec<String>>;

/// Errors raised by the SDK's fallible operations.
#[derive(Error, Debug)]
pub enum SdkError {
    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The publisher rejected or failed to deliver a payload
    #[error("publish error: {0}")]
    Publish(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Telemetry pipeline error
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Client metadata could not be fetched or decoded
    #[error("client metadata error: {0}")]
    Metadata(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Which adapter produced an exchange.  Serialized as a lowercase tag,
/// which is the `sdk_type` value the collector receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdkType {
    #[default]
    Native,
    Gin,
    Echo,
    Chi,
    Fiber,
    Gorilla,
    Outgoing,
}

impl SdkType {
    /// The wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            SdkType::Native => "native",
            SdkType::Gin => "gin",
            SdkType::Echo => "echo",
            SdkType::Chi => "chi",
            SdkType::Fiber => "fiber",
            SdkType::Gorilla => "gorilla",
            SdkType::Outgoing => "outgoing",
        }
    }
}

impl fmt::Display for SdkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The request half of an exchange.
#[derive(Debug, Clone, Default)]
pub struct CapturedRequest {
    pub method: String,
    pub host: String,
    /// Path and query exactly as received.
    pub raw_url: String,
    pub referer: String,
    pub proto_major: u8,
    pub proto_minor: u8,
    pub headers: HeaderValues,
    pub body: Bytes,
}

/// The response half of an exchange.
#[derive(Debug, Clone, Default)]
pub struct CapturedResponse {
    pub status_code: u16,
    pub headers: HeaderValues,
    pub body: Bytes,
}

impl CapturedResponse {
    /// Status used when no response could be obtained.
    pub const UNAVAILABLE: u16 = 503;

    /// A bodiless response carrying [`Self::UNAVAILABLE`].
    pub fn unavailable() -> Self {
        Self {
            status_code: Self::UNAVAILABLE,
            ..Self::default()
        }
    }
}

/// Everything an adapter observed about one request/response pair.
///
/// Owned by a single adapter and consumed once by the payload builder.
#[derive(Debug, Clone)]
pub struct CapturedExchange {
    /// `None` when the adapter had no request to look at.
    pub request: Option<CapturedRequest>,
    pub response: CapturedResponse,
    pub path_params: BTreeMap<String, String>,
    /// Route template when known (e.g. `/users/{id}`).
    pub url_path: Option<String>,
    pub started_at: Instant,
    pub errors: Vec<ErrorRecord>,
    pub sdk_type: SdkType,
    pub msg_id: Uuid,
    pub parent_id: Option<Uuid>,
}

impl CapturedExchange {
    /// Start an exchange for `request` with a fresh message id.
    pub fn new(request: Option<CapturedRequest>, sdk_type: SdkType) -> Self {
        Self {
            request,
            response: CapturedResponse::default(),
            path_params: BTreeMap::new(),
            url_path: None,
            started_at: Instant::now(),
            errors: Vec::new(),
            sdk_type,
            msg_id: Uuid::new_v4(),
            parent_id: None,
        }
    }

    pub fn with_msg_id(mut self, msg_id: Uuid) -> Self {
        self.msg_id = msg_id;
        self
    }

    pub fn with_parent(mut self, parent_id: Option<Uuid>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_started_at(mut self, started_at: Instant) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn with_response(mut self, response: CapturedResponse) -> Self {
        self.response = response;
        self
    }

    pub fn with_route(mut self, url_path: Option<String>, path_params: BTreeMap<String, String>) -> Self {
        self.url_path = url_path;
        self.path_params = path_params;
        self
    }

    pub fn with_errors(mut self, errors: Vec<ErrorRecord>) -> Self {
        self.errors = errors;
        self
    }
}

/// Copy an `http::HeaderMap` into the multi-valued capture shape.
///
/// Non UTF-8 values are captured lossily.
pub fn capture_headers(headers: &http::HeaderMap) -> HeaderValues {
    let mut captured = HeaderValues::new();
    for (name, value) in headers {
        captured
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    captured
}

/// `(major, minor)` for an HTTP version.
pub fn proto_version(version: http::Version) -> (u8, u8) {
    match version {
        http::Version::HTTP_09 => (0, 9),
        http::Version::HTTP_10 => (1, 0),
        http::Version::HTTP_2 => (2, 0),
        http::Version::HTTP_3 => (3, 0),
        _ => (1, 1),
    }
}
