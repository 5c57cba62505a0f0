// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client settings shared by every adapter.

use serde::{Deserialize, Serialize};

use crate::logging::config::LoggingConfig;
#[cfg(feature = "opentelemetry")]
use crate::opentelemetry::OpenTelemetryConfig;

/// Collector used when `root_url` is not configured.
pub const DEFAULT_ROOT_URL: &str = "https://app.apitoolkit.io";

/// Header names that are always redacted, whatever the configuration says.
pub const DEFAULT_REDACT_HEADERS: [&str; 3] = ["password", "Authorization", "Cookies"];

/// Settings for an [`ApiToolkit`](crate::ApiToolkit) client.
///
/// Built once at start-up and shared behind an `Arc` with the middleware
/// and the outgoing interceptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Log SDK diagnostics (empty payloads, publish failures, ...)
    #[serde(default)]
    pub debug: bool,

    /// Log every payload as JSON. Never enable in production.
    #[serde(default)]
    pub verbose_debug: bool,

    /// API key used by the HTTP publisher
    #[serde(default)]
    pub api_key: Option<String>,

    /// Collector base URL
    #[serde(default = "default_root_url")]
    pub root_url: String,

    /// Project the payloads belong to
    #[serde(default)]
    pub project_id: Option<String>,

    /// Service name, used for span naming and resources
    #[serde(default)]
    pub service_name: Option<String>,

    /// Service version; emitted only when non-empty
    #[serde(default)]
    pub service_version: Option<String>,

    /// Static tags attached to every payload
    #[serde(default)]
    pub tags: Vec<String>,

    /// Additional header names to redact (case-insensitive)
    #[serde(default)]
    pub redact_headers: Vec<String>,

    /// JSON paths redacted in request bodies
    #[serde(default)]
    pub redact_request_body: Vec<String>,

    /// JSON paths redacted in response bodies
    #[serde(default)]
    pub redact_response_body: Vec<String>,

    /// Attach request bodies to spans
    #[serde(default)]
    pub capture_request_body: bool,

    /// Attach response bodies to spans
    #[serde(default)]
    pub capture_response_body: bool,

    /// Publish zero-value payloads produced when no request was captured
    #[serde(default)]
    pub publish_empty_payloads: bool,

    /// Logging settings
    #[serde(default)]
    pub logging: Option<LoggingConfig>,

    /// OpenTelemetry exporter settings
    #[cfg(feature = "opentelemetry")]
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

fn default_root_url() -> String {
    DEFAULT_ROOT_URL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            debug: false,
            verbose_debug: false,
            api_key: None,
            root_url: default_root_url(),
            project_id: None,
            service_name: None,
            service_version: None,
            tags: Vec::new(),
            redact_headers: Vec::new(),
            redact_request_body: Vec::new(),
            redact_response_body: Vec::new(),
            capture_request_body: false,
            capture_response_body: false,
            publish_empty_payloads: false,
            logging: None,
            #[cfg(feature = "opentelemetry")]
            opentelemetry: None,
        }
    }
}

impl ClientConfig {
    /// The header names to redact, baseline first, lowercased for matching
    /// against normalized header maps.
    pub fn redacted_header_names(&self) -> Vec<String> {
        DEFAULT_REDACT_HEADERS
            .iter()
            .map(|h| h.to_string())
            .chain(self.redact_headers.iter().cloned())
            .map(|h| h.to_lowercase())
            .collect()
    }

    /// The configured service version, if it is non-empty.
    pub fn service_version(&self) -> Option<&str> {
        self.service_version.as_deref().filter(|v| !v.is_empty())
    }

    /// The configured project id, if it is non-empty.
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref().filter(|v| !v.is_empty())
    }
}
