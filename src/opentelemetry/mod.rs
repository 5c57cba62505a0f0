// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OpenTelemetry integration.
//!
//! Each published payload can be mirrored as one span named
//! [`SPAN_NAME`] carrying the payload as attributes.  [`init_opentelemetry`]
//! is a convenience that installs a global OTLP (gRPC) tracer provider.
//!
//! The module is only included when the "opentelemetry" feature is enabled.


use base64::{Engine, engine::general_purpose::STANDARD};
use opentelemetry::trace::{Span, SpanKind, Tracer};
use opentelemetry::{Array, Context, KeyValue, StringValue, Value, global};
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_semantic_conventions::resource::{HOST_NAME, SERVICE_NAME, SERVICE_VERSION};
use opentelemetry_semantic_conventions::trace::{HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, HTTP_ROUTE};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::config::ClientConfig;
use crate::core::{HeaderValues, SdkError, SdkType};
use crate::payload::Payload;

/// Name of every span created from a payload.
pub const SPAN_NAME: &str = "apitoolkit-http-span";

/// Instrumentation scope name.
const TRACER_NAME: &str = "apitoolkit";

/// Guard installed by the loader, released by [`shutdown_global`].
static GLOBAL_GUARD: OnceCell<Mutex<Option<TelemetryGuard>>> = OnceCell::new();

/// Configuration for the OpenTelemetry integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// The endpoint URL for the OpenTelemetry collector.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Service name reported in the resource.  Falls back to the client's.
    #[serde(default)]
    pub service_name: Option<String>,

    /// Service version reported in the resource.
    #[serde(default)]
    pub service_version: Option<String>,

    /// Whether spans are created and exported.
    #[serde(default = "default_traces_enabled")]
    pub traces_enabled: bool,

    /// Extra resource attributes.
    #[serde(default)]
    pub resource_attributes: BTreeMap<String, String>,

    /// Custom headers to add to the OpenTelemetry collector requests.
    #[serde(default)]
    pub collector_headers: BTreeMap<String, String>,
}

fn default_endpoint() -> String {
    "http://otelcol.apitoolkit.io:4317".to_string()
}

fn default_traces_enabled() -> bool {
    true
}

impl Default for OpenTelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            service_name: None,
            service_version: None,
            traces_enabled: default_traces_enabled(),
            resource_attributes: BTreeMap::new(),
            collector_headers: BTreeMap::new(),
        }
    }
}

/// Keeps the installed tracer provider; call [`TelemetryGuard::shutdown`]
/// before exit to flush pending spans.
#[derive(Debug)]
pub struct TelemetryGuard {
    provider: SdkTracerProvider,
}

impl TelemetryGuard {
    pub fn provider(&self) -> &SdkTracerProvider {
        &self.provider
    }

    /// Flush and stop the exporter.
    pub fn shutdown(self) -> Result<(), SdkError> {
        self.provider
            .shutdown()
            .map_err(|e| SdkError::Telemetry(e.to_string()))
    }
}

fn build_resource(config: &OpenTelemetryConfig, fallback_service: Option<&str>) -> Resource {
    let service_name = config
        .service_name
        .as_deref()
        .or(fallback_service)
        .unwrap_or("unknown_service")
        .to_string();

    let mut attributes = vec![KeyValue::new(SERVICE_NAME, service_name)];
    if let Some(version) = config.service_version.as_deref().filter(|v| !v.is_empty()) {
        attributes.push(KeyValue::new(SERVICE_VERSION, version.to_string()));
    }
    if let Some(host) = hostname::get().ok().and_then(|h| h.into_string().ok()) {
        attributes.push(KeyValue::new(HOST_NAME, host));
    }
    for (key, value) in &config.resource_attributes {
        attributes.push(KeyValue::new(key.clone(), value.clone()));
    }

    Resource::builder().with_attributes(attributes).build()
}

/// Install a global OTLP tracer provider.
///
/// Returns `None` when tracing is disabled by configuration.
pub fn init_opentelemetry(
    config: &OpenTelemetryConfig,
    fallback_service: Option<&str>,
) -> Result<Option<TelemetryGuard>, SdkError> {
    if !config.traces_enabled {
        log::info!("OpenTelemetry tracing is disabled by configuration");
        return Ok(None);
    }

    let mut metadata = tonic::metadata::MetadataMap::new();
    for (key, value) in &config.collector_headers {
        match (
            tonic::metadata::MetadataKey::from_bytes(key.as_bytes()),
            value.parse(),
        ) {
            (Ok(key), Ok(value)) => {
                metadata.insert(key, value);
            }
            _ => log::warn!("Ignoring invalid collector header '{key}'"),
        }
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.endpoint.clone())
        .with_metadata(metadata)
        .build()
        .map_err(|e| SdkError::Telemetry(e.to_string()))?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(build_resource(config, fallback_service))
        .build();

    global::set_tracer_provider(provider.clone());
    log::info!(
        "OpenTelemetry initialized with collector endpoint: {}",
        config.endpoint
    );

    Ok(Some(TelemetryGuard { provider }))
}

/// Keep `guard` alive for the rest of the process.
pub(crate) fn keep_global(guard: TelemetryGuard) {
    let slot = GLOBAL_GUARD.get_or_init(|| Mutex::new(None));
    let previous = slot
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .replace(guard);
    if let Some(previous) = previous {
        if let Err(e) = previous.shutdown() {
            log::warn!("Failed to shut down replaced tracer provider: {e}");
        }
    }
}

/// Flush and stop the tracer provider installed by
/// [`ApiToolkitLoader`](crate::ApiToolkitLoader).  A no-op when none was.
pub fn shutdown_global() -> Result<(), SdkError> {
    let guard = GLOBAL_GUARD
        .get()
        .and_then(|slot| slot.lock().unwrap_or_else(|p| p.into_inner()).take());
    match guard {
        Some(guard) => guard.shutdown(),
        None => Ok(()),
    }
}

fn string_array(values: &[String]) -> Value {
    Value::Array(Array::String(
        values.iter().cloned().map(StringValue::from).collect(),
    ))
}

fn json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn push_headers(attributes: &mut Vec<KeyValue>, prefix: &str, headers: &HeaderValues) {
    for (name, values) in headers {
        attributes.push(KeyValue::new(format!("{prefix}.{name}"), string_array(values)));
    }
}

/// Project a payload onto span attributes.
pub fn span_attributes(payload: &Payload, config: &ClientConfig) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new("net.host.name", payload.host.clone()),
        KeyValue::new(HTTP_ROUTE, payload.url_path.clone()),
        KeyValue::new("http.target", payload.raw_url.clone()),
        KeyValue::new(HTTP_REQUEST_METHOD, payload.method.clone()),
        KeyValue::new(HTTP_RESPONSE_STATUS_CODE, i64::from(payload.status_code)),
        KeyValue::new(
            "apitoolkit.duration_ns",
            i64::try_from(payload.duration).unwrap_or(i64::MAX),
        ),
        KeyValue::new("apitoolkit.sdk_type", payload.sdk_type.as_str()),
        KeyValue::new("apitoolkit.msg_id", payload.msg_id.to_string()),
        KeyValue::new("apitoolkit.tags", string_array(&payload.tags)),
        KeyValue::new("http.request.referer", payload.referer.clone()),
        KeyValue::new("http.request.query_params", json_string(&payload.query_params)),
        KeyValue::new("http.request.path_params", json_string(&payload.path_params)),
        KeyValue::new("apitoolkit.errors", json_string(&payload.errors)),
    ];

    if let Some(parent_id) = payload.parent_id {
        attributes.push(KeyValue::new("apitoolkit.parent_id", parent_id.to_string()));
    }
    if let Some(version) = payload.service_version.as_deref() {
        attributes.push(KeyValue::new("apitoolkit.service_version", version.to_string()));
    }
    if config.capture_request_body {
        attributes.push(KeyValue::new("http.request.body", STANDARD.encode(&payload.request_body)));
    }
    if config.capture_response_body {
        attributes.push(KeyValue::new("http.response.body", STANDARD.encode(&payload.response_body)));
    }

    push_headers(&mut attributes, "http.request.header", &payload.request_headers);
    push_headers(&mut attributes, "http.response.header", &payload.response_headers);
    attributes
}

/// Emit one span for `payload` through the global tracer provider.
///
/// The span covers `[timestamp - duration, timestamp]` and is ended
/// immediately.
pub fn create_span(payload: &Payload, config: &ClientConfig, parent: Option<&Context>) {
    let tracer = global::tracer(TRACER_NAME);

    let end = SystemTime::from(payload.timestamp);
    let start = end
        .checked_sub(Duration::from_nanos(payload.duration))
        .unwrap_or(end);
    let kind = match payload.sdk_type {
        SdkType::Outgoing => SpanKind::Client,
        _ => SpanKind::Server,
    };

    let builder = tracer
        .span_builder(SPAN_NAME)
        .with_kind(kind)
        .with_start_time(start)
        .with_attributes(span_attributes(payload, config));

    let mut span = match parent {
        Some(cx) => builder.start_with_context(&tracer, cx),
        None => builder.start(&tracer),
    };
    span.end_with_timestamp(end);
}
