// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The payload wire format and its construction from a captured exchange.
//!
//! [`Payload`] is the stable, snake_case JSON record shipped to the
//! collector.  [`build_payload`] is synchronous, does no I/O and never
//! panics: anything unparsable degrades to an empty field.

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::form_urlencoded;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::core::{CapturedExchange, HeaderValues, SdkType};
use crate::debug_fmt;
use crate::redact::{redact_body, redact_headers};
use crate::reporting::ErrorRecord;

/// One captured exchange, ready to publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub timestamp: DateTime<Utc>,
    pub request_headers: HeaderValues,
    pub query_params: BTreeMap<String, Vec<String>>,
    pub path_params: BTreeMap<String, String>,
    pub response_headers: HeaderValues,
    pub method: String,
    pub sdk_type: SdkType,
    pub host: String,
    pub raw_url: String,
    pub referer: String,
    pub project_id: String,
    pub url_path: String,
    #[serde(with = "base64_bytes")]
    pub response_body: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub request_body: Vec<u8>,
    pub proto_minor: u8,
    pub proto_major: u8,
    pub status_code: u16,
    /// Nanoseconds between the start of processing and `timestamp`.
    pub duration: u64,
    pub errors: Vec<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    pub tags: Vec<String>,
    pub msg_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

impl Payload {
    /// True for the zero-value payload produced when nothing was captured.
    pub fn is_empty(&self) -> bool {
        *self == Payload::default()
    }
}

/// Bodies travel as standard base64 strings.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Build the payload for `exchange`.
///
/// Headers are redacted with the baseline names plus the configured ones,
/// and both bodies always pass through body redaction.
pub fn build_payload(exchange: CapturedExchange, config: &ClientConfig, project_id: &str) -> Payload {
    let Some(request) = exchange.request else {
        if config.debug {
            debug_fmt!("payload", "no request captured, returning an empty payload");
        }
        return Payload::default();
    };

    let header_names = config.redacted_header_names();
    let url_path = exchange
        .url_path
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| path_of(&request.raw_url).to_string());

    Payload {
        timestamp: Utc::now(),
        request_headers: redact_headers(request.headers, &header_names),
        query_params: parse_query(&request.raw_url),
        path_params: exchange.path_params,
        response_headers: redact_headers(exchange.response.headers, &header_names),
        method: request.method,
        sdk_type: exchange.sdk_type,
        host: request.host,
        raw_url: request.raw_url,
        referer: request.referer,
        project_id: project_id.to_string(),
        url_path,
        response_body: redact_body(&exchange.response.body, &config.redact_response_body),
        request_body: redact_body(&request.body, &config.redact_request_body),
        proto_minor: request.proto_minor,
        proto_major: request.proto_major,
        status_code: exchange.response.status_code,
        duration: u64::try_from(exchange.started_at.elapsed().as_nanos()).unwrap_or(u64::MAX),
        errors: exchange.errors,
        service_version: config.service_version().map(str::to_string),
        tags: config.tags.clone(),
        msg_id: exchange.msg_id,
        parent_id: exchange.parent_id,
    }
}

/// The path portion of a request target.
pub fn path_of(raw_url: &str) -> &str {
    let end = raw_url.find(['?', '#']).unwrap_or(raw_url.len());
    &raw_url[..end]
}

/// Parse the query string of a request target into a multi-valued map.
///
/// Pairs are form-decoded (`+` is a space); malformed escapes are kept as is.
pub fn parse_query(raw_url: &str) -> BTreeMap<String, Vec<String>> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let Some((_, query)) = raw_url.split_once('?') else {
        return params;
    };
    let query = query.split('#').next().unwrap_or_default();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        params.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    params
}
