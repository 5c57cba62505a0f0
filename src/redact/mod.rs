// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Field redaction for captured bodies and headers.
//!
//! Both functions are pure: no I/O, no panics on bad input.

pub mod jsonpath;

#[cfg(test)]
mod tests;

pub use jsonpath::{JsonPath, PathError};

use log::{debug, warn};
use serde_json::Value;

use crate::core::HeaderValues;

/// Sentinel written in place of redacted values.
pub const REDACTED: &str = "[CLIENT_REDACTED]";

/// Redact every location matched by `paths` in a JSON document.
///
/// Invalid JSON is treated as `null`.  The document is always
/// re-serialized, so the output is normalized even when nothing matched.
pub fn redact_body<S: AsRef<str>>(data: &[u8], paths: &[S]) -> Vec<u8> {
    let mut tree: Value = match serde_json::from_slice(data) {
        Ok(tree) => tree,
        Err(e) => {
            if !data.is_empty() {
                debug!("redact: body is not valid JSON ({e}), replacing with null");
            }
            Value::Null
        }
    };

    let sentinel = Value::String(REDACTED.to_string());
    for path in paths {
        let path = path.as_ref();
        match JsonPath::parse(path) {
            Ok(parsed) => {
                parsed.replace(&mut tree, &sentinel);
            }
            Err(e) => warn!("redact: ignoring invalid path '{path}': {e}"),
        }
    }

    serde_json::to_vec(&tree).unwrap_or_else(|_| b"null".to_vec())
}

/// Replace the values of headers whose name is in `names`.
///
/// Names are compared exactly; callers lowercase both sides.
pub fn redact_headers<S: AsRef<str>>(mut headers: HeaderValues, names: &[S]) -> HeaderValues {
    for name in names {
        if let Some(values) = headers.get_mut(name.as_ref()) {
            *values = vec![REDACTED.to_string()];
        }
    }
    headers
}
