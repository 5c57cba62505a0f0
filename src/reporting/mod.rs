// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error capture: turns application errors into serializable records that
//! travel with the exchange they were reported against.


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;

use crate::core::ScopedContext;
use crate::warn_fmt;

/// A reported error, as it appears in the payload's `errors` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub when: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root_error_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root_error_message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stack_trace: String,
}

/// Build a record for `err`, using its static type as `error_type`.
///
/// The stack trace is captured here, at the reporting site.
pub fn build_error<E: Error + 'static>(err: &E) -> ErrorRecord {
    record(std::any::type_name::<E>().to_string(), err)
}

/// Like [`build_error`] for type-erased errors.
///
/// Only well-known error types and string errors (`"boom".into()`) can be
/// named; anything else is reported as [`DYN_ERROR_TYPE`].
pub fn build_dyn_error(err: &(dyn Error + 'static)) -> ErrorRecord {
    let error_type = dyn_type_name(err).unwrap_or_else(|| DYN_ERROR_TYPE.to_string());
    record(error_type, err)
}

/// `error_type` of a boxed error whose concrete type cannot be named.
pub const DYN_ERROR_TYPE: &str = "Box<dyn Error>";

/// Type reported for errors built from a `&str` or `String`.
pub const STRING_ERROR_TYPE: &str = "String";

fn record(error_type: String, err: &(dyn Error + 'static)) -> ErrorRecord {
    let mut message = err.to_string();
    let mut root = err;
    while let Some(cause) = root.source() {
        let text = cause.to_string();
        if !text.is_empty() && !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        root = cause;
    }

    // A root we cannot name is reported under the outer type.
    let root_error_type = dyn_type_name(root).unwrap_or_else(|| error_type.clone());

    ErrorRecord {
        when: Utc::now(),
        error_type,
        root_error_type,
        message,
        root_error_message: root.to_string(),
        stack_trace: Backtrace::force_capture().to_string(),
    }
}

/// Build a record for a caught panic payload.
pub fn build_panic_error(payload: &(dyn Any + Send)) -> ErrorRecord {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string());

    ErrorRecord {
        when: Utc::now(),
        error_type: "panic".to_string(),
        root_error_type: "panic".to_string(),
        root_error_message: message.clone(),
        message,
        stack_trace: Backtrace::force_capture().to_string(),
    }
}

/// Report `err` against the exchange found in `ctx`.
///
/// Without a scope (middleware not installed) the error is logged and
/// dropped; reporting never fails the request.
pub fn report_error<C, E>(ctx: &C, err: &E)
where
    C: ScopedContext + ?Sized,
    E: Error + 'static,
{
    match ctx.request_scope() {
        Some(scope) => scope.error_list().push(build_error(err)),
        None => warn_fmt!(
            "reporting",
            "no request scope found, is the middleware installed? dropping error: {}",
            err
        ),
    }
}

macro_rules! known_types {
    ($err:expr, $($ty:ty => $name:expr),+ $(,)?) => {
        $(
            if $err.is::<$ty>() {
                return Some($name.to_string());
            }
        )+
    };
}

/// Name of a type-erased error, when it can be told.
fn dyn_type_name(err: &(dyn Error + 'static)) -> Option<String> {
    known_types!(err,
        std::io::Error => "std::io::Error",
        std::fmt::Error => "std::fmt::Error",
        std::num::ParseIntError => "std::num::ParseIntError",
        std::num::ParseFloatError => "std::num::ParseFloatError",
        std::str::Utf8Error => "std::str::Utf8Error",
        std::string::FromUtf8Error => "std::string::FromUtf8Error",
        serde_json::Error => "serde_json::Error",
        reqwest::Error => "reqwest::Error",
        hyper::Error => "hyper::Error",
        http::Error => "http::Error",
        uuid::Error => "uuid::Error",
        crate::core::SdkError => "apitoolkit::SdkError",
        crate::config::ConfigError => "apitoolkit::ConfigError",
    );

    // `Box<dyn Error>::from(&str)` wraps a private type whose `Debug` is
    // the quoted message.
    let debug = format!("{err:?}");
    let quoted = format!("{:?}", err.to_string());
    (debug == quoted).then(|| STRING_ERROR_TYPE.to_string())
}
