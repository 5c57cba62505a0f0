// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for logging.

use crate::logging::structured::{LogFormat, LoggerConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logging configuration, read from `apitoolkit.logging`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether to use structured logging
    #[serde(default = "default_false")]
    pub structured: bool,

    /// Log format (terminal or json)
    #[serde(default = "default_format")]
    pub format: String,

    /// Log level
    #[serde(default = "default_level")]
    pub level: String,

    /// Include source code location
    #[serde(default = "default_true")]
    pub include_location: bool,

    /// Include thread ID
    #[serde(default = "default_true")]
    pub include_thread_id: bool,

    /// Static fields to include in all logs
    #[serde(default)]
    pub static_fields: BTreeMap<String, String>,
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_format() -> String {
    "terminal".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            structured: false,
            format: default_format(),
            level: default_level(),
            include_location: true,
            include_thread_id: true,
            static_fields: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// The configured level as a `log` filter.  Unknown names fall back to info.
    pub fn level_filter(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::Info)
    }

    /// Settings for the slog pipeline.  Anything but `json` renders for a
    /// terminal.
    pub fn to_logger_config(&self) -> LoggerConfig {
        let format = if self.format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Terminal
        };

        LoggerConfig {
            format,
            level: slog_level(self.level_filter()),
            include_location: self.include_location,
            include_thread_id: self.include_thread_id,
            static_fields: self.static_fields.clone().into_iter().collect(),
        }
    }
}

/// `Off` has no slog counterpart; the `log` max level already silences it.
fn slog_level(filter: LevelFilter) -> slog::Level {
    match filter {
        LevelFilter::Trace => slog::Level::Trace,
        LevelFilter::Debug => slog::Level::Debug,
        LevelFilter::Info => slog::Level::Info,
        LevelFilter::Warn => slog::Level::Warning,
        LevelFilter::Error | LevelFilter::Off => slog::Level::Error,
    }
}
