// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structured logging built on slog, with terminal or JSON output.

use slog::{Drain, Logger, OwnedKV, o};
use slog_async::Async;
use slog_json::Json;
use slog_term::{FullFormat, TermDecorator};
use std::io;

/// Structured logging format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable terminal output
    Terminal,
    /// JSON formatted output
    Json,
}

/// Structured logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Output format (Terminal or JSON)
    pub format: LogFormat,
    /// Log level
    pub level: slog::Level,
    /// Whether to include source code location
    pub include_location: bool,
    /// Whether to include thread ID
    pub include_thread_id: bool,
    /// Additional static key-value pairs to include in all logs
    pub static_fields: Vec<(String, String)>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Terminal,
            level: slog::Level::Info,
            include_location: true,
            include_thread_id: true,
            static_fields: Vec::new(),
        }
    }
}

/// Key/value pairs attached to a child logger.
struct Fields(Vec<(&'static str, String)>);

impl slog::KV for Fields {
    fn serialize(&self, _record: &slog::Record, serializer: &mut dyn slog::Serializer) -> slog::Result {
        for (key, value) in &self.0 {
            serializer.emit_str(key, value)?;
        }
        Ok(())
    }
}

/// Create a structured logger with the given configuration
pub fn create_logger(config: &LoggerConfig) -> Logger {
    let logger = match config.format {
        LogFormat::Terminal => {
            let decorator = TermDecorator::new().build();
            let drain = FullFormat::new(decorator).build().fuse();
            let drain = drain.filter_level(config.level).fuse();
            let drain = Async::new(drain).build().fuse();
            Logger::root(drain, o!("sdk" => "apitoolkit"))
        }
        LogFormat::Json => {
            let drain = Json::new(io::stdout()).add_default_keys().build().fuse();
            let drain = drain.filter_level(config.level).fuse();
            let drain = Async::new(drain).build().fuse();
            Logger::root(drain, o!("sdk" => "apitoolkit"))
        }
    };

    let logger = decorate(logger, config);

    // Keys must be 'static; static fields are installed once per process.
    let statics: Vec<(&'static str, String)> = config
        .static_fields
        .iter()
        .map(|(k, v)| {
            let key: &'static str = Box::leak(k.clone().into_boxed_str());
            (key, v.clone())
        })
        .collect();
    if statics.is_empty() {
        logger
    } else {
        logger.new(OwnedKV(Fields(statics)))
    }
}

fn decorate(logger: Logger, config: &LoggerConfig) -> Logger {
    let logger = if config.include_location {
        logger.new(o!("location" => slog::FnValue(|record: &slog::Record| {
            format!("{}:{}", record.file(), record.line())
        })))
    } else {
        logger
    };

    if config.include_thread_id {
        logger.new(o!("thread" => slog::FnValue(|_: &slog::Record| {
            format!("{:?}", std::thread::current().id())
        })))
    } else {
        logger
    }
}

/// Create a child logger carrying the given fields.
pub fn add_fields(logger: &Logger, fields: &[(&'static str, String)]) -> Logger {
    if fields.is_empty() {
        return logger.clone();
    }
    logger.new(OwnedKV(Fields(fields.to_vec())))
}

/// Global logger guard that keeps the logger alive
pub struct LoggerGuard {
    _guard: slog_scope::GlobalLoggerGuard,
}

/// Initialize the global structured logger
pub fn init_global_logger(config: &LoggerConfig) -> LoggerGuard {
    let logger = create_logger(config);
    let guard = slog_scope::set_global_logger(logger);

    LoggerGuard { _guard: guard }
}
