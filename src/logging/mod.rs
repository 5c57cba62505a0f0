// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logging utilities for the SDK.
//!
//! Every SDK message goes through the `log` facade.  By default the facade
//! is backed by `env_logger`; when [`LoggingConfig::structured`] is set a
//! `slog` logger is installed instead and `slog-stdlog` forwards the facade
//! into it.

pub mod config;
pub mod structured;
pub mod wrapper;

#[cfg(test)]
mod test_logger;

use log::{LevelFilter, debug, error, info, trace, warn};
use once_cell::sync::OnceCell;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use self::config::LoggingConfig;

static INIT: Once = Once::new();
static USING_STRUCTURED: AtomicBool = AtomicBool::new(false);
static GLOBAL_GUARD: OnceCell<structured::LoggerGuard> = OnceCell::new();

/// Initialize `env_logger` with the specified level.
///
/// Only the first call has an effect.  `RUST_LOG` still wins when set.
pub fn init(level: Option<LevelFilter>) {
    INIT.call_once(|| {
        init_env_logger(level.unwrap_or(LevelFilter::Info));
    });
}

/// Initialize logging from a [`LoggingConfig`].
///
/// Chooses between `env_logger` and the structured `slog` pipeline.  Like
/// [`init`], only the first call (of either function) has an effect.
pub fn init_with_config(level: LevelFilter, config: &LoggingConfig) {
    INIT.call_once(|| {
        if config.structured {
            let logger_config = config.to_logger_config();
            GLOBAL_GUARD.get_or_init(|| structured::init_global_logger(&logger_config));

            match level.to_level() {
                Some(stdlog_level) => match slog_stdlog::init_with_level(stdlog_level) {
                    Ok(()) => {
                        USING_STRUCTURED.store(true, Ordering::SeqCst);
                        log::set_max_level(level);
                    }
                    Err(e) => eprintln!("apitoolkit: failed to bridge log to slog: {e}"),
                },
                None => log::set_max_level(LevelFilter::Off),
            }
        } else {
            init_env_logger(level);
        }

        info!(
            "Logging initialized at level {} (structured: {})",
            log::max_level(),
            is_structured_logging()
        );
    });
}

fn init_env_logger(level: LevelFilter) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", level.as_str().to_lowercase());

    // A logger may already be installed by the host application.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_target(true)
        .try_init();
}

/// Whether the structured `slog` pipeline is active.
pub fn is_structured_logging() -> bool {
    USING_STRUCTURED.load(Ordering::SeqCst)
}

/// Log an error with context and return the error.
///
/// This is useful for logging errors in a chain of Results.
pub fn log_error<E: std::fmt::Display>(context: &str, err: E) -> E {
    error!("{}: {}", context, err);
    err
}

/// Log a warning with context.
pub fn log_warning<E: std::fmt::Display>(context: &str, err: E) {
    warn!("{}: {}", context, err);
}

/// Log a debug message with context.
pub fn log_debug<M: std::fmt::Display>(context: &str, msg: M) {
    debug!("{}: {}", context, msg);
}

/// Log a trace message with context.
pub fn log_trace<M: std::fmt::Display>(context: &str, msg: M) {
    trace!("{}: {}", context, msg);
}

/// Log an info message with context.
pub fn log_info<M: std::fmt::Display>(context: &str, msg: M) {
    info!("{}: {}", context, msg);
}

/// Log a message with key/value fields.
///
/// With structured logging the fields become slog key/values on the global
/// logger; otherwise they are appended to the message as `key=value`.
pub fn log_with_context(level: log::Level, message: &str, context: &str, fields: &[(&'static str, String)]) {
    if is_structured_logging() {
        let logger = structured::add_fields(&slog_scope::logger(), fields);
        match level {
            log::Level::Error => slog::error!(logger, "[{}] {}", context, message),
            log::Level::Warn => slog::warn!(logger, "[{}] {}", context, message),
            log::Level::Info => slog::info!(logger, "[{}] {}", context, message),
            log::Level::Debug => slog::debug!(logger, "[{}] {}", context, message),
            log::Level::Trace => slog::trace!(logger, "[{}] {}", context, message),
        }
        return;
    }

    let rendered: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
    if rendered.is_empty() {
        log::log!(level, "[{}] {}", context, message);
    } else {
        log::log!(level, "[{}] {} {}", context, message, rendered.join(" "));
    }
}
