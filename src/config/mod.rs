// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SDK configuration subsystem
//!
//! Settings are resolved from an ordered list of [`ConfigProvider`]s.  Later
//! providers override earlier ones, and object values are deep-merged so a
//! file can carry the bulk of the settings while the environment overrides
//! a single field:
//!
//! 1. `FileConfigProvider` – `apitoolkit.{toml,json,yaml}`
//! 2. `EnvConfigProvider`  – `APITOOLKIT_DEBUG=true`, `APITOOLKIT_LOGGING__LEVEL=debug`
//! 3. *your* provider implementing [`ConfigProvider`]
//!
//! The following keys are understood by the SDK.
//!
//! | key | type | default | description |
//! |-----|------|---------|-------------|
//! | `apitoolkit.api_key`                | string   | –     | Collector API key                          |
//! | `apitoolkit.root_url`               | string   | `https://app.apitoolkit.io` | Collector base URL |
//! | `apitoolkit.debug`                  | bool     | false | Log SDK diagnostics                        |
//! | `apitoolkit.redact_headers`         | [string] | []    | Extra header names to redact               |
//! | `apitoolkit.redact_request_body`    | [string] | []    | JSON paths redacted in request bodies      |
//! | `apitoolkit.redact_response_body`   | [string] | []    | JSON paths redacted in response bodies     |
//! | `apitoolkit.tags`                   | [string] | []    | Static tags attached to every payload      |
//! | `apitoolkit.logging`                | object   | –     | See [`crate::logging::config::LoggingConfig`] |
//!
//! See [`ClientConfig`] for the complete list.

mod client;
mod env;
pub mod error;
mod file;


pub use client::{ClientConfig, DEFAULT_REDACT_HEADERS, DEFAULT_ROOT_URL};
pub use env::EnvConfigProvider;
pub use error::ConfigError;
pub use file::{FileConfigProvider, FileFormat};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Key under which all SDK settings live.
pub const ROOT_KEY: &str = "apitoolkit";

/// A source of configuration values.
/// This trait is object-safe since it doesn't contain generic methods.
pub trait ConfigProvider: Debug + Send + Sync {
    /// Check if the provider has a value for the given dot-separated key.
    fn has(&self, key: &str) -> bool;

    /// Get the name of the provider for diagnostics.
    fn provider_name(&self) -> &str;

    /// Get a raw configuration value by key.
    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError>;
}

/// Typed access on top of [`ConfigProvider`].
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a configuration value by key and deserialize it to the specified type.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(key)? {
            Some(value) => decode(key, value).map(Some),
            None => Ok(None),
        }
    }
}

impl<T: ConfigProvider> ConfigProviderExt for T {}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, ConfigError> {
    serde_json::from_value(value)
        .map_err(|e| ConfigError::ParseError(format!("failed to deserialize '{key}': {e}")))
}

/// Deep-merge `overlay` into `base`.  Objects merge key by key, anything
/// else is replaced wholesale.
pub(crate) fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (slot, overlay) => *slot = overlay,
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl ConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration provider.  Providers added later take priority.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Add an already shared provider.
    pub fn with_shared_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        Config {
            providers: self.providers,
        }
    }
}

/// Layered configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Resolve a raw value across all providers.
    ///
    /// Every provider that knows the key contributes; later providers win on
    /// scalar conflicts and objects are merged.
    pub fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        let mut resolved: Option<Value> = None;
        for provider in &self.providers {
            if !provider.has(key) {
                continue;
            }
            if let Some(value) = provider.get_raw(key)? {
                match resolved.as_mut() {
                    Some(current) => merge_values(current, value),
                    None => resolved = Some(value),
                }
            }
        }
        Ok(resolved)
    }

    /// Get a configuration value by key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(key)? {
            Some(value) => decode(key, value).map(Some),
            None => Ok(None),
        }
    }

    /// Get a configuration value by key with a default fallback value.
    pub fn get_or_default<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Configuration backed by a single file.
    pub fn from_file(file_path: &str) -> Result<Self, ConfigError> {
        let provider = FileConfigProvider::new(file_path)?;
        Ok(Self::builder().with_provider(provider).build())
    }

    /// Read the SDK client settings under [`ROOT_KEY`].
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        self.get_or_default(ROOT_KEY, ClientConfig::default())
    }
}
