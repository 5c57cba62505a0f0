// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level entry-point – "configure and go".
//!
//! The [`ApiToolkitLoader`] layers configuration providers, initializes
//! logging (and OpenTelemetry when the feature is enabled), picks a
//! publisher, resolves the project metadata for the API key and returns a
//! ready [`ApiToolkit`] client.

#[cfg(test)]
mod tests;

use log::LevelFilter;
use std::sync::Arc;
use thiserror::Error;

use crate::client::ApiToolkit;
use crate::config::{
    ClientConfig, Config, ConfigError, ConfigProvider, EnvConfigProvider, FileConfigProvider,
    ROOT_KEY,
};
use crate::core::SdkError;
use crate::logging::{self, config::LoggingConfig};
use crate::publish::Publisher;
use crate::info_fmt;

/// Errors that can occur while building a client.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// SDK error (publisher construction, telemetry init)
    #[error("sdk error: {0}")]
    SdkError(#[from] SdkError),
}

/// Builder for an [`ApiToolkit`] client.
#[derive(Debug, Default)]
pub struct ApiToolkitLoader {
    config_file_path: Option<String>,
    use_env_vars: bool,
    env_prefix: Option<String>,
    providers: Vec<Arc<dyn ConfigProvider>>,
    client_config: Option<ClientConfig>,
    publisher: Option<Arc<dyn Publisher>>,
    skip_logging: bool,
    skip_metadata: bool,
}

impl ApiToolkitLoader {
    /// Create a new loader with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a configuration file to load.
    pub fn with_config_file(mut self, file_path: &str) -> Self {
        self.config_file_path = Some(file_path.to_string());
        self
    }

    /// Enable environment variable configuration.
    pub fn with_env_vars(mut self) -> Self {
        self.use_env_vars = true;
        self
    }

    /// Set a custom prefix for environment variables (default is "APITOOLKIT_").
    /// `MYAPP_DEBUG=true` then sets `apitoolkit.debug`.
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.use_env_vars = true;
        self
    }

    /// Add a custom configuration provider.  It overrides the file and the
    /// environment.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Use `config` as is and skip provider resolution entirely.
    pub fn with_client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = Some(config);
        self
    }

    /// Publish through `publisher` instead of the one chosen from the
    /// configuration.
    pub fn with_publisher<P: Publisher + 'static>(mut self, publisher: P) -> Self {
        self.publisher = Some(Arc::new(publisher));
        self
    }

    /// Leave logging alone; for hosts that install their own logger.
    pub fn without_logging(mut self) -> Self {
        self.skip_logging = true;
        self
    }

    /// Do not query the collector for project metadata, even with an API
    /// key configured.
    pub fn without_client_metadata(mut self) -> Self {
        self.skip_metadata = true;
        self
    }

    fn layered_config(&self) -> Result<Config, ConfigError> {
        let mut builder = Config::builder();

        if let Some(file_path) = &self.config_file_path {
            builder = builder.with_provider(FileConfigProvider::new(file_path)?);
        }

        if self.use_env_vars {
            let env_provider = match &self.env_prefix {
                Some(prefix) => EnvConfigProvider::with_root(prefix, ROOT_KEY),
                None => EnvConfigProvider::default(),
            };
            builder = builder.with_provider(env_provider);
        }

        for provider in &self.providers {
            builder = builder.with_shared_provider(provider.clone());
        }

        Ok(builder.build())
    }

    /// Resolve the client settings without building anything.
    pub fn resolve_config(&self) -> Result<ClientConfig, LoaderError> {
        match &self.client_config {
            Some(config) => Ok(config.clone()),
            None => Ok(self.layered_config()?.client_config()?),
        }
    }

    /// Build and initialize the client.
    pub async fn build(self) -> Result<ApiToolkit, LoaderError> {
        let config = self.resolve_config()?;

        if !self.skip_logging {
            init_logging(&config);
        }

        #[cfg(feature = "opentelemetry")]
        if let Some(otel) = config.opentelemetry.as_ref() {
            if let Some(guard) =
                crate::opentelemetry::init_opentelemetry(otel, config.service_name.as_deref())?
            {
                crate::opentelemetry::keep_global(guard);
            }
        }

        let mut client = match self.publisher {
            Some(publisher) => ApiToolkit::new(config, publisher),
            None => ApiToolkit::from_config(config)?,
        };
        if !self.skip_metadata {
            client = client.resolve_metadata().await?;
        }

        info_fmt!(
            "loader",
            "APIToolkit client ready, publishing via {}",
            client.publisher().name()
        );
        Ok(client)
    }
}

fn init_logging(config: &ClientConfig) {
    match config.logging.as_ref() {
        Some(logging_config) => {
            logging::init_with_config(logging_config.level_filter(), logging_config);
        }
        None => {
            let level = if config.debug {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            logging::init_with_config(level, &LoggingConfig::default());
        }
    }
}
