//! Client builder
//!
//! Fluent construction of a [`CallClient`] from a [`ClientConfig`], a
//! transport engine and a sink factory.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! # use happyrobot_client_core::{CallClient, TransportEngine, SinkFactory};
//! # fn build(engine: Arc<dyn TransportEngine>, sinks: Arc<dyn SinkFactory>) {
//! let client = CallClient::builder("hr_live_key")
//!     .base_url("https://staging.happyrobot.ai/")
//!     .request_timeout(Duration::from_secs(10))
//!     .noise_cancellation(false)
//!     .engine(engine)
//!     .sink_factory(sinks)
//!     .build()
//!     .expect("valid configuration");
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::client::config::ClientConfig;
use crate::client::manager::CallClient;
use crate::error::{ClientError, ClientResult};
use crate::media::{MediaSinkManager, SinkFactory, SinkOptions};
use crate::signaling::SignalingClient;
use crate::transport::TransportEngine;

/// Builder for [`CallClient`]
pub struct ClientBuilder {
    config: ClientConfig,
    engine: Option<Arc<dyn TransportEngine>>,
    sink_factory: Option<Arc<dyn SinkFactory>>,
    sink_options: SinkOptions,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Start from the default configuration for `api_key`
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(api_key))
    }

    /// Start from an existing configuration, e.g. [`ClientConfig::from_env`]
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            engine: None,
            sink_factory: None,
            sink_options: SinkOptions::playback(),
            http_client: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn noise_cancellation(mut self, enabled: bool) -> Self {
        self.config.noise_cancellation = enabled;
        self
    }

    /// Transport engine used to create call sessions (required)
    pub fn engine(mut self, engine: Arc<dyn TransportEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Factory for remote audio sinks (required)
    pub fn sink_factory(mut self, factory: Arc<dyn SinkFactory>) -> Self {
        self.sink_factory = Some(factory);
        self
    }

    /// Override the options every sink is created with
    pub fn sink_options(mut self, options: SinkOptions) -> Self {
        self.sink_options = options;
        self
    }

    /// Share an existing HTTP client; timeout and user agent settings are then ignored
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Validate the configuration and build the client
    pub fn build(self) -> ClientResult<CallClient> {
        self.config.validate()?;

        let engine = self
            .engine
            .ok_or_else(|| ClientError::config("a transport engine is required"))?;
        let sink_factory = self
            .sink_factory
            .ok_or_else(|| ClientError::config("a sink factory is required"))?;

        let signaling = match self.http_client {
            Some(http_client) => {
                SignalingClient::with_http_client(&self.config.base_url, &self.config.api_key, http_client)
            }
            None => SignalingClient::with_timeout(
                &self.config.base_url,
                &self.config.api_key,
                self.config.request_timeout,
                &self.config.user_agent,
            )?,
        };

        tracing::debug!("Building call client for {}", signaling.base_url());

        let sinks = Arc::new(MediaSinkManager::with_options(sink_factory, self.sink_options));
        Ok(CallClient::from_parts(self.config, signaling, engine, sinks))
    }
}
