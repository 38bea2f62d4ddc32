//! Client configuration
//!
//! # Usage
//!
//! ```rust
//! use happyrobot_client_core::client::config::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("hr_live_key")
//!     .with_base_url("https://staging.happyrobot.ai")
//!     .with_request_timeout(Duration::from_secs(10));
//!
//! assert!(config.validate().is_ok());
//! assert!(config.noise_cancellation);
//! ```
//!
//! # Environment
//!
//! [`ClientConfig::from_env`] reads:
//!
//! - `HAPPYROBOT_API_KEY` (required)
//! - `HAPPYROBOT_BASE_URL`
//! - `HAPPYROBOT_REQUEST_TIMEOUT_SECS`

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{ClientError, ClientResult};

/// Production API endpoint
pub const DEFAULT_BASE_URL: &str = "https://app.happyrobot.ai";

/// User agent sent with signaling requests
pub const DEFAULT_USER_AGENT: &str = concat!("happyrobot-client-core/", env!("CARGO_PKG_VERSION"));

pub const ENV_API_KEY: &str = "HAPPYROBOT_API_KEY";
pub const ENV_BASE_URL: &str = "HAPPYROBOT_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "HAPPYROBOT_REQUEST_TIMEOUT_SECS";

/// Call client configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// Bearer token for the signaling endpoint
    pub api_key: String,
    /// API base URL, without the `/api/...` path
    pub base_url: String,
    /// Signaling request timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
    /// User agent for signaling requests
    pub user_agent: String,
    /// Request engine-side noise cancellation on the microphone after joining
    pub noise_cancellation: bool,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("noise_cancellation", &self.noise_cancellation)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration for the production endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            noise_cancellation: true,
        }
    }

    /// Read configuration from the environment
    pub fn from_env() -> ClientResult<Self> {
        let api_key = std::env::var(ENV_API_KEY)
            .map_err(|_| ClientError::config(format!("{ENV_API_KEY} is not set")))?;

        let mut config = Self::new(api_key);

        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            config = config.with_base_url(base_url);
        }

        if let Ok(raw) = std::env::var(ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ClientError::config(format!("{ENV_REQUEST_TIMEOUT_SECS} must be a whole number of seconds, got {raw:?}"))
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Bound every signaling request by `timeout`
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the signaling user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable noise cancellation on the input stream
    pub fn with_noise_cancellation(mut self, enabled: bool) -> Self {
        self.noise_cancellation = enabled;
        self
    }

    /// Check the configuration before any request is made
    pub fn validate(&self) -> ClientResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(ClientError::config("API key is required"));
        }

        let url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::config(format!("invalid base URL {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::config(format!(
                "base URL must use http or https, got {}",
                url.scheme()
            )));
        }

        if self.request_timeout == Some(Duration::ZERO) {
            return Err(ClientError::config("request timeout must be greater than zero"));
        }

        Ok(())
    }
}
