//! Signaling client
//!
//! Asks the HappyRobot API to allocate a web call for an assistant and returns
//! the room URL the transport engine should join.
//!
//! ```text
//! POST {base_url}/api/call/web
//! Authorization: Bearer <api key>
//! {"assistant_id": "..."}
//!
//! 200 {"id": "...", "url": "https://..."}
//! ```
//!
//! A single attempt is made; any failure aborts the call start.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Path of the web call endpoint, relative to the base URL
pub const WEB_CALL_PATH: &str = "/api/call/web";

/// Maximum length of a response body quoted in an error
const MAX_ERROR_BODY_LEN: usize = 256;

/// Signaling failures
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid web call response: {reason}")]
    InvalidResponse { reason: String },
}

/// A call allocated by the signaling endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    /// Call identifier, exposed to hosts as `call_id`
    pub id: String,
    /// Room URL for the transport engine
    pub join_url: String,
    /// When the endpoint answered
    pub created_at: DateTime<Utc>,
}

impl CallSession {
    /// Time since the endpoint allocated the call
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.created_at)
    }
}

#[derive(Serialize)]
struct WebCallRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Deserialize)]
struct WebCallResponse {
    id: String,
    url: String,
}

/// Truncate an error body to [`MAX_ERROR_BODY_LEN`] characters
fn truncate_error_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LEN {
        let head: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
        format!("{head}...[truncated]")
    } else {
        body.to_string()
    }
}

/// HTTP client for the web call endpoint
#[derive(Clone)]
pub struct SignalingClient {
    base_url: String,
    api_key: String,
    http_client: Client,
}

impl fmt::Debug for SignalingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalingClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl SignalingClient {
    /// Create a client without a request timeout
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_http_client(base_url, api_key, Client::new())
    }

    /// Create a client with its own connection pool and optional timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
        user_agent: &str,
    ) -> Result<Self, SignalingError> {
        let mut builder = Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_http_client(base_url, api_key, builder.build()?))
    }

    /// Create a client on top of an existing `reqwest::Client`
    pub fn with_http_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http_client: Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key: api_key.into(),
            http_client,
        }
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request a web call for `assistant_id`
    ///
    /// Fails on transport errors, non-2xx statuses, unparsable bodies, an
    /// empty call id, or a join URL that is not an absolute URL.
    pub async fn request_call(&self, assistant_id: &str) -> Result<CallSession, SignalingError> {
        let url = format!("{}{}", self.base_url, WEB_CALL_PATH);
        tracing::debug!(%assistant_id, %url, "Requesting web call");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&WebCallRequest { assistant_id })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignalingError::RequestFailed {
                status: status.as_u16(),
                body: truncate_error_body(&body),
            });
        }

        let body = response.text().await?;
        let details: WebCallResponse = serde_json::from_str(&body)?;

        if details.id.trim().is_empty() {
            return Err(SignalingError::InvalidResponse {
                reason: "empty call id".to_string(),
            });
        }
        if let Err(e) = Url::parse(&details.url) {
            return Err(SignalingError::InvalidResponse {
                reason: format!("invalid join url: {e}"),
            });
        }

        tracing::info!(call_id = %details.id, "Web call allocated");

        Ok(CallSession {
            id: details.id,
            join_url: details.url,
            created_at: Utc::now(),
        })
    }
}
