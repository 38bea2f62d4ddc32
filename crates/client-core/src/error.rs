//! Error types for the call client
//!
//! Every failure a host can observe is folded into [`ClientError`]. Failures
//! during [`start`](crate::CallClient::start) never escape as a `Result`; they
//! are delivered through the `error` event carrying an `Arc<ClientError>`.

use thiserror::Error;

use crate::media::MediaError;
use crate::signaling::SignalingError;
use crate::transport::TransportError;

/// Result type for call client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the call client
#[derive(Debug, Error)]
pub enum ClientError {
    /// The signaling endpoint could not allocate a call
    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),

    /// The transport engine reported a failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// An audio sink could not be created or started
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Client configuration was rejected before any call was attempted
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl ClientError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Whether this error originated at the signaling endpoint
    pub fn is_signaling(&self) -> bool {
        matches!(self, Self::Signaling(_))
    }

    /// Whether this error originated in the transport engine
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
