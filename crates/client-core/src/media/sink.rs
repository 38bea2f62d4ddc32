//! Audio sink abstraction
//!
//! Platform-agnostic traits for the playback side of a call.

use async_trait::async_trait;
use thiserror::Error;

use crate::transport::{MediaTrack, TrackKind};

/// Result type for sink operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Sink failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// The platform could not build a playback resource
    #[error("Failed to create sink for {participant_id}: {message}")]
    SinkCreation {
        participant_id: String,
        message: String,
    },

    /// The playback resource refused to start
    #[error("Failed to start playback for {participant_id}: {message}")]
    Playback {
        participant_id: String,
        message: String,
    },

    /// Only audio tracks can be rendered
    #[error("Unsupported {kind} track {track_id}")]
    UnsupportedTrack { track_id: String, kind: TrackKind },
}

/// How a sink is configured before playback starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkOptions {
    pub muted: bool,
    pub autoplay: bool,
}

impl SinkOptions {
    /// Unmuted, auto-playing output
    pub fn playback() -> Self {
        Self {
            muted: false,
            autoplay: true,
        }
    }
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self::playback()
    }
}

/// A playback resource bound to one participant's audio track
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Participant the sink renders
    fn participant_id(&self) -> &str;

    /// Start rendering the bound track
    async fn play(&self) -> MediaResult<()>;

    /// Stop rendering and free the resource; must be idempotent
    fn release(&self);
}

/// Creates sinks for the platform the host runs on
#[async_trait]
pub trait SinkFactory: Send + Sync {
    /// Build a sink for `participant_id` bound to `track`, configured with `options`
    async fn create_sink(
        &self,
        participant_id: &str,
        track: &MediaTrack,
        options: SinkOptions,
    ) -> MediaResult<Box<dyn AudioSink>>;
}
