//! Transport engine boundary
//!
//! The real-time engine (connection negotiation, media transport, noise
//! suppression) lives outside this crate. The client only drives it through
//! [`TransportEngine`] and [`TransportSession`] and reacts to the
//! [`TransportEvent`]s it raises.
//!
//! # Event delivery
//!
//! [`TransportEngine::create_session`] hands back the session together with an
//! unbounded receiver. The engine pushes events in the order it raises them;
//! the client drains them one at a time and never reorders or coalesces them.
//! Engines should drop their sender when the session is destroyed.
//!
//! ```text
//! ┌──────────────┐  create_session   ┌──────────────────┐
//! │  CallClient  │ ────────────────▶ │ TransportEngine  │
//! │              │ ◀──────────────── │                  │
//! │              │  SessionHandle    └──────────────────┘
//! │              │        │
//! │   join / update_*    │ events (mpsc, in order)
//! │   destroy     ▼      ▼
//! └──────── TransportSession ───────────────────────────
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Result type for transport engine operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by the transport engine
///
/// Configuration problems are reported as [`TransportError::Configuration`];
/// there is no separate configuration error category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The engine could not establish or keep its connection
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Joining the call room failed
    #[error("join failed: {message}")]
    Join { message: String },

    /// Media capture, playback or processing failed
    #[error("media failure: {message}")]
    Media { message: String },

    /// The engine rejected the requested settings
    #[error("invalid transport configuration: {message}")]
    Configuration { message: String },

    /// Any other engine-level failure
    #[error("{message}")]
    Engine { message: String },
}

impl TransportError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a join error
    pub fn join(message: impl Into<String>) -> Self {
        Self::Join {
            message: message.into(),
        }
    }

    /// Create a media error
    pub fn media(message: impl Into<String>) -> Self {
        Self::Media {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a generic engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}

/// Options used when the engine creates a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Capture local audio
    pub audio_source: bool,
    /// Capture local video
    pub video_source: bool,
    /// Whether the engine may show its own call UI
    pub show_default_ui: bool,
}

impl SessionOptions {
    /// Audio in/out only, no outbound video, no engine UI
    pub fn audio_only() -> Self {
        Self {
            audio_source: true,
            video_source: false,
            show_default_ui: false,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::audio_only()
    }
}

/// Options for joining the room returned by the signaling endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOptions {
    /// Room URL to join
    pub url: String,
    /// Let the engine subscribe to every remote track on its own
    pub subscribe_to_tracks_automatically: bool,
}

impl JoinOptions {
    /// Join `url` with manual track subscription
    pub fn manual_subscription(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subscribe_to_tracks_automatically: false,
        }
    }
}

/// Audio processor applied to the local input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioProcessor {
    /// Raw microphone input
    None,
    /// Engine-side noise cancellation
    NoiseCancellation,
}

/// Input settings pushed to the engine after joining
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSettings {
    /// Processor for the audio input stream
    pub audio_processor: AudioProcessor,
}

impl InputSettings {
    /// Noise-cancelled microphone input
    pub fn noise_cancellation() -> Self {
        Self {
            audio_processor: AudioProcessor::NoiseCancellation,
        }
    }
}

/// Which remote tracks to receive from a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribedTracks {
    pub audio: bool,
    pub video: bool,
}

impl SubscribedTracks {
    /// Receive audio, ignore video
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }
}

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Engine-side media track
///
/// The `id` is opaque to the client; sink factories use it to bind the
/// engine's track to a playback resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
}

impl MediaTrack {
    /// Create an audio track handle
    pub fn audio(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TrackKind::Audio,
        }
    }

    /// Create a video track handle
    pub fn video(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TrackKind::Video,
        }
    }
}

/// A participant as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Engine session identifier, unique per participant within the call
    pub session_id: String,
    /// Display name
    pub user_name: String,
    /// Whether this is the local user
    pub local: bool,
}

impl Participant {
    /// A remote participant
    pub fn remote(session_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_name: user_name.into(),
            local: false,
        }
    }

    /// The local user
    pub fn local(session_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_name: user_name.into(),
            local: true,
        }
    }
}

/// Raw events raised by the transport engine
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The local transport connection is established
    ///
    /// This does not mean the assistant is ready; see
    /// [`CallEvent::CallStarted`](crate::events::CallEvent::CallStarted).
    JoinedMeeting,
    /// The session left the room, locally or remotely initiated
    LeftMeeting,
    /// Fatal engine error
    Error(TransportError),
    ParticipantJoined(Participant),
    ParticipantLeft(Participant),
    TrackStarted {
        /// Owner of the track, when the engine knows it
        participant: Option<Participant>,
        track: MediaTrack,
    },
    /// Application-level message sent over the engine's data channel
    AppMessage {
        data: serde_json::Value,
        from_id: String,
    },
}

impl TransportEvent {
    /// Engine-style event name, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::JoinedMeeting => "joined-meeting",
            TransportEvent::LeftMeeting => "left-meeting",
            TransportEvent::Error(_) => "error",
            TransportEvent::ParticipantJoined(_) => "participant-joined",
            TransportEvent::ParticipantLeft(_) => "participant-left",
            TransportEvent::TrackStarted { .. } => "track-started",
            TransportEvent::AppMessage { .. } => "app-message",
        }
    }
}

/// Receiving end of a session's event stream
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// A freshly created session and its event stream
pub struct SessionHandle {
    pub session: Arc<dyn TransportSession>,
    pub events: TransportEvents,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &"<transport session>")
            .finish()
    }
}

/// Factory for transport sessions
#[async_trait]
pub trait TransportEngine: Send + Sync {
    /// Create a session; listeners are attached by consuming the returned events
    async fn create_session(&self, options: SessionOptions) -> TransportResult<SessionHandle>;
}

/// An engine session owned by the client while a call is requesting or active
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Join the room at `options.url`
    async fn join(&self, options: JoinOptions) -> TransportResult<()>;

    /// Update processing on the local input stream
    async fn update_input_settings(&self, settings: InputSettings) -> TransportResult<()>;

    /// Choose which tracks to receive from one participant
    async fn update_subscribed_tracks(
        &self,
        participant_id: &str,
        tracks: SubscribedTracks,
    ) -> TransportResult<()>;

    /// Leave the room and release every engine resource
    async fn destroy(&self) -> TransportResult<()>;
}
