//! HappyRobot call client core
//!
//! Client-side lifecycle controller for voice calls with HappyRobot
//! assistants. A call is allocated over HTTP by the signaling endpoint and
//! carried by a pluggable real-time transport engine; remote audio is
//! rendered through platform-provided sinks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────┐
//! │     Host application    │
//! └────────────┬────────────┘
//!              │ start / stop / events
//! ┌────────────▼────────────┐
//! │       CallClient        │  lifecycle, event translation
//! └──┬──────────┬────────┬──┘
//!    │          │        │
//! ┌──▼──────┐ ┌─▼───────┐ ┌▼───────────────┐
//! │Signaling│ │Transport│ │MediaSinkManager│
//! │ (HTTP)  │ │ engine  │ │  (audio sinks) │
//! └─────────┘ └─────────┘ └────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use happyrobot_client_core::{CallClient, ClientBuilder, ClientConfig, TransportEngine, SinkFactory};
//! # async fn run(engine: Arc<dyn TransportEngine>, sinks: Arc<dyn SinkFactory>) -> happyrobot_client_core::ClientResult<()> {
//! let client = ClientBuilder::from_config(ClientConfig::from_env()?)
//!     .engine(engine)
//!     .sink_factory(sinks)
//!     .build()?;
//!
//! client.events().on_participant_joined(|name, id| println!("{name} ({id}) joined"));
//! client.events().on_call_ended(|| println!("call ended"));
//!
//! client.start("assistant-123").await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod events;
pub mod media;
pub mod signaling;
pub mod transport;

pub use client::{CallClient, CallState, ClientBuilder, ClientConfig, WeakCallClient};
pub use error::{ClientError, ClientResult};
pub use events::{CallEvent, EventEmitter, EventKind, EventStream, ListenerId};
pub use media::{AudioSink, MediaError, MediaResult, MediaSinkManager, SinkFactory, SinkOptions, SinkTicket};
pub use signaling::{CallSession, SignalingClient, SignalingError};
pub use transport::{
    AudioProcessor, InputSettings, JoinOptions, MediaTrack, Participant, SessionHandle, SessionOptions,
    SubscribedTracks, TrackKind, TransportEngine, TransportError, TransportEvent, TransportEvents,
    TransportResult, TransportSession,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
