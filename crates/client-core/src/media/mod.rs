//! Audio sinks for remote participants
//!
//! Every remote participant that starts an audio track gets exactly one
//! playback resource ("sink"). Sinks are keyed by the participant's engine
//! session id so they can always be found and released when the participant
//! leaves or the call is torn down.
//!
//! ```text
//! track-started ──▶ MediaSinkManager::prepare_sink ──▶ (spawned) start_sink ──▶ SinkFactory ──▶ AudioSink::play
//! participant-left ──▶ MediaSinkManager::destroy_sink ──▶ AudioSink::release
//! teardown ──▶ MediaSinkManager::release_all
//! ```
//!
//! The platform side (an `<audio>` element, a cpal stream, a mixer input) is
//! supplied by the host through [`SinkFactory`].

pub mod manager;
pub mod sink;

pub use manager::{MediaSinkManager, SinkTicket};
pub use sink::{AudioSink, MediaError, MediaResult, SinkFactory, SinkOptions};
