//! Transport event translation
//!
//! Maps raw [`TransportEvent`]s from an active session onto the side effect
//! the client must perform and the [`CallEvent`] it must emit afterwards.
//!
//! | transport event                   | action          | emitted event        |
//! |-----------------------------------|-----------------|----------------------|
//! | `error`                           | teardown        | `error`              |
//! | `left-meeting`                    | teardown        | `call-ended`         |
//! | `participant-joined` (remote)     | subscribe audio | `participant-joined` |
//! | `participant-left`                | destroy sink    | `participant-left`   |
//! | `track-started` (remote, audio)   | create sink     | none                 |
//! | `app-message` with `"listening"`  | none            | `call-started`       |
//! | `joined-meeting`                  | none            | none                 |
//!
//! Everything else, including local participants and video tracks, is
//! ignored. Actions are performed before the event is emitted, so a
//! `call-ended` listener already observes an idle client.

use serde_json::Value;

use crate::events::CallEvent;
use crate::transport::{MediaTrack, TrackKind, TransportEvent};

/// Application message sent by the assistant once it is ready to talk
pub const LISTENING_MESSAGE: &str = "listening";

/// Side effect requested by a transport event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAction {
    /// Destroy the session, release every sink and go idle
    Teardown,
    /// Subscribe to the participant's audio only
    SubscribeAudio { participant_id: String },
    /// Start playback of the participant's audio track
    CreateSink {
        participant_id: String,
        track: MediaTrack,
    },
    /// Release the participant's sink, if any
    DestroySink { participant_id: String },
}

/// Result of translating one transport event
#[derive(Debug, Clone, Default)]
pub struct Translation {
    pub action: Option<TransportAction>,
    pub event: Option<CallEvent>,
}

impl Translation {
    fn ignored() -> Self {
        Self::default()
    }

    fn new(action: Option<TransportAction>, event: Option<CallEvent>) -> Self {
        Self { action, event }
    }

    /// Neither an action nor an event
    pub fn is_ignored(&self) -> bool {
        self.action.is_none() && self.event.is_none()
    }
}

/// Translate a transport event
pub fn translate(event: TransportEvent) -> Translation {
    match event {
        TransportEvent::Error(error) => {
            Translation::new(Some(TransportAction::Teardown), Some(CallEvent::error(error)))
        }

        TransportEvent::LeftMeeting => {
            Translation::new(Some(TransportAction::Teardown), Some(CallEvent::CallEnded))
        }

        TransportEvent::ParticipantJoined(participant) if !participant.local => Translation::new(
            Some(TransportAction::SubscribeAudio {
                participant_id: participant.session_id.clone(),
            }),
            Some(CallEvent::ParticipantJoined {
                user_name: participant.user_name,
                session_id: participant.session_id,
            }),
        ),

        TransportEvent::ParticipantLeft(participant) => Translation::new(
            Some(TransportAction::DestroySink {
                participant_id: participant.session_id.clone(),
            }),
            Some(CallEvent::ParticipantLeft {
                session_id: participant.session_id,
            }),
        ),

        TransportEvent::TrackStarted {
            participant: Some(participant),
            track,
        } if !participant.local && track.kind == TrackKind::Audio => Translation::new(
            Some(TransportAction::CreateSink {
                participant_id: participant.session_id,
                track,
            }),
            None,
        ),

        TransportEvent::AppMessage { data, .. } if is_listening(&data) => {
            Translation::new(None, Some(CallEvent::CallStarted))
        }

        _ => Translation::ignored(),
    }
}

fn is_listening(data: &Value) -> bool {
    matches!(data, Value::String(message) if message == LISTENING_MESSAGE)
}
