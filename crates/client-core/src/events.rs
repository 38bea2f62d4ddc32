//! Public event surface
//!
//! Hosts observe a call exclusively through five events:
//!
//! | name                 | payload                      |
//! |----------------------|------------------------------|
//! | `call-started`       | none                         |
//! | `call-ended`         | none                         |
//! | `participant-joined` | user name, session id        |
//! | `participant-left`   | session id                   |
//! | `error`              | [`ClientError`]              |
//!
//! Listeners for an event run synchronously, in registration order, on the
//! task that emits it. Events are not buffered: a listener only sees events
//! emitted after it was registered. Async consumers can use
//! [`EventEmitter::subscribe`] instead, which yields the same events in the
//! same order.
//!
//! # Usage
//!
//! ```rust
//! use happyrobot_client_core::events::{CallEvent, EventEmitter, EventKind};
//!
//! let emitter = EventEmitter::new();
//! emitter.on_participant_joined(|user_name, session_id| {
//!     println!("{user_name} joined as {session_id}");
//! });
//! let id = emitter.on(EventKind::CallEnded, |_| println!("call ended"));
//!
//! emitter.emit(CallEvent::CallEnded);
//! assert!(emitter.off(id));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::ClientError;

/// Capacity of the broadcast channel behind [`EventEmitter::subscribe`]
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted to the host application
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The assistant signalled it is listening
    CallStarted,
    /// An active call ended, locally or remotely
    CallEnded,
    /// A remote participant joined
    ParticipantJoined {
        user_name: String,
        session_id: String,
    },
    /// A participant left
    ParticipantLeft { session_id: String },
    /// A call failed to start or the transport failed
    Error { cause: Arc<ClientError> },
}

impl CallEvent {
    /// Wrap an error into an `error` event
    pub fn error(cause: impl Into<ClientError>) -> Self {
        CallEvent::Error {
            cause: Arc::new(cause.into()),
        }
    }

    /// Tag of this event
    pub fn kind(&self) -> EventKind {
        match self {
            CallEvent::CallStarted => EventKind::CallStarted,
            CallEvent::CallEnded => EventKind::CallEnded,
            CallEvent::ParticipantJoined { .. } => EventKind::ParticipantJoined,
            CallEvent::ParticipantLeft { .. } => EventKind::ParticipantLeft,
            CallEvent::Error { .. } => EventKind::Error,
        }
    }
}

/// Tags of the fixed event set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    CallStarted,
    CallEnded,
    ParticipantJoined,
    ParticipantLeft,
    Error,
}

impl EventKind {
    /// Every event tag
    pub const ALL: [EventKind; 5] = [
        EventKind::CallStarted,
        EventKind::CallEnded,
        EventKind::ParticipantJoined,
        EventKind::ParticipantLeft,
        EventKind::Error,
    ];

    /// Stable event name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CallStarted => "call-started",
            EventKind::CallEnded => "call-ended",
            EventKind::ParticipantJoined => "participant-joined",
            EventKind::ParticipantLeft => "participant-left",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by [`EventEmitter::on`] and [`EventEmitter::once`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Listener closure
pub type Listener = Arc<dyn Fn(&CallEvent) + Send + Sync>;

/// Stream of events for async consumers
pub type EventStream = BroadcastStream<CallEvent>;

struct ListenerEntry {
    id: ListenerId,
    once: bool,
    callback: Listener,
}

/// Typed publish/subscribe over [`CallEvent`]
pub struct EventEmitter {
    /// Ordered listeners per event tag
    listeners: Mutex<HashMap<EventKind, Vec<ListenerEntry>>>,
    /// Fan-out for [`subscribe`](Self::subscribe)
    event_tx: broadcast::Sender<CallEvent>,
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        let counts: HashMap<&'static str, usize> = listeners
            .iter()
            .map(|(kind, entries)| (kind.as_str(), entries.len()))
            .collect();
        f.debug_struct("EventEmitter")
            .field("listeners", &counts)
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            listeners: Mutex::new(HashMap::new()),
            event_tx,
        }
    }

    /// Register `listener` for every future `kind` event
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&CallEvent) + Send + Sync + 'static,
    {
        self.add(kind, false, Arc::new(listener))
    }

    /// Register `listener` for the next `kind` event only
    pub fn once<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&CallEvent) + Send + Sync + 'static,
    {
        self.add(kind, true, Arc::new(listener))
    }

    fn add(&self, kind: EventKind, once: bool, callback: Listener) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push(ListenerEntry { id, once, callback });
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        for entries in listeners.values_mut() {
            if let Some(pos) = entries.iter().position(|entry| entry.id == id) {
                entries.remove(pos);
                return true;
            }
        }
        false
    }

    /// Remove the listeners of one event, or of every event when `kind` is `None`
    pub fn remove_all_listeners(&self, kind: Option<EventKind>) {
        let mut listeners = self.listeners.lock();
        match kind {
            Some(kind) => {
                listeners.remove(&kind);
            }
            None => listeners.clear(),
        }
    }

    /// Number of listeners registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Stream every event emitted from now on
    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.event_tx.subscribe())
    }

    /// Deliver `event`; returns whether any listener ran
    ///
    /// The listener list is snapshotted before delivery, so listeners may
    /// register or remove listeners (or emit) without deadlocking. One-shot
    /// listeners are removed before they run.
    pub fn emit(&self, event: CallEvent) -> bool {
        let kind = event.kind();
        let callbacks: Vec<Listener> = {
            let mut listeners = self.listeners.lock();
            match listeners.get_mut(&kind) {
                Some(entries) => {
                    let callbacks = entries.iter().map(|entry| entry.callback.clone()).collect();
                    entries.retain(|entry| !entry.once);
                    callbacks
                }
                None => Vec::new(),
            }
        };

        tracing::debug!(event = %kind, listeners = callbacks.len(), "Emitting event");

        // No subscribers is not an error
        let _ = self.event_tx.send(event.clone());

        for callback in &callbacks {
            callback(&event);
        }
        !callbacks.is_empty()
    }

    /// Listen for `call-started`
    pub fn on_call_started<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on(EventKind::CallStarted, move |_| listener())
    }

    /// Listen for `call-ended`
    pub fn on_call_ended<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on(EventKind::CallEnded, move |_| listener())
    }

    /// Listen for `participant-joined` with `(user_name, session_id)`
    pub fn on_participant_joined<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.on(EventKind::ParticipantJoined, move |event| {
            if let CallEvent::ParticipantJoined {
                user_name,
                session_id,
            } = event
            {
                listener(user_name, session_id);
            }
        })
    }

    /// Listen for `participant-left` with the session id
    pub fn on_participant_left<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::ParticipantLeft, move |event| {
            if let CallEvent::ParticipantLeft { session_id } = event {
                listener(session_id);
            }
        })
    }

    /// Listen for `error`
    pub fn on_error<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        self.on(EventKind::Error, move |event| {
            if let CallEvent::Error { cause } = event {
                listener(cause);
            }
        })
    }
}
