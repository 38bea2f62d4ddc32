//! Call client
//!
//! [`CallClient`] drives one call at a time through
//! `Idle -> Requesting -> Active -> Idle`:
//!
//! 1. `start` asks the signaling endpoint for a call, creates an audio-only
//!    transport session, joins the room with manual track subscription and
//!    enables noise cancellation.
//! 2. While active, transport events are translated into
//!    [`CallEvent`](crate::events::CallEvent)s and sink operations.
//! 3. `stop`, `left-meeting` or a transport error tear the session down and
//!    release every sink.
//!
//! Start failures are not returned to the caller. They tear down the
//! attempt and surface as a single `error` event.
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use happyrobot_client_core::{CallClient, TransportEngine, SinkFactory};
//! # async fn run(engine: Arc<dyn TransportEngine>, sinks: Arc<dyn SinkFactory>) {
//! let client = CallClient::new("hr_live_key", None, engine, sinks).unwrap();
//!
//! client.events().on_call_started(|| println!("assistant is listening"));
//! client.events().on_error(|e| eprintln!("call failed: {e}"));
//!
//! client.start("assistant-123").await;
//! // ...
//! client.stop().await;
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::client::builder::ClientBuilder;
use crate::client::config::ClientConfig;
use crate::client::events::{translate, TransportAction, Translation};
use crate::client::lifecycle::{Lifecycle, Teardown};
use crate::client::types::CallState;
use crate::error::ClientResult;
use crate::events::{CallEvent, EventEmitter, EventKind, EventStream, ListenerId};
use crate::media::MediaSinkManager;
use crate::signaling::{CallSession, SignalingClient};
use crate::transport::{
    InputSettings, JoinOptions, MediaTrack, SessionHandle, SessionOptions, SubscribedTracks, TransportEngine,
    TransportEvent, TransportEvents, TransportSession,
};

/// How a start attempt finished without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartOutcome {
    Active,
    /// `stop()` or a newer attempt took over while this one was suspended
    Superseded,
}

/// Client-side controller for assistant web calls
///
/// Cloning is cheap and clones share the same call.
#[derive(Clone)]
pub struct CallClient {
    inner: Arc<ClientInner>,
}

/// Non-owning handle to a [`CallClient`]
///
/// Listeners that need to reach the client should capture this instead of
/// a clone; see [`CallClient::on`].
#[derive(Clone)]
pub struct WeakCallClient {
    inner: Weak<ClientInner>,
}

impl WeakCallClient {
    /// The client, if it has not been dropped
    pub fn upgrade(&self) -> Option<CallClient> {
        self.inner.upgrade().map(|inner| CallClient { inner })
    }
}

impl fmt::Debug for WeakCallClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCallClient")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

pub(crate) struct ClientInner {
    config: ClientConfig,
    signaling: SignalingClient,
    engine: Arc<dyn TransportEngine>,
    sinks: Arc<MediaSinkManager>,
    emitter: EventEmitter,
    lifecycle: Mutex<Lifecycle>,
    /// Held while the event pump checks its generation and emits, and while
    /// teardown invalidates the generation
    emit_lock: Mutex<()>,
}

impl fmt::Debug for CallClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallClient")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .field("call_id", &self.call_id())
            .finish()
    }
}

impl CallClient {
    /// Create a client for `api_key`
    ///
    /// `base_url` defaults to the production endpoint. A trailing slash is
    /// accepted.
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        engine: Arc<dyn TransportEngine>,
        sink_factory: Arc<dyn crate::media::SinkFactory>,
    ) -> ClientResult<Self> {
        let mut builder = ClientBuilder::new(api_key)
            .engine(engine)
            .sink_factory(sink_factory);
        if let Some(base_url) = base_url {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }

    /// Start building a client
    pub fn builder(api_key: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(api_key)
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        signaling: SignalingClient,
        engine: Arc<dyn TransportEngine>,
        sinks: Arc<MediaSinkManager>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                signaling,
                engine,
                sinks,
                emitter: EventEmitter::new(),
                lifecycle: Mutex::new(Lifecycle::new()),
                emit_lock: Mutex::new(()),
            }),
        }
    }

    /// Start a call with `assistant_id`
    ///
    /// Ignored unless the client is idle. Returns once the call is active or
    /// the attempt has failed; failures are reported through the `error`
    /// event, after which the client is idle again.
    pub async fn start(&self, assistant_id: &str) {
        let generation = self.inner.lifecycle.lock().begin_attempt();
        let Some(generation) = generation else {
            tracing::debug!("Ignoring start for assistant {}: call already in progress", assistant_id);
            return;
        };

        tracing::info!("Starting web call with assistant {} (attempt {})", assistant_id, generation);

        match self.inner.run_start(generation, assistant_id).await {
            Ok(StartOutcome::Active) => {
                tracing::info!("Web call {:?} is active", self.call_id());
            }
            Ok(StartOutcome::Superseded) => {
                tracing::debug!("Start attempt {} was superseded", generation);
            }
            Err(error) => {
                tracing::error!("Failed to start web call with assistant {}: {}", assistant_id, error);
                if self.inner.teardown(Some(generation)).await.is_some() {
                    self.inner.emitter.emit(CallEvent::error(error));
                }
            }
        }
    }

    /// End the current call or abandon the current attempt
    ///
    /// Idempotent. `call-ended` is emitted only when an active call ends;
    /// abandoning an attempt that is still requesting is silent.
    pub async fn stop(&self) {
        match self.inner.teardown(None).await {
            Some(CallState::Active) => {
                self.inner.emitter.emit(CallEvent::CallEnded);
            }
            Some(previous) => {
                tracing::debug!("Stopped call attempt while {}", previous);
            }
            None => {
                tracing::debug!("Stop requested with no call in progress");
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> CallState {
        self.inner.lifecycle.lock().state()
    }

    /// Identifier of the allocated call, once signaling has answered
    pub fn call_id(&self) -> Option<String> {
        self.inner.lifecycle.lock().call_id().map(str::to_string)
    }

    /// Details of the allocated call, once signaling has answered
    pub fn call(&self) -> Option<CallSession> {
        self.inner.lifecycle.lock().call().cloned()
    }

    pub fn is_active(&self) -> bool {
        self.state() == CallState::Active
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Event surface, including the typed `on_*` helpers
    pub fn events(&self) -> &EventEmitter {
        &self.inner.emitter
    }

    /// Non-owning handle for use inside listeners
    pub fn downgrade(&self) -> WeakCallClient {
        WeakCallClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Register `listener` for `kind`
    ///
    /// Listeners are owned by the client. A listener that captures a
    /// `CallClient` clone keeps the client alive through its own listener
    /// list, so dropping every other handle no longer tears the call down.
    /// Capture [`CallClient::downgrade`] instead, or remove the listener
    /// before dropping the client.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&CallEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.on(kind, listener)
    }

    /// Register `listener` for the next `kind` event only
    ///
    /// Until it fires, the listener is owned by the client like those
    /// registered with [`CallClient::on`].
    pub fn once<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&CallEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.once(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.emitter.off(id)
    }

    /// Remove every listener for `kind`, or all listeners
    pub fn remove_all_listeners(&self, kind: Option<EventKind>) {
        self.inner.emitter.remove_all_listeners(kind)
    }

    /// Stream of every event emitted from now on
    pub fn subscribe(&self) -> EventStream {
        self.inner.emitter.subscribe()
    }

    /// Participants that currently have an audio sink
    pub fn active_sinks(&self) -> Vec<String> {
        self.inner.sinks.participant_ids()
    }
}

impl ClientInner {
    async fn run_start(self: &Arc<Self>, generation: u64, assistant_id: &str) -> ClientResult<StartOutcome> {
        let call = self.signaling.request_call(assistant_id).await?;
        let join_url = call.join_url.clone();
        let call_id = call.id.clone();

        let attached = self.lifecycle.lock().attach_call(generation, call);
        if !attached {
            return Ok(StartOutcome::Superseded);
        }
        tracing::debug!("Allocated call {} for assistant {}", call_id, assistant_id);

        let SessionHandle { session, events } = self.engine.create_session(SessionOptions::audio_only()).await?;

        let attached = self.lifecycle.lock().attach_session(generation, session.clone());
        if !attached {
            tracing::debug!("Discarding session created for superseded call {}", call_id);
            if let Err(e) = session.destroy().await {
                tracing::warn!("Failed to destroy superseded session: {}", e);
            }
            return Ok(StartOutcome::Superseded);
        }

        session.join(JoinOptions::manual_subscription(join_url)).await?;

        if self.config.noise_cancellation {
            let current = self.lifecycle.lock().is_current(generation);
            if !current {
                return Ok(StartOutcome::Superseded);
            }
            session.update_input_settings(InputSettings::noise_cancellation()).await?;
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let activated = self.lifecycle.lock().activate(generation, shutdown_tx);
        if !activated {
            return Ok(StartOutcome::Superseded);
        }

        tokio::spawn(run_event_pump(
            Arc::downgrade(self),
            generation,
            session,
            events,
            shutdown_rx,
        ));

        Ok(StartOutcome::Active)
    }

    /// Tear down `generation` (or whatever is live) and release its resources
    ///
    /// Returns the state that was left, or `None` if there was nothing to
    /// tear down.
    async fn teardown(&self, generation: Option<u64>) -> Option<CallState> {
        let torn = {
            let _emitting = self.emit_lock.lock();
            self.lifecycle.lock().take_for_teardown(generation)
        };
        let Teardown { previous, call, session } = torn?;

        if let Some(session) = session {
            if let Err(e) = session.destroy().await {
                tracing::warn!("Failed to destroy transport session: {}", e);
            }
        }

        let released = self.sinks.release_all();
        match call {
            Some(call) => tracing::info!(
                "Tore down call {} after {}ms (was {}, released {} sinks)",
                call.id,
                call.elapsed().num_milliseconds(),
                previous,
                released
            ),
            None => tracing::info!(
                "Tore down unallocated call attempt (was {}, released {} sinks)",
                previous,
                released
            ),
        }

        Some(previous)
    }

    async fn handle_transport_event(
        &self,
        generation: u64,
        session: &Arc<dyn TransportSession>,
        event: TransportEvent,
    ) {
        let name = event.name();
        let current = self.lifecycle.lock().is_current(generation);
        if !current {
            tracing::debug!("Dropping {} from a finished call", name);
            return;
        }

        tracing::trace!("Transport event: {}", name);
        let Translation { action, event } = translate(event);

        match action {
            Some(TransportAction::Teardown) => {
                // Teardown has already invalidated the generation, so the
                // final event is emitted without the usual check
                if self.teardown(Some(generation)).await.is_some() {
                    if let Some(event) = event {
                        self.emitter.emit(event);
                    }
                }
                return;
            }
            Some(TransportAction::SubscribeAudio { participant_id }) => {
                if let Err(e) = session
                    .update_subscribed_tracks(&participant_id, SubscribedTracks::audio_only())
                    .await
                {
                    tracing::warn!("Failed to subscribe to audio of {}: {}", participant_id, e);
                }
            }
            Some(TransportAction::CreateSink { participant_id, track }) => {
                self.spawn_sink(generation, &participant_id, &track);
            }
            Some(TransportAction::DestroySink { participant_id }) => {
                self.sinks.destroy_sink(&participant_id);
            }
            None => {}
        }

        let Some(event) = event else {
            return;
        };

        let _emitting = self.emit_lock.lock();
        let deliver = match event {
            CallEvent::CallStarted => self.lifecycle.lock().mark_call_started(generation),
            _ => self.lifecycle.lock().is_current(generation),
        };
        if !deliver {
            tracing::debug!("Not emitting {} for {}: repeated or call finished", event.kind(), name);
            return;
        }

        self.emitter.emit(event);
    }

    /// Reserve the participant's sink and start it off the event pump
    ///
    /// The reservation happens in event order, so a later `participant-left`
    /// or teardown always finds and cancels it.
    fn spawn_sink(&self, generation: u64, participant_id: &str, track: &MediaTrack) {
        let ticket = {
            let _emitting = self.emit_lock.lock();
            if !self.lifecycle.lock().is_current(generation) {
                return;
            }
            self.sinks.prepare_sink(participant_id, track)
        };

        let ticket = match ticket {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!("Failed to create audio sink for {}: {}", participant_id, e);
                return;
            }
        };

        let sinks = self.sinks.clone();
        tokio::spawn(async move {
            let participant_id = ticket.participant_id().to_string();
            if let Err(e) = sinks.start_sink(ticket).await {
                tracing::warn!("Failed to create audio sink for {}: {}", participant_id, e);
            }
        });
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        let Some(torn) = self.lifecycle.get_mut().take_for_teardown(None) else {
            return;
        };

        self.sinks.release_all();

        let Some(session) = torn.session else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.destroy().await {
                        tracing::warn!("Failed to destroy session of dropped client: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!("Client dropped outside a Tokio runtime; transport session was not destroyed");
            }
        }
    }
}

/// Forward transport events to the client until shutdown
///
/// Holds only a weak reference so an abandoned client can be dropped while
/// a call is active.
async fn run_event_pump(
    inner: Weak<ClientInner>,
    generation: u64,
    session: Arc<dyn TransportSession>,
    mut events: TransportEvents,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_transport_event(generation, &session, event).await;
    }

    tracing::debug!("Event pump for attempt {} stopped", generation);
}
