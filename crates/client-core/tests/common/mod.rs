//! Shared fixtures for client integration tests
//!
//! - [`ScriptedEngine`]: an in-memory transport engine that records every
//!   operation and lets tests inject transport events
//! - [`RecordingSinks`]: a sink factory that records creation and release
//! - wiremock helpers for the signaling endpoint
//! - [`init_tracing`]: client logs in test output, filtered by `RUST_LOG`

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{mpsc, Notify};
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use happyrobot_client_core::{
    AudioSink, CallClient, CallEvent, CallState, EventKind, InputSettings, JoinOptions, MediaError,
    MediaResult, MediaTrack, SessionHandle, SessionOptions, SinkFactory, SinkOptions,
    SubscribedTracks, TransportEngine, TransportError, TransportEvent, TransportResult,
    TransportSession,
};

pub const API_KEY: &str = "hr_test_key";
pub const CALL_ID: &str = "call-123";
pub const JOIN_URL: &str = "https://rooms.example.com/assistant-room";

// ---------------------------------------------------------------------------
// Transport engine
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EngineState {
    ops: Mutex<Vec<String>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
    destroyed: AtomicUsize,
    fail_create: AtomicBool,
    fail_join: AtomicBool,
    fail_input_settings: AtomicBool,
    fail_subscribe: AtomicBool,
    hold_create: Mutex<Option<Arc<Notify>>>,
    hold_join: Mutex<Option<Arc<Notify>>>,
    hold_subscribe: Mutex<Option<Arc<Notify>>>,
}

impl EngineState {
    fn record(&self, op: impl Into<String>) {
        self.ops.lock().push(op.into());
    }
}

/// Transport engine driven by the test
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<EngineState>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self) {
        self.state.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_join(&self) {
        self.state.fail_join.store(true, Ordering::SeqCst);
    }

    pub fn fail_input_settings(&self) {
        self.state.fail_input_settings.store(true, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self) {
        self.state.fail_subscribe.store(true, Ordering::SeqCst);
    }

    /// Make the next `create_session` wait until the returned gate is notified
    pub fn hold_create(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.state.hold_create.lock() = Some(gate.clone());
        gate
    }

    /// Make the next `join` wait until the returned gate is notified
    pub fn hold_join(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.state.hold_join.lock() = Some(gate.clone());
        gate
    }

    /// Make the next `update_subscribed_tracks` wait until the returned gate is notified
    ///
    /// The operation is recorded before it waits.
    pub fn hold_subscribe(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.state.hold_subscribe.lock() = Some(gate.clone());
        gate
    }

    /// Operations performed so far, in order
    pub fn ops(&self) -> Vec<String> {
        self.state.ops.lock().clone()
    }

    pub fn sessions_created(&self) -> usize {
        self.state.senders.lock().len()
    }

    pub fn destroyed(&self) -> usize {
        self.state.destroyed.load(Ordering::SeqCst)
    }

    /// Deliver `event` on the most recent session
    pub fn emit(&self, event: TransportEvent) {
        let senders = self.state.senders.lock();
        let sender = senders.last().expect("no session created");
        // The client may already have stopped listening
        let _ = sender.send(event);
    }

    pub fn emit_listening(&self) {
        self.emit(TransportEvent::AppMessage {
            data: json!("listening"),
            from_id: "assistant".to_string(),
        });
    }
}

#[async_trait]
impl TransportEngine for ScriptedEngine {
    async fn create_session(&self, options: SessionOptions) -> TransportResult<SessionHandle> {
        self.state.record(format!(
            "create:audio={},video={}",
            options.audio_source, options.video_source
        ));

        let gate = self.state.hold_create.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.state.fail_create.load(Ordering::SeqCst) {
            return Err(TransportError::engine("engine unavailable"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.state.senders.lock().push(tx);

        Ok(SessionHandle {
            session: Arc::new(ScriptedSession {
                state: self.state.clone(),
            }),
            events: rx,
        })
    }
}

struct ScriptedSession {
    state: Arc<EngineState>,
}

#[async_trait]
impl TransportSession for ScriptedSession {
    async fn join(&self, options: JoinOptions) -> TransportResult<()> {
        self.state.record(format!(
            "join:{}:auto_subscribe={}",
            options.url, options.subscribe_to_tracks_automatically
        ));

        let gate = self.state.hold_join.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.state.fail_join.load(Ordering::SeqCst) {
            return Err(TransportError::join("room expired"));
        }
        Ok(())
    }

    async fn update_input_settings(&self, settings: InputSettings) -> TransportResult<()> {
        let processor = serde_json::to_string(&settings.audio_processor).unwrap_or_default();
        self.state.record(format!("input:{}", processor.trim_matches('"')));
        if self.state.fail_input_settings.load(Ordering::SeqCst) {
            return Err(TransportError::configuration("processor not supported"));
        }
        Ok(())
    }

    async fn update_subscribed_tracks(
        &self,
        participant_id: &str,
        tracks: SubscribedTracks,
    ) -> TransportResult<()> {
        self.state.record(format!(
            "subscribe:{participant_id}:audio={},video={}",
            tracks.audio, tracks.video
        ));

        let gate = self.state.hold_subscribe.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.state.fail_subscribe.load(Ordering::SeqCst) {
            return Err(TransportError::media("subscription rejected"));
        }
        Ok(())
    }

    async fn destroy(&self) -> TransportResult<()> {
        self.state.record("destroy");
        self.state.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SinkJournal {
    created: Mutex<Vec<(String, String)>>,
    released: Mutex<Vec<String>>,
    options: Mutex<Vec<SinkOptions>>,
    fail_create: AtomicBool,
    stall_playback: AtomicBool,
    playing: AtomicUsize,
}

/// Sink factory that records what the client does with sinks
#[derive(Clone, Default)]
pub struct RecordingSinks {
    journal: Arc<SinkJournal>,
}

impl RecordingSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self) {
        self.journal.fail_create.store(true, Ordering::SeqCst);
    }

    /// Make `play()` of every sink created from now on never finish
    pub fn stall_playback(&self) {
        self.journal.stall_playback.store(true, Ordering::SeqCst);
    }

    /// Number of `play()` calls that have begun
    pub fn playing(&self) -> usize {
        self.journal.playing.load(Ordering::SeqCst)
    }

    /// `(participant_id, track_id)` of every sink created
    pub fn created(&self) -> Vec<(String, String)> {
        self.journal.created.lock().clone()
    }

    pub fn released(&self) -> Vec<String> {
        self.journal.released.lock().clone()
    }

    pub fn options(&self) -> Vec<SinkOptions> {
        self.journal.options.lock().clone()
    }
}

struct RecordingSink {
    participant_id: String,
    released: AtomicBool,
    stall: bool,
    journal: Arc<SinkJournal>,
}

#[async_trait]
impl AudioSink for RecordingSink {
    fn participant_id(&self) -> &str {
        &self.participant_id
    }

    async fn play(&self) -> MediaResult<()> {
        self.journal.playing.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.journal.released.lock().push(self.participant_id.clone());
        }
    }
}

#[async_trait]
impl SinkFactory for RecordingSinks {
    async fn create_sink(
        &self,
        participant_id: &str,
        track: &MediaTrack,
        options: SinkOptions,
    ) -> MediaResult<Box<dyn AudioSink>> {
        if self.journal.fail_create.load(Ordering::SeqCst) {
            return Err(MediaError::SinkCreation {
                participant_id: participant_id.to_string(),
                message: "no output device".to_string(),
            });
        }

        self.journal
            .created
            .lock()
            .push((participant_id.to_string(), track.id.clone()));
        self.journal.options.lock().push(options);

        Ok(Box::new(RecordingSink {
            participant_id: participant_id.to_string(),
            released: AtomicBool::new(false),
            stall: self.journal.stall_playback.load(Ordering::SeqCst),
            journal: self.journal.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Signaling
// ---------------------------------------------------------------------------

/// Answer every web call request with [`CALL_ID`] and [`JOIN_URL`]
pub async fn mount_web_call(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/call/web"))
        .and(header("authorization", format!("Bearer {API_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": CALL_ID,
            "url": JOIN_URL,
        })))
        .mount(server)
        .await;
}

/// Reject every web call request with `status`
pub async fn mount_web_call_failure(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/api/call/web"))
        .respond_with(ResponseTemplate::new(status).set_body_string("assistant not found"))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Route client logs to the test harness; `RUST_LOG` overrides the filter
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("happyrobot_client_core=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn client(server: &MockServer, engine: &ScriptedEngine, sinks: &RecordingSinks) -> CallClient {
    init_tracing();
    CallClient::builder(API_KEY)
        .base_url(format!("{}/", server.uri()))
        .request_timeout(Duration::from_secs(5))
        .engine(Arc::new(engine.clone()))
        .sink_factory(Arc::new(sinks.clone()))
        .build()
        .expect("valid client configuration")
}

/// An emitted event together with the client state listeners observed
#[derive(Debug, Clone)]
pub struct Observed {
    pub event: CallEvent,
    pub state: CallState,
    pub call_id: Option<String>,
}

impl Observed {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

/// Record every event emitted by `client`, with the state seen by listeners
///
/// Listeners hold a weak handle, so observing does not keep the client alive.
pub fn observe(client: &CallClient) -> Arc<Mutex<Vec<Observed>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let log = log.clone();
        let observer = client.downgrade();
        client.on(kind, move |event| {
            let Some(observer) = observer.upgrade() else {
                return;
            };
            log.lock().push(Observed {
                event: event.clone(),
                state: observer.state(),
                call_id: observer.call_id(),
            });
        });
    }
    log
}

pub fn kinds(log: &Arc<Mutex<Vec<Observed>>>) -> Vec<EventKind> {
    log.lock().iter().map(Observed::kind).collect()
}

/// Start a call and wait until it is active
pub async fn start_active(client: &CallClient) {
    client.start("assistant-1").await;
    assert_eq!(client.state(), CallState::Active, "call did not become active");
}

/// Poll `condition` until it holds, failing after a second
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Let spawned tasks drain pending events
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
