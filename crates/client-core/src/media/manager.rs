//! Media Sink Manager
//!
//! Owns the participant id → sink mapping for the lifetime of the client.
//!
//! Creating a sink is split in two so callers can keep per-participant
//! ordering without waiting for playback to start:
//!
//! 1. [`MediaSinkManager::prepare_sink`] reserves the participant's slot
//!    synchronously, releasing any sink it held.
//! 2. [`MediaSinkManager::start_sink`] builds and starts the sink. It may be
//!    awaited on another task; if the slot was destroyed, released or
//!    reserved again in the meantime, the new sink is released instead of
//!    stored.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::media::sink::{AudioSink, MediaError, MediaResult, SinkFactory, SinkOptions};
use crate::transport::{MediaTrack, TrackKind};

/// A reserved sink slot, redeemed by [`MediaSinkManager::start_sink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkTicket {
    participant_id: String,
    track: MediaTrack,
    token: u64,
}

impl SinkTicket {
    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }
}

enum SinkSlot {
    /// Reserved; the sink is being built
    Starting { token: u64 },
    /// Sink exists; playback may still be starting
    Ready { token: u64, sink: Arc<dyn AudioSink> },
}

impl SinkSlot {
    fn token(&self) -> u64 {
        match self {
            SinkSlot::Starting { token } | SinkSlot::Ready { token, .. } => *token,
        }
    }

    fn release(self) {
        if let SinkSlot::Ready { sink, .. } = self {
            sink.release();
        }
    }
}

/// Creates, tracks and releases one sink per remote participant
///
/// At most one sink exists per participant id: creating a sink for a
/// participant that already has one releases the old sink first.
pub struct MediaSinkManager {
    /// Platform factory for new sinks
    factory: Arc<dyn SinkFactory>,
    /// Options applied to every sink
    options: SinkOptions,
    /// Slots by participant session id
    sinks: DashMap<String, SinkSlot>,
    next_token: AtomicU64,
}

impl fmt::Debug for MediaSinkManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSinkManager")
            .field("options", &self.options)
            .field("participants", &self.participant_ids())
            .finish()
    }
}

impl MediaSinkManager {
    /// Create a manager using unmuted, auto-playing sinks
    pub fn new(factory: Arc<dyn SinkFactory>) -> Self {
        Self::with_options(factory, SinkOptions::playback())
    }

    /// Create a manager with explicit sink options
    pub fn with_options(factory: Arc<dyn SinkFactory>, options: SinkOptions) -> Self {
        Self {
            factory,
            options,
            sinks: DashMap::new(),
            next_token: AtomicU64::new(1),
        }
    }

    /// Build and start a sink for `participant_id` bound to `track`
    pub async fn create_sink(&self, participant_id: &str, track: &MediaTrack) -> MediaResult<()> {
        let ticket = self.prepare_sink(participant_id, track)?;
        self.start_sink(ticket).await
    }

    /// Reserve the slot for `participant_id`, releasing any sink it held
    pub fn prepare_sink(&self, participant_id: &str, track: &MediaTrack) -> MediaResult<SinkTicket> {
        if track.kind != TrackKind::Audio {
            return Err(MediaError::UnsupportedTrack {
                track_id: track.id.clone(),
                kind: track.kind,
            });
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        if let Some(previous) = self
            .sinks
            .insert(participant_id.to_string(), SinkSlot::Starting { token })
        {
            tracing::debug!(%participant_id, "Replacing existing sink");
            previous.release();
        }

        Ok(SinkTicket {
            participant_id: participant_id.to_string(),
            track: track.clone(),
            token,
        })
    }

    /// Build the reserved sink and start playback
    ///
    /// Returns `Ok(())` without storing the sink when its slot was taken
    /// away while it was being built or started.
    pub async fn start_sink(&self, ticket: SinkTicket) -> MediaResult<()> {
        let SinkTicket {
            participant_id,
            track,
            token,
        } = ticket;

        let sink: Arc<dyn AudioSink> = match self.factory.create_sink(&participant_id, &track, self.options).await {
            Ok(sink) => Arc::from(sink),
            Err(e) => {
                self.sinks.remove_if(&participant_id, |_, slot| slot.token() == token);
                return Err(e);
            }
        };

        let stored = match self.sinks.get_mut(&participant_id) {
            Some(mut slot) if slot.token() == token => {
                *slot = SinkSlot::Ready {
                    token,
                    sink: sink.clone(),
                };
                true
            }
            _ => false,
        };
        if !stored {
            tracing::debug!(%participant_id, "Sink slot was released while building, discarding");
            sink.release();
            return Ok(());
        }

        if let Err(e) = sink.play().await {
            self.sinks.remove_if(&participant_id, |_, slot| slot.token() == token);
            sink.release();
            return Err(e);
        }

        tracing::debug!(%participant_id, track_id = %track.id, "Audio sink started");
        Ok(())
    }

    /// Release the sink for `participant_id`; returns whether one existed
    ///
    /// A sink that is still being built is cancelled.
    pub fn destroy_sink(&self, participant_id: &str) -> bool {
        match self.sinks.remove(participant_id) {
            Some((_, slot)) => {
                slot.release();
                tracing::debug!(%participant_id, "Audio sink released");
                true
            }
            None => false,
        }
    }

    /// Release every sink, including ones still starting; returns how many slots were cleared
    pub fn release_all(&self) -> usize {
        let ids = self.participant_ids();
        let released = ids.iter().filter(|id| self.destroy_sink(id)).count();
        if released > 0 {
            tracing::debug!(released, "Released all audio sinks");
        }
        released
    }

    /// Whether a sink exists (or is being built) for `participant_id`
    pub fn has_sink(&self, participant_id: &str) -> bool {
        self.sinks.contains_key(participant_id)
    }

    /// Number of sink slots
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Participants that currently have a sink
    pub fn participant_ids(&self) -> Vec<String> {
        self.sinks.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Journal {
        created: Mutex<Vec<String>>,
        released: Mutex<Vec<String>>,
        options: Mutex<Vec<SinkOptions>>,
    }

    struct FakeSink {
        participant_id: String,
        fail_play: bool,
        journal: Arc<Journal>,
    }

    #[async_trait]
    impl AudioSink for FakeSink {
        fn participant_id(&self) -> &str {
            &self.participant_id
        }

        async fn play(&self) -> MediaResult<()> {
            if self.fail_play {
                return Err(MediaError::Playback {
                    participant_id: self.participant_id.clone(),
                    message: "autoplay blocked".to_string(),
                });
            }
            Ok(())
        }

        fn release(&self) {
            self.journal.released.lock().push(self.participant_id.clone());
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        journal: Arc<Journal>,
        fail_play: bool,
    }

    #[async_trait]
    impl SinkFactory for FakeFactory {
        async fn create_sink(
            &self,
            participant_id: &str,
            _track: &MediaTrack,
            options: SinkOptions,
        ) -> MediaResult<Box<dyn AudioSink>> {
            self.journal.created.lock().push(participant_id.to_string());
            self.journal.options.lock().push(options);
            Ok(Box::new(FakeSink {
                participant_id: participant_id.to_string(),
                fail_play: self.fail_play,
                journal: self.journal.clone(),
            }))
        }
    }

    fn manager() -> (MediaSinkManager, Arc<Journal>) {
        let factory = FakeFactory::default();
        let journal = factory.journal.clone();
        (MediaSinkManager::new(Arc::new(factory)), journal)
    }

    #[tokio::test]
    async fn test_create_sink_is_unmuted_and_autoplay() {
        let (manager, journal) = manager();

        manager.create_sink("p1", &MediaTrack::audio("t1")).await.unwrap();

        assert!(manager.has_sink("p1"));
        assert_eq!(*journal.options.lock(), vec![SinkOptions { muted: false, autoplay: true }]);
    }

    #[tokio::test]
    async fn test_one_sink_per_participant() {
        let (manager, journal) = manager();

        manager.create_sink("p1", &MediaTrack::audio("t1")).await.unwrap();
        manager.create_sink("p1", &MediaTrack::audio("t2")).await.unwrap();

        assert_eq!(manager.len(), 1);
        assert_eq!(*journal.created.lock(), vec!["p1", "p1"]);
        assert_eq!(*journal.released.lock(), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_video_track_is_rejected() {
        let (manager, journal) = manager();

        let result = manager.create_sink("p1", &MediaTrack::video("v1")).await;

        assert!(matches!(result, Err(MediaError::UnsupportedTrack { .. })));
        assert!(manager.is_empty());
        assert!(journal.created.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_playback_releases_sink() {
        let factory = FakeFactory {
            fail_play: true,
            ..Default::default()
        };
        let journal = factory.journal.clone();
        let manager = MediaSinkManager::new(Arc::new(factory));

        let result = manager.create_sink("p1", &MediaTrack::audio("t1")).await;

        assert!(matches!(result, Err(MediaError::Playback { .. })));
        assert!(!manager.has_sink("p1"));
        assert_eq!(*journal.released.lock(), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_destroy_unknown_participant_is_noop() {
        let (manager, journal) = manager();

        assert!(!manager.destroy_sink("nobody"));
        assert!(journal.released.lock().is_empty());
    }

    #[tokio::test]
    async fn test_release_all() {
        let (manager, journal) = manager();
        manager.create_sink("p1", &MediaTrack::audio("t1")).await.unwrap();
        manager.create_sink("p2", &MediaTrack::audio("t2")).await.unwrap();

        assert_eq!(manager.release_all(), 2);
        assert!(manager.is_empty());

        let mut released = journal.released.lock().clone();
        released.sort();
        assert_eq!(released, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_destroy_before_start_cancels_sink() {
        let (manager, journal) = manager();

        let ticket = manager.prepare_sink("p1", &MediaTrack::audio("t1")).unwrap();
        assert!(manager.has_sink("p1"));
        assert!(manager.destroy_sink("p1"));

        manager.start_sink(ticket).await.unwrap();

        assert!(!manager.has_sink("p1"));
        assert_eq!(*journal.created.lock(), vec!["p1"]);
        assert_eq!(*journal.released.lock(), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_release_all_before_start_cancels_sink() {
        let (manager, journal) = manager();

        let ticket = manager.prepare_sink("p1", &MediaTrack::audio("t1")).unwrap();
        assert_eq!(manager.release_all(), 1);

        manager.start_sink(ticket).await.unwrap();

        assert!(manager.is_empty());
        assert_eq!(*journal.released.lock(), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_newer_reservation_wins() {
        let (manager, journal) = manager();

        let stale = manager.prepare_sink("p1", &MediaTrack::audio("t1")).unwrap();
        let fresh = manager.prepare_sink("p1", &MediaTrack::audio("t2")).unwrap();

        manager.start_sink(fresh).await.unwrap();
        manager.start_sink(stale).await.unwrap();

        assert_eq!(manager.len(), 1);
        assert_eq!(*journal.created.lock(), vec!["p1", "p1"]);
        // Only the stale sink was discarded
        assert_eq!(*journal.released.lock(), vec!["p1"]);
    }
}
