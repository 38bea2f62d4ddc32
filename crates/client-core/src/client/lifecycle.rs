//! Call lifecycle bookkeeping
//!
//! Every call attempt gets a generation number. Teardown bumps the
//! generation, so a continuation that resumes after `stop()` (or after a
//! transport failure) sees a stale generation and discards its result
//! instead of reviving the call.
//!
//! This type holds no locks itself and never awaits; the client keeps it
//! behind a mutex and only touches it between suspension points.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::client::types::CallState;
use crate::signaling::CallSession;
use crate::transport::TransportSession;

/// Resources owned by the current attempt
struct TransportSlot {
    session: Arc<dyn TransportSession>,
    /// Dropping this stops the event pump
    shutdown: Option<oneshot::Sender<()>>,
}

/// What a teardown must release outside the lock
pub(crate) struct Teardown {
    pub previous: CallState,
    pub call: Option<CallSession>,
    pub session: Option<Arc<dyn TransportSession>>,
}

#[derive(Default)]
pub(crate) struct Lifecycle {
    state: CallState,
    generation: u64,
    call: Option<CallSession>,
    transport: Option<TransportSlot>,
    call_started_emitted: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn call_id(&self) -> Option<&str> {
        self.call.as_ref().map(|call| call.id.as_str())
    }

    pub fn call(&self) -> Option<&CallSession> {
        self.call.as_ref()
    }

    /// Move from idle to requesting; `None` if a call is already in progress
    pub fn begin_attempt(&mut self) -> Option<u64> {
        if self.state.is_busy() {
            return None;
        }
        self.generation += 1;
        self.state = CallState::Requesting;
        self.call_started_emitted = false;
        Some(self.generation)
    }

    /// Whether `generation` is still the live attempt
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state.is_busy()
    }

    /// Record the allocated call
    pub fn attach_call(&mut self, generation: u64, call: CallSession) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.call = Some(call);
        true
    }

    /// Record the created session so teardown can destroy it
    pub fn attach_session(&mut self, generation: u64, session: Arc<dyn TransportSession>) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.transport = Some(TransportSlot {
            session,
            shutdown: None,
        });
        true
    }

    /// Mark the attempt active and arm the pump's shutdown signal
    pub fn activate(&mut self, generation: u64, shutdown: oneshot::Sender<()>) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        let Some(slot) = self.transport.as_mut() else {
            return false;
        };
        slot.shutdown = Some(shutdown);
        self.state = CallState::Active;
        true
    }

    /// Returns `true` the first time it is called for an active generation
    pub fn mark_call_started(&mut self, generation: u64) -> bool {
        if self.state != CallState::Active || self.generation != generation || self.call_started_emitted {
            return false;
        }
        self.call_started_emitted = true;
        true
    }

    /// Go idle and hand back what must be released
    ///
    /// With `Some(generation)`, only that attempt is torn down. Returns
    /// `None` when there is nothing to tear down, which makes repeated
    /// teardowns harmless.
    pub fn take_for_teardown(&mut self, generation: Option<u64>) -> Option<Teardown> {
        if generation.is_some_and(|g| g != self.generation) || !self.state.is_busy() {
            return None;
        }

        let previous = std::mem::take(&mut self.state);
        self.generation += 1;
        self.call_started_emitted = false;

        let session = self.transport.take().map(|slot| {
            drop(slot.shutdown);
            slot.session
        });

        Some(Teardown {
            previous,
            call: self.call.take(),
            session,
        })
    }
}
