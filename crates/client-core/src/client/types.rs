//! Type definitions for the call client

use std::fmt;

/// Lifecycle state of a [`CallClient`](crate::CallClient)
///
/// A failed start attempt does not leave a persistent error state: the
/// client tears down, settles back to [`CallState::Idle`] and reports the
/// failure through the `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallState {
    /// No call; `start` is accepted
    #[default]
    Idle,
    /// Call allocation, session creation or join in flight
    Requesting,
    /// Joined; transport events are being translated
    Active,
}

impl CallState {
    /// Whether a call attempt or call is in progress
    pub fn is_busy(&self) -> bool {
        !matches!(self, CallState::Idle)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Idle => write!(f, "idle"),
            CallState::Requesting => write!(f, "requesting"),
            CallState::Active => write!(f, "active"),
        }
    }
}
