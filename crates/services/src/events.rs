//! Structured notifications for autosave lifecycle and failures.
//!
//! Autosave is best-effort and never interrupts the survey, so its failures
//! do not propagate as errors. Hosts that want to observe them subscribe an
//! [`EventSink`] instead of scraping logs.

use std::sync::{Arc, Mutex, PoisonError};

use clinic_core::model::SessionId;

use crate::error::ApiErrorKind;

/// Why an autosave push was dropped without reaching the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A newer snapshot was submitted before this one was sent.
    Superseded,
    /// The session this snapshot belongs to is no longer active.
    StaleSession,
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressEvent {
    /// A best-effort push failed; the next user action supersedes it.
    AutosaveFailed {
        session_id: SessionId,
        kind: ApiErrorKind,
    },
    /// A push was dropped before sending.
    AutosaveSkipped {
        session_id: SessionId,
        reason: SkipReason,
    },
    /// The backend no longer knows this session (expired server-side).
    SessionExpired { session_id: SessionId },
    /// The survey was submitted and the session torn down.
    SessionCompleted { session_id: SessionId },
}

/// Subscriber for progress events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &ProgressEvent);
}

/// Sink that drops every event; the default when the host does not subscribe.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &ProgressEvent) {}
}

/// Sink that records events in memory, for tests.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True if any recorded event satisfies the predicate.
    pub fn any(&self, predicate: impl Fn(&ProgressEvent) -> bool) -> bool {
        self.events().iter().any(|e| predicate(e))
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
