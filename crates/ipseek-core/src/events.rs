//! Reconciliation events
//!
//! Outcomes of fire-and-forget reconciliation are never returned to the
//! trigger caller. Besides logs, they are published here so embedders and
//! tests can observe them.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Events emitted while reconciling objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// A reconciliation task was started for an object
    Scheduled {
        group: String,
        object: String,
        address: String,
    },

    /// One attempt failed
    AttemptFailed {
        group: String,
        object: String,
        attempt: u32,
    },

    /// The object reached the desired state
    Succeeded {
        group: String,
        object: String,
        attempts: u32,
    },

    /// Every allowed attempt failed
    Exhausted {
        group: String,
        object: String,
        attempts: u32,
    },

    /// No driver is registered for the object's type; no attempt was made
    UnknownType {
        group: String,
        object: String,
        object_type: String,
    },
}

impl ReconcileEvent {
    /// Whether this event ends the object's reconciliation task
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcileEvent::Succeeded { .. }
                | ReconcileEvent::Exhausted { .. }
                | ReconcileEvent::UnknownType { .. }
        )
    }

    /// Short event name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileEvent::Scheduled { .. } => "scheduled",
            ReconcileEvent::AttemptFailed { .. } => "attempt_failed",
            ReconcileEvent::Succeeded { .. } => "succeeded",
            ReconcileEvent::Exhausted { .. } => "exhausted",
            ReconcileEvent::UnknownType { .. } => "unknown_type",
        }
    }

    /// Name of the object the event is about
    pub fn object(&self) -> &str {
        match self {
            ReconcileEvent::Scheduled { object, .. }
            | ReconcileEvent::AttemptFailed { object, .. }
            | ReconcileEvent::Succeeded { object, .. }
            | ReconcileEvent::Exhausted { object, .. }
            | ReconcileEvent::UnknownType { object, .. } => object,
        }
    }
}

/// Non-blocking sender half shared by every reconciliation task
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ReconcileEvent>,
}

impl EventSink {
    /// Create a sink and the matching receiver
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ReconcileEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Emit an event
    ///
    /// Never waits: a full channel drops the event with a warning, a closed
    /// one (nobody listening) drops it silently.
    pub fn emit(&self, event: ReconcileEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    "Event channel full, dropping {} event for {}",
                    event.kind(),
                    event.object()
                );
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
