//! Activity events pushed by the backend.
//!
//! Events are opaque JSON values. Most carry a `type` discriminator, which
//! [`ActivityEvent::kind`] exposes as an [`EventKind`]; all other fields are
//! passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Known event discriminators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A job changed state; the job record is under `job`.
    JobUpdate,
    /// The job queue was paused.
    QueuePaused,
    /// The job queue was resumed.
    QueueResumed,
    /// Finished jobs were cleaned up.
    Cleanup,
    /// Any other discriminator.
    Other(String),
}

impl EventKind {
    fn parse(s: &str) -> Self {
        match s {
            "job_update" => EventKind::JobUpdate,
            "queue_paused" => EventKind::QueuePaused,
            "queue_resumed" => EventKind::QueueResumed,
            "cleanup" => EventKind::Cleanup,
            other => EventKind::Other(other.to_string()),
        }
    }

    /// Get the wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::JobUpdate => "job_update",
            EventKind::QueuePaused => "queue_paused",
            EventKind::QueueResumed => "queue_resumed",
            EventKind::Cleanup => "cleanup",
            EventKind::Other(s) => s,
        }
    }
}

/// A structured event received on the activity channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityEvent(Value);

impl ActivityEvent {
    /// Wrap a JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Get the raw `type` field, if present.
    #[must_use]
    pub fn kind_str(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Get the event kind, if the payload carries a `type` field.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        self.kind_str().map(EventKind::parse)
    }

    /// Get a top-level field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get the job record of a `job_update` event.
    #[must_use]
    pub fn job(&self) -> Option<&Value> {
        self.0.get("job")
    }

    /// Borrow the raw payload.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Take the raw payload.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ActivityEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
