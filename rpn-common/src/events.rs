//! Event types for the RPN event system
//!
//! What an attempt publishes on the [`EventBus`]:
//!
//! - Ran to an outcome: one of `ReportNumberAssigned`, `AssignmentRejected`
//!   or `AssignmentFailed`. An assignment whose save failed is followed by a
//!   `PersistenceWarning` for the same attempt id.
//! - Found another attempt running: `AssignmentDeferred`, with the outcome
//!   published later by the retry.
//!
//! Hosts subscribe to show alerts for user-facing rejections, refresh their
//! form after an assignment, or record an audit trail.

use crate::fields::Field;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// How an attempt was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Explicit user action; gate rejections are surfaced
    Interactive,
    /// Startup or debounced field change; rejections are silent
    Background,
}

impl TriggerMode {
    pub fn from_interactive(interactive: bool) -> Self {
        if interactive {
            TriggerMode::Interactive
        } else {
            TriggerMode::Background
        }
    }

    pub fn is_interactive(self) -> bool {
        self == TriggerMode::Interactive
    }
}

/// RPN event types
///
/// Serializable so hosts can forward them over any transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RpnEvent {
    /// A report number was written and locked
    ReportNumberAssigned {
        attempt_id: Uuid,
        identifier: String,
        sequence: u64,
        /// Max tracker was replaced
        new_max: bool,
        /// Min tracker was replaced
        new_min: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Attempt stopped at the already-assigned or validation gate
    AssignmentRejected {
        attempt_id: Uuid,
        mode: TriggerMode,
        reason: String,
        /// Field named by a validation failure
        missing_field: Option<Field>,
        /// Whether the host should alert the user
        user_facing: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Attempt found another one in progress and was rescheduled
    AssignmentDeferred {
        mode: TriggerMode,
        retry_in_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Attempt aborted on an unexpected fault; nothing was issued
    AssignmentFailed {
        attempt_id: Uuid,
        mode: TriggerMode,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Report number issued but the record save failed
    PersistenceWarning {
        attempt_id: Uuid,
        identifier: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks, slow
/// subscribers see `Lagged`, and dropping a receiver unsubscribes it.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RpnEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use rpn_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RpnEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RpnEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
