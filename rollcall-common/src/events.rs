//! Feedback events for rollcall
//!
//! Every decoded payload that is not suppressed by the debouncer ends in
//! exactly one [`Feedback`]. Front ends render it; the [`EventBus`] fans it
//! out to any number of listeners.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::records::StudentRecord;

/// Outcome of one processed scan, as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Feedback {
    /// Attendance committed to the durable log
    Success {
        record: StudentRecord,
        time: NaiveTime,
    },

    /// Student already present in today's ledger; nothing written
    AlreadyMarked { record: StudentRecord },

    /// Payload did not parse as `StudentID|Name|Class`
    Invalid { reason: String },

    /// Well-formed payload for an ID the directory does not know
    Unknown { student_id: String },

    /// Durable append failed; the scan was not committed and may be retried
    WriteFailed { student_id: String, reason: String },
}

impl Feedback {
    /// Status line for display
    pub fn message(&self) -> String {
        match self {
            Feedback::Success { record, time } => {
                format!("{} - Attendance Marked! ({})", record.name, time.format("%H:%M:%S"))
            }
            Feedback::AlreadyMarked { record } => {
                format!("{} - Already Marked Today!", record.name)
            }
            Feedback::Invalid { reason } => format!("Invalid QR Code: {}", reason),
            Feedback::Unknown { student_id } => format!("Unknown student: {}", student_id),
            Feedback::WriteFailed { reason, .. } => {
                format!("Error marking attendance, please rescan ({})", reason)
            }
        }
    }

    /// True only for a newly committed mark
    pub fn is_success(&self) -> bool {
        matches!(self, Feedback::Success { .. })
    }
}

/// rollcall event types broadcast on the [`EventBus`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RollcallEvent {
    /// A scan reached a terminal, user-visible outcome
    Scan {
        feedback: Feedback,
        /// Capture time of the scan
        timestamp: NaiveDateTime,
    },

    /// The in-memory ledger was rebuilt from durable storage
    LedgerReloaded {
        date: NaiveDate,
        /// Number of distinct students present on `date`
        members: usize,
        timestamp: NaiveDateTime,
    },
}

/// Broadcast bus for [`RollcallEvent`]s
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
pub struct EventBus {
    tx: broadcast::Sender<RollcallEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RollcallEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RollcallEvent,
    ) -> Result<usize, broadcast::error::SendError<RollcallEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RollcallEvent) {
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
