//! Scan pipeline
//!
//! One decoded payload in, at most one [`Feedback`] out:
//!
//! ```text
//! parse ──fail──────────────────────────────▶ Invalid
//!   │
//! debounce ──suppress───────────────────────▶ (no feedback)
//!   │
//! directory lookup ──miss───────────────────▶ Unknown
//!   │
//! ledger.mark_attendance ──▶ Success | AlreadyMarked | WriteFailed
//! ```
//!
//! Each event runs to a terminal outcome before the next is accepted
//! (`process` takes `&mut self`). The ledger is shared, so other holders of
//! the `Arc` may read or reload it concurrently.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use rollcall_common::events::{EventBus, Feedback, RollcallEvent};
use tracing::{debug, info, warn};

use crate::debounce::{DebounceDecision, ScanDebouncer};
use crate::directory::StudentDirectory;
use crate::error::LedgerError;
use crate::ledger::{AttendanceLedger, DurableLog, MarkResult};
use crate::parser::parse_payload;

/// Wires parser, debouncer, directory and ledger together
pub struct ScanPipeline<S: DurableLog> {
    ledger: Arc<AttendanceLedger<S>>,
    directory: Arc<dyn StudentDirectory>,
    debouncer: ScanDebouncer,
    events: Option<Arc<EventBus>>,
}

impl<S: DurableLog> ScanPipeline<S> {
    pub fn new(
        ledger: Arc<AttendanceLedger<S>>,
        directory: Arc<dyn StudentDirectory>,
        cooldown: Duration,
    ) -> Self {
        Self {
            ledger,
            directory,
            debouncer: ScanDebouncer::new(cooldown),
            events: None,
        }
    }

    /// Also publish every outcome on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn ledger(&self) -> &Arc<AttendanceLedger<S>> {
        &self.ledger
    }

    /// Run one decoded payload captured at `captured_at`
    ///
    /// Returns `None` when the debouncer suppresses a repeat.
    pub fn process(&mut self, payload: &str, captured_at: NaiveDateTime) -> Option<Feedback> {
        let feedback = self.evaluate(payload, captured_at)?;
        if let Some(bus) = &self.events {
            bus.emit_lossy(RollcallEvent::Scan {
                feedback: feedback.clone(),
                timestamp: captured_at,
            });
        }
        Some(feedback)
    }

    fn evaluate(&mut self, payload: &str, captured_at: NaiveDateTime) -> Option<Feedback> {
        let scanned = match parse_payload(payload) {
            Ok(record) => record,
            Err(e) => {
                debug!("Rejected payload: {}", e);
                return Some(Feedback::Invalid {
                    reason: e.reason.to_string(),
                });
            }
        };

        if self.debouncer.should_process(payload, captured_at) == DebounceDecision::Suppress {
            return None;
        }

        let Some(record) = self.directory.lookup(&scanned.id) else {
            warn!(student_id = %scanned.id, "Scanned ID not in student directory");
            return Some(Feedback::Unknown {
                student_id: scanned.id,
            });
        };
        if record != scanned {
            debug!(
                student_id = %record.id,
                "Payload name/class differ from directory; using directory record"
            );
        }

        let feedback = match self.ledger.mark_attendance(
            &record,
            captured_at.date(),
            captured_at.time(),
        ) {
            MarkResult::Marked(event) => {
                info!(
                    student_id = %event.student_id,
                    name = %event.name,
                    class = %event.class_label,
                    "Attendance marked at {}",
                    event.time
                );
                Feedback::Success {
                    record,
                    time: event.time,
                }
            }
            MarkResult::AlreadyMarked => Feedback::AlreadyMarked { record },
            MarkResult::WriteFailed(e) => Feedback::WriteFailed {
                student_id: record.id,
                reason: e.to_string(),
            },
        };
        Some(feedback)
    }

    /// Rebuild the ledger cache for the clock's current date
    pub fn reload(&mut self) -> Result<usize, LedgerError> {
        let members = self.ledger.reload_today()?;
        if let Some(bus) = &self.events {
            bus.emit_lossy(RollcallEvent::LedgerReloaded {
                date: self.ledger.date(),
                members,
                timestamp: self.ledger.clock().now(),
            });
        }
        Ok(members)
    }
}
