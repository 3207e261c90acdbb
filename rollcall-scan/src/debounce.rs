//! Scan debouncer
//!
//! A code held in front of the camera decodes on nearly every frame. The
//! debouncer drops repeats of the identical payload inside the cooldown
//! window so they never reach the ledger. It is a rate limiter only: the
//! ledger still decides whether a student is already marked.
//!
//! The window is anchored at the first sighting. Suppressed repeats do not
//! extend it, so a code left in view is reprocessed once the window ends.

use std::time::Duration;

use chrono::NaiveDateTime;
use rollcall_common::time::millis_to_duration;
use rollcall_common::config::DEFAULT_COOLDOWN_MS;

/// Debouncer verdict for one decoded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    Proceed,
    Suppress,
}

#[derive(Debug, Clone)]
struct LastSighting {
    payload: String,
    decoded_at: NaiveDateTime,
}

/// Per-pipeline debounce state
#[derive(Debug, Clone)]
pub struct ScanDebouncer {
    cooldown: Duration,
    last: Option<LastSighting>,
}

impl Default for ScanDebouncer {
    fn default() -> Self {
        Self::new(millis_to_duration(DEFAULT_COOLDOWN_MS))
    }
}

impl ScanDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Decide whether `payload` decoded at `now` should enter the pipeline
    ///
    /// Suppresses only when `payload` equals the last accepted payload and
    /// less than `cooldown` has passed since it was accepted. Any other
    /// payload proceeds immediately and becomes the new reference.
    ///
    /// A timestamp earlier than the last accepted one (clock stepped back)
    /// counts as outside the window.
    pub fn should_process(&mut self, payload: &str, now: NaiveDateTime) -> DebounceDecision {
        if let Some(last) = &self.last {
            if last.payload == payload && self.within_cooldown(last.decoded_at, now) {
                return DebounceDecision::Suppress;
            }
        }

        self.last = Some(LastSighting {
            payload: payload.to_string(),
            decoded_at: now,
        });
        DebounceDecision::Proceed
    }

    fn within_cooldown(&self, since: NaiveDateTime, now: NaiveDateTime) -> bool {
        match (now - since).to_std() {
            Ok(elapsed) => elapsed < self.cooldown,
            Err(_) => false,
        }
    }
}
