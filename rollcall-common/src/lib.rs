//! # rollcall Common Library
//!
//! Shared code for rollcall crates including:
//! - Domain records (StudentRecord, AttendanceEvent)
//! - Delimited row encoding for the on-disk files
//! - Feedback event types and EventBus
//! - Configuration loading
//! - Clock abstraction and date/time column formats

pub mod config;
pub mod delimited;
pub mod error;
pub mod events;
pub mod records;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, Feedback, RollcallEvent};
pub use records::{AttendanceEvent, StudentRecord};
pub use time::{Clock, ManualClock, SystemClock};
