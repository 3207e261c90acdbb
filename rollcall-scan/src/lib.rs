//! rollcall-scan library - attendance event pipeline
//!
//! Turns decoded QR payloads into attendance entries that are committed to
//! the durable log exactly once per student per day.
//!
//! - [`parser`]: `StudentID|Name|Class` payload parsing
//! - [`debounce`]: cooldown for a code held in front of the camera
//! - [`directory`]: student lookup
//! - [`ledger`]: per-day membership cache over the append-only log
//! - [`pipeline`]: wires the stages together and produces feedback

pub mod debounce;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod parser;
pub mod pipeline;

pub use debounce::{DebounceDecision, ScanDebouncer};
pub use directory::{CsvDirectory, StudentDirectory};
pub use error::{DirectoryError, InvalidPayloadError, LedgerError, PayloadDefect};
pub use ledger::{AttendanceLedger, CsvLog, DailyLedger, DurableLog, MarkResult, MemoryLog};
pub use parser::{format_payload, parse_payload};
pub use pipeline::ScanPipeline;
