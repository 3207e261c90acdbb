//! Durable attendance log backends
//!
//! [`CsvLog`] is the production store: an append-only delimited text file
//! with header `StudentID,Name,Class,Date,Time`. [`MemoryLog`] keeps events
//! in memory and can be told to fail appends.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use rollcall_common::delimited::{has_unterminated_quote, split_row};
use rollcall_common::records::ATTENDANCE_COLUMNS;
use rollcall_common::AttendanceEvent;
use tracing::{info, warn};

use crate::error::LedgerError;

/// Append-only storage behind the attendance ledger
pub trait DurableLog: Send + Sync {
    /// Every event ever appended, in append order
    ///
    /// A store that does not exist yet reads as empty.
    fn read_all(&self) -> Result<Vec<AttendanceEvent>, LedgerError>;

    /// Append one event; `Ok` only once the event is durable
    fn append(&self, event: &AttendanceEvent) -> Result<(), LedgerError>;
}

fn write_error(source: std::io::Error) -> LedgerError {
    LedgerError::DurableWrite { source }
}

/// File-backed attendance log
#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    /// Use `path` as the log, creating it with a header row if absent
    ///
    /// An existing file is never rewritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_error)?;
            }
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(format!("{}\n", AttendanceEvent::header_row()).as_bytes())
                    .map_err(write_error)?;
                file.sync_all().map_err(write_error)?;
                info!("Created new attendance file: {}", path.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                info!("Using existing attendance file: {}", path.display());
            }
            Err(e) => return Err(write_error(e)),
        }

        Ok(Self { path })
    }

    /// Use `path` without touching the filesystem
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DurableLog for CsvLog {
    fn read_all(&self) -> Result<Vec<AttendanceEvent>, LedgerError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LedgerError::DurableRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        parse_log(&content)
    }

    fn append(&self, event: &AttendanceEvent) -> Result<(), LedgerError> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(write_error)?;
        let len = file.metadata().map_err(write_error)?.len();

        let mut buf = String::new();
        if len == 0 {
            buf.push_str(&AttendanceEvent::header_row());
            buf.push('\n');
        } else if !ends_with_newline(&mut file, len).map_err(write_error)? {
            // Seal a torn row left by an interrupted append; load skips it
            buf.push('\n');
        }
        buf.push_str(&event.to_row());
        buf.push('\n');

        file.write_all(buf.as_bytes()).map_err(write_error)?;
        file.sync_data().map_err(write_error)?;
        Ok(())
    }
}

fn ends_with_newline(file: &mut File, len: u64) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Parse the full text of a log file
///
/// Blank lines are ignored. A structurally incomplete row (too few columns,
/// or cut off inside a quoted field) is what an interrupted append leaves
/// behind, and is skipped wherever it sits: a later append only seals it
/// with a newline. A malformed final row with no trailing newline is skipped
/// too. A complete row with invalid values, or a wrong header, is corruption.
pub(crate) fn parse_log(content: &str) -> Result<Vec<AttendanceEvent>, LedgerError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let unterminated = !content.ends_with('\n');
    let mut rows = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty())
        .peekable();

    let Some((header_line, header)) = rows.next() else {
        return Ok(Vec::new());
    };
    let expected = AttendanceEvent::header_row();
    if header.trim_end() != expected {
        return Err(LedgerError::Corrupt {
            line: header_line,
            reason: format!("expected header '{}', found '{}'", expected, header),
        });
    }

    let mut events = Vec::new();
    while let Some((line_no, line)) = rows.next() {
        match decode_row(line) {
            Ok(event) => events.push(event),
            Err(RowDefect::Incomplete(reason)) => {
                warn!("Ignoring incomplete row {} in attendance log: {}", line_no, reason);
            }
            Err(RowDefect::Invalid(reason)) if unterminated && rows.peek().is_none() => {
                warn!("Ignoring torn final row {} in attendance log: {}", line_no, reason);
            }
            Err(RowDefect::Invalid(reason)) => {
                return Err(LedgerError::Corrupt { line: line_no, reason })
            }
        }
    }
    Ok(events)
}

enum RowDefect {
    /// Cut short, as by an interrupted append
    Incomplete(String),
    /// All columns present but not a valid event
    Invalid(String),
}

fn decode_row(line: &str) -> Result<AttendanceEvent, RowDefect> {
    if has_unterminated_quote(line) {
        return Err(RowDefect::Incomplete("unterminated quoted field".to_string()));
    }
    let fields = split_row(line).map_err(|e| RowDefect::Invalid(e.to_string()))?;
    if fields.len() < ATTENDANCE_COLUMNS.len() {
        return Err(RowDefect::Incomplete(format!(
            "{} of {} columns",
            fields.len(),
            ATTENDANCE_COLUMNS.len()
        )));
    }
    AttendanceEvent::from_fields(&fields).map_err(|e| RowDefect::Invalid(e.to_string()))
}

/// In-memory attendance log
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: Mutex<Vec<AttendanceEvent>>,
    fail_appends: AtomicBool,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with events already "on disk"
    pub fn with_events(events: Vec<AttendanceEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            fail_appends: AtomicBool::new(false),
        }
    }

    /// Make subsequent appends fail with an I/O error
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of stored events
    pub fn events(&self) -> Vec<AttendanceEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl DurableLog for MemoryLog {
    fn read_all(&self) -> Result<Vec<AttendanceEvent>, LedgerError> {
        Ok(self.events())
    }

    fn append(&self, event: &AttendanceEvent) -> Result<(), LedgerError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(write_error(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated append failure",
            )));
        }
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}
