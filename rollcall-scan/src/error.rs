//! Error types for rollcall-scan
//!
//! One enum per failure domain so callers can match on exactly the
//! outcomes a stage can produce.

use std::path::PathBuf;

use thiserror::Error;

/// Why a decoded payload was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadDefect {
    #[error("expected 3 '|'-separated fields, found {found}")]
    WrongFieldCount { found: usize },

    #[error("field '{field}' is empty")]
    EmptyField { field: &'static str },
}

/// Decoded text is not a `StudentID|Name|Class` payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid payload '{payload}': {reason}")]
pub struct InvalidPayloadError {
    pub payload: String,
    pub reason: PayloadDefect,
}

/// Durable attendance log failures
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Store exists but could not be read
    #[error("cannot read attendance log {path}: {source}")]
    DurableRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store was read but its contents are malformed
    #[error("attendance log corrupt at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    /// Event would not read back as written, so it was never appended
    #[error("attendance record for '{student_id}' cannot be stored: {reason}")]
    Unstorable { student_id: String, reason: String },

    /// Append did not reach durable storage
    #[error("attendance append failed: {source}")]
    DurableWrite {
        #[source]
        source: std::io::Error,
    },
}

/// Student directory loading failures
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("cannot read student directory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("student directory header must contain StudentID, Name, Class (missing {column})")]
    MissingHeader { column: &'static str },

    #[error("student directory row {line} malformed: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("no valid student records in directory")]
    Empty,
}
