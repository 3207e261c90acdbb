//! Domain records shared by the pipeline and its collaborators

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::delimited::join_row;
use crate::time::{format_date, format_time, parse_date, parse_time};
use crate::{Error, Result};

/// Column names of the durable attendance log, in order
pub const ATTENDANCE_COLUMNS: [&str; 5] = ["StudentID", "Name", "Class", "Date", "Time"];

/// Column names the student directory must provide (any order)
pub const DIRECTORY_COLUMNS: [&str; 3] = ["StudentID", "Name", "Class"];

/// Enrollment metadata for one student
///
/// Immutable once loaded for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub class_label: String,
}

impl StudentRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        class_label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            class_label: class_label.into(),
        }
    }
}

/// One committed attendance fact
///
/// Created once per (student_id, date) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub student_id: String,
    pub name: String,
    pub class_label: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl AttendanceEvent {
    /// `time` is truncated to whole seconds to match the stored column
    pub fn new(record: &StudentRecord, date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            student_id: record.id.clone(),
            name: record.name.clone(),
            class_label: record.class_label.clone(),
            date,
            time: time.with_nanosecond(0).unwrap_or(time),
        }
    }

    /// Check that the row this event encodes decodes back to the same event
    ///
    /// One row per line and trimmed fields on read: a blank ID, a line break
    /// in any field, or surrounding whitespace would not survive a reload.
    pub fn check_storable(&self) -> Result<()> {
        if self.student_id.is_empty() {
            return Err(Error::InvalidInput("empty StudentID".to_string()));
        }
        let text_fields = [
            ("StudentID", &self.student_id),
            ("Name", &self.name),
            ("Class", &self.class_label),
        ];
        for (column, value) in text_fields {
            if value.contains(['\r', '\n']) {
                return Err(Error::InvalidInput(format!("{} contains a line break", column)));
            }
            if value.trim() != value.as_str() {
                return Err(Error::InvalidInput(format!(
                    "{} '{}' has surrounding whitespace",
                    column, value
                )));
            }
        }
        Ok(())
    }

    /// Header row of the durable log
    pub fn header_row() -> String {
        join_row(&ATTENDANCE_COLUMNS)
    }

    /// Encode as one durable log row (no trailing newline)
    pub fn to_row(&self) -> String {
        join_row(&[
            self.student_id.clone(),
            self.name.clone(),
            self.class_label.clone(),
            format_date(self.date),
            format_time(self.time),
        ])
    }

    /// Decode from the fields of one durable log row
    pub fn from_fields(fields: &[String]) -> Result<Self> {
        if fields.len() != ATTENDANCE_COLUMNS.len() {
            return Err(Error::InvalidInput(format!(
                "expected {} columns, found {}",
                ATTENDANCE_COLUMNS.len(),
                fields.len()
            )));
        }
        let student_id = fields[0].trim();
        if student_id.is_empty() {
            return Err(Error::InvalidInput("empty StudentID".to_string()));
        }
        Ok(Self {
            student_id: student_id.to_string(),
            name: fields[1].trim().to_string(),
            class_label: fields[2].trim().to_string(),
            date: parse_date(&fields[3])?,
            time: parse_time(&fields[4])?,
        })
    }
}
