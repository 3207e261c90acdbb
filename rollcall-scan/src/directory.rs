//! Student directory lookup
//!
//! The pipeline only needs `lookup(id)`. [`CsvDirectory`] is the stock
//! implementation, loaded once per session from `students.csv`
//! (`StudentID,Name,Class`, any column order).

use std::collections::HashMap;
use std::path::Path;

use rollcall_common::delimited::split_row;
use rollcall_common::records::DIRECTORY_COLUMNS;
use rollcall_common::StudentRecord;
use tracing::{info, warn};

use crate::error::DirectoryError;

/// Read-only identifier → enrollment lookup
pub trait StudentDirectory: Send + Sync {
    fn lookup(&self, student_id: &str) -> Option<StudentRecord>;
}

impl StudentDirectory for HashMap<String, StudentRecord> {
    fn lookup(&self, student_id: &str) -> Option<StudentRecord> {
        self.get(student_id).cloned()
    }
}

/// Directory loaded from a delimited text file
#[derive(Debug, Clone, Default)]
pub struct CsvDirectory {
    students: HashMap<String, StudentRecord>,
}

impl CsvDirectory {
    /// Build from records; the first record for a given ID wins
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = StudentRecord>,
    {
        let mut students = HashMap::new();
        for record in records {
            students.entry(record.id.clone()).or_insert(record);
        }
        Self { students }
    }

    /// Load `students.csv`
    ///
    /// Rows with a blank required field are skipped with a warning, as are
    /// repeated IDs (first row wins). A file with no usable rows is an error.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let content = std::fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .filter(|(_, line)| !line.trim().is_empty());

        let (header_line, header) = lines.next().ok_or(DirectoryError::Empty)?;
        let header = split_row(header).map_err(|e| DirectoryError::Malformed {
            line: header_line,
            reason: e.to_string(),
        })?;
        let columns = column_positions(&header)?;

        let mut students: HashMap<String, StudentRecord> = HashMap::new();
        for (line_no, line) in lines {
            let fields = split_row(line).map_err(|e| DirectoryError::Malformed {
                line: line_no,
                reason: e.to_string(),
            })?;
            let field = |i: usize| fields.get(i).map(|f| f.trim()).unwrap_or("");
            let (id, name, class_label) = (field(columns[0]), field(columns[1]), field(columns[2]));

            if id.is_empty() || name.is_empty() || class_label.is_empty() {
                warn!("Skipping incomplete student row {}: {}", line_no, line);
                continue;
            }
            if students.contains_key(id) {
                warn!("Duplicate StudentID {} at row {}, keeping first", id, line_no);
                continue;
            }
            students.insert(id.to_string(), StudentRecord::new(id, name, class_label));
        }

        if students.is_empty() {
            return Err(DirectoryError::Empty);
        }
        info!("Loaded {} students from {}", students.len(), path.display());
        Ok(Self { students })
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

impl StudentDirectory for CsvDirectory {
    fn lookup(&self, student_id: &str) -> Option<StudentRecord> {
        self.students.get(student_id).cloned()
    }
}

fn column_positions(header: &[String]) -> Result<[usize; 3], DirectoryError> {
    let mut positions = [0usize; 3];
    for (slot, column) in positions.iter_mut().zip(DIRECTORY_COLUMNS) {
        *slot = header
            .iter()
            .position(|h| h.trim() == column)
            .ok_or(DirectoryError::MissingHeader { column })?;
    }
    Ok(positions)
}
