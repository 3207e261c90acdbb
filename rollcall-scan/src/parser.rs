//! Decoded payload parser
//!
//! Wire form produced by the QR generator: `StudentID|Name|Class`.
//! Pure function, no I/O.

use rollcall_common::StudentRecord;

use crate::error::{InvalidPayloadError, PayloadDefect};

/// Field separator in decoded payloads
pub const PAYLOAD_DELIMITER: char = '|';

const FIELD_NAMES: [&str; 3] = ["StudentID", "Name", "Class"];

/// Parse a decoded payload into a student record
///
/// Exactly three fields are required. Fields are trimmed; a field that is
/// empty after trimming rejects the payload.
pub fn parse_payload(payload: &str) -> Result<StudentRecord, InvalidPayloadError> {
    let reject = |reason| InvalidPayloadError {
        payload: payload.to_string(),
        reason,
    };

    let fields: Vec<&str> = payload.split(PAYLOAD_DELIMITER).map(str::trim).collect();
    if fields.len() != FIELD_NAMES.len() {
        return Err(reject(PayloadDefect::WrongFieldCount {
            found: fields.len(),
        }));
    }
    if let Some(i) = fields.iter().position(|f| f.is_empty()) {
        return Err(reject(PayloadDefect::EmptyField {
            field: FIELD_NAMES[i],
        }));
    }

    Ok(StudentRecord::new(fields[0], fields[1], fields[2]))
}

/// Encode a record in payload wire form
pub fn format_payload(record: &StudentRecord) -> String {
    format!(
        "{}{d}{}{d}{}",
        record.id,
        record.name,
        record.class_label,
        d = PAYLOAD_DELIMITER
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_payload() {
        let record = parse_payload("101|John Doe|10A").unwrap();
        assert_eq!(record, StudentRecord::new("101", "John Doe", "10A"));
    }

    #[test]
    fn test_parse_trims_fields() {
        let record = parse_payload(" 101 | John Doe |10A\n").unwrap();
        assert_eq!(record.id, "101");
        assert_eq!(record.name, "John Doe");
        assert_eq!(record.class_label, "10A");
    }

    #[test]
    fn test_empty_class_rejected() {
        let err = parse_payload("102|Jane|").unwrap_err();
        assert_eq!(err.reason, PayloadDefect::EmptyField { field: "Class" });
        assert_eq!(err.payload, "102|Jane|");
    }

    #[test]
    fn test_whitespace_only_field_rejected() {
        let err = parse_payload("102|   |9B").unwrap_err();
        assert_eq!(err.reason, PayloadDefect::EmptyField { field: "Name" });
    }

    #[test]
    fn test_wrong_field_counts_rejected() {
        for (payload, found) in [("101", 1), ("101|John", 2), ("1|2|3|4", 4), ("", 1)] {
            let err = parse_payload(payload).unwrap_err();
            assert_eq!(err.reason, PayloadDefect::WrongFieldCount { found }, "{}", payload);
        }
    }

    #[test]
    fn test_name_with_comma_accepted() {
        let record = parse_payload("7|Doe, John|9B").unwrap();
        assert_eq!(record.name, "Doe, John");
    }

    #[test]
    fn test_format_payload_matches_wire_form() {
        let record = StudentRecord::new("101", "John Doe", "10A");
        assert_eq!(format_payload(&record), "101|John Doe|10A");
        assert_eq!(parse_payload(&format_payload(&record)).unwrap(), record);
    }
}
