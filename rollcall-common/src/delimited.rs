//! Delimited text rows for the durable log and the student directory
//!
//! Comma-separated with double-quote quoting: a field containing a comma,
//! quote, CR or LF is wrapped in quotes and inner quotes are doubled.
//! Names such as `Doe, John` therefore survive a write/read cycle.

use crate::{Error, Result};

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// Join fields into one row (no trailing newline)
pub fn join_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut row = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            row.push(DELIMITER);
        }
        let field = field.as_ref();
        if needs_quoting(field) {
            row.push(QUOTE);
            for c in field.chars() {
                if c == QUOTE {
                    row.push(QUOTE);
                }
                row.push(c);
            }
            row.push(QUOTE);
        } else {
            row.push_str(field);
        }
    }
    row
}

fn needs_quoting(field: &str) -> bool {
    field.contains([DELIMITER, QUOTE, '\r', '\n'])
}

/// True if `line` opens a quoted field it never closes
///
/// Well-formed quoting always pairs quote characters, so an odd count means
/// the row was cut off inside a quoted field.
pub fn has_unterminated_quote(line: &str) -> bool {
    line.matches(QUOTE).count() % 2 == 1
}

/// Split one row into fields
///
/// A trailing `\r` (CRLF files) is ignored. Fails on an unterminated quoted
/// field or on characters after a closing quote.
pub fn split_row(line: &str) -> Result<Vec<String>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    let mut after_quoted = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == QUOTE {
                if chars.peek() == Some(&QUOTE) {
                    field.push(QUOTE);
                    chars.next();
                } else {
                    in_quotes = false;
                    after_quoted = true;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            DELIMITER => {
                fields.push(std::mem::take(&mut field));
                after_quoted = false;
            }
            QUOTE if field.is_empty() && !after_quoted => in_quotes = true,
            _ if after_quoted => {
                return Err(Error::InvalidInput(format!(
                    "unexpected '{}' after closing quote",
                    c
                )));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(Error::InvalidInput("unterminated quoted field".to_string()));
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_row() {
        assert_eq!(
            join_row(&["101", "John Doe", "10A", "2024-02-16", "09:15:23"]),
            "101,John Doe,10A,2024-02-16,09:15:23"
        );
        assert_eq!(
            split_row("101,John Doe,10A,2024-02-16,09:15:23").unwrap(),
            vec!["101", "John Doe", "10A", "2024-02-16", "09:15:23"]
        );
    }

    #[test]
    fn test_name_with_comma_is_quoted() {
        let row = join_row(&["7", "Doe, John", "9B"]);
        assert_eq!(row, "7,\"Doe, John\",9B");
        assert_eq!(split_row(&row).unwrap(), vec!["7", "Doe, John", "9B"]);
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let row = join_row(&["8", "Jay \"JJ\" Jones", "9B"]);
        assert_eq!(row, "8,\"Jay \"\"JJ\"\" Jones\",9B");
        assert_eq!(split_row(&row).unwrap()[1], "Jay \"JJ\" Jones");
    }

    #[test]
    fn test_empty_fields_preserved() {
        assert_eq!(split_row("a,,c,").unwrap(), vec!["a", "", "c", ""]);
    }

    #[test]
    fn test_crlf_stripped() {
        assert_eq!(split_row("a,b\r").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_unterminated_quote_rejected() {
        assert!(split_row("1,\"Doe, Jo").is_err());
    }

    #[test]
    fn test_has_unterminated_quote() {
        assert!(has_unterminated_quote("1,\"Doe, Jo"));
        assert!(!has_unterminated_quote("1,\"Doe, John\",9B"));
        assert!(!has_unterminated_quote("8,\"Jay \"\"JJ\"\" Jones\",9B"));
        assert!(!has_unterminated_quote("1,\"Doe\"x,9B"));
    }

    #[test]
    fn test_garbage_after_closing_quote_rejected() {
        assert!(split_row("1,\"Doe\"x,9B").is_err());
    }
}
