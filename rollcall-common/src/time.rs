//! Timestamp utilities and the injectable clock
//!
//! Attendance rows carry local wall-clock date and time, so everything here
//! works in `NaiveDateTime` (no timezone attached). The durable log stores
//! `Date` as `YYYY-MM-DD` and `Time` as 24-hour `HH:MM:SS`.

use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::{Error, Result};

/// Date column format in the durable log
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time column format in the durable log
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Source of "now" for components that need the current date or time
///
/// Injected rather than read globally so tests can pin the calendar date.
pub trait Clock: Send + Sync {
    /// Current local wall-clock time
    fn now(&self) -> NaiveDateTime;

    /// Current local calendar date
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Clock backed by the operating system's local time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock for tests and replay tooling
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, to: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    /// Move forward (or backward, for negative durations)
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Format a date as stored in the durable log (`2024-02-16`)
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Format a time as stored in the durable log (`09:15:23`)
///
/// Sub-second precision is dropped.
pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date column
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("bad date '{}': {}", s, e)))
}

/// Parse an `HH:MM:SS` time column
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("bad time '{}': {}", s, e)))
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 16)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_system_clock_returns_recent_date() {
        let today = SystemClock.today();
        // Sanity bounds: after 2000, before 2100
        assert!(today > NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert!(today < NaiveDate::from_ymd_opt(2100, 1, 1).unwrap());
    }

    #[test]
    fn test_manual_clock_advance_and_set() {
        let clock = ManualClock::new(at(9, 15, 23));
        assert_eq!(clock.now(), at(9, 15, 23));

        clock.advance(Duration::seconds(37));
        assert_eq!(clock.now(), at(9, 16, 0));

        clock.set(at(23, 59, 59));
        clock.advance(Duration::seconds(1));
        assert_eq!(
            clock.today(),
            NaiveDate::from_ymd_opt(2024, 2, 17).unwrap(),
            "advancing past midnight should roll the date"
        );
    }

    #[test]
    fn test_format_date_and_time_columns() {
        let ts = at(9, 5, 3);
        assert_eq!(format_date(ts.date()), "2024-02-16");
        assert_eq!(format_time(ts.time()), "09:05:03");
    }

    #[test]
    fn test_format_time_drops_subseconds() {
        let t = NaiveTime::from_hms_milli_opt(9, 15, 23, 999).unwrap();
        assert_eq!(format_time(t), "09:15:23");
    }

    #[test]
    fn test_parse_date_rejects_other_layouts() {
        assert!(parse_date("2024-02-16").is_ok());
        assert!(parse_date("16/02/2024").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_parse_time_rejects_truncated_value() {
        assert_eq!(
            parse_time("09:15:23").unwrap(),
            NaiveTime::from_hms_opt(9, 15, 23).unwrap()
        );
        assert!(parse_time("09:1").is_err());
    }

    #[test]
    fn test_millis_to_duration_one_second() {
        let duration = millis_to_duration(1000);
        assert_eq!(duration, std::time::Duration::from_secs(1));
    }
}
