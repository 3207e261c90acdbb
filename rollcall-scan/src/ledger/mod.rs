//! Attendance ledger
//!
//! The in-memory membership set for one date is a cache of the durable log:
//! `members = distinct student_id in log where date = D`. It is built by
//! [`AttendanceLedger::load`] and only ever grows through
//! [`AttendanceLedger::mark_attendance`], which appends durably *before*
//! updating the cache. A crash between the two is repaired by the next
//! `load`, never by the running process.
//!
//! Mutations (`mark_attendance`, `reload`) are serialized by one guard so two
//! concurrent marks for the same student cannot both see "absent". Readers
//! (`is_marked`) only take the cache lock, which is never held across I/O.

mod store;

pub use store::{CsvLog, DurableLog, MemoryLog};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};
use rollcall_common::time::format_date;
use rollcall_common::{AttendanceEvent, Clock, StudentRecord};
use tracing::{debug, error, info, warn};

use crate::error::LedgerError;

/// Marks slower than this are logged; the capture loop runs at ~30 fps
const MARK_LATENCY_BUDGET: Duration = Duration::from_millis(15);

/// Membership set for one calendar date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyLedger {
    date: NaiveDate,
    members: HashSet<String>,
}

impl DailyLedger {
    /// Project `events` onto `date`
    pub fn from_events<'a, I>(date: NaiveDate, events: I) -> Self
    where
        I: IntoIterator<Item = &'a AttendanceEvent>,
    {
        let members = events
            .into_iter()
            .filter(|e| e.date == date)
            .map(|e| e.student_id.clone())
            .collect();
        Self { date, members }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn contains(&self, student_id: &str) -> bool {
        self.members.contains(student_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member IDs, sorted
    pub fn members(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.members.iter().cloned().collect();
        ids.sort();
        ids
    }

    fn insert(&mut self, student_id: String) -> bool {
        self.members.insert(student_id)
    }
}

/// Result of [`AttendanceLedger::mark_attendance`]
#[derive(Debug)]
pub enum MarkResult {
    /// Appended durably and added to the cache
    Marked(AttendanceEvent),
    /// Already present for that date; no I/O performed
    AlreadyMarked,
    /// Not committed; the cache is untouched and the mark may be retried
    WriteFailed(LedgerError),
}

/// Per-date attendance ledger over a durable log
pub struct AttendanceLedger<S: DurableLog> {
    store: S,
    clock: Arc<dyn Clock>,
    write_guard: Mutex<()>,
    cache: RwLock<DailyLedger>,
}

impl<S: DurableLog> AttendanceLedger<S> {
    /// Build a ledger for the clock's current date
    ///
    /// Fails if the store exists but cannot be read or is corrupt; an
    /// absent store is an empty ledger.
    pub fn open(store: S, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let today = clock.today();
        let events = store.read_all()?;
        let cache = DailyLedger::from_events(today, &events);
        info!(
            "Loaded {} attendance records for {} ({} rows in log)",
            cache.len(),
            format_date(today),
            events.len()
        );
        Ok(Self {
            store,
            clock,
            write_guard: Mutex::new(()),
            cache: RwLock::new(cache),
        })
    }

    /// Replay the durable log and project it onto `date`
    ///
    /// Does not touch the current cache.
    pub fn load(&self, date: NaiveDate) -> Result<DailyLedger, LedgerError> {
        let events = self.store.read_all()?;
        Ok(DailyLedger::from_events(date, &events))
    }

    /// O(1) membership test against the cached date
    pub fn is_marked(&self, student_id: &str) -> bool {
        self.read_cache().contains(student_id)
    }

    /// Mark `record` present on `date`, at most once per date
    ///
    /// Order: test membership; if absent, append durably; only after the
    /// append succeeds, insert into the cache. A record whose row would not
    /// read back unchanged is refused before any I/O. If `date` is not the cached
    /// date the cache is first rebuilt for `date` from the log.
    pub fn mark_attendance(
        &self,
        record: &StudentRecord,
        date: NaiveDate,
        time: NaiveTime,
    ) -> MarkResult {
        let event = AttendanceEvent::new(record, date, time);
        if let Err(e) = event.check_storable() {
            warn!(student_id = %record.id, "Refusing to store attendance record: {}", e);
            return MarkResult::WriteFailed(LedgerError::Unstorable {
                student_id: record.id.clone(),
                reason: e.to_string(),
            });
        }

        let _guard = self.lock_writes();
        let started = Instant::now();

        if self.read_cache().date() != date {
            match self.load(date) {
                Ok(ledger) => {
                    info!(
                        "Date changed to {}, ledger rebuilt with {} records",
                        format_date(date),
                        ledger.len()
                    );
                    *self.write_cache() = ledger;
                }
                Err(e) => {
                    error!("Cannot rebuild ledger for {}: {}", format_date(date), e);
                    return MarkResult::WriteFailed(e);
                }
            }
        }

        if self.read_cache().contains(&record.id) {
            debug!(student_id = %record.id, "Already marked");
            return MarkResult::AlreadyMarked;
        }

        if let Err(e) = self.store.append(&event) {
            error!(student_id = %record.id, "Error writing to attendance log: {}", e);
            return MarkResult::WriteFailed(e);
        }
        self.write_cache().insert(record.id.clone());

        let elapsed = started.elapsed();
        if elapsed > MARK_LATENCY_BUDGET {
            warn!(student_id = %record.id, ?elapsed, "Attendance mark exceeded latency budget");
        }
        MarkResult::Marked(event)
    }

    /// Discard the cache and rebuild it for `date` from the durable log
    ///
    /// On failure the previous cache is kept and the error returned.
    /// Returns the number of members for `date`.
    pub fn reload(&self, date: NaiveDate) -> Result<usize, LedgerError> {
        let _guard = self.lock_writes();
        let ledger = self.load(date)?;
        let count = ledger.len();
        *self.write_cache() = ledger;
        info!("Reloaded {} attendance records for {}", count, format_date(date));
        Ok(count)
    }

    /// [`reload`](Self::reload) for the clock's current date
    pub fn reload_today(&self) -> Result<usize, LedgerError> {
        self.reload(self.clock.today())
    }

    /// Date the cache currently represents
    pub fn date(&self) -> NaiveDate {
        self.read_cache().date()
    }

    pub fn len(&self) -> usize {
        self.read_cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_cache().is_empty()
    }

    /// Copy of the current cache
    pub fn snapshot(&self) -> DailyLedger {
        self.read_cache().clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // A poisoned lock still guards a faithful cache: the set is only written
    // after a successful append or a complete reload.
    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_guard.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, DailyLedger> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, DailyLedger> {
        self.cache.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rollcall_common::ManualClock;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, s).unwrap()
    }

    fn john() -> StudentRecord {
        StudentRecord::new("101", "John Doe", "10A")
    }

    fn jane() -> StudentRecord {
        StudentRecord::new("102", "Jane Roe", "10B")
    }

    fn ledger_with(events: Vec<AttendanceEvent>) -> AttendanceLedger<MemoryLog> {
        let clock = Arc::new(ManualClock::new(at(16, 9, 0, 0)));
        AttendanceLedger::open(MemoryLog::with_events(events), clock).unwrap()
    }

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_open_projects_only_today() {
        let ledger = ledger_with(vec![
            AttendanceEvent::new(&john(), day(15), time(9, 0, 0)),
            AttendanceEvent::new(&jane(), day(16), time(9, 1, 0)),
        ]);
        assert_eq!(ledger.date(), day(16));
        assert!(ledger.is_marked("102"));
        assert!(!ledger.is_marked("101"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_mark_then_duplicate() {
        let ledger = ledger_with(vec![]);

        let first = ledger.mark_attendance(&john(), day(16), time(9, 15, 23));
        match first {
            MarkResult::Marked(event) => {
                assert_eq!(event.to_row(), "101,John Doe,10A,2024-02-16,09:15:23");
            }
            other => panic!("expected Marked, got {:?}", other),
        }
        assert!(ledger.is_marked("101"));

        let second = ledger.mark_attendance(&john(), day(16), time(9, 16, 0));
        assert!(matches!(second, MarkResult::AlreadyMarked));
        assert_eq!(ledger.store().events().len(), 1);
    }

    #[test]
    fn test_write_failure_leaves_cache_untouched() {
        let ledger = ledger_with(vec![]);
        ledger.store().set_fail_appends(true);

        let result = ledger.mark_attendance(&john(), day(16), time(9, 15, 23));
        assert!(matches!(
            result,
            MarkResult::WriteFailed(LedgerError::DurableWrite { .. })
        ));
        assert!(!ledger.is_marked("101"));
        assert!(ledger.store().events().is_empty());

        // Retry after the store recovers
        ledger.store().set_fail_appends(false);
        let retry = ledger.mark_attendance(&john(), day(16), time(9, 15, 30));
        assert!(matches!(retry, MarkResult::Marked(_)));
        assert_eq!(ledger.store().events().len(), 1);
    }

    #[test]
    fn test_new_date_rebuilds_cache_before_check() {
        let ledger = ledger_with(vec![AttendanceEvent::new(&john(), day(17), time(7, 0, 0))]);
        assert!(!ledger.is_marked("101"));

        // Already in the log for the 17th even though the cache held the 16th
        let result = ledger.mark_attendance(&john(), day(17), time(8, 0, 0));
        assert!(matches!(result, MarkResult::AlreadyMarked));
        assert_eq!(ledger.date(), day(17));
        assert_eq!(ledger.store().events().len(), 1);
    }

    #[test]
    fn test_same_student_new_day_is_marked() {
        let ledger = ledger_with(vec![]);
        assert!(matches!(
            ledger.mark_attendance(&john(), day(16), time(9, 0, 0)),
            MarkResult::Marked(_)
        ));
        assert!(matches!(
            ledger.mark_attendance(&john(), day(17), time(9, 0, 0)),
            MarkResult::Marked(_)
        ));
        assert_eq!(ledger.store().events().len(), 2);
    }

    #[test]
    fn test_reload_picks_up_external_writes() {
        let ledger = ledger_with(vec![]);
        // Another writer appends directly to the store
        ledger
            .store()
            .append(&AttendanceEvent::new(&jane(), day(16), time(9, 5, 0)))
            .unwrap();
        assert!(!ledger.is_marked("102"));

        assert_eq!(ledger.reload(day(16)).unwrap(), 1);
        assert!(ledger.is_marked("102"));
    }

    #[test]
    fn test_reload_today_follows_clock() {
        let clock = Arc::new(ManualClock::new(at(16, 23, 59, 0)));
        let store = MemoryLog::with_events(vec![AttendanceEvent::new(&jane(), day(17), time(0, 1, 0))]);
        let ledger = AttendanceLedger::open(store, clock.clone()).unwrap();
        assert!(ledger.is_empty());

        clock.set(at(17, 0, 5, 0));
        assert_eq!(ledger.reload_today().unwrap(), 1);
        assert_eq!(ledger.date(), day(17));
        assert_eq!(ledger.snapshot().members(), vec!["102".to_string()]);
    }

    #[test]
    fn test_load_does_not_replace_cache() {
        let ledger = ledger_with(vec![AttendanceEvent::new(&john(), day(15), time(9, 0, 0))]);
        let yesterday = ledger.load(day(15)).unwrap();
        assert!(yesterday.contains("101"));
        assert_eq!(ledger.date(), day(16));
        assert!(!ledger.is_marked("101"));
    }

    #[test]
    fn test_padded_id_refused_without_io() {
        let ledger = ledger_with(vec![]);
        let padded = StudentRecord::new(" 7", "Seven", "10A");

        for secs in [1, 2] {
            let result = ledger.mark_attendance(&padded, day(16), time(9, 0, secs));
            assert!(matches!(
                result,
                MarkResult::WriteFailed(LedgerError::Unstorable { .. })
            ));
        }
        assert!(ledger.store().events().is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_line_break_in_name_refused() {
        let ledger = ledger_with(vec![]);
        let result = ledger.mark_attendance(
            &StudentRecord::new("8", "Line\nBreak", "10A"),
            day(16),
            time(9, 0, 0),
        );
        assert!(matches!(
            result,
            MarkResult::WriteFailed(LedgerError::Unstorable { .. })
        ));
        assert!(!ledger.is_marked("8"));
    }

    #[test]
    fn test_daily_ledger_deduplicates_log_rows() {
        let events = vec![
            AttendanceEvent::new(&john(), day(16), time(9, 0, 0)),
            AttendanceEvent::new(&john(), day(16), time(9, 0, 1)),
        ];
        let daily = DailyLedger::from_events(day(16), &events);
        assert_eq!(daily.len(), 1);
    }
}
