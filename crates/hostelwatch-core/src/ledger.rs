//! Backend-side attendance ledger.
//!
//! Keeps one record per presence interval and per device. A device has at
//! most one open session: entering while a session is open confirms it,
//! leaving closes it and fixes its duration.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::info;
use uuid::Uuid;

use crate::types::AttendanceRecord;

/// In-memory attendance ledger.
#[derive(Debug, Clone)]
pub struct AttendanceLedger {
    records: Vec<AttendanceRecord>,
    timezone: Tz,
}

impl AttendanceLedger {
    /// Creates a ledger over existing records. `timezone` decides what "today" means.
    #[must_use]
    pub const fn new(records: Vec<AttendanceRecord>, timezone: Tz) -> Self {
        Self { records, timezone }
    }

    /// All records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    /// The open session of `user_id`, if any.
    #[must_use]
    pub fn open_session(&self, user_id: &str) -> Option<&AttendanceRecord> {
        self.records
            .iter()
            .rev()
            .find(|r| r.user_id == user_id && r.is_open())
    }

    /// Opens a session for `user_id` at `now` unless one is already open.
    ///
    /// Returns the session and whether it was created by this call.
    pub fn open(&mut self, user_id: &str, now: DateTime<Utc>) -> (AttendanceRecord, bool) {
        if let Some(existing) = self.open_session(user_id) {
            return (existing.clone(), false);
        }

        let record = AttendanceRecord {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            entry_time: now,
            exit_time: None,
            duration: None,
        };
        info!(user_id, entry_time = %now, "session_opened");
        self.records.push(record.clone());
        (record, true)
    }

    /// Closes the open session of `user_id` at `now`.
    ///
    /// Returns the closed session, or `None` if nothing was open.
    pub fn close(&mut self, user_id: &str, now: DateTime<Utc>) -> Option<AttendanceRecord> {
        let record = self
            .records
            .iter_mut()
            .rev()
            .find(|r| r.user_id == user_id && r.is_open())?;

        let duration = now.signed_duration_since(record.entry_time).num_seconds().max(0);
        record.exit_time = Some(now);
        record.duration = Some(duration);
        info!(user_id, duration_secs = duration, "session_closed");
        Some(record.clone())
    }

    /// Whether `user_id` has a session that started on the local date of `now`.
    #[must_use]
    pub fn marked_on_day_of(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        let today = self.local_date(now);
        self.records
            .iter()
            .any(|r| r.user_id == user_id && self.local_date(r.entry_time) == today)
    }

    /// All records, newest entry first.
    #[must_use]
    pub fn history(&self) -> Vec<AttendanceRecord> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| {
            b.entry_time
                .cmp(&a.entry_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        records
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.timezone).date_naive()
    }
}
