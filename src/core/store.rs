//! Storage seams.
//!
//! [`PrimaryStore`] is the authoritative backend, [`MirrorStore`] the raw
//! rate-limited spreadsheet, [`LocalCache`] the flat-file tier. The engines
//! talk to [`ScheduleStore`], which combines them with the read cascade and the
//! write-through policy.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::audit::AuditEvent;
use crate::core::model::{
    DateRoster, DefaultAssignment, EmployeeRecord, PendingEmployee, QueueEntry, WeeklyRequest,
};
use crate::core::ScheduleError;
use crate::util::serde::{EmployeeId, Priority};

/// Logical collections shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Administrator ids.
    Admins,
    /// Registered employees.
    Employees,
    /// Employees added by username, not yet registered.
    PendingEmployees,
    /// Default seat map per weekday.
    DefaultSchedule,
    /// Per-date rosters.
    Schedules,
    /// Weekly requests.
    Requests,
    /// Per-date waitlists.
    Queue,
    /// Audit/telemetry log.
    Logs,
}

impl Collection {
    /// Every collection.
    pub const ALL: [Self; 8] = [
        Self::Admins,
        Self::Employees,
        Self::PendingEmployees,
        Self::DefaultSchedule,
        Self::Schedules,
        Self::Requests,
        Self::Queue,
        Self::Logs,
    ];

    /// Table and sheet name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Admins => "admins",
            Self::Employees => "employees",
            Self::PendingEmployees => "pending_employees",
            Self::DefaultSchedule => "default_schedule",
            Self::Schedules => "schedules",
            Self::Requests => "requests",
            Self::Queue => "queue",
            Self::Logs => "logs",
        }
    }

    /// Header row written to the sheet.
    pub const fn header(self) -> &'static [&'static str] {
        match self {
            Self::Admins => &["employee_id"],
            Self::Employees => &["id", "manual_name", "display_name", "username", "approved"],
            Self::PendingEmployees => &["username", "manual_name"],
            Self::DefaultSchedule => &["day_name", "seat_map_json"],
            Self::Schedules => &["date", "day_name", "employees"],
            Self::Requests => &["week_start", "employee_id", "days_requested", "days_skipped"],
            Self::Queue => &["date", "employee_id", "employee_name"],
            Self::Logs => &["timestamp", "action", "date", "employee_id", "payload"],
        }
    }

    /// Rate-limit class of calls touching this collection.
    pub const fn priority(self) -> Priority {
        match self {
            Self::Logs => Priority::Low,
            _ => Priority::High,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure of a raw mirror call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    /// Quota exhausted, locally or remotely.
    #[error("mirror rate limited")]
    RateLimited,
    /// Transport or server failure.
    #[error("mirror unavailable: {0}")]
    Unavailable(String),
    /// The mirror refused the request; retrying will not help.
    #[error("mirror rejected request: {0}")]
    Rejected(String),
}

impl MirrorError {
    /// Whether the operation should be buffered for replay.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Unavailable(_))
    }
}

impl From<MirrorError> for ScheduleError {
    fn from(err: MirrorError) -> Self {
        match err {
            MirrorError::RateLimited => Self::MirrorRateLimited,
            MirrorError::Unavailable(msg) | MirrorError::Rejected(msg) => Self::MirrorUnavailable(msg),
        }
    }
}

/// A committed change to one date: the new roster, the new waitlist, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayChange {
    /// Affected date.
    pub date: NaiveDate,
    /// Replacement roster, if it changed.
    pub roster: Option<DateRoster>,
    /// Replacement waitlist, if it changed.
    pub queue: Option<Vec<QueueEntry>>,
}

impl DayChange {
    /// Roster-only change.
    pub fn roster(roster: DateRoster) -> Self {
        Self {
            date: roster.date,
            roster: Some(roster),
            queue: None,
        }
    }

    /// Waitlist-only change.
    pub const fn queue(date: NaiveDate, queue: Vec<QueueEntry>) -> Self {
        Self {
            date,
            roster: None,
            queue: Some(queue),
        }
    }
}

/// Authoritative relational backend.
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    /// Administrator ids.
    async fn load_admins(&self) -> Result<Vec<EmployeeId>, ScheduleError>;
    /// Grant admin rights.
    async fn add_admin(&self, id: EmployeeId) -> Result<(), ScheduleError>;
    /// Revoke admin rights.
    async fn remove_admin(&self, id: EmployeeId) -> Result<(), ScheduleError>;
    /// All employees.
    async fn load_employees(&self) -> Result<Vec<EmployeeRecord>, ScheduleError>;
    /// Insert or update an employee.
    async fn save_employee(&self, record: &EmployeeRecord) -> Result<(), ScheduleError>;
    /// Pending employees.
    async fn load_pending(&self) -> Result<Vec<PendingEmployee>, ScheduleError>;
    /// Insert or update a pending employee.
    async fn save_pending(&self, pending: &PendingEmployee) -> Result<(), ScheduleError>;
    /// Delete a pending employee by username.
    async fn remove_pending(&self, username: &str) -> Result<(), ScheduleError>;
    /// Default assignment, if one was ever saved.
    async fn load_default(&self) -> Result<Option<DefaultAssignment>, ScheduleError>;
    /// Replace the default assignment.
    async fn save_default(&self, assignment: &DefaultAssignment) -> Result<(), ScheduleError>;
    /// Roster for a date, if one was written.
    async fn load_roster(&self, date: NaiveDate) -> Result<Option<DateRoster>, ScheduleError>;
    /// Waitlist for a date in FIFO order.
    async fn load_queue(&self, date: NaiveDate) -> Result<Vec<QueueEntry>, ScheduleError>;
    /// Commit a day change atomically.
    async fn save_day(&self, change: &DayChange) -> Result<(), ScheduleError>;
    /// Requests for a week.
    async fn load_requests(&self, week_start: NaiveDate) -> Result<Vec<WeeklyRequest>, ScheduleError>;
    /// Insert or replace a request keyed by week and employee.
    async fn save_request(&self, request: &WeeklyRequest) -> Result<(), ScheduleError>;
    /// Delete every request for a week.
    async fn clear_requests(&self, week_start: NaiveDate) -> Result<(), ScheduleError>;
    /// Append an audit event.
    async fn append_log(&self, event: &AuditEvent) -> Result<(), ScheduleError>;
}

/// Raw spreadsheet backend. Rows are positional strings, header included.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Every row of a sheet.
    async fn read_rows(&self, collection: Collection) -> Result<Vec<Vec<String>>, MirrorError>;
    /// Replace the whole sheet.
    async fn write_rows(&self, collection: Collection, rows: Vec<Vec<String>>) -> Result<(), MirrorError>;
    /// Append one row.
    async fn append_row(&self, collection: Collection, row: Vec<String>) -> Result<(), MirrorError>;
    /// Whether the backend is reachable. Must not consume API quota.
    async fn is_reachable(&self) -> bool;
}

/// Flat-file tier keyed by string.
pub trait LocalCache: Send + Sync {
    /// Stored value, if any.
    fn load(&self, key: &str) -> Option<serde_json::Value>;
    /// Overwrite a value.
    fn store(&self, key: &str, value: &serde_json::Value) -> Result<(), ScheduleError>;
}

/// Which tier answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSource {
    /// Primary store.
    Primary,
    /// Spreadsheet mirror.
    Mirror,
    /// Flat-file cache.
    Cache,
    /// Built-in defaults.
    Fallback,
}

/// A value together with the tier it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    /// Loaded value.
    pub value: T,
    /// Tier that produced it.
    pub source: ReadSource,
}

impl<T> Sourced<T> {
    /// Pair a value with its source.
    pub const fn new(value: T, source: ReadSource) -> Self {
        Self { value, source }
    }

    /// Drop the source.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Logical store used by the engines and the service.
///
/// Reads walk primary, mirror, cache and fallback and only fail on invalid
/// input. Writes hit the primary first and fail if it fails; the other tiers
/// are updated only after that.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Administrator ids.
    async fn admins(&self) -> Result<Sourced<Vec<EmployeeId>>, ScheduleError>;
    /// Employees.
    async fn employees(&self) -> Result<Sourced<Vec<EmployeeRecord>>, ScheduleError>;
    /// Pending employees.
    async fn pending_employees(&self) -> Result<Sourced<Vec<PendingEmployee>>, ScheduleError>;
    /// Default assignment.
    async fn default_assignment(&self) -> Result<Sourced<DefaultAssignment>, ScheduleError>;
    /// Roster for a date; falls back to the default assignment.
    async fn roster(&self, date: NaiveDate) -> Result<Sourced<DateRoster>, ScheduleError>;
    /// Waitlist for a date.
    async fn queue(&self, date: NaiveDate) -> Result<Sourced<Vec<QueueEntry>>, ScheduleError>;
    /// Requests for a week.
    async fn requests(&self, week_start: NaiveDate) -> Result<Sourced<Vec<WeeklyRequest>>, ScheduleError>;

    /// Commit a day change.
    async fn save_day(&self, change: &DayChange) -> Result<(), ScheduleError>;
    /// Replace the default assignment.
    async fn save_default(&self, assignment: &DefaultAssignment) -> Result<(), ScheduleError>;
    /// Save a request.
    async fn save_request(&self, request: &WeeklyRequest) -> Result<(), ScheduleError>;
    /// Delete a week's requests.
    async fn clear_requests(&self, week_start: NaiveDate) -> Result<(), ScheduleError>;
    /// Insert or update an employee.
    async fn save_employee(&self, record: &EmployeeRecord) -> Result<(), ScheduleError>;
    /// Grant admin rights.
    async fn add_admin(&self, id: EmployeeId) -> Result<(), ScheduleError>;
    /// Revoke admin rights.
    async fn remove_admin(&self, id: EmployeeId) -> Result<(), ScheduleError>;
    /// Insert or update a pending employee.
    async fn save_pending(&self, pending: &PendingEmployee) -> Result<(), ScheduleError>;
    /// Delete a pending employee.
    async fn remove_pending(&self, username: &str) -> Result<(), ScheduleError>;
    /// Best-effort audit append; never fails.
    async fn append_log(&self, event: &AuditEvent);
}
