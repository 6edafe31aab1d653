//! Error types for scheduling and storage operations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::util::serde::EmployeeId;

/// Errors produced by the scheduling engines and the store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Every seat for the date is taken.
    #[error("capacity exceeded")]
    CapacityExceeded,
    /// The employee is neither seated nor waitlisted, or a record is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// The acting employee is not an administrator.
    #[error("permission denied for employee {0}")]
    PermissionDenied(EmployeeId),
    /// The directory has no employee with this id.
    #[error("unknown employee {0}")]
    UnknownEmployee(EmployeeId),
    /// The date falls on a weekend.
    #[error("{0} is not a workday")]
    NotAWorkday(NaiveDate),
    /// A week must start on a Monday.
    #[error("{0} is not a Monday")]
    InvalidWeekStart(NaiveDate),
    /// A default assignment violates the seat-map invariants.
    #[error("invalid default assignment: {0}")]
    InvalidAssignment(String),
    /// The authoritative store could not complete the operation.
    #[error("primary store unavailable: {0}")]
    PrimaryStoreUnavailable(String),
    /// The mirror API quota is exhausted.
    #[error("mirror rate limited")]
    MirrorRateLimited,
    /// The mirror API could not be reached.
    #[error("mirror unavailable: {0}")]
    MirrorUnavailable(String),
    /// The flat-file cache could not be read or written.
    #[error("local cache error: {0}")]
    Cache(String),
    /// A stored row could not be parsed.
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

impl ScheduleError {
    /// Wrap any displayable backend failure as a primary-store outage.
    pub fn primary(err: impl std::fmt::Display) -> Self {
        Self::PrimaryStoreUnavailable(err.to_string())
    }

    /// Wrap a parse failure with the offending input.
    pub fn malformed(what: &str, input: impl std::fmt::Display) -> Self {
        Self::MalformedRecord(format!("{what}: `{input}`"))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
