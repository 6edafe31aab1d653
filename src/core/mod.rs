//! Core scheduling model, engines and storage seams.

pub mod admission;
pub mod audit;
pub mod directory;
pub mod error;
pub mod model;
pub mod notify;
pub mod resolution;
pub mod service;
pub mod spawn;
pub mod store;
pub mod weekly;

pub use admission::{AdmissionEngine, AdmissionOutcome, DayState, ReleaseOutcome};
pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use directory::{Directory, StaticDirectory};
pub use error::{AppResult, ScheduleError};
pub use model::{
    week_dates, week_start, DateRoster, DefaultAssignment, EmployeeIdentity, EmployeeRecord,
    PendingEmployee, QueueEntry, SeatKey, WeeklyRequest, WorkDay, DEFAULT_MAX_SEATS,
};
pub use notify::{Notification, Notifier};
pub use resolution::{ResolvedWeek, ScheduleResolver};
pub use service::{Clock, LiveEffect, SavedRequest, SeatService};
pub use spawn::{Spawn, StopHandle};
pub use store::{
    Collection, DayChange, LocalCache, MirrorError, MirrorStore, PrimaryStore, ReadSource,
    ScheduleStore, Sourced,
};
pub use weekly::{WeeklyJob, WeeklyTasks, WeeklyTimes};
