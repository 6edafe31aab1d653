//! Tests for error types

use chrono::NaiveDate;
use seat_scheduler::core::{MirrorError, ScheduleError};

#[test]
fn test_capacity_exceeded_error() {
    let err = ScheduleError::CapacityExceeded;
    assert_eq!(format!("{}", err), "capacity exceeded");
}

#[test]
fn test_permission_denied_error() {
    let err = ScheduleError::PermissionDenied(42);
    assert_eq!(format!("{}", err), "permission denied for employee 42");
}

#[test]
fn test_week_start_error() {
    let tuesday = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
    let err = ScheduleError::InvalidWeekStart(tuesday);
    assert_eq!(format!("{}", err), "2026-10-20 is not a Monday");
}

#[test]
fn test_malformed_quotes_input() {
    let err = ScheduleError::malformed("date", "32.13.2026");
    assert_eq!(format!("{}", err), "malformed record: date: `32.13.2026`");
}

#[test]
fn test_mirror_errors_map_to_schedule_errors() {
    assert!(MirrorError::RateLimited.is_retryable());
    assert!(MirrorError::Unavailable("timeout".into()).is_retryable());
    assert!(!MirrorError::Rejected("bad range".into()).is_retryable());

    assert_eq!(ScheduleError::from(MirrorError::RateLimited), ScheduleError::MirrorRateLimited);
    assert_eq!(
        ScheduleError::from(MirrorError::Rejected("bad range".into())),
        ScheduleError::MirrorUnavailable("bad range".into())
    );
}
