//! Tests for audit sink

use chrono::NaiveDate;
use seat_scheduler::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);
    let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

    let event = build_audit_event(AuditAction::Admitted, Some(date), Some(7), None);
    sink.record(event.clone());
    sink.record(build_audit_event(AuditAction::Queued, Some(date), Some(8), None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], event);
    assert_eq!(sink.of(AuditAction::Queued).len(), 1);
    assert!(sink.of(AuditAction::Promoted).is_empty());
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event(AuditAction::Admitted, None, Some(1), None));
    sink.record(build_audit_event(AuditAction::Released, None, Some(2), None));
    sink.record(build_audit_event(AuditAction::Promoted, None, Some(3), None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].employee_id, Some(2)); // First one popped
    assert_eq!(events[1].employee_id, Some(3));
}

#[test]
fn test_build_audit_event() {
    let date = NaiveDate::from_ymd_opt(2026, 10, 26).unwrap();
    let event = build_audit_event(
        AuditAction::WeekMaterialized,
        Some(date),
        None,
        Some("5 rosters".to_string()),
    );

    assert!(!event.event_id.is_empty());
    assert_eq!(event.action, AuditAction::WeekMaterialized);
    assert!(event.created_at_ms > 0);
    assert_eq!(
        event.to_row()[1..],
        ["week_materialized", "2026-10-26", "", "5 rosters"]
    );
}

#[test]
fn test_event_ids_are_unique() {
    let a = build_audit_event(AuditAction::RequestSaved, None, Some(1), None);
    let b = build_audit_event(AuditAction::RequestSaved, None, Some(1), None);
    assert_ne!(a.event_id, b.event_id);
}
