//! Tests for utility functions

use seat_scheduler::core::Collection;
use seat_scheduler::util::{init_tracing, now_ms, Priority};

#[test]
fn test_priority_ordering() {
    assert!(Priority::High > Priority::Low);
}

#[test]
fn test_only_logs_are_low_priority() {
    for collection in Collection::ALL {
        let expected = if collection == Collection::Logs {
            Priority::Low
        } else {
            Priority::High
        };
        assert_eq!(collection.priority(), expected, "{collection}");
    }
}

#[test]
fn test_priority_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
    let parsed: Priority = serde_json::from_str("\"low\"").unwrap();
    assert_eq!(parsed, Priority::Low);
}

#[test]
fn test_now_ms_advances() {
    let first = now_ms();
    let second = now_ms();
    assert!(first > 0);
    assert!(second >= first);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
