//! Audit sink implementations.
//!
//! Every roster mutation, request save and materialization produces an
//! [`AuditEvent`]. Events go to an optional in-process sink and are appended
//! to the `logs` table and sheet as low-priority telemetry.

use std::collections::VecDeque;
use std::fmt;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::util::clock::now_ms;
use crate::util::serde::EmployeeId;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Seated on a date.
    Admitted,
    /// Put on the waitlist.
    Queued,
    /// Gave up a seat.
    Released,
    /// Left the waitlist.
    Dequeued,
    /// Moved from the waitlist into a seat.
    Promoted,
    /// Weekly request saved.
    RequestSaved,
    /// Week rosters written from the resolved schedule.
    WeekMaterialized,
    /// Default assignment replaced.
    DefaultSaved,
}

impl AuditAction {
    /// Storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Queued => "queued",
            Self::Released => "released",
            Self::Dequeued => "dequeued",
            Self::Promoted => "promoted",
            Self::RequestSaved => "request_saved",
            Self::WeekMaterialized => "week_materialized",
            Self::DefaultSaved => "default_saved",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Action taken.
    pub action: AuditAction,
    /// Affected date or week start.
    pub date: Option<NaiveDate>,
    /// Acting or affected employee.
    pub employee_id: Option<EmployeeId>,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub payload: Option<String>,
}

impl AuditEvent {
    /// Positional row for the `logs` sheet.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.created_at_ms.to_string(),
            self.action.to_string(),
            self.date.map(|d| d.to_string()).unwrap_or_default(),
            self.employee_id.map(|id| id.to_string()).unwrap_or_default(),
            self.payload.clone().unwrap_or_default(),
        ]
    }
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Events with the given action.
    pub fn of(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// DDL for the `logs` table.
pub const LOGS_TABLE_DDL: &str = r"
CREATE TABLE IF NOT EXISTS logs (
    event_id TEXT PRIMARY KEY,
    action TEXT NOT NULL,
    event_date DATE,
    employee_id BIGINT,
    payload TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_logs_created ON logs (created_at);
";

/// Helper to build an audit event from context.
pub fn build_audit_event(
    action: AuditAction,
    date: Option<NaiveDate>,
    employee_id: Option<EmployeeId>,
    payload: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        action,
        date,
        employee_id,
        created_at_ms: now_ms(),
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_sink_is_bounded() {
        let sink = InMemoryAuditSink::new(2);
        for action in [AuditAction::Admitted, AuditAction::Queued, AuditAction::Released] {
            sink.record(build_audit_event(action, None, Some(1), None));
        }
        let actions: Vec<_> = sink.events().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Queued, AuditAction::Released]);
    }

    #[test]
    fn test_row_leaves_missing_fields_blank() {
        let event = build_audit_event(AuditAction::DefaultSaved, None, None, Some("by 5".into()));
        let row = event.to_row();
        assert_eq!(row[1], "default_saved");
        assert_eq!(row[2], "");
        assert_eq!(row[4], "by 5");
    }
}
